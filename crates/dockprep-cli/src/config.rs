//! Resolution of the `build` configuration from CLI flags, `-S` settings, an
//! optional TOML file and built-in defaults, in that order of precedence.

pub mod builder;
pub mod defaults;
pub mod file;
pub mod models;

pub use builder::build_config;
pub use models::AppConfig;
