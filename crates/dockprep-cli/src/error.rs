use dockprep::engine::error::BuildError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("{failed} of {total} {unit} failed")]
    UnitsFailed {
        unit: &'static str,
        failed: usize,
        total: usize,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
