//! Provides input/output functionality for the docking file formats.
//!
//! Each submodule owns one format: matching-sphere files, docking control files,
//! docking reports (`OUTDOCK`), compressed mol2 pose archives and the tab-separated
//! result tables. Formats that round-trip through a single model implement the
//! [`traits::TextFile`] interface.

pub mod control;
pub mod mol2;
pub mod outdock;
pub mod sphere;
pub mod table;
pub mod traits;
