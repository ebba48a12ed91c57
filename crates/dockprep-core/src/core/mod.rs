//! # Core Module
//!
//! Data models and file-format codecs shared by every workflow.
//!
//! - **Data Models** ([`models`]) - Sphere sets, docking score records and pose blocks
//! - **File I/O** ([`io`]) - Readers and writers for the custom line-oriented formats

pub mod io;
pub mod models;
