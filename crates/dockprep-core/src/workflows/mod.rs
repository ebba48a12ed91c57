//! # Workflows Module
//!
//! High-level entry points that tie the codecs and engines together.
//!
//! - [`build`] - Builds one docking job tree per (cluster count, iteration) pair
//! - [`extract`] - Collects scores and anchor coordinates from finished jobs
//! - [`select`] - Keeps the best-scoring fraction of a job's hits
//!
//! Each workflow processes independent units (jobs or directories) in parallel on
//! the global `rayon` pool and reports progress through a
//! [`ProgressReporter`](crate::engine::progress::ProgressReporter).

pub mod build;
pub mod extract;
pub mod select;
