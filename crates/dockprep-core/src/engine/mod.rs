//! # Engine Module
//!
//! The algorithmic layer between the file codecs in [`crate::core`] and the
//! user-facing [`crate::workflows`].
//!
//! - **Clustering** ([`clustering`]) - Seeded k-means partitioning of matching spheres
//! - **Sharding** ([`sharding`]) - Round-robin split of the compound index
//! - **Filesystem Effect** ([`fs`]) - The injectable sink for every directory-tree mutation
//! - **Configuration** ([`config`]) - Build and extraction parameters with validation
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - The error taxonomy shared by the workflows
//!
//! Nothing in this layer keeps global state: randomness is always seeded explicitly
//! and all filesystem writes go through a [`fs::FileSystem`] handle.

pub mod clustering;
pub mod config;
pub mod error;
pub mod fs;
pub mod progress;
pub mod sharding;
