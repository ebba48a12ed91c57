//! # dockprep Core Library
//!
//! Building blocks for sphere-clustered molecular docking screens: preparing one
//! docking job tree per (cluster count, iteration) pair and harvesting the scored
//! results once the docking runs are done.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture so that parsing, algorithms and
//! orchestration stay independently testable.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`SphereSet`, `OutdockRecord`,
//!   `PoseBlock`) and the codecs for the line-oriented file formats involved: sphere
//!   files, docking control files, docking reports and compressed pose archives.
//!
//! - **[`engine`]: The Logic Core.** Seeded k-means clustering of matching spheres,
//!   round-robin sharding of the compound index, the filesystem effect used by the
//!   builder, configuration, progress reporting and the error taxonomy.
//!
//! - **[`workflows`]: The Public API.** Complete procedures built from the two layers
//!   below: building job directories, extracting hit tables, and selecting the top
//!   percentile of hits.

pub mod core;
pub mod engine;
pub mod workflows;
