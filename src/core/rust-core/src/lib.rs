//! The Nexus data plane core.
//!
//! Nexus exposes scientific time-series catalogs and serves their data by
//! composing user-defined data source pipelines. This crate contains the
//! data plane: the catalog manager which discovers a hierarchy of catalogs
//! from data source pipelines, the data source controller which executes a
//! pipeline for one read, the file-backed aggregation cache, the processing
//! kernels, and the read orchestration which schedules concurrent reads
//! under a global memory budget while streaming results through byte pipes.

// Cache entries, pipe payloads and the sample period path segments are
// little-endian on disk and on the wire.
#[cfg(target_endian = "big")]
compile_error!("Nexus only supports little-endian hosts.");

pub mod core;
pub mod errors;
pub mod extensibility;
pub mod options;
pub mod services;
pub mod utilities;

pub use errors::{NexusError, Result};
pub use options::{DataOptions, NexusOptions, PathsOptions};
