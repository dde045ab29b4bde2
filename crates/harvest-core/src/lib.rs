//! Harvest core library: builds a dataset of Java methods from source
//! repositories.
//!
//! Files are parsed with tree-sitter, every method is sliced out with its
//! line span, signature and token stream, then filtered, deduplicated and
//! written to CSV or SQLite. Repository discovery and file retrieval sit
//! behind the traits in [`collect`]. With the `python` feature the crate
//! also builds as the `harvest_core` extension module.

pub mod clean;
pub mod collect;
pub mod config;
pub mod errors;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod store;

#[cfg(feature = "python")]
mod python;

pub use config::HarvestConfig;
pub use errors::{HarvestError, HarvestResult};
pub use models::{HarvestStats, MethodRecord};
pub use pipeline::Harvester;
