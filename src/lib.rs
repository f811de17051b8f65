//! Adds IMDb director data to an existing MovieChain SQLite store.
//!
//! Two streaming passes over the IMDb extracts (`title.principals`, then `name.basics`) are
//! joined against the movies already in the store, loaded in committed batches, indexed for
//! lookup and full-text search, and finally vacuumed and gzipped for distribution.

pub mod config;
pub mod database_ops;
pub mod logging;
pub mod orchestrator;

pub mod util {
    pub mod env;
    pub mod sqlite;
}

pub use config::EnrichConfig;
pub use orchestrator::{enrich_store, run_pipeline, LoadSummary, RunSummary};
