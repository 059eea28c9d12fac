//! # stowage-core
//!
//! Core types, traits, and configuration for the stowage landing/archive
//! pipeline.
//!
//! This crate provides the data model shared by the archival engine and the
//! ingestion layer, the error taxonomy, and the [`Store`] capability the
//! engine runs against.

pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use config::{
    ArchiveSettings, DatabaseConfig, ExtractConfig, ExtractMode, PipelineConfig, S3Config,
    SchemaConfig, TableConfig,
};
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
