//! # stowage-db
//!
//! PostgreSQL archival engine for the stowage pipeline.
//!
//! This crate provides:
//! - Connection pool management
//! - Catalog inspection of table columns
//! - Column reconciliation between landing and archive tables
//! - Identifier-safe rendering of set-based copy statements
//! - Scoped execution and the per-table archival orchestrator
//!
//! ## Example
//!
//! ```rust,ignore
//! use stowage_db::{create_pool, PgStore, TableArchiver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool("postgres://localhost/warehouse").await?;
//!     let archiver = TableArchiver::new(PgStore::new(pool));
//!
//!     let tables = vec!["orders".to_string()];
//!     let report = archiver.archive_tables(&tables, "landing", "archive").await;
//!     println!("Moved {} rows", report.total_rows_moved());
//!     Ok(())
//! }
//! ```
pub mod archiver;
pub mod executor;
pub mod identifier;
pub mod inspector;
pub mod pool;
pub mod reconcile;
pub mod statement;
pub mod store;

// Test fixtures for integration tests
// Note: Always compiled so downstream tests can use MemoryStore and DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use stowage_core::*;

pub use archiver::{archive_tables, ArchiveOptions, TableArchiver};
pub use executor::execute;
pub use identifier::{
    qualified_name, quote_identifier, validate_identifier, validate_schema_name,
    validate_table_ref,
};
pub use inspector::{columns_of, COLUMNS_QUERY};
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use reconcile::reconcile;
pub use statement::{build, ArchiveStatement};
pub use store::PgStore;
