//! Structured logging conventions for stowage.
//!
//! Every event carries a `subsystem` (one of the constants below) and usually
//! a `component` and `op`, so log aggregation can query the same names across
//! crates.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Table or file failed, run continues |
//! | WARN  | Table skipped (missing relation, nothing to copy), ignored payload keys |
//! | INFO  | Run start/finish, one line per archived table or loaded file |
//! | DEBUG | Column sets, plans, rendered statements |
//! | TRACE | Per-row or per-column detail |
//!
//! ## Field Vocabulary
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `run_id` | UUIDv7 of one archival or extraction run |
//! | `subsystem` | Originating subsystem |
//! | `component` | Part of the subsystem, e.g. `inspector`, `executor`, `orchestrator`, `pool`, `s3` |
//! | `op` | Logical operation, e.g. `columns_of`, `execute`, `archive_tables`, `fetch` |
//! | `source`, `destination` | Tables as `schema.name` |
//! | `object_key` | Object storage key being extracted |
//! | `duration_ms` | Wall-clock duration in milliseconds |
//! | `rows_moved`, `rows_loaded` | Rows copied into an archive table or loaded into a landing table |
//! | `column_count` | Columns in a set or plan |
//! | `attempt` | Executor attempt number (1-based) |
//! | `failure_kind` | Failure category |
//! | `error` | Error message when an operation fails |

/// Archival engine: orchestrator, inspector, executor.
pub const SUBSYSTEM_ARCHIVE: &str = "archive";

/// Connection pool and store.
pub const SUBSYSTEM_DB: &str = "db";

/// Object sources, landing loader, extractor.
pub const SUBSYSTEM_INGEST: &str = "ingest";

/// Configuration loading.
pub const SUBSYSTEM_CONFIG: &str = "config";

/// Command-line runner.
pub const SUBSYSTEM_CLI: &str = "cli";
