//! Centralized default constants for stowage.
//!
//! All crates reference these constants instead of defining their own magic
//! numbers.

// =============================================================================
// ARCHIVAL
// =============================================================================

/// Prefix applied to a landing table name to derive its archive table.
pub const ARCHIVE_TABLE_PREFIX: &str = "archive_";

/// Archive column stamped with the copy time.
pub const ARCHIVED_AT_COLUMN: &str = "archived_at";

/// Executor attempts per table (1 = no retry).
pub const ARCHIVE_MAX_ATTEMPTS: u32 = 1;

/// Delay between executor attempts.
pub const ARCHIVE_RETRY_BACKOFF_MS: u64 = 500;

/// Tables archived concurrently.
pub const ARCHIVE_CONCURRENCY: usize = 1;

/// PostgreSQL identifier length limit.
pub const MAX_IDENTIFIER_LEN: usize = 63;

// =============================================================================
// DATABASE
// =============================================================================

/// Default maximum number of pooled connections.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Default minimum number of pooled connections kept open.
pub const DB_MIN_CONNECTIONS: u32 = 0;

/// Default time to wait for a pooled connection.
pub const DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default lifetime of an idle pooled connection.
pub const DB_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default PostgreSQL port.
pub const DB_PORT: u16 = 5432;

// =============================================================================
// EXTRACTION
// =============================================================================

/// Default AWS region for public bucket URLs.
pub const S3_REGION: &str = "us-east-1";

/// HTTP timeout for object fetches.
pub const FETCH_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Config file read when no path is given.
pub const CONFIG_PATH: &str = "config.yaml";

/// Landing schema name when none is configured.
pub const LANDING_SCHEMA: &str = "landing";

/// Archive schema name when none is configured.
pub const ARCHIVE_SCHEMA: &str = "archive";
