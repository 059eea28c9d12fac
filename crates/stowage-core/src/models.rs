//! Data model for archival runs.
//!
//! Every value here is scoped to a single run over a single table. Nothing is
//! cached or persisted between runs, since landing and archive schemas may
//! change in between.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;
use crate::error::Error;

// =============================================================================
// TABLES AND COLUMNS
// =============================================================================

/// A schema-qualified table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    schema: String,
    name: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The archive table receiving copies of this table: same name with the
    /// `archive_` prefix, placed in `archive_schema`.
    pub fn archive_counterpart(&self, archive_schema: &str) -> TableRef {
        TableRef::new(
            archive_schema,
            format!("{}{}", defaults::ARCHIVE_TABLE_PREFIX, self.name),
        )
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Column names of one table, in catalog ordinal order.
///
/// Duplicates are dropped on construction; membership is exact-match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSet {
    columns: Vec<String>,
}

impl ColumnSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    /// Append a column, ignoring names already present.
    pub fn insert(&mut self, column: impl Into<String>) -> bool {
        let column = column.into();
        if self.contains(&column) {
            return false;
        }
        self.columns.push(column);
        true
    }
}

impl<S: Into<String>> FromIterator<S> for ColumnSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = ColumnSet::new();
        for column in iter {
            set.insert(column);
        }
        set
    }
}

// =============================================================================
// COLUMN PLAN
// =============================================================================

/// Time expressions allowed as synthesized column values.
///
/// These are the only SQL fragments emitted verbatim into a copy statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeLiteral {
    CurrentTimestamp,
    CurrentDate,
    LocalTimestamp,
    Now,
}

impl TimeLiteral {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::CurrentTimestamp => "CURRENT_TIMESTAMP",
            Self::CurrentDate => "CURRENT_DATE",
            Self::LocalTimestamp => "LOCALTIMESTAMP",
            Self::Now => "now()",
        }
    }
}

impl FromStr for TimeLiteral {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CURRENT_TIMESTAMP" => Ok(Self::CurrentTimestamp),
            "CURRENT_DATE" => Ok(Self::CurrentDate),
            "LOCALTIMESTAMP" => Ok(Self::LocalTimestamp),
            "NOW()" => Ok(Self::Now),
            _ => Err(Error::UnsafeIdentifier(format!(
                "unsupported literal expression: {}",
                s
            ))),
        }
    }
}

impl TryFrom<String> for TimeLiteral {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeLiteral> for String {
    fn from(value: TimeLiteral) -> Self {
        value.as_sql().to_string()
    }
}

impl fmt::Display for TimeLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Destination columns filled from a fixed expression instead of the source.
pub type SynthesizedColumns = Vec<(String, TimeLiteral)>;

/// The default synthesized mapping: `archived_at = CURRENT_TIMESTAMP`.
pub fn default_synthesized_columns() -> SynthesizedColumns {
    vec![(
        defaults::ARCHIVED_AT_COLUMN.to_string(),
        TimeLiteral::CurrentTimestamp,
    )]
}

/// Where a destination column's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceExpr {
    /// Copied from the source column of this name.
    Column(String),
    /// Filled from a time literal.
    Literal(TimeLiteral),
}

/// One `(destination_column, source_expression)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub destination: String,
    pub expr: SourceExpr,
}

/// Ordered column mapping for one copy.
///
/// A destination column appears at most once; [`ColumnPlan::push`] refuses
/// duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnPlan {
    entries: Vec<PlanEntry>,
}

impl ColumnPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pair. Returns false if `destination` is already planned.
    pub fn push(&mut self, destination: impl Into<String>, expr: SourceExpr) -> bool {
        let destination = destination.into();
        if self.entries.iter().any(|e| e.destination == destination) {
            return false;
        }
        self.entries.push(PlanEntry { destination, expr });
        true
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn destination_columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.destination.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

// =============================================================================
// OUTCOMES
// =============================================================================

/// A completed copy of one landing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivalResult {
    pub source: TableRef,
    pub destination: TableRef,
    pub rows_moved: u64,
    /// Executor attempts made, including the successful one.
    pub attempts: u32,
    pub duration_ms: u64,
}

/// Category of a per-table failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SchemaNotFound,
    EmptyPlan,
    UnsafeIdentifier,
    ArchivalExecution,
    /// Catalog query failed (connectivity, permissions).
    Inspection,
}

/// How loudly a failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

impl FailureKind {
    pub fn of(err: &Error) -> Self {
        match err {
            Error::SchemaNotFound(_) => Self::SchemaNotFound,
            Error::EmptyPlan { .. } => Self::EmptyPlan,
            Error::UnsafeIdentifier(_) => Self::UnsafeIdentifier,
            Error::ArchivalExecution { .. } => Self::ArchivalExecution,
            _ => Self::Inspection,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::SchemaNotFound | Self::EmptyPlan => Severity::Warning,
            Self::UnsafeIdentifier | Self::ArchivalExecution | Self::Inspection => Severity::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchemaNotFound => "schema_not_found",
            Self::EmptyPlan => "empty_plan",
            Self::UnsafeIdentifier => "unsafe_identifier",
            Self::ArchivalExecution => "archival_execution",
            Self::Inspection => "inspection",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A landing table that was not archived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivalFailure {
    /// Configured landing table name.
    pub table: String,
    pub kind: FailureKind,
    pub message: String,
}

impl ArchivalFailure {
    pub fn from_error(table: impl Into<String>, err: &Error) -> Self {
        Self {
            table: table.into(),
            kind: FailureKind::of(err),
            message: err.to_string(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

/// Outcome for one configured table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableOutcome {
    Archived(ArchivalResult),
    Failed(ArchivalFailure),
}

impl TableOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, TableOutcome::Failed(_))
    }
}

/// Per-table report of one archival run, in configured order.
#[derive(Debug, Clone, Serialize)]
pub struct ArchivalReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcomes: Vec<TableOutcome>,
}

impl ArchivalReport {
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(TableOutcome::is_failure)
    }

    pub fn total_rows_moved(&self) -> u64 {
        self.successes().map(|r| r.rows_moved).sum()
    }

    pub fn successes(&self) -> impl Iterator<Item = &ArchivalResult> {
        self.outcomes.iter().filter_map(|o| match o {
            TableOutcome::Archived(r) => Some(r),
            TableOutcome::Failed(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &ArchivalFailure> {
        self.outcomes.iter().filter_map(|o| match o {
            TableOutcome::Failed(f) => Some(f),
            TableOutcome::Archived(_) => None,
        })
    }
}
