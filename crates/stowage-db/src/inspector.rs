//! Catalog inspection.

use std::time::Instant;

use tracing::debug;

use stowage_core::{logging, ColumnSet, Result, Store, TableRef};

/// Column names of one relation in ordinal order.
///
/// Identifiers are bound as parameters, never interpolated. Casting the
/// catalog's `sql_identifier` columns to text keeps the comparison and the
/// decoded values plain strings.
pub const COLUMNS_QUERY: &str = "SELECT column_name::text \
     FROM information_schema.columns \
     WHERE table_schema::text = $1 AND table_name::text = $2 \
     ORDER BY ordinal_position";

/// Fetch the current column set of `table`.
///
/// A relation that does not exist (or is not visible to the current role)
/// yields an empty set rather than an error. Catalog query failures are
/// returned as-is.
pub async fn columns_of<S: Store + ?Sized>(store: &S, table: &TableRef) -> Result<ColumnSet> {
    let start = Instant::now();
    let rows = store
        .fetch_rows(COLUMNS_QUERY, &[table.schema(), table.name()])
        .await?;

    let columns: ColumnSet = rows
        .into_iter()
        .filter_map(|row| row.into_iter().next())
        .collect();

    debug!(
        subsystem = logging::SUBSYSTEM_ARCHIVE,
        component = "inspector",
        op = "columns_of",
        table = %table,
        column_count = columns.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Inspected table columns"
    );
    Ok(columns)
}
