//! Execution of archive statements.

use std::time::Instant;

use tracing::debug;

use stowage_core::{logging, Error, Result, Store};

use crate::statement::ArchiveStatement;

/// Run `statement` in its own transaction and return the rows copied.
///
/// A no-op statement returns 0 without contacting the store. A storage
/// failure leaves nothing behind (the scope rolls back) and is returned as
/// [`Error::ArchivalExecution`] naming the destination. There are no retries
/// here; retry policy belongs to the caller.
pub async fn execute<S: Store + ?Sized>(store: &S, statement: &ArchiveStatement) -> Result<u64> {
    let Some(sql) = statement.sql() else {
        debug!(
            subsystem = logging::SUBSYSTEM_ARCHIVE,
            component = "executor",
            op = "execute",
            destination = %statement.destination(),
            "Empty plan, nothing sent to the store"
        );
        return Ok(0);
    };

    let start = Instant::now();
    debug!(
        subsystem = logging::SUBSYSTEM_ARCHIVE,
        component = "executor",
        op = "execute",
        destination = %statement.destination(),
        sql = sql,
        "Executing archive statement"
    );

    let rows = store
        .execute_scoped(sql, &[])
        .await
        .map_err(|e| Error::archival_execution(statement.destination().clone(), e))?;

    debug!(
        subsystem = logging::SUBSYSTEM_ARCHIVE,
        component = "executor",
        op = "execute",
        destination = %statement.destination(),
        rows_moved = rows,
        duration_ms = start.elapsed().as_millis() as u64,
        "Archive statement committed"
    );
    Ok(rows)
}
