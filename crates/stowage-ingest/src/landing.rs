//! Appending decoded records to landing tables.

use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use stowage_core::{logging, ColumnSet, Error, Result, SourceExpr, Store, TableRef};
use stowage_db::{columns_of, qualified_name, quote_identifier, reconcile, validate_table_ref};

use crate::payload::Record;

/// Loads records into tables of one landing schema.
pub struct LandingLoader<S> {
    store: S,
    landing_schema: String,
}

impl<S: Store> LandingLoader<S> {
    pub fn new(store: S, landing_schema: impl Into<String>) -> Self {
        Self {
            store,
            landing_schema: landing_schema.into(),
        }
    }

    pub fn landing_schema(&self) -> &str {
        &self.landing_schema
    }

    /// Append `records` to `<landing>.<table>` and return the rows inserted.
    ///
    /// Only record fields that are columns of the table are loaded; the rest
    /// are ignored with a warning. Columns missing from a record load as
    /// NULL. The insert runs in one scoped transaction, so a bad batch leaves
    /// the table untouched.
    #[instrument(
        skip(self, records),
        fields(subsystem = logging::SUBSYSTEM_INGEST, component = "landing", op = "load", record_count = records.len())
    )]
    pub async fn load(&self, table: &str, records: &[Record]) -> Result<u64> {
        let start = Instant::now();
        let target = TableRef::new(self.landing_schema.as_str(), table);
        validate_table_ref(&target)?;

        if records.is_empty() {
            debug!(table = %target, "No records to load");
            return Ok(0);
        }

        let table_cols = columns_of(&self.store, &target).await?;
        if table_cols.is_empty() {
            return Err(Error::SchemaNotFound(target));
        }

        let fields: ColumnSet = records.iter().flat_map(|r| r.keys().cloned()).collect();
        let ignored: Vec<&str> = fields.iter().filter(|f| !table_cols.contains(f)).collect();
        if !ignored.is_empty() {
            warn!(
                table = %target,
                ignored = ?ignored,
                "Ignoring record fields that are not columns"
            );
        }

        let plan = reconcile(&fields, &table_cols, &[]);
        if plan.is_empty() {
            return Err(Error::Payload(format!(
                "no record field matches a column of {}",
                target
            )));
        }

        let mut columns = Vec::with_capacity(plan.len());
        for entry in plan.entries() {
            if let SourceExpr::Column(name) = &entry.expr {
                columns.push(quote_identifier(name)?);
            }
        }
        let column_list = columns.join(", ");
        let relation = qualified_name(&target)?;
        let sql = format!(
            "INSERT INTO {relation} ({column_list}) SELECT {column_list} \
             FROM json_populate_recordset(NULL::{relation}, $1::json)"
        );
        debug!(table = %target, sql = %sql, "Rendered landing insert");

        let payload = serde_json::to_string(records)?;
        let rows = self.store.execute_scoped(&sql, &[payload.as_str()]).await?;

        info!(
            table = %target,
            rows_loaded = rows,
            column_count = columns.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Loaded {} rows into {}",
            rows,
            target
        );
        Ok(rows)
    }
}
