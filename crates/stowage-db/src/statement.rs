//! Rendering of set-based archive copy statements.

use stowage_core::{ColumnPlan, Result, SourceExpr, TableRef};

use crate::identifier::{qualified_name, quote_identifier, validate_table_ref};

/// A rendered copy from one table into another.
///
/// Built from an empty plan, the statement is a no-op and carries no SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveStatement {
    source: TableRef,
    destination: TableRef,
    columns: Vec<String>,
    sql: Option<String>,
}

impl ArchiveStatement {
    pub fn source(&self) -> &TableRef {
        &self.source
    }

    pub fn destination(&self) -> &TableRef {
        &self.destination
    }

    /// Destination columns, in insert order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    pub fn is_noop(&self) -> bool {
        self.sql.is_none()
    }
}

/// Build `INSERT INTO <destination> (<columns>) SELECT <exprs> FROM <source>`.
///
/// Column `i` of the insert list is filled by expression `i` of the select
/// list. Every schema, table and column name is validated and quoted; any
/// failure returns [`stowage_core::Error::UnsafeIdentifier`] and nothing is
/// rendered.
pub fn build(source: &TableRef, destination: &TableRef, plan: &ColumnPlan) -> Result<ArchiveStatement> {
    validate_table_ref(source)?;
    validate_table_ref(destination)?;

    if plan.is_empty() {
        return Ok(ArchiveStatement {
            source: source.clone(),
            destination: destination.clone(),
            columns: Vec::new(),
            sql: None,
        });
    }

    let mut insert_list = Vec::with_capacity(plan.len());
    let mut select_list = Vec::with_capacity(plan.len());
    for entry in plan.entries() {
        insert_list.push(quote_identifier(&entry.destination)?);
        select_list.push(match &entry.expr {
            SourceExpr::Column(name) => quote_identifier(name)?,
            SourceExpr::Literal(literal) => literal.as_sql().to_string(),
        });
    }

    let sql = format!(
        "INSERT INTO {} ({}) SELECT {} FROM {}",
        qualified_name(destination)?,
        insert_list.join(", "),
        select_list.join(", "),
        qualified_name(source)?,
    );

    Ok(ArchiveStatement {
        source: source.clone(),
        destination: destination.clone(),
        columns: plan.destination_columns().map(str::to_string).collect(),
        sql: Some(sql),
    })
}
