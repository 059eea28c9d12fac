//! PostgreSQL implementation of the [`Store`] capability.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::trace;

use stowage_core::{logging, Error, Result, Store, StoreRow};

/// A [`Store`] backed by a shared `sqlx` pool.
///
/// Every call checks out its own connection and returns it before the call
/// completes, so no connection is held across another operation's I/O.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    statement_timeout: Option<Duration>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            statement_timeout: None,
        }
    }

    /// Cancel scoped statements that run longer than `timeout`.
    ///
    /// Applied with `SET LOCAL statement_timeout`, so a timed-out copy is
    /// aborted server-side and its transaction rolled back.
    pub fn with_statement_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.statement_timeout = timeout;
        self
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn decode_row(row: &PgRow) -> Result<StoreRow> {
    (0..row.len())
        .map(|idx| {
            row.try_get::<Option<String>, _>(idx)
                .map(Option::unwrap_or_default)
                .map_err(Error::Database)
        })
        .collect()
}

#[async_trait]
impl Store for PgStore {
    async fn fetch_rows(&self, sql: &str, params: &[&str]) -> Result<Vec<StoreRow>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(param.to_string());
        }

        let rows = query.fetch_all(&self.pool).await.map_err(Error::Database)?;
        trace!(
            subsystem = logging::SUBSYSTEM_DB,
            component = "store",
            op = "fetch_rows",
            row_count = rows.len(),
            "Read query complete"
        );
        rows.iter().map(decode_row).collect()
    }

    async fn execute_scoped(&self, sql: &str, params: &[&str]) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        if let Some(timeout) = self.statement_timeout {
            // SET does not accept bind parameters; the value is an integer we render.
            let set_timeout = format!("SET LOCAL statement_timeout = {}", timeout.as_millis());
            sqlx::query(&set_timeout)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
        }

        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(param.to_string());
        }

        // An early return drops `tx`, which rolls it back.
        let result = query.execute(&mut *tx).await.map_err(Error::Database)?;
        tx.commit().await.map_err(Error::Database)?;

        trace!(
            subsystem = logging::SUBSYSTEM_DB,
            component = "store",
            op = "execute_scoped",
            rows_affected = result.rows_affected(),
            "Scoped statement committed"
        );
        Ok(result.rows_affected())
    }
}
