//! Capability traits for the store boundary.
//!
//! The archival engine only needs two things from storage: read catalog rows
//! and run one statement in its own scope. Keeping that surface small lets
//! tests substitute an in-memory store.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// One result row, every column decoded as text.
pub type StoreRow = Vec<String>;

/// Storage capability used by the archival engine and the landing loader.
#[async_trait]
pub trait Store: Send + Sync {
    /// Run a read query with text parameters bound to `$1..$n`.
    ///
    /// Every selected column must be text (cast with `::text` where needed).
    async fn fetch_rows(&self, sql: &str, params: &[&str]) -> Result<Vec<StoreRow>>;

    /// Run a statement inside its own transaction and return rows affected.
    ///
    /// The transaction commits only on success; any failure rolls back.
    async fn execute_scoped(&self, sql: &str, params: &[&str]) -> Result<u64>;
}

#[async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    async fn fetch_rows(&self, sql: &str, params: &[&str]) -> Result<Vec<StoreRow>> {
        (**self).fetch_rows(sql, params).await
    }

    async fn execute_scoped(&self, sql: &str, params: &[&str]) -> Result<u64> {
        (**self).execute_scoped(sql, params).await
    }
}

#[async_trait]
impl<S: Store + ?Sized> Store for &S {
    async fn fetch_rows(&self, sql: &str, params: &[&str]) -> Result<Vec<StoreRow>> {
        (**self).fetch_rows(sql, params).await
    }

    async fn execute_scoped(&self, sql: &str, params: &[&str]) -> Result<u64> {
        (**self).execute_scoped(sql, params).await
    }
}
