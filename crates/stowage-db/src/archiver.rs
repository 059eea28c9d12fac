//! Table archival orchestration.
//!
//! Drives inspection, reconciliation, statement building and execution for
//! each configured landing table. Every per-table error is caught at the table
//! boundary and recorded in the [`ArchivalReport`]; one bad table never stops
//! the rest unless the caller opts into fail-fast.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future;
use futures::stream::{self, StreamExt};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use stowage_core::{
    logging, ArchivalFailure, ArchivalReport, ArchivalResult, ArchiveSettings, Error, Result,
    Severity, Store, SynthesizedColumns, TableOutcome, TableRef,
};

use crate::executor;
use crate::identifier::validate_table_ref;
use crate::inspector::columns_of;
use crate::reconcile::reconcile;
use crate::statement::build;

/// Orchestrator policy.
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Destination columns filled from a literal rather than copied.
    pub synthesized: SynthesizedColumns,
    /// Executor attempts per table; only execution failures are retried.
    pub max_attempts: u32,
    /// Delay between executor attempts.
    pub retry_backoff: Duration,
    /// Keep going after an error-severity failure.
    pub continue_on_failure: bool,
    /// Tables processed concurrently. Report order is unaffected.
    pub concurrency: usize,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self::from(&ArchiveSettings::default())
    }
}

impl From<&ArchiveSettings> for ArchiveOptions {
    fn from(settings: &ArchiveSettings) -> Self {
        Self {
            synthesized: settings.synthesized_columns.clone(),
            max_attempts: settings.max_attempts.max(1),
            retry_backoff: Duration::from_millis(settings.retry_backoff_ms),
            continue_on_failure: settings.continue_on_failure,
            concurrency: settings.concurrency.max(1),
        }
    }
}

impl ArchiveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_synthesized(mut self, synthesized: SynthesizedColumns) -> Self {
        self.synthesized = synthesized;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_continue_on_failure(mut self, keep_going: bool) -> Self {
        self.continue_on_failure = keep_going;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

/// Archive `configured_tables` from `landing_schema` into `archive_schema`
/// with default options.
pub async fn archive_tables<S: Store + ?Sized>(
    store: &S,
    configured_tables: &[String],
    landing_schema: &str,
    archive_schema: &str,
) -> ArchivalReport {
    TableArchiver::new(store)
        .archive_tables(configured_tables, landing_schema, archive_schema)
        .await
}

/// Copies landing tables into their `archive_` counterparts.
pub struct TableArchiver<S> {
    store: S,
    options: ArchiveOptions,
}

impl<S: Store> TableArchiver<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            options: ArchiveOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ArchiveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    /// Archive every configured table and report one outcome per table, in
    /// configured order.
    ///
    /// With `continue_on_failure` off, no table is started after the first
    /// error-severity failure. Tables already in flight still finish and are
    /// reported, so every committed copy appears in the report.
    #[instrument(
        skip(self, configured_tables),
        fields(subsystem = logging::SUBSYSTEM_ARCHIVE, component = "orchestrator", op = "archive_tables")
    )]
    pub async fn archive_tables(
        &self,
        configured_tables: &[String],
        landing_schema: &str,
        archive_schema: &str,
    ) -> ArchivalReport {
        let run_id = Uuid::now_v7();
        let started_at = Utc::now();
        let start = Instant::now();

        info!(
            run_id = %run_id,
            table_count = configured_tables.len(),
            landing_schema,
            archive_schema,
            concurrency = self.options.concurrency,
            "Starting archive run"
        );

        let stopped = AtomicBool::new(false);
        let mut outcomes = Vec::with_capacity(configured_tables.len());
        let mut pending = stream::iter(configured_tables)
            .take_while(|_| future::ready(!stopped.load(Ordering::SeqCst)))
            .map(|table| self.archive_table(table, landing_schema, archive_schema))
            .buffered(self.options.concurrency);

        while let Some(outcome) = pending.next().await {
            if !self.options.continue_on_failure
                && !stopped.load(Ordering::SeqCst)
                && matches!(&outcome, TableOutcome::Failed(f) if f.severity() == Severity::Error)
            {
                stopped.store(true, Ordering::SeqCst);
                warn!(run_id = %run_id, "Stopping archive run after failure; draining tables in flight");
            }
            outcomes.push(outcome);
        }

        if stopped.load(Ordering::SeqCst) {
            warn!(
                run_id = %run_id,
                skipped = configured_tables.len() - outcomes.len(),
                "Tables not started after failure"
            );
        }

        let report = ArchivalReport {
            run_id,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            outcomes,
        };

        info!(
            run_id = %run_id,
            tables = report.outcomes.len(),
            archived = report.successes().count(),
            failed = report.failures().count(),
            rows_moved = report.total_rows_moved(),
            duration_ms = report.duration_ms,
            "Archive run complete"
        );
        report
    }

    /// Archive one landing table, converting any error into a recorded failure.
    pub async fn archive_table(
        &self,
        table: &str,
        landing_schema: &str,
        archive_schema: &str,
    ) -> TableOutcome {
        let source = TableRef::new(landing_schema, table);
        let destination = source.archive_counterpart(archive_schema);

        match self.try_archive_table(&source, &destination).await {
            Ok(result) => {
                info!(
                    subsystem = logging::SUBSYSTEM_ARCHIVE,
                    component = "orchestrator",
                    source = %result.source,
                    destination = %result.destination,
                    rows_moved = result.rows_moved,
                    attempts = result.attempts,
                    duration_ms = result.duration_ms,
                    "Archived {} rows from {} → {}",
                    result.rows_moved,
                    result.source,
                    result.destination
                );
                TableOutcome::Archived(result)
            }
            Err(err) => {
                let failure = ArchivalFailure::from_error(table, &err);
                match failure.severity() {
                    Severity::Warning => warn!(
                        subsystem = logging::SUBSYSTEM_ARCHIVE,
                        component = "orchestrator",
                        source = %source,
                        destination = %destination,
                        failure_kind = %failure.kind,
                        error = %err,
                        "Skipped {} → {}",
                        source,
                        destination
                    ),
                    Severity::Error => error!(
                        subsystem = logging::SUBSYSTEM_ARCHIVE,
                        component = "orchestrator",
                        source = %source,
                        destination = %destination,
                        failure_kind = %failure.kind,
                        error = %err,
                        "Failed to archive {} → {}",
                        source,
                        destination
                    ),
                }
                TableOutcome::Failed(failure)
            }
        }
    }

    async fn try_archive_table(
        &self,
        source: &TableRef,
        destination: &TableRef,
    ) -> Result<ArchivalResult> {
        let start = Instant::now();

        // Configuration-origin names get the same check as catalog names,
        // before anything reaches the store.
        validate_table_ref(source)?;
        validate_table_ref(destination)?;

        let source_cols = columns_of(&self.store, source).await?;
        if source_cols.is_empty() {
            return Err(Error::SchemaNotFound(source.clone()));
        }
        let destination_cols = columns_of(&self.store, destination).await?;
        if destination_cols.is_empty() {
            return Err(Error::SchemaNotFound(destination.clone()));
        }

        let plan = reconcile(&source_cols, &destination_cols, &self.options.synthesized);
        if plan.is_empty() {
            return Err(Error::EmptyPlan {
                from: source.clone(),
                to: destination.clone(),
            });
        }

        let statement = build(source, destination, &plan)?;

        let mut attempt = 1;
        let rows_moved = loop {
            match executor::execute(&self.store, &statement).await {
                Ok(rows) => break rows,
                Err(err) if attempt < self.options.max_attempts => {
                    warn!(
                        subsystem = logging::SUBSYSTEM_ARCHIVE,
                        component = "orchestrator",
                        destination = %destination,
                        attempt,
                        max_attempts = self.options.max_attempts,
                        error = %err,
                        "Archive attempt failed, retrying"
                    );
                    tokio::time::sleep(self.options.retry_backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        };

        Ok(ArchivalResult {
            source: source.clone(),
            destination: destination.clone(),
            rows_moved,
            attempts: attempt,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::MemoryStore;
    use stowage_core::{default_synthesized_columns, FailureKind, TimeLiteral};

    fn tables(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn failure(outcome: &TableOutcome) -> &ArchivalFailure {
        match outcome {
            TableOutcome::Failed(f) => f,
            TableOutcome::Archived(r) => panic!("Expected failure, got {:?}", r),
        }
    }

    fn success(outcome: &TableOutcome) -> &ArchivalResult {
        match outcome {
            TableOutcome::Archived(r) => r,
            TableOutcome::Failed(f) => panic!("Expected success, got {:?}", f),
        }
    }

    fn orders_store() -> MemoryStore {
        MemoryStore::new()
            .with_table("landing", "orders", &["id", "amount"], 3)
            .with_table("archive", "archive_orders", &["id", "amount", "archived_at"], 0)
    }

    #[tokio::test]
    async fn test_archives_orders_into_prefixed_table() {
        let store = orders_store();
        let report = archive_tables(&store, &tables(&["orders"]), "landing", "archive").await;

        assert_eq!(report.outcomes.len(), 1);
        let result = success(&report.outcomes[0]);
        assert_eq!(result.source, TableRef::new("landing", "orders"));
        assert_eq!(result.destination, TableRef::new("archive", "archive_orders"));
        assert_eq!(result.rows_moved, 3);
        assert_eq!(result.attempts, 1);

        assert_eq!(
            store.executed(),
            vec![
                "INSERT INTO \"archive\".\"archive_orders\" (\"id\", \"amount\", \"archived_at\") \
                 SELECT \"id\", \"amount\", CURRENT_TIMESTAMP FROM \"landing\".\"orders\""
                    .to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_inspects_source_before_destination() {
        let store = orders_store();
        archive_tables(&store, &tables(&["orders"]), "landing", "archive").await;

        let fetched: Vec<Vec<String>> = store.fetches().into_iter().map(|(_, p)| p).collect();
        assert_eq!(
            fetched,
            vec![
                vec!["landing".to_string(), "orders".to_string()],
                vec!["archive".to_string(), "archive_orders".to_string()],
            ]
        );
    }

    #[tokio::test]
    async fn test_repeated_runs_append_duplicates() {
        let store = orders_store();
        let configured = tables(&["orders"]);

        let first = archive_tables(&store, &configured, "landing", "archive").await;
        let second = archive_tables(&store, &configured, "landing", "archive").await;

        assert_eq!(first.total_rows_moved(), 3);
        assert_eq!(second.total_rows_moved(), 3);
        assert_eq!(store.row_count("archive", "archive_orders"), 6);
        assert_ne!(first.run_id, second.run_id);
    }

    #[tokio::test]
    async fn test_inspection_failure_does_not_stop_next_table() {
        let store = orders_store()
            .with_table("landing", "users", &["id"], 2)
            .with_table("archive", "archive_users", &["id", "archived_at"], 0)
            .failing_inspection("landing", "users");

        let report = archive_tables(
            &store,
            &tables(&["users", "orders"]),
            "landing",
            "archive",
        )
        .await;

        assert_eq!(report.outcomes.len(), 2);
        let f = failure(&report.outcomes[0]);
        assert_eq!(f.table, "users");
        assert_eq!(f.kind, FailureKind::Inspection);
        assert_eq!(success(&report.outcomes[1]).rows_moved, 3);
        assert!(report.has_failures());
    }

    #[tokio::test]
    async fn test_unsafe_table_name_never_reaches_store() {
        let store = orders_store();
        let report = archive_tables(
            &store,
            &tables(&["orders; DROP TABLE x", "orders"]),
            "landing",
            "archive",
        )
        .await;

        assert_eq!(failure(&report.outcomes[0]).kind, FailureKind::UnsafeIdentifier);
        assert_eq!(success(&report.outcomes[1]).rows_moved, 3);

        for (_, params) in store.fetches() {
            assert!(!params.iter().any(|p| p.contains("DROP")));
        }
        assert!(store.executed().iter().all(|sql| !sql.contains("DROP")));
    }

    #[tokio::test]
    async fn test_unsafe_schema_rejected() {
        let store = orders_store();
        let report = archive_tables(&store, &tables(&["orders"]), "landing", "pg_catalog").await;
        assert_eq!(failure(&report.outcomes[0]).kind, FailureKind::UnsafeIdentifier);
        assert!(store.fetches().is_empty());
    }

    #[tokio::test]
    async fn test_missing_source_is_schema_not_found() {
        let store = MemoryStore::new().with_table("archive", "archive_ghost", &["id"], 0);
        let report = archive_tables(&store, &tables(&["ghost"]), "landing", "archive").await;

        let f = failure(&report.outcomes[0]);
        assert_eq!(f.kind, FailureKind::SchemaNotFound);
        assert_eq!(f.severity(), Severity::Warning);
        assert!(f.message.contains("landing.ghost"));
        assert!(store.executed().is_empty());
    }

    #[tokio::test]
    async fn test_missing_destination_is_schema_not_found() {
        let store = MemoryStore::new().with_table("landing", "orders", &["id"], 1);
        let report = archive_tables(&store, &tables(&["orders"]), "landing", "archive").await;

        let f = failure(&report.outcomes[0]);
        assert_eq!(f.kind, FailureKind::SchemaNotFound);
        assert!(f.message.contains("archive.archive_orders"));
    }

    #[tokio::test]
    async fn test_disjoint_columns_is_empty_plan() {
        let store = MemoryStore::new()
            .with_table("landing", "events", &["a", "b"], 4)
            .with_table("archive", "archive_events", &["c", "d"], 0);
        let report = archive_tables(&store, &tables(&["events"]), "landing", "archive").await;

        assert_eq!(failure(&report.outcomes[0]).kind, FailureKind::EmptyPlan);
        assert!(store.executed().is_empty());
    }

    #[tokio::test]
    async fn test_execution_failure_recorded_and_run_continues() {
        let store = orders_store()
            .with_table("landing", "users", &["id"], 2)
            .with_table("archive", "archive_users", &["id"], 0)
            .failing_execution("archive", "archive_orders", 1);

        let report = archive_tables(
            &store,
            &tables(&["orders", "users"]),
            "landing",
            "archive",
        )
        .await;

        assert_eq!(failure(&report.outcomes[0]).kind, FailureKind::ArchivalExecution);
        assert_eq!(success(&report.outcomes[1]).rows_moved, 2);
        assert_eq!(store.row_count("archive", "archive_orders"), 0);
    }

    #[tokio::test]
    async fn test_retry_recovers_execution_failure() {
        let store = orders_store().failing_execution("archive", "archive_orders", 2);
        let archiver = TableArchiver::new(&store).with_options(
            ArchiveOptions::new()
                .with_max_attempts(3)
                .with_retry_backoff(Duration::from_millis(1)),
        );

        let report = archiver
            .archive_tables(&tables(&["orders"]), "landing", "archive")
            .await;

        let result = success(&report.outcomes[0]);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.rows_moved, 3);
        assert_eq!(store.executed().len(), 3);
    }

    #[tokio::test]
    async fn test_retry_not_applied_to_warnings() {
        let store = MemoryStore::new();
        let archiver = TableArchiver::new(&store)
            .with_options(ArchiveOptions::new().with_max_attempts(5));

        let report = archiver
            .archive_tables(&tables(&["ghost"]), "landing", "archive")
            .await;
        assert_eq!(failure(&report.outcomes[0]).kind, FailureKind::SchemaNotFound);
        assert_eq!(store.fetches().len(), 1);
    }

    #[tokio::test]
    async fn test_fail_fast_stops_after_error() {
        let store = orders_store()
            .with_table("landing", "users", &["id"], 2)
            .with_table("archive", "archive_users", &["id"], 0)
            .failing_inspection("landing", "orders");
        let archiver = TableArchiver::new(&store)
            .with_options(ArchiveOptions::new().with_continue_on_failure(false));

        let report = archiver
            .archive_tables(&tables(&["orders", "users"]), "landing", "archive")
            .await;

        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(store.row_count("archive", "archive_users"), 0);
    }

    #[tokio::test]
    async fn test_fail_fast_reports_tables_already_in_flight() {
        let store = MemoryStore::new()
            .with_table("landing", "a", &["id"], 1)
            .with_table("archive", "archive_a", &["id"], 0)
            .with_table("landing", "b", &["id"], 5)
            .with_table("archive", "archive_b", &["id"], 0)
            .with_table("landing", "c", &["id"], 2)
            .with_table("archive", "archive_c", &["id"], 0)
            .with_inspection_delay("landing", "a", Duration::from_millis(50))
            .failing_inspection("landing", "a");
        let archiver = TableArchiver::new(&store).with_options(
            ArchiveOptions::new()
                .with_continue_on_failure(false)
                .with_concurrency(2),
        );

        let report = archiver
            .archive_tables(&tables(&["a", "b", "c"]), "landing", "archive")
            .await;

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(failure(&report.outcomes[0]).kind, FailureKind::Inspection);
        assert_eq!(success(&report.outcomes[1]).rows_moved, 5);
        assert_eq!(report.total_rows_moved(), store.row_count("archive", "archive_b"));
        assert_eq!(store.row_count("archive", "archive_c"), 0);
    }

    #[tokio::test]
    async fn test_fail_fast_ignores_warnings() {
        let store = orders_store();
        let archiver = TableArchiver::new(&store)
            .with_options(ArchiveOptions::new().with_continue_on_failure(false));

        let report = archiver
            .archive_tables(&tables(&["ghost", "orders"]), "landing", "archive")
            .await;

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(success(&report.outcomes[1]).rows_moved, 3);
    }

    #[tokio::test]
    async fn test_concurrent_run_preserves_order() {
        let mut store = MemoryStore::new();
        let names: Vec<String> = (0..8).map(|i| format!("t{}", i)).collect();
        for (i, name) in names.iter().enumerate() {
            store = store
                .with_table("landing", name, &["id"], i as u64)
                .with_table("archive", &format!("archive_{}", name), &["id"], 0);
        }
        let archiver =
            TableArchiver::new(&store).with_options(ArchiveOptions::new().with_concurrency(4));

        let report = archiver.archive_tables(&names, "landing", "archive").await;

        assert_eq!(report.outcomes.len(), 8);
        for (i, outcome) in report.outcomes.iter().enumerate() {
            let result = success(outcome);
            assert_eq!(result.source.name(), names[i]);
            assert_eq!(result.rows_moved, i as u64);
        }
    }

    #[tokio::test]
    async fn test_custom_synthesized_columns() {
        let store = MemoryStore::new()
            .with_table("landing", "orders", &["id"], 1)
            .with_table("archive", "archive_orders", &["id", "archived_on"], 0);
        let archiver = TableArchiver::new(&store).with_options(
            ArchiveOptions::new()
                .with_synthesized(vec![("archived_on".to_string(), TimeLiteral::CurrentDate)]),
        );

        archiver
            .archive_tables(&tables(&["orders"]), "landing", "archive")
            .await;
        assert!(store.executed()[0].contains("SELECT \"id\", CURRENT_DATE FROM"));
    }

    #[tokio::test]
    async fn test_empty_table_list() {
        let store = MemoryStore::new();
        let report = archive_tables(&store, &[], "landing", "archive").await;
        assert!(report.outcomes.is_empty());
        assert!(!report.has_failures());
    }

    #[test]
    fn test_options_from_settings() {
        let settings = ArchiveSettings {
            max_attempts: 0,
            retry_backoff_ms: 250,
            continue_on_failure: false,
            concurrency: 0,
            synthesized_columns: default_synthesized_columns(),
        };
        let options = ArchiveOptions::from(&settings);
        assert_eq!(options.max_attempts, 1);
        assert_eq!(options.concurrency, 1);
        assert_eq!(options.retry_backoff, Duration::from_millis(250));
        assert!(!options.continue_on_failure);
    }
}
