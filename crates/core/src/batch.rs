//! Chunked, failure-isolated batch persistence.
//!
//! The orchestrator takes validated rows and drives them through an
//! abstract [`RowPersistence`] collaborator: rows sharing a natural key
//! are merged first, then the working set is split into sequential
//! chunks whose rows persist concurrently. One row's failure never
//! affects another row's success, and there is no global rollback --
//! chunks already processed keep their results. There are no retries; a
//! failed row stays failed for that batch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::mapping::FieldMapping;
use crate::row::{ImportRow, IssueSeverity, RowIssue, RowStatus};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default number of rows persisted concurrently per chunk.
pub const DEFAULT_BATCH_SIZE: usize = 50;

// ---------------------------------------------------------------------------
// Persistence collaborator
// ---------------------------------------------------------------------------

/// Failure classes reported by the persistence collaborator.
///
/// `Unavailable` is the collaborator-level fault (connection refused,
/// pool exhausted): it is not isolated to one row, so the orchestrator
/// marks the entire current chunk with a transaction-scoped error.
#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    #[error("duplicate natural key: {0}")]
    Duplicate(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("persistence unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

/// Result of persisting one row.
#[derive(Debug, Clone, Copy)]
pub struct PersistedRow {
    pub id: Uuid,
    /// False when an existing record was updated in place.
    pub created: bool,
}

/// External persistence engine, one independent call per row.
#[async_trait]
pub trait RowPersistence: Send + Sync {
    async fn persist(
        &self,
        data: &IndexMap<String, serde_json::Value>,
        update_if_exists: bool,
    ) -> Result<PersistedRow, PersistenceError>;
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Caller-facing import options.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Explicit mapping; when `None` and auto-detection is enabled the
    /// engine builds one from the file headers.
    pub mapping: Option<FieldMapping>,
    pub auto_detect_mapping: bool,
    /// Exclude rows already flagged `Error` from the working set. Off by
    /// default: warnings and all are attempted -- the lenient policy.
    pub skip_on_error: bool,
    /// Update an existing record on natural-key collision instead of
    /// failing the row.
    pub update_if_exists: bool,
    pub batch_size: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            mapping: None,
            auto_detect_mapping: true,
            skip_on_error: false,
            update_if_exists: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// Batch result
// ---------------------------------------------------------------------------

/// Terminal batch status, derived from the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Success,
    Partial,
    Failed,
}

impl BatchStatus {
    /// `Failed` when nothing succeeded and something failed; `Partial`
    /// when both counters are non-zero; `Success` otherwise.
    pub fn derive(success_count: usize, failure_count: usize) -> Self {
        match (success_count, failure_count) {
            (0, f) if f > 0 => Self::Failed,
            (s, f) if s > 0 && f > 0 => Self::Partial,
            _ => Self::Success,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

/// Diagnostics for one row, folded into the batch report. Rows with
/// warnings are included alongside hard failures so degraded data is
/// visible, not just dropped rows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowErrorReport {
    pub row_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natural_key: Option<String>,
    pub errors: Vec<RowIssue>,
}

/// The structured report returned for every import, even when most rows
/// failed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub batch_id: Uuid,
    pub total_rows: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub status: BatchStatus,
    pub created_ids: Vec<Uuid>,
    pub per_row_errors: Vec<RowErrorReport>,
    pub processing_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Deduplication
// ---------------------------------------------------------------------------

/// Merge rows sharing a composite natural key, later rows overwriting
/// earlier ones field-by-field for any non-empty value. The surviving
/// row keeps the first occurrence's index; merged-away rows are excluded
/// from both batch counters.
pub fn dedupe_rows(rows: Vec<ImportRow>) -> Vec<ImportRow> {
    let mut by_key: IndexMap<String, usize> = IndexMap::new();
    let mut out: Vec<ImportRow> = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(key) = row.natural_key() else {
            out.push(row);
            continue;
        };

        match by_key.get(&key) {
            Some(&target_index) => {
                let target = &mut out[target_index];
                for (field, value) in row.data {
                    if json_value_is_empty(&value) {
                        continue;
                    }
                    target.data.insert(field, value);
                }
                target.errors.extend(row.errors);
                if target.status == RowStatus::Success && !target.errors.is_empty() {
                    target.status = RowStatus::Warning;
                }
            }
            None => {
                by_key.insert(key, out.len());
                out.push(row);
            }
        }
    }

    out
}

fn json_value_is_empty(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Drive the working row set through persistence and assemble the batch
/// report.
///
/// Chunks run strictly sequentially; rows within a chunk run
/// concurrently, bounding simultaneous persistence calls to
/// `batch_size`. Triggering `cancel` stops further chunks from being
/// scheduled while the in-flight chunk finishes. Never returns an error
/// for row-level problems -- fatal input conditions are the caller's to
/// raise before this point.
pub async fn run_batch(
    batch_id: Uuid,
    rows: Vec<ImportRow>,
    options: &ImportOptions,
    persistence: &dyn RowPersistence,
    cancel: &CancellationToken,
) -> BatchResult {
    let started = std::time::Instant::now();
    let total_rows = rows.len();

    let mut working = dedupe_rows(rows);
    if options.skip_on_error {
        working.retain(|row| row.status != RowStatus::Error);
    }

    let batch_size = options.batch_size.max(1);
    let mut processed: Vec<ImportRow> = Vec::with_capacity(working.len());
    let mut success_count = 0usize;
    let mut failure_count = 0usize;
    let mut created_ids: Vec<Uuid> = Vec::new();

    let mut remaining = working;
    while !remaining.is_empty() {
        if cancel.is_cancelled() {
            break;
        }

        let take = batch_size.min(remaining.len());
        let chunk: Vec<ImportRow> = remaining.drain(..take).collect();

        let outcomes = join_all(
            chunk
                .iter()
                .map(|row| persistence.persist(&row.data, options.update_if_exists)),
        )
        .await;

        let chunk_fault = outcomes
            .iter()
            .any(|o| matches!(o, Err(PersistenceError::Unavailable(_))));

        for (mut row, outcome) in chunk.into_iter().zip(outcomes) {
            if chunk_fault {
                row.push_issue(
                    "transaction",
                    "chunk aborted: persistence unavailable".to_string(),
                    IssueSeverity::Error,
                );
                row.status = RowStatus::Error;
                failure_count += 1;
            } else {
                match outcome {
                    Ok(persisted) => {
                        row.persisted_id = Some(persisted.id);
                        row.status = RowStatus::Success;
                        success_count += 1;
                        if persisted.created {
                            created_ids.push(persisted.id);
                        }
                    }
                    Err(err) => {
                        row.push_issue("general", err.to_string(), IssueSeverity::Error);
                        row.status = RowStatus::Error;
                        failure_count += 1;
                    }
                }
            }
            processed.push(row);
        }
    }

    let per_row_errors = processed
        .iter()
        .filter(|row| !row.errors.is_empty())
        .map(|row| RowErrorReport {
            row_index: row.row_index,
            natural_key: row.natural_key(),
            errors: row.errors.clone(),
        })
        .collect();

    BatchResult {
        batch_id,
        total_rows,
        success_count,
        failure_count,
        status: BatchStatus::derive(success_count, failure_count),
        created_ids,
        per_row_errors,
        processing_time_ms: started.elapsed().as_millis() as u64,
        timestamp: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn make_row(index: usize, po_no: &str, gst_no: &str) -> ImportRow {
        let mut data = IndexMap::new();
        data.insert("poNo".to_string(), serde_json::json!(po_no));
        if !gst_no.is_empty() {
            data.insert("gstNo".to_string(), serde_json::json!(gst_no));
        }
        ImportRow {
            row_index: index,
            data,
            errors: Vec::new(),
            status: RowStatus::Success,
            persisted_id: None,
        }
    }

    /// In-memory persistence double: remembers seen natural keys, fails
    /// configured order numbers, and tracks peak concurrency.
    #[derive(Default)]
    struct MockPersistence {
        existing: Mutex<HashSet<String>>,
        fail_po_nos: HashSet<String>,
        unavailable: bool,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl MockPersistence {
        fn with_existing(keys: &[&str]) -> Self {
            Self {
                existing: Mutex::new(keys.iter().map(|s| s.to_string()).collect()),
                ..Default::default()
            }
        }

        fn failing(po_nos: &[&str]) -> Self {
            Self {
                fail_po_nos: po_nos.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl RowPersistence for MockPersistence {
        async fn persist(
            &self,
            data: &IndexMap<String, serde_json::Value>,
            update_if_exists: bool,
        ) -> Result<PersistedRow, PersistenceError> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.unavailable {
                return Err(PersistenceError::Unavailable("pool closed".to_string()));
            }

            let po_no = data
                .get("poNo")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            if self.fail_po_nos.contains(&po_no) {
                return Err(PersistenceError::Constraint(format!("rejected {po_no}")));
            }

            let mut existing = self.existing.lock().unwrap();
            if existing.contains(&po_no) {
                if update_if_exists {
                    return Ok(PersistedRow {
                        id: Uuid::new_v4(),
                        created: false,
                    });
                }
                return Err(PersistenceError::Duplicate(po_no));
            }
            existing.insert(po_no);
            Ok(PersistedRow {
                id: Uuid::new_v4(),
                created: true,
            })
        }
    }

    fn options() -> ImportOptions {
        ImportOptions::default()
    }

    // -- status derivation ---------------------------------------------------

    #[test]
    fn status_derivation_matrix() {
        assert_eq!(BatchStatus::derive(3, 0), BatchStatus::Success);
        assert_eq!(BatchStatus::derive(0, 0), BatchStatus::Success);
        assert_eq!(BatchStatus::derive(2, 1), BatchStatus::Partial);
        assert_eq!(BatchStatus::derive(0, 4), BatchStatus::Failed);
    }

    // -- dedupe --------------------------------------------------------------

    #[test]
    fn dedupe_merges_last_non_empty_wins() {
        let mut first = make_row(1, "PO1", "G1");
        first
            .data
            .insert("city".to_string(), serde_json::json!("Pune"));
        let mut second = make_row(3, "PO1", "G1");
        second
            .data
            .insert("city".to_string(), serde_json::json!("Mumbai"));
        second
            .data
            .insert("state".to_string(), serde_json::json!(""));

        let deduped = dedupe_rows(vec![first, second]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].row_index, 1);
        assert_eq!(deduped[0].data["city"], serde_json::json!("Mumbai"));
        // Empty values never overwrite.
        assert!(!deduped[0].data.contains_key("state"));
    }

    #[test]
    fn dedupe_keeps_rows_without_natural_key() {
        let mut keyless = make_row(1, "PO1", "");
        keyless.data.shift_remove("poNo");
        let deduped = dedupe_rows(vec![keyless.clone(), keyless]);
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn different_gst_is_a_different_key() {
        let deduped = dedupe_rows(vec![make_row(1, "PO1", "G1"), make_row(2, "PO1", "G2")]);
        assert_eq!(deduped.len(), 2);
    }

    // -- run_batch -----------------------------------------------------------

    #[tokio::test]
    async fn all_rows_succeed() {
        let persistence = MockPersistence::default();
        let rows = vec![make_row(1, "PO1", "G"), make_row(2, "PO2", "G")];

        let result = run_batch(
            Uuid::new_v4(),
            rows,
            &options(),
            &persistence,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.total_rows, 2);
        assert_eq!(result.success_count, 2);
        assert_eq!(result.failure_count, 0);
        assert_eq!(result.status, BatchStatus::Success);
        assert_eq!(result.created_ids.len(), 2);
        assert!(result.per_row_errors.is_empty());
    }

    #[tokio::test]
    async fn one_failed_row_leaves_others_unaffected() {
        let persistence = MockPersistence::failing(&["PO2"]);
        let rows = vec![
            make_row(1, "PO1", "G"),
            make_row(2, "PO2", "G"),
            make_row(3, "PO3", "G"),
        ];

        let result = run_batch(
            Uuid::new_v4(),
            rows,
            &options(),
            &persistence,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.success_count, 2);
        assert_eq!(result.failure_count, 1);
        assert_eq!(result.status, BatchStatus::Partial);
        assert_eq!(result.per_row_errors.len(), 1);
        assert_eq!(result.per_row_errors[0].row_index, 2);
    }

    #[tokio::test]
    async fn duplicate_without_update_flag_fails_only_that_row() {
        let persistence = MockPersistence::with_existing(&["PO1"]);
        let rows = vec![make_row(1, "PO1", "G"), make_row(2, "PO2", "G")];

        let result = run_batch(
            Uuid::new_v4(),
            rows,
            &options(),
            &persistence,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.failure_count, 1);
        assert_eq!(result.success_count, 1);
        let report = &result.per_row_errors[0];
        assert_eq!(report.errors[0].field, "general");
        assert_eq!(report.errors[0].severity, IssueSeverity::Error);
    }

    #[tokio::test]
    async fn duplicate_with_update_flag_updates_in_place() {
        let persistence = MockPersistence::with_existing(&["PO1"]);
        let rows = vec![make_row(1, "PO1", "G")];

        let mut opts = options();
        opts.update_if_exists = true;
        let result = run_batch(
            Uuid::new_v4(),
            rows,
            &opts,
            &persistence,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.success_count, 1);
        // Updated records do not appear in created_ids.
        assert!(result.created_ids.is_empty());
    }

    #[tokio::test]
    async fn warning_rows_are_attempted_and_reported() {
        let persistence = MockPersistence::default();
        let mut row = make_row(1, "PO1", "G");
        row.push_issue(
            "poQty",
            "could not be read as number; kept as text".to_string(),
            IssueSeverity::Warning,
        );
        row.status = RowStatus::Warning;

        let result = run_batch(
            Uuid::new_v4(),
            vec![row],
            &options(),
            &persistence,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.success_count, 1);
        assert_eq!(result.status, BatchStatus::Success);
        // Degraded data stays visible in the report.
        assert_eq!(result.per_row_errors.len(), 1);
    }

    #[tokio::test]
    async fn skip_on_error_excludes_rows_from_both_counters() {
        let persistence = MockPersistence::default();
        let mut bad = make_row(2, "PO2", "G");
        bad.status = RowStatus::Error;

        let mut opts = options();
        opts.skip_on_error = true;
        let result = run_batch(
            Uuid::new_v4(),
            vec![make_row(1, "PO1", "G"), bad],
            &opts,
            &persistence,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.total_rows, 2);
        assert_eq!(result.success_count, 1);
        assert_eq!(result.failure_count, 0);
        assert!(result.success_count + result.failure_count <= result.total_rows);
    }

    #[tokio::test]
    async fn chunk_fault_marks_whole_chunk_transaction_scoped() {
        let persistence = MockPersistence {
            unavailable: true,
            ..Default::default()
        };
        let rows = vec![make_row(1, "PO1", "G"), make_row(2, "PO2", "G")];

        let result = run_batch(
            Uuid::new_v4(),
            rows,
            &options(),
            &persistence,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.failure_count, 2);
        assert_eq!(result.status, BatchStatus::Failed);
        for report in &result.per_row_errors {
            assert_eq!(report.errors[0].field, "transaction");
        }
    }

    #[tokio::test]
    async fn cancellation_stops_scheduling_further_chunks() {
        let persistence = MockPersistence::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = run_batch(
            Uuid::new_v4(),
            vec![make_row(1, "PO1", "G")],
            &options(),
            &persistence,
            &cancel,
        )
        .await;

        // Nothing attempted: neither counter moves.
        assert_eq!(result.success_count, 0);
        assert_eq!(result.failure_count, 0);
        assert_eq!(result.status, BatchStatus::Success);
    }

    #[tokio::test]
    async fn chunking_bounds_concurrency() {
        let persistence = MockPersistence::default();
        let rows: Vec<ImportRow> = (1..=10)
            .map(|i| make_row(i, &format!("PO{i}"), "G"))
            .collect();

        let mut opts = options();
        opts.batch_size = 3;
        let result = run_batch(
            Uuid::new_v4(),
            rows,
            &opts,
            &persistence,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.success_count, 10);
        assert!(persistence.peak_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn deduped_rows_satisfy_counter_invariant() {
        let persistence = MockPersistence::default();
        let rows = vec![
            make_row(1, "PO1", "G"),
            make_row(2, "PO1", "G"), // merged into row 1
            make_row(3, "PO2", "G"),
        ];

        let result = run_batch(
            Uuid::new_v4(),
            rows,
            &options(),
            &persistence,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.total_rows, 3);
        assert_eq!(result.success_count, 2);
        assert!(result.success_count + result.failure_count <= result.total_rows);
    }
}
