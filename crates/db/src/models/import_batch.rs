//! Import batch models.
//!
//! One row per import request, carrying the counters and the embedded
//! per-row report so batch history survives the request that produced it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use poflow_core::batch::BatchResult;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `import_batches` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBatch {
    pub id: Uuid,
    pub file_name: Option<String>,
    pub file_kind: Option<String>,
    pub total_rows: i32,
    pub success_count: i32,
    pub failure_count: i32,
    pub status: String,
    pub processing_time_ms: i64,
    pub report: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

/// DTO for recording a finished batch.
#[derive(Debug, Clone)]
pub struct NewImportBatch {
    pub id: Uuid,
    pub file_name: Option<String>,
    pub file_kind: Option<String>,
    pub total_rows: i32,
    pub success_count: i32,
    pub failure_count: i32,
    pub status: String,
    pub processing_time_ms: i64,
    pub report: serde_json::Value,
}

impl NewImportBatch {
    /// Build the record from a finished [`BatchResult`].
    pub fn from_result(result: &BatchResult, file_name: &str, file_kind: &str) -> Self {
        Self {
            id: result.batch_id,
            file_name: Some(file_name.to_string()),
            file_kind: Some(file_kind.to_string()),
            total_rows: result.total_rows as i32,
            success_count: result.success_count as i32,
            failure_count: result.failure_count as i32,
            status: result.status.as_str().to_string(),
            processing_time_ms: result.processing_time_ms as i64,
            report: serde_json::to_value(&result.per_row_errors)
                .unwrap_or(serde_json::Value::Null),
        }
    }
}
