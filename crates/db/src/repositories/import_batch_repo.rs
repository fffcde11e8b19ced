//! Repository for the `import_batches` table.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::import_batch::{ImportBatch, NewImportBatch};

const COLUMNS: &str = "\
    id, file_name, file_kind, total_rows, success_count, failure_count, \
    status, processing_time_ms, report, created_at";

/// Batch history: one record per import request.
pub struct ImportBatchRepo;

impl ImportBatchRepo {
    /// Record a finished batch.
    pub async fn insert(pool: &PgPool, new: &NewImportBatch) -> Result<ImportBatch, sqlx::Error> {
        let query = format!(
            "INSERT INTO import_batches
                (id, file_name, file_kind, total_rows, success_count,
                 failure_count, status, processing_time_ms, report)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImportBatch>(&query)
            .bind(new.id)
            .bind(&new.file_name)
            .bind(&new.file_kind)
            .bind(new.total_rows)
            .bind(new.success_count)
            .bind(new.failure_count)
            .bind(&new.status)
            .bind(new.processing_time_ms)
            .bind(&new.report)
            .fetch_one(pool)
            .await
    }

    /// Find a batch by its identifier.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<ImportBatch>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM import_batches WHERE id = $1");
        sqlx::query_as::<_, ImportBatch>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List recent batches, newest first.
    pub async fn list_recent(pool: &PgPool, limit: i64) -> Result<Vec<ImportBatch>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM import_batches
             ORDER BY created_at DESC
             LIMIT $1"
        );
        sqlx::query_as::<_, ImportBatch>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
