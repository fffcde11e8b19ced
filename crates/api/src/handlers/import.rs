//! Handlers for the purchase-order import endpoints.
//!
//! Provides the multipart import entry point plus the two dry-run
//! helpers the upload UI uses before committing: mapping detection from
//! a header row, and mapping testing against sample rows without
//! persistence. Batch history rounds out the set.

use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use poflow_core::batch::{self, BatchResult, ImportOptions};
use poflow_core::error::ParseError;
use poflow_core::mapping::{self, FieldMapping};
use poflow_core::normalize::CellValue;
use poflow_core::row::{self, ImportRow, RowStatus};

use poflow_db::models::import_batch::{ImportBatch, NewImportBatch};
use poflow_db::repositories::ImportBatchRepo;
use poflow_db::writer::PurchaseOrderWriter;

use crate::error::{AppError, AppResult};
use crate::parse::{self, FileKind};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query / request / response types
// ---------------------------------------------------------------------------

/// Import options carried as query parameters (camelCase, matching the
/// frontend contract).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportParams {
    pub skip_on_error: Option<bool>,
    pub update_if_exists: Option<bool>,
    pub auto_detect_mapping: Option<bool>,
    pub batch_size: Option<usize>,
}

impl ImportParams {
    fn into_options(self, mapping: Option<FieldMapping>) -> ImportOptions {
        let defaults = ImportOptions::default();
        ImportOptions {
            mapping,
            auto_detect_mapping: self.auto_detect_mapping.unwrap_or(defaults.auto_detect_mapping),
            skip_on_error: self.skip_on_error.unwrap_or(defaults.skip_on_error),
            update_if_exists: self.update_if_exists.unwrap_or(defaults.update_if_exists),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
        }
    }
}

/// Request body for mapping detection.
#[derive(Debug, Deserialize)]
pub struct DetectMappingRequest {
    pub headers: Vec<String>,
}

/// Detected mapping plus its coverage ratio.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectMappingResponse {
    pub mapping: FieldMapping,
    pub confidence: f64,
}

/// Request body for the dry-run mapping test.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMappingRequest {
    /// Sample rows as raw JSON objects (header → value).
    pub rows: Vec<indexmap::IndexMap<String, serde_json::Value>>,
    /// Explicit mapping; detected from the sample keys when omitted.
    pub mapping: Option<FieldMapping>,
}

/// Dry-run outcome: validated rows plus a summary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMappingResponse {
    pub validated_rows: Vec<ImportRow>,
    pub summary: TestMappingSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMappingSummary {
    pub total: usize,
    pub valid: usize,
    pub errors: usize,
}

#[derive(Debug, Deserialize)]
pub struct BatchHistoryParams {
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// POST /api/v1/purchase-orders/import
///
/// Multipart upload: the file part supplies the bytes (kind derived from
/// the filename extension), an optional `mapping` part supplies an
/// explicit field mapping as JSON. Options ride in the query string.
/// Always answers with a complete batch report; only structurally
/// unusable input is rejected outright.
pub async fn import(
    State(state): State<AppState>,
    Query(params): Query<ImportParams>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<BatchResult>>)> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut explicit_mapping: Option<FieldMapping> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "mapping" {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            let parsed: FieldMapping = serde_json::from_slice(&bytes)
                .map_err(|e| AppError::BadRequest(format!("invalid mapping JSON: {e}")))?;
            if !parsed.is_empty() {
                explicit_mapping = Some(parsed);
            }
        } else {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            upload = Some((file_name, bytes.to_vec()));
        }
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| AppError::BadRequest("no file part in upload".to_string()))?;

    let extension = file_name.rsplit('.').next().unwrap_or_default();
    let kind = FileKind::from_extension(extension).ok_or_else(|| {
        AppError::BadRequest(format!("unsupported file extension '{extension}'"))
    })?;

    let parsed = parse::parse_bytes(&bytes, kind)?;
    let options = params.into_options(explicit_mapping);
    let mapping = resolve_mapping(&parsed.headers, &options)?;

    let rows: Vec<ImportRow> = parsed
        .rows
        .iter()
        .enumerate()
        .map(|(index, raw)| row::validate_row(index + 1, raw, &mapping))
        .collect();

    let batch_id = Uuid::new_v4();
    let writer = PurchaseOrderWriter::new(state.pool.clone(), batch_id);
    let cancel = CancellationToken::new();

    tracing::info!(
        batch_id = %batch_id,
        file = %file_name,
        kind = kind.as_str(),
        rows = rows.len(),
        mapped_fields = mapping.len(),
        "starting import batch"
    );

    let result = batch::run_batch(batch_id, rows, &options, &writer, &cancel).await;

    tracing::info!(
        batch_id = %batch_id,
        status = result.status.as_str(),
        success = result.success_count,
        failed = result.failure_count,
        elapsed_ms = result.processing_time_ms,
        "import batch finished"
    );

    ImportBatchRepo::insert(
        &state.pool,
        &NewImportBatch::from_result(&result, &file_name, kind.as_str()),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: result })))
}

/// Resolve the mapping for an import: the explicit one wins; otherwise
/// auto-detect from the headers unless disabled. An empty outcome is the
/// fatal no-mapping condition.
fn resolve_mapping(headers: &[String], options: &ImportOptions) -> Result<FieldMapping, AppError> {
    let mapping = match &options.mapping {
        Some(explicit) => explicit.clone(),
        None if options.auto_detect_mapping => mapping::detect_mapping(headers),
        None => FieldMapping::new(),
    };

    if !mapping::is_usable(&mapping) {
        return Err(ParseError::NoMapping.into());
    }
    Ok(mapping)
}

// ---------------------------------------------------------------------------
// Mapping detection (dry run)
// ---------------------------------------------------------------------------

/// POST /api/v1/purchase-orders/import/detect-mapping
///
/// Preview which canonical fields a header row resolves to, with a
/// coverage ratio, before committing to an import.
pub async fn detect_mapping(
    Json(body): Json<DetectMappingRequest>,
) -> AppResult<Json<DataResponse<DetectMappingResponse>>> {
    let mapping = mapping::detect_mapping(&body.headers);
    let confidence = mapping::mapping_confidence(&mapping, body.headers.len());

    Ok(Json(DataResponse {
        data: DetectMappingResponse {
            mapping,
            confidence,
        },
    }))
}

// ---------------------------------------------------------------------------
// Mapping test (dry run)
// ---------------------------------------------------------------------------

/// POST /api/v1/purchase-orders/import/test-mapping
///
/// Run the row validator over sample rows without touching persistence.
pub async fn test_mapping(
    Json(body): Json<TestMappingRequest>,
) -> AppResult<Json<DataResponse<TestMappingResponse>>> {
    let mapping = match body.mapping.filter(|m| !m.is_empty()) {
        Some(explicit) => explicit,
        None => {
            // Detect from the union of sample keys, in first-seen order.
            let mut headers: Vec<String> = Vec::new();
            for sample in &body.rows {
                for key in sample.keys() {
                    if !headers.contains(key) {
                        headers.push(key.clone());
                    }
                }
            }
            mapping::detect_mapping(&headers)
        }
    };

    if !mapping::is_usable(&mapping) {
        return Err(ParseError::NoMapping.into());
    }

    let validated_rows: Vec<ImportRow> = body
        .rows
        .iter()
        .enumerate()
        .map(|(index, sample)| {
            let raw: poflow_core::row::RawRow = sample
                .iter()
                .map(|(key, value)| (key.clone(), CellValue::from_json(value)))
                .collect();
            row::validate_row(index + 1, &raw, &mapping)
        })
        .collect();

    let total = validated_rows.len();
    let valid = validated_rows
        .iter()
        .filter(|r| r.status == RowStatus::Success)
        .count();

    Ok(Json(DataResponse {
        data: TestMappingResponse {
            summary: TestMappingSummary {
                total,
                valid,
                errors: total - valid,
            },
            validated_rows,
        },
    }))
}

// ---------------------------------------------------------------------------
// Batch history
// ---------------------------------------------------------------------------

/// GET /api/v1/purchase-orders/import/batches
///
/// Recent import batches, newest first.
pub async fn list_batches(
    State(state): State<AppState>,
    Query(params): Query<BatchHistoryParams>,
) -> AppResult<Json<DataResponse<Vec<ImportBatch>>>> {
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    let batches = ImportBatchRepo::list_recent(&state.pool, limit).await?;
    Ok(Json(DataResponse { data: batches }))
}
