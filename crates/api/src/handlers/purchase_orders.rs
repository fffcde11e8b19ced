//! Handlers for purchase-order querying.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use poflow_core::error::CoreError;
use poflow_core::filter::{self, FilterRequest};
use poflow_db::models::purchase_order::PurchaseOrder;
use poflow_db::repositories::PurchaseOrderRepo;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Paginated filter result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterResponse {
    pub total_count: i64,
    pub page_number: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub data: Vec<PurchaseOrder>,
    /// Translation warnings: unknown fields, dropped conditions. The
    /// query still ran -- these describe what was ignored.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// POST /api/v1/purchase-orders/filter
///
/// Accepts a dynamic filter request in either of the two supported
/// `filters` shapes, translates it to the canonical form, and executes
/// it. Malformed filter fragments are dropped with a warning instead of
/// failing the request.
pub async fn filter(
    State(state): State<AppState>,
    Json(request): Json<FilterRequest>,
) -> AppResult<Json<DataResponse<FilterResponse>>> {
    let (canonical, validation) = filter::translate(request);

    if !validation.warnings.is_empty() {
        tracing::debug!(
            warnings = validation.warnings.len(),
            dropped = validation.dropped_conditions,
            "filter request translated with warnings"
        );
    }

    let (data, total_count) = PurchaseOrderRepo::filter(&state.pool, &canonical).await?;

    let total_pages = if total_count == 0 {
        0
    } else {
        (total_count + canonical.limit - 1) / canonical.limit
    };

    Ok(Json(DataResponse {
        data: FilterResponse {
            total_count,
            page_number: canonical.page,
            page_size: canonical.limit,
            total_pages,
            data,
            warnings: validation.warnings,
        },
    }))
}

/// GET /api/v1/purchase-orders/{id}
///
/// Fetch one purchase order by primary key.
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<PurchaseOrder>>> {
    let order = PurchaseOrderRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "PurchaseOrder",
                id: id.to_string(),
            })
        })?;
    Ok(Json(DataResponse { data: order }))
}
