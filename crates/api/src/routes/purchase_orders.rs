//! Route definitions for purchase orders and their import engine.
//!
//! Mounted at `/purchase-orders`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{import, purchase_orders};
use crate::state::AppState;

/// Routes mounted at `/purchase-orders`.
///
/// ```text
/// POST   /filter                  -> filter (dynamic query)
/// GET    /{id}                    -> get_by_id
/// POST   /import                  -> import (multipart)
/// POST   /import/detect-mapping   -> detect_mapping
/// POST   /import/test-mapping     -> test_mapping
/// GET    /import/batches          -> list_batches
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/filter", post(purchase_orders::filter))
        .route("/import", post(import::import))
        .route("/import/detect-mapping", post(import::detect_mapping))
        .route("/import/test-mapping", post(import::test_mapping))
        .route("/import/batches", get(import::list_batches))
        .route("/{id}", get(purchase_orders::get_by_id))
}
