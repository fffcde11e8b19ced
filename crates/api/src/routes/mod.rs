pub mod health;
pub mod purchase_orders;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /purchase-orders/filter                  dynamic filter query (POST)
/// /purchase-orders/{id}                    fetch by id (GET)
/// /purchase-orders/import                  multipart import (POST)
/// /purchase-orders/import/detect-mapping   mapping preview (POST)
/// /purchase-orders/import/test-mapping     dry-run validation (POST)
/// /purchase-orders/import/batches          batch history (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/purchase-orders", purchase_orders::router())
}
