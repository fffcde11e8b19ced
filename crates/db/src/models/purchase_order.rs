//! Purchase order models.
//!
//! Maps to the `purchase_orders` table. Normalized recognized fields
//! live in the `fields` JSONB document keyed by canonical name;
//! anything a mapped row supplied outside the target schema is
//! preserved in `extra_fields`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `purchase_orders` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub po_no: String,
    pub gst_no: Option<String>,
    pub vendor_id: Option<Uuid>,
    pub fields: serde_json::Value,
    pub extra_fields: serde_json::Value,
    pub import_batch_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

/// DTO for inserting a new purchase order.
#[derive(Debug, Clone)]
pub struct NewPurchaseOrder {
    pub po_no: String,
    pub gst_no: Option<String>,
    pub vendor_id: Option<Uuid>,
    pub fields: serde_json::Value,
    pub extra_fields: serde_json::Value,
    pub import_batch_id: Option<Uuid>,
}
