//! Persistence adapter for the batch import orchestrator.
//!
//! Implements the core [`RowPersistence`] trait over the purchase-order
//! tables: splits a normalized row into recognized fields and the
//! catch-all bucket, resolves the vendor by GST number, and either
//! creates a record or updates the one holding the row's natural key.

use async_trait::async_trait;
use indexmap::IndexMap;
use uuid::Uuid;

use poflow_core::batch::{PersistedRow, PersistenceError, RowPersistence};
use poflow_core::schema;

use crate::models::purchase_order::NewPurchaseOrder;
use crate::repositories::{PurchaseOrderRepo, VendorRepo};
use crate::DbPool;

/// Writes one import row per call; rows never share a transaction, so
/// one row's failure cannot affect another's.
pub struct PurchaseOrderWriter {
    pool: DbPool,
    batch_id: Uuid,
}

impl PurchaseOrderWriter {
    pub fn new(pool: DbPool, batch_id: Uuid) -> Self {
        Self { pool, batch_id }
    }
}

#[async_trait]
impl RowPersistence for PurchaseOrderWriter {
    async fn persist(
        &self,
        data: &IndexMap<String, serde_json::Value>,
        update_if_exists: bool,
    ) -> Result<PersistedRow, PersistenceError> {
        let po_no = data
            .get("poNo")
            .and_then(json_text)
            .ok_or_else(|| PersistenceError::Constraint("row has no order number".to_string()))?;
        let gst_no = data.get("gstNo").and_then(json_text);

        // Secondary natural-key lookup: vendor by GST number.
        let vendor_id = match &gst_no {
            Some(gst) => VendorRepo::find_by_gst(&self.pool, gst)
                .await
                .map_err(map_sqlx_error)?
                .map(|vendor| vendor.id),
            None => None,
        };

        let (fields, extra_fields) = split_fields(data);
        let new = NewPurchaseOrder {
            po_no: po_no.clone(),
            gst_no: gst_no.clone(),
            vendor_id,
            fields,
            extra_fields,
            import_batch_id: Some(self.batch_id),
        };

        let existing =
            PurchaseOrderRepo::find_id_by_natural_key(&self.pool, &po_no, gst_no.as_deref())
                .await
                .map_err(map_sqlx_error)?;

        match existing {
            Some(id) if update_if_exists => {
                let updated = PurchaseOrderRepo::update_merge(&self.pool, id, &new)
                    .await
                    .map_err(map_sqlx_error)?;
                tracing::debug!(po_no = %po_no, id = %updated.id, "purchase order updated");
                Ok(PersistedRow {
                    id: updated.id,
                    created: false,
                })
            }
            Some(_) => Err(PersistenceError::Duplicate(format!(
                "{po_no}/{}",
                gst_no.unwrap_or_default()
            ))),
            None => {
                let created = PurchaseOrderRepo::insert(&self.pool, &new)
                    .await
                    .map_err(map_sqlx_error)?;
                tracing::debug!(po_no = %po_no, id = %created.id, "purchase order created");
                Ok(PersistedRow {
                    id: created.id,
                    created: true,
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Partition a normalized row into recognized fields and the catch-all
/// document. Nothing is dropped.
fn split_fields(
    data: &IndexMap<String, serde_json::Value>,
) -> (serde_json::Value, serde_json::Value) {
    let mut fields = serde_json::Map::new();
    let mut extra = serde_json::Map::new();

    for (name, value) in data {
        if schema::is_known_field(name) {
            fields.insert(name.clone(), value.clone());
        } else {
            extra.insert(name.clone(), value.clone());
        }
    }

    (
        serde_json::Value::Object(fields),
        serde_json::Value::Object(extra),
    )
}

fn json_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Map sqlx failures onto the orchestrator's error classes. Connection
/// and pool faults become `Unavailable`, which the orchestrator treats
/// as a chunk-level fault rather than a row-level one.
fn map_sqlx_error(err: sqlx::Error) -> PersistenceError {
    match &err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            PersistenceError::Unavailable(err.to_string())
        }
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
            if code == "23505" {
                PersistenceError::Duplicate(db_err.to_string())
            } else if code.starts_with("23") {
                PersistenceError::Constraint(db_err.to_string())
            } else {
                PersistenceError::Other(db_err.to_string())
            }
        }
        _ => PersistenceError::Other(err.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
