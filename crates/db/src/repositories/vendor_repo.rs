//! Repository for the `vendors` table.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::vendor::Vendor;

const COLUMNS: &str = "id, name, gst_no, created_at, updated_at";

/// Read access to vendor reference data.
pub struct VendorRepo;

impl VendorRepo {
    /// Resolve a vendor by GST number (the vendor-side natural key).
    pub async fn find_by_gst(pool: &PgPool, gst_no: &str) -> Result<Option<Vendor>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM vendors WHERE gst_no = $1");
        sqlx::query_as::<_, Vendor>(&query)
            .bind(gst_no)
            .fetch_optional(pool)
            .await
    }

    /// Find a vendor by its primary key.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Vendor>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM vendors WHERE id = $1");
        sqlx::query_as::<_, Vendor>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
