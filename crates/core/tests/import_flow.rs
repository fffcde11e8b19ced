//! End-to-end import flow over an in-memory persistence double:
//! header detection → row validation → chunked batch persistence.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use poflow_core::batch::{
    run_batch, BatchStatus, ImportOptions, PersistedRow, PersistenceError, RowPersistence,
};
use poflow_core::mapping::detect_mapping;
use poflow_core::normalize::CellValue;
use poflow_core::row::{validate_row, RawRow, RowStatus};

/// Keeps natural keys in a set; every insert succeeds unless the key is
/// already present.
#[derive(Default)]
struct MemoryStore {
    seen: Mutex<HashSet<String>>,
}

#[async_trait]
impl RowPersistence for MemoryStore {
    async fn persist(
        &self,
        data: &IndexMap<String, serde_json::Value>,
        update_if_exists: bool,
    ) -> Result<PersistedRow, PersistenceError> {
        let key = format!(
            "{}::{}",
            data.get("poNo").and_then(|v| v.as_str()).unwrap_or(""),
            data.get("gstNo").and_then(|v| v.as_str()).unwrap_or("")
        );

        let mut seen = self.seen.lock().unwrap();
        if seen.contains(&key) {
            if update_if_exists {
                return Ok(PersistedRow {
                    id: Uuid::new_v4(),
                    created: false,
                });
            }
            return Err(PersistenceError::Duplicate(key));
        }
        seen.insert(key);
        Ok(PersistedRow {
            id: Uuid::new_v4(),
            created: true,
        })
    }
}

fn text_row(headers: &[&str], values: &[&str]) -> RawRow {
    headers
        .iter()
        .zip(values)
        .map(|(h, v)| (h.to_string(), CellValue::Text(v.to_string())))
        .collect()
}

#[tokio::test]
async fn import_flow_from_headers_to_batch_result() {
    let headers: Vec<String> = ["PO No", "GST No", "Po Date", "Qty"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mapping = detect_mapping(&headers);
    assert_eq!(mapping.len(), 4);
    assert!(mapping.contains_key("poNo"));
    assert!(mapping.contains_key("gstNo"));
    assert!(mapping.contains_key("poDate"));
    assert!(mapping.contains_key("poQty"));

    let raw = text_row(
        &["PO No", "GST No", "Po Date", "Qty"],
        &["PO1", "07ABCDE1234F1Z5", "01/02/2024", "100"],
    );
    let row = validate_row(1, &raw, &mapping);

    // Day/month/year assumed: no group is an unambiguous 4-digit year first.
    assert_eq!(row.data["poDate"], serde_json::json!("2024-02-01"));
    assert_eq!(row.status, RowStatus::Success);

    let store = MemoryStore::default();
    let result = run_batch(
        Uuid::new_v4(),
        vec![row],
        &ImportOptions::default(),
        &store,
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(result.total_rows, 1);
    assert_eq!(result.success_count, 1);
    assert_eq!(result.failure_count, 0);
    assert_eq!(result.status, BatchStatus::Success);
    assert_eq!(result.created_ids.len(), 1);
}

#[tokio::test]
async fn wrong_typed_field_degrades_but_batch_still_succeeds() {
    let headers: Vec<String> = ["PO No", "Qty"].iter().map(|s| s.to_string()).collect();
    let mapping = detect_mapping(&headers);

    let rows: Vec<_> = [
        ("PO1", "100"),
        ("PO2", "not a number"),
        ("PO3", "250"),
    ]
    .iter()
    .enumerate()
    .map(|(i, (po, qty))| {
        validate_row(i + 1, &text_row(&["PO No", "Qty"], &[po, qty]), &mapping)
    })
    .collect();

    // The wrong-typed row is a warning, never an error.
    assert_eq!(rows[1].status, RowStatus::Warning);

    let store = MemoryStore::default();
    let result = run_batch(
        Uuid::new_v4(),
        rows,
        &ImportOptions::default(),
        &store,
        &CancellationToken::new(),
    )
    .await;

    // All three persist; the degraded field stays visible in the report.
    assert_eq!(result.success_count, 3);
    assert!(result.success_count >= 2);
    assert_eq!(result.status, BatchStatus::Success);
    assert_eq!(result.per_row_errors.len(), 1);
    assert_eq!(result.per_row_errors[0].row_index, 2);
}
