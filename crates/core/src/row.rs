//! Lenient per-row validation.
//!
//! Applies the field mapping to one raw row and produces a normalized
//! row. Nothing here rejects data: a value that refuses to parse as its
//! declared type is preserved as text and flagged with a warning, and a
//! canonical field the schema does not recognize is carried verbatim
//! (the persistence adapter later redirects it into the catch-all
//! bucket). The only source of `Error` status is the persistence phase,
//! which runs after validation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::mapping::FieldMapping;
use crate::normalize::{self, CellValue};
use crate::schema::{self, FieldKind};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One raw row as produced by a file parser: header string → cell.
pub type RawRow = IndexMap<String, CellValue>;

/// Severity of a row-level diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// A field-scoped diagnostic attached to a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowIssue {
    pub field: String,
    pub message: String,
    pub severity: IssueSeverity,
}

/// Row outcome status.
///
/// Validation only ever produces `Success` or `Warning`; `Error` is
/// assigned by the orchestrator on persistence failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Success,
    Warning,
    Error,
}

/// A validated, normalized row moving through the import pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRow {
    /// 1-based index mirroring the source row, for user-facing diagnostics.
    pub row_index: usize,
    /// Canonical field → normalized value.
    pub data: IndexMap<String, serde_json::Value>,
    pub errors: Vec<RowIssue>,
    pub status: RowStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persisted_id: Option<Uuid>,
}

impl ImportRow {
    /// Composite natural key (`poNo` + `gstNo`), or `None` when the row
    /// carries no order number. Used for pre-persistence deduplication
    /// and duplicate diagnostics.
    pub fn natural_key(&self) -> Option<String> {
        let po_no = self.data.get("poNo").and_then(json_text)?;
        let gst_no = self
            .data
            .get("gstNo")
            .and_then(json_text)
            .unwrap_or_default();
        Some(format!("{po_no}::{gst_no}"))
    }

    pub fn push_issue(&mut self, field: &str, message: String, severity: IssueSeverity) {
        self.errors.push(RowIssue {
            field: field.to_string(),
            message,
            severity,
        });
    }
}

/// Non-empty text content of a JSON value (numbers stringified).
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

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate one raw row against the field mapping.
///
/// For every `(canonical, header)` pair: a missing or empty cell skips
/// the field entirely (no null placeholder is written); otherwise the
/// value is normalized per the schema type, falling back to the original
/// text plus a warning when the typed parse fails.
pub fn validate_row(row_index: usize, raw: &RawRow, mapping: &FieldMapping) -> ImportRow {
    let mut row = ImportRow {
        row_index,
        data: IndexMap::new(),
        errors: Vec::new(),
        status: RowStatus::Success,
        persisted_id: None,
    };

    for (canonical, header) in mapping {
        let Some(value) = raw.get(header) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }

        match schema::field_spec(canonical) {
            // Unrecognized canonical field: carry the raw value verbatim.
            None => {
                row.data.insert(canonical.clone(), value.to_json());
            }
            Some(spec) => normalize_field(&mut row, canonical, spec.kind, spec.max_len, value),
        }
    }

    if !row.errors.is_empty() {
        row.status = RowStatus::Warning;
    }
    row
}

fn normalize_field(
    row: &mut ImportRow,
    canonical: &str,
    kind: FieldKind,
    max_len: Option<usize>,
    value: &CellValue,
) {
    match kind {
        FieldKind::Text => {
            if let Some(text) = normalize::to_safe_string(value) {
                row.data
                    .insert(canonical.to_string(), truncated(text, max_len).into());
            }
        }
        FieldKind::Int => match normalize::try_number(value) {
            Some(n) => {
                row.data
                    .insert(canonical.to_string(), serde_json::Value::from(n as i64));
            }
            None => fallback_to_text(row, canonical, kind, value),
        },
        FieldKind::Float => match normalize::try_number(value) {
            Some(n) => {
                row.data
                    .insert(canonical.to_string(), serde_json::Value::from(n));
            }
            None => fallback_to_text(row, canonical, kind, value),
        },
        FieldKind::Date => match normalize::normalize_date(value) {
            Some(date) => {
                row.data.insert(
                    canonical.to_string(),
                    serde_json::Value::String(date.format("%Y-%m-%d").to_string()),
                );
            }
            None => fallback_to_text(row, canonical, kind, value),
        },
        FieldKind::Bool => {
            row.data.insert(
                canonical.to_string(),
                serde_json::Value::Bool(normalize::normalize_boolean(value)),
            );
        }
        FieldKind::Phone => {
            let phones = normalize::normalize_phones(value);
            if phones.is_empty() {
                fallback_to_text(row, canonical, kind, value);
            } else {
                row.data
                    .insert(canonical.to_string(), phones.join(", ").into());
            }
        }
        FieldKind::Email => {
            let emails = normalize::normalize_emails(value);
            if emails.is_empty() {
                fallback_to_text(row, canonical, kind, value);
            } else {
                row.data
                    .insert(canonical.to_string(), emails.join(", ").into());
            }
        }
    }
}

/// The lenient fallback: store the original value as text and record a
/// warning so the degradation is visible and countable in the output.
fn fallback_to_text(row: &mut ImportRow, canonical: &str, kind: FieldKind, value: &CellValue) {
    let text = normalize::to_safe_string(value).unwrap_or_default();
    row.data
        .insert(canonical.to_string(), serde_json::Value::String(text));
    row.push_issue(
        canonical,
        format!("could not be read as {}; kept as text", kind.label()),
        IssueSeverity::Warning,
    );
}

fn truncated(text: String, max_len: Option<usize>) -> String {
    match max_len {
        Some(limit) if text.chars().count() > limit => text.chars().take(limit).collect(),
        _ => text,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
