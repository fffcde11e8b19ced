//! Upload parsing: raw bytes → header row + untyped cell rows.
//!
//! Three file kinds are accepted: xlsx (first worksheet), CSV, and JSON
//! (an array of flat objects whose keys act as the header row). Parsing
//! stops at structure -- cell-level interpretation belongs to the core
//! normalizer. Fully blank rows are skipped.

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use poflow_core::error::ParseError;
use poflow_core::normalize::CellValue;
use poflow_core::row::RawRow;

// ---------------------------------------------------------------------------
// File kinds
// ---------------------------------------------------------------------------

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Xlsx,
    Csv,
    Json,
}

impl FileKind {
    /// Derive the kind from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "xlsx" | "xls" => Some(Self::Xlsx),
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

/// A parsed upload: trimmed headers plus one [`RawRow`] per data row.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Parse an uploaded buffer as the declared file kind.
///
/// Returns [`ParseError::NoRows`] when the file holds headers but no
/// data, and [`ParseError::Malformed`] when the bytes cannot be read as
/// the declared format at all.
pub fn parse_bytes(bytes: &[u8], kind: FileKind) -> Result<ParsedFile, ParseError> {
    let parsed = match kind {
        FileKind::Xlsx => parse_xlsx(bytes)?,
        FileKind::Csv => parse_csv(bytes)?,
        FileKind::Json => parse_json(bytes)?,
    };

    if parsed.rows.is_empty() {
        return Err(ParseError::NoRows);
    }
    Ok(parsed)
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn parse_csv(bytes: &[u8]) -> Result<ParsedFile, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| malformed(FileKind::Csv, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| malformed(FileKind::Csv, e))?;

        let mut row = RawRow::new();
        for (index, value) in record.iter().enumerate() {
            let Some(header) = headers.get(index) else {
                continue;
            };
            let trimmed = value.trim();
            let cell = if trimmed.is_empty() {
                CellValue::Null
            } else {
                CellValue::Text(trimmed.to_string())
            };
            row.insert(header.clone(), cell);
        }

        if row.values().all(CellValue::is_empty) {
            continue;
        }
        rows.push(row);
    }

    Ok(ParsedFile { headers, rows })
}

// ---------------------------------------------------------------------------
// Xlsx
// ---------------------------------------------------------------------------

fn parse_xlsx(bytes: &[u8]) -> Result<ParsedFile, ParseError> {
    let mut workbook: Xlsx<_> =
        Xlsx::new(Cursor::new(bytes)).map_err(|e| malformed(FileKind::Xlsx, e))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ParseError::Malformed {
            kind: FileKind::Xlsx.as_str().to_string(),
            message: "workbook has no worksheets".to_string(),
        })?
        .map_err(|e| malformed(FileKind::Xlsx, e))?;

    let mut row_iter = range.rows();
    let headers: Vec<String> = row_iter
        .next()
        .map(|cells| {
            cells
                .iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect()
        })
        .unwrap_or_default();

    let mut rows = Vec::new();
    for cells in row_iter {
        let mut row = RawRow::new();
        for (index, cell) in cells.iter().enumerate() {
            let Some(header) = headers.get(index) else {
                continue;
            };
            row.insert(header.clone(), cell_from_excel(cell));
        }

        if row.values().all(CellValue::is_empty) {
            continue;
        }
        rows.push(row);
    }

    Ok(ParsedFile { headers, rows })
}

/// Map a calamine cell onto the core cell union. Excel datetimes come
/// through as their serial number, which the normalizer recognizes.
fn cell_from_excel(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                CellValue::Null
            } else {
                CellValue::Text(trimmed.to_string())
            }
        }
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) => CellValue::Null,
    }
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

fn parse_json(bytes: &[u8]) -> Result<ParsedFile, ParseError> {
    let objects: Vec<serde_json::Map<String, serde_json::Value>> =
        serde_json::from_slice(bytes).map_err(|e| malformed(FileKind::Json, e))?;

    // Headers are the union of keys, in first-seen order.
    let mut headers: Vec<String> = Vec::new();
    for object in &objects {
        for key in object.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let mut rows = Vec::new();
    for object in &objects {
        let mut row = RawRow::new();
        for (key, value) in object {
            row.insert(key.clone(), CellValue::from_json(value));
        }
        if row.values().all(CellValue::is_empty) {
            continue;
        }
        rows.push(row);
    }

    Ok(ParsedFile { headers, rows })
}

fn malformed(kind: FileKind, err: impl std::fmt::Display) -> ParseError {
    ParseError::Malformed {
        kind: kind.as_str().to_string(),
        message: err.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    // -- file kinds ----------------------------------------------------------

    #[test]
    fn kind_from_extension() {
        assert_eq!(FileKind::from_extension("XLSX"), Some(FileKind::Xlsx));
        assert_eq!(FileKind::from_extension("xls"), Some(FileKind::Xlsx));
        assert_eq!(FileKind::from_extension("csv"), Some(FileKind::Csv));
        assert_eq!(FileKind::from_extension("json"), Some(FileKind::Json));
        assert_eq!(FileKind::from_extension("pdf"), None);
    }

    // -- csv -----------------------------------------------------------------

    #[test]
    fn csv_headers_and_rows() {
        let bytes = b"PO No,Qty\nPO1,100\nPO2,200\n";
        let parsed = parse_bytes(bytes, FileKind::Csv).unwrap();

        assert_eq!(parsed.headers, vec!["PO No", "Qty"]);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(
            parsed.rows[0].get("PO No"),
            Some(&CellValue::Text("PO1".to_string()))
        );
    }

    #[test]
    fn csv_blank_rows_skipped() {
        let bytes = b"PO No,Qty\nPO1,100\n,\nPO2,200\n";
        let parsed = parse_bytes(bytes, FileKind::Csv).unwrap();
        assert_eq!(parsed.rows.len(), 2);
    }

    #[test]
    fn csv_with_only_headers_is_no_rows() {
        let bytes = b"PO No,Qty\n";
        assert_matches!(parse_bytes(bytes, FileKind::Csv), Err(ParseError::NoRows));
    }

    #[test]
    fn csv_short_rows_tolerated() {
        let bytes = b"PO No,Qty,City\nPO1,5\n";
        let parsed = parse_bytes(bytes, FileKind::Csv).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].get("City"), None);
    }

    // -- json ----------------------------------------------------------------

    #[test]
    fn json_array_of_objects() {
        let bytes = br#"[
            {"PO No": "PO1", "Qty": 100},
            {"PO No": "PO2", "Qty": 200, "City": "Pune"}
        ]"#;
        let parsed = parse_bytes(bytes, FileKind::Json).unwrap();

        assert_eq!(parsed.headers, vec!["PO No", "Qty", "City"]);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(
            parsed.rows[0].get("Qty"),
            Some(&CellValue::Number(100.0))
        );
    }

    #[test]
    fn json_non_array_is_malformed() {
        let bytes = br#"{"PO No": "PO1"}"#;
        assert_matches!(
            parse_bytes(bytes, FileKind::Json),
            Err(ParseError::Malformed { .. })
        );
    }

    #[test]
    fn json_empty_array_is_no_rows() {
        assert_matches!(parse_bytes(b"[]", FileKind::Json), Err(ParseError::NoRows));
    }

    // -- xlsx ----------------------------------------------------------------

    #[test]
    fn xlsx_garbage_is_malformed() {
        assert_matches!(
            parse_bytes(b"not a zip archive", FileKind::Xlsx),
            Err(ParseError::Malformed { .. })
        );
    }
}
