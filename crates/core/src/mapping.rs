//! Header-to-field mapping detection.
//!
//! Given the raw header row of an uploaded file, resolve each header to
//! at most one canonical field of the target schema. Exact alias hits
//! win; remaining headers fall back to fuzzy similarity. Headers that
//! match nothing are silently omitted -- unrecognized columns are not an
//! error in this system.

use indexmap::IndexMap;

use crate::schema::{self, FieldSpec, TARGET_FIELDS};
use crate::similarity::{self, best_match};

/// Canonical field name → source header string. Insertion order follows
/// the header row; coverage may be partial.
pub type FieldMapping = IndexMap<String, String>;

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Build a field mapping from raw header strings.
///
/// Two passes per header: first an exact comparison against every
/// field's alias list (first field whose list contains the normalized
/// header wins), then fuzzy matching over the remaining fields' aliases.
/// The first header mapped to a canonical field keeps it; later headers
/// that resolve to the same field are ignored.
pub fn detect_mapping(headers: &[String]) -> FieldMapping {
    let mut mapping = FieldMapping::new();

    for header in headers {
        let normalized = similarity::normalized(header);
        if normalized.is_empty() {
            continue;
        }

        let field = exact_alias_match(&normalized, &mapping)
            .or_else(|| fuzzy_match(&normalized, &mapping));

        if let Some(name) = field {
            mapping.entry(name.to_string()).or_insert_with(|| header.clone());
        }
    }

    mapping
}

/// Fraction of headers that resolved to a canonical field; `0.0` for an
/// empty header row.
pub fn mapping_confidence(mapping: &FieldMapping, header_count: usize) -> f64 {
    if header_count == 0 {
        return 0.0;
    }
    mapping.len() as f64 / header_count as f64
}

// ---------------------------------------------------------------------------
// Matching passes
// ---------------------------------------------------------------------------

fn exact_alias_match(normalized: &str, taken: &FieldMapping) -> Option<&'static str> {
    TARGET_FIELDS
        .iter()
        .filter(|field| !taken.contains_key(field.name))
        .find(|field| field.aliases.contains(&normalized))
        .map(|field| field.name)
}

/// Best fuzzy candidate across all unmapped fields' alias lists. Only a
/// score above the similarity threshold is accepted; ties keep the
/// earlier field in registry order.
fn fuzzy_match(normalized: &str, taken: &FieldMapping) -> Option<&'static str> {
    let mut best: Option<(&'static FieldSpec, f64)> = None;

    for field in TARGET_FIELDS {
        if taken.contains_key(field.name) {
            continue;
        }
        if let Some(m) = best_match(normalized, field.aliases) {
            if best.map_or(true, |(_, score)| m.score > score) {
                best = Some((field, m.score));
            }
        }
    }

    best.map(|(field, _)| field.name)
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Check a caller-supplied mapping: unknown canonical fields are allowed
/// (their values land in the catch-all bucket), but the mapping must not
/// be empty.
pub fn is_usable(mapping: &FieldMapping) -> bool {
    !mapping.is_empty()
}

/// Convenience for callers that resolve the mapping themselves: look up
/// the schema spec behind a mapping entry, if the field is recognized.
pub fn spec_for(canonical: &str) -> Option<&'static FieldSpec> {
    schema::field_spec(canonical)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    // -- exact alias pass ----------------------------------------------------

    #[test]
    fn maps_common_po_headers() {
        let mapping = detect_mapping(&headers(&["PO No", "GST No", "Po Date", "Qty"]));

        assert_eq!(mapping.get("poNo").map(String::as_str), Some("PO No"));
        assert_eq!(mapping.get("gstNo").map(String::as_str), Some("GST No"));
        assert_eq!(mapping.get("poDate").map(String::as_str), Some("Po Date"));
        assert_eq!(mapping.get("poQty").map(String::as_str), Some("Qty"));
        assert_eq!(mapping.len(), 4);
    }

    #[test]
    fn punctuated_headers_still_resolve() {
        let mapping = detect_mapping(&headers(&["P.O. No.", "GSTIN"]));
        assert!(mapping.contains_key("poNo"));
        assert!(mapping.contains_key("gstNo"));
    }

    #[test]
    fn unmatched_headers_are_silently_omitted() {
        let mapping = detect_mapping(&headers(&["PO No", "Zzz Internal Col 7"]));
        assert_eq!(mapping.len(), 1);
        assert!(mapping.contains_key("poNo"));
    }

    #[test]
    fn first_header_keeps_the_field() {
        // Both headers alias to poNo; the first one wins.
        let mapping = detect_mapping(&headers(&["PO No", "Order Number"]));
        assert_eq!(mapping.get("poNo").map(String::as_str), Some("PO No"));
        assert_eq!(mapping.len(), 1);
    }

    // -- fuzzy pass ----------------------------------------------------------

    #[test]
    fn fuzzy_match_catches_typos() {
        let mapping = detect_mapping(&headers(&["Quantiti"]));
        assert_eq!(mapping.get("poQty").map(String::as_str), Some("Quantiti"));
    }

    #[test]
    fn concept_alias_resolves_phone_header() {
        let mapping = detect_mapping(&headers(&["Mobile"]));
        assert!(mapping.contains_key("contactNo"));
    }

    // -- confidence ----------------------------------------------------------

    #[test]
    fn confidence_is_mapped_over_total() {
        let hdrs = headers(&["PO No", "Mystery Column"]);
        let mapping = detect_mapping(&hdrs);
        let confidence = mapping_confidence(&mapping, hdrs.len());
        assert!((confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn confidence_of_empty_headers_is_zero() {
        let mapping = FieldMapping::new();
        assert_eq!(mapping_confidence(&mapping, 0), 0.0);
    }

    #[test]
    fn blank_headers_are_skipped() {
        let mapping = detect_mapping(&headers(&["", "  ", "PO No"]));
        assert_eq!(mapping.len(), 1);
    }
}
