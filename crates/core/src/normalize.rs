//! Tolerant cell-value normalization.
//!
//! Spreadsheet exports are untrusted: dates arrive as serial numbers or
//! half a dozen text formats, phone columns hold three numbers separated
//! by slashes, booleans come as workflow status words. Every function
//! here is total -- on irrecoverable input it returns the "empty" value
//! for its target type instead of erroring, and the caller decides
//! whether that degradation is worth a warning.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Cell values
// ---------------------------------------------------------------------------

/// An untyped cell as produced by the file parsers.
///
/// Temporal cells arrive either as ISO-ish text or as spreadsheet serial
/// numbers, so there is no dedicated date variant; serial handling lives
/// in [`normalize_date`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    /// True for `Null` and for text that is empty after trimming.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Verbatim JSON representation (text is trimmed, nothing else changes).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Text(s) => serde_json::Value::String(s.trim().to_string()),
        }
    }

    /// Build a cell from an arbitrary JSON value (used by the JSON file
    /// parser and the dry-run mapping test endpoint). Arrays and objects
    /// are flattened to their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => {
                n.as_f64().map(Self::Number).unwrap_or(Self::Null)
            }
            serde_json::Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Spreadsheet serial dates
// ---------------------------------------------------------------------------

/// Day offset between the spreadsheet epoch (1899-12-30) and the Unix epoch.
pub const SERIAL_UNIX_OFFSET_DAYS: i64 = 25_569;

/// Lower bound of the serial range treated as a date (~1902).
const SERIAL_MIN: f64 = 1_000.0;

/// Upper bound of the serial range treated as a date (~2447).
const SERIAL_MAX: f64 = 200_000.0;

fn spreadsheet_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).expect("valid epoch date")
}

// ---------------------------------------------------------------------------
// Regexes
// ---------------------------------------------------------------------------

static SLASH_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,4})[/\-.](\d{1,2})[/\-.](\d{1,4})$").expect("valid regex")
});

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid regex")
});

static EMAIL_SEARCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid regex")
});

static PHONE_SEARCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d[\d\s()\-]{8,}\d").expect("valid regex")
});

// ---------------------------------------------------------------------------
// String / number conversions
// ---------------------------------------------------------------------------

/// Convert a cell to a trimmed string, or `None` when there is nothing
/// usable (`Null`, or text that trims to empty).
pub fn to_safe_string(value: &CellValue) -> Option<String> {
    match value {
        CellValue::Null => None,
        CellValue::Bool(b) => Some(b.to_string()),
        CellValue::Number(n) => Some(format_number(*n)),
        CellValue::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
    }
}

/// Lenient numeric coercion: strip every character outside `[0-9.-]`,
/// parse as float, and fall back to `0` for anything non-numeric.
pub fn normalize_number(value: &CellValue) -> f64 {
    try_number(value).unwrap_or(0.0)
}

/// Like [`normalize_number`] but reports failure, so callers can count
/// coercion fallbacks instead of silently producing zeros.
pub fn try_number(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Null => None,
        CellValue::Bool(_) => None,
        CellValue::Number(n) => Some(*n),
        CellValue::Text(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse::<f64>().ok()
        }
    }
}

fn format_number(n: f64) -> String {
    // Display drops the trailing ".0" for whole floats: 100.0 -> "100".
    format!("{n}")
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Normalize a cell to a calendar date.
///
/// Numbers in the plausible spreadsheet-serial range are treated as day
/// counts from the 1899-12-30 epoch (25569 days before the Unix epoch);
/// everything else goes through [`parse_date_text`]. Invalid input yields
/// `None`.
pub fn normalize_date(value: &CellValue) -> Option<NaiveDate> {
    match value {
        CellValue::Number(n) if (SERIAL_MIN..=SERIAL_MAX).contains(n) => {
            spreadsheet_epoch().checked_add_signed(chrono::Duration::days(*n as i64))
        }
        CellValue::Number(_) | CellValue::Null | CellValue::Bool(_) => None,
        CellValue::Text(s) => parse_date_text(s),
    }
}

/// Parse a date from text.
///
/// Tries explicit `DD/MM/YYYY` and `YYYY/MM/DD` patterns first (separator
/// `/`, `-` or `.`), disambiguated by which capture group has four digits
/// -- that group is the year. Two-digit years are rejected. Falls back to
/// a fixed list of common formats, ISO first.
pub fn parse_date_text(input: &str) -> Option<NaiveDate> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(caps) = SLASH_DATE_RE.captures(trimmed) {
        let a = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let b = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let c = caps.get(3).map(|m| m.as_str()).unwrap_or_default();

        let parts = if a.len() == 4 {
            // YYYY/MM/DD
            Some((a, b, c))
        } else if c.len() == 4 {
            // DD/MM/YYYY
            Some((c, b, a))
        } else {
            None
        };

        if let Some((y, m, d)) = parts {
            let year: i32 = y.parse().ok()?;
            let month: u32 = m.parse().ok()?;
            let day: u32 = d.parse().ok()?;
            return NaiveDate::from_ymd_opt(year, month, day);
        }
        return None;
    }

    // ISO timestamps (with or without offset), then plain formats.
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt.date());
        }
    }
    for format in ["%Y-%m-%d", "%d-%b-%Y", "%d %b %Y", "%Y%m%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Phones / emails
// ---------------------------------------------------------------------------

const LIST_SEPARATORS: &[char] = &[',', '/', ';', '|', '\n'];

/// Minimum digit count for a piece to be considered a phone number.
const MIN_PHONE_DIGITS: usize = 8;

/// Local phone numbers are normalized to their last 10 digits.
const LOCAL_PHONE_DIGITS: usize = 10;

/// Extract phone numbers from a cell that may hold several, separated by
/// commas, slashes, semicolons, pipes, or newlines.
///
/// Each piece is stripped to digits; pieces shorter than 8 digits are
/// dropped, pieces of 10+ digits are truncated to their last 10 (local
/// number without country code). Order and duplicates are preserved.
pub fn normalize_phones(value: &CellValue) -> Vec<String> {
    let Some(text) = to_safe_string(value) else {
        return Vec::new();
    };

    text.split(LIST_SEPARATORS)
        .filter_map(|piece| {
            let digits: String = piece.chars().filter(char::is_ascii_digit).collect();
            if digits.len() < MIN_PHONE_DIGITS {
                return None;
            }
            if digits.len() >= LOCAL_PHONE_DIGITS {
                Some(digits[digits.len() - LOCAL_PHONE_DIGITS..].to_string())
            } else {
                Some(digits)
            }
        })
        .collect()
}

/// Extract email addresses from a cell, splitting on the list separators
/// plus whitespace and keeping only pieces shaped like `local@domain.tld`.
pub fn normalize_emails(value: &CellValue) -> Vec<String> {
    let Some(text) = to_safe_string(value) else {
        return Vec::new();
    };

    text.split(|c: char| LIST_SEPARATORS.contains(&c) || c.is_whitespace())
        .map(str::trim)
        .filter(|piece| EMAIL_RE.is_match(piece))
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Booleans
// ---------------------------------------------------------------------------

/// Tokens accepted as "true". Includes workflow status words -- the
/// upstream data uses the same column for a boolean flag and a not-yet-
/// final status, and both must read as true.
const TRUTHY_TOKENS: &[&str] = &[
    "true", "yes", "y", "1", "ok", "approved", "pending", "open", "active",
];

/// Lenient boolean coercion: empty cells are false, everything else is
/// stringified, lower-cased, and matched against the truthy token set.
pub fn normalize_boolean(value: &CellValue) -> bool {
    match to_safe_string(value) {
        None => false,
        Some(s) => TRUTHY_TOKENS.contains(&s.to_lowercase().as_str()),
    }
}

// ---------------------------------------------------------------------------
// Contact splitting
// ---------------------------------------------------------------------------

/// Pieces extracted from a free-form contact string.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Contact {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Best-effort split of a single string like
/// `"Ravi Kumar, ravi@acme.in / 98765 43210"` into name, email, and phone.
///
/// The email is the first regex match; the phone is the first run of 10+
/// digits (separators tolerated); the name is whatever text remains once
/// both matches and stray punctuation are removed.
pub fn parse_contact(input: &str) -> Contact {
    let mut residue = input.to_string();

    let email = EMAIL_SEARCH_RE.find(input).map(|m| {
        residue = residue.replacen(m.as_str(), " ", 1);
        m.as_str().to_string()
    });

    let after_email = residue.clone();
    let phone = PHONE_SEARCH_RE.find(&after_email).and_then(|m| {
        let digits: String = m.as_str().chars().filter(char::is_ascii_digit).collect();
        if digits.len() < LOCAL_PHONE_DIGITS {
            return None;
        }
        residue = residue.replacen(m.as_str(), " ", 1);
        Some(digits[digits.len() - LOCAL_PHONE_DIGITS..].to_string())
    });

    let name: String = residue
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || c == '.' || c == '\'' {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    Contact {
        name: if name.is_empty() { None } else { Some(name) },
        email,
        phone,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- to_safe_string ------------------------------------------------------

    #[test]
    fn safe_string_trims_text() {
        let v = CellValue::Text("  PO1  ".to_string());
        assert_eq!(to_safe_string(&v), Some("PO1".to_string()));
    }

    #[test]
    fn safe_string_null_and_blank_are_none() {
        assert_eq!(to_safe_string(&CellValue::Null), None);
        assert_eq!(to_safe_string(&CellValue::Text("   ".to_string())), None);
    }

    #[test]
    fn safe_string_stringifies_numbers_and_bools() {
        assert_eq!(to_safe_string(&CellValue::Number(100.0)), Some("100".to_string()));
        assert_eq!(to_safe_string(&CellValue::Number(0.5)), Some("0.5".to_string()));
        assert_eq!(to_safe_string(&CellValue::Bool(true)), Some("true".to_string()));
    }

    // -- numbers -------------------------------------------------------------

    #[test]
    fn number_strips_currency_noise() {
        let v = CellValue::Text("₹ 1,234.50".to_string());
        assert_eq!(normalize_number(&v), 1234.50);
    }

    #[test]
    fn number_falls_back_to_zero() {
        assert_eq!(normalize_number(&CellValue::Text("n/a".to_string())), 0.0);
        assert_eq!(normalize_number(&CellValue::Null), 0.0);
    }

    #[test]
    fn try_number_reports_failure() {
        assert_eq!(try_number(&CellValue::Text("abc".to_string())), None);
        assert_eq!(try_number(&CellValue::Text("42".to_string())), Some(42.0));
        assert_eq!(try_number(&CellValue::Number(7.5)), Some(7.5));
    }

    // -- dates ---------------------------------------------------------------

    #[test]
    fn serial_date_uses_spreadsheet_epoch() {
        // 45000 days after 1899-12-30 = 2023-03-15; equivalently
        // (45000 - 25569) days after the Unix epoch.
        let date = normalize_date(&CellValue::Number(45_000.0)).unwrap();
        let from_unix = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
            + chrono::Duration::days(45_000 - SERIAL_UNIX_OFFSET_DAYS);
        assert_eq!(date, from_unix);
        assert_eq!(date, NaiveDate::from_ymd_opt(2023, 3, 15).unwrap());
    }

    #[test]
    fn out_of_range_number_is_not_a_date() {
        assert_eq!(normalize_date(&CellValue::Number(3.0)), None);
        assert_eq!(normalize_date(&CellValue::Number(5_000_000.0)), None);
    }

    #[test]
    fn day_month_year_when_last_group_is_year() {
        assert_eq!(
            parse_date_text("01/02/2024"),
            NaiveDate::from_ymd_opt(2024, 2, 1)
        );
        assert_eq!(
            parse_date_text("15-08-2023"),
            NaiveDate::from_ymd_opt(2023, 8, 15)
        );
    }

    #[test]
    fn year_first_when_first_group_is_four_digits() {
        assert_eq!(
            parse_date_text("2024/02/01"),
            NaiveDate::from_ymd_opt(2024, 2, 1)
        );
    }

    #[test]
    fn two_digit_years_rejected() {
        assert_eq!(parse_date_text("01/02/24"), None);
    }

    #[test]
    fn iso_fallback_formats() {
        assert_eq!(
            parse_date_text("2024-02-01"),
            NaiveDate::from_ymd_opt(2024, 2, 1)
        );
        assert_eq!(
            parse_date_text("2024-02-01T10:30:00Z"),
            NaiveDate::from_ymd_opt(2024, 2, 1)
        );
        assert_eq!(
            parse_date_text("01-Feb-2024"),
            NaiveDate::from_ymd_opt(2024, 2, 1)
        );
    }

    #[test]
    fn garbage_date_is_none() {
        assert_eq!(parse_date_text("soon"), None);
        assert_eq!(parse_date_text(""), None);
    }

    // -- phones --------------------------------------------------------------

    #[test]
    fn phones_split_truncate_and_drop_short() {
        let v = CellValue::Text("123-456-7890, 98765".to_string());
        assert_eq!(normalize_phones(&v), vec!["1234567890".to_string()]);
    }

    #[test]
    fn phones_keep_last_ten_digits() {
        let v = CellValue::Text("+91 98765 43210".to_string());
        assert_eq!(normalize_phones(&v), vec!["9876543210".to_string()]);
    }

    #[test]
    fn phones_preserve_order_and_duplicates() {
        let v = CellValue::Text("9876543210 / 9876543210; 044-2345678".to_string());
        assert_eq!(
            normalize_phones(&v),
            vec![
                "9876543210".to_string(),
                "9876543210".to_string(),
                "0442345678".to_string(),
            ]
        );
    }

    #[test]
    fn eight_digit_landline_kept_as_is() {
        let v = CellValue::Text("23456789".to_string());
        assert_eq!(normalize_phones(&v), vec!["23456789".to_string()]);
    }

    // -- emails --------------------------------------------------------------

    #[test]
    fn emails_split_and_filter() {
        let v = CellValue::Text("a@b.com, not-an-email / c@d.org".to_string());
        assert_eq!(
            normalize_emails(&v),
            vec!["a@b.com".to_string(), "c@d.org".to_string()]
        );
    }

    #[test]
    fn emails_split_on_whitespace() {
        let v = CellValue::Text("x@y.in z@w.co".to_string());
        assert_eq!(normalize_emails(&v).len(), 2);
    }

    // -- booleans ------------------------------------------------------------

    #[test]
    fn boolean_truthy_tokens() {
        for token in ["true", "Yes", "1", "APPROVED", "pending"] {
            assert!(
                normalize_boolean(&CellValue::Text(token.to_string())),
                "token: {token}"
            );
        }
    }

    #[test]
    fn boolean_falsy_inputs() {
        assert!(!normalize_boolean(&CellValue::Null));
        assert!(!normalize_boolean(&CellValue::Text("no".to_string())));
        assert!(!normalize_boolean(&CellValue::Text("rejected".to_string())));
        assert!(!normalize_boolean(&CellValue::Bool(false)));
    }

    // -- contact splitting ---------------------------------------------------

    #[test]
    fn contact_extracts_all_three_parts() {
        let contact = parse_contact("Ravi Kumar, ravi@acme.in / 98765 43210");
        assert_eq!(contact.name.as_deref(), Some("Ravi Kumar"));
        assert_eq!(contact.email.as_deref(), Some("ravi@acme.in"));
        assert_eq!(contact.phone.as_deref(), Some("9876543210"));
    }

    #[test]
    fn contact_name_only() {
        let contact = parse_contact("Accounts Desk");
        assert_eq!(contact.name.as_deref(), Some("Accounts Desk"));
        assert_eq!(contact.email, None);
        assert_eq!(contact.phone, None);
    }

    #[test]
    fn contact_short_digit_run_is_not_a_phone() {
        let contact = parse_contact("Ext 12345");
        assert_eq!(contact.phone, None);
    }

    // -- from_json -----------------------------------------------------------

    #[test]
    fn from_json_maps_scalars() {
        assert_eq!(CellValue::from_json(&serde_json::json!(null)), CellValue::Null);
        assert_eq!(CellValue::from_json(&serde_json::json!(true)), CellValue::Bool(true));
        assert_eq!(CellValue::from_json(&serde_json::json!(2.5)), CellValue::Number(2.5));
        assert_eq!(
            CellValue::from_json(&serde_json::json!("x")),
            CellValue::Text("x".to_string())
        );
    }
}
