//! Dynamic filter translation.
//!
//! Filter requests arrive in two interchangeable JSON shapes -- a map of
//! field → condition, or a list of conditions each carrying its `field`
//! -- and are normalized into a single canonical form before anything
//! else looks at them. Translation is lenient end to end: conditions
//! that cannot be minimally satisfied are dropped (and counted), unknown
//! fields become best-effort filters with a warning, and validation
//! never fails the request.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::normalize::{self, CellValue};
use crate::schema::{self, FieldKind};

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// Default page size.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Maximum page size; larger requests are clamped, not rejected.
pub const MAX_PAGE_SIZE: i64 = 1_000;

/// Clamp a user-provided page number to `>= 1`.
pub fn clamp_page(page: Option<i64>) -> i64 {
    page.unwrap_or(1).max(1)
}

/// Clamp a user-provided limit to `[1, MAX_PAGE_SIZE]`.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1).min(MAX_PAGE_SIZE)
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Filter operators accepted on the wire (camelCase).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Between,
    Range,
    In,
    NotIn,
    DateRange,
    DateBefore,
    DateAfter,
    IsNull,
    IsNotNull,
    IsEmpty,
    IsNotEmpty,
}

/// Which sub-fields of a condition an operator consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorFamily {
    /// Requires `value`.
    Value,
    /// Requires `min` + `max` (degrades to equals on a single bound).
    Bounded,
    /// Requires at least one of `from` / `to` (or `value` for the
    /// before/after variants).
    DateWindow,
    /// Requires a non-empty `values` list.
    Set,
    /// Requires nothing.
    Presence,
}

impl FilterOperator {
    pub fn family(&self) -> OperatorFamily {
        match self {
            Self::Between | Self::Range => OperatorFamily::Bounded,
            Self::DateRange | Self::DateBefore | Self::DateAfter => OperatorFamily::DateWindow,
            Self::In | Self::NotIn => OperatorFamily::Set,
            Self::IsNull | Self::IsNotNull | Self::IsEmpty | Self::IsNotEmpty => {
                OperatorFamily::Presence
            }
            _ => OperatorFamily::Value,
        }
    }

    /// Wire spelling, for diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "notEquals",
            Self::Contains => "contains",
            Self::NotContains => "notContains",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::GreaterThan => "greaterThan",
            Self::GreaterThanOrEqual => "greaterThanOrEqual",
            Self::LessThan => "lessThan",
            Self::LessThanOrEqual => "lessThanOrEqual",
            Self::Between => "between",
            Self::Range => "range",
            Self::In => "in",
            Self::NotIn => "notIn",
            Self::DateRange => "dateRange",
            Self::DateBefore => "dateBefore",
            Self::DateAfter => "dateAfter",
            Self::IsNull => "isNull",
            Self::IsNotNull => "isNotNull",
            Self::IsEmpty => "isEmpty",
            Self::IsNotEmpty => "isNotEmpty",
        }
    }
}

/// Operators a field of the given kind accepts. Consulted for warning
/// generation -- a disallowed operator is still attempted, lenient as
/// everywhere else.
pub fn allowed_operators(kind: FieldKind) -> &'static [FilterOperator] {
    use FilterOperator::*;
    match kind {
        FieldKind::Text | FieldKind::Phone | FieldKind::Email => &[
            Equals, NotEquals, Contains, NotContains, StartsWith, EndsWith, In, NotIn, IsNull,
            IsNotNull, IsEmpty, IsNotEmpty,
        ],
        FieldKind::Int | FieldKind::Float => &[
            Equals, NotEquals, GreaterThan, GreaterThanOrEqual, LessThan, LessThanOrEqual,
            Between, Range, In, NotIn, IsNull, IsNotNull,
        ],
        FieldKind::Date => &[
            Equals, DateRange, DateBefore, DateAfter, Between, Range, IsNull, IsNotNull,
        ],
        FieldKind::Bool => &[Equals, NotEquals, IsNull, IsNotNull],
    }
}

fn default_operator(kind: Option<FieldKind>) -> FilterOperator {
    match kind {
        Some(k) if k.is_numeric() => FilterOperator::Equals,
        Some(FieldKind::Date) => FilterOperator::DateRange,
        _ => FilterOperator::Contains,
    }
}

// ---------------------------------------------------------------------------
// Request types (wire)
// ---------------------------------------------------------------------------

/// One filter condition as received. Which sub-fields matter depends on
/// the operator family.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterCondition {
    pub operator: Option<FilterOperator>,
    pub value: Option<Value>,
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub from: Option<Value>,
    pub to: Option<Value>,
    pub values: Option<Vec<Value>>,
}

/// List-shape entry: the condition plus the field it applies to.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterEntry {
    pub field: String,
    #[serde(flatten)]
    pub condition: FilterCondition,
}

/// The two accepted shapes of the `filters` member.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FiltersInput {
    Map(IndexMap<String, FilterCondition>),
    List(Vec<FilterEntry>),
}

impl FiltersInput {
    /// Lift both shapes into the canonical map form. For the list shape,
    /// a repeated field keeps the last entry.
    pub fn into_map(self) -> IndexMap<String, FilterCondition> {
        match self {
            Self::Map(map) => map,
            Self::List(entries) => entries
                .into_iter()
                .map(|entry| (entry.field, entry.condition))
                .collect(),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "ASC", alias = "asc")]
    Asc,
    #[default]
    #[serde(rename = "DESC", alias = "desc")]
    Desc,
}

/// How multiple conditions combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombineOperator {
    #[default]
    #[serde(rename = "AND", alias = "and")]
    And,
    #[serde(rename = "OR", alias = "or")]
    Or,
}

/// A dynamic filter request as received on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterRequest {
    pub filters: Option<FiltersInput>,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub combine_operator: CombineOperator,
}

// ---------------------------------------------------------------------------
// Canonical form
// ---------------------------------------------------------------------------

/// A condition after translation: fully typed, minimal, ready for the
/// query engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalCondition {
    Compare { op: FilterOperator, value: Value },
    Bounded { op: FilterOperator, min: Value, max: Value },
    DateWindow { from: Option<NaiveDate>, to: Option<NaiveDate> },
    Set { op: FilterOperator, values: Vec<Value> },
    Presence { op: FilterOperator },
}

/// The single canonical filter handed to the query engine, independent
/// of which input shape produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalFilter {
    pub conditions: IndexMap<String, CanonicalCondition>,
    pub combine: CombineOperator,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    pub page: i64,
    pub limit: i64,
}

impl CanonicalFilter {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// Validation outcome. `is_valid` is always true -- every problem is
/// coercible or droppable -- but dropped conditions are counted
/// separately from descriptive warnings so silent data loss stays
/// visible.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterValidation {
    pub is_valid: bool,
    pub warnings: Vec<String>,
    pub dropped_conditions: usize,
}

// ---------------------------------------------------------------------------
// Translation
// ---------------------------------------------------------------------------

/// Translate a wire request into the canonical filter plus validation
/// notes. Never fails.
pub fn translate(request: FilterRequest) -> (CanonicalFilter, FilterValidation) {
    let mut warnings: Vec<String> = Vec::new();
    let mut dropped = 0usize;
    let mut conditions: IndexMap<String, CanonicalCondition> = IndexMap::new();

    let input = request.filters.map(FiltersInput::into_map).unwrap_or_default();

    for (field, condition) in input {
        let spec = schema::field_spec(&field);
        if spec.is_none() {
            warnings.push(format!("unknown filter field '{field}'"));
        }

        let kind = spec.map(|s| s.kind);
        let op = condition.operator.unwrap_or_else(|| default_operator(kind));

        if let Some(k) = kind {
            if !allowed_operators(k).contains(&op) {
                warnings.push(format!(
                    "operator '{}' is not registered for field '{field}'",
                    op.as_str()
                ));
            }
        }

        match translate_condition(op, &condition, kind) {
            Some(canonical) => {
                conditions.insert(field, canonical);
            }
            None => {
                dropped += 1;
                warnings.push(format!(
                    "condition on '{field}' ({}) is missing required values and was dropped",
                    op.as_str()
                ));
            }
        }
    }

    let sort_by = match request.sort_by {
        Some(field) if schema::is_known_field(&field) => Some(field),
        Some(field) => {
            warnings.push(format!("unknown sort field '{field}' ignored"));
            None
        }
        None => None,
    };

    let filter = CanonicalFilter {
        conditions,
        combine: request.combine_operator,
        sort_by,
        sort_order: request.sort_order,
        page: clamp_page(request.page),
        limit: clamp_limit(request.limit),
    };

    let validation = FilterValidation {
        is_valid: true,
        warnings,
        dropped_conditions: dropped,
    };

    (filter, validation)
}

fn translate_condition(
    op: FilterOperator,
    condition: &FilterCondition,
    _kind: Option<FieldKind>,
) -> Option<CanonicalCondition> {
    match op.family() {
        OperatorFamily::Value => condition
            .value
            .clone()
            .filter(|v| !v.is_null())
            .map(|value| CanonicalCondition::Compare { op, value }),

        OperatorFamily::Bounded => {
            let min = condition.min.clone().filter(|v| !v.is_null());
            let max = condition.max.clone().filter(|v| !v.is_null());
            match (min, max) {
                (Some(min), Some(max)) => Some(CanonicalCondition::Bounded { op, min, max }),
                // Single bound degrades to an equality on that value.
                (Some(single), None) | (None, Some(single)) => Some(CanonicalCondition::Compare {
                    op: FilterOperator::Equals,
                    value: single,
                }),
                (None, None) => None,
            }
        }

        OperatorFamily::DateWindow => {
            let (from, to) = match op {
                FilterOperator::DateBefore => (None, value_to_date(condition.value.as_ref())),
                FilterOperator::DateAfter => (value_to_date(condition.value.as_ref()), None),
                _ => (
                    value_to_date(condition.from.as_ref()),
                    value_to_date(condition.to.as_ref()),
                ),
            };
            if from.is_none() && to.is_none() {
                return None;
            }
            Some(CanonicalCondition::DateWindow { from, to })
        }

        OperatorFamily::Set => {
            let values: Vec<Value> = condition
                .values
                .clone()
                .unwrap_or_default()
                .into_iter()
                .filter(|v| !v.is_null())
                .collect();
            if values.is_empty() {
                return None;
            }
            Some(CanonicalCondition::Set { op, values })
        }

        OperatorFamily::Presence => Some(CanonicalCondition::Presence { op }),
    }
}

/// Coerce a JSON value (string or spreadsheet-style serial number) to a
/// date for window bounds.
fn value_to_date(value: Option<&Value>) -> Option<NaiveDate> {
    normalize::normalize_date(&CellValue::from_json(value?))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn request_from_json(json: serde_json::Value) -> FilterRequest {
        serde_json::from_value(json).expect("valid request")
    }

    // -- dual input shapes ---------------------------------------------------

    #[test]
    fn list_and_map_shapes_normalize_identically() {
        let list = request_from_json(serde_json::json!({
            "filters": [
                { "field": "poNo", "operator": "startsWith", "value": "sad" }
            ]
        }));
        let map = request_from_json(serde_json::json!({
            "filters": {
                "poNo": { "operator": "startsWith", "value": "sad" }
            }
        }));

        let (from_list, _) = translate(list);
        let (from_map, _) = translate(map);
        assert_eq!(from_list, from_map);
        assert_eq!(
            from_list.conditions["poNo"],
            CanonicalCondition::Compare {
                op: FilterOperator::StartsWith,
                value: serde_json::json!("sad"),
            }
        );
    }

    #[test]
    fn repeated_field_in_list_shape_keeps_last() {
        let request = request_from_json(serde_json::json!({
            "filters": [
                { "field": "city", "value": "Pune" },
                { "field": "city", "value": "Mumbai" }
            ]
        }));
        let (filter, _) = translate(request);
        assert_eq!(filter.conditions.len(), 1);
        assert_eq!(
            filter.conditions["city"],
            CanonicalCondition::Compare {
                op: FilterOperator::Contains,
                value: serde_json::json!("Mumbai"),
            }
        );
    }

    // -- default operators ---------------------------------------------------

    #[test]
    fn default_operator_depends_on_field_type() {
        let request = request_from_json(serde_json::json!({
            "filters": {
                "poQty": { "value": 5 },
                "poDate": { "from": "2024-01-01" },
                "vendorName": { "value": "Acme" }
            }
        }));
        let (filter, validation) = translate(request);

        assert!(matches!(
            filter.conditions["poQty"],
            CanonicalCondition::Compare { op: FilterOperator::Equals, .. }
        ));
        assert!(matches!(
            filter.conditions["poDate"],
            CanonicalCondition::DateWindow { .. }
        ));
        assert!(matches!(
            filter.conditions["vendorName"],
            CanonicalCondition::Compare { op: FilterOperator::Contains, .. }
        ));
        assert!(validation.is_valid);
        assert_eq!(validation.dropped_conditions, 0);
    }

    // -- operator families ---------------------------------------------------

    #[test]
    fn between_with_both_bounds() {
        let request = request_from_json(serde_json::json!({
            "filters": { "poQty": { "operator": "between", "min": 10, "max": 20 } }
        }));
        let (filter, _) = translate(request);
        assert!(matches!(
            filter.conditions["poQty"],
            CanonicalCondition::Bounded { op: FilterOperator::Between, .. }
        ));
    }

    #[test]
    fn between_with_single_bound_degrades_to_equals() {
        let request = request_from_json(serde_json::json!({
            "filters": { "poQty": { "operator": "between", "min": 10 } }
        }));
        let (filter, _) = translate(request);
        assert_eq!(
            filter.conditions["poQty"],
            CanonicalCondition::Compare {
                op: FilterOperator::Equals,
                value: serde_json::json!(10),
            }
        );
    }

    #[test]
    fn in_requires_non_empty_values() {
        let request = request_from_json(serde_json::json!({
            "filters": {
                "city": { "operator": "in", "values": [] },
                "state": { "operator": "in", "values": ["MH", "KA"] }
            }
        }));
        let (filter, validation) = translate(request);

        assert!(!filter.conditions.contains_key("city"));
        assert!(filter.conditions.contains_key("state"));
        assert_eq!(validation.dropped_conditions, 1);
        assert!(validation.is_valid);
    }

    #[test]
    fn date_range_parses_flexible_bounds() {
        let request = request_from_json(serde_json::json!({
            "filters": {
                "poDate": { "operator": "dateRange", "from": "01/02/2024", "to": "2024-03-01" }
            }
        }));
        let (filter, _) = translate(request);
        assert_eq!(
            filter.conditions["poDate"],
            CanonicalCondition::DateWindow {
                from: NaiveDate::from_ymd_opt(2024, 2, 1),
                to: NaiveDate::from_ymd_opt(2024, 3, 1),
            }
        );
    }

    #[test]
    fn date_before_and_after_become_windows() {
        let request = request_from_json(serde_json::json!({
            "filters": {
                "poDate": { "operator": "dateBefore", "value": "2024-06-30" }
            }
        }));
        let (filter, _) = translate(request);
        assert_eq!(
            filter.conditions["poDate"],
            CanonicalCondition::DateWindow {
                from: None,
                to: NaiveDate::from_ymd_opt(2024, 6, 30),
            }
        );
    }

    #[test]
    fn null_check_needs_no_values() {
        let request = request_from_json(serde_json::json!({
            "filters": { "remarks": { "operator": "isNull" } }
        }));
        let (filter, validation) = translate(request);
        assert_eq!(
            filter.conditions["remarks"],
            CanonicalCondition::Presence { op: FilterOperator::IsNull }
        );
        assert_eq!(validation.dropped_conditions, 0);
    }

    #[test]
    fn value_operator_without_value_is_dropped() {
        let request = request_from_json(serde_json::json!({
            "filters": { "vendorName": { "operator": "contains" } }
        }));
        let (filter, validation) = translate(request);
        assert!(filter.conditions.is_empty());
        assert_eq!(validation.dropped_conditions, 1);
        assert!(validation.is_valid);
    }

    // -- unknown fields ------------------------------------------------------

    #[test]
    fn unknown_field_passes_through_with_warning() {
        let request = request_from_json(serde_json::json!({
            "filters": { "legacyRef": { "value": "X9" } }
        }));
        let (filter, validation) = translate(request);

        assert_eq!(
            filter.conditions["legacyRef"],
            CanonicalCondition::Compare {
                op: FilterOperator::Contains,
                value: serde_json::json!("X9"),
            }
        );
        assert!(validation
            .warnings
            .iter()
            .any(|w| w.contains("legacyRef")));
    }

    // -- pagination clamps ---------------------------------------------------

    #[test]
    fn pagination_is_clamped() {
        let request = request_from_json(serde_json::json!({
            "page": 0,
            "limit": 5000
        }));
        let (filter, _) = translate(request);
        assert_eq!(filter.page, 1);
        assert_eq!(filter.limit, MAX_PAGE_SIZE);
        assert_eq!(filter.offset(), 0);
    }

    #[test]
    fn pagination_defaults() {
        let (filter, _) = translate(FilterRequest::default());
        assert_eq!(filter.page, 1);
        assert_eq!(filter.limit, DEFAULT_PAGE_SIZE);
    }

    // -- sorting -------------------------------------------------------------

    #[test]
    fn unknown_sort_field_is_ignored_with_warning() {
        let request = request_from_json(serde_json::json!({
            "sortBy": "notAField",
            "sortOrder": "ASC"
        }));
        let (filter, validation) = translate(request);
        assert_eq!(filter.sort_by, None);
        assert_eq!(filter.sort_order, SortOrder::Asc);
        assert!(validation.warnings.iter().any(|w| w.contains("notAField")));
    }

    #[test]
    fn known_sort_field_is_kept() {
        let request = request_from_json(serde_json::json!({ "sortBy": "poDate" }));
        let (filter, _) = translate(request);
        assert_eq!(filter.sort_by.as_deref(), Some("poDate"));
        assert_eq!(filter.sort_order, SortOrder::Desc);
    }

    // -- disallowed operator -------------------------------------------------

    #[test]
    fn disallowed_operator_warns_but_still_applies() {
        // contains on a numeric field: not registered, kept anyway.
        let request = request_from_json(serde_json::json!({
            "filters": { "poQty": { "operator": "contains", "value": "10" } }
        }));
        let (filter, validation) = translate(request);
        assert!(filter.conditions.contains_key("poQty"));
        assert!(validation.warnings.iter().any(|w| w.contains("poQty")));
    }
}
