//! Repository for the `purchase_orders` table.
//!
//! Besides natural-key lookup and insert/update, this module translates
//! a [`CanonicalFilter`] into a parameterized WHERE clause over the
//! `fields` JSONB document. Numeric and date comparisons go through
//! guarded casts so rows whose values degraded to text during import
//! simply fall out of the comparison instead of breaking the query.

use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use poflow_core::filter::{
    CanonicalCondition, CanonicalFilter, CombineOperator, FilterOperator, SortOrder,
};
use poflow_core::normalize::{self, CellValue};
use poflow_core::schema::{self, FieldKind};

use crate::models::purchase_order::{NewPurchaseOrder, PurchaseOrder};

/// Column list shared across queries.
const COLUMNS: &str = "\
    id, po_no, gst_no, vendor_id, fields, extra_fields, \
    import_batch_id, created_at, updated_at";

/// CRUD and dynamic filtering for purchase orders.
pub struct PurchaseOrderRepo;

impl PurchaseOrderRepo {
    // -----------------------------------------------------------------------
    // Natural key lookup
    // -----------------------------------------------------------------------

    /// Find a record by its composite natural key (`po_no` + `gst_no`,
    /// with a missing GST treated as the empty string).
    pub async fn find_id_by_natural_key(
        pool: &PgPool,
        po_no: &str,
        gst_no: Option<&str>,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM purchase_orders
             WHERE po_no = $1 AND COALESCE(gst_no, '') = COALESCE($2, '')",
        )
        .bind(po_no)
        .bind(gst_no)
        .fetch_optional(pool)
        .await
    }

    /// Find a purchase order by its primary key.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<PurchaseOrder>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM purchase_orders WHERE id = $1");
        sqlx::query_as::<_, PurchaseOrder>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Insert a new purchase order.
    pub async fn insert(
        pool: &PgPool,
        new: &NewPurchaseOrder,
    ) -> Result<PurchaseOrder, sqlx::Error> {
        let query = format!(
            "INSERT INTO purchase_orders
                (po_no, gst_no, vendor_id, fields, extra_fields, import_batch_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PurchaseOrder>(&query)
            .bind(&new.po_no)
            .bind(&new.gst_no)
            .bind(new.vendor_id)
            .bind(&new.fields)
            .bind(&new.extra_fields)
            .bind(new.import_batch_id)
            .fetch_one(pool)
            .await
    }

    /// Merge new data into an existing record. JSONB `||` makes the
    /// incoming documents win key-by-key while untouched keys survive.
    pub async fn update_merge(
        pool: &PgPool,
        id: Uuid,
        new: &NewPurchaseOrder,
    ) -> Result<PurchaseOrder, sqlx::Error> {
        let query = format!(
            "UPDATE purchase_orders SET
                fields          = fields || $1,
                extra_fields    = extra_fields || $2,
                vendor_id       = COALESCE($3, vendor_id),
                import_batch_id = COALESCE($4, import_batch_id),
                updated_at      = NOW()
             WHERE id = $5
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PurchaseOrder>(&query)
            .bind(&new.fields)
            .bind(&new.extra_fields)
            .bind(new.vendor_id)
            .bind(new.import_batch_id)
            .bind(id)
            .fetch_one(pool)
            .await
    }

    // -----------------------------------------------------------------------
    // Dynamic filtering
    // -----------------------------------------------------------------------

    /// Execute a canonical filter: returns the page of matching records
    /// and the total match count.
    pub async fn filter(
        pool: &PgPool,
        filter: &CanonicalFilter,
    ) -> Result<(Vec<PurchaseOrder>, i64), sqlx::Error> {
        let mut count_query =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM purchase_orders");
        push_where(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar::<i64>()
            .fetch_one(pool)
            .await?;

        let mut page_query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {COLUMNS} FROM purchase_orders"
        ));
        push_where(&mut page_query, filter);
        push_order(&mut page_query, filter);
        page_query.push(" LIMIT ");
        page_query.push_bind(filter.limit);
        page_query.push(" OFFSET ");
        page_query.push_bind(filter.offset());

        let rows = page_query
            .build_query_as::<PurchaseOrder>()
            .fetch_all(pool)
            .await?;

        tracing::debug!(
            total,
            page = filter.page,
            conditions = filter.conditions.len(),
            "purchase order filter executed"
        );

        Ok((rows, total))
    }
}

// ---------------------------------------------------------------------------
// SQL generation
// ---------------------------------------------------------------------------

fn push_where(qb: &mut QueryBuilder<'_, Postgres>, filter: &CanonicalFilter) {
    if filter.conditions.is_empty() {
        return;
    }

    let joiner = match filter.combine {
        CombineOperator::And => " AND ",
        CombineOperator::Or => " OR ",
    };

    qb.push(" WHERE ");
    for (i, (field, condition)) in filter.conditions.iter().enumerate() {
        if i > 0 {
            qb.push(joiner);
        }
        qb.push("(");
        push_condition(qb, field, condition);
        qb.push(")");
    }
}

fn push_condition(qb: &mut QueryBuilder<'_, Postgres>, field: &str, cond: &CanonicalCondition) {
    let kind = schema::field_spec(field).map(|spec| spec.kind);

    match cond {
        CanonicalCondition::Compare { op, value } => push_compare(qb, field, kind, *op, value),

        CanonicalCondition::Bounded { min, max, .. } => match kind {
            Some(FieldKind::Date) => match (value_date(min), value_date(max)) {
                (Some(lo), Some(hi)) => {
                    push_date_expr(qb, field);
                    qb.push(" BETWEEN ");
                    qb.push_bind(lo);
                    qb.push(" AND ");
                    qb.push_bind(hi);
                }
                _ => {
                    qb.push("TRUE");
                }
            },
            _ => match (value_number(min), value_number(max)) {
                (Some(lo), Some(hi)) => {
                    push_numeric_expr(qb, field);
                    qb.push(" BETWEEN ");
                    qb.push_bind(lo);
                    qb.push(" AND ");
                    qb.push_bind(hi);
                }
                _ => {
                    qb.push("TRUE");
                }
            },
        },

        CanonicalCondition::DateWindow { from, to } => {
            let mut wrote = false;
            if let Some(from) = from {
                push_date_expr(qb, field);
                qb.push(" >= ");
                qb.push_bind(*from);
                wrote = true;
            }
            if let Some(to) = to {
                if wrote {
                    qb.push(" AND ");
                }
                push_date_expr(qb, field);
                qb.push(" <= ");
                qb.push_bind(*to);
                wrote = true;
            }
            if !wrote {
                qb.push("TRUE");
            }
        }

        CanonicalCondition::Set { op, values } => {
            let texts: Vec<String> = values.iter().map(value_text).collect();
            if matches!(op, FilterOperator::NotIn) {
                qb.push("NOT (");
            }
            push_text_expr(qb, field);
            qb.push(" = ANY(");
            qb.push_bind(texts);
            qb.push(")");
            if matches!(op, FilterOperator::NotIn) {
                qb.push(")");
            }
        }

        CanonicalCondition::Presence { op } => match op {
            FilterOperator::IsNull => {
                push_text_expr(qb, field);
                qb.push(" IS NULL");
            }
            FilterOperator::IsNotNull => {
                push_text_expr(qb, field);
                qb.push(" IS NOT NULL");
            }
            FilterOperator::IsEmpty => {
                qb.push("COALESCE(");
                push_text_expr(qb, field);
                qb.push(", '') = ''");
            }
            _ => {
                qb.push("COALESCE(");
                push_text_expr(qb, field);
                qb.push(", '') <> ''");
            }
        },
    }
}

fn push_compare(
    qb: &mut QueryBuilder<'_, Postgres>,
    field: &str,
    kind: Option<FieldKind>,
    op: FilterOperator,
    value: &serde_json::Value,
) {
    use FilterOperator::*;

    let numeric = matches!(kind, Some(k) if k.is_numeric());
    let dateish = matches!(kind, Some(FieldKind::Date));

    match op {
        GreaterThan | GreaterThanOrEqual | LessThan | LessThanOrEqual if dateish => {
            match value_date(value) {
                Some(date) => {
                    push_date_expr(qb, field);
                    qb.push(comparison_symbol(op));
                    qb.push_bind(date);
                }
                None => {
                    qb.push("TRUE");
                }
            }
        }
        GreaterThan | GreaterThanOrEqual | LessThan | LessThanOrEqual => {
            match value_number(value) {
                Some(n) => {
                    push_numeric_expr(qb, field);
                    qb.push(comparison_symbol(op));
                    qb.push_bind(n);
                }
                None => {
                    qb.push("TRUE");
                }
            }
        }
        Equals | NotEquals if numeric => match value_number(value) {
            Some(n) => {
                push_numeric_expr(qb, field);
                qb.push(if op == Equals { " = " } else { " <> " });
                qb.push_bind(n);
            }
            None => {
                qb.push("TRUE");
            }
        },
        Equals | NotEquals if dateish => match value_date(value) {
            Some(date) => {
                push_date_expr(qb, field);
                qb.push(if op == Equals { " = " } else { " <> " });
                qb.push_bind(date);
            }
            None => {
                qb.push("TRUE");
            }
        },
        Equals => {
            push_text_expr(qb, field);
            qb.push(" = ");
            qb.push_bind(value_text(value));
        }
        NotEquals => {
            push_text_expr(qb, field);
            qb.push(" <> ");
            qb.push_bind(value_text(value));
        }
        Contains => {
            push_text_expr(qb, field);
            qb.push(" ILIKE '%' || ");
            qb.push_bind(value_text(value));
            qb.push(" || '%'");
        }
        NotContains => {
            qb.push("NOT (");
            push_text_expr(qb, field);
            qb.push(" ILIKE '%' || ");
            qb.push_bind(value_text(value));
            qb.push(" || '%')");
        }
        StartsWith => {
            push_text_expr(qb, field);
            qb.push(" ILIKE ");
            qb.push_bind(value_text(value));
            qb.push(" || '%'");
        }
        EndsWith => {
            push_text_expr(qb, field);
            qb.push(" ILIKE '%' || ");
            qb.push_bind(value_text(value));
        }
        // Operators whose canonical form is not Compare never land here.
        _ => {
            qb.push("TRUE");
        }
    }
}

fn comparison_symbol(op: FilterOperator) -> &'static str {
    match op {
        FilterOperator::GreaterThan => " > ",
        FilterOperator::GreaterThanOrEqual => " >= ",
        FilterOperator::LessThan => " < ",
        FilterOperator::LessThanOrEqual => " <= ",
        _ => " = ",
    }
}

fn push_order(qb: &mut QueryBuilder<'_, Postgres>, filter: &CanonicalFilter) {
    let direction = match filter.sort_order {
        SortOrder::Asc => " ASC",
        SortOrder::Desc => " DESC",
    };

    qb.push(" ORDER BY ");
    match &filter.sort_by {
        Some(field) => {
            match schema::field_spec(field).map(|spec| spec.kind) {
                Some(FieldKind::Date) => push_date_expr(qb, field),
                Some(kind) if kind.is_numeric() => push_numeric_expr(qb, field),
                _ => push_text_expr(qb, field),
            }
            qb.push(direction);
            qb.push(" NULLS LAST");
        }
        None => {
            qb.push("created_at");
            qb.push(direction);
        }
    }
}

// ---------------------------------------------------------------------------
// Expressions over the JSONB document
// ---------------------------------------------------------------------------

fn push_text_expr(qb: &mut QueryBuilder<'_, Postgres>, field: &str) {
    qb.push("fields->>");
    qb.push_bind(field.to_string());
}

/// Numeric comparison expression. The regexp strip mirrors the import
/// normalizer, and NULLIF keeps rows with no digits out of the cast.
fn push_numeric_expr(qb: &mut QueryBuilder<'_, Postgres>, field: &str) {
    qb.push("NULLIF(regexp_replace(fields->>");
    qb.push_bind(field.to_string());
    qb.push(", '[^0-9.-]', '', 'g'), '')::float8");
}

/// Date comparison expression. Normalized dates are ISO `YYYY-MM-DD`;
/// values that degraded to free text fall out as NULL instead of
/// breaking the cast.
fn push_date_expr(qb: &mut QueryBuilder<'_, Postgres>, field: &str) {
    qb.push("(CASE WHEN fields->>");
    qb.push_bind(field.to_string());
    qb.push(" ~ '^\\d{4}-\\d{2}-\\d{2}$' THEN (fields->>");
    qb.push_bind(field.to_string());
    qb.push(")::date END)");
}

// ---------------------------------------------------------------------------
// Value coercion
// ---------------------------------------------------------------------------

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_number(value: &serde_json::Value) -> Option<f64> {
    normalize::try_number(&CellValue::from_json(value))
}

fn value_date(value: &serde_json::Value) -> Option<chrono::NaiveDate> {
    normalize::normalize_date(&CellValue::from_json(value))
}
