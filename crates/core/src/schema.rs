//! Fixed target schema for purchase-order imports.
//!
//! The canonical field names are the keys the rest of the system speaks:
//! the JSONB `fields` document, the filter registry, and the wire format
//! all use them. They are camelCase because they mirror the contract of
//! the frontend this service feeds; they are data, not identifiers.
//!
//! Alias lists are stored pre-normalized (lower-case, punctuation
//! stripped) -- compare with [`crate::similarity::normalized`] output.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Field kinds
// ---------------------------------------------------------------------------

/// Value type a canonical field is normalized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    Int,
    Float,
    Date,
    Bool,
    Phone,
    Email,
}

impl FieldKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    /// Label used in diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Int => "integer",
            Self::Float => "number",
            Self::Date => "date",
            Self::Bool => "boolean",
            Self::Phone => "phone",
            Self::Email => "email",
        }
    }
}

// ---------------------------------------------------------------------------
// Field specs
// ---------------------------------------------------------------------------

/// One canonical field of the target schema.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Canonical name (camelCase, matches the wire format and JSONB keys).
    pub name: &'static str,
    pub kind: FieldKind,
    /// Maximum stored length for text fields; longer input is truncated.
    pub max_len: Option<usize>,
    /// Known header spellings, pre-normalized. The first entry doubles as
    /// the field's display label for fuzzy matching.
    pub aliases: &'static [&'static str],
}

/// The recognized target fields, in matching priority order. Anything a
/// mapped row supplies outside this set is preserved in the catch-all
/// bucket by the persistence adapter rather than dropped.
pub const TARGET_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "poNo",
        kind: FieldKind::Text,
        max_len: Some(50),
        aliases: &[
            "po no",
            "po number",
            "purchase order no",
            "purchase order number",
            "order no",
            "order number",
            "pono",
        ],
    },
    FieldSpec {
        name: "poDate",
        kind: FieldKind::Date,
        max_len: None,
        aliases: &["po date", "order date", "date of order", "po dt"],
    },
    FieldSpec {
        name: "poQty",
        kind: FieldKind::Float,
        max_len: None,
        aliases: &["qty", "quantity", "po qty", "order qty", "no of units", "nos"],
    },
    FieldSpec {
        name: "rate",
        kind: FieldKind::Float,
        max_len: None,
        aliases: &["rate", "unit price", "price", "unit rate", "unit cost"],
    },
    FieldSpec {
        name: "amount",
        kind: FieldKind::Float,
        max_len: None,
        aliases: &["amount", "amt", "basic amount", "base amount"],
    },
    FieldSpec {
        name: "totalAmount",
        kind: FieldKind::Float,
        max_len: None,
        aliases: &["total amount", "grand total", "net payable"],
    },
    FieldSpec {
        name: "netAmount",
        kind: FieldKind::Float,
        max_len: None,
        aliases: &["net amount", "net value", "taxable value", "taxable amount"],
    },
    FieldSpec {
        name: "gstNo",
        kind: FieldKind::Text,
        max_len: Some(15),
        aliases: &["gst no", "gstin", "gst number", "gstin no", "seller gstin"],
    },
    FieldSpec {
        name: "vendorName",
        kind: FieldKind::Text,
        max_len: Some(200),
        aliases: &[
            "vendor name",
            "supplier name",
            "vendor",
            "supplier",
            "party name",
            "seller name",
        ],
    },
    FieldSpec {
        name: "vendorCode",
        kind: FieldKind::Text,
        max_len: Some(50),
        aliases: &["vendor code", "supplier code", "party code"],
    },
    FieldSpec {
        name: "contactPerson",
        kind: FieldKind::Text,
        max_len: Some(100),
        aliases: &["contact person", "contact name", "attn", "attention"],
    },
    FieldSpec {
        name: "contactNo",
        kind: FieldKind::Phone,
        max_len: None,
        aliases: &[
            "contact no",
            "phone",
            "mobile",
            "mobile no",
            "phone no",
            "phone number",
            "telephone",
        ],
    },
    FieldSpec {
        name: "email",
        kind: FieldKind::Email,
        max_len: None,
        aliases: &["email", "email id", "mail", "e mail", "mail id"],
    },
    FieldSpec {
        name: "address",
        kind: FieldKind::Text,
        max_len: Some(500),
        aliases: &["address", "vendor address", "supplier address", "addr"],
    },
    FieldSpec {
        name: "city",
        kind: FieldKind::Text,
        max_len: Some(100),
        aliases: &["city", "town"],
    },
    FieldSpec {
        name: "state",
        kind: FieldKind::Text,
        max_len: Some(100),
        aliases: &["state", "province"],
    },
    FieldSpec {
        name: "pincode",
        kind: FieldKind::Text,
        max_len: Some(10),
        aliases: &["pincode", "pin code", "pin", "zip", "zip code", "postal code"],
    },
    FieldSpec {
        name: "country",
        kind: FieldKind::Text,
        max_len: Some(100),
        aliases: &["country"],
    },
    FieldSpec {
        name: "itemCode",
        kind: FieldKind::Text,
        max_len: Some(50),
        aliases: &[
            "item code",
            "material code",
            "product code",
            "sku",
            "part no",
            "part number",
        ],
    },
    FieldSpec {
        name: "itemName",
        kind: FieldKind::Text,
        max_len: Some(200),
        aliases: &["item name", "material name", "product name", "item", "material", "product"],
    },
    FieldSpec {
        name: "itemDescription",
        kind: FieldKind::Text,
        max_len: Some(1000),
        aliases: &[
            "item description",
            "description",
            "material description",
            "desc",
            "particulars",
        ],
    },
    FieldSpec {
        name: "hsnCode",
        kind: FieldKind::Text,
        max_len: Some(10),
        aliases: &["hsn code", "hsn", "hsn sac", "sac code"],
    },
    FieldSpec {
        name: "unit",
        kind: FieldKind::Text,
        max_len: Some(20),
        aliases: &["unit", "uom", "unit of measure", "units"],
    },
    FieldSpec {
        name: "discount",
        kind: FieldKind::Float,
        max_len: None,
        aliases: &["discount", "disc", "discount amount"],
    },
    FieldSpec {
        name: "discountPercent",
        kind: FieldKind::Float,
        max_len: None,
        aliases: &["discount percent", "disc percent", "discount rate"],
    },
    FieldSpec {
        name: "cgst",
        kind: FieldKind::Float,
        max_len: None,
        aliases: &["cgst", "cgst amount"],
    },
    FieldSpec {
        name: "sgst",
        kind: FieldKind::Float,
        max_len: None,
        aliases: &["sgst", "sgst amount"],
    },
    FieldSpec {
        name: "igst",
        kind: FieldKind::Float,
        max_len: None,
        aliases: &["igst", "igst amount"],
    },
    FieldSpec {
        name: "taxRate",
        kind: FieldKind::Float,
        max_len: None,
        aliases: &["tax rate", "gst rate", "gst percent", "tax percent"],
    },
    FieldSpec {
        name: "taxAmount",
        kind: FieldKind::Float,
        max_len: None,
        aliases: &["tax amount", "gst amount", "total tax"],
    },
    FieldSpec {
        name: "deliveryDate",
        kind: FieldKind::Date,
        max_len: None,
        aliases: &["delivery date", "delivery dt", "expected delivery", "delivery due date"],
    },
    FieldSpec {
        name: "dueDate",
        kind: FieldKind::Date,
        max_len: None,
        aliases: &["due date", "payment due date", "due dt"],
    },
    FieldSpec {
        name: "orderStatus",
        kind: FieldKind::Text,
        max_len: Some(30),
        aliases: &["order status", "status", "po status"],
    },
    FieldSpec {
        name: "paymentTerms",
        kind: FieldKind::Text,
        max_len: Some(200),
        aliases: &["payment terms", "terms of payment", "credit terms"],
    },
    FieldSpec {
        name: "paymentStatus",
        kind: FieldKind::Text,
        max_len: Some(30),
        aliases: &["payment status"],
    },
    FieldSpec {
        name: "currency",
        kind: FieldKind::Text,
        max_len: Some(10),
        aliases: &["currency", "curr"],
    },
    FieldSpec {
        name: "exchangeRate",
        kind: FieldKind::Float,
        max_len: None,
        aliases: &["exchange rate", "conversion rate", "fx rate"],
    },
    FieldSpec {
        name: "freightCharges",
        kind: FieldKind::Float,
        max_len: None,
        aliases: &["freight charges", "freight", "shipping charges", "transport charges"],
    },
    FieldSpec {
        name: "packingCharges",
        kind: FieldKind::Float,
        max_len: None,
        aliases: &["packing charges", "packing"],
    },
    FieldSpec {
        name: "otherCharges",
        kind: FieldKind::Float,
        max_len: None,
        aliases: &["other charges", "misc charges", "miscellaneous charges"],
    },
    FieldSpec {
        name: "roundOff",
        kind: FieldKind::Float,
        max_len: None,
        aliases: &["round off", "rounding"],
    },
    FieldSpec {
        name: "invoiceNo",
        kind: FieldKind::Text,
        max_len: Some(50),
        aliases: &["invoice no", "invoice number", "bill no", "bill number", "inv no"],
    },
    FieldSpec {
        name: "invoiceDate",
        kind: FieldKind::Date,
        max_len: None,
        aliases: &["invoice date", "bill date", "inv date"],
    },
    FieldSpec {
        name: "challanNo",
        kind: FieldKind::Text,
        max_len: Some(50),
        aliases: &["challan no", "challan number", "dc no", "delivery challan no"],
    },
    FieldSpec {
        name: "challanDate",
        kind: FieldKind::Date,
        max_len: None,
        aliases: &["challan date", "dc date"],
    },
    FieldSpec {
        name: "transporterName",
        kind: FieldKind::Text,
        max_len: Some(200),
        aliases: &["transporter name", "transporter", "carrier"],
    },
    FieldSpec {
        name: "vehicleNo",
        kind: FieldKind::Text,
        max_len: Some(20),
        aliases: &["vehicle no", "vehicle number", "truck no", "lorry no"],
    },
    FieldSpec {
        name: "lrNo",
        kind: FieldKind::Text,
        max_len: Some(50),
        aliases: &["lr no", "lr number", "lorry receipt no"],
    },
    FieldSpec {
        name: "lrDate",
        kind: FieldKind::Date,
        max_len: None,
        aliases: &["lr date"],
    },
    FieldSpec {
        name: "ewayBillNo",
        kind: FieldKind::Text,
        max_len: Some(20),
        aliases: &["eway bill no", "e way bill no", "eway bill number", "ewb no"],
    },
    FieldSpec {
        name: "remarks",
        kind: FieldKind::Text,
        max_len: Some(500),
        aliases: &["remarks", "notes", "comments", "note", "comment"],
    },
    FieldSpec {
        name: "buyerName",
        kind: FieldKind::Text,
        max_len: Some(200),
        aliases: &["buyer name", "buyer", "bill to", "customer name"],
    },
    FieldSpec {
        name: "buyerGstNo",
        kind: FieldKind::Text,
        max_len: Some(15),
        aliases: &["buyer gst no", "buyer gstin", "bill to gstin"],
    },
    FieldSpec {
        name: "shippingAddress",
        kind: FieldKind::Text,
        max_len: Some(500),
        aliases: &["shipping address", "ship to", "ship to address", "delivery address"],
    },
    FieldSpec {
        name: "billingAddress",
        kind: FieldKind::Text,
        max_len: Some(500),
        aliases: &["billing address", "bill to address"],
    },
    FieldSpec {
        name: "batchNo",
        kind: FieldKind::Text,
        max_len: Some(50),
        aliases: &["batch no", "batch number", "lot no", "lot number"],
    },
    FieldSpec {
        name: "expiryDate",
        kind: FieldKind::Date,
        max_len: None,
        aliases: &["expiry date", "expiry", "exp date", "best before"],
    },
    FieldSpec {
        name: "mfgDate",
        kind: FieldKind::Date,
        max_len: None,
        aliases: &["mfg date", "manufacturing date", "mfd"],
    },
    FieldSpec {
        name: "brandName",
        kind: FieldKind::Text,
        max_len: Some(100),
        aliases: &["brand name", "brand", "make"],
    },
    FieldSpec {
        name: "modelNo",
        kind: FieldKind::Text,
        max_len: Some(50),
        aliases: &["model no", "model number", "model"],
    },
    FieldSpec {
        name: "warrantyMonths",
        kind: FieldKind::Int,
        max_len: None,
        aliases: &["warranty months", "warranty", "warranty period"],
    },
    FieldSpec {
        name: "leadTimeDays",
        kind: FieldKind::Int,
        max_len: None,
        aliases: &["lead time days", "lead time", "delivery lead time"],
    },
    FieldSpec {
        name: "priority",
        kind: FieldKind::Text,
        max_len: Some(20),
        aliases: &["priority", "urgency"],
    },
    FieldSpec {
        name: "urgent",
        kind: FieldKind::Bool,
        max_len: None,
        aliases: &["urgent", "is urgent", "rush order"],
    },
    FieldSpec {
        name: "taxInclusive",
        kind: FieldKind::Bool,
        max_len: None,
        aliases: &["tax inclusive", "price inclusive of tax", "incl tax"],
    },
    FieldSpec {
        name: "approvedBy",
        kind: FieldKind::Text,
        max_len: Some(100),
        aliases: &["approved by", "authorised by", "authorized by"],
    },
    FieldSpec {
        name: "approvedDate",
        kind: FieldKind::Date,
        max_len: None,
        aliases: &["approved date", "approval date"],
    },
    FieldSpec {
        name: "projectCode",
        kind: FieldKind::Text,
        max_len: Some(50),
        aliases: &["project code", "project", "job code"],
    },
    FieldSpec {
        name: "costCenter",
        kind: FieldKind::Text,
        max_len: Some(50),
        aliases: &["cost center", "cost centre"],
    },
    FieldSpec {
        name: "department",
        kind: FieldKind::Text,
        max_len: Some(100),
        aliases: &["department", "dept"],
    },
];

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Find the spec for a canonical field name.
pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    TARGET_FIELDS.iter().find(|f| f.name == name)
}

/// Whether a canonical field name is part of the target schema.
pub fn is_known_field(name: &str) -> bool {
    field_spec(name).is_some()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn field_names_are_unique() {
        let mut seen = HashSet::new();
        for field in TARGET_FIELDS {
            assert!(seen.insert(field.name), "duplicate field: {}", field.name);
        }
    }

    #[test]
    fn aliases_are_pre_normalized() {
        for field in TARGET_FIELDS {
            for alias in field.aliases {
                assert_eq!(
                    *alias,
                    crate::similarity::normalized(alias),
                    "alias not normalized: {alias} (field {})",
                    field.name
                );
            }
        }
    }

    #[test]
    fn every_field_has_at_least_one_alias() {
        for field in TARGET_FIELDS {
            assert!(!field.aliases.is_empty(), "field {} has no aliases", field.name);
        }
    }

    #[test]
    fn text_fields_have_length_limits() {
        for field in TARGET_FIELDS {
            if field.kind == FieldKind::Text {
                assert!(field.max_len.is_some(), "text field {} has no max_len", field.name);
            }
        }
    }

    #[test]
    fn lookup_by_name() {
        assert!(field_spec("poNo").is_some());
        assert_eq!(field_spec("poQty").unwrap().kind, FieldKind::Float);
        assert!(field_spec("nonexistent").is_none());
        assert!(is_known_field("gstNo"));
        assert!(!is_known_field("somethingElse"));
    }
}
