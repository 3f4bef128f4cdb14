//! Invoice data model: the loose per-page extraction and the canonical record.
//!
//! Two shapes, one boundary. [`RawPageExtraction`] is whatever the vision
//! model answered for one page — a permissive field map that may be
//! incomplete, mistyped, or full of sentinel strings. It exists only between
//! the provider call and the merge/normalize stages and never reaches
//! callers. [`CanonicalInvoice`] is the strict, fully-typed record produced
//! for the whole document: every scalar is either a well-typed value or an
//! explicit null, numbers are never strings, and `line_items` is always
//! present.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Header and payment fields, in merge scan order.
///
/// These follow first-non-null-wins across pages. The order matches the
/// extraction prompt's schema so exported summaries stay stable.
pub const HEADER_FIELDS: &[&str] = &[
    "vendor_name",
    "vendor_address",
    "vendor_email",
    "vendor_phone",
    "vendor_tax_id",
    "client_name",
    "client_address",
    "client_email",
    "invoice_number",
    "invoice_date",
    "due_date",
    "purchase_order_number",
    "currency",
    "payment_terms",
    "payment_method",
    "bank_account",
    "notes",
];

/// Totals fields. These follow last-non-null-wins across pages (summary
/// tables usually sit on the final page).
pub const TOTAL_FIELDS: &[&str] = &[
    "subtotal",
    "tax_rate",
    "tax_amount",
    "discount",
    "shipping",
    "total_amount",
];

// Models wrap JSON in code fences despite being told not to.
static RE_FENCE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^```(?:json)?\s*").unwrap());
static RE_FENCE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)\s*```\s*$").unwrap());

/// The unvalidated field map one provider call returned for one page.
///
/// Ephemeral: created per page, consumed by the merge engine, dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPageExtraction(Map<String, Value>);

impl RawPageExtraction {
    /// An extraction with no fields at all, used for degraded pages.
    pub fn empty() -> Self {
        Self(Map::new())
    }

    /// Parse the model's textual answer into a field map.
    ///
    /// Strips markdown code fences first, then falls back to the outermost
    /// `{…}` span if the answer has prose around the JSON. Anything that
    /// still fails to parse as a JSON object is an error the driver treats
    /// as a malformed response.
    pub fn from_model_text(text: &str) -> Result<Self, String> {
        let defenced = RE_FENCE_OPEN.replace_all(text, "");
        let cleaned = RE_FENCE_CLOSE.replace_all(&defenced, "");
        let cleaned = cleaned.trim();

        // A top-level array is parsed as-is so it fails with a typed error
        // instead of the brace-span fallback fishing an object out of it.
        let candidate = if cleaned.starts_with('{') || cleaned.starts_with('[') {
            cleaned.to_string()
        } else {
            match (cleaned.find('{'), cleaned.rfind('}')) {
                (Some(start), Some(end)) if end > start => cleaned[start..=end].to_string(),
                _ => return Err("no JSON object in model answer".to_string()),
            }
        };

        match serde_json::from_str::<Value>(&candidate) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(format!(
                "expected a JSON object, got {}",
                value_type_name(&other)
            )),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Build from an already-parsed map. Used by the merge engine and tests.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Field lookup. `Value::Null` and absent are both `None`.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    /// The page's line items, if the model reported any.
    pub fn line_items(&self) -> &[Value] {
        match self.0.get("line_items") {
            Some(Value::Array(items)) => items,
            _ => &[],
        }
    }

    /// True when no field carries a value and there are no line items.
    pub fn is_empty(&self) -> bool {
        self.line_items().is_empty()
            && HEADER_FIELDS
                .iter()
                .chain(TOTAL_FIELDS.iter())
                .all(|f| self.field(f).is_none())
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

fn value_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// One itemized row of the invoice.
///
/// Soft invariant, validated not enforced: `total ≈ quantity × unit_price`.
/// Violations surface as [`crate::error::Warning::LineItemInconsistent`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Item description. Empty string when the model omitted it.
    pub description: String,
    /// Quantity, ≥ 0 after normalization.
    pub quantity: Option<f64>,
    /// Price per unit, ≥ 0 after normalization.
    pub unit_price: Option<f64>,
    /// Row total, ≥ 0 after normalization.
    pub total: Option<f64>,
}

/// The normalized invoice record for the whole document.
///
/// Every field is either well-typed or explicitly null; provider sentinels
/// (`"N/A"`, `"-"`, …) never survive normalization. Serializes directly as
/// the JSON response payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalInvoice {
    // Vendor / seller
    pub vendor_name: Option<String>,
    pub vendor_address: Option<String>,
    pub vendor_email: Option<String>,
    pub vendor_phone: Option<String>,
    pub vendor_tax_id: Option<String>,

    // Client / buyer
    pub client_name: Option<String>,
    pub client_address: Option<String>,
    pub client_email: Option<String>,

    // Invoice meta
    pub invoice_number: Option<String>,
    /// Normalized to `YYYY-MM-DD`.
    pub invoice_date: Option<String>,
    /// Normalized to `YYYY-MM-DD`.
    pub due_date: Option<String>,
    pub purchase_order_number: Option<String>,
    /// 3-letter ISO code, uppercase.
    pub currency: Option<String>,

    /// Insertion order = page order, then in-page order. Never absent.
    #[serde(default)]
    pub line_items: Vec<LineItem>,

    // Totals (currency-agnostic plain numbers)
    pub subtotal: Option<f64>,
    pub tax_rate: Option<f64>,
    pub tax_amount: Option<f64>,
    pub discount: Option<f64>,
    pub shipping: Option<f64>,
    pub total_amount: Option<f64>,

    // Payment
    pub payment_terms: Option<String>,
    pub payment_method: Option<String>,
    pub bank_account: Option<String>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_plain_json() {
        let raw = RawPageExtraction::from_model_text(r#"{"vendor_name": "Acme"}"#).unwrap();
        assert_eq!(raw.field("vendor_name"), Some(&json!("Acme")));
    }

    #[test]
    fn parse_fenced_json() {
        let text = "```json\n{\"vendor_name\": \"Acme\", \"subtotal\": 100}\n```";
        let raw = RawPageExtraction::from_model_text(text).unwrap();
        assert_eq!(raw.field("subtotal"), Some(&json!(100)));
    }

    #[test]
    fn parse_json_with_surrounding_prose() {
        let text = "Here is the extracted data:\n{\"invoice_number\": \"INV-1\"}\nDone.";
        let raw = RawPageExtraction::from_model_text(text).unwrap();
        assert_eq!(raw.field("invoice_number"), Some(&json!("INV-1")));
    }

    #[test]
    fn parse_non_json_is_err() {
        assert!(RawPageExtraction::from_model_text("sorry, I can't read this").is_err());
    }

    #[test]
    fn parse_json_array_is_err() {
        let err = RawPageExtraction::from_model_text("[1, 2, 3]").unwrap_err();
        assert!(err.contains("array"), "got: {err}");
    }

    #[test]
    fn parse_array_of_objects_is_err() {
        // The inner object must not be fished out of a top-level array.
        let err = RawPageExtraction::from_model_text(r#"[{"vendor_name": "Acme"}]"#).unwrap_err();
        assert!(err.contains("array"), "got: {err}");
    }

    #[test]
    fn null_field_is_absent() {
        let raw = RawPageExtraction::from_model_text(r#"{"vendor_name": null}"#).unwrap();
        assert_eq!(raw.field("vendor_name"), None);
        assert!(raw.is_empty());
    }

    #[test]
    fn line_items_make_page_non_empty() {
        let raw = RawPageExtraction::from_model_text(
            r#"{"line_items": [{"description": "Widget", "quantity": 1}]}"#,
        )
        .unwrap();
        assert!(!raw.is_empty());
        assert_eq!(raw.line_items().len(), 1);
    }

    #[test]
    fn canonical_invoice_serializes_line_items_always() {
        let inv = CanonicalInvoice::default();
        let v = serde_json::to_value(&inv).unwrap();
        assert!(v["line_items"].is_array());
        assert!(v["vendor_name"].is_null());
    }
}
