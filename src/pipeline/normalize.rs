//! Normalizer/validator: merged loose fields → strict [`CanonicalInvoice`].
//!
//! Deterministic coercion rules applied to every field of the merged map:
//!
//! 1. Sentinel strings (`"N/A"`, `"-"`, `""`, `"none"`, `"null"`,
//!    case-insensitive, trimmed) become null on every field.
//! 2. Numeric fields accept numbers or numeric-looking strings — currency
//!    symbols, thousands separators, and surrounding text are stripped
//!    (`"$1,234.50"` → `1234.50`). Anything that still fails to parse
//!    becomes null, never an error. Negative money/quantity becomes null.
//! 3. Date fields are parsed against a fixed format list and re-rendered as
//!    `YYYY-MM-DD`; unparseable dates become null.
//! 4. Currency is canonicalized to a known 3-letter ISO code (with a symbol
//!    map for `$`, `€`, `£`, `¥`); unrecognizable values become null.
//! 5. Totals and per-line-item arithmetic are cross-checked and flagged via
//!    warnings — the printed values are kept, never corrected.
//!
//! The function is a fixed point: feeding an already-canonical record back
//! through produces the identical record.

use crate::error::Warning;
use crate::invoice::{CanonicalInvoice, LineItem};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Characters that may decorate a number without changing its value.
static RE_NUMERIC_JUNK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d.\-]").unwrap());

/// Date formats accepted, most common first. `%m/%d/%Y` is tried before
/// `%d/%m/%Y`, so the day-first reading only applies when month-first
/// cannot parse (e.g. `25/12/2025`).
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Currency codes the canonicalizer recognizes. Anything else is null
/// rather than a guess.
const KNOWN_CURRENCIES: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "CNY", "AUD", "CAD", "CHF", "INR", "SEK", "NOK", "DKK", "NZD",
    "SGD", "HKD", "KRW", "BRL", "MXN", "ZAR", "PLN", "CZK", "AED", "SAR", "TRY", "THB", "IDR",
    "MYR", "PHP", "VND", "ILS", "TWD",
];

/// Normalize the merged field map into the canonical record.
///
/// `tolerance` is the relative deviation allowed before arithmetic
/// mismatches are flagged.
pub fn normalize(merged: &Map<String, Value>, tolerance: f64) -> (CanonicalInvoice, Vec<Warning>) {
    let text = |name: &str| merged.get(name).and_then(norm_string);
    let money = |name: &str| merged.get(name).and_then(norm_nonneg_number);
    let date = |name: &str| merged.get(name).and_then(norm_date);

    let line_items: Vec<LineItem> = merged
        .get("line_items")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(norm_line_item).collect())
        .unwrap_or_default();

    let invoice = CanonicalInvoice {
        vendor_name: text("vendor_name"),
        vendor_address: text("vendor_address"),
        vendor_email: text("vendor_email"),
        vendor_phone: text("vendor_phone"),
        vendor_tax_id: text("vendor_tax_id"),
        client_name: text("client_name"),
        client_address: text("client_address"),
        client_email: text("client_email"),
        invoice_number: text("invoice_number"),
        invoice_date: date("invoice_date"),
        due_date: date("due_date"),
        purchase_order_number: text("purchase_order_number"),
        currency: merged.get("currency").and_then(norm_currency),
        line_items,
        subtotal: money("subtotal"),
        tax_rate: merged.get("tax_rate").and_then(norm_number),
        tax_amount: money("tax_amount"),
        discount: money("discount"),
        shipping: money("shipping"),
        total_amount: money("total_amount"),
        payment_terms: text("payment_terms"),
        payment_method: text("payment_method"),
        bank_account: text("bank_account"),
        notes: text("notes"),
    };

    let warnings = cross_check(&invoice, tolerance);
    (invoice, warnings)
}

/// Arithmetic consistency checks. Flags, never corrects.
fn cross_check(invoice: &CanonicalInvoice, tolerance: f64) -> Vec<Warning> {
    let mut warnings = Vec::new();

    if let (Some(subtotal), Some(tax), Some(discount), Some(shipping), Some(actual)) = (
        invoice.subtotal,
        invoice.tax_amount,
        invoice.discount,
        invoice.shipping,
        invoice.total_amount,
    ) {
        let expected = subtotal + tax + shipping - discount;
        if relative_deviation(expected, actual) > tolerance {
            warnings.push(Warning::TotalsMismatch { expected, actual });
        }
    }

    for (i, item) in invoice.line_items.iter().enumerate() {
        if let (Some(quantity), Some(unit_price), Some(actual)) =
            (item.quantity, item.unit_price, item.total)
        {
            let expected = quantity * unit_price;
            if relative_deviation(expected, actual) > tolerance {
                warnings.push(Warning::LineItemInconsistent {
                    index: i + 1,
                    expected,
                    actual,
                });
            }
        }
    }

    warnings
}

fn relative_deviation(expected: f64, actual: f64) -> f64 {
    (actual - expected).abs() / expected.abs().max(1.0)
}

/// True for the common "absent" sentinels providers emit instead of null.
fn is_sentinel(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "" | "n/a" | "-" | "none" | "null"
    )
}

/// String fields: trim, drop sentinels, stringify stray numbers.
fn norm_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if is_sentinel(s) => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numeric fields: numbers pass through, decorated strings are stripped
/// and parsed, everything else is null.
fn norm_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            if is_sentinel(s) {
                return None;
            }
            let cleaned = RE_NUMERIC_JUNK.replace_all(s, "");
            if !cleaned.chars().any(|c| c.is_ascii_digit()) {
                return None;
            }
            cleaned.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Money and quantities cannot be negative; a negative value is treated as
/// unextractable rather than inverted.
fn norm_nonneg_number(v: &Value) -> Option<f64> {
    norm_number(v).filter(|n| *n >= 0.0)
}

fn norm_date(v: &Value) -> Option<String> {
    let s = norm_string(v)?;
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&s, fmt).ok())
        .map(|d| d.format("%Y-%m-%d").to_string())
}

fn norm_currency(v: &Value) -> Option<String> {
    let s = norm_string(v)?;
    let code = match s.trim() {
        "$" => "USD".to_string(),
        "€" => "EUR".to_string(),
        "£" => "GBP".to_string(),
        "¥" => "JPY".to_string(),
        other => other.to_uppercase(),
    };
    KNOWN_CURRENCIES.contains(&code.as_str()).then_some(code)
}

/// A line item row. Non-object entries are dropped; a missing description
/// becomes an empty string so the row (and the item count) survives.
fn norm_line_item(v: &Value) -> Option<LineItem> {
    let obj = v.as_object()?;
    Some(LineItem {
        description: obj
            .get("description")
            .and_then(norm_string)
            .unwrap_or_default(),
        quantity: obj.get("quantity").and_then(norm_nonneg_number),
        unit_price: obj.get("unit_price").and_then(norm_nonneg_number),
        total: obj.get("total").and_then(norm_nonneg_number),
    })
}
