//! Tabular projections of a [`CanonicalInvoice`].
//!
//! Two flat views, ready to hand to any spreadsheet or CSV writer:
//!
//! * [`summary_rows`] — one label/value pair per invoice field, in a fixed
//!   human-reading order (vendor block, client block, invoice metadata,
//!   totals, payment, notes). Missing fields render as empty strings so the
//!   layout is stable across invoices.
//! * [`line_item_rows`] — one row per line item plus a trailing `TOTAL` row
//!   summing the item totals.
//!
//! Pure projection: no I/O, no mutation of the record.

use crate::invoice::CanonicalInvoice;

/// One line-item row, all cells pre-rendered as strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItemRow {
    pub description: String,
    pub quantity: String,
    pub unit_price: String,
    pub total: String,
}

/// Label/value summary rows in fixed order.
pub fn summary_rows(invoice: &CanonicalInvoice) -> Vec<(String, String)> {
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    let money = |v: &Option<f64>| v.map(fmt_money).unwrap_or_default();
    let number = |v: &Option<f64>| v.map(fmt_number).unwrap_or_default();

    let fields = [
        ("Vendor Name", text(&invoice.vendor_name)),
        ("Vendor Address", text(&invoice.vendor_address)),
        ("Vendor Email", text(&invoice.vendor_email)),
        ("Vendor Phone", text(&invoice.vendor_phone)),
        ("Vendor Tax ID", text(&invoice.vendor_tax_id)),
        ("Client Name", text(&invoice.client_name)),
        ("Client Address", text(&invoice.client_address)),
        ("Client Email", text(&invoice.client_email)),
        ("Invoice Number", text(&invoice.invoice_number)),
        ("Invoice Date", text(&invoice.invoice_date)),
        ("Due Date", text(&invoice.due_date)),
        ("PO Number", text(&invoice.purchase_order_number)),
        ("Currency", text(&invoice.currency)),
        ("Subtotal", money(&invoice.subtotal)),
        ("Tax Rate", number(&invoice.tax_rate)),
        ("Tax Amount", money(&invoice.tax_amount)),
        ("Discount", money(&invoice.discount)),
        ("Shipping", money(&invoice.shipping)),
        ("Total Amount", money(&invoice.total_amount)),
        ("Payment Terms", text(&invoice.payment_terms)),
        ("Payment Method", text(&invoice.payment_method)),
        ("Bank Account", text(&invoice.bank_account)),
        ("Notes", text(&invoice.notes)),
    ];

    fields
        .into_iter()
        .map(|(label, value)| (label.to_string(), value))
        .collect()
}

/// Line-item rows plus the trailing `TOTAL` row.
///
/// The totals row sums the extracted item totals, not the invoice's
/// `total_amount`; a gap between the two is exactly what the validator's
/// warnings point at.
pub fn line_item_rows(invoice: &CanonicalInvoice) -> Vec<LineItemRow> {
    let mut rows: Vec<LineItemRow> = invoice
        .line_items
        .iter()
        .map(|item| LineItemRow {
            description: item.description.clone(),
            quantity: item.quantity.map(fmt_number).unwrap_or_default(),
            unit_price: item.unit_price.map(fmt_money).unwrap_or_default(),
            total: item.total.map(fmt_money).unwrap_or_default(),
        })
        .collect();

    // An empty f64 sum is -0.0; adding positive zero clears the sign so
    // the cell renders "0.00", not "-0.00".
    let sum: f64 = invoice.line_items.iter().filter_map(|i| i.total).sum::<f64>() + 0.0;
    rows.push(LineItemRow {
        description: "TOTAL".to_string(),
        quantity: String::new(),
        unit_price: String::new(),
        total: fmt_money(sum),
    });

    rows
}

/// Money cells: always two decimals.
fn fmt_money(n: f64) -> String {
    format!("{n:.2}")
}

/// Quantities and rates: drop the decimals when the value is whole.
fn fmt_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::LineItem;

    fn invoice() -> CanonicalInvoice {
        CanonicalInvoice {
            vendor_name: Some("Acme GmbH".into()),
            invoice_number: Some("INV-42".into()),
            subtotal: Some(100.0),
            total_amount: Some(110.0),
            line_items: vec![
                LineItem {
                    description: "Widget".into(),
                    quantity: Some(2.0),
                    unit_price: Some(25.0),
                    total: Some(50.0),
                },
                LineItem {
                    description: "Gadget".into(),
                    quantity: Some(0.5),
                    unit_price: Some(100.0),
                    total: Some(50.0),
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn summary_has_fixed_row_count() {
        let full = summary_rows(&invoice());
        let empty = summary_rows(&CanonicalInvoice::default());
        assert_eq!(full.len(), empty.len(), "layout must not vary per invoice");
    }

    #[test]
    fn summary_renders_missing_as_empty() {
        let rows = summary_rows(&invoice());
        let get = |label: &str| {
            rows.iter()
                .find(|(l, _)| l == label)
                .map(|(_, v)| v.as_str())
                .unwrap()
        };
        assert_eq!(get("Vendor Name"), "Acme GmbH");
        assert_eq!(get("Subtotal"), "100.00");
        assert_eq!(get("Client Name"), "");
    }

    #[test]
    fn line_items_end_with_totals_row() {
        let rows = line_item_rows(&invoice());
        assert_eq!(rows.len(), 3);
        let totals = rows.last().unwrap();
        assert_eq!(totals.description, "TOTAL");
        assert_eq!(totals.total, "100.00");
        assert!(totals.quantity.is_empty());
    }

    #[test]
    fn fractional_quantities_keep_precision() {
        let rows = line_item_rows(&invoice());
        assert_eq!(rows[0].quantity, "2");
        assert_eq!(rows[1].quantity, "0.5");
    }

    #[test]
    fn empty_invoice_still_yields_totals_row() {
        let rows = line_item_rows(&CanonicalInvoice::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total, "0.00");
    }
}
