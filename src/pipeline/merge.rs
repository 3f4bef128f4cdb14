//! Merge engine: fold N per-page extractions into one pre-normalization record.
//!
//! Policies, deliberately asymmetric:
//!
//! * **Header and payment fields** — first-non-null-wins, scanning pages in
//!   order. Header data usually appears once on page 1, but the model may
//!   misplace it; scanning forward tolerates that.
//! * **Totals** — last-non-null-wins. Summary tables usually sit on the
//!   final page, so later pages are trusted over earlier ones.
//! * **Line items** — concatenated in page order, never deduplicated: a
//!   multi-page item table is split across pages, not repeated.
//!
//! When two pages disagree on a non-null value the losing value is recorded
//! as a [`Warning::MergeConflict`] so the pick is auditable, but the policy
//! is never overridden.

use crate::error::{ExtractError, Warning};
use crate::invoice::{HEADER_FIELDS, TOTAL_FIELDS};
use crate::output::PageOutcome;
use serde_json::{Map, Value};

/// Merge per-page extractions into one loose field map plus merge warnings.
///
/// Errors with [`ExtractError::NoDataExtracted`] when every page is empty —
/// an all-null "success" would be indistinguishable from a real extraction
/// of a blank document.
pub fn merge_pages(
    outcomes: &[PageOutcome],
) -> Result<(Map<String, Value>, Vec<Warning>), ExtractError> {
    if outcomes.iter().all(|o| o.raw.is_empty()) {
        return Err(ExtractError::NoDataExtracted {
            pages: outcomes.len(),
        });
    }

    let mut merged = Map::new();
    let mut warnings = Vec::new();

    for field in HEADER_FIELDS {
        if let Some(value) = merge_first_wins(outcomes, field, &mut warnings) {
            merged.insert((*field).to_string(), value);
        }
    }

    for field in TOTAL_FIELDS {
        if let Some(value) = merge_last_wins(outcomes, field, &mut warnings) {
            merged.insert((*field).to_string(), value);
        }
    }

    let line_items: Vec<Value> = outcomes
        .iter()
        .flat_map(|o| o.raw.line_items().iter().cloned())
        .collect();
    merged.insert("line_items".to_string(), Value::Array(line_items));

    Ok((merged, warnings))
}

/// First non-null value in page order wins; later disagreements are warned.
fn merge_first_wins(
    outcomes: &[PageOutcome],
    field: &str,
    warnings: &mut Vec<Warning>,
) -> Option<Value> {
    let mut kept: Option<&Value> = None;
    for outcome in outcomes {
        if let Some(value) = outcome.raw.field(field) {
            match kept {
                None => kept = Some(value),
                Some(first) if first != value => warnings.push(Warning::MergeConflict {
                    field: field.to_string(),
                    kept: display_value(first),
                    ignored: display_value(value),
                }),
                Some(_) => {}
            }
        }
    }
    kept.cloned()
}

/// Last non-null value in page order wins; earlier disagreements are warned.
fn merge_last_wins(
    outcomes: &[PageOutcome],
    field: &str,
    warnings: &mut Vec<Warning>,
) -> Option<Value> {
    let non_null: Vec<&Value> = outcomes
        .iter()
        .filter_map(|o| o.raw.field(field))
        .collect();

    let kept = *non_null.last()?;
    for earlier in &non_null[..non_null.len() - 1] {
        if *earlier != kept {
            warnings.push(Warning::MergeConflict {
                field: field.to_string(),
                kept: display_value(kept),
                ignored: display_value(earlier),
            });
        }
    }
    Some(kept.clone())
}

fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
