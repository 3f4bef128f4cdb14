//! Extraction prompts sent to the vision backends.
//!
//! Centralising the prompt here keeps the two provider adapters
//! interchangeable: both send exactly this instruction set, so the merge and
//! normalization stages never need to know which backend answered. Unit
//! tests can inspect the prompt without a live model.

/// The extraction instruction set, identical for every backend.
///
/// The schema below is the contract the rest of the pipeline relies on:
/// field names here must match [`crate::invoice::HEADER_FIELDS`] and
/// [`crate::invoice::TOTAL_FIELDS`].
pub const EXTRACTION_PROMPT: &str = r#"You are an expert invoice data extraction agent. Carefully analyze the invoice image and extract every piece of information visible.

Return ONLY a valid JSON object — no markdown, no explanation, no code fences.

Use this exact structure (set missing fields to null, not empty string):

{
    "vendor_name": "string",
    "vendor_address": "string",
    "vendor_email": "string",
    "vendor_phone": "string",
    "vendor_tax_id": "string",
    "client_name": "string",
    "client_address": "string",
    "client_email": "string",
    "invoice_number": "string",
    "invoice_date": "YYYY-MM-DD",
    "due_date": "YYYY-MM-DD",
    "purchase_order_number": "string",
    "currency": "3-letter ISO code e.g. USD",
    "line_items": [
        {
            "description": "string",
            "quantity": number,
            "unit_price": number,
            "total": number
        }
    ],
    "subtotal": number,
    "tax_rate": number,
    "tax_amount": number,
    "discount": number,
    "shipping": number,
    "total_amount": number,
    "payment_terms": "string",
    "payment_method": "string",
    "bank_account": "string",
    "notes": "string"
}

Rules:
- All monetary values must be plain numbers (no currency symbols or commas).
- Dates must be in YYYY-MM-DD format when possible; keep original if ambiguous.
- If a field is not present, use null.
- Do NOT invent or guess data that is not in the image."#;

/// Appended for the single retry after a malformed response.
///
/// Models that wrapped or truncated their first answer usually comply when
/// reminded that raw JSON is the only acceptable output.
pub const STRICT_RETRY_SUFFIX: &str = r#"

IMPORTANT: your previous answer was not parseable JSON. Respond with the raw
JSON object ONLY. The very first character of your reply must be '{' and the
last must be '}'. No code fences, no commentary, no leading text."#;

/// Build the prompt for a page, strict on the retry attempt.
pub fn extraction_prompt(strict: bool) -> String {
    if strict {
        format!("{EXTRACTION_PROMPT}{STRICT_RETRY_SUFFIX}")
    } else {
        EXTRACTION_PROMPT.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::{HEADER_FIELDS, TOTAL_FIELDS};

    #[test]
    fn prompt_names_every_schema_field() {
        for field in HEADER_FIELDS.iter().chain(TOTAL_FIELDS.iter()) {
            assert!(
                EXTRACTION_PROMPT.contains(&format!("\"{field}\"")),
                "prompt missing field {field}"
            );
        }
        assert!(EXTRACTION_PROMPT.contains("\"line_items\""));
    }

    #[test]
    fn strict_prompt_extends_base() {
        let strict = extraction_prompt(true);
        assert!(strict.starts_with(EXTRACTION_PROMPT));
        assert!(strict.contains("raw\nJSON object ONLY") || strict.contains("JSON object ONLY"));
        assert_eq!(extraction_prompt(false), EXTRACTION_PROMPT);
    }
}
