//! Full-pipeline integration tests for invoice-extract.
//!
//! Every test drives the public API ([`extract_invoice`] /
//! [`process_document`]) end to end through a scripted in-process provider,
//! so no network access or API key is needed. Each provider answer stands in
//! for one page's model response, in page order.

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use invoice_extract::{
    extract_invoice, process_document, EncodedPage, ExtractError, ExtractionConfig, PageImage,
    ProviderError, VisionProvider, Warning,
};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn png_page() -> PageImage {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([255; 4])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    PageImage::png(buf)
}

fn pages(n: usize) -> Vec<PageImage> {
    (0..n).map(|_| png_page()).collect()
}

/// Provider that pops one scripted answer per call, in call order.
/// An optional per-call delay simulates slow backends.
struct Scripted {
    answers: Mutex<Vec<(Result<String, ProviderError>, Duration)>>,
}

impl Scripted {
    fn new<I>(answers: I) -> Arc<Self>
    where
        I: IntoIterator<Item = Result<String, ProviderError>>,
    {
        Self::with_delays(answers.into_iter().map(|a| (a, Duration::ZERO)))
    }

    fn with_delays<I>(answers: I) -> Arc<Self>
    where
        I: IntoIterator<Item = (Result<String, ProviderError>, Duration)>,
    {
        Arc::new(Self {
            answers: Mutex::new(answers.into_iter().collect()),
        })
    }
}

#[async_trait]
impl VisionProvider for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn extract_page(
        &self,
        _page: &EncodedPage,
        _prompt: &str,
    ) -> Result<String, ProviderError> {
        let (answer, delay) = self.answers.lock().unwrap().remove(0);
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }
        answer
    }
}

fn config_with(provider: Arc<Scripted>) -> ExtractionConfig {
    ExtractionConfig::builder()
        .provider(provider)
        .concurrency(1)
        .build()
        .unwrap()
}

fn ok(json: &str) -> Result<String, ProviderError> {
    Ok(json.to_string())
}

// ── Merge policies through the whole pipeline ────────────────────────────────

#[tokio::test]
async fn header_fields_take_first_non_null_across_pages() {
    let provider = Scripted::new([
        ok(r#"{"vendor_name": null, "invoice_number": "INV-1"}"#),
        ok(r#"{"vendor_name": "Acme GmbH", "invoice_number": "INV-9"}"#),
    ]);
    let output = extract_invoice(&pages(2), &config_with(provider))
        .await
        .unwrap();

    assert_eq!(output.invoice.vendor_name.as_deref(), Some("Acme GmbH"));
    // Page 1 answered first, so its invoice number wins despite page 2.
    assert_eq!(output.invoice.invoice_number.as_deref(), Some("INV-1"));
    assert!(output
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::MergeConflict { field, .. } if field == "invoice_number")));
}

#[tokio::test]
async fn totals_take_last_non_null_across_pages() {
    let provider = Scripted::new([
        ok(r#"{"total_amount": 100.0, "subtotal": 90.0}"#),
        ok(r#"{"total_amount": 250.0}"#),
    ]);
    let output = extract_invoice(&pages(2), &config_with(provider))
        .await
        .unwrap();

    assert_eq!(output.invoice.total_amount, Some(250.0));
    // Page 2 never reported a subtotal, so page 1's survives.
    assert_eq!(output.invoice.subtotal, Some(90.0));
}

#[tokio::test]
async fn line_items_concatenate_across_pages_without_dedup() {
    let provider = Scripted::new([
        ok(r#"{"line_items": [
            {"description": "Widget", "quantity": 1, "unit_price": 10, "total": 10},
            {"description": "Widget", "quantity": 1, "unit_price": 10, "total": 10}
        ]}"#),
        ok(r#"{"line_items": [
            {"description": "Gadget", "quantity": 2, "unit_price": 5, "total": 10}
        ]}"#),
    ]);
    let output = extract_invoice(&pages(2), &config_with(provider))
        .await
        .unwrap();

    let descriptions: Vec<&str> = output
        .invoice
        .line_items
        .iter()
        .map(|i| i.description.as_str())
        .collect();
    assert_eq!(descriptions, vec!["Widget", "Widget", "Gadget"]);
}

#[tokio::test]
async fn page_order_is_preserved_under_concurrency() {
    // Page 1 is slow; merge policies still see it first.
    let provider = Scripted::with_delays([
        (
            ok(r#"{"vendor_name": "First Page Vendor"}"#),
            Duration::from_millis(50),
        ),
        (ok(r#"{"vendor_name": "Second Page Vendor"}"#), Duration::ZERO),
        (ok(r#"{"vendor_name": "Third Page Vendor"}"#), Duration::ZERO),
    ]);
    let config = ExtractionConfig::builder()
        .provider(provider)
        .concurrency(3)
        .build()
        .unwrap();

    let output = extract_invoice(&pages(3), &config).await.unwrap();
    assert_eq!(
        output.invoice.vendor_name.as_deref(),
        Some("First Page Vendor")
    );
}

// ── Degradation and retry ────────────────────────────────────────────────────

#[tokio::test]
async fn malformed_page_retries_once_then_document_still_succeeds() {
    let provider = Scripted::new([
        ok("I'm sorry, I cannot read this image."),
        ok("still not JSON"),
        ok(r#"{"vendor_name": "Acme", "total_amount": 42.0}"#),
    ]);
    let output = extract_invoice(&pages(2), &config_with(provider))
        .await
        .unwrap();

    assert_eq!(output.stats.pages_degraded, 1);
    assert_eq!(output.stats.pages_extracted, 1);
    assert_eq!(output.invoice.vendor_name.as_deref(), Some("Acme"));
    assert!(output
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::PageDegraded { page: 1, .. })));
}

#[tokio::test]
async fn all_pages_empty_is_no_data_extracted() {
    let provider = Scripted::new([ok("{}"), ok(r#"{"vendor_name": null}"#)]);
    let err = extract_invoice(&pages(2), &config_with(provider))
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::NoDataExtracted { pages: 2 }));
}

#[tokio::test]
async fn auth_failure_aborts_the_document() {
    let provider = Scripted::new([Err(ProviderError::Auth {
        detail: "invalid api key".into(),
    })]);
    let err = extract_invoice(&pages(1), &config_with(provider))
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::AuthError { .. }));
}

#[tokio::test]
async fn rate_limit_aborts_with_retry_after() {
    let provider = Scripted::new([Err(ProviderError::RateLimited {
        retry_after_secs: Some(30),
    })]);
    let err = extract_invoice(&pages(1), &config_with(provider))
        .await
        .unwrap_err();
    match err {
        ExtractError::RateLimited {
            retry_after_secs, ..
        } => assert_eq!(retry_after_secs, Some(30)),
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn per_page_timeout_consumes_the_retry_and_degrades() {
    let provider = Scripted::with_delays([
        (ok(r#"{"vendor_name": "too late"}"#), Duration::from_secs(5)),
        (ok(r#"{"vendor_name": "too late"}"#), Duration::from_secs(5)),
        (ok(r#"{"vendor_name": "Acme"}"#), Duration::ZERO),
    ]);
    let config = ExtractionConfig::builder()
        .provider(provider)
        .concurrency(1)
        .api_timeout_secs(1)
        .build()
        .unwrap();

    let output = extract_invoice(&pages(2), &config).await.unwrap();
    assert_eq!(output.stats.pages_degraded, 1);
    assert_eq!(output.invoice.vendor_name.as_deref(), Some("Acme"));
}

// ── Normalization through the whole pipeline ─────────────────────────────────

#[tokio::test]
async fn sentinels_and_decorated_values_normalize() {
    let provider = Scripted::new([ok(r#"{
        "vendor_name": "N/A",
        "client_name": "  Globex Corp  ",
        "invoice_date": "03/07/2025",
        "currency": "$",
        "subtotal": "$1,234.50",
        "tax_rate": "8.25%",
        "notes": "-"
    }"#)]);
    let output = extract_invoice(&pages(1), &config_with(provider))
        .await
        .unwrap();

    let inv = &output.invoice;
    assert_eq!(inv.vendor_name, None);
    assert_eq!(inv.client_name.as_deref(), Some("Globex Corp"));
    assert_eq!(inv.invoice_date.as_deref(), Some("2025-03-07"));
    assert_eq!(inv.currency.as_deref(), Some("USD"));
    assert_eq!(inv.subtotal, Some(1234.50));
    assert_eq!(inv.tax_rate, Some(8.25));
    assert_eq!(inv.notes, None);
}

#[tokio::test]
async fn totals_mismatch_is_flagged_but_value_kept() {
    let provider = Scripted::new([ok(r#"{
        "subtotal": 100.0,
        "tax_amount": 10.0,
        "discount": 0.0,
        "shipping": 0.0,
        "total_amount": 500.0
    }"#)]);
    let output = extract_invoice(&pages(1), &config_with(provider))
        .await
        .unwrap();

    assert_eq!(output.invoice.total_amount, Some(500.0));
    assert!(output
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::TotalsMismatch { actual, .. } if *actual == 500.0)));
}

#[tokio::test]
async fn fenced_json_answers_are_accepted() {
    let provider = Scripted::new([ok(
        "```json\n{\"vendor_name\": \"Acme\", \"total_amount\": 10}\n```",
    )]);
    let output = extract_invoice(&pages(1), &config_with(provider))
        .await
        .unwrap();
    assert_eq!(output.invoice.vendor_name.as_deref(), Some("Acme"));
    assert_eq!(output.stats.pages_degraded, 0);
}

// ── ProcessingResult envelope ────────────────────────────────────────────────

#[tokio::test]
async fn envelope_success_carries_data_and_warnings_only() {
    let provider = Scripted::new([
        ok("garbage"),
        ok("more garbage"),
        ok(r#"{"vendor_name": "Acme"}"#),
    ]);
    let result = process_document(&pages(2), &config_with(provider)).await;

    assert!(result.success);
    assert!(result.error.is_none());
    assert!(!result.warnings.is_empty());
    assert_eq!(result.pages_processed, 2);
    assert_eq!(result.data.unwrap().vendor_name.as_deref(), Some("Acme"));
}

#[tokio::test]
async fn envelope_failure_carries_message_and_no_data() {
    let provider = Scripted::new([Err(ProviderError::Unavailable {
        detail: "connection refused".into(),
    })]);
    let result = process_document(&pages(1), &config_with(provider)).await;

    assert!(!result.success);
    assert!(result.data.is_none());
    assert!(result.error.unwrap().contains("unavailable"));
}

#[tokio::test]
async fn envelope_serializes_round_trip() {
    let provider = Scripted::new([ok(r#"{"vendor_name": "Acme", "line_items": [
        {"description": "Widget", "quantity": 2, "unit_price": 5, "total": 10}
    ]}"#)]);
    let result = process_document(&pages(1), &config_with(provider)).await;

    let json = serde_json::to_string(&result).unwrap();
    let parsed: invoice_extract::ProcessingResult = serde_json::from_str(&json).unwrap();
    assert!(parsed.success);
    assert_eq!(parsed.data.unwrap().line_items.len(), 1);
}
