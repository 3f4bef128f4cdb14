//! Document-level entry points.
//!
//! [`extract_invoice`] is the library API: it runs the whole pipeline and
//! returns `Result`, so callers can match on the error taxonomy.
//! [`process_document`] is the transport-facing wrapper: it absorbs every
//! fatal error into a failed [`ProcessingResult`] so the caller always gets
//! one well-formed envelope, never a fault.

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, Warning};
use crate::output::{ExtractionOutput, ExtractionStats, ProcessingResult};
use crate::pipeline::encode::PageImage;
use crate::pipeline::{driver, merge, normalize};
use crate::provider::resolve_provider;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract one invoice from its page images.
///
/// # Returns
/// `Ok(ExtractionOutput)` on success, even if some pages degraded (check
/// `output.stats.pages_degraded` and the warnings).
///
/// # Errors
/// Returns `Err(ExtractError)` only for document-fatal conditions:
/// - no pages supplied, or no provider configured
/// - authentication, rate-limit, or availability failures from the backend
/// - every page degraded to an empty extraction
pub async fn extract_invoice(
    pages: &[PageImage],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let total_start = Instant::now();

    if pages.is_empty() {
        return Err(ExtractError::NoPages);
    }
    info!("Starting extraction: {} page(s)", pages.len());

    // ── Step 1: Resolve provider ─────────────────────────────────────────
    let provider = resolve_provider(config)?;
    debug!("Using provider '{}'", provider.name());

    // ── Step 2: Fan pages out to the provider ────────────────────────────
    let provider_start = Instant::now();
    let outcomes = driver::extract_pages(&provider, pages, config).await?;
    let provider_duration_ms = provider_start.elapsed().as_millis() as u64;

    let mut warnings: Vec<Warning> = outcomes
        .iter()
        .filter_map(|o| {
            o.error.as_ref().map(|e| Warning::PageDegraded {
                page: o.page_num,
                detail: e.to_string(),
            })
        })
        .collect();

    // ── Step 3: Merge per-page extractions ───────────────────────────────
    let (merged, merge_warnings) = merge::merge_pages(&outcomes)?;
    warnings.extend(merge_warnings);

    // ── Step 4: Normalize and cross-check ────────────────────────────────
    let (invoice, check_warnings) = normalize::normalize(&merged, config.totals_tolerance);
    warnings.extend(check_warnings);

    // ── Step 5: Compute stats ────────────────────────────────────────────
    let degraded = outcomes.iter().filter(|o| o.error.is_some()).count();
    let stats = ExtractionStats {
        pages_total: pages.len(),
        pages_extracted: pages.len() - degraded,
        pages_degraded: degraded,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        provider_duration_ms,
    };

    for w in &warnings {
        warn!("{w}");
    }
    info!(
        "Extraction complete: {}/{} pages, {} warning(s), {}ms total",
        stats.pages_extracted,
        stats.pages_total,
        warnings.len(),
        stats.total_duration_ms
    );

    Ok(ExtractionOutput {
        invoice,
        warnings,
        stats,
    })
}

/// Run [`extract_invoice`] and fold the outcome into a [`ProcessingResult`].
///
/// Never returns an error: fatal conditions become `success: false` with the
/// error's display text, so transports can serialize the result as-is.
pub async fn process_document(
    pages: &[PageImage],
    config: &ExtractionConfig,
) -> ProcessingResult {
    let start = Instant::now();
    match extract_invoice(pages, config).await {
        Ok(output) => ProcessingResult::succeeded(output),
        Err(e) => {
            warn!("Extraction failed: {e}");
            ProcessingResult::failed(
                e.to_string(),
                pages.len(),
                start.elapsed().as_millis() as u64,
            )
        }
    }
}

/// Synchronous wrapper around [`extract_invoice`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_invoice_sync(
    pages: &[PageImage],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::InvalidConfig(format!("failed to create tokio runtime: {e}")))?
        .block_on(extract_invoice(pages, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_pages_is_fatal() {
        let config = ExtractionConfig::default();
        let err = extract_invoice(&[], &config).await.unwrap_err();
        assert!(matches!(err, ExtractError::NoPages));
    }

    #[tokio::test]
    async fn process_document_absorbs_fatal_errors() {
        let config = ExtractionConfig::default();
        let result = process_document(&[], &config).await;
        assert!(!result.success);
        assert!(result.data.is_none());
        assert!(result.error.is_some());
    }
}
