//! Page extraction driver: fan pages out to the provider, join in order.
//!
//! ## Degradation policy
//!
//! One bad page must not abort the document. A malformed model answer (or a
//! per-page timeout, its moral equivalent) gets exactly one retry with the
//! strict re-prompt; if that also fails the page degrades to an empty
//! extraction and a [`PageError`] is recorded on its outcome. Auth, rate
//! limit, and availability failures are different: they will hit every page,
//! so the first one aborts the whole document immediately.
//!
//! ## Ordering
//!
//! Pages run concurrently but the merge engine's policies are order
//! sensitive (first-non-null-wins headers, last-wins totals), so results are
//! joined by page index via `buffered`, never by completion order.

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, PageError, ProviderError};
use crate::invoice::RawPageExtraction;
use crate::output::PageOutcome;
use crate::pipeline::encode::{encode_page, PageImage};
use crate::prompts::extraction_prompt;
use crate::provider::VisionProvider;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// Run every page through the provider, preserving page order.
///
/// Returns one [`PageOutcome`] per input page. Degraded pages carry an empty
/// extraction plus their [`PageError`]; document-fatal provider errors
/// short-circuit and return `Err`.
pub async fn extract_pages(
    provider: &Arc<dyn VisionProvider>,
    pages: &[PageImage],
    config: &ExtractionConfig,
) -> Result<Vec<PageOutcome>, ExtractError> {
    let provider_name = provider.name().to_string();

    // try_collect stops at the first fatal error and drops the pending page
    // futures, so an auth or rate-limit failure never fans out to the
    // remaining pages.
    stream::iter(pages.iter().enumerate().map(|(idx, page)| {
        let provider = Arc::clone(provider);
        let page = page.clone();
        let config = config.clone();
        async move { extract_one_page(&provider, idx + 1, &page, &config).await }
    }))
    .buffered(config.concurrency)
    .map(|r| r.map_err(|e| e.into_extract_error(&provider_name)))
    .try_collect()
    .await
}

/// Drive a single page: encode, call, parse, retry once on malformed output.
///
/// Only document-fatal provider errors are returned as `Err`; everything
/// page-local ends up inside the `PageOutcome`.
async fn extract_one_page(
    provider: &Arc<dyn VisionProvider>,
    page_num: usize,
    page: &PageImage,
    config: &ExtractionConfig,
) -> Result<PageOutcome, ProviderError> {
    let start = Instant::now();

    let encoded = match encode_page(page, page_num) {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!("Page {}: {}", page_num, e);
            return Ok(degraded(page_num, e, start, false));
        }
    };

    let mut last_error: Option<PageError> = None;

    // Attempt 0 is the normal prompt; attempt 1 the strict re-prompt.
    for attempt in 0..=1u8 {
        let strict = attempt > 0;
        if strict {
            warn!(
                "Page {}: retrying with strict prompt after {}",
                page_num,
                last_error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_default()
            );
        }

        let prompt = extraction_prompt(strict);
        let call = provider.extract_page(&encoded, &prompt);

        let answer = match timeout(Duration::from_secs(config.api_timeout_secs), call).await {
            Err(_elapsed) => {
                // Timeout cancels only this page's call; degrade like a
                // malformed response rather than failing the document.
                last_error = Some(PageError::Timeout {
                    page: page_num,
                    secs: config.api_timeout_secs,
                });
                continue;
            }
            Ok(Err(e)) if e.is_fatal() => return Err(e),
            Ok(Err(ProviderError::MalformedResponse { detail })) => {
                last_error = Some(PageError::MalformedResponse {
                    page: page_num,
                    detail,
                });
                continue;
            }
            Ok(Err(e)) => return Err(e),
            Ok(Ok(text)) => text,
        };

        match RawPageExtraction::from_model_text(&answer) {
            Ok(raw) => {
                debug!(
                    "Page {}: {} line items in {:?}",
                    page_num,
                    raw.line_items().len(),
                    start.elapsed()
                );
                return Ok(PageOutcome {
                    page_num,
                    raw,
                    error: None,
                    duration_ms: start.elapsed().as_millis() as u64,
                    retried: strict,
                });
            }
            Err(detail) => {
                last_error = Some(PageError::MalformedResponse {
                    page: page_num,
                    detail,
                });
            }
        }
    }

    let error = last_error.unwrap_or(PageError::MalformedResponse {
        page: page_num,
        detail: "unknown".to_string(),
    });
    warn!("Page {}: degraded after strict retry: {}", page_num, error);
    Ok(degraded(page_num, error, start, true))
}

fn degraded(page_num: usize, error: PageError, start: Instant, retried: bool) -> PageOutcome {
    PageOutcome {
        page_num,
        raw: RawPageExtraction::empty(),
        error: Some(error),
        duration_ms: start.elapsed().as_millis() as u64,
        retried,
    }
}
