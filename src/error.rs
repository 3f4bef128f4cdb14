//! Error types for the invoice-extract library.
//!
//! Three distinct types reflect three distinct severities:
//!
//! * [`ExtractError`] — **Fatal**: the document cannot be processed at all
//!   (bad credentials, backend down, every page empty). Returned as
//!   `Err(ExtractError)` from [`crate::process::extract_invoice`] and
//!   reported as a failed [`crate::output::ProcessingResult`].
//!
//! * [`PageError`] — **Non-fatal**: a single page failed (unparseable model
//!   answer, per-page timeout) but the other pages are fine. Absorbed inside
//!   the page extraction driver; the page degrades to an empty extraction
//!   and the document still succeeds.
//!
//! * [`Warning`] — advisory findings attached to a successful result
//!   (conflicting header values across pages, totals that don't add up).
//!
//! The separation keeps the propagation policy explicit: page-level failures
//! never escape to the caller as errors, and fatal failures never carry
//! partial invoice data.

use thiserror::Error;

/// All fatal errors returned by the invoice-extract library.
///
/// Page-level failures use [`PageError`] and degrade the affected page
/// rather than propagating here.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No usable provider could be resolved (missing API key etc.).
    #[error("Vision provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Backend errors (document-fatal) ───────────────────────────────────
    /// The backend rejected our credentials (401/403). Retrying will not help.
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthError { provider: String, detail: String },

    /// The backend returned HTTP 429 — caller should back off.
    ///
    /// Check `retry_after_secs` for a server-specified delay.
    #[error("Rate limit exceeded for provider '{provider}'")]
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// The backend is unreachable or returned a 5xx for the document.
    #[error("Provider '{provider}' unavailable: {detail}")]
    BackendUnavailable { provider: String, detail: String },

    // ── Document errors ───────────────────────────────────────────────────
    /// The caller supplied zero page images.
    #[error("No page images supplied — nothing to extract")]
    NoPages,

    /// Every page yielded an empty extraction, even after retries.
    ///
    /// Returned instead of a success whose fields are all null, so callers
    /// can distinguish "blank invoice" from "extraction silently failed".
    #[error("No data extracted from any of the {pages} page(s)")]
    NoDataExtracted { pages: usize },
}

/// A non-fatal error for a single page.
///
/// Stored in [`crate::output::PageOutcome`] when a page degrades. The
/// overall extraction continues unless ALL pages end up empty.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The model's answer could not be parsed as the extraction JSON,
    /// even after one strict re-prompt.
    #[error("Page {page}: malformed model response: {detail}")]
    MalformedResponse { page: usize, detail: String },

    /// The backend call for this page exceeded the per-page timeout.
    #[error("Page {page}: provider call timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },

    /// The page image could not be decoded or re-encoded for upload.
    #[error("Page {page}: invalid page image: {detail}")]
    ImageInvalid { page: usize, detail: String },
}

impl PageError {
    /// 1-indexed page this error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::MalformedResponse { page, .. }
            | PageError::Timeout { page, .. }
            | PageError::ImageInvalid { page, .. } => *page,
        }
    }
}

/// An error from a single provider call, before the driver classifies it.
///
/// `Auth`, `RateLimited` and `Unavailable` abort the whole document;
/// `MalformedResponse` is retried once and then degrades the page.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("authentication rejected: {detail}")]
    Auth { detail: String },

    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("backend unavailable: {detail}")]
    Unavailable { detail: String },

    #[error("malformed response: {detail}")]
    MalformedResponse { detail: String },
}

impl ProviderError {
    /// Whether this error aborts the whole document (vs. degrading one page).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ProviderError::MalformedResponse { .. })
    }

    /// Lift a fatal provider error into the document-level taxonomy.
    pub(crate) fn into_extract_error(self, provider: &str) -> ExtractError {
        match self {
            ProviderError::Auth { detail } => ExtractError::AuthError {
                provider: provider.to_string(),
                detail,
            },
            ProviderError::RateLimited { retry_after_secs } => ExtractError::RateLimited {
                provider: provider.to_string(),
                retry_after_secs,
            },
            ProviderError::Unavailable { detail } => ExtractError::BackendUnavailable {
                provider: provider.to_string(),
                detail,
            },
            ProviderError::MalformedResponse { detail } => ExtractError::BackendUnavailable {
                provider: provider.to_string(),
                detail,
            },
        }
    }
}

/// Advisory finding attached to a successful extraction.
///
/// Warnings never fail the document; they exist so callers can audit merge
/// decisions and arithmetic inconsistencies the pipeline chose to tolerate.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A page produced no usable extraction and was skipped.
    PageDegraded { page: usize, detail: String },

    /// Two pages reported different non-null values for the same header field.
    /// The merge policy's pick is in `kept`; the loser in `ignored`.
    MergeConflict {
        field: String,
        kept: String,
        ignored: String,
    },

    /// `total_amount` deviates from subtotal + tax + shipping − discount.
    TotalsMismatch { expected: f64, actual: f64 },

    /// A line item's total deviates from quantity × unit_price.
    LineItemInconsistent {
        index: usize,
        expected: f64,
        actual: f64,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::PageDegraded { page, detail } => {
                write!(f, "page {page} degraded: {detail}")
            }
            Warning::MergeConflict {
                field,
                kept,
                ignored,
            } => write!(
                f,
                "conflicting values for '{field}': kept '{kept}', ignored '{ignored}'"
            ),
            Warning::TotalsMismatch { expected, actual } => write!(
                f,
                "total_amount {actual} deviates from computed total {expected}"
            ),
            Warning::LineItemInconsistent {
                index,
                expected,
                actual,
            } => write!(
                f,
                "line item {index}: total {actual} deviates from quantity × unit_price = {expected}"
            ),
        }
    }
}
