//! Output types: per-page outcomes, run statistics, and the final
//! [`ProcessingResult`] handed to the transport layer.

use crate::error::{PageError, Warning};
use crate::invoice::{CanonicalInvoice, RawPageExtraction};
use serde::{Deserialize, Serialize};

/// What happened to one page inside the extraction driver.
///
/// `raw` is empty when the page degraded; `error` says why. A degraded page
/// never fails the document on its own.
#[derive(Debug, Clone)]
pub struct PageOutcome {
    /// 1-indexed page number.
    pub page_num: usize,
    /// The page's field map; empty for degraded pages.
    pub raw: RawPageExtraction,
    /// Set when the page degraded after its single strict retry.
    pub error: Option<PageError>,
    /// Wall-clock time for this page including the retry, if any.
    pub duration_ms: u64,
    /// Whether the strict re-prompt was needed.
    pub retried: bool,
}

/// Timing and page-count statistics for one extraction run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages supplied by the caller.
    pub pages_total: usize,
    /// Pages that yielded a non-empty extraction.
    pub pages_extracted: usize,
    /// Pages that degraded to an empty extraction.
    pub pages_degraded: usize,
    /// End-to-end wall-clock time.
    pub total_duration_ms: u64,
    /// Time spent inside provider calls (wall-clock over the fan-out).
    pub provider_duration_ms: u64,
}

/// Successful extraction: the canonical invoice plus advisory context.
#[derive(Debug, Clone)]
pub struct ExtractionOutput {
    pub invoice: CanonicalInvoice,
    pub warnings: Vec<Warning>,
    pub stats: ExtractionStats,
}

/// The single envelope every caller receives: success with data and
/// optional warnings, or failure with a message. Never both, never a raw
/// fault. Created once per request and not mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub success: bool,
    pub pages_processed: usize,
    /// Present exactly when `success` is true.
    pub data: Option<CanonicalInvoice>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
    /// Present exactly when `success` is false.
    pub error: Option<String>,
    pub processing_time_ms: u64,
}

impl ProcessingResult {
    pub(crate) fn succeeded(output: ExtractionOutput) -> Self {
        Self {
            success: true,
            pages_processed: output.stats.pages_total,
            data: Some(output.invoice),
            warnings: output.warnings,
            error: None,
            processing_time_ms: output.stats.total_duration_ms,
        }
    }

    pub(crate) fn failed(message: String, pages: usize, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            pages_processed: pages,
            data: None,
            warnings: Vec::new(),
            error: Some(message),
            processing_time_ms: elapsed_ms,
        }
    }
}
