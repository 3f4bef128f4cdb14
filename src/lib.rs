//! # invoice-extract
//!
//! Extract structured invoice data from page images using Vision Language
//! Models (VLMs).
//!
//! ## Why this crate?
//!
//! Template-based invoice parsers break the moment a vendor changes their
//! layout, and OCR-plus-regex pipelines garble multi-column tables. Instead
//! this crate sends each page image to a VLM with a fixed extraction schema,
//! then merges, normalizes and cross-checks the per-page answers into one
//! strict, typed record. The model reads; deterministic code decides.
//!
//! ## Pipeline Overview
//!
//! ```text
//! page images
//!  │
//!  ├─ 1. Encode     validate + base64-wrap each page
//!  ├─ 2. Extract    concurrent VLM calls (claude / gemini), per-page
//!  │                timeout and one strict retry; bad pages degrade
//!  ├─ 3. Merge      first-wins headers, last-wins totals, concatenated
//!  │                line items; conflicts become warnings
//!  ├─ 4. Normalize  sentinels → null, "$1,234.50" → 1234.50, dates →
//!  │                YYYY-MM-DD, currency → ISO code
//!  ├─ 5. Validate   totals and line-item arithmetic cross-checks
//!  └─ 6. Output     CanonicalInvoice + warnings + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoice_extract::{extract_invoice, ExtractionConfig, PageImage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider picked via AI_PROVIDER (default: anthropic), key from
//!     // ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let pages = vec![PageImage::png(std::fs::read("invoice-p1.png")?)];
//!     let config = ExtractionConfig::default();
//!     let output = extract_invoice(&pages, &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&output.invoice)?);
//!     for warning in &output.warnings {
//!         eprintln!("warning: {warning}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `invoice-extract` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! invoice-extract = { version = "0.3", default-features = false }
//! ```
//!
//! ## Error model
//!
//! Per-page failures (unparseable model answer, timeout) degrade the page
//! and surface as warnings on a successful result. Document-fatal failures
//! (bad credentials, rate limit, backend down, every page empty) return
//! [`ExtractError`]. [`process_document`] folds both into a single
//! serializable [`ProcessingResult`] envelope.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod invoice;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod prompts;
pub mod provider;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, ProviderKind};
pub use error::{ExtractError, PageError, ProviderError, Warning};
pub use export::{line_item_rows, summary_rows, LineItemRow};
pub use invoice::{CanonicalInvoice, LineItem, RawPageExtraction};
pub use output::{ExtractionOutput, ExtractionStats, PageOutcome, ProcessingResult};
pub use pipeline::encode::{EncodedPage, PageFormat, PageImage};
pub use process::{extract_invoice, extract_invoice_sync, process_document};
pub use provider::{AnthropicProvider, GeminiProvider, VisionProvider};
