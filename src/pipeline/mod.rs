//! Pipeline stages for invoice extraction.
//!
//! Each submodule implements exactly one transformation step. Keeping stages
//! separate makes each independently testable and lets us swap one out (e.g.
//! a different merge policy) without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! encode ──▶ driver ──▶ merge ──▶ normalize
//! (base64)   (vision    (N page   (canonical
//!             fan-out)   maps→1)   record)
//! ```
//!
//! 1. [`encode`]    — validate each page image and base64-wrap it for the
//!    multimodal API request body
//! 2. [`driver`]    — fan pages out to the vision provider with bounded
//!    concurrency, per-page timeout and one strict retry; the only stage
//!    with network I/O
//! 3. [`merge`]     — fold the per-page field maps into one record
//!    (first-wins headers, last-wins totals, concatenated line items)
//! 4. [`normalize`] — coerce the merged map into the strict canonical
//!    invoice and cross-check its arithmetic

pub mod driver;
pub mod encode;
pub mod merge;
pub mod normalize;
