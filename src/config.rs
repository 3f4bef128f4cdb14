//! Configuration for invoice extraction runs.
//!
//! Everything a run needs lives in [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`]. One struct keeps configs cheap to clone
//! across page tasks and easy to log and diff between runs.
//!
//! # Design choice: builder over constructor
//! Callers set only the knobs they care about and get documented defaults
//! for the rest; adding a field later never breaks call sites.

use crate::error::ExtractError;
use crate::provider::VisionProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Which vision backend serves this process.
///
/// Fixed for the lifetime of a config; it must not change mid-request, so
/// there is deliberately no setter on a built [`ExtractionConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Anthropic Claude via the Messages API.
    Anthropic,
    /// Google Gemini via the generateContent API.
    Gemini,
}

impl ProviderKind {
    /// Model used when the caller names none.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "claude-sonnet-4-6",
            ProviderKind::Gemini => "gemini-1.5-pro",
        }
    }

    /// Environment variable holding this backend's API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Anthropic => write!(f, "anthropic"),
            ProviderKind::Gemini => write!(f, "gemini"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            other => Err(format!(
                "unknown provider '{other}'. Valid options: anthropic, gemini"
            )),
        }
    }
}

/// Configuration for one or more extraction runs.
///
/// # Example
/// ```rust
/// use invoice_extract::{ExtractionConfig, ProviderKind};
///
/// let config = ExtractionConfig::builder()
///     .provider_kind(ProviderKind::Anthropic)
///     .api_key("sk-ant-...")
///     .concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Which backend to call. If `None`, resolved from `AI_PROVIDER`
    /// (default: anthropic) when the provider is constructed.
    pub provider_kind: Option<ProviderKind>,

    /// Backend API key. If `None`, read from the backend's key variable
    /// (`ANTHROPIC_API_KEY` / `GEMINI_API_KEY`).
    pub api_key: Option<String>,

    /// Model identifier. If `None`, the backend's default model is used
    /// (overridable via `CLAUDE_MODEL` / `GEMINI_MODEL`).
    pub model: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_kind`.
    /// Useful in tests or when the caller wraps the provider in middleware.
    pub provider: Option<Arc<dyn VisionProvider>>,

    /// Concurrent per-page provider calls. Default: 4.
    ///
    /// Page extractions are independent and network-bound; fanning out cuts
    /// wall-clock time roughly linearly until the backend rate-limits.
    pub concurrency: usize,

    /// Maximum tokens the model may generate per page. Default: 4096.
    ///
    /// Dense line-item tables can run long; too low a cap truncates the JSON
    /// mid-object and the page degrades for no good reason.
    pub max_tokens: usize,

    /// Per-page provider call timeout in seconds. Default: 60.
    ///
    /// A timed-out page degrades on its own; sibling pages are unaffected.
    pub api_timeout_secs: u64,

    /// Relative tolerance for totals cross-checks. Default: 0.01.
    ///
    /// Covers rounding differences between the printed total and the sum of
    /// its parts; anything beyond it is flagged, never corrected.
    pub totals_tolerance: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            provider_kind: None,
            api_key: None,
            model: None,
            provider: None,
            concurrency: 4,
            max_tokens: 4096,
            api_timeout_secs: 60,
            totals_tolerance: 0.01,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("provider_kind", &self.provider_kind)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn VisionProvider>"))
            .field("concurrency", &self.concurrency)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("totals_tolerance", &self.totals_tolerance)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn provider_kind(mut self, kind: ProviderKind) -> Self {
        self.config.provider_kind = Some(kind);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn VisionProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn totals_tolerance(mut self, tol: f64) -> Self {
        self.config.totals_tolerance = tol.max(0.0);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(ExtractError::InvalidConfig("concurrency must be ≥ 1".into()));
        }
        if c.max_tokens == 0 {
            return Err(ExtractError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if !c.totals_tolerance.is_finite() || c.totals_tolerance < 0.0 {
            return Err(ExtractError::InvalidConfig(format!(
                "totals_tolerance must be a non-negative number, got {}",
                c.totals_tolerance
            )));
        }
        Ok(self.config)
    }
}
