//! Provider adapters: one trait, two interchangeable vision backends.
//!
//! The pipeline only ever sees [`VisionProvider`] — "extract structured data
//! from one page image, answer with text". Each backend differs in request
//! shape and authentication but both are driven by the identical extraction
//! prompt ([`crate::prompts`]) and both surface failures through the same
//! [`ProviderError`] taxonomy, so merge and normalization stay
//! backend-agnostic. Which adapter is active is decided once, when the
//! provider is resolved, never mid-request.

pub mod anthropic;
pub mod gemini;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;

use crate::config::{ExtractionConfig, ProviderKind};
use crate::error::{ExtractError, ProviderError};
use crate::pipeline::encode::EncodedPage;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Capability interface for a vision backend.
///
/// Implementations return the model's raw textual answer; parsing it into a
/// [`crate::invoice::RawPageExtraction`] is the driver's job so that a
/// non-JSON answer is a recoverable per-page failure, not a provider error.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Short backend name for logs and error messages.
    fn name(&self) -> &str;

    /// Send one page image with the extraction prompt, return the answer text.
    async fn extract_page(&self, page: &EncodedPage, prompt: &str)
        -> Result<String, ProviderError>;
}

/// Resolve the active provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — the caller constructed it
///    entirely; used as-is. The seam tests and middleware hook into.
/// 2. **Configured kind** (`config.provider_kind`) plus key/model from the
///    config or the backend's environment variables.
/// 3. **`AI_PROVIDER` environment variable** (default `anthropic`), matching
///    how deployments pick a backend without code changes.
pub fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn VisionProvider>, ExtractError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let kind = match config.provider_kind {
        Some(kind) => kind,
        None => match std::env::var("AI_PROVIDER") {
            Ok(raw) if !raw.is_empty() => raw
                .parse::<ProviderKind>()
                .map_err(ExtractError::InvalidConfig)?,
            _ => ProviderKind::Anthropic,
        },
    };

    let api_key = match config.api_key.clone() {
        Some(key) => key,
        None => std::env::var(kind.api_key_var())
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ExtractError::ProviderNotConfigured {
                provider: kind.to_string(),
                hint: format!("Set {} or pass an API key in the config.", kind.api_key_var()),
            })?,
    };

    let model = config.model.clone().unwrap_or_else(|| {
        let var = match kind {
            ProviderKind::Anthropic => "CLAUDE_MODEL",
            ProviderKind::Gemini => "GEMINI_MODEL",
        };
        std::env::var(var)
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| kind.default_model().to_string())
    });

    info!("Provider: {} | model: {}", kind, model);

    Ok(match kind {
        ProviderKind::Anthropic => {
            Arc::new(AnthropicProvider::new(api_key, model, config.max_tokens))
        }
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(api_key, model, config.max_tokens)),
    })
}

/// Map an HTTP status to the uniform provider error taxonomy.
///
/// Shared by both adapters so merge/driver logic never branches on the
/// backend. `retry_after` comes from the `Retry-After` header when present.
pub(crate) fn classify_status(
    status: reqwest::StatusCode,
    body: String,
    retry_after: Option<u64>,
) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::Auth { detail: body },
        429 => ProviderError::RateLimited {
            retry_after_secs: retry_after,
        },
        500..=599 => ProviderError::Unavailable {
            detail: format!("HTTP {status}: {body}"),
        },
        _ => ProviderError::MalformedResponse {
            detail: format!("unexpected HTTP {status}: {body}"),
        },
    }
}

/// Map a transport-level reqwest failure.
pub(crate) fn classify_transport(e: reqwest::Error) -> ProviderError {
    ProviderError::Unavailable {
        detail: e.to_string(),
    }
}

/// Pull a `Retry-After` seconds value out of a response, if the backend sent one.
pub(crate) fn retry_after_secs(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_401_is_auth() {
        let e = classify_status(reqwest::StatusCode::UNAUTHORIZED, "bad key".into(), None);
        assert!(matches!(e, ProviderError::Auth { .. }));
        assert!(e.is_fatal());
    }

    #[test]
    fn status_429_carries_retry_after() {
        let e = classify_status(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            String::new(),
            Some(30),
        );
        match e {
            ProviderError::RateLimited { retry_after_secs } => {
                assert_eq!(retry_after_secs, Some(30));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn status_503_is_unavailable() {
        let e = classify_status(
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
            "overloaded".into(),
            None,
        );
        assert!(matches!(e, ProviderError::Unavailable { .. }));
    }

    #[test]
    fn status_400_is_malformed() {
        let e = classify_status(reqwest::StatusCode::BAD_REQUEST, "bad body".into(), None);
        assert!(matches!(e, ProviderError::MalformedResponse { .. }));
        assert!(!e.is_fatal());
    }

    #[test]
    fn resolve_uses_prebuilt_provider() {
        struct Fake;
        #[async_trait]
        impl VisionProvider for Fake {
            fn name(&self) -> &str {
                "fake"
            }
            async fn extract_page(
                &self,
                _page: &EncodedPage,
                _prompt: &str,
            ) -> Result<String, ProviderError> {
                Ok("{}".to_string())
            }
        }

        let config = ExtractionConfig::builder()
            .provider(Arc::new(Fake))
            .build()
            .unwrap();
        let provider = resolve_provider(&config).unwrap();
        assert_eq!(provider.name(), "fake");
    }

    #[test]
    fn resolve_with_explicit_kind_and_key() {
        let config = ExtractionConfig::builder()
            .provider_kind(ProviderKind::Gemini)
            .api_key("test-key")
            .build()
            .unwrap();
        let provider = resolve_provider(&config).unwrap();
        assert_eq!(provider.name(), "gemini");
    }
}
