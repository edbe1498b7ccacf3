//! LLM provider abstraction layer.
//!
//! Defines the [`LlmProvider`] trait and the shared error type used by all
//! provider implementations.
//!
//! Four providers are implemented:
//! - [`ollama::OllamaProvider`] — Ollama `/api/generate` API
//! - [`openai::OpenAiProvider`] — OpenAI `/v1/chat/completions` API
//! - [`google::GoogleProvider`] — Google `generateContent` API
//! - [`mock::MockProvider`] — deterministic in-process responses
//!
//! The provider is shared (connection-pooled via `reqwest`) across tasks and
//! safe for concurrent calls. [`build_provider`] resolves the configured
//! backend.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{AiConfig, ProviderKind};

pub mod google;
pub mod mock;
pub mod ollama;
pub mod openai;

/// Provider-layer errors.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-success status from the provider API.
    #[error("api error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body (truncated).
        body: String,
    },
    /// Response shape did not match expectations.
    #[error("parse error: {0}")]
    Parse(String),
    /// Provider not usable with the current configuration.
    #[error("provider misconfigured: {0}")]
    Misconfigured(String),
}

/// A text-generation backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs and the validation report.
    fn name(&self) -> &'static str;

    /// Generate a completion for a prompt.
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError>;

    /// Minimal connectivity probe used by the startup validator.
    ///
    /// Must be cheap: a one-token generation or a capability endpoint hit.
    async fn probe(&self) -> Result<(), ProviderError>;
}

/// Build the configured provider.
pub fn build_provider(config: &AiConfig) -> Result<Arc<dyn LlmProvider>, ProviderError> {
    match config.provider {
        ProviderKind::Ollama => Ok(Arc::new(ollama::OllamaProvider::new(
            &config.base_url,
            &config.model,
        ))),
        ProviderKind::OpenAi => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                ProviderError::Misconfigured("openai provider requires ai.api_key".to_owned())
            })?;
            Ok(Arc::new(openai::OpenAiProvider::new(
                &config.base_url,
                api_key,
                &config.model,
            )))
        }
        ProviderKind::Google => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                ProviderError::Misconfigured("google provider requires ai.api_key".to_owned())
            })?;
            Ok(Arc::new(google::GoogleProvider::new(
                &config.base_url,
                api_key,
                &config.model,
            )))
        }
        ProviderKind::Mock => Ok(Arc::new(mock::MockProvider::new())),
    }
}

/// Check an HTTP response and return its body, converting non-success
/// statuses into [`ProviderError::Api`].
pub(crate) async fn check_http_response(
    response: reqwest::Response,
) -> Result<String, ProviderError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        let truncated: String = body.chars().take(500).collect();
        return Err(ProviderError::Api {
            status: status.as_u16(),
            body: truncated,
        });
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AiConfig;

    #[test]
    fn test_build_provider_requires_key_for_openai() {
        let config = AiConfig {
            provider: ProviderKind::OpenAi,
            api_key: None,
            ..Default::default()
        };
        assert!(matches!(
            build_provider(&config),
            Err(ProviderError::Misconfigured(_))
        ));
    }

    #[test]
    fn test_build_provider_mock() {
        let config = AiConfig::default();
        let provider = build_provider(&config).expect("mock builds");
        assert_eq!(provider.name(), "mock");
    }
}
