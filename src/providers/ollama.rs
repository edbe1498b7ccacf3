//! Ollama provider implementation using the non-streaming generate API.

use serde_json::{json, Value};

use super::{check_http_response, LlmProvider, ProviderError};

/// Ollama generate API provider.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Create an Ollama provider against a base URL (e.g. `http://localhost:11434`).
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            model: model.to_owned(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "num_predict": max_tokens },
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let payload = check_http_response(response).await?;
        let parsed: Value =
            serde_json::from_str(&payload).map_err(|e| ProviderError::Parse(e.to_string()))?;

        parsed
            .get("response")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| ProviderError::Parse("missing response field".to_owned()))
    }

    async fn probe(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;
        check_http_response(response).await.map(|_| ())
    }
}
