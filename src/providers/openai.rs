//! OpenAI provider implementation using the chat completions API.

use serde_json::{json, Value};

use super::{check_http_response, LlmProvider, ProviderError};

/// OpenAI chat completions provider.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Create a provider against a base URL (e.g. `https://api.openai.com`).
    pub fn new(base_url: &str, api_key: String, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
            model: model.to_owned(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": max_tokens,
        });

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let payload = check_http_response(response).await?;
        let parsed: Value =
            serde_json::from_str(&payload).map_err(|e| ProviderError::Parse(e.to_string()))?;

        parsed
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| ProviderError::Parse("missing choices[0].message.content".to_owned()))
    }

    async fn probe(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(format!("{}/v1/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        check_http_response(response).await.map(|_| ())
    }
}
