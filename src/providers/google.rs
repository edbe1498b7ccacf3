//! Google Generative Language provider implementation.

use serde_json::{json, Value};

use super::{check_http_response, LlmProvider, ProviderError};

/// Google `generateContent` API provider.
#[derive(Debug, Clone)]
pub struct GoogleProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GoogleProvider {
    /// Create a provider against a base URL
    /// (e.g. `https://generativelanguage.googleapis.com`).
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
impl LlmProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "maxOutputTokens": max_tokens },
        });

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let response = self.client.post(url).json(&body).send().await?;

        let payload = check_http_response(response).await?;
        let parsed: Value =
            serde_json::from_str(&payload).map_err(|e| ProviderError::Parse(e.to_string()))?;

        parsed
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| ProviderError::Parse("missing candidates[0] text".to_owned()))
    }

    async fn probe(&self) -> Result<(), ProviderError> {
        let url = format!("{}/v1beta/models?key={}", self.base_url, self.api_key);
        let response = self.client.get(url).send().await?;
        check_http_response(response).await.map(|_| ())
    }
}
