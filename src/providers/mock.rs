//! Deterministic in-process provider for tests and offline runs.

use std::sync::atomic::{AtomicU64, Ordering};

use super::{LlmProvider, ProviderError};

/// Mock provider returning canned, prompt-sensitive responses.
///
/// Keyword handling mirrors what the rule-based intent classifier expects,
/// so end-to-end tests can run the full pipeline without a network.
#[derive(Debug, Default)]
pub struct MockProvider {
    calls: AtomicU64,
}

impl MockProvider {
    /// Create a fresh mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// How many generations have been served.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(&self, prompt: &str, _max_tokens: u32) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let lower = prompt.to_lowercase();

        let reply = if lower.contains("classify") {
            "general_inquiry"
        } else if lower.contains("help") || lower.contains("what can") {
            "You can register as a player, check your status, and list the squad. Try /help for the full command list."
        } else {
            "I've noted that. Use /help to see what I can do."
        };
        Ok(reply.to_owned())
    }

    async fn probe(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}
