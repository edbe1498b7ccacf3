//! Intent classification.
//!
//! The classifier is a replaceable component behind [`IntentClassifier`].
//! The rule-based [`KeywordIntentClassifier`] always exists and is the
//! fallback; the LLM-backed [`LlmIntentClassifier`] wraps it and is selected
//! by configuration (`ai.classifier = "llm"`).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;
use tracing::debug;

use crate::config::AiConfig;
use crate::providers::LlmProvider;
use crate::types::{KickAiError, RequestContext};

/// Token budget for classification calls.
const CLASSIFY_MAX_TOKENS: u32 = 16;

/// The fixed intent set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    HelpRequest,
    StatusInquiry,
    Registration,
    ListRequest,
    GeneralInquiry,
    Unknown,
}

impl Intent {
    /// Stable lowercase identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HelpRequest => "help_request",
            Self::StatusInquiry => "status_inquiry",
            Self::Registration => "registration",
            Self::ListRequest => "list_request",
            Self::GeneralInquiry => "general_inquiry",
            Self::Unknown => "unknown",
        }
    }

    /// Parse the identifier; anything else is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "help_request" => Some(Self::HelpRequest),
            "status_inquiry" => Some(Self::StatusInquiry),
            "registration" => Some(Self::Registration),
            "list_request" => Some(Self::ListRequest),
            "general_inquiry" => Some(Self::GeneralInquiry),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification output.
#[derive(Debug, Clone)]
pub struct IntentResult {
    /// Classified intent.
    pub intent: Intent,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Extracted entities (free-form).
    pub entities: Map<String, Value>,
}

impl IntentResult {
    /// The unknown result used when classification fails.
    pub fn unknown() -> Self {
        Self {
            intent: Intent::Unknown,
            confidence: 0.0,
            entities: Map::new(),
        }
    }
}

/// A pluggable intent classifier.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Classify a task description in context.
    async fn classify(
        &self,
        text: &str,
        ctx: &RequestContext,
    ) -> Result<IntentResult, KickAiError>;
}

// ---------------------------------------------------------------------------
// KeywordIntentClassifier
// ---------------------------------------------------------------------------

/// Rule-based fallback classifier mapping keywords to the fixed intent set.
#[derive(Debug, Default)]
pub struct KeywordIntentClassifier;

impl KeywordIntentClassifier {
    fn classify_text(text: &str) -> IntentResult {
        let lower = text.to_lowercase();
        let contains = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        let (intent, confidence) = if contains(&["help", "what", "how", "command"]) {
            (Intent::HelpRequest, 0.8)
        } else if contains(&["status", "info", "myinfo"]) {
            (Intent::StatusInquiry, 0.9)
        } else if contains(&["register", "join", "signup"]) {
            (Intent::Registration, 0.9)
        } else if contains(&["list", "show", "all"]) {
            (Intent::ListRequest, 0.8)
        } else {
            (Intent::GeneralInquiry, 0.5)
        };

        IntentResult {
            intent,
            confidence,
            entities: Map::new(),
        }
    }
}

#[async_trait]
impl IntentClassifier for KeywordIntentClassifier {
    async fn classify(
        &self,
        text: &str,
        _ctx: &RequestContext,
    ) -> Result<IntentResult, KickAiError> {
        Ok(Self::classify_text(text))
    }
}

// ---------------------------------------------------------------------------
// LlmIntentClassifier
// ---------------------------------------------------------------------------

/// LLM-backed classifier that falls back to keywords on any failure.
pub struct LlmIntentClassifier {
    provider: Arc<dyn LlmProvider>,
    fallback: KeywordIntentClassifier,
}

impl LlmIntentClassifier {
    /// Create the classifier over a shared provider.
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            fallback: KeywordIntentClassifier,
        }
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(
        &self,
        text: &str,
        ctx: &RequestContext,
    ) -> Result<IntentResult, KickAiError> {
        let prompt = format!(
            "Classify this football-team chat message into exactly one of: \
             help_request, status_inquiry, registration, list_request, general_inquiry.\n\
             Reply with the label only.\n\nMessage: {text}"
        );

        match self.provider.generate(&prompt, CLASSIFY_MAX_TOKENS).await {
            Ok(reply) => match Intent::parse(&reply) {
                Some(intent) => Ok(IntentResult {
                    intent,
                    confidence: 0.9,
                    entities: Map::new(),
                }),
                None => {
                    debug!(reply = %reply, "unparseable classifier reply, using keyword fallback");
                    self.fallback.classify(text, ctx).await
                }
            },
            Err(e) => {
                debug!(error = %e, "classifier provider failed, using keyword fallback");
                self.fallback.classify(text, ctx).await
            }
        }
    }
}

/// Build the configured classifier.
pub fn build_classifier(
    config: &AiConfig,
    provider: Arc<dyn LlmProvider>,
) -> Box<dyn IntentClassifier> {
    if config.classifier.eq_ignore_ascii_case("llm") {
        Box::new(LlmIntentClassifier::new(provider))
    } else {
        Box::new(KeywordIntentClassifier)
    }
}
