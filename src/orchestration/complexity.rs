//! Request complexity assessment.
//!
//! Pure compute: signals are request length, referenced entities, intent
//! category, and conjunctions implying multi-step work. The score decides
//! whether the decomposition stage produces subtasks.

use crate::orchestration::intent::{Intent, IntentResult};
use crate::types::ComplexityLevel;

/// Phrases that suggest a multi-step request.
const CONJUNCTIONS: &[&str] = &[" and then ", " then ", " and ", " after that ", ";"];

/// Assessment output.
#[derive(Debug, Clone)]
pub struct ComplexityAssessment {
    /// Bucketed level.
    pub level: ComplexityLevel,
    /// Raw score in `[0, 1]`.
    pub score: f64,
    /// Why the score came out this way.
    pub reasoning: String,
}

/// Scores requests from cheap lexical signals.
#[derive(Debug, Default)]
pub struct ComplexityAssessor;

impl ComplexityAssessor {
    /// Create the assessor.
    pub fn new() -> Self {
        Self
    }

    /// Assess one request.
    pub fn assess(&self, request: &str, intent: &IntentResult) -> ComplexityAssessment {
        let mut score: f64 = 0.1;
        let mut reasons = Vec::new();

        let words = request.split_whitespace().count();
        if words > 25 {
            score += 0.3;
            reasons.push(format!("long request ({words} words)"));
        } else if words > 12 {
            score += 0.15;
            reasons.push(format!("medium-length request ({words} words)"));
        }

        let entity_count = intent.entities.len();
        if entity_count > 0 {
            score += match entity_count {
                1 => 0.1,
                2 => 0.2,
                _ => 0.3,
            };
            reasons.push(format!("{entity_count} referenced entities"));
        }

        match intent.intent {
            Intent::GeneralInquiry | Intent::Unknown => {
                score += 0.2;
                reasons.push("open-ended intent".to_owned());
            }
            Intent::Registration => {
                score += 0.1;
                reasons.push("stateful registration flow".to_owned());
            }
            _ => {}
        }

        let lower = request.to_lowercase();
        let conjunctions = CONJUNCTIONS.iter().filter(|c| lower.contains(**c)).count();
        if conjunctions > 0 {
            score += 0.25;
            reasons.push(format!("{conjunctions} multi-step conjunctions"));
        }

        let score = score.clamp(0.0, 1.0);
        let level = if score < 0.25 {
            ComplexityLevel::Low
        } else if score < 0.5 {
            ComplexityLevel::Medium
        } else if score < 0.75 {
            ComplexityLevel::High
        } else {
            ComplexityLevel::VeryHigh
        };

        let reasoning = if reasons.is_empty() {
            "short single-step request".to_owned()
        } else {
            reasons.join("; ")
        };

        ComplexityAssessment {
            level,
            score,
            reasoning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::intent::IntentResult;

    fn intent_of(intent: Intent) -> IntentResult {
        IntentResult {
            intent,
            confidence: 0.9,
            entities: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_simple_command_is_low() {
        let assessor = ComplexityAssessor::new();
        let result = assessor.assess("/list", &intent_of(Intent::ListRequest));
        assert_eq!(result.level, ComplexityLevel::Low);
        assert!(result.score < 0.25);
    }

    #[test]
    fn test_conjunctions_raise_level() {
        let assessor = ComplexityAssessor::new();
        let request = "register John Smith as a midfielder and then create a match against \
                       the Rovers next Saturday and after that announce the squad selection";
        let result = assessor.assess(request, &intent_of(Intent::GeneralInquiry));
        assert!(
            result.level.warrants_decomposition(),
            "got {:?} (score {})",
            result.level,
            result.score
        );
        assert!(result.reasoning.contains("conjunction"));
    }

    #[test]
    fn test_score_stays_in_unit_interval() {
        let assessor = ComplexityAssessor::new();
        let mut entities = serde_json::Map::new();
        for i in 0..10 {
            entities.insert(format!("e{i}"), serde_json::Value::Null);
        }
        let intent = IntentResult {
            intent: Intent::Unknown,
            confidence: 0.0,
            entities,
        };
        let long = "word ".repeat(60);
        let request = format!("{long} and then {long}; {long}");
        let result = assessor.assess(&request, &intent);
        assert!(result.score <= 1.0);
        assert_eq!(result.level, ComplexityLevel::VeryHigh);
    }
}
