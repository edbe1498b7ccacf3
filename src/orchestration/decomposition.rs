//! Task decomposition for complex requests.
//!
//! Produces an ordered subtask list when complexity reaches `high`. The
//! list is advisory: the execution stage still runs the whole request
//! against the selected agent, and the subtasks travel in the step result
//! for observability.

use uuid::Uuid;

use crate::orchestration::complexity::ComplexityAssessment;
use crate::orchestration::intent::IntentResult;
use crate::types::AgentRole;

/// Separators that split a compound request into clauses.
const CLAUSE_SEPARATORS: &[&str] = &[" and then ", " after that ", " then ", ";", " and "];

/// Rough per-subtask duration estimate, seconds.
const SUBTASK_ESTIMATE_SECS: u64 = 30;

/// One unit of decomposed work.
#[derive(Debug, Clone)]
pub struct Subtask {
    /// Unique id for tracing.
    pub task_id: String,
    /// The clause this subtask covers.
    pub description: String,
    /// Capabilities the executing agent needs.
    pub required_capabilities: Vec<String>,
    /// Natural home for the subtask.
    pub agent_role: AgentRole,
    /// Duration estimate in seconds.
    pub estimated_duration_secs: u64,
}

/// Splits compound requests into ordered subtasks.
#[derive(Debug, Default)]
pub struct TaskDecomposer;

impl TaskDecomposer {
    /// Create the decomposer.
    pub fn new() -> Self {
        Self
    }

    /// Decompose a request. Empty unless the assessment warrants it.
    pub fn decompose(
        &self,
        task: &str,
        _intent: &IntentResult,
        assessment: &ComplexityAssessment,
    ) -> Vec<Subtask> {
        if !assessment.level.warrants_decomposition() {
            return Vec::new();
        }

        clauses_of(task)
            .into_iter()
            .map(|clause| {
                let (role, capabilities) = classify_clause(&clause);
                Subtask {
                    task_id: Uuid::new_v4().to_string(),
                    description: clause,
                    required_capabilities: capabilities,
                    agent_role: role,
                    estimated_duration_secs: SUBTASK_ESTIMATE_SECS,
                }
            })
            .collect()
    }
}

/// Split a request on multi-step separators, longest separator first.
fn clauses_of(task: &str) -> Vec<String> {
    let mut clauses = vec![task.to_owned()];
    for separator in CLAUSE_SEPARATORS {
        clauses = clauses
            .into_iter()
            .flat_map(|clause| {
                clause
                    .split(separator)
                    .map(str::to_owned)
                    .collect::<Vec<_>>()
            })
            .collect();
    }
    clauses
        .into_iter()
        .map(|c| c.trim().to_owned())
        .filter(|c| !c.is_empty())
        .collect()
}

/// Guess the natural agent and capabilities for one clause.
fn classify_clause(clause: &str) -> (AgentRole, Vec<String>) {
    let lower = clause.to_lowercase();
    let contains = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if contains(&["announce", "broadcast", "message", "tell everyone"]) {
        (
            AgentRole::CommunicationManager,
            vec!["communication".to_owned()],
        )
    } else if contains(&["register", "approve", "player", "join"]) {
        (
            AgentRole::PlayerCoordinator,
            vec!["player_management".to_owned()],
        )
    } else if contains(&["match", "fixture", "squad", "availability"]) {
        (
            AgentRole::MatchCoordinator,
            vec!["match_management".to_owned()],
        )
    } else if contains(&["member", "admin", "invite"]) {
        (
            AgentRole::TeamAdministrator,
            vec!["team_management".to_owned()],
        )
    } else {
        (
            AgentRole::MessageProcessor,
            vec!["general".to_owned()],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::complexity::ComplexityAssessor;
    use crate::orchestration::intent::{Intent, IntentResult};
    use crate::types::ComplexityLevel;

    fn intent() -> IntentResult {
        IntentResult {
            intent: Intent::GeneralInquiry,
            confidence: 0.5,
            entities: serde_json::Map::new(),
        }
    }

    fn assessment(level: ComplexityLevel) -> ComplexityAssessment {
        ComplexityAssessment {
            level,
            score: 0.8,
            reasoning: "test".to_owned(),
        }
    }

    #[test]
    fn test_low_complexity_yields_no_subtasks() {
        let decomposer = TaskDecomposer::new();
        let subtasks = decomposer.decompose(
            "/list",
            &intent(),
            &assessment(ComplexityLevel::Low),
        );
        assert!(subtasks.is_empty());
    }

    #[test]
    fn test_compound_request_splits_into_ordered_clauses() {
        let decomposer = TaskDecomposer::new();
        let subtasks = decomposer.decompose(
            "register John Smith and then create a match against Rovers and announce the squad",
            &intent(),
            &assessment(ComplexityLevel::High),
        );
        assert_eq!(subtasks.len(), 3);
        assert_eq!(subtasks[0].agent_role, AgentRole::PlayerCoordinator);
        assert_eq!(subtasks[1].agent_role, AgentRole::MatchCoordinator);
        assert_eq!(subtasks[2].agent_role, AgentRole::CommunicationManager);
        assert!(subtasks.iter().all(|s| !s.task_id.is_empty()));
    }

    #[test]
    fn test_end_to_end_with_assessor() {
        let assessor = ComplexityAssessor::new();
        let request = "register John Smith as a midfielder and then create a match against \
                       the Rovers next Saturday and after that announce the squad selection";
        let assessment = assessor.assess(request, &intent());
        let subtasks = TaskDecomposer::new().decompose(request, &intent(), &assessment);
        assert!(!subtasks.is_empty());
    }
}
