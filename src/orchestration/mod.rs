//! The orchestration pipeline — seven ordered stages from request to reply.
//!
//! Stages: intent classification → entity validation → complexity
//! assessment → task decomposition → entity-aware routing → execution →
//! aggregation. Each stage records exactly one step result on the
//! execution record; a stage failure is written down and the pipeline
//! continues — nothing short-circuits except request-level cancellation,
//! which the router enforces with a timeout around the whole run.
//!
//! The aggregated reply is always a non-empty string.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::registry::Registries;
use crate::types::{AgentRole, RequestContext};

pub mod complexity;
pub mod decomposition;
pub mod entity;
pub mod intent;

pub use complexity::{ComplexityAssessment, ComplexityAssessor};
pub use decomposition::{Subtask, TaskDecomposer};
pub use entity::{EntityOperationContext, EntityRouter, EntityValidation};
pub use intent::{IntentClassifier, IntentResult};

/// Stage names in execution order.
pub const STEP_NAMES: [&str; 7] = [
    "intent_classification",
    "entity_validation",
    "complexity_assessment",
    "task_decomposition",
    "agent_routing",
    "task_execution",
    "result_aggregation",
];

/// The apology used when nothing better is available.
const DEFAULT_APOLOGY: &str =
    "❌ Sorry, I'm unable to process your request at the moment. Please try again.";

/// Lifecycle of one pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl StepStatus {
    /// Stable lowercase identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Outcome of one stage.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Final status.
    pub status: StepStatus,
    /// Stage-specific detail for the aggregate.
    pub detail: Value,
    /// Error text when failed.
    pub error: Option<String>,
}

impl StepResult {
    /// A completed step with detail.
    pub fn completed(detail: Value) -> Self {
        Self {
            status: StepStatus::Completed,
            detail,
            error: None,
        }
    }

    /// A failed step with an error message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Failed,
            detail: Value::Null,
            error: Some(error.into()),
        }
    }
}

/// Everything one request produced, alive only for that request.
#[derive(Debug)]
pub struct ExecutionRecord {
    /// The request being processed.
    pub context: RequestContext,
    /// Ordered step results, one per stage.
    pub steps: Vec<(&'static str, StepResult)>,
    /// Role chosen by the routing stage.
    pub selected_agent: Option<AgentRole>,
    /// Operation context built by routing.
    pub entity_context: Option<EntityOperationContext>,
    /// Raw reply from the execution stage.
    pub execution_result: Option<String>,
    /// Aggregate built by the final stage.
    pub aggregated: Option<Value>,
}

impl ExecutionRecord {
    fn new(context: RequestContext) -> Self {
        Self {
            context,
            steps: Vec::with_capacity(STEP_NAMES.len()),
            selected_agent: None,
            entity_context: None,
            execution_result: None,
            aggregated: None,
        }
    }

    fn record(&mut self, name: &'static str, result: StepResult) {
        self.steps.push((name, result));
    }

    /// Look up one step by name.
    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps
            .iter()
            .find(|(step_name, _)| *step_name == name)
            .map(|(_, result)| result)
    }

    /// `(completed, failed)` counts over the recorded steps.
    pub fn step_counts(&self) -> (usize, usize) {
        let completed = self
            .steps
            .iter()
            .filter(|(_, r)| r.status == StepStatus::Completed)
            .count();
        let failed = self
            .steps
            .iter()
            .filter(|(_, r)| r.status == StepStatus::Failed)
            .count();
        (completed, failed)
    }

    /// The reply to hand back to the transport. Never empty.
    pub fn final_reply(&self) -> String {
        if let Some(aggregated) = &self.aggregated {
            if let Some(reply) = aggregated.get("final_result").and_then(Value::as_str) {
                if !reply.is_empty() {
                    return reply.to_owned();
                }
            }
        }
        match &self.execution_result {
            Some(reply) if !reply.is_empty() => reply.clone(),
            _ => DEFAULT_APOLOGY.to_owned(),
        }
    }
}

/// Monotonic pipeline counters, increment-only.
#[derive(Debug, Default)]
pub struct PipelineAnalytics {
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl PipelineAnalytics {
    /// `(total, succeeded, failed)` executions so far.
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.total.load(Ordering::Relaxed),
            self.succeeded.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
        )
    }
}

/// The seven-stage orchestration pipeline.
pub struct OrchestrationPipeline {
    registries: Arc<Registries>,
    classifier: Box<dyn IntentClassifier>,
    assessor: ComplexityAssessor,
    decomposer: TaskDecomposer,
    entity_router: EntityRouter,
    analytics: PipelineAnalytics,
}

impl OrchestrationPipeline {
    /// Create the pipeline over the frozen registries.
    pub fn new(registries: Arc<Registries>, classifier: Box<dyn IntentClassifier>) -> Self {
        Self {
            entity_router: EntityRouter::new(Arc::clone(&registries)),
            registries,
            classifier,
            assessor: ComplexityAssessor::new(),
            decomposer: TaskDecomposer::new(),
            analytics: PipelineAnalytics::default(),
        }
    }

    /// Execution counters.
    pub fn analytics(&self) -> &PipelineAnalytics {
        &self.analytics
    }

    /// Run the pipeline and return the reply text.
    pub async fn execute_task(&self, task: &str, ctx: &RequestContext) -> String {
        info!(task = %task.chars().take(50).collect::<String>(), "pipeline starting");
        let record = self.run(task, ctx).await;

        self.analytics.total.fetch_add(1, Ordering::Relaxed);
        let execution_ok = record
            .step(STEP_NAMES[5])
            .map(|s| s.status == StepStatus::Completed)
            .unwrap_or(false);
        if execution_ok {
            self.analytics.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.analytics.failed.fetch_add(1, Ordering::Relaxed);
        }

        record.final_reply()
    }

    /// Run all seven stages and return the full record.
    pub async fn run(&self, task: &str, ctx: &RequestContext) -> ExecutionRecord {
        let mut record = ExecutionRecord::new(ctx.clone());
        let command_name = task.split_whitespace().next().unwrap_or("").to_owned();

        // Stage 1 — intent classification. Failure degrades to unknown.
        let intent = match self.classifier.classify(task, ctx).await {
            Ok(result) => {
                debug!(intent = result.intent.as_str(), confidence = result.confidence, "intent classified");
                record.record(
                    STEP_NAMES[0],
                    StepResult::completed(json!({
                        "intent": result.intent.as_str(),
                        "confidence": result.confidence,
                    })),
                );
                result
            }
            Err(e) => {
                error!(error = %e, "intent classification failed");
                record.record(STEP_NAMES[0], StepResult::failed(e.to_string()));
                IntentResult::unknown()
            }
        };

        // Stage 2 — entity validation. Invalid operations do not abort:
        // routing may still succeed via the fallback agent.
        let validation = self.entity_router.validate_operation(&command_name, ctx);
        if !validation.is_valid {
            warn!(
                command = %command_name,
                error = validation.error_message.as_deref().unwrap_or("-"),
                "entity validation failed"
            );
        }
        record.record(
            STEP_NAMES[1],
            StepResult::completed(json!({
                "is_valid": validation.is_valid,
                "entity_type": validation.entity_type.map(|e| e.as_str()),
                "error_message": validation.error_message,
                "suggested_agent": validation.suggested_agent.map(|a| a.as_str()),
            })),
        );

        // Stage 3 — complexity assessment. Pure compute.
        let assessment = self.assessor.assess(task, &intent);
        record.record(
            STEP_NAMES[2],
            StepResult::completed(json!({
                "complexity_level": assessment.level.as_str(),
                "complexity_score": assessment.score,
                "reasoning": assessment.reasoning,
            })),
        );

        // Stage 4 — decomposition. Advisory: subtasks are recorded but the
        // execution stage still runs the whole request.
        let subtasks = self.decomposer.decompose(task, &intent, &assessment);
        record.record(
            STEP_NAMES[3],
            StepResult::completed(json!({
                "subtasks_count": subtasks.len(),
                "subtasks": subtasks
                    .iter()
                    .map(|s| {
                        json!({
                            "task_id": s.task_id,
                            "description": s.description,
                            "agent_role": s.agent_role.as_str(),
                            "estimated_duration_secs": s.estimated_duration_secs,
                        })
                    })
                    .collect::<Vec<_>>(),
            })),
        );

        // Stage 5 — entity-aware routing.
        let op = self
            .entity_router
            .route(&command_name, task, ctx, &validation, &self.registries.agents);
        debug!(agent = op.agent_role.as_str(), tool = op.tool_id.as_deref().unwrap_or("-"), "routed");
        record.selected_agent = Some(op.agent_role);
        record.record(
            STEP_NAMES[4],
            StepResult::completed(json!({
                "selected_agent": op.agent_role.as_str(),
                "entity_type": op.entity_type.as_str(),
                "validation_passed": op.validation.is_valid,
            })),
        );

        // Stage 6 — execution.
        let mut agent_role = op.agent_role;
        if !self
            .registries
            .tools
            .agent_handles_entity(agent_role, op.entity_type)
        {
            warn!(
                agent = agent_role.as_str(),
                entity = op.entity_type.as_str(),
                "agent cannot handle entity type, falling back"
            );
            agent_role = AgentRole::MessageProcessor;
        }

        let exec_ctx = match &op.tool_id {
            Some(tool_id) if !ctx.metadata.contains_key("tool_id") => ctx
                .clone()
                .with_metadata("tool_id", Value::String(tool_id.clone())),
            _ => ctx.clone(),
        };

        match self.registries.agent(agent_role) {
            Some(agent) => match agent.execute(task, &exec_ctx).await {
                Ok(reply) => {
                    record.execution_result = Some(reply.clone());
                    record.record(
                        STEP_NAMES[5],
                        StepResult::completed(json!({
                            "agent_used": agent_role.as_str(),
                            "result_chars": reply.chars().count(),
                        })),
                    );
                }
                Err(e) => {
                    error!(agent = agent_role.as_str(), error = %e, "task execution failed");
                    record.execution_result = Some(format!("❌ {}", e.user_message()));
                    record.record(STEP_NAMES[5], StepResult::failed(e.to_string()));
                }
            },
            None => {
                error!(agent = agent_role.as_str(), "no suitable agent available");
                record.execution_result = Some(DEFAULT_APOLOGY.to_owned());
                record.record(STEP_NAMES[5], StepResult::failed("no suitable agent available"));
            }
        }
        record.entity_context = Some(op);

        // Stage 7 — aggregation.
        let (completed, failed) = record.step_counts();
        let mut step_details = Map::new();
        for (name, step) in &record.steps {
            step_details.insert(
                (*name).to_owned(),
                json!({
                    "status": step.status.as_str(),
                    "detail": step.detail,
                    "error": step.error,
                }),
            );
        }
        let entity_summary = record
            .entity_context
            .as_ref()
            .map(|op| {
                json!({
                    "entity_type": op.entity_type.as_str(),
                    "agent_role": op.agent_role.as_str(),
                    "validation_passed": op.validation.is_valid,
                })
            })
            .unwrap_or(Value::Null);

        let final_result = record
            .execution_result
            .clone()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_APOLOGY.to_owned());

        record.aggregated = Some(json!({
            "final_result": final_result,
            "pipeline_summary": {
                "total_steps": record.steps.len(),
                "successful_steps": completed,
                "failed_steps": failed,
            },
            "entity_context": entity_summary,
            "step_details": step_details,
        }));
        record.record(
            STEP_NAMES[6],
            StepResult::completed(json!({
                "successful_steps": completed,
                "failed_steps": failed,
            })),
        );

        info!(
            steps = record.steps.len(),
            failed,
            "pipeline completed"
        );
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::test_registries;
    use crate::types::{ChatType, KickAiError, UserPermissions};
    use async_trait::async_trait;

    fn pipeline() -> OrchestrationPipeline {
        OrchestrationPipeline::new(
            Arc::new(test_registries()),
            Box::new(intent::KeywordIntentClassifier),
        )
    }

    fn ctx(text: &str, chat: ChatType) -> RequestContext {
        RequestContext::from_command(
            5,
            "KAI",
            "c",
            chat,
            text,
            "u",
            "U",
            UserPermissions::default(),
        )
        .expect("ctx")
    }

    struct ExplodingClassifier;

    #[async_trait]
    impl IntentClassifier for ExplodingClassifier {
        async fn classify(
            &self,
            _text: &str,
            _ctx: &RequestContext,
        ) -> Result<IntentResult, KickAiError> {
            Err(KickAiError::unavailable("llm", "boom"))
        }
    }

    #[tokio::test]
    async fn test_exactly_seven_steps_for_command() {
        let pipeline = pipeline();
        let record = pipeline.run("/ping", &ctx("/ping", ChatType::Main)).await;
        assert_eq!(record.steps.len(), 7);
        let names: Vec<&str> = record.steps.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, STEP_NAMES.to_vec());
    }

    #[tokio::test]
    async fn test_exactly_seven_steps_for_free_text() {
        let pipeline = pipeline();
        let record = pipeline
            .run("what can I do?", &ctx("what can I do?", ChatType::Main))
            .await;
        assert_eq!(record.steps.len(), 7);
        assert!(!record.final_reply().is_empty());
    }

    #[tokio::test]
    async fn test_stage_failure_does_not_short_circuit() {
        let pipeline = OrchestrationPipeline::new(
            Arc::new(test_registries()),
            Box::new(ExplodingClassifier),
        );
        let record = pipeline.run("/ping", &ctx("/ping", ChatType::Main)).await;

        assert_eq!(record.steps.len(), 7, "later stages must still run");
        assert_eq!(
            record.step("intent_classification").expect("step").status,
            StepStatus::Failed
        );
        assert_eq!(
            record.step("task_execution").expect("step").status,
            StepStatus::Completed
        );
        assert!(!record.final_reply().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_command_still_yields_reply() {
        let pipeline = pipeline();
        let reply = pipeline
            .execute_task("/frobnicate", &ctx("/frobnicate", ChatType::Main))
            .await;
        assert!(!reply.is_empty());
    }

    #[tokio::test]
    async fn test_analytics_counters_increment() {
        let pipeline = pipeline();
        let before = pipeline.analytics().snapshot();
        pipeline
            .execute_task("/ping", &ctx("/ping", ChatType::Main))
            .await;
        let after = pipeline.analytics().snapshot();
        assert_eq!(after.0, before.0.saturating_add(1));
        assert!(after.1 >= before.1);
    }

    #[tokio::test]
    async fn test_command_reply_comes_from_tool() {
        let pipeline = pipeline();
        let reply = pipeline
            .execute_task("/ping", &ctx("/ping", ChatType::Main))
            .await;
        assert!(reply.contains("Pong"), "got: {reply}");
    }

    #[tokio::test]
    async fn test_aggregate_carries_step_details() {
        let pipeline = pipeline();
        let record = pipeline.run("/ping", &ctx("/ping", ChatType::Main)).await;
        let aggregated = record.aggregated.as_ref().expect("aggregate");
        assert_eq!(
            aggregated["pipeline_summary"]["total_steps"],
            serde_json::json!(6)
        );
        assert!(aggregated["step_details"]["intent_classification"].is_object());
    }
}
