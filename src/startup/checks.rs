//! The closed set of startup health checks.
//!
//! Each check converts its own failures into a [`CheckResult`] — nothing
//! here aborts the validation run. Criticality is declared per check: a
//! failed critical check keeps the process from coming up.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::config::AppConfig;
use crate::providers::LlmProvider;
use crate::registry::commands::EXPECTED_COMMANDS;
use crate::registry::Registries;
use crate::startup::report::{CheckCategory, CheckResult};
use crate::store::{DocumentStore, TEAMS_COLLECTION};

/// Timeout for the LLM connectivity probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tool-id fragments that mark a leftover placeholder implementation.
const STUB_MARKERS: &[&str] = &["stub", "placeholder", "noop", "todo"];

/// Shared state handed to every check.
pub struct CheckContext {
    /// Resolved configuration.
    pub config: AppConfig,
    /// The frozen registries.
    pub registries: Arc<Registries>,
    /// The configured LLM provider.
    pub provider: Arc<dyn LlmProvider>,
    /// The document store.
    pub store: Arc<dyn DocumentStore>,
}

/// One startup health check.
#[async_trait]
pub trait StartupCheck: Send + Sync {
    /// Stable check name.
    fn name(&self) -> &'static str;

    /// Category for reporting.
    fn category(&self) -> CheckCategory;

    /// Whether a failure gates startup.
    fn critical(&self) -> bool {
        true
    }

    /// A check may declare itself dependent on another check's outcome;
    /// the validator then runs it sequentially after that check.
    fn depends_on(&self) -> Option<&'static str> {
        None
    }

    /// Run the check. `prior` holds the results of already-completed
    /// checks (only populated for dependent checks).
    async fn execute(&self, ctx: &CheckContext, prior: &[CheckResult]) -> CheckResult;
}

/// The default closed list of checks.
pub fn default_checks() -> Vec<Arc<dyn StartupCheck>> {
    vec![
        Arc::new(ConfigurationCheck),
        Arc::new(LlmProviderCheck),
        Arc::new(ToolRegistryCheck),
        Arc::new(CommandRegistryCheck),
        Arc::new(AgentInitializationCheck),
        Arc::new(DatabaseCheck),
        Arc::new(StubDetectionCheck),
        Arc::new(RegistryConsistencyCheck),
    ]
}

// ---------------------------------------------------------------------------
// ConfigurationCheck
// ---------------------------------------------------------------------------

/// Configuration loaded and essential fields present.
pub struct ConfigurationCheck;

#[async_trait]
impl StartupCheck for ConfigurationCheck {
    fn name(&self) -> &'static str {
        "configuration_loading"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Configuration
    }

    async fn execute(&self, ctx: &CheckContext, _prior: &[CheckResult]) -> CheckResult {
        let problems = ctx.config.validate();
        if problems.is_empty() {
            CheckResult::passed(
                self.name(),
                self.category(),
                "configuration loaded successfully",
            )
            .with_details(json!({
                "provider": ctx.config.ai.provider.to_string(),
                "team_id": ctx.config.telegram.team_id,
            }))
        } else {
            CheckResult::failed(
                self.name(),
                self.category(),
                format!("missing or invalid configuration: {}", problems.join("; ")),
            )
            .with_details(json!({ "problems": problems }))
        }
    }
}

// ---------------------------------------------------------------------------
// LlmProviderCheck
// ---------------------------------------------------------------------------

/// LLM provider reachable with a minimal probe.
pub struct LlmProviderCheck;

#[async_trait]
impl StartupCheck for LlmProviderCheck {
    fn name(&self) -> &'static str {
        "llm_provider"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Llm
    }

    async fn execute(&self, ctx: &CheckContext, _prior: &[CheckResult]) -> CheckResult {
        match tokio::time::timeout(PROBE_TIMEOUT, ctx.provider.probe()).await {
            Ok(Ok(())) => CheckResult::passed(
                self.name(),
                self.category(),
                format!("{} provider reachable", ctx.provider.name()),
            ),
            Ok(Err(e)) => CheckResult::failed(
                self.name(),
                self.category(),
                format!("{} provider probe failed: {e}", ctx.provider.name()),
            ),
            Err(_) => CheckResult::failed(
                self.name(),
                self.category(),
                format!(
                    "{} provider probe timed out after {}s",
                    ctx.provider.name(),
                    PROBE_TIMEOUT.as_secs()
                ),
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// ToolRegistryCheck
// ---------------------------------------------------------------------------

/// Tool registry populated, non-empty, aliases resolving.
pub struct ToolRegistryCheck;

#[async_trait]
impl StartupCheck for ToolRegistryCheck {
    fn name(&self) -> &'static str {
        "tool_registry"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Registry
    }

    async fn execute(&self, ctx: &CheckContext, _prior: &[CheckResult]) -> CheckResult {
        let tools = &ctx.registries.tools;
        if !tools.is_populated() {
            return CheckResult::failed(
                self.name(),
                self.category(),
                "tool registry was never populated by the manifest",
            );
        }
        if tools.is_empty() {
            return CheckResult::failed(self.name(), self.category(), "tool registry is empty");
        }

        let ids = tools.ids();
        let mut deduped = ids.clone();
        deduped.dedup();
        if ids.len() != deduped.len() {
            return CheckResult::failed(
                self.name(),
                self.category(),
                "duplicate tool ids present",
            );
        }

        CheckResult::passed(
            self.name(),
            self.category(),
            format!("{} tools registered", ids.len()),
        )
        .with_details(json!({ "tool_count": ids.len() }))
    }
}

// ---------------------------------------------------------------------------
// CommandRegistryCheck
// ---------------------------------------------------------------------------

/// Command registry initialized with the expected commands and features.
pub struct CommandRegistryCheck;

#[async_trait]
impl StartupCheck for CommandRegistryCheck {
    fn name(&self) -> &'static str {
        "command_registry"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Registry
    }

    async fn execute(&self, ctx: &CheckContext, _prior: &[CheckResult]) -> CheckResult {
        let commands = &ctx.registries.commands;
        if commands.is_empty() {
            return CheckResult::failed(self.name(), self.category(), "no commands registered");
        }

        let missing: Vec<&str> = EXPECTED_COMMANDS
            .iter()
            .filter(|name| !commands.contains(name))
            .copied()
            .collect();
        if !missing.is_empty() {
            return CheckResult::failed(
                self.name(),
                self.category(),
                format!("expected commands missing: {}", missing.join(", ")),
            );
        }

        CheckResult::passed(
            self.name(),
            self.category(),
            format!(
                "{} commands across {} features",
                commands.len(),
                commands.features().len()
            ),
        )
        .with_details(json!({ "features": commands.features() }))
    }
}

// ---------------------------------------------------------------------------
// AgentInitializationCheck
// ---------------------------------------------------------------------------

/// All configured agents constructible with resolving tool lists.
pub struct AgentInitializationCheck;

#[async_trait]
impl StartupCheck for AgentInitializationCheck {
    fn name(&self) -> &'static str {
        "agent_initialization"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Agent
    }

    async fn execute(&self, ctx: &CheckContext, _prior: &[CheckResult]) -> CheckResult {
        if ctx.registries.fallback_agent().is_err() {
            return CheckResult::failed(
                self.name(),
                self.category(),
                "fallback agent message_processor is not configured",
            );
        }

        for agent in ctx.registries.agents.values() {
            for tool_id in agent.tool_ids() {
                if ctx.registries.tools.resolve(tool_id).is_none() {
                    return CheckResult::failed(
                        self.name(),
                        self.category(),
                        format!(
                            "agent {} references unknown tool: {tool_id}",
                            agent.role()
                        ),
                    );
                }
            }
        }

        CheckResult::passed(
            self.name(),
            self.category(),
            format!("{} agents constructible", ctx.registries.agents.len()),
        )
    }
}

// ---------------------------------------------------------------------------
// DatabaseCheck
// ---------------------------------------------------------------------------

/// Database reachable and the global teams collection readable.
pub struct DatabaseCheck;

#[async_trait]
impl StartupCheck for DatabaseCheck {
    fn name(&self) -> &'static str {
        "database_connectivity"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Database
    }

    async fn execute(&self, ctx: &CheckContext, _prior: &[CheckResult]) -> CheckResult {
        if let Err(e) = ctx.store.ping().await {
            return CheckResult::failed(
                self.name(),
                self.category(),
                format!("database ping failed: {e}"),
            );
        }
        match ctx.store.list(TEAMS_COLLECTION).await {
            Ok(teams) => CheckResult::passed(
                self.name(),
                self.category(),
                format!("database reachable, {} teams on record", teams.len()),
            )
            .with_details(json!({ "project_id": ctx.config.database.project_id })),
            Err(e) => CheckResult::failed(
                self.name(),
                self.category(),
                format!("teams collection unreadable: {e}"),
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// StubDetectionCheck
// ---------------------------------------------------------------------------

/// No forbidden placeholder implementations remain registered.
pub struct StubDetectionCheck;

#[async_trait]
impl StartupCheck for StubDetectionCheck {
    fn name(&self) -> &'static str {
        "stub_detection"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::System
    }

    fn critical(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &CheckContext, _prior: &[CheckResult]) -> CheckResult {
        let suspicious: Vec<String> = ctx
            .registries
            .tools
            .ids()
            .into_iter()
            .filter(|id| {
                let lower = id.to_lowercase();
                STUB_MARKERS.iter().any(|marker| lower.contains(marker))
            })
            .collect();

        let undescribed: Vec<String> = ctx
            .registries
            .tools
            .ids()
            .into_iter()
            .filter(|id| {
                ctx.registries
                    .tools
                    .resolve(id)
                    .map(|t| t.spec.description.trim().is_empty())
                    .unwrap_or(false)
            })
            .collect();

        if suspicious.is_empty() && undescribed.is_empty() {
            CheckResult::passed(self.name(), self.category(), "no placeholder tools detected")
        } else {
            CheckResult::warning(
                self.name(),
                self.category(),
                format!(
                    "possible placeholders: {}",
                    suspicious
                        .iter()
                        .chain(undescribed.iter())
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            )
        }
    }
}

// ---------------------------------------------------------------------------
// RegistryConsistencyCheck
// ---------------------------------------------------------------------------

/// Cross-registry invariants: every command's tool resolves and the
/// registry bundle is internally consistent. Depends on the tool registry
/// check so an empty registry is reported once, there.
pub struct RegistryConsistencyCheck;

#[async_trait]
impl StartupCheck for RegistryConsistencyCheck {
    fn name(&self) -> &'static str {
        "registry_consistency"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::System
    }

    fn depends_on(&self) -> Option<&'static str> {
        Some("tool_registry")
    }

    async fn execute(&self, ctx: &CheckContext, prior: &[CheckResult]) -> CheckResult {
        let dependency_failed = prior.iter().any(|r| {
            r.name == "tool_registry" && r.status == crate::startup::report::CheckStatus::Failed
        });
        if dependency_failed {
            return CheckResult {
                name: self.name(),
                category: self.category(),
                status: crate::startup::report::CheckStatus::Skipped,
                message: "skipped: tool registry check failed".to_owned(),
                duration_ms: 0,
                details: None,
            };
        }

        match ctx.registries.check_consistency() {
            Ok(()) => CheckResult::passed(
                self.name(),
                self.category(),
                "registries are mutually consistent",
            ),
            Err(e) => CheckResult::failed(self.name(), self.category(), e.to_string()),
        }
    }
}
