//! Agent configuration and factory.
//!
//! Agents are configured, not discovered: [`default_agent_specs`] is the
//! closed list of roles with their goals, backstories, and tool ids. The
//! factory resolves each tool id against the tool registry and refuses to
//! build an agent referencing an unknown tool — at startup, not at first
//! request.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::providers::LlmProvider;
use crate::registry::tools::{RegisteredTool, ToolRegistry};
use crate::types::{AgentRole, KickAiError, RequestContext};

/// Token budget for conversational agent replies.
const REPLY_MAX_TOKENS: u32 = 500;

/// Configured identity of one agent.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    /// Role this agent fills.
    pub role: AgentRole,
    /// What the agent is for.
    pub goal: String,
    /// Persona text injected into conversational prompts.
    pub backstory: String,
    /// Tools the agent may use; every id must resolve at startup.
    pub tool_ids: Vec<String>,
}

impl AgentSpec {
    fn new(role: AgentRole, goal: &str, backstory: &str, tool_ids: &[&str]) -> Self {
        Self {
            role,
            goal: goal.to_owned(),
            backstory: backstory.to_owned(),
            tool_ids: tool_ids.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

/// The default agent configuration.
///
/// `MessageProcessor` is the routing fallback and must stay in this list.
pub fn default_agent_specs() -> Vec<AgentSpec> {
    vec![
        AgentSpec::new(
            AgentRole::MessageProcessor,
            "Handle anything the specialists do not claim and keep the conversation moving",
            "You are the team's general assistant. You answer plainly, point people at the right command, and never leave a message unanswered.",
            &[
                "get_help",
                "welcome_message",
                "ping",
                "version",
                "get_my_info",
                "get_player_status",
                "list_active_players",
            ],
        ),
        AgentSpec::new(
            AgentRole::HelpAssistant,
            "Explain what the bot can do in each chat",
            "You know every command, who may use it, and where. You answer capability questions with short, concrete lists.",
            &["get_help", "welcome_message"],
        ),
        AgentSpec::new(
            AgentRole::PlayerCoordinator,
            "Run player registration from first contact to approval",
            "You look after the squad roster: registrations, approvals, phone linkage, and player records.",
            &[
                "register_player",
                "approve_player",
                "reject_player",
                "remove_player",
                "list_active_players",
                "get_my_info",
                "get_player_status",
                "link_player_contact",
            ],
        ),
        AgentSpec::new(
            AgentRole::TeamManager,
            "Keep the squad and fixtures in shape day to day",
            "You manage selection and fixtures, balancing availability against the match calendar.",
            &[
                "register_player",
                "approve_player",
                "list_active_players",
                "create_match",
                "list_matches",
                "select_squad",
                "attendance_summary",
            ],
        ),
        AgentSpec::new(
            AgentRole::TeamAdministrator,
            "Administer membership and leadership-only operations",
            "You handle the administrative side: team members, approvals, invite links, and announcements.",
            &[
                "add_team_member",
                "list_team_members",
                "approve_player",
                "remove_player",
                "generate_invite_link",
                "send_announcement",
            ],
        ),
        AgentSpec::new(
            AgentRole::MatchCoordinator,
            "Track availability and select match squads",
            "You own fixtures and attendance, chasing availability and naming the squad.",
            &[
                "create_match",
                "list_matches",
                "select_squad",
                "mark_attendance",
                "attendance_summary",
            ],
        ),
        AgentSpec::new(
            AgentRole::CommunicationManager,
            "Deliver announcements to the right chat",
            "You write and deliver team-wide messages and invite links.",
            &["send_announcement", "generate_invite_link"],
        ),
        AgentSpec::new(
            AgentRole::IntelligentSystem,
            "Report on system health",
            "You answer diagnostic questions about the bot itself.",
            &["ping", "version"],
        ),
    ]
}

/// A role-specialized executor bound to a tool subset and an LLM client.
pub struct Agent {
    spec: AgentSpec,
    provider: Arc<dyn LlmProvider>,
    tools: Vec<Arc<RegisteredTool>>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("role", &self.spec.role)
            .field("tools", &self.spec.tool_ids)
            .finish()
    }
}

impl Agent {
    /// The role this agent fills.
    pub fn role(&self) -> AgentRole {
        self.spec.role
    }

    /// Tool ids this agent is bound to.
    pub fn tool_ids(&self) -> &[String] {
        &self.spec.tool_ids
    }

    /// Execute a task and produce the reply text.
    ///
    /// Commands dispatch to the tool named by the `tool_id` metadata the
    /// routing stage attached when it resolved the command; anything else
    /// goes through the conversational path via the LLM provider.
    pub async fn execute(&self, task: &str, ctx: &RequestContext) -> Result<String, KickAiError> {
        let mut tokens = task.split_whitespace();
        let first = tokens.next().unwrap_or("");
        let args: Vec<String> = tokens.map(str::to_owned).collect();

        if first.starts_with('/') {
            let hint = ctx.metadata.get("tool_id").and_then(Value::as_str);
            if let Some(tool_id) = hint {
                if let Some(tool) = self.tools.iter().find(|t| t.spec.tool_id == tool_id) {
                    debug!(role = %self.spec.role, tool = tool_id, "dispatching command to tool");
                    return Ok(tool.invoke(ctx, &args).await);
                }
                debug!(
                    role = %self.spec.role,
                    tool = tool_id,
                    "tool hint not in this agent's set, falling through to conversation"
                );
            }
        }

        self.converse(task, ctx).await
    }

    /// Conversational path: let the provider answer, or name one of this
    /// agent's tools to run.
    async fn converse(&self, task: &str, ctx: &RequestContext) -> Result<String, KickAiError> {
        let tool_list: Vec<String> = self
            .tools
            .iter()
            .map(|t| format!("- {}: {}", t.spec.tool_id, t.spec.description))
            .collect();

        let prompt = format!(
            "{backstory}\n\nGoal: {goal}\n\nAvailable tools:\n{tools}\n\n\
             User ({chat} chat): {task}\n\n\
             Reply with a single tool id from the list to run it, or answer directly in plain text.",
            backstory = self.spec.backstory,
            goal = self.spec.goal,
            tools = tool_list.join("\n"),
            chat = ctx.chat_type,
            task = task,
        );

        let reply = self
            .provider
            .generate(&prompt, REPLY_MAX_TOKENS)
            .await
            .map_err(|e| KickAiError::unavailable("llm", e.to_string()))?;

        let candidate = reply.trim();
        if let Some(tool) = self.tools.iter().find(|t| t.spec.tool_id == candidate) {
            debug!(role = %self.spec.role, tool = %candidate, "provider selected a tool");
            return Ok(tool.invoke(ctx, &[]).await);
        }
        Ok(reply)
    }
}

/// Builds agents from configuration, failing fast on unknown tools.
#[derive(Debug, Default)]
pub struct AgentFactory;

impl AgentFactory {
    /// Build one agent per spec, resolving tool ids in the registry.
    ///
    /// An unknown tool id is a programming error: the process must not come
    /// up with an agent that would fail at first request.
    pub fn build(
        specs: &[AgentSpec],
        tools: &ToolRegistry,
        provider: Arc<dyn LlmProvider>,
    ) -> Result<HashMap<AgentRole, Arc<Agent>>, KickAiError> {
        let mut agents = HashMap::new();
        for spec in specs {
            let mut resolved = Vec::with_capacity(spec.tool_ids.len());
            for tool_id in &spec.tool_ids {
                let tool = tools.resolve(tool_id).ok_or_else(|| {
                    KickAiError::Programming(format!(
                        "agent {} references unknown tool: {tool_id}",
                        spec.role
                    ))
                })?;
                resolved.push(tool);
            }
            debug!(role = %spec.role, tools = resolved.len(), "agent constructed");
            agents.insert(
                spec.role,
                Arc::new(Agent {
                    spec: spec.clone(),
                    provider: Arc::clone(&provider),
                    tools: resolved,
                }),
            );
        }
        info!(agents = agents.len(), "agent set ready");
        Ok(agents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockProvider;
    use crate::registry::tools::{ToolRegistry, ToolSpec};
    use crate::tools::{success_message, Tool};
    use crate::types::{ChatType, ToolCategory, ToolType, UserPermissions};
    use async_trait::async_trait;
    use serde_json::json;

    struct PongTool;

    #[async_trait]
    impl Tool for PongTool {
        async fn run(&self, _ctx: &RequestContext, _args: &[String]) -> String {
            success_message("pong")
        }
    }

    fn registry_with_ping() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                ToolSpec::new("ping", ToolType::System, ToolCategory::Utility, "shared", "pong"),
                Arc::new(PongTool),
                &[],
            )
            .expect("register");
        registry
    }

    fn ctx_with_hint(hint: &str) -> RequestContext {
        RequestContext::from_command(
            5,
            "KAI",
            "c1",
            ChatType::Main,
            "/ping",
            "u",
            "U",
            UserPermissions::default(),
        )
        .expect("ctx")
        .with_metadata("tool_id", json!(hint))
    }

    #[test]
    fn test_factory_rejects_unknown_tool() {
        let registry = registry_with_ping();
        let specs = vec![AgentSpec::new(
            AgentRole::MessageProcessor,
            "g",
            "b",
            &["ping", "does_not_exist"],
        )];
        let err = AgentFactory::build(&specs, &registry, Arc::new(MockProvider::new()))
            .expect_err("unknown tool");
        assert!(matches!(err, KickAiError::Programming(_)));
        assert!(err.to_string().contains("does_not_exist"));
    }

    #[test]
    fn test_default_specs_include_fallback_role() {
        let specs = default_agent_specs();
        assert!(specs
            .iter()
            .any(|s| s.role == AgentRole::MessageProcessor));
    }

    #[tokio::test]
    async fn test_command_dispatches_to_hinted_tool() {
        let registry = registry_with_ping();
        let specs = vec![AgentSpec::new(AgentRole::MessageProcessor, "g", "b", &["ping"])];
        let agents = AgentFactory::build(&specs, &registry, Arc::new(MockProvider::new()))
            .expect("build");
        let agent = agents.get(&AgentRole::MessageProcessor).expect("agent");

        let reply = agent
            .execute("/ping", &ctx_with_hint("ping"))
            .await
            .expect("execute");
        assert!(reply.contains("pong"));
    }

    #[tokio::test]
    async fn test_unhinted_text_goes_conversational() {
        let registry = registry_with_ping();
        let specs = vec![AgentSpec::new(AgentRole::MessageProcessor, "g", "b", &["ping"])];
        let agents = AgentFactory::build(&specs, &registry, Arc::new(MockProvider::new()))
            .expect("build");
        let agent = agents.get(&AgentRole::MessageProcessor).expect("agent");

        let ctx = RequestContext::from_telegram_message(
            5,
            "KAI",
            "c1",
            ChatType::Main,
            "what can I do?",
            "u",
            "U",
            UserPermissions::default(),
        )
        .expect("ctx");
        let reply = agent.execute("what can I do?", &ctx).await.expect("execute");
        assert!(!reply.is_empty());
    }
}
