//! Entity validation and entity-aware routing.
//!
//! Both stages key off the first whitespace-delimited token of the task
//! description: if it is a command, the command registry names the tool,
//! the tool's metadata names the entity type, and the tool type names the
//! preferred agent roles. Free text falls through to the fallback agent.

use std::collections::HashMap;
use std::sync::Arc;

use crate::registry::{Agent, Registries};
use crate::types::{AgentRole, ChatType, EntityType, RequestContext, ToolType};

/// Output of the validation stage.
#[derive(Debug, Clone)]
pub struct EntityValidation {
    /// Whether the operation is syntactically valid for its entities.
    pub is_valid: bool,
    /// Entity kind the operation is for, when known.
    pub entity_type: Option<EntityType>,
    /// Human-readable reason when invalid.
    pub error_message: Option<String>,
    /// Natural home for the operation.
    pub suggested_agent: Option<AgentRole>,
}

impl EntityValidation {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            entity_type: None,
            error_message: Some(message.into()),
            suggested_agent: None,
        }
    }
}

/// Context an executed operation carries downstream.
#[derive(Debug, Clone)]
pub struct EntityOperationContext {
    /// The task description.
    pub description: String,
    /// Role selected to execute.
    pub agent_role: AgentRole,
    /// Tool the command maps to, when the task is a command.
    pub tool_id: Option<String>,
    /// Entity kind the operation touches.
    pub entity_type: EntityType,
    /// The validation outcome that accompanied routing.
    pub validation: EntityValidation,
}

/// Preferred agent roles for a tool type, most specific first.
pub fn roles_for_tool_type(tool_type: ToolType) -> &'static [AgentRole] {
    match tool_type {
        ToolType::PlayerManagement => &[
            AgentRole::PlayerCoordinator,
            AgentRole::TeamManager,
            AgentRole::TeamAdministrator,
        ],
        ToolType::TeamManagement => &[AgentRole::TeamAdministrator, AgentRole::TeamManager],
        ToolType::MatchManagement => &[AgentRole::MatchCoordinator, AgentRole::TeamManager],
        ToolType::Communication => &[
            AgentRole::CommunicationManager,
            AgentRole::TeamAdministrator,
        ],
        ToolType::Payment => &[AgentRole::FinanceManager],
        ToolType::Help => &[AgentRole::HelpAssistant],
        ToolType::System => &[AgentRole::IntelligentSystem, AgentRole::MessageProcessor],
        ToolType::Custom => &[AgentRole::MessageProcessor],
    }
}

/// Validates operations against registry metadata and picks executors.
pub struct EntityRouter {
    registries: Arc<Registries>,
}

impl EntityRouter {
    /// Create the router over the frozen registries.
    pub fn new(registries: Arc<Registries>) -> Self {
        Self { registries }
    }

    /// Validate the operation named by the task's first token.
    ///
    /// Free text is always valid and suggests the fallback agent. Commands
    /// must resolve in the registry and be allowed in the caller's chat.
    pub fn validate_operation(&self, command_name: &str, ctx: &RequestContext) -> EntityValidation {
        if !command_name.starts_with('/') {
            return EntityValidation {
                is_valid: true,
                entity_type: Some(EntityType::Neither),
                error_message: None,
                suggested_agent: Some(AgentRole::MessageProcessor),
            };
        }

        let Some(spec) = self.registries.commands.resolve(command_name, ctx.chat_type) else {
            return EntityValidation::invalid(format!("unknown command: {command_name}"));
        };

        // System contexts bypass the chat gate (maintenance operations).
        if ctx.chat_type != ChatType::System && !spec.allowed_in(ctx.chat_type) {
            let mut validation = EntityValidation::invalid(format!(
                "{command_name} is not available in the {} chat",
                ctx.chat_type
            ));
            validation.entity_type = self.entity_type_of(&spec.tool_id);
            return validation;
        }

        let entity_type = self.entity_type_of(&spec.tool_id);
        let suggested = self
            .registries
            .tools
            .resolve(&spec.tool_id)
            .and_then(|tool| roles_for_tool_type(tool.spec.tool_type).first().copied());

        EntityValidation {
            is_valid: true,
            entity_type,
            error_message: None,
            suggested_agent: suggested.or(Some(AgentRole::MessageProcessor)),
        }
    }

    /// Pick the executing role and build the operation context.
    ///
    /// Falls back to `message_processor`, which always exists in the
    /// available set.
    pub fn route(
        &self,
        command_name: &str,
        task: &str,
        ctx: &RequestContext,
        validation: &EntityValidation,
        available: &HashMap<AgentRole, Arc<Agent>>,
    ) -> EntityOperationContext {
        let tool = command_name
            .starts_with('/')
            .then(|| self.registries.commands.resolve(command_name, ctx.chat_type))
            .flatten()
            .and_then(|spec| self.registries.tools.resolve(&spec.tool_id));

        let entity_type = validation
            .entity_type
            .or_else(|| {
                tool.as_ref()
                    .and_then(|t| t.spec.entity_types.first().copied())
            })
            .unwrap_or(EntityType::Neither);

        let selected = tool
            .as_ref()
            .map(|t| {
                let preferences = roles_for_tool_type(t.spec.tool_type);
                preferences
                    .iter()
                    .copied()
                    .find(|role| {
                        available.contains_key(role)
                            && self.registries.tools.validate_access(
                                &t.spec.tool_id,
                                *role,
                                Some(entity_type),
                            )
                    })
                    .unwrap_or(AgentRole::MessageProcessor)
            })
            .unwrap_or(AgentRole::MessageProcessor);

        EntityOperationContext {
            description: task.to_owned(),
            agent_role: selected,
            tool_id: tool.map(|t| t.spec.tool_id.clone()),
            entity_type,
            validation: validation.clone(),
        }
    }

    fn entity_type_of(&self, tool_id: &str) -> Option<EntityType> {
        self.registries
            .tools
            .resolve(tool_id)
            .and_then(|tool| tool.spec.entity_types.first().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::test_registries;
    use crate::types::UserPermissions;

    fn router() -> (EntityRouter, Arc<Registries>) {
        let registries = Arc::new(test_registries());
        (EntityRouter::new(Arc::clone(&registries)), registries)
    }

    fn ctx(chat: ChatType) -> RequestContext {
        RequestContext::from_command(
            5,
            "KAI",
            "c",
            chat,
            "/list",
            "u",
            "U",
            UserPermissions::default(),
        )
        .expect("ctx")
    }

    #[test]
    fn test_free_text_is_valid_for_fallback() {
        let (router, _) = router();
        let validation = router.validate_operation("hello", &ctx(ChatType::Main));
        assert!(validation.is_valid);
        assert_eq!(validation.suggested_agent, Some(AgentRole::MessageProcessor));
    }

    #[test]
    fn test_unknown_command_invalid() {
        let (router, _) = router();
        let validation = router.validate_operation("/frobnicate", &ctx(ChatType::Main));
        assert!(!validation.is_valid);
        assert!(validation
            .error_message
            .as_deref()
            .expect("message")
            .contains("unknown command"));
    }

    #[test]
    fn test_wrong_chat_invalid() {
        let (router, _) = router();
        let validation = router.validate_operation("/approve", &ctx(ChatType::Main));
        assert!(!validation.is_valid);
        assert!(validation
            .error_message
            .as_deref()
            .expect("message")
            .contains("not available"));
    }

    #[test]
    fn test_player_command_routes_to_coordinator() {
        let (router, registries) = router();
        let context = ctx(ChatType::Leadership);
        let validation = router.validate_operation("/approve", &context);
        assert!(validation.is_valid);
        assert_eq!(validation.entity_type, Some(EntityType::Player));

        let op = router.route("/approve", "/approve JS1", &context, &validation, &registries.agents);
        assert_eq!(op.agent_role, AgentRole::PlayerCoordinator);
        assert_eq!(op.tool_id.as_deref(), Some("approve_player"));
        assert_eq!(op.entity_type, EntityType::Player);
    }

    #[test]
    fn test_free_text_routes_to_fallback() {
        let (router, registries) = router();
        let context = ctx(ChatType::Main);
        let validation = router.validate_operation("what", &context);
        let op = router.route("what", "what can I do?", &context, &validation, &registries.agents);
        assert_eq!(op.agent_role, AgentRole::MessageProcessor);
        assert!(op.tool_id.is_none());
    }
}
