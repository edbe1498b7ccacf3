//! Central directory of named operations callable by agents.
//!
//! Tools are registered explicitly at startup through the manifest
//! ([`crate::tools::manifest`]); there is no runtime discovery walk. The
//! registry stores metadata and handler together, enforces per-agent and
//! per-entity access control, and wraps invocation with context validation
//! for tools that declare a schema.
//!
//! Registration happens before the transport starts; lookups during serving
//! are read-only, so the frozen registry is shared via `Arc` without locks.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::tools::{error, Tool};
use crate::types::{
    AgentRole, EntityType, KickAiError, PermissionLevel, RequestContext, ToolCategory, ToolType,
};

// ---------------------------------------------------------------------------
// ToolSpec
// ---------------------------------------------------------------------------

/// Context-validation schema: JSON pointers that must resolve to a
/// non-null, non-empty value in the serialized request context.
#[derive(Debug, Clone, Default)]
pub struct ContextSchema {
    /// Required pointers, e.g. `/telegram_id` or `/metadata/contact_phone`.
    pub required: Vec<String>,
}

impl ContextSchema {
    /// Schema requiring the given pointers.
    pub fn require(pointers: &[&str]) -> Self {
        Self {
            required: pointers.iter().map(|p| (*p).to_owned()).collect(),
        }
    }
}

/// Static metadata for a registered tool.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    /// Stable identifier, unique across the registry.
    pub tool_id: String,
    /// Functional classification.
    pub tool_type: ToolType,
    /// Organizational tier.
    pub category: ToolCategory,
    /// Human-readable description.
    pub description: String,
    /// Version tag.
    pub version: String,
    /// Disabled tools resolve but refuse access.
    pub enabled: bool,
    /// Feature module the tool belongs to.
    pub feature_module: String,
    /// Minimum permission tier of the caller.
    pub required_permission: PermissionLevel,
    /// Entity kinds this tool operates on.
    pub entity_types: Vec<EntityType>,
    /// Agent role → entity types that role may use the tool for.
    /// Empty means open to any agent.
    pub access_control: HashMap<AgentRole, Vec<EntityType>>,
    /// Whether the tool reads the request context beyond identity fields.
    pub requires_context: bool,
    /// Optional context-validation schema enforced on every call.
    pub context_schema: Option<ContextSchema>,
}

impl ToolSpec {
    /// Create a spec with defaults: enabled, version `1.0.0`, public
    /// permission, `Neither` entity type, open access control.
    pub fn new(
        tool_id: impl Into<String>,
        tool_type: ToolType,
        category: ToolCategory,
        feature_module: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            tool_id: tool_id.into(),
            tool_type,
            category,
            description: description.into(),
            version: "1.0.0".to_owned(),
            enabled: true,
            feature_module: feature_module.into(),
            required_permission: PermissionLevel::Public,
            entity_types: vec![EntityType::Neither],
            access_control: HashMap::new(),
            requires_context: false,
            context_schema: None,
        }
    }

    /// Set the minimum caller permission.
    pub fn with_permission(mut self, permission: PermissionLevel) -> Self {
        self.required_permission = permission;
        self
    }

    /// Set the entity types this tool operates on.
    pub fn with_entity_types(mut self, entity_types: &[EntityType]) -> Self {
        self.entity_types = entity_types.to_vec();
        self
    }

    /// Grant access to a role for the given entity types.
    pub fn grant(mut self, role: AgentRole, entity_types: &[EntityType]) -> Self {
        self.access_control.insert(role, entity_types.to_vec());
        self
    }

    /// Attach a context-validation schema.
    pub fn with_context_schema(mut self, schema: ContextSchema) -> Self {
        self.requires_context = true;
        self.context_schema = Some(schema);
        self
    }
}

// ---------------------------------------------------------------------------
// RegisteredTool
// ---------------------------------------------------------------------------

/// A tool together with its metadata, as stored in the registry.
pub struct RegisteredTool {
    /// Registration metadata.
    pub spec: ToolSpec,
    handler: Arc<dyn Tool>,
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("tool_id", &self.spec.tool_id)
            .field("feature", &self.spec.feature_module)
            .finish()
    }
}

impl RegisteredTool {
    /// Invoke the tool, enforcing the context schema when one is declared.
    ///
    /// Schema failures return a structured error envelope and log the
    /// failure; they never reach the underlying tool.
    pub async fn invoke(&self, ctx: &RequestContext, args: &[String]) -> String {
        if !self.spec.enabled {
            return error("This operation is currently disabled.");
        }

        if let Some(schema) = &self.spec.context_schema {
            let context_value = ctx.to_value();
            for pointer in &schema.required {
                let present = match context_value.pointer(pointer) {
                    None | Some(Value::Null) => false,
                    Some(Value::String(s)) => !s.is_empty(),
                    Some(_) => true,
                };
                if !present {
                    warn!(
                        tool = %self.spec.tool_id,
                        field = %pointer,
                        "context validation failed"
                    );
                    return error(format!(
                        "Missing required context field: {}",
                        pointer.trim_start_matches('/').replace('/', ".")
                    ));
                }
            }
            debug!(tool = %self.spec.tool_id, "context validation passed");
        }

        self.handler.run(ctx, args).await
    }
}

// ---------------------------------------------------------------------------
// ToolRegistry
// ---------------------------------------------------------------------------

/// Write-once directory of tools, keyed by id with alias support.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<RegisteredTool>>,
    aliases: HashMap<String, String>,
    populated: bool,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool with full metadata and optional aliases.
    ///
    /// Duplicate ids and alias collisions are programming errors: the
    /// manifest is wrong and the process must not come up.
    pub fn register(
        &mut self,
        spec: ToolSpec,
        handler: Arc<dyn Tool>,
        aliases: &[&str],
    ) -> Result<(), KickAiError> {
        let tool_id = spec.tool_id.clone();
        if self.tools.contains_key(&tool_id) || self.aliases.contains_key(&tool_id) {
            return Err(KickAiError::Programming(format!(
                "duplicate tool id: {tool_id}"
            )));
        }

        for alias in aliases {
            if self.tools.contains_key(*alias) || self.aliases.contains_key(*alias) {
                return Err(KickAiError::Programming(format!(
                    "tool alias collides with an existing registration: {alias}"
                )));
            }
            self.aliases.insert((*alias).to_owned(), tool_id.clone());
        }

        let context_aware = spec.context_schema.is_some();
        self.tools
            .insert(tool_id.clone(), Arc::new(RegisteredTool { spec, handler }));
        debug!(tool = %tool_id, context_aware, "tool registered");
        Ok(())
    }

    /// Register a tool whose metadata is incomplete, deriving type, entity
    /// types, and access control from keywords in the tool id.
    ///
    /// Explicit registration metadata always wins over these defaults; this
    /// path exists for simple utility tools.
    pub fn register_classified(
        &mut self,
        tool_id: &str,
        feature_module: &str,
        description: &str,
        handler: Arc<dyn Tool>,
        aliases: &[&str],
    ) -> Result<(), KickAiError> {
        let mut spec = ToolSpec::new(
            tool_id,
            classify_tool_type(tool_id),
            classify_category(feature_module),
            feature_module,
            description,
        );
        spec.entity_types = classify_entity_types(tool_id);
        spec.access_control = classify_access_control(tool_id);
        self.register(spec, handler, aliases)
    }

    /// Whether the manifest has already populated this registry.
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    /// Mark population complete. Further manifest runs become no-ops.
    pub fn finish_population(&mut self) {
        self.populated = true;
        info!(tools = self.tools.len(), aliases = self.aliases.len(), "tool registry populated");
    }

    /// Resolve a tool by id or alias.
    pub fn resolve(&self, id_or_alias: &str) -> Option<Arc<RegisteredTool>> {
        if let Some(tool) = self.tools.get(id_or_alias) {
            return Some(Arc::clone(tool));
        }
        self.aliases
            .get(id_or_alias)
            .and_then(|canonical| self.tools.get(canonical))
            .map(Arc::clone)
    }

    /// All registered tool ids.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tools.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tools belonging to a feature module.
    pub fn tools_by_feature(&self, feature: &str) -> Vec<Arc<RegisteredTool>> {
        self.filtered(|t| t.spec.feature_module == feature)
    }

    /// Tools of a functional type.
    pub fn tools_by_type(&self, tool_type: ToolType) -> Vec<Arc<RegisteredTool>> {
        self.filtered(|t| t.spec.tool_type == tool_type)
    }

    /// Tools of an organizational category.
    pub fn tools_by_category(&self, category: ToolCategory) -> Vec<Arc<RegisteredTool>> {
        self.filtered(|t| t.spec.category == category)
    }

    /// Tools operating on an entity type.
    pub fn tools_by_entity_type(&self, entity_type: EntityType) -> Vec<Arc<RegisteredTool>> {
        self.filtered(|t| t.spec.entity_types.contains(&entity_type))
    }

    /// Tools requiring at least the given permission tier.
    pub fn tools_with_permission(&self, permission: PermissionLevel) -> Vec<Arc<RegisteredTool>> {
        self.filtered(|t| t.spec.required_permission == permission)
    }

    /// Enabled tools a given agent role may use, optionally narrowed to an
    /// entity type.
    pub fn tools_for_agent(
        &self,
        role: AgentRole,
        entity_type: Option<EntityType>,
    ) -> Vec<Arc<RegisteredTool>> {
        self.filtered(|t| self.validate_access(&t.spec.tool_id, role, entity_type))
    }

    /// Access-control decision for `(tool, role, entity_type)`.
    ///
    /// True iff the tool is enabled and either its access-control map is
    /// empty (open to any agent) or it lists `role` with `entity_type` (when
    /// provided) in the mapped set.
    pub fn validate_access(
        &self,
        tool_id: &str,
        role: AgentRole,
        entity_type: Option<EntityType>,
    ) -> bool {
        let Some(tool) = self.resolve(tool_id) else {
            return false;
        };
        if !tool.spec.enabled {
            return false;
        }
        if tool.spec.access_control.is_empty() {
            return true;
        }
        match tool.spec.access_control.get(&role) {
            None => false,
            Some(allowed) => match entity_type {
                None => true,
                Some(entity) => allowed.contains(&entity),
            },
        }
    }

    /// Whether a role can handle operations on an entity type at all:
    /// it has at least one tool accessible for that entity.
    pub fn agent_handles_entity(&self, role: AgentRole, entity_type: EntityType) -> bool {
        self.tools.values().any(|t| {
            t.spec.access_control.is_empty()
                || t.spec
                    .access_control
                    .get(&role)
                    .map(|allowed| {
                        allowed.contains(&entity_type) || allowed.contains(&EntityType::Both)
                    })
                    .unwrap_or(false)
        })
    }

    fn filtered(&self, pred: impl Fn(&RegisteredTool) -> bool) -> Vec<Arc<RegisteredTool>> {
        let mut tools: Vec<Arc<RegisteredTool>> = self
            .tools
            .values()
            .filter(|t| pred(t.as_ref()))
            .map(Arc::clone)
            .collect();
        tools.sort_by(|a, b| a.spec.tool_id.cmp(&b.spec.tool_id));
        tools
    }
}

// ---------------------------------------------------------------------------
// Keyword classification defaults
// ---------------------------------------------------------------------------

fn id_contains(tool_id: &str, keywords: &[&str]) -> bool {
    let lower = tool_id.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

/// Derive a tool type from keywords in the tool id.
pub fn classify_tool_type(tool_id: &str) -> ToolType {
    if id_contains(tool_id, &["send", "message", "announce", "broadcast", "poll"]) {
        ToolType::Communication
    } else if id_contains(tool_id, &["player", "register", "approve"]) {
        ToolType::PlayerManagement
    } else if id_contains(tool_id, &["team", "member", "admin"]) {
        ToolType::TeamManagement
    } else if id_contains(tool_id, &["match", "game", "fixture", "attendance", "squad"]) {
        ToolType::MatchManagement
    } else if id_contains(tool_id, &["payment", "finance", "budget"]) {
        ToolType::Payment
    } else if id_contains(tool_id, &["help", "guide", "welcome"]) {
        ToolType::Help
    } else if id_contains(tool_id, &["system", "health", "status", "ping", "version"]) {
        ToolType::System
    } else {
        ToolType::Custom
    }
}

/// Derive a category from the feature module name.
pub fn classify_category(feature_module: &str) -> ToolCategory {
    match feature_module {
        "shared" | "core" => ToolCategory::Core,
        "utils" | "helpers" => ToolCategory::Utility,
        _ => ToolCategory::Feature,
    }
}

/// Derive entity types from keywords in the tool id.
pub fn classify_entity_types(tool_id: &str) -> Vec<EntityType> {
    if id_contains(tool_id, &["both"]) {
        vec![EntityType::Both]
    } else if id_contains(tool_id, &["player", "register", "approve"]) {
        vec![EntityType::Player]
    } else if id_contains(tool_id, &["team", "member", "admin"]) {
        vec![EntityType::TeamMember]
    } else {
        vec![EntityType::Neither]
    }
}

/// Derive a default access-control map from keywords in the tool id.
pub fn classify_access_control(tool_id: &str) -> HashMap<AgentRole, Vec<EntityType>> {
    let mut access = HashMap::new();
    let both = vec![EntityType::Both];

    if id_contains(tool_id, &["admin", "manage", "control"]) {
        access.insert(AgentRole::TeamAdministrator, both.clone());
        access.insert(AgentRole::TeamManager, both);
    } else if id_contains(tool_id, &["player", "register", "approve", "remove", "add"]) {
        access.insert(AgentRole::TeamManager, both.clone());
        access.insert(AgentRole::PlayerCoordinator, both.clone());
        access.insert(AgentRole::TeamAdministrator, both);
    } else if id_contains(tool_id, &["team", "member", "squad"]) {
        access.insert(AgentRole::TeamAdministrator, both.clone());
        access.insert(AgentRole::TeamManager, both);
    } else if id_contains(tool_id, &["match", "game", "fixture"]) {
        access.insert(AgentRole::MatchCoordinator, both.clone());
        access.insert(AgentRole::TeamManager, both);
    } else if id_contains(tool_id, &["message", "notification", "announce", "broadcast"]) {
        access.insert(AgentRole::CommunicationManager, both);
    } else if id_contains(tool_id, &["payment", "finance", "budget"]) {
        access.insert(AgentRole::FinanceManager, both);
    } else if id_contains(tool_id, &["help", "assist", "guide"]) {
        access.insert(AgentRole::HelpAssistant, both);
    } else if id_contains(tool_id, &["system", "health", "status"]) {
        access.insert(AgentRole::IntelligentSystem, both);
    }

    access
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::tools::success_message;
    use crate::types::{ChatType, UserPermissions};

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        async fn run(&self, _ctx: &RequestContext, args: &[String]) -> String {
            success_message(format!("echo: {}", args.join(" ")))
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::from_command(
            7,
            "KAI",
            "c1",
            ChatType::Main,
            "/echo hi",
            "u",
            "U",
            UserPermissions::default(),
        )
        .expect("ctx")
    }

    fn spec(id: &str) -> ToolSpec {
        ToolSpec::new(
            id,
            ToolType::System,
            ToolCategory::Utility,
            "shared",
            "test tool",
        )
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ToolRegistry::new();
        registry
            .register(spec("echo"), Arc::new(EchoTool), &[])
            .expect("first");
        let err = registry
            .register(spec("echo"), Arc::new(EchoTool), &[])
            .expect_err("duplicate");
        assert!(matches!(err, KickAiError::Programming(_)));
    }

    #[test]
    fn test_alias_resolves_to_canonical() {
        let mut registry = ToolRegistry::new();
        registry
            .register(spec("echo"), Arc::new(EchoTool), &["repeat", "say"])
            .expect("register");
        let canonical = registry.resolve("echo").expect("canonical");
        let via_alias = registry.resolve("repeat").expect("alias");
        assert_eq!(canonical.spec.tool_id, via_alias.spec.tool_id);
        assert!(registry.resolve("missing").is_none());
    }

    #[test]
    fn test_alias_collision_rejected() {
        let mut registry = ToolRegistry::new();
        registry
            .register(spec("echo"), Arc::new(EchoTool), &[])
            .expect("register");
        let err = registry
            .register(spec("other"), Arc::new(EchoTool), &["echo"])
            .expect_err("alias collides with canonical");
        assert!(matches!(err, KickAiError::Programming(_)));
    }

    #[test]
    fn test_open_access_control_allows_every_role() {
        let mut registry = ToolRegistry::new();
        registry
            .register(spec("echo"), Arc::new(EchoTool), &[])
            .expect("register");
        for role in [
            AgentRole::MessageProcessor,
            AgentRole::HelpAssistant,
            AgentRole::FinanceManager,
        ] {
            assert!(registry.validate_access("echo", role, Some(EntityType::Player)));
            assert!(registry.validate_access("echo", role, None));
        }
    }

    #[test]
    fn test_access_control_role_and_entity_gating() {
        let mut registry = ToolRegistry::new();
        let spec = spec("approve_player").grant(
            AgentRole::PlayerCoordinator,
            &[EntityType::Player, EntityType::Both],
        );
        registry.register(spec, Arc::new(EchoTool), &[]).expect("register");

        assert!(registry.validate_access(
            "approve_player",
            AgentRole::PlayerCoordinator,
            Some(EntityType::Player)
        ));
        assert!(registry.validate_access("approve_player", AgentRole::PlayerCoordinator, None));
        assert!(!registry.validate_access(
            "approve_player",
            AgentRole::PlayerCoordinator,
            Some(EntityType::TeamMember)
        ));
        assert!(!registry.validate_access(
            "approve_player",
            AgentRole::HelpAssistant,
            Some(EntityType::Player)
        ));
    }

    #[test]
    fn test_disabled_tool_refuses_access() {
        let mut registry = ToolRegistry::new();
        let mut disabled = spec("echo");
        disabled.enabled = false;
        registry.register(disabled, Arc::new(EchoTool), &[]).expect("register");
        assert!(!registry.validate_access("echo", AgentRole::MessageProcessor, None));
    }

    #[tokio::test]
    async fn test_context_schema_blocks_missing_field() {
        let mut registry = ToolRegistry::new();
        let spec = spec("link_contact")
            .with_context_schema(ContextSchema::require(&["/metadata/contact_phone"]));
        registry.register(spec, Arc::new(EchoTool), &[]).expect("register");

        let tool = registry.resolve("link_contact").expect("resolve");

        let bare = ctx();
        let reply = tool.invoke(&bare, &[]).await;
        let parsed: Value = serde_json::from_str(&reply).expect("json");
        assert_eq!(parsed["status"], "error");
        assert!(parsed["message"]
            .as_str()
            .expect("message")
            .contains("contact_phone"));

        let with_contact = bare.with_metadata("contact_phone", json!("+447123456789"));
        let reply = tool.invoke(&with_contact, &[]).await;
        let parsed: Value = serde_json::from_str(&reply).expect("json");
        assert_eq!(parsed["status"], "success");
    }

    #[test]
    fn test_keyword_classification_defaults() {
        assert_eq!(classify_tool_type("approve_player"), ToolType::PlayerManagement);
        assert_eq!(classify_tool_type("announce_text"), ToolType::Communication);
        assert_eq!(classify_tool_type("ping"), ToolType::System);
        assert_eq!(classify_tool_type("mystery"), ToolType::Custom);

        let access = classify_access_control("approve_player");
        assert!(access.contains_key(&AgentRole::PlayerCoordinator));
        assert!(access.contains_key(&AgentRole::TeamManager));
        assert!(access.contains_key(&AgentRole::TeamAdministrator));

        let admin = classify_access_control("manage_settings");
        assert!(admin.contains_key(&AgentRole::TeamAdministrator));
        assert!(!admin.contains_key(&AgentRole::PlayerCoordinator));

        assert!(classify_access_control("mystery").is_empty());
        assert_eq!(classify_entity_types("approve_player"), vec![EntityType::Player]);
        assert_eq!(classify_entity_types("add_member"), vec![EntityType::TeamMember]);
    }

    #[test]
    fn test_classification_helpers_list_by_axis() {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                ToolSpec::new(
                    "list_active_players",
                    ToolType::PlayerManagement,
                    ToolCategory::Feature,
                    "player_registration",
                    "list players",
                )
                .with_entity_types(&[EntityType::Player]),
                Arc::new(EchoTool),
                &[],
            )
            .expect("register");
        registry
            .register(spec("ping"), Arc::new(EchoTool), &[])
            .expect("register");

        assert_eq!(registry.tools_by_feature("player_registration").len(), 1);
        assert_eq!(registry.tools_by_type(ToolType::PlayerManagement).len(), 1);
        assert_eq!(registry.tools_by_entity_type(EntityType::Player).len(), 1);
        assert_eq!(registry.tools_by_category(ToolCategory::Utility).len(), 1);
        assert_eq!(registry.len(), 2);
    }
}
