//! Command registry: `/command` → feature, permission, and chat metadata.
//!
//! Commands are registered explicitly at startup and the registry is then
//! frozen; consumers only ever see the frozen [`CommandRegistry`], so the
//! decorator-era race between module loading and registry reads cannot
//! exist. The builder refuses duplicate `(name, chat_type)` claims and alias
//! collisions at registration time.
//!
//! A per-chat-type overlay lets the same command name resolve to different
//! descriptors in the main and leadership chats.

use std::collections::HashMap;

use tracing::info;

use crate::types::{ChatType, KickAiError, PermissionLevel};

/// Static metadata for one command.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Canonical name including the slash, e.g. `/list`.
    pub name: String,
    /// Feature module the command belongs to.
    pub feature: String,
    /// One-line description shown by `/help`.
    pub description: String,
    /// Minimum permission tier of the caller.
    pub permission: PermissionLevel,
    /// Chats where the command may be used.
    pub chat_types: Vec<ChatType>,
    /// The tool the command dispatches to.
    pub tool_id: String,
}

impl CommandSpec {
    /// Create a command descriptor.
    pub fn new(
        name: impl Into<String>,
        feature: impl Into<String>,
        description: impl Into<String>,
        permission: PermissionLevel,
        chat_types: &[ChatType],
        tool_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            feature: feature.into(),
            description: description.into(),
            permission,
            chat_types: chat_types.to_vec(),
            tool_id: tool_id.into(),
        }
    }

    /// Whether the command is permitted in the given chat.
    pub fn allowed_in(&self, chat_type: ChatType) -> bool {
        self.chat_types.contains(&chat_type)
    }
}

/// Mutable registration phase. [`CommandRegistryBuilder::freeze`] produces
/// the read-only registry; nothing can be resolved before that.
#[derive(Debug, Default)]
pub struct CommandRegistryBuilder {
    commands: HashMap<String, CommandSpec>,
    overlays: HashMap<(String, ChatType), CommandSpec>,
    aliases: HashMap<String, String>,
}

impl CommandRegistryBuilder {
    /// Start an empty registration phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command for every chat type it lists.
    pub fn register(&mut self, spec: CommandSpec) -> Result<(), KickAiError> {
        if self.commands.contains_key(&spec.name) {
            return Err(KickAiError::Programming(format!(
                "duplicate command registration: {}",
                spec.name
            )));
        }
        if self.aliases.contains_key(&spec.name) {
            return Err(KickAiError::Programming(format!(
                "command name collides with an alias: {}",
                spec.name
            )));
        }
        self.commands.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// Register a chat-specific variant that shadows the base descriptor in
    /// one chat type.
    pub fn register_for_chat(
        &mut self,
        spec: CommandSpec,
        chat_type: ChatType,
    ) -> Result<(), KickAiError> {
        let key = (spec.name.clone(), chat_type);
        if self.overlays.contains_key(&key) {
            return Err(KickAiError::Programming(format!(
                "duplicate command registration for ({}, {chat_type})",
                spec.name
            )));
        }
        self.overlays.insert(key, spec);
        Ok(())
    }

    /// Register an alias for a canonical command name.
    pub fn register_alias(
        &mut self,
        alias: impl Into<String>,
        canonical: impl Into<String>,
    ) -> Result<(), KickAiError> {
        let alias = alias.into();
        let canonical = canonical.into();
        if self.commands.contains_key(&alias) {
            return Err(KickAiError::Programming(format!(
                "alias collides with a canonical command name: {alias}"
            )));
        }
        if self.aliases.contains_key(&alias) {
            return Err(KickAiError::Programming(format!(
                "duplicate alias registration: {alias}"
            )));
        }
        if !self.commands.contains_key(&canonical) {
            return Err(KickAiError::Programming(format!(
                "alias {alias} targets unknown command {canonical}"
            )));
        }
        self.aliases.insert(alias, canonical);
        Ok(())
    }

    /// Finish registration and produce the read-only registry.
    pub fn freeze(self) -> CommandRegistry {
        info!(
            commands = self.commands.len(),
            overlays = self.overlays.len(),
            aliases = self.aliases.len(),
            "command registry initialized"
        );
        CommandRegistry {
            commands: self.commands,
            overlays: self.overlays,
            aliases: self.aliases,
        }
    }
}

/// Read-only command directory handed to the router and pipeline.
#[derive(Debug)]
pub struct CommandRegistry {
    commands: HashMap<String, CommandSpec>,
    overlays: HashMap<(String, ChatType), CommandSpec>,
    aliases: HashMap<String, String>,
}

impl CommandRegistry {
    /// Resolve a command for a chat: the chat overlay wins over the base
    /// descriptor; aliases resolve to their canonical name first.
    pub fn resolve(&self, name: &str, chat_type: ChatType) -> Option<&CommandSpec> {
        let canonical = self
            .aliases
            .get(name)
            .map(String::as_str)
            .unwrap_or(name);
        self.overlays
            .get(&(canonical.to_owned(), chat_type))
            .or_else(|| self.commands.get(canonical))
    }

    /// Whether a name (or alias) is registered at all.
    pub fn contains(&self, name: &str) -> bool {
        let canonical = self
            .aliases
            .get(name)
            .map(String::as_str)
            .unwrap_or(name);
        self.commands.contains_key(canonical)
            || self
                .overlays
                .keys()
                .any(|(overlay_name, _)| overlay_name == canonical)
    }

    /// Every base descriptor, sorted by name.
    pub fn all(&self) -> Vec<&CommandSpec> {
        let mut specs: Vec<&CommandSpec> = self.commands.values().collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Commands usable in a chat by a caller holding a permission tier.
    pub fn commands_for(&self, chat_type: ChatType, permission: PermissionLevel) -> Vec<&CommandSpec> {
        let mut specs: Vec<&CommandSpec> = self
            .commands
            .values()
            .filter(|spec| spec.allowed_in(chat_type) && spec.permission <= permission)
            .collect();
        for ((_, overlay_chat), spec) in &self.overlays {
            if *overlay_chat == chat_type && spec.permission <= permission {
                specs.retain(|s| s.name != spec.name);
                specs.push(spec);
            }
        }
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Distinct feature modules in registration.
    pub fn features(&self) -> Vec<String> {
        let mut features: Vec<String> = self
            .commands
            .values()
            .map(|spec| spec.feature.clone())
            .collect();
        features.sort();
        features.dedup();
        features
    }

    /// Number of base descriptors.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether no commands are registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// The command names every conforming deployment must register.
pub const EXPECTED_COMMANDS: &[&str] = &[
    "/start", "/help", "/register", "/myinfo", "/list", "/status",
];

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> CommandSpec {
        CommandSpec::new(
            name,
            "shared",
            "a test command",
            PermissionLevel::Public,
            &[ChatType::Main, ChatType::Leadership],
            "ping",
        )
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut builder = CommandRegistryBuilder::new();
        builder.register(spec("/list")).expect("first");
        assert!(builder.register(spec("/list")).is_err());
    }

    #[test]
    fn test_duplicate_overlay_rejected() {
        let mut builder = CommandRegistryBuilder::new();
        builder
            .register_for_chat(spec("/list"), ChatType::Leadership)
            .expect("first");
        assert!(builder
            .register_for_chat(spec("/list"), ChatType::Leadership)
            .is_err());
    }

    #[test]
    fn test_overlay_shadows_base_per_chat() {
        let mut builder = CommandRegistryBuilder::new();
        builder.register(spec("/list")).expect("base");
        let mut leadership = spec("/list");
        leadership.tool_id = "list_all_players".to_owned();
        builder
            .register_for_chat(leadership, ChatType::Leadership)
            .expect("overlay");
        let registry = builder.freeze();

        assert_eq!(
            registry.resolve("/list", ChatType::Main).expect("base").tool_id,
            "ping"
        );
        assert_eq!(
            registry
                .resolve("/list", ChatType::Leadership)
                .expect("overlay")
                .tool_id,
            "list_all_players"
        );
    }

    #[test]
    fn test_alias_resolution_and_collisions() {
        let mut builder = CommandRegistryBuilder::new();
        builder.register(spec("/list")).expect("register");
        builder.register_alias("/players", "/list").expect("alias");

        assert!(builder.register(spec("/players")).is_err(), "name vs alias");
        assert!(builder.register_alias("/players", "/list").is_err(), "dup alias");
        assert!(
            builder.register_alias("/ghost", "/missing").is_err(),
            "alias must target a known command"
        );

        let registry = builder.freeze();
        let via_alias = registry.resolve("/players", ChatType::Main).expect("alias");
        assert_eq!(via_alias.name, "/list");
        assert!(registry.contains("/players"));
    }

    #[test]
    fn test_commands_for_filters_chat_and_permission() {
        let mut builder = CommandRegistryBuilder::new();
        builder.register(spec("/help")).expect("register");
        let mut admin_only = spec("/approve");
        admin_only.permission = PermissionLevel::Admin;
        admin_only.chat_types = vec![ChatType::Leadership];
        builder.register(admin_only).expect("register");
        let registry = builder.freeze();

        let main_public = registry.commands_for(ChatType::Main, PermissionLevel::Public);
        assert_eq!(main_public.len(), 1);
        assert_eq!(main_public[0].name, "/help");

        let leadership_admin = registry.commands_for(ChatType::Leadership, PermissionLevel::Admin);
        assert_eq!(leadership_admin.len(), 2);
    }
}
