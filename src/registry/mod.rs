//! The registries: commands, tools, and agents.
//!
//! [`Registries::build`] runs the whole registration phase in order —
//! commands, then tools (which need the frozen command registry), then
//! agents (which need the populated tool registry) — performs the
//! cross-registry consistency checks, and returns a read-only bundle. The
//! bundle is dependency-injected into the router and pipeline; there are no
//! process-wide globals, so tests construct isolated instances.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::domain::services::InviteService;
use crate::factories::ServiceFactory;
use crate::providers::LlmProvider;
use crate::tools::communication::Broadcast;
use crate::tools::manifest::{self, ToolDeps};
use crate::types::{AgentRole, KickAiError};

pub mod agents;
pub mod commands;
pub mod tools;

pub use agents::{Agent, AgentFactory, AgentSpec};
pub use commands::{CommandRegistry, CommandRegistryBuilder, CommandSpec};
pub use tools::{RegisteredTool, ToolRegistry, ToolSpec};

/// Read-only bundle of the three registries, built once at startup.
pub struct Registries {
    /// Frozen command directory.
    pub commands: Arc<CommandRegistry>,
    /// Populated tool directory.
    pub tools: Arc<ToolRegistry>,
    /// One agent per configured role.
    pub agents: HashMap<AgentRole, Arc<Agent>>,
}

impl std::fmt::Debug for Registries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registries")
            .field("commands", &self.commands.len())
            .field("tools", &self.tools.len())
            .field("agents", &self.agents.len())
            .finish()
    }
}

impl Registries {
    /// Run the full registration phase and freeze everything.
    ///
    /// Fails fast on any inconsistency: duplicate registrations, a command
    /// naming an unknown tool, an agent naming an unknown tool, or a
    /// missing fallback agent.
    pub fn build(
        services: Arc<ServiceFactory>,
        invites: Arc<InviteService>,
        broadcasts: mpsc::Sender<Broadcast>,
        provider: Arc<dyn LlmProvider>,
    ) -> Result<Self, KickAiError> {
        // 1. Commands.
        let mut builder = CommandRegistryBuilder::new();
        manifest::register_commands(&mut builder)?;
        let commands = Arc::new(builder.freeze());

        // 2. Tools.
        let deps = ToolDeps {
            services,
            commands: Arc::clone(&commands),
            invites,
            broadcasts,
        };
        let mut tool_registry = ToolRegistry::new();
        manifest::register_tools(&mut tool_registry, &deps)?;
        let tools = Arc::new(tool_registry);

        // 3. Agents.
        let agent_specs = agents::default_agent_specs();
        let agents = AgentFactory::build(&agent_specs, &tools, provider)?;

        let registries = Self {
            commands,
            tools,
            agents,
        };
        registries.check_consistency()?;
        info!(
            commands = registries.commands.len(),
            tools = registries.tools.len(),
            agents = registries.agents.len(),
            "registries built"
        );
        Ok(registries)
    }

    /// Cross-registry invariants enforced before the transport starts.
    pub fn check_consistency(&self) -> Result<(), KickAiError> {
        for spec in self.commands.all() {
            if self.tools.resolve(&spec.tool_id).is_none() {
                return Err(KickAiError::Programming(format!(
                    "command {} references unknown tool: {}",
                    spec.name, spec.tool_id
                )));
            }
        }
        if !self.agents.contains_key(&AgentRole::MessageProcessor) {
            return Err(KickAiError::Programming(
                "fallback agent message_processor is not configured".to_owned(),
            ));
        }
        Ok(())
    }

    /// Look up an agent by role.
    pub fn agent(&self, role: AgentRole) -> Option<Arc<Agent>> {
        self.agents.get(&role).map(Arc::clone)
    }

    /// The fallback agent; existence is checked at build time.
    pub fn fallback_agent(&self) -> Result<Arc<Agent>, KickAiError> {
        self.agent(AgentRole::MessageProcessor).ok_or_else(|| {
            KickAiError::Programming("fallback agent message_processor missing".to_owned())
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::LimitsConfig;
    use crate::providers::mock::MockProvider;
    use crate::store::MemoryStore;

    /// Build a full registry bundle over an in-memory store.
    pub(crate) fn test_registries() -> Registries {
        let services = Arc::new(ServiceFactory::new(
            Arc::new(MemoryStore::new()),
            &LimitsConfig::default(),
        ));
        let invites = Arc::new(InviteService::new("super-secret-key"));
        let (tx, _rx) = mpsc::channel(8);
        Registries::build(services, invites, tx, Arc::new(MockProvider::new()))
            .expect("registries build")
    }

    #[test]
    fn test_build_produces_consistent_bundle() {
        let registries = test_registries();
        assert!(!registries.tools.is_empty());
        assert!(!registries.commands.is_empty());
        assert!(registries.fallback_agent().is_ok());
    }

    #[test]
    fn test_agent_tool_lists_resolve() {
        let registries = test_registries();
        for agent in registries.agents.values() {
            for tool_id in agent.tool_ids() {
                assert!(
                    registries.tools.resolve(tool_id).is_some(),
                    "agent {} tool {tool_id} must resolve",
                    agent.role()
                );
            }
        }
    }

    #[test]
    fn test_no_duplicate_enabled_tool_ids() {
        let registries = test_registries();
        let ids = registries.tools.ids();
        let mut deduped = ids.clone();
        deduped.dedup();
        assert_eq!(ids, deduped);
    }
}
