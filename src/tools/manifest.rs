//! The explicit registration manifest.
//!
//! This is the single place where the tool and command surfaces are
//! enumerated. There is no runtime discovery: the manifest runs once at
//! startup, before the transport opens, and the registries are frozen
//! afterwards. Adding a tool or command means adding it here.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::domain::services::InviteService;
use crate::factories::ServiceFactory;
use crate::registry::commands::{CommandRegistry, CommandRegistryBuilder, CommandSpec};
use crate::registry::tools::{ContextSchema, ToolRegistry, ToolSpec};
use crate::tools::attendance::{AttendanceSummaryTool, MarkAttendanceTool};
use crate::tools::communication::{AnnounceTool, Broadcast, InviteLinkTool};
use crate::tools::help::{HelpTool, WelcomeTool};
use crate::tools::matches::{CreateMatchTool, ListMatchesTool, SelectSquadTool};
use crate::tools::player::{
    LifecycleAction, LinkContactTool, ListPlayersTool, MyInfoTool, PlayerLifecycleTool,
    PlayerStatusTool, RegisterPlayerTool,
};
use crate::tools::system::{PingTool, VersionTool};
use crate::tools::team::{AddMemberTool, ListMembersTool};
use crate::types::{
    AgentRole, ChatType, EntityType, KickAiError, PermissionLevel, ToolCategory, ToolType,
};

/// Everything the tool constructors need.
pub struct ToolDeps {
    /// Tenant-scoped domain services.
    pub services: Arc<ServiceFactory>,
    /// The frozen command registry (for the help tool).
    pub commands: Arc<CommandRegistry>,
    /// Invite-code generation.
    pub invites: Arc<InviteService>,
    /// Outbound broadcast queue into the transport.
    pub broadcasts: mpsc::Sender<Broadcast>,
}

const PLAYER_ENTITIES: &[EntityType] = &[EntityType::Player, EntityType::Both];
const MEMBER_ENTITIES: &[EntityType] = &[EntityType::TeamMember, EntityType::Both];
const ANY_ENTITIES: &[EntityType] = &[EntityType::Neither, EntityType::Player, EntityType::Both];

/// Register every tool. Idempotent: a second call is a no-op.
pub fn register_tools(registry: &mut ToolRegistry, deps: &ToolDeps) -> Result<(), KickAiError> {
    if registry.is_populated() {
        tracing::info!("tool registry already populated, skipping manifest run");
        return Ok(());
    }

    let services = &deps.services;

    // ── player_registration ──
    registry.register(
        ToolSpec::new(
            "register_player",
            ToolType::PlayerManagement,
            ToolCategory::Feature,
            "player_registration",
            "Register a new player (name, optional phone and position)",
        )
        .with_entity_types(&[EntityType::Player])
        .grant(AgentRole::PlayerCoordinator, PLAYER_ENTITIES)
        .grant(AgentRole::TeamManager, PLAYER_ENTITIES)
        .grant(AgentRole::TeamAdministrator, PLAYER_ENTITIES),
        Arc::new(RegisterPlayerTool::new(Arc::clone(services))),
        &["add_player"],
    )?;

    for (action, id) in [
        (LifecycleAction::Approve, "approve_player"),
        (LifecycleAction::Reject, "reject_player"),
        (LifecycleAction::Remove, "remove_player"),
    ] {
        registry.register(
            ToolSpec::new(
                id,
                ToolType::PlayerManagement,
                ToolCategory::Feature,
                "player_registration",
                format!("{} a player by id", id.split('_').next().unwrap_or(id)),
            )
            .with_permission(PermissionLevel::Admin)
            .with_entity_types(&[EntityType::Player])
            .grant(AgentRole::PlayerCoordinator, PLAYER_ENTITIES)
            .grant(AgentRole::TeamManager, PLAYER_ENTITIES)
            .grant(AgentRole::TeamAdministrator, PLAYER_ENTITIES),
            Arc::new(PlayerLifecycleTool::new(Arc::clone(services), action)),
            &[],
        )?;
    }

    registry.register(
        ToolSpec::new(
            "list_active_players",
            ToolType::PlayerManagement,
            ToolCategory::Feature,
            "player_registration",
            "List active players (plus pending ones in the leadership chat)",
        )
        .with_entity_types(&[EntityType::Player]),
        Arc::new(ListPlayersTool::new(Arc::clone(services))),
        &["get_active_players"],
    )?;

    registry.register(
        ToolSpec::new(
            "get_my_info",
            ToolType::PlayerManagement,
            ToolCategory::Feature,
            "player_registration",
            "Show the caller's own player or team member record",
        )
        .with_entity_types(&[EntityType::Both]),
        Arc::new(MyInfoTool::new(Arc::clone(services))),
        &[],
    )?;

    registry.register(
        ToolSpec::new(
            "get_player_status",
            ToolType::PlayerManagement,
            ToolCategory::Feature,
            "player_registration",
            "Look up a player by phone number or player id",
        )
        .with_entity_types(&[EntityType::Player]),
        Arc::new(PlayerStatusTool::new(Arc::clone(services))),
        &[],
    )?;

    registry.register(
        ToolSpec::new(
            "link_player_contact",
            ToolType::PlayerManagement,
            ToolCategory::Feature,
            "player_registration",
            "Attach a contact-shared phone number to the caller's registration",
        )
        .with_entity_types(&[EntityType::Player])
        .grant(AgentRole::PlayerCoordinator, PLAYER_ENTITIES)
        .grant(AgentRole::TeamManager, PLAYER_ENTITIES)
        .grant(AgentRole::TeamAdministrator, PLAYER_ENTITIES)
        .with_context_schema(ContextSchema::require(&["/metadata/contact_phone"])),
        Arc::new(LinkContactTool::new(Arc::clone(services))),
        &[],
    )?;

    // ── team_administration ──
    registry.register(
        ToolSpec::new(
            "add_team_member",
            ToolType::TeamManagement,
            ToolCategory::Feature,
            "team_administration",
            "Add a leadership team member",
        )
        .with_permission(PermissionLevel::Admin)
        .with_entity_types(&[EntityType::TeamMember])
        .grant(AgentRole::TeamAdministrator, MEMBER_ENTITIES)
        .grant(AgentRole::TeamManager, MEMBER_ENTITIES),
        Arc::new(AddMemberTool::new(Arc::clone(services))),
        &[],
    )?;

    registry.register(
        ToolSpec::new(
            "list_team_members",
            ToolType::TeamManagement,
            ToolCategory::Feature,
            "team_administration",
            "List leadership team members",
        )
        .with_permission(PermissionLevel::Leadership)
        .with_entity_types(&[EntityType::TeamMember])
        .grant(AgentRole::TeamAdministrator, MEMBER_ENTITIES)
        .grant(AgentRole::TeamManager, MEMBER_ENTITIES),
        Arc::new(ListMembersTool::new(Arc::clone(services))),
        &[],
    )?;

    // ── match_management ──
    registry.register(
        ToolSpec::new(
            "create_match",
            ToolType::MatchManagement,
            ToolCategory::Feature,
            "match_management",
            "Create a match (opponent, date, optional venue)",
        )
        .with_permission(PermissionLevel::Leadership)
        .grant(AgentRole::MatchCoordinator, ANY_ENTITIES)
        .grant(AgentRole::TeamManager, ANY_ENTITIES),
        Arc::new(CreateMatchTool::new(Arc::clone(services))),
        &[],
    )?;

    registry.register(
        ToolSpec::new(
            "list_matches",
            ToolType::MatchManagement,
            ToolCategory::Feature,
            "match_management",
            "List matches on record",
        ),
        Arc::new(ListMatchesTool::new(Arc::clone(services))),
        &[],
    )?;

    registry.register(
        ToolSpec::new(
            "select_squad",
            ToolType::MatchManagement,
            ToolCategory::Feature,
            "squad_selection",
            "Select up to eleven available players for a match",
        )
        .with_permission(PermissionLevel::Leadership)
        .with_entity_types(&[EntityType::Player])
        .grant(AgentRole::MatchCoordinator, PLAYER_ENTITIES)
        .grant(AgentRole::TeamManager, PLAYER_ENTITIES)
        .grant(AgentRole::TeamAdministrator, PLAYER_ENTITIES),
        Arc::new(SelectSquadTool::new(Arc::clone(services))),
        &[],
    )?;

    // ── attendance_management ──
    registry.register(
        ToolSpec::new(
            "mark_attendance",
            ToolType::MatchManagement,
            ToolCategory::Feature,
            "attendance_management",
            "Record the caller's availability for a match",
        )
        .with_permission(PermissionLevel::Player)
        .with_entity_types(&[EntityType::Player]),
        Arc::new(MarkAttendanceTool::new(Arc::clone(services))),
        &[],
    )?;

    registry.register(
        ToolSpec::new(
            "attendance_summary",
            ToolType::MatchManagement,
            ToolCategory::Feature,
            "attendance_management",
            "Availability counts for a match",
        )
        .with_permission(PermissionLevel::Player),
        Arc::new(AttendanceSummaryTool::new(Arc::clone(services))),
        &[],
    )?;

    // ── communication ──
    registry.register(
        ToolSpec::new(
            "send_announcement",
            ToolType::Communication,
            ToolCategory::Feature,
            "communication",
            "Broadcast an announcement to the main chat",
        )
        .with_permission(PermissionLevel::Admin)
        .grant(AgentRole::CommunicationManager, ANY_ENTITIES)
        .grant(AgentRole::TeamAdministrator, ANY_ENTITIES),
        Arc::new(AnnounceTool::new(deps.broadcasts.clone())),
        &["broadcast_message"],
    )?;

    registry.register(
        ToolSpec::new(
            "generate_invite_link",
            ToolType::Communication,
            ToolCategory::Feature,
            "communication",
            "Mint an invite code for a chat",
        )
        .with_permission(PermissionLevel::Admin)
        .grant(AgentRole::CommunicationManager, ANY_ENTITIES)
        .grant(AgentRole::TeamAdministrator, ANY_ENTITIES),
        Arc::new(InviteLinkTool::new(Arc::clone(&deps.invites))),
        &[],
    )?;

    // ── shared ──
    registry.register(
        ToolSpec::new(
            "get_help",
            ToolType::Help,
            ToolCategory::Core,
            "shared",
            "List the commands available to the caller in this chat",
        ),
        Arc::new(HelpTool::new(Arc::clone(&deps.commands))),
        &["show_help"],
    )?;

    registry.register(
        ToolSpec::new(
            "welcome_message",
            ToolType::Help,
            ToolCategory::Core,
            "shared",
            "Greet a user and point at next steps",
        ),
        Arc::new(WelcomeTool),
        &[],
    )?;

    // ── system_infrastructure — classified from keywords ──
    registry.register_classified(
        "ping",
        "system_infrastructure",
        "Liveness check",
        Arc::new(PingTool),
        &[],
    )?;
    registry.register_classified(
        "version",
        "system_infrastructure",
        "Build information",
        Arc::new(VersionTool),
        &[],
    )?;

    registry.finish_population();
    Ok(())
}

/// Register every command into the builder.
pub fn register_commands(builder: &mut CommandRegistryBuilder) -> Result<(), KickAiError> {
    let all_chats = [ChatType::Main, ChatType::Leadership, ChatType::Private];
    let main_private = [ChatType::Main, ChatType::Private];
    let leadership = [ChatType::Leadership];
    let main_leadership = [ChatType::Main, ChatType::Leadership];

    builder.register(CommandSpec::new(
        "/start",
        "shared",
        "greet the bot",
        PermissionLevel::Public,
        &all_chats,
        "welcome_message",
    ))?;
    builder.register(CommandSpec::new(
        "/help",
        "shared",
        "show available commands",
        PermissionLevel::Public,
        &all_chats,
        "get_help",
    ))?;
    builder.register(CommandSpec::new(
        "/ping",
        "system_infrastructure",
        "liveness check",
        PermissionLevel::Public,
        &all_chats,
        "ping",
    ))?;
    builder.register(CommandSpec::new(
        "/version",
        "system_infrastructure",
        "bot version",
        PermissionLevel::Public,
        &all_chats,
        "version",
    ))?;

    builder.register(CommandSpec::new(
        "/register",
        "player_registration",
        "register as a player",
        PermissionLevel::Public,
        &main_private,
        "register_player",
    ))?;
    builder.register_alias("/addplayer", "/register")?;
    builder.register(CommandSpec::new(
        "/linkcontact",
        "player_registration",
        "complete registration from a shared contact",
        PermissionLevel::Public,
        &main_private,
        "link_player_contact",
    ))?;
    builder.register(CommandSpec::new(
        "/myinfo",
        "player_registration",
        "show your own record",
        PermissionLevel::Public,
        &all_chats,
        "get_my_info",
    ))?;
    builder.register(CommandSpec::new(
        "/status",
        "player_registration",
        "look up a player by phone or id",
        PermissionLevel::Public,
        &main_leadership,
        "get_player_status",
    ))?;

    builder.register(CommandSpec::new(
        "/list",
        "player_registration",
        "list active players",
        PermissionLevel::Public,
        &[ChatType::Main],
        "list_active_players",
    ))?;
    builder.register_for_chat(
        CommandSpec::new(
            "/list",
            "player_registration",
            "list all players with status",
            PermissionLevel::Leadership,
            &leadership,
            "list_active_players",
        ),
        ChatType::Leadership,
    )?;

    builder.register(CommandSpec::new(
        "/approve",
        "player_registration",
        "approve a pending player",
        PermissionLevel::Admin,
        &leadership,
        "approve_player",
    ))?;
    builder.register(CommandSpec::new(
        "/reject",
        "player_registration",
        "reject a pending player",
        PermissionLevel::Admin,
        &leadership,
        "reject_player",
    ))?;
    builder.register(CommandSpec::new(
        "/remove",
        "player_registration",
        "remove a player from the squad",
        PermissionLevel::Admin,
        &leadership,
        "remove_player",
    ))?;

    builder.register(CommandSpec::new(
        "/addmember",
        "team_administration",
        "add a leadership team member",
        PermissionLevel::Admin,
        &leadership,
        "add_team_member",
    ))?;
    builder.register(CommandSpec::new(
        "/listmembers",
        "team_administration",
        "list leadership team members",
        PermissionLevel::Leadership,
        &leadership,
        "list_team_members",
    ))?;

    builder.register(CommandSpec::new(
        "/creatematch",
        "match_management",
        "create a match",
        PermissionLevel::Leadership,
        &leadership,
        "create_match",
    ))?;
    builder.register(CommandSpec::new(
        "/listmatches",
        "match_management",
        "list matches",
        PermissionLevel::Player,
        &main_leadership,
        "list_matches",
    ))?;
    builder.register(CommandSpec::new(
        "/markattendance",
        "attendance_management",
        "record your availability for a match",
        PermissionLevel::Player,
        &[ChatType::Main],
        "mark_attendance",
    ))?;
    builder.register(CommandSpec::new(
        "/attendance",
        "attendance_management",
        "availability summary for a match",
        PermissionLevel::Player,
        &main_leadership,
        "attendance_summary",
    ))?;
    builder.register(CommandSpec::new(
        "/selectsquad",
        "squad_selection",
        "select the squad for a match",
        PermissionLevel::Leadership,
        &leadership,
        "select_squad",
    ))?;

    builder.register(CommandSpec::new(
        "/announce",
        "communication",
        "broadcast to the main chat",
        PermissionLevel::Admin,
        &leadership,
        "send_announcement",
    ))?;
    builder.register_alias("/broadcast", "/announce")?;
    builder.register(CommandSpec::new(
        "/invitelink",
        "communication",
        "mint an invite code",
        PermissionLevel::Admin,
        &leadership,
        "generate_invite_link",
    ))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimitsConfig;
    use crate::registry::commands::EXPECTED_COMMANDS;
    use crate::store::MemoryStore;

    fn deps() -> ToolDeps {
        let mut builder = CommandRegistryBuilder::new();
        register_commands(&mut builder).expect("commands");
        let (tx, _rx) = mpsc::channel(8);
        ToolDeps {
            services: Arc::new(ServiceFactory::new(
                Arc::new(MemoryStore::new()),
                &LimitsConfig::default(),
            )),
            commands: Arc::new(builder.freeze()),
            invites: Arc::new(InviteService::new("super-secret-key")),
            broadcasts: tx,
        }
    }

    #[test]
    fn test_manifest_registers_expected_surface() {
        let deps = deps();
        let mut registry = ToolRegistry::new();
        register_tools(&mut registry, &deps).expect("manifest");
        assert!(registry.is_populated());
        assert!(!registry.is_empty());

        for id in [
            "register_player",
            "approve_player",
            "list_active_players",
            "get_help",
            "link_player_contact",
            "send_announcement",
            "ping",
        ] {
            assert!(registry.resolve(id).is_some(), "missing tool: {id}");
        }

        // Alias and canonical resolve to the same tool.
        let canonical = registry.resolve("list_active_players").expect("canonical");
        let alias = registry.resolve("get_active_players").expect("alias");
        assert_eq!(canonical.spec.tool_id, alias.spec.tool_id);
    }

    #[test]
    fn test_manifest_is_idempotent() {
        let deps = deps();
        let mut registry = ToolRegistry::new();
        register_tools(&mut registry, &deps).expect("first run");
        let count = registry.len();
        register_tools(&mut registry, &deps).expect("second run is a no-op");
        assert_eq!(registry.len(), count);
    }

    #[test]
    fn test_every_command_tool_resolves() {
        let deps = deps();
        let mut registry = ToolRegistry::new();
        register_tools(&mut registry, &deps).expect("manifest");

        for spec in deps.commands.all() {
            assert!(
                registry.resolve(&spec.tool_id).is_some(),
                "command {} references unknown tool {}",
                spec.name,
                spec.tool_id
            );
        }
    }

    #[test]
    fn test_expected_commands_present() {
        let deps = deps();
        for name in EXPECTED_COMMANDS {
            assert!(deps.commands.contains(name), "missing command: {name}");
        }
    }
}
