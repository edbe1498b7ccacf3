// Core enums shared across the registries, pipeline, and tools.

use serde::{Deserialize, Serialize};

pub mod context;
pub mod error;

pub use context::{RequestContext, UserPermissions};
pub use error::KickAiError;

/// Scope of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatType {
    /// The players' chat.
    Main,
    /// The administrators' chat.
    Leadership,
    /// A direct message with the bot.
    Private,
    /// Internal maintenance context, not a real chat.
    System,
}

impl ChatType {
    /// Stable lowercase identifier used in serialized contexts.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Leadership => "leadership",
            Self::Private => "private",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for ChatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChatType {
    type Err = KickAiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "main" => Ok(Self::Main),
            "leadership" => Ok(Self::Leadership),
            "private" => Ok(Self::Private),
            "system" => Ok(Self::System),
            other => Err(KickAiError::validation(
                "chat_type",
                format!("unknown chat type: {other}"),
            )),
        }
    }
}

/// The kind of principal a tool or command operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Playing-squad records.
    Player,
    /// Leadership-side team member records.
    TeamMember,
    /// Operates on both kinds.
    Both,
    /// Operates on neither (system and help operations).
    Neither,
}

impl EntityType {
    /// Stable lowercase identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::TeamMember => "team_member",
            Self::Both => "both",
            Self::Neither => "neither",
        }
    }

    /// Whether an operation on `self` is satisfied by a grant of `granted`.
    ///
    /// A `Both` grant covers every entity type; a `Both` operation needs a
    /// `Both` grant.
    pub fn allowed_by(self, granted: EntityType) -> bool {
        granted == EntityType::Both || granted == self
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permission tiers ordered lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    /// Anyone in a permitted chat, registered or not.
    Public,
    /// Registered players and team members.
    Player,
    /// Team members in the leadership chat.
    Leadership,
    /// Team administrators only.
    Admin,
    /// Internal maintenance callers.
    System,
}

impl PermissionLevel {
    /// Stable lowercase identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Player => "player",
            Self::Leadership => "leadership",
            Self::Admin => "admin",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role-specialized agent identities.
///
/// Agents are configured, not discovered; the agent factory builds one
/// instance per role listed in the agent configuration. The
/// `MessageProcessor` role is the routing fallback and must always exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// General-purpose fallback executor.
    MessageProcessor,
    /// Answers help and capability questions.
    HelpAssistant,
    /// Player registration and lifecycle.
    PlayerCoordinator,
    /// Day-to-day squad management.
    TeamManager,
    /// Administrative operations.
    TeamAdministrator,
    /// Fixtures, availability, and squad selection.
    MatchCoordinator,
    /// Announcements and broadcasts.
    CommunicationManager,
    /// Payments and budgets.
    FinanceManager,
    /// System health and diagnostics.
    IntelligentSystem,
}

impl AgentRole {
    /// Stable lowercase identifier used in configuration and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MessageProcessor => "message_processor",
            Self::HelpAssistant => "help_assistant",
            Self::PlayerCoordinator => "player_coordinator",
            Self::TeamManager => "team_manager",
            Self::TeamAdministrator => "team_administrator",
            Self::MatchCoordinator => "match_coordinator",
            Self::CommunicationManager => "communication_manager",
            Self::FinanceManager => "finance_manager",
            Self::IntelligentSystem => "intelligent_system",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a request context originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageOrigin {
    /// Free-text Telegram message.
    TelegramMessage,
    /// Slash command.
    Command,
    /// Natural-language request routed through the pipeline.
    NaturalLanguage,
    /// Internal maintenance caller.
    System,
}

impl MessageOrigin {
    /// Stable lowercase identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TelegramMessage => "telegram_message",
            Self::Command => "command",
            Self::NaturalLanguage => "natural_language",
            Self::System => "system",
        }
    }
}

impl std::str::FromStr for MessageOrigin {
    type Err = KickAiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "telegram_message" => Ok(Self::TelegramMessage),
            "command" => Ok(Self::Command),
            "natural_language" => Ok(Self::NaturalLanguage),
            "system" => Ok(Self::System),
            other => Err(KickAiError::validation(
                "source",
                format!("unknown message origin: {other}"),
            )),
        }
    }
}

/// Functional classification of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolType {
    /// Messaging and broadcasts.
    Communication,
    /// Player registration and lifecycle.
    PlayerManagement,
    /// Team member administration.
    TeamManagement,
    /// Fixtures, attendance, squad selection.
    MatchManagement,
    /// Payments and finances.
    Payment,
    /// Help and capability listings.
    Help,
    /// Health, diagnostics, version info.
    System,
    /// Anything that fits no other bucket.
    Custom,
}

impl ToolType {
    /// Stable lowercase identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Communication => "communication",
            Self::PlayerManagement => "player_management",
            Self::TeamManagement => "team_management",
            Self::MatchManagement => "match_management",
            Self::Payment => "payment",
            Self::Help => "help",
            Self::System => "system",
            Self::Custom => "custom",
        }
    }
}

/// Organizational tier of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// Always-present infrastructure tools.
    Core,
    /// Feature-module tools.
    Feature,
    /// Small helpers.
    Utility,
}

/// Assessed complexity of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ComplexityLevel {
    /// Stable lowercase identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very_high",
        }
    }

    /// Whether requests at this level are decomposed into subtasks.
    pub fn warrants_decomposition(self) -> bool {
        matches!(self, Self::High | Self::VeryHigh)
    }
}

impl std::fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_type_roundtrip() {
        for chat in [
            ChatType::Main,
            ChatType::Leadership,
            ChatType::Private,
            ChatType::System,
        ] {
            let parsed: ChatType = chat.as_str().parse().expect("roundtrip");
            assert_eq!(chat, parsed);
        }
    }

    #[test]
    fn test_chat_type_rejects_unknown() {
        assert!("group".parse::<ChatType>().is_err());
        assert!("".parse::<ChatType>().is_err());
    }

    #[test]
    fn test_entity_type_allowed_by() {
        assert!(EntityType::Player.allowed_by(EntityType::Player));
        assert!(EntityType::Player.allowed_by(EntityType::Both));
        assert!(!EntityType::Player.allowed_by(EntityType::TeamMember));
        assert!(!EntityType::Both.allowed_by(EntityType::Player));
        assert!(EntityType::Both.allowed_by(EntityType::Both));
    }

    #[test]
    fn test_permission_level_ordering() {
        assert!(PermissionLevel::Public < PermissionLevel::Player);
        assert!(PermissionLevel::Player < PermissionLevel::Leadership);
        assert!(PermissionLevel::Leadership < PermissionLevel::Admin);
        assert!(PermissionLevel::Admin < PermissionLevel::System);
    }

    #[test]
    fn test_complexity_decomposition_threshold() {
        assert!(!ComplexityLevel::Low.warrants_decomposition());
        assert!(!ComplexityLevel::Medium.warrants_decomposition());
        assert!(ComplexityLevel::High.warrants_decomposition());
        assert!(ComplexityLevel::VeryHigh.warrants_decomposition());
    }
}
