//! The request context — the single descriptor passed end-to-end.
//!
//! Created once by the router from a transport update (or by a system
//! caller for maintenance work), validated at construction, immutable for
//! the duration of a request, and never mutated by tools. Serializable to
//! and from a JSON mapping for logging and cross-agent delegation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{ChatType, KickAiError, MessageOrigin};

/// Maximum length of a tenant identifier.
const TEAM_ID_MAX_CHARS: usize = 20;

/// Snapshot of the caller's roles, taken by the router before dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPermissions {
    /// Caller has a player record.
    pub is_player: bool,
    /// Caller has a team member record.
    pub is_team_member: bool,
    /// Caller is a team administrator.
    pub is_admin: bool,
    /// Caller belongs to the leadership chat population.
    pub is_leadership: bool,
}

impl UserPermissions {
    /// Enforce the consistency invariants: admin and leadership flags
    /// require the caller to be a player or team member.
    pub fn validate(&self) -> Result<(), KickAiError> {
        if self.is_admin && !(self.is_player || self.is_team_member) {
            return Err(KickAiError::validation(
                "permissions",
                "admin must be a player or team member",
            ));
        }
        if self.is_leadership && !(self.is_player || self.is_team_member) {
            return Err(KickAiError::validation(
                "permissions",
                "leadership must be a player or team member",
            ));
        }
        Ok(())
    }
}

/// Immutable request descriptor carrying caller identity, tenant, chat
/// scope, raw text, and permission flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Positive Telegram user id; `0` only for system contexts.
    pub telegram_id: i64,
    /// Telegram username; defaults to `"unknown"`.
    pub username: String,
    /// Display name shown in chat; defaults to the username.
    pub display_name: String,
    /// Tenant identifier, non-empty and at most 20 characters.
    pub team_id: String,
    /// Chat the update came from.
    pub chat_id: String,
    /// Scope of that chat.
    pub chat_type: ChatType,
    /// Raw message text; may be empty.
    pub message_text: String,
    /// Caller role snapshot.
    pub permissions: UserPermissions,
    /// How this request entered the system.
    pub origin: MessageOrigin,
    /// Creation instant.
    pub timestamp: DateTime<Utc>,
    /// Free-form per-request metadata (e.g. contact payload fields).
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl RequestContext {
    /// Create a context from a Telegram message update.
    pub fn from_telegram_message(
        telegram_id: i64,
        team_id: impl Into<String>,
        chat_id: impl Into<String>,
        chat_type: ChatType,
        message_text: impl Into<String>,
        username: impl Into<String>,
        display_name: impl Into<String>,
        permissions: UserPermissions,
    ) -> Result<Self, KickAiError> {
        Self::build(
            telegram_id,
            team_id.into(),
            chat_id.into(),
            chat_type,
            message_text.into(),
            username.into(),
            display_name.into(),
            permissions,
            MessageOrigin::TelegramMessage,
        )
    }

    /// Create a context for a slash command.
    pub fn from_command(
        telegram_id: i64,
        team_id: impl Into<String>,
        chat_id: impl Into<String>,
        chat_type: ChatType,
        command: impl Into<String>,
        username: impl Into<String>,
        display_name: impl Into<String>,
        permissions: UserPermissions,
    ) -> Result<Self, KickAiError> {
        Self::build(
            telegram_id,
            team_id.into(),
            chat_id.into(),
            chat_type,
            command.into(),
            username.into(),
            display_name.into(),
            permissions,
            MessageOrigin::Command,
        )
    }

    /// Create a system-level context for maintenance operations.
    pub fn system(team_id: impl Into<String>, operation: impl Into<String>) -> Result<Self, KickAiError> {
        let team_id = team_id.into();
        validate_team_id(&team_id)?;
        Ok(Self {
            telegram_id: 0,
            username: "system".to_owned(),
            display_name: "system".to_owned(),
            team_id,
            chat_id: "system".to_owned(),
            chat_type: ChatType::System,
            message_text: operation.into(),
            permissions: UserPermissions::default(),
            origin: MessageOrigin::System,
            timestamp: Utc::now(),
            metadata: Map::new(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        telegram_id: i64,
        team_id: String,
        chat_id: String,
        chat_type: ChatType,
        message_text: String,
        username: String,
        display_name: String,
        permissions: UserPermissions,
        origin: MessageOrigin,
    ) -> Result<Self, KickAiError> {
        if telegram_id <= 0 {
            return Err(KickAiError::validation(
                "telegram_id",
                "must be a positive integer",
            ));
        }
        validate_team_id(&team_id)?;
        if chat_id.trim().is_empty() {
            return Err(KickAiError::validation("chat_id", "must not be empty"));
        }
        permissions.validate()?;

        let username = if username.trim().is_empty() {
            "unknown".to_owned()
        } else {
            username
        };
        let display_name = if display_name.trim().is_empty() {
            username.clone()
        } else {
            display_name
        };

        Ok(Self {
            telegram_id,
            username,
            display_name,
            team_id,
            chat_id,
            chat_type,
            message_text,
            permissions,
            origin,
            timestamp: Utc::now(),
            metadata: Map::new(),
        })
    }

    /// Whether the caller holds any registration at all.
    pub fn is_registered(&self) -> bool {
        self.permissions.is_player || self.permissions.is_team_member
    }

    /// Return a copy with an extra metadata entry attached.
    ///
    /// Contexts are immutable once dispatched; the router uses this while
    /// assembling the descriptor (e.g. for contact-share payloads).
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Serialize to a JSON mapping for logging or delegation.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Rebuild a context from a mapping produced by [`Self::to_value`].
    ///
    /// Fails with a validation error if any of the core fields is absent.
    pub fn from_value(value: &Value) -> Result<Self, KickAiError> {
        let obj = value
            .as_object()
            .ok_or_else(|| KickAiError::validation("context", "expected a JSON object"))?;

        let required = [
            "telegram_id",
            "team_id",
            "chat_id",
            "chat_type",
            "message_text",
            "username",
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|f| !obj.contains_key(**f))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(KickAiError::validation(
                "context",
                format!("missing required fields: {}", missing.join(", ")),
            ));
        }

        let ctx: Self = serde_json::from_value(value.clone())
            .map_err(|e| KickAiError::validation("context", e.to_string()))?;

        if ctx.origin != MessageOrigin::System {
            if ctx.telegram_id <= 0 {
                return Err(KickAiError::validation(
                    "telegram_id",
                    "must be a positive integer",
                ));
            }
            ctx.permissions.validate()?;
        }
        validate_team_id(&ctx.team_id)?;
        Ok(ctx)
    }

    /// One-line human-readable summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "user={} ({}) team={} chat={} ({}) registered={} player={} member={}",
            self.username,
            self.telegram_id,
            self.team_id,
            self.chat_type,
            self.chat_id,
            self.is_registered(),
            self.permissions.is_player,
            self.permissions.is_team_member,
        )
    }
}

fn validate_team_id(team_id: &str) -> Result<(), KickAiError> {
    if team_id.trim().is_empty() {
        return Err(KickAiError::validation("team_id", "must not be empty"));
    }
    if team_id.chars().count() > TEAM_ID_MAX_CHARS {
        return Err(KickAiError::validation(
            "team_id",
            format!("must be at most {TEAM_ID_MAX_CHARS} characters"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RequestContext {
        RequestContext::from_telegram_message(
            123456,
            "KAI",
            "-100123",
            ChatType::Main,
            "hello there",
            "jane",
            "Jane S",
            UserPermissions {
                is_player: true,
                ..Default::default()
            },
        )
        .expect("valid context")
    }

    #[test]
    fn test_roundtrip_through_mapping() {
        let ctx = sample().with_metadata("contact_phone", Value::String("+447123456789".into()));
        let restored = RequestContext::from_value(&ctx.to_value()).expect("roundtrip");
        assert_eq!(ctx, restored);
    }

    #[test]
    fn test_missing_core_field_rejected() {
        let ctx = sample();
        let mut value = ctx.to_value();
        let obj = value.as_object_mut().expect("object");
        obj.remove("chat_id");
        let err = RequestContext::from_value(&value).expect_err("must fail");
        assert!(matches!(err, KickAiError::Validation { .. }));
        assert!(err.to_string().contains("chat_id"));
    }

    #[test]
    fn test_is_registered_derivation() {
        let mut ctx = sample();
        assert!(ctx.is_registered());
        ctx.permissions = UserPermissions::default();
        assert!(!ctx.is_registered());
        ctx.permissions.is_team_member = true;
        assert!(ctx.is_registered());
    }

    #[test]
    fn test_admin_requires_membership() {
        let result = RequestContext::from_command(
            1,
            "KAI",
            "c1",
            ChatType::Leadership,
            "/approve JS1",
            "bob",
            "Bob",
            UserPermissions {
                is_admin: true,
                ..Default::default()
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_username_defaults_to_unknown() {
        let ctx = RequestContext::from_telegram_message(
            9,
            "KAI",
            "c",
            ChatType::Private,
            "",
            "",
            "",
            UserPermissions::default(),
        )
        .expect("valid");
        assert_eq!(ctx.username, "unknown");
        assert_eq!(ctx.display_name, "unknown");
        assert!(ctx.message_text.is_empty());
    }

    #[test]
    fn test_team_id_bounds() {
        assert!(RequestContext::system("", "tick").is_err());
        assert!(RequestContext::system("T".repeat(21), "tick").is_err());
        assert!(RequestContext::system("T".repeat(20), "tick").is_ok());
    }

    #[test]
    fn test_negative_telegram_id_rejected() {
        let result = RequestContext::from_telegram_message(
            -5,
            "KAI",
            "c",
            ChatType::Main,
            "hi",
            "x",
            "x",
            UserPermissions::default(),
        );
        assert!(result.is_err());
    }
}
