//! Player registration and lifecycle tools.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::factories::ServiceFactory;
use crate::tools::{envelope, Tool};
use crate::types::{ChatType, KickAiError, RequestContext};

/// Upper bound on bullets in the player list reply.
const LIST_BULLET_CAP: usize = 20;

/// Whether a command token reads as a phone number.
fn looks_like_phone(token: &str) -> bool {
    let digits = token.chars().filter(|c| c.is_ascii_digit()).count();
    (token.starts_with('+') || token.starts_with('0') || token.chars().all(|c| c.is_ascii_digit() || c == '-'))
        && digits >= 7
}

// ---------------------------------------------------------------------------
// register_player
// ---------------------------------------------------------------------------

/// `/register <name> [phone] [position]` — create a pending player record.
pub struct RegisterPlayerTool {
    services: Arc<ServiceFactory>,
}

impl RegisterPlayerTool {
    /// Create the tool.
    pub fn new(services: Arc<ServiceFactory>) -> Self {
        Self { services }
    }

    async fn body(&self, ctx: &RequestContext, args: &[String]) -> Result<Value, KickAiError> {
        if args.is_empty() {
            return Err(KickAiError::validation(
                "arguments",
                "usage: /register <name> [phone] [position]",
            ));
        }

        let players = self.services.players(&ctx.team_id);
        if let Some(existing) = players.find_by_telegram(ctx.telegram_id).await? {
            return Err(KickAiError::Conflict {
                entity: "player",
                key: existing.player_id,
            });
        }

        let phone_idx = args.iter().position(|a| looks_like_phone(a));
        let (name_tokens, phone, position) = match phone_idx {
            Some(idx) => {
                let position = if args.len() > idx.saturating_add(1) {
                    Some(args[idx.saturating_add(1)..].join(" "))
                } else {
                    None
                };
                (&args[..idx], Some(args[idx].as_str()), position)
            }
            None => (args, None, None),
        };
        let name = name_tokens.join(" ");

        let player = players
            .register(
                &name,
                phone,
                position.as_deref(),
                ctx.telegram_id,
                &ctx.username,
            )
            .await?;

        let mut data = json!({
            "message": "✅ Registration Successful",
            "player_id": player.player_id,
            "name": player.name,
            "status": player.status.as_str(),
        });
        if let Some(position) = &player.position {
            data["position"] = json!(position);
        }
        if player.phone.is_none() {
            data["message"] = json!(
                "✅ Registration Successful — one last step: share your contact so we can reach you."
            );
            data["_needs_contact_button"] = json!(true);
        }
        Ok(data)
    }
}

#[async_trait]
impl Tool for RegisterPlayerTool {
    async fn run(&self, ctx: &RequestContext, args: &[String]) -> String {
        envelope("register_player", self.body(ctx, args).await)
    }
}

// ---------------------------------------------------------------------------
// approve_player / reject_player / remove_player
// ---------------------------------------------------------------------------

/// Which lifecycle transition a [`PlayerLifecycleTool`] performs.
#[derive(Debug, Clone, Copy)]
pub enum LifecycleAction {
    Approve,
    Reject,
    Remove,
}

/// `/approve`, `/reject`, and `/remove` share the id-then-transition shape.
pub struct PlayerLifecycleTool {
    services: Arc<ServiceFactory>,
    action: LifecycleAction,
}

impl PlayerLifecycleTool {
    /// Create the tool for one transition.
    pub fn new(services: Arc<ServiceFactory>, action: LifecycleAction) -> Self {
        Self { services, action }
    }

    fn tool_id(&self) -> &'static str {
        match self.action {
            LifecycleAction::Approve => "approve_player",
            LifecycleAction::Reject => "reject_player",
            LifecycleAction::Remove => "remove_player",
        }
    }

    async fn body(&self, ctx: &RequestContext, args: &[String]) -> Result<Value, KickAiError> {
        let player_id = args
            .first()
            .ok_or_else(|| KickAiError::validation("player_id", "a player id is required"))?
            .to_uppercase();

        let players = self.services.players(&ctx.team_id);
        let (player, headline) = match self.action {
            LifecycleAction::Approve => (players.approve(&player_id).await?, "✅ Player Approved"),
            LifecycleAction::Reject => (players.reject(&player_id).await?, "🚫 Player Rejected"),
            LifecycleAction::Remove => (players.remove(&player_id).await?, "🗑 Player Removed"),
        };

        Ok(json!({
            "message": headline,
            "player_id": player.player_id,
            "name": player.name,
            "status": player.status.as_str(),
        }))
    }
}

#[async_trait]
impl Tool for PlayerLifecycleTool {
    async fn run(&self, ctx: &RequestContext, args: &[String]) -> String {
        envelope(self.tool_id(), self.body(ctx, args).await)
    }
}

// ---------------------------------------------------------------------------
// list_active_players
// ---------------------------------------------------------------------------

/// `/list` — active players, with a pending section in the leadership chat.
pub struct ListPlayersTool {
    services: Arc<ServiceFactory>,
}

impl ListPlayersTool {
    /// Create the tool.
    pub fn new(services: Arc<ServiceFactory>) -> Self {
        Self { services }
    }

    async fn body(&self, ctx: &RequestContext) -> Result<Value, KickAiError> {
        let players = self.services.players(&ctx.team_id);
        let active = players.active().await?;

        let mut lines = vec![format!("⚽ Active Players ({})", active.len())];
        lines.push(String::new());
        if active.is_empty() {
            lines.push("No active players yet. New players can join with /register.".to_owned());
        }
        for player in active.iter().take(LIST_BULLET_CAP) {
            let position = player.position.as_deref().unwrap_or("unassigned");
            lines.push(format!("• {} ({}, {position})", player.name, player.player_id));
        }
        if active.len() > LIST_BULLET_CAP {
            lines.push("…".to_owned());
        }

        if ctx.chat_type == ChatType::Leadership {
            let pending: Vec<_> = players
                .list()
                .await?
                .into_iter()
                .filter(|p| p.status == crate::domain::PlayerStatus::Pending)
                .collect();
            if !pending.is_empty() {
                lines.push(String::new());
                lines.push(format!("⏳ Pending Approval ({})", pending.len()));
                for player in pending.iter().take(LIST_BULLET_CAP) {
                    lines.push(format!("• {} ({})", player.name, player.player_id));
                }
            }
        }

        Ok(Value::String(lines.join("\n")))
    }
}

#[async_trait]
impl Tool for ListPlayersTool {
    async fn run(&self, ctx: &RequestContext, _args: &[String]) -> String {
        envelope("list_active_players", self.body(ctx).await)
    }
}

// ---------------------------------------------------------------------------
// get_my_info
// ---------------------------------------------------------------------------

/// `/myinfo` — the caller's own records.
pub struct MyInfoTool {
    services: Arc<ServiceFactory>,
}

impl MyInfoTool {
    /// Create the tool.
    pub fn new(services: Arc<ServiceFactory>) -> Self {
        Self { services }
    }

    async fn body(&self, ctx: &RequestContext) -> Result<Value, KickAiError> {
        let players = self.services.players(&ctx.team_id);
        let members = self.services.members(&ctx.team_id);

        if let Some(player) = players.find_by_telegram(ctx.telegram_id).await? {
            return Ok(json!({
                "message": format!("ℹ️ Your player record, {}", player.name),
                "player_id": player.player_id,
                "status": player.status.as_str(),
                "position": player.position,
                "phone": player.phone,
            }));
        }
        if let Some(member) = members.find_by_telegram(ctx.telegram_id).await? {
            return Ok(json!({
                "message": format!("ℹ️ Your team member record, {}", member.name),
                "member_id": member.member_id,
                "role": member.role.as_str(),
            }));
        }
        Err(KickAiError::NotFound {
            entity: "player",
            key: ctx.username.clone(),
            hint: Some("/register to join the squad".to_owned()),
        })
    }
}

#[async_trait]
impl Tool for MyInfoTool {
    async fn run(&self, ctx: &RequestContext, _args: &[String]) -> String {
        envelope("get_my_info", self.body(ctx).await)
    }
}

// ---------------------------------------------------------------------------
// get_player_status
// ---------------------------------------------------------------------------

/// `/status <phone|id>` — look up one player.
pub struct PlayerStatusTool {
    services: Arc<ServiceFactory>,
}

impl PlayerStatusTool {
    /// Create the tool.
    pub fn new(services: Arc<ServiceFactory>) -> Self {
        Self { services }
    }

    async fn body(&self, ctx: &RequestContext, args: &[String]) -> Result<Value, KickAiError> {
        let key = args
            .first()
            .ok_or_else(|| KickAiError::validation("lookup", "usage: /status <phone or player id>"))?;

        let players = self.services.players(&ctx.team_id);
        let player = if looks_like_phone(key) {
            let phone = crate::domain::normalize_phone(key)?;
            players
                .find_by_phone(&phone)
                .await?
                .ok_or(KickAiError::NotFound {
                    entity: "player",
                    key: phone,
                    hint: Some("player id".to_owned()),
                })?
        } else {
            players.get(&key.to_uppercase()).await?
        };

        Ok(json!({
            "message": format!("ℹ️ {}", player.name),
            "player_id": player.player_id,
            "status": player.status.as_str(),
            "position": player.position,
        }))
    }
}

#[async_trait]
impl Tool for PlayerStatusTool {
    async fn run(&self, ctx: &RequestContext, args: &[String]) -> String {
        envelope("get_player_status", self.body(ctx, args).await)
    }
}

// ---------------------------------------------------------------------------
// link_player_contact
// ---------------------------------------------------------------------------

/// Synthetic `/linkcontact` — attach a contact-shared phone number to the
/// caller's pending registration. Requires the contact payload in the
/// request context (enforced by the registry's context schema).
pub struct LinkContactTool {
    services: Arc<ServiceFactory>,
}

impl LinkContactTool {
    /// Create the tool.
    pub fn new(services: Arc<ServiceFactory>) -> Self {
        Self { services }
    }

    async fn body(&self, ctx: &RequestContext) -> Result<Value, KickAiError> {
        let phone = ctx
            .metadata
            .get("contact_phone")
            .and_then(Value::as_str)
            .ok_or_else(|| KickAiError::validation("contact_phone", "no contact payload attached"))?;
        let target = ctx
            .metadata
            .get("contact_user_id")
            .and_then(Value::as_i64)
            .unwrap_or(ctx.telegram_id);

        let players = self.services.players(&ctx.team_id);
        let player = players.link_contact(target, phone).await?;

        Ok(json!({
            "message": "✅ Contact linked — your registration is complete.",
            "player_id": player.player_id,
            "phone": player.phone,
        }))
    }
}

#[async_trait]
impl Tool for LinkContactTool {
    async fn run(&self, ctx: &RequestContext, _args: &[String]) -> String {
        envelope("link_player_contact", self.body(ctx).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimitsConfig;
    use crate::store::MemoryStore;
    use crate::types::UserPermissions;

    fn services() -> Arc<ServiceFactory> {
        Arc::new(ServiceFactory::new(
            Arc::new(MemoryStore::new()),
            &LimitsConfig::default(),
        ))
    }

    fn ctx(chat_type: ChatType, telegram_id: i64) -> RequestContext {
        RequestContext::from_command(
            telegram_id,
            "KAI",
            "c1",
            chat_type,
            "/register",
            "jane",
            "Jane",
            UserPermissions::default(),
        )
        .expect("ctx")
    }

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_phone_token_detection() {
        assert!(looks_like_phone("+447123456789"));
        assert!(looks_like_phone("07123456789"));
        assert!(!looks_like_phone("midfielder"));
        assert!(!looks_like_phone("Smith"));
    }

    #[tokio::test]
    async fn test_register_with_phone_and_position() {
        let tool = RegisterPlayerTool::new(services());
        let reply = tool
            .run(
                &ctx(ChatType::Main, 42),
                &args(&["John", "Smith", "+447123456789", "midfielder"]),
            )
            .await;
        let parsed: Value = serde_json::from_str(&reply).expect("json");
        assert_eq!(parsed["status"], "success");
        assert_eq!(parsed["data"]["player_id"], "JS1");
        assert_eq!(parsed["data"]["position"], "midfielder");
        assert!(parsed["data"]["message"]
            .as_str()
            .expect("message")
            .contains("Registration Successful"));
    }

    #[tokio::test]
    async fn test_register_without_phone_requests_contact() {
        let tool = RegisterPlayerTool::new(services());
        let reply = tool
            .run(&ctx(ChatType::Main, 42), &args(&["John", "Smith"]))
            .await;
        assert!(crate::tools::needs_contact_button(&reply));
    }

    #[tokio::test]
    async fn test_register_twice_conflicts() {
        let services = services();
        let tool = RegisterPlayerTool::new(Arc::clone(&services));
        let context = ctx(ChatType::Main, 42);
        tool.run(&context, &args(&["John", "Smith"])).await;
        let reply = tool.run(&context, &args(&["John", "Smith"])).await;
        let parsed: Value = serde_json::from_str(&reply).expect("json");
        assert_eq!(parsed["status"], "error");
    }

    #[tokio::test]
    async fn test_list_header_and_leadership_pending_section() {
        let services = services();
        let register = RegisterPlayerTool::new(Arc::clone(&services));
        register
            .run(
                &ctx(ChatType::Main, 1),
                &args(&["John", "Smith", "+447123456789", "midfielder"]),
            )
            .await;
        services
            .players("KAI")
            .approve("JS1")
            .await
            .expect("approve");
        register
            .run(&ctx(ChatType::Main, 2), &args(&["Ben", "Bay", "+447123456780"]))
            .await;

        let list = ListPlayersTool::new(services);
        let reply = list.run(&ctx(ChatType::Leadership, 9), &[]).await;
        let parsed: Value = serde_json::from_str(&reply).expect("json");
        let text = parsed["data"].as_str().expect("text");
        assert!(text.starts_with("⚽ Active Players (1)"));
        assert!(text.contains("John Smith"));
        assert!(text.contains("⏳ Pending Approval (1)"));
        assert!(text.contains("Ben Bay"));
    }

    #[tokio::test]
    async fn test_status_lookup_by_phone_and_id() {
        let services = services();
        RegisterPlayerTool::new(Arc::clone(&services))
            .run(
                &ctx(ChatType::Main, 1),
                &args(&["John", "Smith", "07123456789"]),
            )
            .await;

        let status = PlayerStatusTool::new(services);
        let by_id = status
            .run(&ctx(ChatType::Main, 2), &args(&["js1"]))
            .await;
        let parsed: Value = serde_json::from_str(&by_id).expect("json");
        assert_eq!(parsed["data"]["player_id"], "JS1");

        let by_phone = status
            .run(&ctx(ChatType::Main, 2), &args(&["+447123456789"]))
            .await;
        let parsed: Value = serde_json::from_str(&by_phone).expect("json");
        assert_eq!(parsed["data"]["player_id"], "JS1");
    }
}
