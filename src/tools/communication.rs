//! Announcement and invite tools.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::domain::services::InviteService;
use crate::tools::{envelope, Tool};
use crate::types::{ChatType, KickAiError, RequestContext};

/// An outbound message for the transport to deliver to a whole chat.
#[derive(Debug, Clone, PartialEq)]
pub struct Broadcast {
    /// Which chat to deliver to.
    pub chat: ChatType,
    /// Plain-text body.
    pub text: String,
}

// ---------------------------------------------------------------------------
// send_announcement
// ---------------------------------------------------------------------------

/// `/announce <text>` — broadcast to the main chat via the outbound queue.
pub struct AnnounceTool {
    broadcasts: mpsc::Sender<Broadcast>,
}

impl AnnounceTool {
    /// Create the tool over the transport's outbound queue.
    pub fn new(broadcasts: mpsc::Sender<Broadcast>) -> Self {
        Self { broadcasts }
    }

    async fn body(&self, ctx: &RequestContext, args: &[String]) -> Result<Value, KickAiError> {
        if args.is_empty() {
            return Err(KickAiError::validation(
                "text",
                "usage: /announce <message>",
            ));
        }
        let text = format!("📢 {}", args.join(" "));

        self.broadcasts
            .send(Broadcast {
                chat: ChatType::Main,
                text,
            })
            .await
            .map_err(|_| KickAiError::unavailable("transport", "outbound queue closed"))?;

        tracing::info!(team_id = %ctx.team_id, "announcement queued");
        Ok(json!({ "message": "📢 Announcement sent to the main chat." }))
    }
}

#[async_trait]
impl Tool for AnnounceTool {
    async fn run(&self, ctx: &RequestContext, args: &[String]) -> String {
        envelope("send_announcement", self.body(ctx, args).await)
    }
}

// ---------------------------------------------------------------------------
// generate_invite_link
// ---------------------------------------------------------------------------

/// `/invitelink [main|leadership]` — mint an invite code for a chat.
pub struct InviteLinkTool {
    invites: Arc<InviteService>,
}

impl InviteLinkTool {
    /// Create the tool.
    pub fn new(invites: Arc<InviteService>) -> Self {
        Self { invites }
    }

    async fn body(&self, ctx: &RequestContext, args: &[String]) -> Result<Value, KickAiError> {
        let chat = match args.first().map(String::as_str) {
            None | Some("main") => ChatType::Main,
            Some("leadership") => ChatType::Leadership,
            Some(other) => {
                return Err(KickAiError::validation(
                    "chat",
                    format!("expected main or leadership, got: {other}"),
                ))
            }
        };

        let code = self.invites.generate(&ctx.team_id, chat);
        Ok(json!({
            "message": format!("🔗 Invite code for the {chat} chat"),
            "code": code,
        }))
    }
}

#[async_trait]
impl Tool for InviteLinkTool {
    async fn run(&self, ctx: &RequestContext, args: &[String]) -> String {
        envelope("generate_invite_link", self.body(ctx, args).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserPermissions;

    fn ctx() -> RequestContext {
        RequestContext::from_command(
            9,
            "KAI",
            "lead",
            ChatType::Leadership,
            "/announce",
            "boss",
            "Boss",
            UserPermissions::default(),
        )
        .expect("ctx")
    }

    #[tokio::test]
    async fn test_announce_queues_broadcast() {
        let (tx, mut rx) = mpsc::channel(4);
        let tool = AnnounceTool::new(tx);

        let reply = tool
            .run(&ctx(), &["Training".to_owned(), "moved".to_owned()])
            .await;
        let parsed: Value = serde_json::from_str(&reply).expect("json");
        assert_eq!(parsed["status"], "success");

        let broadcast = rx.recv().await.expect("queued");
        assert_eq!(broadcast.chat, ChatType::Main);
        assert!(broadcast.text.contains("Training moved"));
    }

    #[tokio::test]
    async fn test_announce_requires_text() {
        let (tx, _rx) = mpsc::channel(4);
        let tool = AnnounceTool::new(tx);
        let reply = tool.run(&ctx(), &[]).await;
        let parsed: Value = serde_json::from_str(&reply).expect("json");
        assert_eq!(parsed["status"], "error");
    }

    #[tokio::test]
    async fn test_invite_link_roundtrip() {
        let invites = Arc::new(InviteService::new("super-secret-key"));
        let tool = InviteLinkTool::new(Arc::clone(&invites));
        let reply = tool.run(&ctx(), &[]).await;
        let parsed: Value = serde_json::from_str(&reply).expect("json");
        let code = parsed["data"]["code"].as_str().expect("code");
        let (team, chat) = invites.verify(code).expect("verify");
        assert_eq!(team, "KAI");
        assert_eq!(chat, ChatType::Main);
    }
}
