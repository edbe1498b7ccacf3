//! The agentic message router — bridge between transport and pipeline.
//!
//! Responsibilities: translate a transport update into a
//! [`RequestContext`], attach the caller's permission snapshot, gate
//! commands on chat type and permission tier, turn contact shares into the
//! synthetic `/linkcontact` command, enforce the request-wide timeout, and
//! format the pipeline's reply for the transport.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::domain::services::lookup_permissions;
use crate::factories::ServiceFactory;
use crate::formatter::ResponseFormatter;
use crate::orchestration::OrchestrationPipeline;
use crate::registry::Registries;
use crate::tools::help::permission_of;
use crate::tools::needs_contact_button;
use crate::types::{ChatType, KickAiError, MessageOrigin, RequestContext, UserPermissions};

/// Scripted reply for unknown commands.
const UNRECOGNIZED_COMMAND: &str =
    "🤔 I don't recognize that command. Type /help to see what you can do.";

/// Scripted reply when the request exceeds the configured timeout.
const TIMEOUT_REPLY: &str =
    "⏱ That took longer than expected and was cancelled. Please try again.";

/// Scripted reply for non-text, non-contact updates.
const UNSUPPORTED_UPDATE: &str = "I can only read text messages and shared contacts here.";

/// A transport-agnostic inbound update.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Sender's Telegram id.
    pub telegram_id: i64,
    /// Sender's username (may be empty).
    pub username: String,
    /// Sender's display name (may be empty).
    pub display_name: String,
    /// Chat the update arrived in.
    pub chat_id: String,
    /// Message text, when the update carries text.
    pub text: Option<String>,
    /// Contact payload, when the user shared a contact.
    pub contact: Option<ContactPayload>,
}

/// A shared contact from the transport's native affordance.
#[derive(Debug, Clone)]
pub struct ContactPayload {
    /// Phone number as sent by the transport.
    pub phone: String,
    /// Telegram id of the contact's owner, when known.
    pub user_id: Option<i64>,
}

/// The reply handed back to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterReply {
    /// Plain-text reply body.
    pub text: String,
    /// Whether the transport should attach a contact-request keyboard.
    pub needs_contact_button: bool,
}

impl RouterReply {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            needs_contact_button: false,
        }
    }
}

/// Chat-id → chat-type mapping for one team.
#[derive(Debug, Clone)]
pub struct ChatMap {
    /// Telegram chat id of the players' chat.
    pub main_chat_id: String,
    /// Telegram chat id of the administrators' chat.
    pub leadership_chat_id: String,
}

impl ChatMap {
    /// Classify a chat id. Anything that is neither known group chat is a
    /// private conversation with the bot.
    pub fn classify(&self, chat_id: &str) -> ChatType {
        if chat_id == self.main_chat_id {
            ChatType::Main
        } else if chat_id == self.leadership_chat_id {
            ChatType::Leadership
        } else {
            ChatType::Private
        }
    }
}

/// Entry point from the transport.
pub struct AgenticMessageRouter {
    team_id: String,
    chat_map: ChatMap,
    registries: Arc<Registries>,
    pipeline: Arc<OrchestrationPipeline>,
    services: Arc<ServiceFactory>,
    formatter: ResponseFormatter,
    request_timeout: Duration,
}

impl AgenticMessageRouter {
    /// Create the router for one team.
    pub fn new(
        team_id: impl Into<String>,
        chat_map: ChatMap,
        registries: Arc<Registries>,
        pipeline: Arc<OrchestrationPipeline>,
        services: Arc<ServiceFactory>,
        formatter: ResponseFormatter,
        request_timeout: Duration,
    ) -> Self {
        Self {
            team_id: team_id.into(),
            chat_map,
            registries,
            pipeline,
            services,
            formatter,
            request_timeout,
        }
    }

    /// Process one inbound update into a reply.
    ///
    /// Never fails: every error path produces a scripted or user-safe
    /// reply.
    pub async fn process(&self, msg: InboundMessage) -> RouterReply {
        let chat_type = self.chat_map.classify(&msg.chat_id);

        let permissions = match self.permissions_for(msg.telegram_id).await {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "permission lookup failed");
                return RouterReply::plain(e.user_message());
            }
        };

        // Contact shares become the synthetic registration-completion
        // command, carrying the payload in metadata.
        if let Some(contact) = &msg.contact {
            return self
                .process_contact(&msg, contact.clone(), chat_type, permissions)
                .await;
        }

        let Some(text) = msg.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return RouterReply::plain(UNSUPPORTED_UPDATE);
        };

        if text.starts_with('/') {
            self.process_command(&msg, text, chat_type, permissions).await
        } else {
            self.process_natural_language(&msg, text, chat_type, permissions)
                .await
        }
    }

    async fn process_command(
        &self,
        msg: &InboundMessage,
        text: &str,
        chat_type: ChatType,
        permissions: UserPermissions,
    ) -> RouterReply {
        let command_name = text.split_whitespace().next().unwrap_or(text);

        let Some(spec) = self.registries.commands.resolve(command_name, chat_type) else {
            info!(command = command_name, "unrecognized command");
            return RouterReply::plain(UNRECOGNIZED_COMMAND);
        };
        let spec = spec.clone();

        let ctx = match RequestContext::from_command(
            msg.telegram_id,
            &self.team_id,
            &msg.chat_id,
            chat_type,
            text,
            &msg.username,
            &msg.display_name,
            permissions,
        ) {
            Ok(ctx) => ctx,
            Err(e) => return RouterReply::plain(e.user_message()),
        };

        if !spec.allowed_in(chat_type) {
            warn!(command = %spec.name, chat = %chat_type, "command not allowed in chat");
            let reply = if spec.chat_types == [ChatType::Leadership] {
                format!(
                    "❌ Access Denied: {} can only be used in the leadership chat.",
                    spec.name
                )
            } else {
                format!("❌ {} is not available in this chat.", spec.name)
            };
            return RouterReply::plain(reply);
        }

        if permission_of(&ctx) < spec.permission {
            warn!(
                command = %spec.name,
                required = %spec.permission,
                "caller lacks the required permission"
            );
            return RouterReply::plain(
                KickAiError::PermissionDenied {
                    action: spec.name.clone(),
                }
                .user_message(),
            );
        }

        self.dispatch(text, &ctx).await
    }

    async fn process_natural_language(
        &self,
        msg: &InboundMessage,
        text: &str,
        chat_type: ChatType,
        permissions: UserPermissions,
    ) -> RouterReply {
        let ctx = match RequestContext::from_telegram_message(
            msg.telegram_id,
            &self.team_id,
            &msg.chat_id,
            chat_type,
            text,
            &msg.username,
            &msg.display_name,
            permissions,
        ) {
            Ok(ctx) => ctx,
            Err(e) => return RouterReply::plain(e.user_message()),
        };

        self.dispatch(text, &ctx).await
    }

    async fn process_contact(
        &self,
        msg: &InboundMessage,
        contact: ContactPayload,
        chat_type: ChatType,
        permissions: UserPermissions,
    ) -> RouterReply {
        let ctx = match RequestContext::from_command(
            msg.telegram_id,
            &self.team_id,
            &msg.chat_id,
            chat_type,
            "/linkcontact",
            &msg.username,
            &msg.display_name,
            permissions,
        ) {
            Ok(ctx) => ctx,
            Err(e) => return RouterReply::plain(e.user_message()),
        };
        let mut ctx = ctx.with_metadata("contact_phone", serde_json::json!(contact.phone));
        if let Some(user_id) = contact.user_id {
            ctx = ctx.with_metadata("contact_user_id", serde_json::json!(user_id));
        }

        info!(telegram_id = msg.telegram_id, "contact share received");
        self.dispatch("/linkcontact", &ctx).await
    }

    /// Run the pipeline under the request timeout, then format the reply.
    async fn dispatch(&self, task: &str, ctx: &RequestContext) -> RouterReply {
        debug_assert!(matches!(
            ctx.origin,
            MessageOrigin::Command | MessageOrigin::TelegramMessage | MessageOrigin::NaturalLanguage
        ));

        let raw = match tokio::time::timeout(
            self.request_timeout,
            self.pipeline.execute_task(task, ctx),
        )
        .await
        {
            Ok(reply) => reply,
            Err(_) => {
                warn!(timeout_secs = self.request_timeout.as_secs(), "request timed out");
                return RouterReply::plain(TIMEOUT_REPLY);
            }
        };

        RouterReply {
            needs_contact_button: needs_contact_button(&raw),
            text: self.formatter.format(&raw),
        }
    }

    async fn permissions_for(&self, telegram_id: i64) -> Result<UserPermissions, KickAiError> {
        let players = self.services.players(&self.team_id);
        let members = self.services.members(&self.team_id);
        lookup_permissions(&players, &members, telegram_id).await
    }
}
