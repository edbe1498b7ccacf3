//! Help and welcome tools.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::registry::commands::CommandRegistry;
use crate::tools::{envelope, Tool};
use crate::types::{KickAiError, PermissionLevel, RequestContext};

/// Permission tier a context's flags translate to.
pub fn permission_of(ctx: &RequestContext) -> PermissionLevel {
    if ctx.origin == crate::types::MessageOrigin::System {
        PermissionLevel::System
    } else if ctx.permissions.is_admin {
        PermissionLevel::Admin
    } else if ctx.permissions.is_leadership {
        PermissionLevel::Leadership
    } else if ctx.is_registered() {
        PermissionLevel::Player
    } else {
        PermissionLevel::Public
    }
}

// ---------------------------------------------------------------------------
// get_help
// ---------------------------------------------------------------------------

/// `/help` — the commands available to this caller in this chat.
pub struct HelpTool {
    commands: Arc<CommandRegistry>,
}

impl HelpTool {
    /// Create the tool over the frozen command registry.
    pub fn new(commands: Arc<CommandRegistry>) -> Self {
        Self { commands }
    }

    async fn body(&self, ctx: &RequestContext) -> Result<Value, KickAiError> {
        let permission = permission_of(ctx);
        let available = self.commands.commands_for(ctx.chat_type, permission);

        let mut lines = vec![format!("📖 Available commands ({} chat)", ctx.chat_type)];
        lines.push(String::new());
        if available.is_empty() {
            lines.push("No commands are available to you here.".to_owned());
        }
        for spec in available {
            lines.push(format!("{} — {}", spec.name, spec.description));
        }
        lines.push(String::new());
        lines.push("Just type a message for anything else.".to_owned());
        Ok(Value::String(lines.join("\n")))
    }
}

#[async_trait]
impl Tool for HelpTool {
    async fn run(&self, ctx: &RequestContext, _args: &[String]) -> String {
        envelope("get_help", self.body(ctx).await)
    }
}

// ---------------------------------------------------------------------------
// welcome_message
// ---------------------------------------------------------------------------

/// `/start` — greeting with next steps.
pub struct WelcomeTool;

#[async_trait]
impl Tool for WelcomeTool {
    async fn run(&self, ctx: &RequestContext, _args: &[String]) -> String {
        let greeting = if ctx.is_registered() {
            format!(
                "👋 Welcome back, {}! Type /help to see what you can do here.",
                ctx.display_name
            )
        } else {
            format!(
                "👋 Hi {}! I'm the team assistant. Join the squad with /register, or type /help to see everything I can do.",
                ctx.display_name
            )
        };
        crate::tools::success_message(greeting)
    }
}
