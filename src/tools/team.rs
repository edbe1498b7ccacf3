//! Team member administration tools.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::MemberRole;
use crate::factories::ServiceFactory;
use crate::tools::{envelope, Tool};
use crate::types::{KickAiError, RequestContext};

// ---------------------------------------------------------------------------
// add_team_member
// ---------------------------------------------------------------------------

/// `/addmember <name...> [role]` — add a leadership member.
///
/// The final token is taken as the role when it parses as one; otherwise
/// the whole argument list is the name and the role defaults to `member`.
pub struct AddMemberTool {
    services: Arc<ServiceFactory>,
}

impl AddMemberTool {
    /// Create the tool.
    pub fn new(services: Arc<ServiceFactory>) -> Self {
        Self { services }
    }

    async fn body(&self, ctx: &RequestContext, args: &[String]) -> Result<Value, KickAiError> {
        if args.is_empty() {
            return Err(KickAiError::validation(
                "arguments",
                "usage: /addmember <name> [admin|manager|coach|member]",
            ));
        }

        let (name_tokens, role) = match args.split_last() {
            Some((last, rest)) if !rest.is_empty() => match last.parse::<MemberRole>() {
                Ok(role) => (rest, role),
                Err(_) => (args, MemberRole::Member),
            },
            _ => (args, MemberRole::Member),
        };
        let name = name_tokens.join(" ");

        let members = self.services.members(&ctx.team_id);
        let member = members.add(&name, None, role).await?;

        Ok(json!({
            "message": "✅ Team Member Added",
            "member_id": member.member_id,
            "name": member.name,
            "role": member.role.as_str(),
        }))
    }
}

#[async_trait]
impl Tool for AddMemberTool {
    async fn run(&self, ctx: &RequestContext, args: &[String]) -> String {
        envelope("add_team_member", self.body(ctx, args).await)
    }
}

// ---------------------------------------------------------------------------
// list_team_members
// ---------------------------------------------------------------------------

/// `/listmembers` — everyone on the leadership side.
pub struct ListMembersTool {
    services: Arc<ServiceFactory>,
}

impl ListMembersTool {
    /// Create the tool.
    pub fn new(services: Arc<ServiceFactory>) -> Self {
        Self { services }
    }

    async fn body(&self, ctx: &RequestContext) -> Result<Value, KickAiError> {
        let members = self.services.members(&ctx.team_id).list().await?;

        let mut lines = vec![format!("👔 Team Members ({})", members.len())];
        lines.push(String::new());
        if members.is_empty() {
            lines.push("No team members recorded yet. Add one with /addmember.".to_owned());
        }
        for member in &members {
            lines.push(format!(
                "• {} ({}, {})",
                member.name,
                member.member_id,
                member.role.as_str()
            ));
        }
        Ok(Value::String(lines.join("\n")))
    }
}

#[async_trait]
impl Tool for ListMembersTool {
    async fn run(&self, ctx: &RequestContext, _args: &[String]) -> String {
        envelope("list_team_members", self.body(ctx).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimitsConfig;
    use crate::store::MemoryStore;
    use crate::types::{ChatType, UserPermissions};

    fn services() -> Arc<ServiceFactory> {
        Arc::new(ServiceFactory::new(
            Arc::new(MemoryStore::new()),
            &LimitsConfig::default(),
        ))
    }

    fn ctx() -> RequestContext {
        RequestContext::from_command(
            9,
            "KAI",
            "lead",
            ChatType::Leadership,
            "/addmember",
            "boss",
            "Boss",
            UserPermissions::default(),
        )
        .expect("ctx")
    }

    #[tokio::test]
    async fn test_add_member_with_trailing_role() {
        let tool = AddMemberTool::new(services());
        let reply = tool
            .run(
                &ctx(),
                &["Mary".to_owned(), "Doe".to_owned(), "admin".to_owned()],
            )
            .await;
        let parsed: Value = serde_json::from_str(&reply).expect("json");
        assert_eq!(parsed["data"]["name"], "Mary Doe");
        assert_eq!(parsed["data"]["role"], "admin");
    }

    #[tokio::test]
    async fn test_add_member_defaults_role() {
        let tool = AddMemberTool::new(services());
        let reply = tool.run(&ctx(), &["Solo".to_owned()]).await;
        let parsed: Value = serde_json::from_str(&reply).expect("json");
        assert_eq!(parsed["data"]["role"], "member");
    }
}
