//! Fixture and squad selection tools.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::factories::ServiceFactory;
use crate::tools::{envelope, Tool};
use crate::types::{KickAiError, RequestContext};

fn looks_like_date(token: &str) -> bool {
    regex::Regex::new(r"^\d{4}-\d{2}-\d{2}$")
        .map(|re| re.is_match(token))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// create_match
// ---------------------------------------------------------------------------

/// `/creatematch <opponent...> <YYYY-MM-DD> [venue...]`.
pub struct CreateMatchTool {
    services: Arc<ServiceFactory>,
}

impl CreateMatchTool {
    /// Create the tool.
    pub fn new(services: Arc<ServiceFactory>) -> Self {
        Self { services }
    }

    async fn body(&self, ctx: &RequestContext, args: &[String]) -> Result<Value, KickAiError> {
        let date_idx = args.iter().position(|a| looks_like_date(a)).ok_or_else(|| {
            KickAiError::validation(
                "date",
                "usage: /creatematch <opponent> <YYYY-MM-DD> [venue]",
            )
        })?;

        let opponent = args[..date_idx].join(" ");
        let venue = if args.len() > date_idx.saturating_add(1) {
            Some(args[date_idx.saturating_add(1)..].join(" "))
        } else {
            None
        };

        let fixture = self
            .services
            .matches(&ctx.team_id)
            .create(&opponent, &args[date_idx], venue.as_deref())
            .await?;

        Ok(json!({
            "message": "📅 Match Created",
            "match_id": fixture.match_id,
            "opponent": fixture.opponent,
            "date": fixture.date.format("%Y-%m-%d").to_string(),
            "venue": fixture.venue,
        }))
    }
}

#[async_trait]
impl Tool for CreateMatchTool {
    async fn run(&self, ctx: &RequestContext, args: &[String]) -> String {
        envelope("create_match", self.body(ctx, args).await)
    }
}

// ---------------------------------------------------------------------------
// list_matches
// ---------------------------------------------------------------------------

/// `/listmatches` — every fixture on record.
pub struct ListMatchesTool {
    services: Arc<ServiceFactory>,
}

impl ListMatchesTool {
    /// Create the tool.
    pub fn new(services: Arc<ServiceFactory>) -> Self {
        Self { services }
    }

    async fn body(&self, ctx: &RequestContext) -> Result<Value, KickAiError> {
        let matches = self.services.matches(&ctx.team_id).list().await?;

        let mut lines = vec![format!("📅 Matches ({})", matches.len())];
        lines.push(String::new());
        if matches.is_empty() {
            lines.push("No matches scheduled. Create one with /creatematch.".to_owned());
        }
        for fixture in &matches {
            let venue = fixture.venue.as_deref().unwrap_or("venue TBC");
            lines.push(format!(
                "• {}: vs {} on {} at {} [{}]",
                fixture.match_id,
                fixture.opponent,
                fixture.date.format("%Y-%m-%d"),
                venue,
                fixture.status.as_str(),
            ));
        }
        Ok(Value::String(lines.join("\n")))
    }
}

#[async_trait]
impl Tool for ListMatchesTool {
    async fn run(&self, ctx: &RequestContext, _args: &[String]) -> String {
        envelope("list_matches", self.body(ctx).await)
    }
}

// ---------------------------------------------------------------------------
// select_squad
// ---------------------------------------------------------------------------

/// `/selectsquad <match_id>` — pick up to eleven available players.
pub struct SelectSquadTool {
    services: Arc<ServiceFactory>,
}

impl SelectSquadTool {
    /// Create the tool.
    pub fn new(services: Arc<ServiceFactory>) -> Self {
        Self { services }
    }

    async fn body(&self, ctx: &RequestContext, args: &[String]) -> Result<Value, KickAiError> {
        let match_id = args
            .first()
            .ok_or_else(|| KickAiError::validation("match_id", "usage: /selectsquad <match_id>"))?
            .to_uppercase();

        // Verify the match exists before looking at attendance.
        let fixture = self.services.matches(&ctx.team_id).get(&match_id).await?;

        let active = self.services.players(&ctx.team_id).active().await?;
        let squad = self
            .services
            .attendance(&ctx.team_id)
            .select_squad(&match_id, &active)
            .await?;

        let mut lines = vec![format!(
            "🏆 Squad for {} vs {} ({} selected)",
            fixture.match_id,
            fixture.opponent,
            squad.len()
        )];
        lines.push(String::new());
        if squad.is_empty() {
            lines.push("Nobody has confirmed availability yet.".to_owned());
        }
        for player in &squad {
            let position = player.position.as_deref().unwrap_or("unassigned");
            lines.push(format!("• {} ({position})", player.name));
        }
        Ok(Value::String(lines.join("\n")))
    }
}

#[async_trait]
impl Tool for SelectSquadTool {
    async fn run(&self, ctx: &RequestContext, args: &[String]) -> String {
        envelope("select_squad", self.body(ctx, args).await)
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
            "/creatematch",
            "boss",
            "Boss",
            UserPermissions::default(),
        )
        .expect("ctx")
    }

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| (*s).to_owned()).collect()
    }

    #[tokio::test]
    async fn test_create_match_parses_opponent_date_venue() {
        let tool = CreateMatchTool::new(services());
        let reply = tool
            .run(
                &ctx(),
                &args(&["Red", "Rovers", "2026-09-12", "Victoria", "Park"]),
            )
            .await;
        let parsed: Value = serde_json::from_str(&reply).expect("json");
        assert_eq!(parsed["data"]["match_id"], "M1");
        assert_eq!(parsed["data"]["opponent"], "Red Rovers");
        assert_eq!(parsed["data"]["venue"], "Victoria Park");
    }

    #[tokio::test]
    async fn test_create_match_without_date_is_error() {
        let tool = CreateMatchTool::new(services());
        let reply = tool.run(&ctx(), &args(&["Red", "Rovers"])).await;
        let parsed: Value = serde_json::from_str(&reply).expect("json");
        assert_eq!(parsed["status"], "error");
    }

    #[tokio::test]
    async fn test_select_squad_unknown_match() {
        let tool = SelectSquadTool::new(services());
        let reply = tool.run(&ctx(), &args(&["M9"])).await;
        let parsed: Value = serde_json::from_str(&reply).expect("json");
        assert_eq!(parsed["status"], "error");
    }
}
