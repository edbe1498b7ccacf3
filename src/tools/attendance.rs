//! Attendance and availability tools.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::AttendanceStatus;
use crate::factories::ServiceFactory;
use crate::tools::{envelope, Tool};
use crate::types::{KickAiError, RequestContext};

// ---------------------------------------------------------------------------
// mark_attendance
// ---------------------------------------------------------------------------

/// `/markattendance <match_id> <yes|no|maybe>` — record the caller's
/// availability. The caller must hold a player record.
pub struct MarkAttendanceTool {
    services: Arc<ServiceFactory>,
}

impl MarkAttendanceTool {
    /// Create the tool.
    pub fn new(services: Arc<ServiceFactory>) -> Self {
        Self { services }
    }

    async fn body(&self, ctx: &RequestContext, args: &[String]) -> Result<Value, KickAiError> {
        let [match_id, answer] = args else {
            return Err(KickAiError::validation(
                "arguments",
                "usage: /markattendance <match_id> <yes|no|maybe>",
            ));
        };
        let match_id = match_id.to_uppercase();
        let status: AttendanceStatus = answer.parse()?;

        // Verify the fixture and the caller's player record.
        self.services.matches(&ctx.team_id).get(&match_id).await?;
        let player = self
            .services
            .players(&ctx.team_id)
            .find_by_telegram(ctx.telegram_id)
            .await?
            .ok_or_else(|| KickAiError::NotFound {
                entity: "player",
                key: ctx.username.clone(),
                hint: Some("/register to join the squad".to_owned()),
            })?;

        let record = self
            .services
            .attendance(&ctx.team_id)
            .mark(&match_id, &player.player_id, status)
            .await?;

        Ok(json!({
            "message": "✅ Availability Recorded",
            "match_id": record.match_id,
            "player_id": record.player_id,
            "answer": record.status.as_str(),
        }))
    }
}

#[async_trait]
impl Tool for MarkAttendanceTool {
    async fn run(&self, ctx: &RequestContext, args: &[String]) -> String {
        envelope("mark_attendance", self.body(ctx, args).await)
    }
}

// ---------------------------------------------------------------------------
// attendance_summary
// ---------------------------------------------------------------------------

/// `/attendance <match_id>` — availability counts for a match.
pub struct AttendanceSummaryTool {
    services: Arc<ServiceFactory>,
}

impl AttendanceSummaryTool {
    /// Create the tool.
    pub fn new(services: Arc<ServiceFactory>) -> Self {
        Self { services }
    }

    async fn body(&self, ctx: &RequestContext, args: &[String]) -> Result<Value, KickAiError> {
        let match_id = args
            .first()
            .ok_or_else(|| KickAiError::validation("match_id", "usage: /attendance <match_id>"))?
            .to_uppercase();

        let fixture = self.services.matches(&ctx.team_id).get(&match_id).await?;
        let (yes, no, maybe) = self
            .services
            .attendance(&ctx.team_id)
            .summary(&match_id)
            .await?;

        Ok(json!({
            "message": format!(
                "📋 Availability for {} vs {}",
                fixture.match_id, fixture.opponent
            ),
            "available": yes,
            "unavailable": no,
            "maybe": maybe,
        }))
    }
}

#[async_trait]
impl Tool for AttendanceSummaryTool {
    async fn run(&self, ctx: &RequestContext, args: &[String]) -> String {
        envelope("attendance_summary", self.body(ctx, args).await)
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

    fn ctx(telegram_id: i64) -> RequestContext {
        RequestContext::from_command(
            telegram_id,
            "KAI",
            "main",
            ChatType::Main,
            "/markattendance",
            "jane",
            "Jane",
            UserPermissions::default(),
        )
        .expect("ctx")
    }

    #[tokio::test]
    async fn test_mark_and_summarize() {
        let services = services();
        services
            .matches("KAI")
            .create("Rovers", "2026-09-12", None)
            .await
            .expect("match");
        let player = services
            .players("KAI")
            .register("Jane Stone", None, None, 42, "jane")
            .await
            .expect("register");
        services
            .players("KAI")
            .approve(&player.player_id)
            .await
            .expect("approve");

        let mark = MarkAttendanceTool::new(Arc::clone(&services));
        let reply = mark
            .run(&ctx(42), &["m1".to_owned(), "yes".to_owned()])
            .await;
        let parsed: Value = serde_json::from_str(&reply).expect("json");
        assert_eq!(parsed["status"], "success");
        assert_eq!(parsed["data"]["answer"], "yes");

        let summary = AttendanceSummaryTool::new(services);
        let reply = summary.run(&ctx(42), &["M1".to_owned()]).await;
        let parsed: Value = serde_json::from_str(&reply).expect("json");
        assert_eq!(parsed["data"]["available"], 1);
        assert_eq!(parsed["data"]["unavailable"], 0);
    }

    #[tokio::test]
    async fn test_unregistered_caller_cannot_mark() {
        let services = services();
        services
            .matches("KAI")
            .create("Rovers", "2026-09-12", None)
            .await
            .expect("match");

        let mark = MarkAttendanceTool::new(services);
        let reply = mark
            .run(&ctx(99), &["M1".to_owned(), "yes".to_owned()])
            .await;
        let parsed: Value = serde_json::from_str(&reply).expect("json");
        assert_eq!(parsed["status"], "error");
        assert!(parsed["message"]
            .as_str()
            .expect("message")
            .contains("register"));
    }
}
