//! System diagnostics tools.

use async_trait::async_trait;
use serde_json::json;

use crate::tools::{success, success_message, Tool};
use crate::types::RequestContext;

/// `/ping` — liveness check.
pub struct PingTool;

#[async_trait]
impl Tool for PingTool {
    async fn run(&self, _ctx: &RequestContext, _args: &[String]) -> String {
        success_message("🏓 Pong! All systems operational.")
    }
}

/// `/version` — build information.
pub struct VersionTool;

#[async_trait]
impl Tool for VersionTool {
    async fn run(&self, _ctx: &RequestContext, _args: &[String]) -> String {
        success(json!({
            "message": "🤖 KICKAI",
            "version": env!("CARGO_PKG_VERSION"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatType, UserPermissions};
    use serde_json::Value;

    #[tokio::test]
    async fn test_ping_and_version() {
        let ctx = RequestContext::from_command(
            1,
            "KAI",
            "c",
            ChatType::Main,
            "/ping",
            "u",
            "U",
            UserPermissions::default(),
        )
        .expect("ctx");

        let pong = PingTool.run(&ctx, &[]).await;
        assert!(pong.contains("Pong"));

        let version = VersionTool.run(&ctx, &[]).await;
        let parsed: Value = serde_json::from_str(&version).expect("json");
        assert_eq!(parsed["data"]["version"], env!("CARGO_PKG_VERSION"));
    }
}
