//! The tool call surface.
//!
//! Every tool is an async operation taking the typed [`RequestContext`] plus
//! the whitespace-split arguments that followed the command, and returning a
//! JSON envelope string `{"status", "message"?, "data"?}`. Tools never
//! fail: every error is caught and rendered as a `status = "error"`
//! envelope with a user-safe message.
//!
//! Tools are registered through the explicit [`manifest`], not discovered.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use crate::types::{KickAiError, RequestContext};

pub mod attendance;
pub mod communication;
pub mod help;
pub mod manifest;
pub mod matches;
pub mod player;
pub mod system;
pub mod team;

/// A named async operation callable by an agent.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Execute the tool. Must not fail; application-level failure goes in
    /// the envelope.
    async fn run(&self, ctx: &RequestContext, args: &[String]) -> String;
}

// ---------------------------------------------------------------------------
// Envelope helpers
// ---------------------------------------------------------------------------

/// Success envelope with structured data.
pub fn success(data: Value) -> String {
    json!({ "status": "success", "data": data }).to_string()
}

/// Success envelope carrying only a message.
pub fn success_message(message: impl Into<String>) -> String {
    success(json!({ "message": message.into() }))
}

/// Error envelope.
pub fn error(message: impl Into<String>) -> String {
    json!({ "status": "error", "message": message.into() }).to_string()
}

/// Render a typed error as a user-safe error envelope, logging the detail.
pub fn render_error(tool_id: &str, err: &KickAiError) -> String {
    warn!(tool = tool_id, error = %err, "tool returned error envelope");
    error(err.user_message())
}

/// Convert a tool body's result into an envelope string.
pub fn envelope(tool_id: &str, result: Result<Value, KickAiError>) -> String {
    match result {
        Ok(data) => success(data),
        Err(err) => render_error(tool_id, &err),
    }
}

/// Whether an envelope string carries the internal contact-button flag.
///
/// The transport attaches a contact-request keyboard when a tool sets
/// `_needs_contact_button` in its data; the formatter suppresses the field.
pub fn needs_contact_button(reply: &str) -> bool {
    serde_json::from_str::<Value>(reply)
        .ok()
        .and_then(|v| {
            v.pointer("/data/_needs_contact_button")
                .and_then(Value::as_bool)
        })
        .unwrap_or(false)
}
