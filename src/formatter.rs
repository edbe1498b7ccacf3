//! Response formatting: tool JSON envelopes → plain chat text.
//!
//! The transport sends plain text only (rich markup is unreliable under the
//! plain-text fallback), so formatting happens once, here, at the
//! presentation edge. Non-JSON input passes through byte-for-byte.

use serde_json::Value;
use tracing::debug;

/// Fields treated as internal and never rendered.
fn is_internal(key: &str) -> bool {
    key.starts_with('_')
}

/// Converts structured tool results to plain-text chat replies.
#[derive(Debug, Clone)]
pub struct ResponseFormatter {
    bullet_limit: usize,
}

impl Default for ResponseFormatter {
    fn default() -> Self {
        Self { bullet_limit: 5 }
    }
}

impl ResponseFormatter {
    /// Create a formatter with the configured bullet-truncation limit.
    pub fn new(bullet_limit: usize) -> Self {
        Self { bullet_limit }
    }

    /// Format a reply for the transport.
    ///
    /// Input that is not JSON-shaped passes through unchanged.
    pub fn format(&self, message: &str) -> String {
        if !is_json_shaped(message) {
            return message.to_owned();
        }
        match serde_json::from_str::<Value>(message) {
            Ok(data) => self.smart_format(&data),
            Err(e) => {
                debug!(error = %e, "json-shaped reply failed to parse, passing through");
                message.to_owned()
            }
        }
    }

    fn smart_format(&self, data: &Value) -> String {
        match data {
            Value::Object(_) => self.format_object(data),
            Value::Array(items) => self.format_list(items),
            other => value_to_display(other),
        }
    }

    fn format_object(&self, data: &Value) -> String {
        match data.get("status").and_then(Value::as_str) {
            Some("error") => {
                let message = data
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown error");
                format!("❌ {message}")
            }
            Some("success") if data.get("data").is_some() => {
                self.format_success_data(data.get("data").unwrap_or(&Value::Null))
            }
            _ => self.format_fields(data),
        }
    }

    fn format_success_data(&self, data: &Value) -> String {
        match data {
            Value::String(text) => text.clone(),
            Value::Object(map) => {
                if let Some(message) = map.get("message").and_then(Value::as_str) {
                    let mut lines = vec![message.to_owned()];
                    let rest: Vec<String> = map
                        .iter()
                        .filter(|(k, _)| *k != "message" && !is_internal(k))
                        .map(|(k, v)| format!("{}: {}", format_key(k), self.format_value(v)))
                        .collect();
                    if !rest.is_empty() {
                        lines.push(String::new());
                        lines.extend(rest);
                    }
                    lines.join("\n")
                } else {
                    self.format_fields(data)
                }
            }
            Value::Array(items) => self.format_list(items),
            other => value_to_display(other),
        }
    }

    fn format_fields(&self, data: &Value) -> String {
        match data {
            Value::Object(map) => map
                .iter()
                .filter(|(k, _)| !is_internal(k))
                .map(|(k, v)| format!("{}: {}", format_key(k), self.format_value(v)))
                .collect::<Vec<_>>()
                .join("\n"),
            Value::Array(items) => self.format_list(items),
            other => value_to_display(other),
        }
    }

    fn format_value(&self, value: &Value) -> String {
        match value {
            Value::Bool(true) => "Yes".to_owned(),
            Value::Bool(false) => "No".to_owned(),
            Value::Null => "Not provided".to_owned(),
            Value::String(s) if s.is_empty() => "Not provided".to_owned(),
            Value::Array(items) => {
                if items.is_empty() {
                    return "None".to_owned();
                }
                let mut bullets: Vec<String> = items
                    .iter()
                    .take(self.bullet_limit)
                    .map(format_item_inline)
                    .collect();
                if items.len() > self.bullet_limit {
                    bullets.push("…".to_owned());
                }
                format!("\n  • {}", bullets.join("\n  • "))
            }
            Value::Object(map) => {
                let mut parts: Vec<String> = map
                    .iter()
                    .filter(|(k, _)| !is_internal(k))
                    .take(3)
                    .map(|(k, v)| format!("{}: {}", format_key(k), simple_value(v)))
                    .collect();
                if map.len() > 3 {
                    parts.push("…".to_owned());
                }
                parts.join(" | ")
            }
            other => value_to_display(other),
        }
    }

    fn format_list(&self, items: &[Value]) -> String {
        if items.is_empty() {
            return "No items found".to_owned();
        }
        items
            .iter()
            .map(|item| format!("• {}", format_item_inline(item)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Whether a trimmed string looks like a JSON object or array.
fn is_json_shaped(message: &str) -> bool {
    let trimmed = message.trim();
    (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'))
}

/// De-snake-case a key and upcase common acronyms.
fn format_key(key: &str) -> String {
    let titled = key
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    const ACRONYMS: [(&str, &str); 7] = [
        ("Id", "ID"),
        ("Url", "URL"),
        ("Api", "API"),
        ("Ui", "UI"),
        ("Uuid", "UUID"),
        ("Http", "HTTP"),
        ("Html", "HTML"),
    ];
    let mut result = titled;
    for (from, to) in ACRONYMS {
        result = result
            .split(' ')
            .map(|word| if word == from { to } else { word })
            .collect::<Vec<_>>()
            .join(" ");
    }
    result
}

/// One list item on one line.
fn format_item_inline(item: &Value) -> String {
    match item {
        Value::Object(map) => {
            const IDENTIFIERS: [&str; 6] =
                ["name", "title", "id", "player_id", "match_id", "team_id"];
            let main = IDENTIFIERS
                .iter()
                .find_map(|field| map.get(*field))
                .map(simple_value)
                .or_else(|| {
                    map.iter()
                        .find(|(k, _)| !is_internal(k))
                        .map(|(_, v)| simple_value(v))
                })
                .unwrap_or_else(|| "Unknown item".to_owned());

            const CONTEXT_FIELDS: [&str; 5] = ["status", "role", "position", "type", "state"];
            let extras: Vec<String> = CONTEXT_FIELDS
                .iter()
                .filter_map(|field| map.get(*field))
                .map(simple_value)
                .filter(|v| !v.is_empty() && v != "Not provided")
                .collect();

            if extras.is_empty() {
                main
            } else {
                format!("{main} ({})", extras.join(", "))
            }
        }
        other => simple_value(other),
    }
}

/// A value for inline display, no newlines.
fn simple_value(value: &Value) -> String {
    match value {
        Value::Bool(true) => "Yes".to_owned(),
        Value::Bool(false) => "No".to_owned(),
        Value::Null => "Not provided".to_owned(),
        Value::String(s) if s.is_empty() => "Not provided".to_owned(),
        Value::Array(items) if items.is_empty() => "None".to_owned(),
        Value::Array(items) => format!("({} items)", items.len()),
        Value::Object(map) if map.is_empty() => "None".to_owned(),
        Value::Object(map) => format!("({} items)", map.len()),
        other => value_to_display(other),
    }
}

fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn formatter() -> ResponseFormatter {
        ResponseFormatter::default()
    }

    #[test]
    fn test_non_json_passes_through_unchanged() {
        let input = "⚽ Active Players (2)\n• John Smith";
        assert_eq!(formatter().format(input), input);
        assert_eq!(formatter().format(""), "");
        assert_eq!(formatter().format("{not json"), "{not json");
    }

    #[test]
    fn test_error_envelope() {
        let input = json!({ "status": "error", "message": "X" }).to_string();
        assert_eq!(formatter().format(&input), "❌ X");
    }

    #[test]
    fn test_error_without_message() {
        let input = json!({ "status": "error" }).to_string();
        assert_eq!(formatter().format(&input), "❌ Unknown error");
    }

    #[test]
    fn test_success_with_message_and_fields() {
        let input = json!({
            "status": "success",
            "data": { "message": "M", "k": "V" }
        })
        .to_string();
        assert_eq!(formatter().format(&input), "M\n\nK: V");
    }

    #[test]
    fn test_success_with_string_data_passes_through() {
        let input = json!({ "status": "success", "data": "already text" }).to_string();
        assert_eq!(formatter().format(&input), "already text");
    }

    #[test]
    fn test_key_formatting_upcases_acronyms() {
        assert_eq!(format_key("player_id"), "Player ID");
        assert_eq!(format_key("profile_url"), "Profile URL");
        assert_eq!(format_key("api_key"), "API Key");
        assert_eq!(format_key("name"), "Name");
    }

    #[test]
    fn test_booleans_and_missing_values() {
        let input = json!({
            "status": "success",
            "data": { "message": "M", "active": true, "paid": false, "phone": null, "note": "" }
        })
        .to_string();
        let output = formatter().format(&input);
        assert!(output.contains("Active: Yes"));
        assert!(output.contains("Paid: No"));
        assert!(output.contains("Phone: Not provided"));
        assert!(output.contains("Note: Not provided"));
    }

    #[test]
    fn test_list_truncates_at_limit_with_sentinel() {
        let input = json!({
            "status": "success",
            "data": {
                "message": "Players",
                "names": ["a", "b", "c", "d", "e", "f", "g"]
            }
        })
        .to_string();
        let output = formatter().format(&input);
        let bullets = output.matches("• ").count();
        assert_eq!(bullets, 6, "five items plus the sentinel: {output}");
        assert!(output.contains("…"));
        assert!(!output.contains("• f"));
    }

    #[test]
    fn test_internal_fields_suppressed() {
        let input = json!({
            "status": "success",
            "data": { "message": "M", "_needs_contact_button": true, "k": "v" }
        })
        .to_string();
        let output = formatter().format(&input);
        assert!(!output.contains("Needs Contact"));
        assert!(output.contains("K: v"));
    }

    #[test]
    fn test_top_level_list_renders_bullets() {
        let input = json!([
            { "name": "John Smith", "status": "active", "position": "midfielder" },
            { "name": "Ben Bay" }
        ])
        .to_string();
        let output = formatter().format(&input);
        assert!(output.contains("• John Smith (active, midfielder)"));
        assert!(output.contains("• Ben Bay"));
    }

    #[test]
    fn test_custom_bullet_limit() {
        let input = json!({
            "status": "success",
            "data": { "message": "M", "items": ["a", "b", "c"] }
        })
        .to_string();
        let output = ResponseFormatter::new(2).format(&input);
        assert!(output.contains("…"));
        assert!(!output.contains("• c"));
    }
}
