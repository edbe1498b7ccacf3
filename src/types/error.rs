//! Typed error taxonomy with structured context.
//!
//! Domain services return these; the tool layer renders them as user-safe
//! envelope strings; pipeline stages convert any remaining failure into a
//! failed step result. Programming errors indicate a startup-order bug and
//! are never reached once the process is serving.

use thiserror::Error;

/// Every failure class in the system, with enough context to log usefully.
#[derive(Debug, Error)]
pub enum KickAiError {
    /// Invalid input shape, missing required field, wrong format.
    #[error("validation failed for {field}: {reason}")]
    Validation {
        /// The offending field or argument.
        field: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Entity not found. `hint` lists alternative lookup keys when known.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Entity kind ("player", "team member", "match", ...).
        entity: &'static str,
        /// The key that missed.
        key: String,
        /// Alternative lookup keys to suggest to the user.
        hint: Option<String>,
    },

    /// Duplicate registration or already-exists.
    #[error("{entity} already exists: {key}")]
    Conflict {
        /// Entity kind.
        entity: &'static str,
        /// The conflicting key.
        key: String,
    },

    /// Caller lacks the needed role.
    #[error("permission denied: {action}")]
    PermissionDenied {
        /// The attempted action, for logs only.
        action: String,
    },

    /// A required collaborator (LLM, database, registry) is down.
    #[error("{service} unavailable: {reason}")]
    ServiceUnavailable {
        /// Collaborator name.
        service: &'static str,
        /// Underlying failure.
        reason: String,
    },

    /// A persisted record failed schema validation on read.
    #[error("corrupt record {collection}/{id}: {reason}")]
    DataCorruption {
        /// Collection the record came from.
        collection: String,
        /// Document id.
        id: String,
        /// What failed to parse.
        reason: String,
    },

    /// A startup-order bug: registry read before initialization, agent
    /// referencing an unknown tool. Fail-fast at startup.
    #[error("programming error: {0}")]
    Programming(String),
}

impl KickAiError {
    /// Shorthand for a validation error.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a not-found error without lookup hints.
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
            hint: None,
        }
    }

    /// Shorthand for a service-unavailable error.
    pub fn unavailable(service: &'static str, reason: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            service,
            reason: reason.into(),
        }
    }

    /// Render a message safe to show in chat.
    ///
    /// Permission and availability failures never leak system detail.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { field, reason } => format!("Invalid {field}: {reason}"),
            Self::NotFound { entity, key, hint } => match hint {
                Some(h) => format!("No {entity} found for '{key}'. Try looking up by {h}."),
                None => format!("No {entity} found for '{key}'."),
            },
            Self::Conflict { entity, key } => {
                format!("A {entity} with '{key}' already exists.")
            }
            Self::PermissionDenied { .. } => {
                "Access Denied. You don't have permission for that. Contact your team leadership."
                    .to_owned()
            }
            Self::ServiceUnavailable { .. } => {
                "Sorry, I'm unable to process your request at the moment. Please try again later."
                    .to_owned()
            }
            Self::DataCorruption { .. } => {
                "Sorry, something went wrong reading your team's data. The issue has been reported."
                    .to_owned()
            }
            Self::Programming(_) => {
                "Sorry, I encountered an internal error. Please try again later.".to_owned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_message_hides_detail() {
        let err = KickAiError::PermissionDenied {
            action: "approve player via /approve".to_owned(),
        };
        let msg = err.user_message();
        assert!(!msg.contains("approve"), "scripted message must not leak the action");
        assert!(msg.contains("Access Denied"));
    }

    #[test]
    fn test_not_found_hint_is_surfaced() {
        let err = KickAiError::NotFound {
            entity: "player",
            key: "JS9".to_owned(),
            hint: Some("phone number or player id".to_owned()),
        };
        assert!(err.user_message().contains("phone number or player id"));
    }

    #[test]
    fn test_unavailable_message_is_generic() {
        let err = KickAiError::unavailable("llm", "connection refused on :11434");
        assert!(!err.user_message().contains("11434"));
    }
}
