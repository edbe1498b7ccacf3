//! Configuration loading and management.
//!
//! Loads KICKAI configuration from `./kickai.toml` (or `$KICKAI_CONFIG_PATH`).
//! Environment variables override file values; file values override defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::types::KickAiError;

/// Minimum length of the invite secret.
const INVITE_SECRET_MIN_CHARS: usize = 10;

// ── Top-level config ────────────────────────────────────────────

/// Top-level KICKAI configuration loaded from TOML.
///
/// Path: `./kickai.toml` or `$KICKAI_CONFIG_PATH`.
/// Env vars override file values; file values override defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Secret used to sign invite links. Required, at least 10 characters.
    pub invite_secret_key: String,
    /// LLM provider settings (`[ai]`).
    pub ai: AiConfig,
    /// Document store settings (`[database]`).
    pub database: DatabaseConfig,
    /// Telegram transport settings (`[telegram]`).
    pub telegram: TelegramConfig,
    /// Tunable bounds and timeouts (`[limits]`).
    pub limits: LimitsConfig,
}

impl AppConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// Config file path: `$KICKAI_CONFIG_PATH` or `./kickai.toml`.
    /// If the file does not exist, defaults are used.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from TOML file only, no env overrides.
    fn load_from_file() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                let config: AppConfig =
                    toml::from_str(&contents).context("failed to parse config TOML")?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no config file found, using defaults");
                Ok(AppConfig::default())
            }
            Err(e) => Err(anyhow::anyhow!("failed to read config file: {e}")),
        }
    }

    /// Resolve config path using a custom env resolver (for testing).
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        env("KICKAI_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("kickai.toml"))
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability.
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("KICKAI_INVITE_SECRET_KEY") {
            self.invite_secret_key = v;
        }
        if let Some(v) = env("KICKAI_AI_PROVIDER") {
            match v.parse() {
                Ok(p) => self.ai.provider = p,
                Err(_) => tracing::warn!(
                    var = "KICKAI_AI_PROVIDER",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("KICKAI_AI_BASE_URL") {
            self.ai.base_url = v;
        }
        if let Some(v) = env("KICKAI_AI_API_KEY") {
            self.ai.api_key = Some(v);
        }
        if let Some(v) = env("KICKAI_AI_MODEL") {
            self.ai.model = v;
        }
        if let Some(v) = env("KICKAI_AI_CLASSIFIER") {
            self.ai.classifier = v;
        }
        if let Some(v) = env("KICKAI_DB_PROJECT_ID") {
            self.database.project_id = v;
        }
        if let Some(v) = env("KICKAI_DB_PATH") {
            self.database.path = Some(PathBuf::from(v));
        }
        if let Some(v) = env("KICKAI_BOT_TOKEN") {
            self.telegram.bot_token = Some(v);
        }
        if let Some(v) = env("KICKAI_TEAM_ID") {
            self.telegram.team_id = v;
        }
        if let Some(v) = env("KICKAI_REQUEST_TIMEOUT_SECS") {
            match v.parse() {
                Ok(n) => self.limits.request_timeout_secs = n,
                Err(_) => tracing::warn!(
                    var = "KICKAI_REQUEST_TIMEOUT_SECS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
    }

    /// Parse a TOML string into config (for testing).
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }

    /// Validate the essential fields the startup validator gates on.
    ///
    /// Returns every problem found, so the validator can report them all at
    /// once instead of failing on the first.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.invite_secret_key.trim().is_empty() {
            problems.push("invite_secret_key is not set".to_owned());
        } else if self.invite_secret_key.chars().count() < INVITE_SECRET_MIN_CHARS {
            problems.push(format!(
                "invite_secret_key must be at least {INVITE_SECRET_MIN_CHARS} characters"
            ));
        }

        if url::Url::parse(&self.ai.base_url).is_err() {
            problems.push(format!("ai.base_url is not a valid URL: {}", self.ai.base_url));
        }

        if self.ai.requires_api_key() && self.ai.api_key.as_deref().unwrap_or("").is_empty() {
            problems.push(format!(
                "ai.api_key is required for the {} provider",
                self.ai.provider
            ));
        }

        if self.database.project_id.trim().is_empty() {
            problems.push("database.project_id must not be empty".to_owned());
        }

        if self.telegram.team_id.trim().is_empty() {
            problems.push("telegram.team_id must not be empty".to_owned());
        }

        problems
    }

    /// The request-wide timeout enforced by the router.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.limits.request_timeout_secs)
    }
}

// ── AI config ───────────────────────────────────────────────────

/// Which LLM backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local Ollama server.
    Ollama,
    /// OpenAI chat completions API.
    OpenAi,
    /// Google Generative Language API.
    Google,
    /// Deterministic in-process mock, for tests and offline runs.
    Mock,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => f.write_str("ollama"),
            Self::OpenAi => f.write_str("openai"),
            Self::Google => f.write_str("google"),
            Self::Mock => f.write_str("mock"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = KickAiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            "google" => Ok(Self::Google),
            "mock" => Ok(Self::Mock),
            other => Err(KickAiError::validation(
                "ai.provider",
                format!("unknown provider: {other}"),
            )),
        }
    }
}

/// LLM provider configuration (`[ai]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Provider backend.
    pub provider: ProviderKind,
    /// Base URL of the provider endpoint.
    pub base_url: String,
    /// API key, required for openai and google.
    pub api_key: Option<String>,
    /// Model identifier passed to the provider.
    pub model: String,
    /// Intent classifier selection: `keyword` or `llm`.
    pub classifier: String,
}

impl AiConfig {
    /// Whether this provider cannot be called without an API key.
    pub fn requires_api_key(&self) -> bool {
        matches!(self.provider, ProviderKind::OpenAi | ProviderKind::Google)
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Mock,
            base_url: "http://localhost:11434".to_owned(),
            api_key: None,
            model: "llama3.1".to_owned(),
            classifier: "keyword".to_owned(),
        }
    }
}

// ── Database config ─────────────────────────────────────────────

/// Document store configuration (`[database]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Logical project namespace; required non-empty.
    pub project_id: String,
    /// SQLite file path; defaults to the platform data directory.
    pub path: Option<PathBuf>,
}

impl DatabaseConfig {
    /// Resolve the SQLite file path, falling back to the platform data dir.
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        directories::ProjectDirs::from("", "", "kickai")
            .map(|dirs| dirs.data_dir().join("kickai.db"))
            .unwrap_or_else(|| PathBuf::from("kickai.db"))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            path: None,
        }
    }
}

// ── Telegram config ─────────────────────────────────────────────

/// Telegram transport configuration (`[telegram]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token; absent means the transport does not start.
    pub bot_token: Option<String>,
    /// The tenant this bot instance serves.
    pub team_id: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            team_id: "KAI".to_owned(),
        }
    }
}

// ── Limits config ───────────────────────────────────────────────

/// Tunable bounds and timeouts (`[limits]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Request-wide timeout in seconds.
    pub request_timeout_secs: u64,
    /// Maximum bullet items the formatter renders before truncating.
    pub formatter_bullet_limit: usize,
    /// Maximum cached service instances.
    pub service_cache_size: usize,
    /// Service cache TTL in seconds.
    pub service_cache_ttl_secs: u64,
    /// Maximum cached repository instances.
    pub repository_cache_size: usize,
    /// Repository cache TTL in seconds.
    pub repository_cache_ttl_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            formatter_bullet_limit: 5,
            service_cache_size: 100,
            service_cache_ttl_secs: 3600,
            repository_cache_size: 50,
            repository_cache_ttl_secs: 1800,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fail_validation_without_secrets() {
        let config = AppConfig::default();
        let problems = config.validate();
        assert!(problems.iter().any(|p| p.contains("invite_secret_key")));
        assert!(problems.iter().any(|p| p.contains("project_id")));
    }

    #[test]
    fn test_short_secret_rejected() {
        let config = AppConfig::from_toml(
            r#"
            invite_secret_key = "short"
            [database]
            project_id = "kickai-prod"
            "#,
        )
        .expect("parse");
        let problems = config.validate();
        assert!(problems.iter().any(|p| p.contains("at least 10")));
    }

    #[test]
    fn test_valid_config_passes() {
        let config = AppConfig::from_toml(
            r#"
            invite_secret_key = "super-secret-key"
            [ai]
            provider = "mock"
            [database]
            project_id = "kickai-prod"
            "#,
        )
        .expect("parse");
        assert!(config.validate().is_empty(), "{:?}", config.validate());
    }

    #[test]
    fn test_api_key_required_for_openai() {
        let config = AppConfig::from_toml(
            r#"
            invite_secret_key = "super-secret-key"
            [ai]
            provider = "openai"
            base_url = "https://api.openai.com"
            [database]
            project_id = "kickai-prod"
            "#,
        )
        .expect("parse");
        let problems = config.validate();
        assert!(problems.iter().any(|p| p.contains("api_key")));
    }

    #[test]
    fn test_env_overrides_take_precedence() {
        let mut config = AppConfig::from_toml(
            r#"
            invite_secret_key = "from-the-file"
            "#,
        )
        .expect("parse");
        config.apply_overrides(|key| match key {
            "KICKAI_INVITE_SECRET_KEY" => Some("from-the-env".to_owned()),
            "KICKAI_AI_PROVIDER" => Some("ollama".to_owned()),
            "KICKAI_REQUEST_TIMEOUT_SECS" => Some("5".to_owned()),
            _ => None,
        });
        assert_eq!(config.invite_secret_key, "from-the-env");
        assert_eq!(config.ai.provider, ProviderKind::Ollama);
        assert_eq!(config.limits.request_timeout_secs, 5);
    }

    #[test]
    fn test_invalid_env_override_ignored() {
        let mut config = AppConfig::default();
        config.apply_overrides(|key| match key {
            "KICKAI_AI_PROVIDER" => Some("skynet".to_owned()),
            _ => None,
        });
        assert_eq!(config.ai.provider, ProviderKind::Mock);
    }

    #[test]
    fn test_limit_defaults() {
        let limits = LimitsConfig::default();
        assert_eq!(limits.request_timeout_secs, 30);
        assert_eq!(limits.formatter_bullet_limit, 5);
        assert_eq!(limits.service_cache_size, 100);
        assert_eq!(limits.service_cache_ttl_secs, 3600);
        assert_eq!(limits.repository_cache_size, 50);
        assert_eq!(limits.repository_cache_ttl_secs, 1800);
    }
}
