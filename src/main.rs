#![allow(missing_docs)]

//! KICKAI — Telegram assistant for amateur football team management.
//!
//! Single binary: builds the registries, runs the startup validator, and
//! opens the Telegram transport only when every critical check passed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};

use kickai::config::AppConfig;
use kickai::domain::services::InviteService;
use kickai::factories::ServiceFactory;
use kickai::formatter::ResponseFormatter;
use kickai::orchestration::intent::build_classifier;
use kickai::orchestration::OrchestrationPipeline;
use kickai::providers::build_provider;
use kickai::registry::Registries;
use kickai::router::{AgenticMessageRouter, ChatMap};
use kickai::startup::{CheckContext, StartupValidator};
use kickai::store::{DocumentStore, SqliteStore};
use kickai::telegram::run_telegram;
use kickai::tools::communication::Broadcast;

/// Channel buffer size for the outbound broadcast queue.
const BROADCAST_BUFFER_SIZE: usize = 100;

#[derive(Parser)]
#[command(name = "kickai", version, about = "Telegram assistant for amateur football teams")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the system and serve Telegram traffic.
    Start,
    /// Run the startup validator and exit with its status.
    Validate,
    /// Print the resolved configuration with secrets redacted.
    Config,
}

/// Everything `start` and `validate` need, wired once.
struct App {
    config: AppConfig,
    router: Arc<AgenticMessageRouter>,
    chat_map: ChatMap,
    check_ctx: Arc<CheckContext>,
    broadcasts_rx: mpsc::Receiver<Broadcast>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Start => {
            let _guard = kickai::logging::init_production(Path::new("logs"))?;
            start().await
        }
        Command::Validate => {
            kickai::logging::init_cli();
            validate_only().await
        }
        Command::Config => {
            kickai::logging::init_cli();
            print_config()
        }
    }
}

async fn start() -> Result<()> {
    info!("KICKAI starting");
    let config = AppConfig::load()?;
    let app = build_app(config).await?;

    let report = StartupValidator::new().validate(Arc::clone(&app.check_ctx)).await;
    eprintln!("{}", report.to_text());
    if !report.is_healthy() {
        // The exit code reflects only startup-validator outcomes.
        std::process::exit(1);
    }

    match app.config.telegram.bot_token.clone() {
        Some(token) => {
            run_telegram(&token, app.router, app.chat_map, app.broadcasts_rx).await
        }
        None => {
            info!("no telegram.bot_token configured — validated OK, exiting");
            Ok(())
        }
    }
}

async fn validate_only() -> Result<()> {
    let config = AppConfig::load()?;
    let app = build_app(config).await?;

    let report = StartupValidator::new().validate(Arc::clone(&app.check_ctx)).await;
    println!("{}", report.to_text());
    if !report.is_healthy() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_config() -> Result<()> {
    let config = AppConfig::load()?;
    let redact = |value: &str| {
        if value.is_empty() {
            "(unset)".to_owned()
        } else {
            "********".to_owned()
        }
    };
    println!("invite_secret_key = {}", redact(&config.invite_secret_key));
    println!("ai.provider = {}", config.ai.provider);
    println!("ai.base_url = {}", config.ai.base_url);
    println!(
        "ai.api_key = {}",
        redact(config.ai.api_key.as_deref().unwrap_or(""))
    );
    println!("ai.model = {}", config.ai.model);
    println!("ai.classifier = {}", config.ai.classifier);
    println!("database.project_id = {}", config.database.project_id);
    println!(
        "database.path = {}",
        config.database.resolved_path().display()
    );
    println!("telegram.team_id = {}", config.telegram.team_id);
    println!(
        "telegram.bot_token = {}",
        redact(config.telegram.bot_token.as_deref().unwrap_or(""))
    );
    println!(
        "limits.request_timeout_secs = {}",
        config.limits.request_timeout_secs
    );
    println!(
        "limits.formatter_bullet_limit = {}",
        config.limits.formatter_bullet_limit
    );
    Ok(())
}

/// Wire the store, factories, registries, pipeline, and router.
async fn build_app(config: AppConfig) -> Result<App> {
    let db_path: PathBuf = config.database.resolved_path();
    let store: Arc<dyn DocumentStore> = Arc::new(
        SqliteStore::open(&db_path)
            .await
            .with_context(|| format!("opening document store at {}", db_path.display()))?,
    );

    let services = Arc::new(ServiceFactory::new(Arc::clone(&store), &config.limits));
    let invites = Arc::new(InviteService::new(config.invite_secret_key.clone()));
    let provider = build_provider(&config.ai).context("building the LLM provider")?;
    let classifier = build_classifier(&config.ai, Arc::clone(&provider));

    let (broadcasts_tx, broadcasts_rx) = mpsc::channel(BROADCAST_BUFFER_SIZE);

    let registries = Arc::new(Registries::build(
        Arc::clone(&services),
        invites,
        broadcasts_tx,
        Arc::clone(&provider),
    )?);

    let pipeline = Arc::new(OrchestrationPipeline::new(
        Arc::clone(&registries),
        classifier,
    ));

    let team_id = config.telegram.team_id.clone();
    let chat_map = match services.teams().find(&team_id).await {
        Ok(Some(team)) => ChatMap {
            main_chat_id: team.main_chat_id,
            leadership_chat_id: team.leadership_chat_id,
        },
        Ok(None) => {
            warn!(team_id = %team_id, "team record not found — group chats will be treated as private");
            ChatMap {
                main_chat_id: String::new(),
                leadership_chat_id: String::new(),
            }
        }
        Err(e) => {
            warn!(error = %e, "could not read the team record — group chats will be treated as private");
            ChatMap {
                main_chat_id: String::new(),
                leadership_chat_id: String::new(),
            }
        }
    };

    let router = Arc::new(AgenticMessageRouter::new(
        team_id,
        chat_map.clone(),
        Arc::clone(&registries),
        pipeline,
        Arc::clone(&services),
        ResponseFormatter::new(config.limits.formatter_bullet_limit),
        config.request_timeout(),
    ));

    let check_ctx = Arc::new(CheckContext {
        config: config.clone(),
        registries,
        provider,
        store,
    });

    Ok(App {
        config,
        router,
        chat_map,
        check_ctx,
        broadcasts_rx,
    })
}
