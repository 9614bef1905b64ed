mod bot;
mod catalog;
mod config;
mod db;
mod report;
mod scheduler;
mod utils;

use crate::bot::{Command, Dispatcher, PollSettings, TelegramSource};
use crate::catalog::{Blacklist, ReplyCatalog};
use crate::config::Config;
use crate::db::repo::Repo;
use crate::report::{AnswerPolicy, ConversationEngine, RateLimiter};
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize variables
    let log_level = config.log_level();
    let log_dir = &config.logging.dir;

    // Create log directory if it doesn't exist
    std::fs::create_dir_all(log_dir)?;

    // Setup file appender (daily rotation)
    let file_appender = tracing_appender::rolling::daily(log_dir, "sightingbot.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Use local time for log timestamps
    let local_timer = ChronoLocal::rfc_3339();

    // Setup stdout layer with local time
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_line_number(true)
        .with_file(true)
        .with_target(false)
        .with_timer(local_timer.clone());

    // Setup file layer with local time
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_timer(local_timer)
        .with_writer(non_blocking);

    // Filter layer based on config
    let filter_layer = EnvFilter::from_default_env()
        .add_directive(log_level.into())
        .add_directive("sqlx=warn".parse::<Directive>()?)
        .add_directive("sea_orm=warn".parse::<Directive>()?)
        .add_directive("reqwest=warn".parse::<Directive>()?)
        .add_directive("hyper=warn".parse::<Directive>()?);

    // Combine layers
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    info!("Starting SightingBot...");
    info!("Logs are written to: {}", log_dir);

    // Load reply catalog and blacklist
    let catalog = Arc::new(ReplyCatalog::load(&config.catalog.replies_path)?);
    let question_count = catalog.questions().len();
    if question_count != config.report.fields.len() {
        bail!(
            "Reply catalog has {} questions but report.fields names {} columns ({})",
            question_count,
            config.report.fields.len(),
            config.report.fields.join(", ")
        );
    }
    info!(
        "✅ Reply catalog loaded: {} categories, {} questions",
        catalog.len(),
        question_count
    );

    let blacklist = Blacklist::load(&config.catalog.blacklist_path)?;
    info!("✅ Blacklist loaded: {} users", blacklist.len());

    // Connect to database
    db::ensure_sqlite_dir(&config.database.url)?;
    let db = db::establish_connection(&config.database.url).await?;
    info!("Database connection established");

    // Initialize repository
    let policy = AnswerPolicy::from_config(&config.report);
    let repo = Arc::new(Repo::new(
        db,
        config.database.table.clone(),
        config.report.fields.clone(),
        policy,
        config.report.recent_window_sec(),
    ));

    // Test database connection
    repo.ping().await?;
    info!("✅ Database ping successful");

    // Storage must be usable before any report is accepted
    repo.create_table()
        .await
        .context("Failed to initialize storage")?;
    info!("✅ Storage ready ({} records)", repo.count().await?);

    // Initialize Telegram Bot (HTTP timeout must outlast the long poll)
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(
            u64::from(config.telegram.poll_timeout_sec) + 15,
        ))
        .build()?;
    let mut bot = Bot::with_client(config.telegram.bot_token.clone(), client);
    if let Some(api_url) = &config.telegram.api_url {
        let url = url::Url::parse(api_url)
            .with_context(|| format!("Invalid telegram.api_url '{}'", api_url))?;
        bot = bot.set_api_url(url);
    }

    let me = bot.get_me().await.context("Failed to fetch bot info")?;
    let bot_username = me.user.username.clone().unwrap_or_default();
    info!("✅ Logged in as @{}", bot_username);

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to set bot commands: {:#}", e);
    }

    // Initialize conversation engine and dispatcher
    let engine = ConversationEngine::new(
        repo.clone(),
        catalog.clone(),
        blacklist,
        policy,
        RateLimiter::new(config.report.cooldown_sec),
    );
    let dispatcher = Dispatcher::new(engine, catalog, bot_username);
    info!("✅ Dispatcher initialized");

    // Spawn retention engine in background
    let retention = scheduler::RetentionEngine::new(
        repo.clone(),
        config.report.retention_sec(),
        config.report.retention_time()?,
    );
    let retention_handle = tokio::spawn(async move {
        retention.run().await;
    });

    info!("🤖 Starting Telegram Bot...");

    let settings = PollSettings::from(&config.telegram);
    let mut bot_handle = tokio::spawn(bot::run(TelegramSource::new(bot), dispatcher, settings));

    // Wait for shutdown signal
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
            info!("Received Ctrl+C, shutting down...");
        }
        result = &mut bot_handle => {
            if let Err(e) = result {
                error!("Polling loop stopped: {:?}", e);
            }
        }
    }

    // Abort tasks; open questionnaires are dropped
    bot_handle.abort();
    retention_handle.abort();

    info!("✅ Shutdown complete");
    Ok(())
}
