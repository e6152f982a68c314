//! threadlock - Discord thread lock bot
//!
//! Locks threads on a trigger phrase, then either offers the locking
//! moderator a timed Delete/Keep prompt or deletes the thread after a short
//! countdown in designated auto-delete channels.

mod audit;
mod config;
mod error;
mod events;
mod gateway;
mod http;
mod metrics;
mod moderation;
mod security;
mod state;
mod telemetry;

use crate::audit::AuditLogger;
use crate::config::Config;
use crate::events::Handler;
use crate::gateway::discord::DiscordGateway;
use crate::moderation::Moderator;
use crate::state::{GuildConfigStore, UptimeStats};
use serenity::all::{Client, GatewayIntents};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is normal in production.
    let dotenv = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,serenity=warn")),
        )
        .with_target(true)
        .init();

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "threadlock.toml".to_string());

    let config = Config::load_or_default(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "configuration has {} error(s), see log above",
            errors.len()
        ));
    }

    info!(
        prefix = %config.bot.command_prefix,
        triggers = ?config.moderation.trigger_phrases,
        "Starting threadlock"
    );

    metrics::init();

    // Keep-alive sidecar
    if config.keepalive.port != 0 {
        let stats = Arc::new(UptimeStats::new());
        let port = config.keepalive.port;
        tokio::spawn(async move {
            http::run_keepalive_server(port, stats).await;
        });
    } else {
        warn!("Keep-alive server disabled");
    }

    let token = std::env::var(&config.bot.token_env).map_err(|_| {
        error!(variable = %config.bot.token_env, "Bot token not set");
        anyhow::anyhow!("environment variable {} is not set", config.bot.token_env)
    })?;

    let guild_config = Arc::new(GuildConfigStore::load(&config.moderation.guild_config_path));
    info!(
        roles = ?guild_config.authorized_roles(None),
        auto_delete_channels = guild_config.auto_delete_channels().len(),
        "Loaded guild configuration"
    );

    let audit = Arc::new(AuditLogger::new(&config.audit.path));
    info!(path = %audit.path().display(), "Recording thread actions");
    let gateway = Arc::new(DiscordGateway::new(Arc::new(
        serenity::http::Http::new(&token),
    )));
    let moderator = Arc::new(Moderator::new(
        gateway.clone(),
        guild_config,
        audit,
        &config.moderation.trigger_phrases,
    ));

    let handler = Handler::new(
        moderator,
        gateway,
        config.bot.command_prefix.clone(),
        config.bot.status_text.clone(),
    );

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS;

    let mut client = Client::builder(&token, intents)
        .event_handler(handler)
        .await?;

    info!("Connecting to Discord");
    if let Err(e) = client.start().await {
        error!(error = %e, "Discord client stopped");
        return Err(e.into());
    }

    Ok(())
}
