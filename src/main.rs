mod commands;
mod config;
mod platform;
mod relay;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::PrefixCommands;
use crate::config::Config;
use crate::platform::discord::DiscordHandler;
use crate::platform::line::webhook::LineWebhook;
use crate::platform::line::LineClient;
use crate::relay::bridge::{ChannelBinding, CrossContextBridge};
use crate::relay::discord_inbound::DiscordToLine;
use crate::relay::identity::IdentityResolver;
use crate::relay::line_inbound::LineToDiscord;
use crate::relay::registry::{RecipientTarget, Recipients, TargetRegistry};
use crate::server::WebhookState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,linecord=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration: explicit path, then ./config.toml, then environment
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::load(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None if PathBuf::from("config.toml").exists() => {
            info!("Loading configuration from: config.toml");
            Config::load(&PathBuf::from("config.toml"))?
        }
        None => {
            if dotenvy::dotenv().is_ok() {
                info!("Loaded variables from .env");
            }
            info!("Loading configuration from environment");
            Config::from_env()?
        }
    };

    info!("Configuration loaded successfully");
    info!("  Discord channel: {}", config.discord.channel_id);
    info!("  Command prefix: {}", config.discord.command_prefix);
    match &config.line.target_id {
        Some(id) => info!("  LINE recipients: fixed ({})", id),
        None => info!("  LINE recipients: everyone who messages the bot"),
    }
    info!("  Webhook: {}", config.server.bind_address());

    // Shared relay state
    let channel = ChannelBinding(config.discord.channel_id);
    let recipients = match &config.line.target_id {
        Some(id) => Recipients::Fixed(RecipientTarget::from_id(id.clone())),
        None => Recipients::Registry(Arc::new(TargetRegistry::new())),
    };
    let line = Arc::new(LineClient::new(&config.line));
    let (bridge, bridge_rx) = CrossContextBridge::channel();

    let line_to_discord = Arc::new(LineToDiscord::new(
        channel,
        recipients.clone(),
        IdentityResolver::new(line.clone()),
        bridge,
    ));
    let discord_to_line = Arc::new(DiscordToLine::new(
        channel,
        recipients,
        line,
        config.discord.relay_bot_messages,
    ));

    // LINE webhook server
    let webhook_state = WebhookState {
        webhook: LineWebhook::new(config.line.channel_secret.clone()),
        relay: line_to_discord,
    };
    let listener = server::bind(&config.server.bind_address()).await?;
    let webhook = server::serve(listener, webhook_state);

    // Run the Discord bot
    info!("Bot is starting...");
    let handler = DiscordHandler::new(
        discord_to_line,
        Arc::new(PrefixCommands::new(config.discord.command_prefix.clone())),
    );
    let discord = platform::discord::run(&config.discord.bot_token, handler, bridge_rx);

    // Either half stopping takes the whole relay down
    tokio::select! {
        result = webhook => result.context("Webhook server stopped"),
        result = discord => result.context("Discord bot stopped"),
    }
}
