use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serenity::all::{ChannelId, Client, Context, EventHandler, GatewayIntents, Http, Message, Ready};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::commands::CommandProcessor;
use crate::relay::bridge::{run_dispatcher, BridgeReceiver, ChannelSender};
use crate::relay::discord_inbound::{DiscordToLine, FanOutReport, ObservedMessage};
use crate::relay::error::RelayError;

/// Posts relayed LINE messages through Discord's REST API
pub struct DiscordHttp {
    http: Arc<Http>,
}

impl DiscordHttp {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ChannelSender for DiscordHttp {
    async fn send_text(&self, channel_id: u64, text: &str) -> Result<(), RelayError> {
        ChannelId::new(channel_id)
            .say(&self.http, text)
            .await
            .map(|_| ())
            .map_err(|e| match &e {
                serenity::Error::Http(http_err)
                    if http_err.status_code().map(|s| s.as_u16()) == Some(404) =>
                {
                    RelayError::MissingChannel(channel_id)
                }
                _ => RelayError::Delivery {
                    target: channel_id.to_string(),
                    reason: e.to_string(),
                },
            })
    }
}

/// Gateway event handler: relays channel messages to LINE, then runs commands
pub struct DiscordHandler {
    relay: Arc<DiscordToLine>,
    commands: Arc<dyn CommandProcessor>,
}

/// What handling one Discord message started and produced
pub struct Dispatched {
    /// Running LINE fan-out, when the message was relayed
    pub fan_out: Option<JoinHandle<FanOutReport>>,
    /// Command reply to post back in the channel
    pub reply: Option<String>,
}

impl DiscordHandler {
    pub fn new(relay: Arc<DiscordToLine>, commands: Arc<dyn CommandProcessor>) -> Self {
        Self { relay, commands }
    }

    /// Relay first, then run commands. Commands run whatever the relay
    /// decided and never wait on the fan-out.
    pub async fn dispatch(&self, observed: &ObservedMessage) -> Dispatched {
        let fan_out = self.relay.handle(observed);
        let reply = self.commands.process(observed).await;
        Dispatched { fan_out, reply }
    }
}

fn observe(ctx: &Context, msg: &Message) -> ObservedMessage {
    let author_display_name = msg
        .member
        .as_ref()
        .and_then(|m| m.nick.clone())
        .unwrap_or_else(|| msg.author.display_name().to_string());

    ObservedMessage {
        channel_id: msg.channel_id.get(),
        author_display_name,
        author_is_self: msg.author.id == ctx.cache.current_user().id,
        author_is_bot: msg.author.bot,
        content: msg.content.clone(),
    }
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("Discord bot connected as {} ({})", ready.user.name, ready.user.id);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let observed = observe(&ctx, &msg);

        let dispatched = self.dispatch(&observed).await;
        if dispatched.fan_out.is_some() {
            debug!(message_id = %msg.id, "Discord message handed to LINE fan-out");
        }

        if let Some(reply) = dispatched.reply {
            if let Err(e) = msg.channel_id.say(&ctx.http, reply).await {
                warn!("Failed to send command reply: {}", e);
            }
        }
    }
}

pub fn gateway_intents() -> GatewayIntents {
    GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
}

/// Run the Discord platform: the gateway client plus the dispatcher that
/// drains the bridge. Returns when the gateway connection ends.
pub async fn run(token: &str, handler: DiscordHandler, bridge_rx: BridgeReceiver) -> Result<()> {
    info!("Starting Discord platform...");

    let mut client = Client::builder(token, gateway_intents())
        .event_handler(handler)
        .await
        .context("Failed to create Discord client")?;

    let sender = Arc::new(DiscordHttp::new(client.http.clone()));
    tokio::spawn(run_dispatcher(bridge_rx, sender));

    if let Err(e) = client.start().await {
        error!("Discord client stopped: {}", e);
        return Err(e).context("Discord gateway error");
    }
    Ok(())
}
