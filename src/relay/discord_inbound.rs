use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::platform::line::LineApi;
use crate::platform::{RelayMessage, SourcePlatform};
use crate::relay::bridge::ChannelBinding;
use crate::relay::registry::Recipients;

/// A Discord message as the relay sees it, stripped of gateway types
#[derive(Debug, Clone)]
pub struct ObservedMessage {
    pub channel_id: u64,
    pub author_display_name: String,
    /// Written by this bot, e.g. a LINE message it relayed into the channel
    pub author_is_self: bool,
    pub author_is_bot: bool,
    pub content: String,
}

/// What the filter chain decided for one Discord message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    SelfAuthored,
    OtherBot,
    OutOfScope,
    Relay,
}

/// Outcome of pushing one message to every LINE recipient
#[derive(Debug, Default)]
pub struct FanOutReport {
    pub delivered: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Discord → LINE half of the relay. Runs inside the gateway event handler.
pub struct DiscordToLine {
    channel: ChannelBinding,
    recipients: Recipients,
    line: Arc<dyn LineApi>,
    relay_bot_messages: bool,
}

impl DiscordToLine {
    pub fn new(
        channel: ChannelBinding,
        recipients: Recipients,
        line: Arc<dyn LineApi>,
        relay_bot_messages: bool,
    ) -> Self {
        Self {
            channel,
            recipients,
            line,
            relay_bot_messages,
        }
    }

    pub fn filter(&self, msg: &ObservedMessage) -> Disposition {
        if msg.author_is_self {
            Disposition::SelfAuthored
        } else if msg.author_is_bot && !self.relay_bot_messages {
            Disposition::OtherBot
        } else if msg.channel_id != self.channel.id() {
            Disposition::OutOfScope
        } else {
            Disposition::Relay
        }
    }

    /// Start relaying `msg` to LINE if it passes the filters.
    ///
    /// The fan-out runs on its own task so the gateway handler is never held
    /// up by LINE. The handle is only awaited in tests.
    pub fn handle(&self, msg: &ObservedMessage) -> Option<JoinHandle<FanOutReport>> {
        let disposition = self.filter(msg);
        if disposition != Disposition::Relay {
            debug!(channel_id = msg.channel_id, ?disposition, "Not relaying Discord message");
            return None;
        }

        info!(
            "Discord message from {} in {}: {}",
            msg.author_display_name, msg.channel_id, msg.content
        );

        let message = RelayMessage::new(
            SourcePlatform::Discord,
            msg.author_display_name.clone(),
            msg.content.clone(),
        );
        let recipients = self.recipients.clone();
        let line = self.line.clone();
        Some(tokio::spawn(fan_out(line, recipients, message)))
    }
}

/// Push `message` to every current recipient, one independent call each
async fn fan_out(
    line: Arc<dyn LineApi>,
    recipients: Recipients,
    message: RelayMessage,
) -> FanOutReport {
    let targets = recipients.snapshot().await;
    if targets.is_empty() {
        debug!(relay_id = %message.relay_id, "No LINE recipients registered yet");
        return FanOutReport::default();
    }

    let text = message.render();
    let sends = targets.iter().map(|target| {
        let line = line.clone();
        let text = text.as_str();
        async move { (target.id.clone(), line.push_text(&target.id, text).await) }
    });

    let mut report = FanOutReport::default();
    for (target_id, result) in join_all(sends).await {
        match result {
            Ok(()) => report.delivered.push(target_id),
            Err(e) => {
                warn!(relay_id = %message.relay_id, "LINE push to {} failed: {}", target_id, e);
                report.failed.push((target_id, e.to_string()));
            }
        }
    }

    let elapsed = Utc::now() - message.received_at;
    info!(
        relay_id = %message.relay_id,
        delivered = report.delivered.len(),
        elapsed_ms = elapsed.num_milliseconds(),
        failed = report.failed.len(),
        "Relayed Discord message to LINE"
    );
    report
}
