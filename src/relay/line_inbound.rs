use tracing::{debug, error, info};

use crate::platform::line::webhook::{EventMessage, LineEvent};
use crate::platform::{RelayMessage, SourcePlatform};
use crate::relay::bridge::{ChannelBinding, CrossContextBridge};
use crate::relay::identity::IdentityResolver;
use crate::relay::registry::Recipients;

/// LINE → Discord half of the relay. Runs inside webhook handlers.
pub struct LineToDiscord {
    channel: ChannelBinding,
    recipients: Recipients,
    resolver: IdentityResolver,
    bridge: CrossContextBridge,
}

impl LineToDiscord {
    pub fn new(
        channel: ChannelBinding,
        recipients: Recipients,
        resolver: IdentityResolver,
        bridge: CrossContextBridge,
    ) -> Self {
        Self {
            channel,
            recipients,
            resolver,
            bridge,
        }
    }

    /// Handle every event of one webhook delivery, in payload order
    pub async fn handle_events(&self, events: &[LineEvent]) {
        for event in events {
            self.handle_event(event).await;
        }
    }

    /// Relay one event. Text messages are forwarded; everything else is
    /// ignored. Never fails: lookup and bridge errors are only logged.
    pub async fn handle_event(&self, event: &LineEvent) -> Option<RelayMessage> {
        let (source, text) = match event {
            LineEvent::Message {
                source,
                message: EventMessage::Text { text },
            } => (source, text),
            other => {
                debug!("Ignoring LINE event: {:?}", other);
                return None;
            }
        };

        self.recipients.register(source.target()).await;

        let display_name = self.resolver.resolve(source).await;
        info!("LINE message from {} ({:?}): {}", display_name, source, text);

        let message = RelayMessage::new(SourcePlatform::Line, display_name, text.clone());
        if let Err(e) = self
            .bridge
            .submit(message.relay_id, self.channel, message.render())
        {
            error!(relay_id = %message.relay_id, "Could not hand message to Discord: {}", e);
        }
        Some(message)
    }
}
