use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::relay::error::RelayError;

/// The Discord channel every relayed LINE message is posted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelBinding(pub u64);

impl ChannelBinding {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Anything that can post text to a Discord channel
#[async_trait]
pub trait ChannelSender: Send + Sync {
    async fn send_text(&self, channel_id: u64, text: &str) -> Result<(), RelayError>;
}

/// A post waiting to be sent on the Discord side
#[derive(Debug, Clone)]
pub struct OutboundPost {
    pub relay_id: Uuid,
    pub channel: ChannelBinding,
    pub text: String,
    pub submitted_at: DateTime<Utc>,
}

/// Hands Discord sends from webhook handlers to the Discord dispatcher.
///
/// `submit` never waits: the post is queued and the caller moves on. Posts
/// submitted concurrently may reach Discord in either order.
#[derive(Clone)]
pub struct CrossContextBridge {
    tx: mpsc::UnboundedSender<OutboundPost>,
}

/// Consumer end of the bridge, owned by the dispatcher task
pub struct BridgeReceiver {
    rx: mpsc::UnboundedReceiver<OutboundPost>,
}

impl BridgeReceiver {
    pub async fn recv(&mut self) -> Option<OutboundPost> {
        self.rx.recv().await
    }
}

impl CrossContextBridge {
    pub fn channel() -> (Self, BridgeReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, BridgeReceiver { rx })
    }

    /// Queue `text` for `channel`. Fails only if the dispatcher has stopped.
    pub fn submit(
        &self,
        relay_id: Uuid,
        channel: ChannelBinding,
        text: String,
    ) -> Result<(), RelayError> {
        let post = OutboundPost {
            relay_id,
            channel,
            text,
            submitted_at: Utc::now(),
        };
        self.tx.send(post).map_err(|_| RelayError::BridgeClosed)
    }
}

/// Drain the bridge, posting each queued message to Discord.
///
/// Each send runs on its own task; results are only logged. Returns once
/// every `CrossContextBridge` handle has been dropped.
pub async fn run_dispatcher(mut rx: BridgeReceiver, sender: Arc<dyn ChannelSender>) {
    info!("Discord dispatcher started");

    while let Some(post) = rx.recv().await {
        let sender = sender.clone();
        tokio::spawn(async move {
            deliver(sender.as_ref(), post).await;
        });
    }

    info!("Discord dispatcher stopped: all bridge handles dropped");
}

async fn deliver(sender: &dyn ChannelSender, post: OutboundPost) {
    let channel_id = post.channel.id();
    match sender.send_text(channel_id, &post.text).await {
        Ok(()) => {
            let waited = Utc::now() - post.submitted_at;
            debug!(
                relay_id = %post.relay_id,
                channel_id,
                latency_ms = waited.num_milliseconds(),
                "Relayed LINE message to Discord"
            );
        }
        Err(RelayError::MissingChannel(id)) => {
            error!(relay_id = %post.relay_id, "Discord channel {} not found, message dropped", id);
        }
        Err(e) => {
            warn!(relay_id = %post.relay_id, channel_id, "Discord send failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(u64, String)>>,
        fail_with_missing: bool,
        notify: Notify,
    }

    #[async_trait]
    impl ChannelSender for RecordingSender {
        async fn send_text(&self, channel_id: u64, text: &str) -> Result<(), RelayError> {
            let result = if self.fail_with_missing {
                Err(RelayError::MissingChannel(channel_id))
            } else {
                self.sent.lock().unwrap().push((channel_id, text.to_string()));
                Ok(())
            };
            self.notify.notify_one();
            result
        }
    }

    #[tokio::test]
    async fn test_submit_does_not_wait_for_delivery() {
        let (bridge, mut rx) = CrossContextBridge::channel();
        // Nobody is consuming yet, submission still returns immediately
        let id = Uuid::new_v4();
        bridge
            .submit(id, ChannelBinding(42), "📲 LINE(Alice): hi".to_string())
            .unwrap();

        let post = rx.recv().await.unwrap();
        assert_eq!(post.relay_id, id);
        assert_eq!(post.channel, ChannelBinding(42));
        assert_eq!(post.text, "📲 LINE(Alice): hi");
    }

    #[tokio::test]
    async fn test_submit_after_dispatcher_gone() {
        let (bridge, rx) = CrossContextBridge::channel();
        drop(rx);
        let err = bridge
            .submit(Uuid::new_v4(), ChannelBinding(1), "lost".to_string())
            .unwrap_err();
        assert!(matches!(err, RelayError::BridgeClosed));
    }

    #[tokio::test]
    async fn test_dispatcher_delivers_from_many_submitters() {
        let (bridge, rx) = CrossContextBridge::channel();
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = tokio::spawn(run_dispatcher(rx, sender.clone()));

        let mut submitters = Vec::new();
        for i in 0..8 {
            let bridge = bridge.clone();
            submitters.push(tokio::spawn(async move {
                bridge
                    .submit(Uuid::new_v4(), ChannelBinding(7), format!("msg {}", i))
                    .unwrap();
            }));
        }
        for s in submitters {
            s.await.unwrap();
        }

        tokio::time::timeout(Duration::from_secs(5), async {
            while sender.sent.lock().unwrap().len() < 8 {
                sender.notify.notified().await;
            }
        })
        .await
        .unwrap();

        let mut texts: Vec<String> = sender
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(channel, text)| {
                assert_eq!(*channel, 7);
                text.clone()
            })
            .collect();
        texts.sort();
        assert_eq!(texts.len(), 8);
        assert_eq!(texts[0], "msg 0");

        drop(bridge);
        tokio::time::timeout(Duration::from_secs(5), dispatcher)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_dispatcher_survives_missing_channel() {
        let (bridge, rx) = CrossContextBridge::channel();
        let sender = Arc::new(RecordingSender {
            fail_with_missing: true,
            ..Default::default()
        });
        let dispatcher = tokio::spawn(run_dispatcher(rx, sender.clone()));

        bridge
            .submit(Uuid::new_v4(), ChannelBinding(9), "one".to_string())
            .unwrap();
        bridge
            .submit(Uuid::new_v4(), ChannelBinding(9), "two".to_string())
            .unwrap();
        drop(bridge);

        tokio::time::timeout(Duration::from_secs(5), dispatcher)
            .await
            .unwrap()
            .unwrap();
        assert!(sender.sent.lock().unwrap().is_empty());
    }
}
