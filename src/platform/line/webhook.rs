use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::warn;

use crate::relay::error::RelayError;
use crate::relay::registry::{RecipientTarget, TargetKind};

/// Header LINE puts the body signature in
pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// Verifies and decodes LINE webhook deliveries.
#[derive(Clone)]
pub struct LineWebhook {
    channel_secret: String,
}

impl LineWebhook {
    pub fn new(channel_secret: impl Into<String>) -> Self {
        Self {
            channel_secret: channel_secret.into(),
        }
    }

    /// Check `signature` (base64 HMAC-SHA256 of the body keyed by the channel
    /// secret). Comparison is constant-time.
    pub fn verify_signature(&self, body: &[u8], signature: &str) -> bool {
        let sig_bytes = match base64::engine::general_purpose::STANDARD.decode(signature.trim()) {
            Ok(b) => b,
            Err(_) => {
                warn!("LINE webhook: invalid base64 in signature header");
                return false;
            }
        };

        let mut mac = match Hmac::<Sha256>::new_from_slice(self.channel_secret.as_bytes()) {
            Ok(m) => m,
            Err(_) => {
                warn!("LINE webhook: failed to create HMAC instance");
                return false;
            }
        };
        mac.update(body);
        mac.verify_slice(&sig_bytes).is_ok()
    }

    /// Verify then decode a delivery in one step
    pub fn parse(&self, body: &[u8], signature: Option<&str>) -> Result<Vec<LineEvent>, RelayError> {
        match signature {
            Some(sig) if self.verify_signature(body, sig) => {}
            _ => return Err(RelayError::InvalidSignature),
        }
        let payload: WebhookPayload = serde_json::from_slice(body)?;
        Ok(payload.events)
    }
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    events: Vec<LineEvent>,
}

/// A single webhook event. Only the variants the relay cares about are
/// decoded in detail; everything else lands in `Other`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LineEvent {
    Message {
        source: SourceEntity,
        message: EventMessage,
    },
    #[serde(other)]
    Other,
}

/// Where a LINE event came from
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SourceEntity {
    User {
        #[serde(rename = "userId")]
        user_id: String,
    },
    Group {
        #[serde(rename = "groupId")]
        group_id: String,
        /// Absent when the member has not consented to sharing their profile
        #[serde(rename = "userId", default)]
        user_id: Option<String>,
    },
    Room {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "userId", default)]
        user_id: Option<String>,
    },
}

impl SourceEntity {
    /// The id a reply to this event would be pushed to
    pub fn target(&self) -> RecipientTarget {
        match self {
            SourceEntity::User { user_id } => RecipientTarget::new(user_id.clone(), TargetKind::User),
            SourceEntity::Group { group_id, .. } => {
                RecipientTarget::new(group_id.clone(), TargetKind::Group)
            }
            SourceEntity::Room { room_id, .. } => RecipientTarget::new(room_id.clone(), TargetKind::Room),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventMessage {
    Text { text: String },
    #[serde(other)]
    Other,
}
