use std::sync::Arc;

use tracing::warn;

use crate::platform::line::webhook::SourceEntity;
use crate::platform::line::LineApi;
use crate::relay::error::RelayError;

/// Display name used when the sender's profile cannot be fetched
pub const UNKNOWN_SENDER: &str = "Unknown";

/// Turns the source of a LINE event into a human-readable sender name
#[derive(Clone)]
pub struct IdentityResolver {
    line: Arc<dyn LineApi>,
}

impl IdentityResolver {
    pub fn new(line: Arc<dyn LineApi>) -> Self {
        Self { line }
    }

    /// Never fails: any lookup error is logged and replaced by `"Unknown"`.
    pub async fn resolve(&self, source: &SourceEntity) -> String {
        match self.lookup(source).await {
            Ok(name) => name,
            Err(e) => {
                warn!(source = ?source, "LINE profile lookup failed: {}", e);
                UNKNOWN_SENDER.to_string()
            }
        }
    }

    async fn lookup(&self, source: &SourceEntity) -> Result<String, RelayError> {
        match source {
            SourceEntity::User { user_id } => self.line.user_profile(user_id).await,
            SourceEntity::Group {
                group_id,
                user_id: Some(user_id),
            } => self.line.group_member_profile(group_id, user_id).await,
            SourceEntity::Room {
                room_id,
                user_id: Some(user_id),
            } => self.line.room_member_profile(room_id, user_id).await,
            SourceEntity::Group { user_id: None, .. } | SourceEntity::Room { user_id: None, .. } => {
                Err(RelayError::IdentityLookup(
                    "event carries no member user id".to_string(),
                ))
            }
        }
    }
}
