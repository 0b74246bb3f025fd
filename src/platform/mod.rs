pub mod discord;
pub mod line;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The chat platform a relayed message originated on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePlatform {
    Discord,
    Line,
}

impl SourcePlatform {
    pub fn icon(self) -> &'static str {
        match self {
            SourcePlatform::Discord => "💻",
            SourcePlatform::Line => "📲",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SourcePlatform::Discord => "Discord",
            SourcePlatform::Line => "LINE",
        }
    }
}

impl std::fmt::Display for SourcePlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A message observed on one platform, on its way to the other.
///
/// Built once by the inbound adapter that saw it and consumed once by the
/// opposite side's send step. `relay_id` and `received_at` only feed logs.
#[derive(Debug, Clone)]
pub struct RelayMessage {
    pub relay_id: Uuid,
    pub received_at: DateTime<Utc>,
    pub source: SourcePlatform,
    pub sender_display_name: String,
    pub text: String,
}

impl RelayMessage {
    pub fn new(
        source: SourcePlatform,
        sender_display_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            relay_id: Uuid::new_v4(),
            received_at: Utc::now(),
            source,
            sender_display_name: sender_display_name.into(),
            text: text.into(),
        }
    }

    /// Text as it appears on the destination platform, e.g. `📲 LINE(Alice): hi`
    pub fn render(&self) -> String {
        format!(
            "{} {}({}): {}",
            self.source.icon(),
            self.source.label(),
            self.sender_display_name,
            self.text
        )
    }
}
