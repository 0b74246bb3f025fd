use async_trait::async_trait;
use tracing::debug;

use crate::relay::discord_inbound::ObservedMessage;

/// Prefix-command handling that runs after relaying, whatever the relay did.
#[async_trait]
pub trait CommandProcessor: Send + Sync {
    /// Returns a reply to post in the same channel, if any
    async fn process(&self, msg: &ObservedMessage) -> Option<String>;
}

/// Minimal `!command` handler
pub struct PrefixCommands {
    prefix: String,
}

impl PrefixCommands {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Split `!name args` into `("name", "args")`
    fn parse<'a>(&self, content: &'a str) -> Option<(&'a str, &'a str)> {
        let rest = content.trim_start().strip_prefix(self.prefix.as_str())?;
        let mut parts = rest.splitn(2, char::is_whitespace);
        let name = parts.next().filter(|n| !n.is_empty())?;
        Some((name, parts.next().unwrap_or("").trim()))
    }
}

#[async_trait]
impl CommandProcessor for PrefixCommands {
    async fn process(&self, msg: &ObservedMessage) -> Option<String> {
        if msg.author_is_bot {
            return None;
        }
        let (name, _args) = self.parse(&msg.content)?;
        match name {
            "ping" => Some("pong".to_string()),
            other => {
                debug!("Unknown command: {}{}", self.prefix, other);
                None
            }
        }
    }
}
