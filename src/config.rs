use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub discord: DiscordConfig,
    pub line: LineConfig,
    #[serde(default = "default_server_config")]
    pub server: ServerConfig,
}

#[derive(Deserialize, Clone)]
pub struct DiscordConfig {
    pub bot_token: String,
    /// The one channel relayed to and from LINE
    pub channel_id: u64,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Relay messages written by other bot accounts. Our own are never relayed.
    #[serde(default)]
    pub relay_bot_messages: bool,
}

#[derive(Deserialize, Clone)]
pub struct LineConfig {
    pub channel_secret: String,
    pub channel_access_token: String,
    /// Push every Discord message to this id only, instead of to everyone
    /// who has messaged the bot
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default = "default_line_api_base_url")]
    pub api_base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("bot_token", &"[REDACTED]")
            .field("channel_id", &self.channel_id)
            .field("command_prefix", &self.command_prefix)
            .field("relay_bot_messages", &self.relay_bot_messages)
            .finish()
    }
}

impl std::fmt::Debug for LineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineConfig")
            .field("channel_secret", &"[REDACTED]")
            .field("channel_access_token", &"[REDACTED]")
            .field("target_id", &self.target_id)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

fn default_command_prefix() -> String {
    "!".to_string()
}

fn default_line_api_base_url() -> String {
    "https://api.line.me".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_server_config() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Build the config from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Variable names follow the
    /// `DISCORD_*`, `LINE_*`, `HOST`, `PORT` convention.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("Missing required environment variable {}", key))
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let channel_id = required("DISCORD_CHANNEL_ID")?;
        let channel_id: u64 = channel_id
            .trim()
            .parse()
            .with_context(|| format!("DISCORD_CHANNEL_ID is not a number: {}", channel_id))?;

        let port = match optional("PORT") {
            Some(p) => p
                .trim()
                .parse()
                .with_context(|| format!("PORT is not a valid port: {}", p))?,
            None => default_port(),
        };

        let relay_bot_messages = optional("DISCORD_RELAY_BOT_MESSAGES")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let config = Config {
            discord: DiscordConfig {
                bot_token: required("DISCORD_TOKEN")?,
                channel_id,
                command_prefix: optional("DISCORD_COMMAND_PREFIX")
                    .unwrap_or_else(default_command_prefix),
                relay_bot_messages,
            },
            line: LineConfig {
                channel_secret: required("LINE_CHANNEL_SECRET")?,
                channel_access_token: required("LINE_CHANNEL_ACCESS_TOKEN")?,
                target_id: optional("LINE_TARGET_ID"),
                api_base_url: optional("LINE_API_BASE_URL")
                    .unwrap_or_else(default_line_api_base_url),
            },
            server: ServerConfig {
                host: optional("HOST").unwrap_or_else(default_host),
                port,
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.discord.bot_token.trim().is_empty() {
            anyhow::bail!("discord.bot_token must not be empty");
        }
        if self.discord.channel_id == 0 {
            anyhow::bail!("discord.channel_id must be a non-zero channel ID");
        }
        if self.discord.command_prefix.is_empty() {
            anyhow::bail!("discord.command_prefix must not be empty");
        }
        if self.line.channel_secret.trim().is_empty() {
            anyhow::bail!("line.channel_secret must not be empty");
        }
        if self.line.channel_access_token.trim().is_empty() {
            anyhow::bail!("line.channel_access_token must not be empty");
        }
        if let Some(target) = &self.line.target_id {
            if target.trim().is_empty() {
                anyhow::bail!("line.target_id must not be empty when set");
            }
        }
        Ok(())
    }
}
