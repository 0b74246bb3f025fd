//! The bidirectional relay core.
//!
//! LINE webhook events flow through [`line_inbound::LineToDiscord`] and the
//! [`bridge::CrossContextBridge`] into the Discord dispatcher. Discord
//! messages flow through [`discord_inbound::DiscordToLine`] and fan out to
//! every LINE recipient in [`registry::Recipients`].

pub mod bridge;
pub mod discord_inbound;
pub mod error;
pub mod identity;
pub mod line_inbound;
pub mod registry;
