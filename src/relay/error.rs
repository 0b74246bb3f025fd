use thiserror::Error;

/// Failures that can occur while relaying between the two platforms.
///
/// Only `InvalidSignature` and `MalformedPayload` ever reach the webhook
/// caller; everything else is logged where it happens and dropped.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("LINE webhook signature is missing or invalid")]
    InvalidSignature,

    #[error("LINE webhook payload could not be decoded: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("profile lookup failed: {0}")]
    IdentityLookup(String),

    #[error("delivery to {target} failed: {reason}")]
    Delivery { target: String, reason: String },

    #[error("Discord channel {0} not found")]
    MissingChannel(u64),

    #[error("Discord dispatcher is no longer running")]
    BridgeClosed,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}
