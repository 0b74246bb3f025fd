use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::platform::line::webhook::{LineWebhook, SIGNATURE_HEADER};
use crate::relay::error::RelayError;
use crate::relay::line_inbound::LineToDiscord;

// ── Shared state ───────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct WebhookState {
    pub webhook: LineWebhook,
    pub relay: Arc<LineToDiscord>,
}

// ── Handlers ───────────────────────────────────────────────────────────────────

async fn callback(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    debug!("LINE callback received ({} bytes)", body.len());

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let events = match state.webhook.parse(&body, signature) {
        Ok(events) => events,
        Err(RelayError::InvalidSignature) => {
            warn!("Rejected LINE callback: invalid signature");
            return (StatusCode::BAD_REQUEST, "Bad Request");
        }
        Err(e) => {
            warn!("Rejected LINE callback: {}", e);
            return (StatusCode::BAD_REQUEST, "Bad Request");
        }
    };

    state.relay.handle_events(&events).await;
    (StatusCode::OK, "OK")
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/callback", post(callback))
        .with_state(state)
}

/// Bind the webhook address. Called before anything else starts so a bad
/// address or a port in use stops startup.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))
}

/// Serve the LINE webhook on an already-bound listener
pub async fn serve(listener: TcpListener, state: WebhookState) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("LINE webhook listening on http://{addr}/callback");
    }

    axum::serve(listener, router(state))
        .await
        .context("Webhook server error")?;
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::bridge::{BridgeReceiver, ChannelBinding, CrossContextBridge};
    use crate::relay::identity::tests::FakeLine;
    use crate::relay::identity::IdentityResolver;
    use crate::relay::registry::{Recipients, TargetRegistry};
    use base64::Engine;
    use hmac::{Hmac, Mac};
    use sha2::Sha256;
    use std::time::Duration;

    const SECRET: &str = "channel-secret";

    fn sign(body: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }

    const ALICE_HI: &str = r#"{"destination":"Ubot","events":[{"type":"message","replyToken":"r","source":{"type":"user","userId":"U1"},"message":{"type":"text","id":"1","text":"hi"}}]}"#;

    /// Start the webhook on an ephemeral port
    async fn start_server() -> (String, Arc<TargetRegistry>, BridgeReceiver) {
        let registry = Arc::new(TargetRegistry::new());
        let line = Arc::new(FakeLine::default().with_profile("user:U1", "Alice"));
        let (bridge, rx) = CrossContextBridge::channel();
        let relay = LineToDiscord::new(
            ChannelBinding(777),
            Recipients::Registry(registry.clone()),
            IdentityResolver::new(line),
            bridge,
        );
        let state = WebhookState {
            webhook: LineWebhook::new(SECRET),
            relay: Arc::new(relay),
        };

        let listener = bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            serve(listener, state).await.unwrap();
        });

        (format!("http://{addr}"), registry, rx)
    }

    #[tokio::test]
    async fn test_signed_callback_relays_and_returns_ok() {
        let (base, registry, mut rx) = start_server().await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/callback"))
            .header("X-Line-Signature", sign(ALICE_HI))
            .body(ALICE_HI)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text().await.unwrap(), "OK");
        assert!(registry.contains("U1").await);

        let post = rx.recv().await.unwrap();
        assert_eq!(post.channel, ChannelBinding(777));
        assert_eq!(post.text, "📲 LINE(Alice): hi");
    }

    #[tokio::test]
    async fn test_bad_signature_rejected() {
        let (base, registry, mut rx) = start_server().await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/callback"))
            .header("X-Line-Signature", sign("something else"))
            .body(ALICE_HI)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 400);
        assert!(registry.is_empty().await);
        let pending = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn test_missing_signature_rejected() {
        let (base, _registry, _rx) = start_server().await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/callback"))
            .body(ALICE_HI)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn test_signed_garbage_rejected() {
        let (base, _registry, _rx) = start_server().await;
        let body = "not json";

        let resp = reqwest::Client::new()
            .post(format!("{base}/callback"))
            .header("X-Line-Signature", sign(body))
            .body(body)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn test_verification_ping_returns_ok() {
        // LINE's console "Verify" button sends an empty event list
        let (base, _registry, _rx) = start_server().await;
        let body = r#"{"destination":"Ubot","events":[]}"#;

        let resp = reqwest::Client::new()
            .post(format!("{base}/callback"))
            .header("X-Line-Signature", sign(body))
            .body(body)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn test_bind_fails_when_port_taken() {
        let taken = bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();

        let err = bind(&addr).await.unwrap_err();
        assert!(err.to_string().contains(&addr));
    }

    #[tokio::test]
    async fn test_bind_fails_on_bad_address() {
        assert!(bind("127.0.0.1:not-a-port").await.is_err());
    }
}
