pub mod webhook;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LineConfig;
use crate::relay::error::RelayError;

/// The slice of the LINE Messaging API the relay talks to
#[async_trait]
pub trait LineApi: Send + Sync {
    /// Push a text message to a user, group or room id
    async fn push_text(&self, to: &str, text: &str) -> Result<(), RelayError>;

    async fn user_profile(&self, user_id: &str) -> Result<String, RelayError>;

    async fn group_member_profile(&self, group_id: &str, user_id: &str)
        -> Result<String, RelayError>;

    async fn room_member_profile(&self, room_id: &str, user_id: &str) -> Result<String, RelayError>;
}

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: Vec<TextMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    message_type: &'static str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct Profile {
    #[serde(rename = "displayName")]
    display_name: String,
}

/// reqwest-backed LINE Messaging API client
pub struct LineClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl LineClient {
    pub fn new(config: &LineConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            access_token: config.channel_access_token.clone(),
        }
    }

    async fn fetch_profile(&self, path: &str) -> Result<String, RelayError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Fetching LINE profile: {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::IdentityLookup(format!(
                "LINE API error ({}): {}",
                status, body
            )));
        }

        let profile: Profile = response
            .json()
            .await
            .map_err(|e| RelayError::IdentityLookup(format!("bad profile response: {}", e)))?;
        Ok(profile.display_name)
    }
}

#[async_trait]
impl LineApi for LineClient {
    async fn push_text(&self, to: &str, text: &str) -> Result<(), RelayError> {
        let url = format!("{}/v2/bot/message/push", self.base_url);
        let request = PushRequest {
            to,
            messages: vec![TextMessage {
                message_type: "text",
                text,
            }],
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| RelayError::Delivery {
                target: to.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Delivery {
                target: to.to_string(),
                reason: format!("LINE API error ({}): {}", status, body),
            });
        }
        Ok(())
    }

    async fn user_profile(&self, user_id: &str) -> Result<String, RelayError> {
        self.fetch_profile(&format!("/v2/bot/profile/{}", user_id))
            .await
    }

    async fn group_member_profile(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> Result<String, RelayError> {
        self.fetch_profile(&format!("/v2/bot/group/{}/member/{}", group_id, user_id))
            .await
    }

    async fn room_member_profile(&self, room_id: &str, user_id: &str) -> Result<String, RelayError> {
        self.fetch_profile(&format!("/v2/bot/room/{}/member/{}", room_id, user_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> LineClient {
        LineClient::new(&LineConfig {
            channel_secret: "secret".to_string(),
            channel_access_token: "token".to_string(),
            target_id: None,
            api_base_url: server.uri(),
        })
    }

    #[tokio::test]
    async fn test_push_text_sends_bearer_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/bot/message/push"))
            .and(header("authorization", "Bearer token"))
            .and(body_json(serde_json::json!({
                "to": "U1",
                "messages": [{"type": "text", "text": "💻 Discord(Bob): yo"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.push_text("U1", "💻 Discord(Bob): yo").await.unwrap();
    }

    #[tokio::test]
    async fn test_push_text_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/bot/message/push"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad to"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.push_text("bogus", "hello").await.unwrap_err();
        match err {
            RelayError::Delivery { target, reason } => {
                assert_eq!(target, "bogus");
                assert!(reason.contains("400"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_profile_endpoints() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/bot/profile/U1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"userId": "U1", "displayName": "Alice"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/bot/group/C1/member/U2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"userId": "U2", "displayName": "Carol"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/bot/room/R1/member/U3"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"userId": "U3", "displayName": "Dave"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.user_profile("U1").await.unwrap(), "Alice");
        assert_eq!(client.group_member_profile("C1", "U2").await.unwrap(), "Carol");
        assert_eq!(client.room_member_profile("R1", "U3").await.unwrap(), "Dave");
    }

    #[tokio::test]
    async fn test_profile_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/bot/profile/U404"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.user_profile("U404").await.unwrap_err();
        assert!(matches!(err, RelayError::IdentityLookup(_)));
    }
}
