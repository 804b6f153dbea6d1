use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blocks::{Block, MessageTemplate};

#[derive(Debug, Error)]
pub enum SlackApiError {
    #[error("slack request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("slack returned HTTP {0}")]
    Status(u16),
    #[error("slack API error: {0}")]
    Api(String),
}

/// Outbound message seam. Posting to a user id opens (or reuses) the DM channel.
#[async_trait]
pub trait MessagePoster: Send + Sync {
    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError>;
}

#[derive(Clone)]
pub struct SlackWebClient {
    http: reqwest::Client,
    api_base_url: String,
    bot_token: SecretString,
}

impl SlackWebClient {
    pub fn new(api_base_url: impl Into<String>, bot_token: SecretString) -> Result<Self, SlackApiError> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { http, api_base_url: api_base_url.into(), bot_token })
    }
}

#[derive(Serialize)]
struct PostMessageBody<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "no_blocks")]
    blocks: &'a [Block],
}

fn no_blocks(blocks: &&[Block]) -> bool {
    blocks.is_empty()
}

#[derive(Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl MessagePoster for SlackWebClient {
    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        let body = PostMessageBody {
            channel,
            text: &message.fallback_text,
            blocks: &message.blocks,
        };
        let response = self
            .http
            .post(format!("{}/chat.postMessage", self.api_base_url.trim_end_matches('/')))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SlackApiError::Status(status.as_u16()));
        }

        let payload: SlackResponse = response.json().await?;
        if payload.ok {
            Ok(())
        } else {
            Err(SlackApiError::Api(payload.error.unwrap_or_else(|| "unknown_error".to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{MessagePoster, SlackApiError, SlackWebClient};
    use crate::blocks::MessageTemplate;

    fn client(server: &MockServer) -> SlackWebClient {
        SlackWebClient::new(server.uri(), SecretString::from("xoxb-test")).expect("client")
    }

    #[tokio::test]
    async fn posts_text_only_message_without_blocks_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(header("authorization", "Bearer xoxb-test"))
            .and(body_json(json!({"channel": "U1", "text": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .post_message("U1", &MessageTemplate::text("hello"))
            .await
            .expect("post succeeds");
    }

    #[tokio::test]
    async fn ok_false_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": false, "error": "channel_not_found"})),
            )
            .mount(&server)
            .await;

        let result = client(&server).post_message("U1", &MessageTemplate::text("x")).await;
        assert!(matches!(result, Err(SlackApiError::Api(reason)) if reason == "channel_not_found"));
    }

    #[tokio::test]
    async fn http_failure_is_a_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

        let result = client(&server).post_message("U1", &MessageTemplate::text("x")).await;
        assert!(matches!(result, Err(SlackApiError::Status(503))));
    }
}
