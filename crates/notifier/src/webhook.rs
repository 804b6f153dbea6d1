use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("webhook returned HTTP {0}")]
    Status(u16),
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), WebhookError>;
}

/// Slack incoming webhook. Only an HTTP 200 counts as delivered.
pub struct SlackWebhook {
    http: reqwest::Client,
    url: SecretString,
}

impl SlackWebhook {
    pub fn new(url: SecretString) -> Result<Self, WebhookError> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl NotificationSink for SlackWebhook {
    async fn send(&self, text: &str) -> Result<(), WebhookError> {
        let response =
            self.http.post(self.url.expose_secret()).json(&json!({ "text": text })).send().await?;

        match response.status().as_u16() {
            200 => Ok(()),
            other => Err(WebhookError::Status(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{NotificationSink, SlackWebhook, WebhookError};

    async fn webhook(server: &MockServer) -> SlackWebhook {
        SlackWebhook::new(SecretString::from(format!("{}/hooks/T1", server.uri()))).expect("hook")
    }

    #[tokio::test]
    async fn posts_text_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/T1"))
            .and(body_json(json!({"text": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        webhook(&server).await.send("hello").await.expect("delivered");
    }

    #[tokio::test]
    async fn other_success_codes_are_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(204)).mount(&server).await;

        let result = webhook(&server).await.send("hello").await;
        assert!(matches!(result, Err(WebhookError::Status(204))));
    }
}
