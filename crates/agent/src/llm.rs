use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use banklens_core::config::LlmConfig;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// Sampling parameters travel with the request; the model and credentials live in the client.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages, temperature: 0.7, max_tokens: None, top_p: None }
    }

    /// Copies the sampling settings configured for an endpoint.
    pub fn with_settings(mut self, config: &LlmConfig) -> Self {
        self.temperature = config.temperature;
        self.max_tokens = config.max_tokens;
        self.top_p = config.top_p;
        self
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no API key is configured for the completion endpoint")]
    MissingApiKey,
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion response was malformed: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Returns the content of the first choice's message.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

/// Client for an OpenAI-compatible `POST {base_url}/chat/completions` endpoint.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
}

impl ChatCompletionsClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let http =
            reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let api_key = self
            .api_key
            .as_ref()
            .filter(|key| !key.expose_secret().trim().is_empty())
            .ok_or(LlmError::MissingApiKey)?;

        let body = ChatCompletionBody {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: request.top_p,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|error| LlmError::MalformedResponse(error.to_string()))?;
        first_choice_content(&payload)
    }
}

fn first_choice_content(payload: &Value) -> Result<String, LlmError> {
    payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            LlmError::MalformedResponse("missing choices[0].message.content".to_string())
        })
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use banklens_core::config::LlmConfig;

    use super::{ChatCompletionsClient, ChatMessage, CompletionRequest, LlmClient, LlmError};

    fn config(base_url: String, api_key: Option<&str>) -> LlmConfig {
        LlmConfig {
            api_key: api_key.map(|key| SecretString::from(key.to_string())),
            base_url,
            model: "test-model".to_string(),
            timeout_secs: 5,
            temperature: 0.1,
            max_tokens: Some(50),
            top_p: Some(0.9),
        }
    }

    #[tokio::test]
    async fn sends_model_and_sampling_settings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer key-123"))
            .and(body_partial_json(json!({
                "model": "test-model",
                "max_tokens": 50,
                "messages": [{"role": "user", "content": "hi"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "/dashboard"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = config(server.uri(), Some("key-123"));
        let client = ChatCompletionsClient::from_config(&cfg).expect("client");
        let request = CompletionRequest::new(vec![ChatMessage::user("hi")]).with_settings(&cfg);

        let content = client.complete(&request).await.expect("completion");
        assert_eq!(content, "/dashboard");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client =
            ChatCompletionsClient::from_config(&config(server.uri(), Some("k"))).expect("client");
        let result = client.complete(&CompletionRequest::new(vec![ChatMessage::user("x")])).await;

        assert!(matches!(result, Err(LlmError::Status { status: 429, .. })));
    }

    #[tokio::test]
    async fn missing_content_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let client =
            ChatCompletionsClient::from_config(&config(server.uri(), Some("k"))).expect("client");
        let result = client.complete(&CompletionRequest::new(vec![ChatMessage::user("x")])).await;

        assert!(matches!(result, Err(LlmError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn missing_api_key_short_circuits() {
        let client = ChatCompletionsClient::from_config(&config("http://127.0.0.1:9".into(), None))
            .expect("client");
        let result = client.complete(&CompletionRequest::new(vec![ChatMessage::user("x")])).await;

        assert!(matches!(result, Err(LlmError::MissingApiKey)));
    }
}
