//! Slack HTTP surface.
//!
//! Endpoints:
//! - `POST /slack/{command}`   five slash commands, acknowledged with an ephemeral placeholder
//! - `POST /slack/assist`      free-text request mapped onto a slash command
//! - `POST /slack/interactions` block-action callbacks (unsigned)
//! - `GET  /health`, `GET /`
//!
//! Command and assist routes sit behind signature verification. Work happens on a
//! spawned task that DMs the user; the HTTP reply never waits for it.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use banklens_core::commands::SlashCommand;
use banklens_slack::commands::{ASSIST_THINKING, ASSIST_USAGE};
use banklens_slack::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use banklens_slack::{
    parse_interaction, CommandRouter, EphemeralReply, InteractionKind, SignatureVerifier,
    SlashCommandPayload, Verification,
};

const MAX_BODY_BYTES: usize = 1024 * 1024;

pub const SERVICE_NAME: &str = "Database Dashboard Slack Bot (with LLM)";
pub const SERVICE_VERSION: &str = "3.0.0";
pub const SERVICE_FEATURES: [&str; 4] = [
    "Dashboard modal overview",
    "All 5 native slash commands",
    "Natural-language assistant (/assist)",
    "Secure signature verification",
];

#[derive(Clone)]
pub struct SlackState {
    commands: CommandRouter,
    verifier: Arc<SignatureVerifier>,
}

impl SlackState {
    pub fn new(commands: CommandRouter, verifier: SignatureVerifier) -> Self {
        Self { commands, verifier: Arc::new(verifier) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub dashboard_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IndexBody {
    pub name: &'static str,
    pub version: &'static str,
    pub features: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
pub struct InteractionForm {
    #[serde(default)]
    pub payload: String,
}

pub fn router(state: SlackState) -> Router {
    if !state.verifier.is_enabled() {
        warn!(
            event_name = "ingress.slack.signature_disabled",
            "no signing secret configured, Slack requests are not verified"
        );
    }

    let signed = Router::new()
        .route("/slack/assist", post(assist))
        .route("/slack/{command}", post(slash_command))
        .route_layer(middleware::from_fn_with_state(state.clone(), verify_signature));

    Router::new()
        .merge(signed)
        .route("/slack/interactions", post(interactions))
        .route("/health", get(health))
        .route("/", get(index))
        .with_state(state)
}

/// Buffers the body, checks the `v0` signature and hands the request on unchanged.
async fn verify_signature(
    State(state): State<SlackState>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(error) => {
            warn!(event_name = "ingress.slack.body_unreadable", error = %error, "request body unreadable");
            return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
        }
    };

    let header = |name: &str| header_str(&parts.headers, name);
    let verdict = state.verifier.verify(
        header(TIMESTAMP_HEADER),
        header(SIGNATURE_HEADER),
        &bytes,
        Utc::now().timestamp(),
    );
    match verdict {
        Ok(Verification::Verified | Verification::Skipped) => {
            next.run(Request::from_parts(parts, Body::from(bytes))).await
        }
        Err(error) => {
            warn!(
                event_name = "ingress.slack.signature_rejected",
                path = %parts.uri.path(),
                error = %error,
                "rejected unsigned or stale Slack request"
            );
            (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

async fn slash_command(
    State(state): State<SlackState>,
    Path(command): Path<String>,
    Form(payload): Form<SlashCommandPayload>,
) -> Response {
    let Some(command) = SlashCommand::from_base(&format!("/{command}")) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    info!(
        event_name = "ingress.slack.command_received",
        command = %command,
        user_id = %payload.user_id,
        "slash command received"
    );

    let router = state.commands.clone();
    tokio::spawn(async move { router.run_command(command, payload).await });

    Json(EphemeralReply::new(command.placeholder())).into_response()
}

async fn assist(
    State(state): State<SlackState>,
    Form(payload): Form<SlashCommandPayload>,
) -> Json<EphemeralReply> {
    let text = payload.text.trim().to_string();
    if text.is_empty() {
        return Json(EphemeralReply::new(ASSIST_USAGE));
    }

    info!(
        event_name = "ingress.slack.assist_received",
        user_id = %payload.user_id,
        "assist request received"
    );

    let router = state.commands.clone();
    tokio::spawn(async move { router.run_assist(payload.user_id, text).await });

    Json(EphemeralReply::new(ASSIST_THINKING))
}

async fn interactions(
    State(state): State<SlackState>,
    Form(form): Form<InteractionForm>,
) -> (StatusCode, &'static str) {
    let kind = match parse_interaction(&form.payload) {
        Ok(kind) => kind,
        Err(error) => {
            error!(event_name = "ingress.slack.interaction_invalid", error = %error, "bad interaction payload");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error");
        }
    };

    match kind {
        InteractionKind::ShowOverview { user_id } => {
            if let Err(error) = state.commands.post_overview(&user_id).await {
                error!(
                    event_name = "ingress.slack.interaction_failed",
                    user_id = %user_id,
                    error = %error,
                    "failed to post dashboard overview"
                );
                return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error");
            }
            (StatusCode::OK, "")
        }
        InteractionKind::Ignored => (StatusCode::OK, ""),
    }
}

async fn health(State(state): State<SlackState>) -> Json<HealthBody> {
    Json(HealthBody { status: "healthy", dashboard_url: state.commands.dashboard_url().to_string() })
}

async fn index() -> Json<IndexBody> {
    Json(IndexBody {
        name: SERVICE_NAME,
        version: SERVICE_VERSION,
        features: SERVICE_FEATURES.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use chrono::Utc;
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use banklens_agent::{CommandMapper, CompletionRequest, LlmClient, LlmError};
    use banklens_core::config::AppConfig;
    use banklens_core::errors::DomainError;
    use banklens_slack::commands::SummaryError;
    use banklens_slack::signature::sign;
    use banklens_slack::{
        CommandRouter, MessagePoster, MessageTemplate, SignatureVerifier, SlackApiError,
        SummaryProvider,
    };

    use super::{router, SlackState};

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
    const DASHBOARD: &str = "http://dashboard.local";

    #[derive(Default)]
    struct Recorder {
        posts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl MessagePoster for Recorder {
        async fn post_message(&self, channel: &str, message: &MessageTemplate) -> Result<(), SlackApiError> {
            self.posts.lock().expect("lock").push((channel.to_string(), message.fallback_text.clone()));
            Ok(())
        }
    }

    struct Canned;

    #[async_trait]
    impl SummaryProvider for Canned {
        async fn overview(&self) -> Result<String, SummaryError> {
            Ok("overview text".to_string())
        }
        async fn fraud(&self, days: u32) -> Result<String, SummaryError> {
            Ok(format!("fraud {days}"))
        }
        async fn daily(&self, date: Option<&str>) -> Result<String, SummaryError> {
            Err(DomainError::InvalidDate(date.unwrap_or_default().to_string()).into())
        }
        async fn client(&self, client_id: &str) -> Result<String, SummaryError> {
            Ok(format!("client {client_id}"))
        }
    }

    struct MapsTo(&'static str);

    #[async_trait]
    impl LlmClient for MapsTo {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    fn app(secret: Option<&str>) -> (Router, Arc<Recorder>) {
        let poster = Arc::new(Recorder::default());
        let mapper = Arc::new(CommandMapper::new(
            Arc::new(MapsTo("/fraud_summary 7")),
            AppConfig::default().mapper,
        ));
        let commands = CommandRouter::new(Arc::new(Canned), poster.clone(), mapper, DASHBOARD);
        let verifier = SignatureVerifier::new(secret.map(SecretString::from), 300);
        (router(SlackState::new(commands, verifier)), poster)
    }

    fn signed_request(uri: &str, body: &str, timestamp: i64) -> Request<Body> {
        let timestamp = timestamp.to_string();
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .header("x-slack-request-timestamp", &timestamp)
            .header("x-slack-signature", sign(SECRET, &timestamp, body.as_bytes()))
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    async fn wait_for_posts(poster: &Recorder, count: usize) -> Vec<(String, String)> {
        for _ in 0..50 {
            let posts = poster.posts.lock().expect("lock").clone();
            if posts.len() >= count {
                return posts;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        poster.posts.lock().expect("lock").clone()
    }

    #[tokio::test]
    async fn signed_command_is_acknowledged_then_delivered() {
        let (app, poster) = app(Some(SECRET));
        let body = "command=%2Ffraud_summary&text=7&user_id=U1&channel_id=C1";
        let response = app
            .oneshot(signed_request("/slack/fraud_summary", body, Utc::now().timestamp()))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"response_type": "ephemeral", "text": "⏳ Generating fraud summary…"})
        );

        let posts = wait_for_posts(&poster, 1).await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, "U1");
        assert!(posts[0].1.starts_with("fraud 7"));
        assert!(posts[0].1.ends_with("🔗 *View full dashboard:* http://dashboard.local"));
    }

    #[tokio::test]
    async fn stale_or_forged_requests_are_unauthorized() {
        let (app, poster) = app(Some(SECRET));
        let body = "text=&user_id=U1";

        let stale = app
            .clone()
            .oneshot(signed_request("/slack/overview_summary", body, Utc::now().timestamp() - 301))
            .await
            .expect("response");
        assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);

        let mut forged = signed_request("/slack/overview_summary", body, Utc::now().timestamp());
        forged.headers_mut().insert("x-slack-signature", "v0=deadbeef".parse().expect("header"));
        let forged = app.oneshot(forged).await.expect("response");
        assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
        let bytes = to_bytes(forged.into_body(), usize::MAX).await.expect("body");
        assert_eq!(&bytes[..], b"Unauthorized");

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(poster.posts.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn unsigned_requests_pass_when_no_secret_is_configured() {
        let (app, _) = app(None);
        let request = Request::builder()
            .method("POST")
            .uri("/slack/client_summary")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("text=42&user_id=U1"))
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["text"], json!("⏳ Generating client summary…"));
    }

    #[tokio::test]
    async fn unknown_command_path_is_not_found() {
        let (app, _) = app(None);
        let request = Request::builder()
            .method("POST")
            .uri("/slack/transfer_funds")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("text=&user_id=U1"))
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn assist_with_empty_text_returns_usage_hint() {
        let (app, poster) = app(Some(SECRET));
        let response = app
            .oneshot(signed_request("/slack/assist", "text=++&user_id=U1", Utc::now().timestamp()))
            .await
            .expect("response");
        assert_eq!(
            json_body(response).await["text"],
            json!("🤔 Please type what you need (e.g. *“Show me fraud for 7 days”*).")
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(poster.posts.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn assist_maps_text_and_dms_the_result() {
        let (app, poster) = app(Some(SECRET));
        let body = "text=fraud+for+a+week&user_id=U9";
        let response = app
            .oneshot(signed_request("/slack/assist", body, Utc::now().timestamp()))
            .await
            .expect("response");
        assert_eq!(json_body(response).await["text"], json!("🧠 Thinking… I'll DM you in a moment!"));

        let posts = wait_for_posts(&poster, 1).await;
        assert_eq!(posts[0].0, "U9");
        assert!(posts[0].1.starts_with("fraud 7"));
    }

    #[tokio::test]
    async fn overview_button_posts_dashboard_description() {
        let (app, poster) = app(Some(SECRET));
        let payload = r#"{"user":{"id":"U3"},"actions":[{"action_id":"x","value":"show_overview"}]}"#;
        let body = format!("payload={}", urlencode(payload));
        let request = Request::builder()
            .method("POST")
            .uri("/slack/interactions")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("request");

        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let posts = poster.posts.lock().expect("lock").clone();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, "U3");
        assert!(posts[0].1.contains(DASHBOARD));
    }

    #[tokio::test]
    async fn malformed_interaction_is_an_internal_error() {
        let (app, _) = app(None);
        let request = Request::builder()
            .method("POST")
            .uri("/slack/interactions")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("payload=not-json"))
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn health_and_index_describe_the_bot() {
        let (app, _) = app(None);
        let health = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(
            json_body(health).await,
            json!({"status": "healthy", "dashboard_url": DASHBOARD})
        );

        let index = app
            .oneshot(Request::get("/").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let index = json_body(index).await;
        assert_eq!(index["name"], json!("Database Dashboard Slack Bot (with LLM)"));
        assert_eq!(index["version"], json!("3.0.0"));
        assert_eq!(index["features"].as_array().map(Vec::len), Some(4));
    }

    fn urlencode(raw: &str) -> String {
        raw.bytes()
            .map(|byte| match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    (byte as char).to_string()
                }
                _ => format!("%{byte:02X}"),
            })
            .collect()
    }
}
