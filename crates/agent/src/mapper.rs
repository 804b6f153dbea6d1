//! Maps free-text requests onto the slash-command vocabulary.

use std::sync::Arc;

use tracing::{info, warn};

use banklens_core::commands::{MapOutcome, MappedCommand};
use banklens_core::config::LlmConfig;

use crate::llm::{ChatMessage, CompletionRequest, LlmClient};

pub struct CommandMapper {
    client: Arc<dyn LlmClient>,
    settings: LlmConfig,
}

impl CommandMapper {
    pub fn new(client: Arc<dyn LlmClient>, settings: LlmConfig) -> Self {
        Self { client, settings }
    }

    /// One completion call, no retries; every failure maps to [`MapOutcome::Unknown`].
    pub async fn map(&self, user_message: &str) -> MapOutcome {
        let request = CompletionRequest::new(vec![ChatMessage::user(build_prompt(user_message))])
            .with_settings(&self.settings);

        let raw = match self.client.complete(&request).await {
            Ok(raw) => raw,
            Err(error) => {
                warn!(
                    event_name = "agent.mapper.completion_failed",
                    error = %error,
                    "command mapping request failed"
                );
                return MapOutcome::Unknown;
            }
        };

        let cleaned = clean_completion(&raw);
        match MappedCommand::parse(&cleaned) {
            Ok(command) => {
                info!(
                    event_name = "agent.mapper.mapped",
                    command = %command,
                    "mapped free text to command"
                );
                MapOutcome::Mapped(command)
            }
            Err(_) => {
                warn!(
                    event_name = "agent.mapper.rejected",
                    output = %cleaned,
                    "completion is not a known command"
                );
                MapOutcome::Unknown
            }
        }
    }
}

pub fn build_prompt(user_message: &str) -> String {
    format!(
        "You are a Slack bot's command generator for XYZ Bank's Transaction Dashboard.

Given a user's plain English message, map it to the correct Slack slash command.
Return ONLY the command and its arguments (if any) – NO extra text.

Valid commands:
- /dashboard
- /overview_summary
- /fraud_summary <days>
- /daily_summary <YYYY-MM-DD>
- /client_summary <client_id>

Examples:
• \"Show me the overview\" → /overview_summary
• \"Open the dashboard\" → /dashboard
• \"Fraud for last 15 days\" → /fraud_summary 15
• \"Daily summary for 2019-12-31\" → /daily_summary 2019-12-31
• \"Tell me about client 12345\" → /client_summary 12345

User message:
{user_message}

Respond with ONE line containing the full command.
"
    )
}

/// Normalises raw model output into a candidate command string.
pub fn clean_completion(raw: &str) -> String {
    let line = raw.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or_default();
    line.replace('`', "")
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim_end_matches(['.', ',', '!', '?'])
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use banklens_core::commands::MapOutcome;
    use banklens_core::config::AppConfig;

    use super::{build_prompt, clean_completion, CommandMapper};
    use crate::llm::{CompletionRequest, LlmClient, LlmError};

    struct StubClient {
        reply: Result<String, u16>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl StubClient {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self { reply: Ok(reply.to_string()), seen: Mutex::new(Vec::new()) })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self { reply: Err(status), seen: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl LlmClient for StubClient {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
            self.seen.lock().expect("lock").push(request.clone());
            match &self.reply {
                Ok(reply) => Ok(reply.clone()),
                Err(status) => Err(LlmError::Status { status: *status, body: String::new() }),
            }
        }
    }

    fn mapper(client: Arc<StubClient>) -> CommandMapper {
        CommandMapper::new(client, AppConfig::default().mapper)
    }

    #[tokio::test]
    async fn maps_fraud_request_through_stubbed_model() {
        let client = StubClient::replying("/fraud_summary 15");
        let outcome = mapper(client.clone()).map("Fraud for last 15 days").await;

        assert_eq!(outcome.as_str(), "/fraud_summary 15");
        let seen = client.seen.lock().expect("lock");
        assert_eq!(seen.len(), 1);
        assert!(seen[0].messages[0].content.contains("Fraud for last 15 days"));
        assert_eq!(seen[0].max_tokens, Some(50));
        assert_eq!(seen[0].top_p, Some(0.9));
    }

    #[tokio::test]
    async fn decorated_output_is_cleaned_before_validation() {
        let outcome =
            mapper(StubClient::replying("`\"/Daily_Summary 2019-12-31.\"`\nextra")).map("x").await;
        assert_eq!(outcome.as_str(), "/daily_summary 2019-12-31");
    }

    #[tokio::test]
    async fn output_outside_vocabulary_is_unknown() {
        for reply in ["show_fraud 15", "/fraud 15", "I think you want the dashboard", ""] {
            let outcome = mapper(StubClient::replying(reply)).map("anything").await;
            assert_eq!(outcome, MapOutcome::Unknown, "reply {reply:?} should be rejected");
        }
    }

    #[tokio::test]
    async fn endpoint_failure_is_unknown_without_retry() {
        let client = StubClient::failing(500);
        let outcome = mapper(client.clone()).map("Open the dashboard").await;

        assert_eq!(outcome.to_string(), "unknown");
        assert_eq!(client.seen.lock().expect("lock").len(), 1);
    }

    #[test]
    fn prompt_embeds_vocabulary_and_examples() {
        let prompt = build_prompt("Tell me about client 12345");
        assert!(prompt.contains("/client_summary <client_id>"));
        assert!(prompt.contains("\"Fraud for last 15 days\" → /fraud_summary 15"));
        assert!(prompt.contains("User message:\nTell me about client 12345\n"));
    }

    #[test]
    fn clean_completion_strips_quotes_and_punctuation() {
        assert_eq!(clean_completion("  '/Overview_Summary!' "), "/overview_summary");
        assert_eq!(clean_completion("\n\n/dashboard\n"), "/dashboard");
    }
}
