use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use banklens_agent::CommandMapper;
use banklens_core::commands::{MapOutcome, SlashCommand};
use banklens_core::domain::analytics::ClientId;
use banklens_core::errors::DomainError;
use banklens_core::summaries;
use banklens_db::{RepositoryError, TransactionRepository};

use crate::blocks::{self, MessageTemplate};
use crate::client::MessagePoster;

pub const MISSING_CLIENT_ID: &str = "Please provide a client ID.";
pub const ASSIST_USAGE: &str =
    "🤔 Please type what you need (e.g. *“Show me fraud for 7 days”*).";
pub const ASSIST_THINKING: &str = "🧠 Thinking… I'll DM you in a moment!";
pub const ASSIST_UNMAPPED: &str =
    "🙁 Sorry, I couldn't figure out that request. Please try phrasing it differently.";
pub const ASSIST_FAILED: &str = "❌ Something went wrong with your request.";

/// Form fields Slack sends with a slash command.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SlashCommandPayload {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub text: String,
    pub user_id: String,
    #[serde(default)]
    pub channel_id: String,
}

impl SlashCommandPayload {
    pub fn first_arg(&self) -> Option<&str> {
        self.text.split_whitespace().next()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EphemeralReply {
    pub response_type: &'static str,
    pub text: String,
}

impl EphemeralReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self { response_type: "ephemeral", text: text.into() }
    }
}

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Produces the chat text for each summary command.
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    async fn overview(&self) -> Result<String, SummaryError>;
    async fn fraud(&self, days: u32) -> Result<String, SummaryError>;
    async fn daily(&self, date_arg: Option<&str>) -> Result<String, SummaryError>;
    async fn client(&self, client_arg: &str) -> Result<String, SummaryError>;
}

/// Summaries computed from a [`TransactionRepository`].
pub struct AnalyticsSummaries<R> {
    repository: Arc<R>,
    today: Option<NaiveDate>,
}

impl<R> AnalyticsSummaries<R>
where
    R: TransactionRepository,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository, today: None }
    }

    /// Pins "today" instead of reading the local clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }
}

#[async_trait]
impl<R> SummaryProvider for AnalyticsSummaries<R>
where
    R: TransactionRepository + 'static,
{
    async fn overview(&self) -> Result<String, SummaryError> {
        let stats = self.repository.overview_stats().await?;
        Ok(summaries::overview_summary(&stats))
    }

    async fn fraud(&self, days: u32) -> Result<String, SummaryError> {
        let bounds = self.repository.date_bounds().await?.ok_or(DomainError::EmptyDataset)?;
        let window = summaries::fraud_window(days, self.today(), &bounds)?;
        let comparison = self.repository.fraud_comparison(window).await?;
        Ok(summaries::fraud_summary(days, &comparison))
    }

    async fn daily(&self, date_arg: Option<&str>) -> Result<String, SummaryError> {
        let bounds = self.repository.date_bounds().await?.ok_or(DomainError::EmptyDataset)?;
        let date = summaries::resolve_daily_date(date_arg, self.today(), &bounds)?;
        let comparison = self.repository.daily_comparison(date).await?;
        Ok(summaries::daily_summary(date, &comparison))
    }

    async fn client(&self, client_arg: &str) -> Result<String, SummaryError> {
        let client_id = ClientId::parse(client_arg)?;
        let profile = self
            .repository
            .client_profile(client_id)
            .await?
            .ok_or_else(|| DomainError::UnknownClient(client_id.to_string()))?;
        let spending = self.repository.client_spending(client_id).await?;
        Ok(summaries::client_summary(&profile, &spending))
    }
}

/// Turns commands into DMs. Cloned into each background task.
#[derive(Clone)]
pub struct CommandRouter {
    summaries: Arc<dyn SummaryProvider>,
    poster: Arc<dyn MessagePoster>,
    mapper: Arc<CommandMapper>,
    dashboard_url: String,
}

impl CommandRouter {
    pub fn new(
        summaries: Arc<dyn SummaryProvider>,
        poster: Arc<dyn MessagePoster>,
        mapper: Arc<CommandMapper>,
        dashboard_url: impl Into<String>,
    ) -> Self {
        Self { summaries, poster, mapper, dashboard_url: dashboard_url.into() }
    }

    pub fn dashboard_url(&self) -> &str {
        &self.dashboard_url
    }

    /// Builds the message for a command. Failures become the command's error text.
    pub async fn reply_for(&self, command: SlashCommand, user_id: &str, text: &str) -> MessageTemplate {
        let first_arg = text.split_whitespace().next();
        let outcome = match command {
            SlashCommand::Dashboard => {
                return blocks::dashboard_message(user_id, &self.dashboard_url, Some(text));
            }
            SlashCommand::OverviewSummary => self.summaries.overview().await,
            SlashCommand::FraudSummary => {
                self.summaries.fraud(summaries::parse_fraud_days(first_arg)).await
            }
            SlashCommand::DailySummary => self.summaries.daily(first_arg).await,
            SlashCommand::ClientSummary => match text.trim() {
                "" => Ok(MISSING_CLIENT_ID.to_string()),
                client => self.summaries.client(client).await,
            },
        };

        match outcome {
            Ok(summary) => MessageTemplate::text(summaries::append_dashboard_link(
                &summary,
                &self.dashboard_url,
            )),
            Err(error) => {
                error!(
                    event_name = "ingress.slack.summary_failed",
                    command = %command,
                    user_id,
                    error = %error,
                    "summary generation failed"
                );
                MessageTemplate::text(command.failure_message())
            }
        }
    }

    /// Runs a slash command and DMs the result to the user.
    pub async fn run_command(&self, command: SlashCommand, payload: SlashCommandPayload) {
        let message = self.reply_for(command, &payload.user_id, &payload.text).await;
        if let Err(error) = self.poster.post_message(&payload.user_id, &message).await {
            error!(
                event_name = "ingress.slack.post_failed",
                command = %command,
                user_id = %payload.user_id,
                error = %error,
                "failed to deliver command reply"
            );
        }
    }

    /// Maps free text to a command and runs it, DMing the user either way.
    pub async fn run_assist(&self, user_id: String, text: String) {
        let message = match self.mapper.map(&text).await {
            MapOutcome::Mapped(command) => {
                info!(
                    event_name = "ingress.slack.assist_mapped",
                    user_id = %user_id,
                    command = %command,
                    "assist request mapped"
                );
                self.reply_for(command.command(), &user_id, &command.text()).await
            }
            MapOutcome::Unknown => {
                warn!(
                    event_name = "ingress.slack.assist_unmapped",
                    user_id = %user_id,
                    text = %text,
                    "assist request could not be mapped"
                );
                MessageTemplate::text(ASSIST_UNMAPPED)
            }
        };

        if let Err(error) = self.poster.post_message(&user_id, &message).await {
            error!(
                event_name = "ingress.slack.assist_failed",
                user_id = %user_id,
                error = %error,
                "failed to deliver assist reply"
            );
            let fallback = MessageTemplate::text(ASSIST_FAILED);
            if let Err(error) = self.poster.post_message(&user_id, &fallback).await {
                warn!(
                    event_name = "ingress.slack.assist_fallback_failed",
                    user_id = %user_id,
                    error = %error,
                    "failed to deliver assist failure notice"
                );
            }
        }
    }

    /// Posts the static dashboard description, for the "Overview" button.
    pub async fn post_overview(&self, user_id: &str) -> Result<(), crate::client::SlackApiError> {
        let text = summaries::dashboard_overview(&self.dashboard_url);
        self.poster.post_message(user_id, &MessageTemplate::text(text)).await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use banklens_agent::{CommandMapper, CompletionRequest, LlmClient, LlmError};
    use banklens_core::config::AppConfig;

    use crate::blocks::MessageTemplate;
    use crate::client::{MessagePoster, SlackApiError};

    #[derive(Default)]
    pub struct RecordingPoster {
        pub posts: Mutex<Vec<(String, MessageTemplate)>>,
        pub fail: bool,
    }

    impl RecordingPoster {
        pub fn texts(&self) -> Vec<String> {
            self.posts
                .lock()
                .expect("lock")
                .iter()
                .map(|(_, message)| message.fallback_text.clone())
                .collect()
        }
    }

    #[async_trait]
    impl MessagePoster for RecordingPoster {
        async fn post_message(
            &self,
            channel: &str,
            message: &MessageTemplate,
        ) -> Result<(), SlackApiError> {
            self.posts.lock().expect("lock").push((channel.to_string(), message.clone()));
            if self.fail {
                return Err(SlackApiError::Api("channel_not_found".to_string()));
            }
            Ok(())
        }
    }

    pub struct FixedReply(pub &'static str);

    #[async_trait]
    impl LlmClient for FixedReply {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    pub fn mapper(reply: &'static str) -> Arc<CommandMapper> {
        Arc::new(CommandMapper::new(Arc::new(FixedReply(reply)), AppConfig::default().mapper))
    }
}
