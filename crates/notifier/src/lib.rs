//! Jira-to-Slack issue notifier.
//!
//! Polls recently updated issues, compares each update time with the last one notified
//! for that key, and posts new updates to an incoming webhook. State is a flat JSON file
//! with a single writer.

use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use thiserror::Error;

use banklens_core::config::AppConfig;

pub mod jira;
pub mod message;
pub mod poller;
pub mod state;
pub mod webhook;

pub use jira::{Issue, IssueTracker, JiraClient, TrackerError};
pub use poller::{CycleReport, PollError, PollSchedule, Poller};
pub use state::{JsonFileStore, MemoryStore, NotificationStore, StoreError};
pub use webhook::{NotificationSink, SlackWebhook, WebhookError};

pub type DefaultPoller = Poller<JiraClient, SlackWebhook, JsonFileStore>;

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("notifier configuration is invalid: {0}")]
    Config(String),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error(transparent)]
    Webhook(#[from] WebhookError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn display_timezone(name: &str) -> Result<Tz, NotifierError> {
    Tz::from_str(name).map_err(|_| NotifierError::Config(format!("unknown timezone `{name}`")))
}

/// Wires the Jira client, webhook and JSON state file from configuration.
pub async fn poller_from_config(config: &AppConfig) -> Result<DefaultPoller, NotifierError> {
    let webhook_url = config
        .notifier
        .webhook_url
        .clone()
        .ok_or_else(|| NotifierError::Config("notifier.webhook_url is not set".to_string()))?;
    let timezone = display_timezone(&config.notifier.display_timezone)?;
    let tracker = JiraClient::from_config(&config.jira)?;
    let sink = SlackWebhook::new(webhook_url)?;
    let store = JsonFileStore::load(&config.notifier.state_path).await?;
    let schedule = PollSchedule {
        poll_interval: Duration::from_secs(config.notifier.poll_interval_secs),
        error_backoff: Duration::from_secs(config.notifier.error_backoff_secs),
    };

    Ok(Poller::new(tracker, sink, store, timezone, schedule))
}
