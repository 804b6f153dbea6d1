use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use banklens_core::config::JiraConfig;

pub const ISSUE_FIELDS: &str = "summary,status,assignee,updated,priority";

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("issue tracker request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("issue tracker returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Issue {
    pub key: String,
    pub fields: IssueFields,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct IssueFields {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub status: Option<NamedField>,
    #[serde(default)]
    pub assignee: Option<Assignee>,
    #[serde(default)]
    pub priority: Option<NamedField>,
    /// Raw tracker timestamp, e.g. `2024-03-05T10:15:30.000+0000`.
    #[serde(default)]
    pub updated: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct NamedField {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignee {
    pub display_name: String,
}

impl Issue {
    pub fn status_name(&self) -> &str {
        self.fields.status.as_ref().map(|status| status.name.as_str()).unwrap_or("Unknown")
    }

    pub fn assignee_name(&self) -> &str {
        self.fields
            .assignee
            .as_ref()
            .map(|assignee| assignee.display_name.as_str())
            .unwrap_or("Unassigned")
    }

    pub fn priority_name(&self) -> &str {
        self.fields.priority.as_ref().map(|priority| priority.name.as_str()).unwrap_or("None")
    }
}

#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Issues updated within the tracker's lookback window, most recent first.
    async fn recent_issues(&self) -> Result<Vec<Issue>, TrackerError>;

    fn issue_url(&self, key: &str) -> String;
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<Issue>,
}

pub struct JiraClient {
    http: reqwest::Client,
    base_url: String,
    email: String,
    api_token: SecretString,
    project_key: String,
    lookback: ChronoDuration,
    page_size: u32,
}

impl JiraClient {
    pub fn from_config(config: &JiraConfig) -> Result<Self, TrackerError> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            email: config.email.clone(),
            api_token: config.api_token.clone(),
            project_key: config.project_key.clone(),
            lookback: ChronoDuration::hours(i64::from(config.lookback_hours)),
            page_size: config.page_size,
        })
    }

    pub async fn issues_updated_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Issue>, TrackerError> {
        let jql = search_jql(&self.project_key, since);
        let page_size = self.page_size.to_string();
        let response = self
            .http
            .get(format!("{}/rest/api/3/search", self.base_url))
            .header(reqwest::header::ACCEPT, "application/json")
            .basic_auth(&self.email, Some(self.api_token.expose_secret()))
            .query(&[
                ("jql", jql.as_str()),
                ("maxResults", page_size.as_str()),
                ("fields", ISSUE_FIELDS),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrackerError::Status { status: status.as_u16(), body });
        }

        Ok(response.json::<SearchResponse>().await?.issues)
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn recent_issues(&self) -> Result<Vec<Issue>, TrackerError> {
        self.issues_updated_since(Utc::now() - self.lookback).await
    }

    fn issue_url(&self, key: &str) -> String {
        format!("{}/browse/{key}", self.base_url)
    }
}

pub fn search_jql(project_key: &str, since: DateTime<Utc>) -> String {
    format!(
        "project = {project_key} AND updated >= \"{}\" ORDER BY updated DESC",
        since.format("%Y-%m-%d %H:%M")
    )
}
