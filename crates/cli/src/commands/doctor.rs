use std::time::Duration;

use banklens_core::config::{AppConfig, LoadOptions, Service};
use secrecy::ExposeSecret;
use serde::Serialize;
use sqlx::{Connection, PgConnection};

use super::config::redact_url;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub async fn run(options: LoadOptions, json_output: bool) -> String {
    let report = build_report(options).await;

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

async fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_slack_bot(&config));
            checks.push(check_model_keys(&config));
            checks.push(check_notifier(&config));
            checks.push(check_database_connectivity(&config).await);
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["slack_bot_readiness", "model_api_keys", "notifier_readiness", "database_connectivity"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_slack_bot(config: &AppConfig) -> DoctorCheck {
    match config.validate_for(Service::SlackBot) {
        Ok(()) if config.slack.signing_secret.is_some() => DoctorCheck {
            name: "slack_bot_readiness",
            status: CheckStatus::Pass,
            details: "bot token and signing secret are set".to_string(),
        },
        Ok(()) => DoctorCheck {
            name: "slack_bot_readiness",
            status: CheckStatus::Pass,
            details: "bot token is set; signing secret is missing so requests are not verified"
                .to_string(),
        },
        Err(error) => DoctorCheck {
            name: "slack_bot_readiness",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_model_keys(config: &AppConfig) -> DoctorCheck {
    let has_key = |key: Option<&secrecy::SecretString>| {
        key.is_some_and(|value| !value.expose_secret().trim().is_empty())
    };
    let missing: Vec<&str> = [
        ("mapper.api_key", has_key(config.mapper.api_key.as_ref())),
        ("insights.api_key", has_key(config.insights.llm.api_key.as_ref())),
    ]
    .into_iter()
    .filter_map(|(name, present)| (!present).then_some(name))
    .collect();

    if missing.is_empty() {
        DoctorCheck {
            name: "model_api_keys",
            status: CheckStatus::Pass,
            details: "mapper and insight model keys are set".to_string(),
        }
    } else {
        DoctorCheck {
            name: "model_api_keys",
            status: CheckStatus::Skipped,
            details: format!("{} not set; affected features fall back", missing.join(", ")),
        }
    }
}

fn check_notifier(config: &AppConfig) -> DoctorCheck {
    match config.validate_for(Service::Notifier) {
        Ok(()) => DoctorCheck {
            name: "notifier_readiness",
            status: CheckStatus::Pass,
            details: format!("polling Jira project `{}`", config.jira.project_key),
        },
        Err(error) => DoctorCheck {
            name: "notifier_readiness",
            status: CheckStatus::Skipped,
            details: format!("notifier not configured: {error}"),
        },
    }
}

async fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let timeout = Duration::from_secs(config.database.timeout_secs.max(1));
    let result = match tokio::time::timeout(timeout, PgConnection::connect(&config.database.url)).await
    {
        Ok(Ok(connection)) => connection
            .close()
            .await
            .map_err(|error| format!("failed to close database connection: {error}")),
        Ok(Err(error)) => Err(format!("failed to connect to database: {error}")),
        Err(_) => Err(format!("database did not answer within {}s", timeout.as_secs())),
    };

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", redact_url(&config.database.url)),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
