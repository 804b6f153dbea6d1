use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;

use crate::jira::Issue;

/// Parses tracker timestamps such as `2024-03-05T10:15:30.000+0000`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(raw.trim(), "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw.trim()))
        .ok()
}

/// e.g. `05 Mar 2024, 03:45 PM IST`.
pub fn display_time(updated: DateTime<FixedOffset>, timezone: Tz) -> String {
    updated.with_timezone(&timezone).format("%d %b %Y, %I:%M %p %Z").to_string()
}

pub fn notification_text(issue: &Issue, issue_url: &str, updated_display: &str) -> String {
    format!(
        "🔔 *Jira Update: <{issue_url}|{key}>*\n\
         *Summary:* {summary}\n\
         *Status:* {status}\n\
         *Assignee:* {assignee}\n\
         *Priority:* {priority}\n\
         *Updated:* {updated_display}",
        key = issue.key,
        summary = issue.fields.summary,
        status = issue.status_name(),
        assignee = issue.assignee_name(),
        priority = issue.priority_name(),
    )
}
