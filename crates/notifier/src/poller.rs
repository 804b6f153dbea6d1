use std::future::Future;
use std::time::Duration;

use chrono_tz::Tz;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::jira::{IssueTracker, TrackerError};
use crate::message::{display_time, notification_text, parse_timestamp};
use crate::state::{NotificationStore, StoreError};
use crate::webhook::NotificationSink;

#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub notified: usize,
    pub skipped: usize,
    pub failed: usize,
    pub invalid: usize,
    pub flushed: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct PollSchedule {
    pub poll_interval: Duration,
    pub error_backoff: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self { poll_interval: Duration::from_secs(30), error_backoff: Duration::from_secs(60) }
    }
}

pub struct Poller<T, N, S> {
    tracker: T,
    sink: N,
    store: S,
    timezone: Tz,
    schedule: PollSchedule,
}

impl<T, N, S> Poller<T, N, S>
where
    T: IssueTracker,
    N: NotificationSink,
    S: NotificationStore,
{
    pub fn new(tracker: T, sink: N, store: S, timezone: Tz, schedule: PollSchedule) -> Self {
        Self { tracker, sink, store, timezone, schedule }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// One fetch-compare-notify pass. The store is flushed only if something was delivered.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, PollError> {
        let issues = self.tracker.recent_issues().await?;
        let mut report = CycleReport { fetched: issues.len(), ..CycleReport::default() };

        if issues.is_empty() {
            info!(event_name = "notifier.cycle.empty", "no recently updated issues");
        }

        for issue in &issues {
            let issue_url = self.tracker.issue_url(&issue.key);
            let Some(updated) = parse_timestamp(&issue.fields.updated) else {
                warn!(
                    event_name = "notifier.issue.invalid_timestamp",
                    key = %issue.key,
                    updated = %issue.fields.updated,
                    "skipping issue with unparseable update time"
                );
                report.invalid += 1;
                continue;
            };
            let updated_display = display_time(updated, self.timezone);

            info!(
                event_name = "notifier.issue.fetched",
                key = %issue.key,
                summary = %issue.fields.summary,
                status = issue.status_name(),
                assignee = issue.assignee_name(),
                priority = issue.priority_name(),
                updated = %updated_display,
                url = %issue_url,
                "recently updated issue"
            );

            let last_notified = self.store.get(&issue.key).and_then(parse_timestamp);
            if last_notified.is_some_and(|last| updated <= last) {
                info!(
                    event_name = "notifier.issue.unchanged",
                    key = %issue.key,
                    "not updated since last notification"
                );
                report.skipped += 1;
                continue;
            }

            let text = notification_text(issue, &issue_url, &updated_display);
            match self.sink.send(&text).await {
                Ok(()) => {
                    info!(event_name = "notifier.issue.sent", key = %issue.key, "notification sent");
                    self.store.set(&issue.key, &issue.fields.updated);
                    report.notified += 1;
                }
                Err(error) => {
                    warn!(
                        event_name = "notifier.issue.send_failed",
                        key = %issue.key,
                        error = %error,
                        "notification failed, will retry next cycle"
                    );
                    report.failed += 1;
                }
            }
        }

        if report.notified > 0 {
            self.store.flush().await?;
            report.flushed = true;
        }

        Ok(report)
    }

    /// Polls until `shutdown` resolves. Errors only lengthen the next sleep.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(event_name = "notifier.started", "issue notifier started");

        loop {
            let delay = match self.run_cycle().await {
                Ok(report) => {
                    info!(
                        event_name = "notifier.cycle.completed",
                        fetched = report.fetched,
                        notified = report.notified,
                        skipped = report.skipped,
                        failed = report.failed,
                        "poll cycle completed"
                    );
                    self.schedule.poll_interval
                }
                Err(error) => {
                    error!(
                        event_name = "notifier.cycle.failed",
                        error = %error,
                        "poll cycle failed"
                    );
                    self.schedule.error_backoff
                }
            };

            tokio::select! {
                _ = &mut shutdown => {
                    info!(event_name = "notifier.stopped", "issue notifier stopped");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono_tz::Asia::Kolkata;

    use super::{PollError, PollSchedule, Poller};
    use crate::jira::{Issue, IssueFields, IssueTracker, NamedField, TrackerError};
    use crate::state::{MemoryStore, NotificationStore};
    use crate::webhook::{NotificationSink, WebhookError};

    #[derive(Clone, Default)]
    struct ScriptedTracker {
        cycles: Arc<Mutex<VecDeque<Option<Vec<Issue>>>>>,
    }

    impl ScriptedTracker {
        fn with(cycles: Vec<Option<Vec<Issue>>>) -> Self {
            Self { cycles: Arc::new(Mutex::new(cycles.into())) }
        }
    }

    #[async_trait]
    impl IssueTracker for ScriptedTracker {
        async fn recent_issues(&self) -> Result<Vec<Issue>, TrackerError> {
            match self.cycles.lock().expect("lock").pop_front().flatten() {
                Some(issues) => Ok(issues),
                None => Err(TrackerError::Status { status: 503, body: String::new() }),
            }
        }

        fn issue_url(&self, key: &str) -> String {
            format!("https://jira.example/browse/{key}")
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        sent: Arc<Mutex<Vec<String>>>,
        reject_containing: Option<&'static str>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, text: &str) -> Result<(), WebhookError> {
            self.sent.lock().expect("lock").push(text.to_string());
            match self.reject_containing {
                Some(marker) if text.contains(marker) => Err(WebhookError::Status(500)),
                _ => Ok(()),
            }
        }
    }

    fn issue(key: &str, updated: &str) -> Issue {
        Issue {
            key: key.to_string(),
            fields: IssueFields {
                summary: format!("{key} summary"),
                status: Some(NamedField { name: "Open".to_string() }),
                updated: updated.to_string(),
                ..IssueFields::default()
            },
        }
    }

    fn poller(
        tracker: ScriptedTracker,
        sink: RecordingSink,
    ) -> Poller<ScriptedTracker, RecordingSink, MemoryStore> {
        Poller::new(tracker, sink, MemoryStore::default(), Kolkata, PollSchedule::default())
    }

    #[tokio::test]
    async fn notifies_unseen_and_newer_updates_only() {
        let tracker = ScriptedTracker::with(vec![
            Some(vec![issue("OPS-1", "2024-03-05T10:00:00.000+0000")]),
            Some(vec![
                issue("OPS-1", "2024-03-05T10:00:00.000+0000"),
                issue("OPS-2", "2024-03-05T10:05:00.000+0000"),
            ]),
            Some(vec![issue("OPS-1", "2024-03-05T10:30:00.000+0000")]),
        ]);
        let sink = RecordingSink::default();
        let mut poller = poller(tracker, sink.clone());

        let first = poller.run_cycle().await.expect("cycle 1");
        assert_eq!((first.notified, first.skipped, first.flushed), (1, 0, true));

        let second = poller.run_cycle().await.expect("cycle 2");
        assert_eq!((second.notified, second.skipped), (1, 1));

        let third = poller.run_cycle().await.expect("cycle 3");
        assert_eq!(third.notified, 1);
        assert_eq!(poller.store().get("OPS-1"), Some("2024-03-05T10:30:00.000+0000"));
        assert_eq!(poller.store().flush_count(), 3);

        let sent = sink.sent.lock().expect("lock");
        assert_eq!(sent.len(), 3);
        assert!(sent[0].starts_with("🔔 *Jira Update: <https://jira.example/browse/OPS-1|OPS-1>*"));
        assert!(sent[0].ends_with("*Updated:* 05 Mar 2024, 03:30 PM IST"));
    }

    #[tokio::test]
    async fn failed_delivery_is_retried_next_cycle_and_does_not_block_others() {
        let batch = vec![
            issue("OPS-1", "2024-03-05T10:00:00.000+0000"),
            issue("OPS-2", "2024-03-05T10:01:00.000+0000"),
        ];
        let tracker = ScriptedTracker::with(vec![Some(batch.clone()), Some(batch)]);
        let sink = RecordingSink { reject_containing: Some("OPS-1 summary"), ..Default::default() };
        let mut poller = poller(tracker, sink.clone());

        let report = poller.run_cycle().await.expect("cycle");
        assert_eq!((report.notified, report.failed), (1, 1));
        assert_eq!(poller.store().get("OPS-1"), None);
        assert!(poller.store().get("OPS-2").is_some());

        let retry = poller.run_cycle().await.expect("retry cycle");
        assert_eq!((retry.failed, retry.skipped), (1, 1));
        assert_eq!(sink.sent.lock().expect("lock").len(), 3);
    }

    #[tokio::test]
    async fn nothing_delivered_means_no_flush() {
        let tracker = ScriptedTracker::with(vec![Some(vec![
            issue("OPS-1", "not a timestamp"),
        ])]);
        let mut poller = poller(tracker, RecordingSink::default());

        let report = poller.run_cycle().await.expect("cycle");
        assert_eq!((report.invalid, report.notified, report.flushed), (1, 0, false));
        assert_eq!(poller.store().flush_count(), 0);
    }

    #[tokio::test]
    async fn unparseable_recorded_timestamp_counts_as_unseen() {
        let tracker =
            ScriptedTracker::with(vec![Some(vec![issue("OPS-1", "2024-03-05T10:00:00.000+0000")])]);
        let mut poller = poller(tracker, RecordingSink::default());
        poller.store.set("OPS-1", "garbage");

        let report = poller.run_cycle().await.expect("cycle");
        assert_eq!(report.notified, 1);
    }

    #[tokio::test]
    async fn tracker_failure_aborts_cycle() {
        let mut poller = poller(ScriptedTracker::with(vec![None]), RecordingSink::default());
        assert!(matches!(poller.run_cycle().await, Err(PollError::Tracker(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn loop_survives_errors_and_stops_on_shutdown() {
        let tracker = ScriptedTracker::with(vec![
            None,
            Some(vec![issue("OPS-1", "2024-03-05T10:00:00.000+0000")]),
        ]);
        let sink = RecordingSink::default();
        let mut poller = Poller::new(
            tracker,
            sink.clone(),
            MemoryStore::default(),
            Kolkata,
            PollSchedule { poll_interval: Duration::from_secs(30), error_backoff: Duration::from_secs(60) },
        );

        poller.run_until(tokio::time::sleep(Duration::from_secs(61))).await;

        assert_eq!(sink.sent.lock().expect("lock").len(), 1);
        assert_eq!(poller.store().get("OPS-1"), Some("2024-03-05T10:00:00.000+0000"));
    }
}
