use banklens_core::config::{AppConfig, LoadOptions, Service};
use banklens_notifier::poller_from_config;

use super::{serve, CommandResult};

pub async fn run(options: LoadOptions, once: bool) -> CommandResult {
    if !once {
        return serve::run("notify", Service::Notifier, options).await;
    }

    let config = match AppConfig::load_for(options, Service::Notifier) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("notify", "config_validation", error.to_string(), 2)
        }
    };

    let mut poller = match poller_from_config(&config).await {
        Ok(poller) => poller,
        Err(error) => return CommandResult::failure("notify", "notifier_setup", error.to_string(), 3),
    };

    match poller.run_cycle().await {
        Ok(report) => CommandResult::success(
            "notify",
            format!(
                "fetched {} issues: {} notified, {} already seen, {} failed, {} invalid",
                report.fetched, report.notified, report.skipped, report.failed, report.invalid
            ),
        ),
        Err(error) => CommandResult::failure("notify", "poll_cycle", error.to_string(), 4),
    }
}
