use banklens_core::config::{LoadOptions, Service};
use banklens_server::BootstrapError;

use super::CommandResult;

/// Runs `service` in the foreground; returns once it has shut down.
pub async fn run(command: &str, service: Service, options: LoadOptions) -> CommandResult {
    match banklens_server::run(service, options).await {
        Ok(()) => CommandResult::success(command, format!("{} stopped", service.as_str())),
        Err(error) => match error.downcast_ref::<BootstrapError>() {
            Some(BootstrapError::Config(config_error)) => {
                CommandResult::failure(command, "config_validation", config_error.to_string(), 2)
            }
            Some(bootstrap_error) => {
                CommandResult::failure(command, "bootstrap", bootstrap_error.to_string(), 3)
            }
            None => CommandResult::failure(command, "runtime", format!("{error:#}"), 4),
        },
    }
}
