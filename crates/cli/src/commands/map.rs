use std::sync::Arc;

use banklens_agent::{ChatCompletionsClient, CommandMapper};
use banklens_core::commands::MapOutcome;
use banklens_core::config::{AppConfig, LoadOptions};

use super::CommandResult;

/// Prints the slash command the mapper model picks for `text`.
pub async fn run(options: LoadOptions, text: &str) -> CommandResult {
    let text = text.trim();
    if text.is_empty() {
        return CommandResult::failure("map", "usage", "text to map must not be empty", 2);
    }

    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return CommandResult::failure("map", "config_validation", error.to_string(), 2),
    };

    let client = match ChatCompletionsClient::from_config(&config.mapper) {
        Ok(client) => client,
        Err(error) => return CommandResult::failure("map", "llm_client", error.to_string(), 3),
    };

    match CommandMapper::new(Arc::new(client), config.mapper.clone()).map(text).await {
        MapOutcome::Mapped(command) => CommandResult::success("map", command.to_string()),
        MapOutcome::Unknown => CommandResult::failure(
            "map",
            "unmapped",
            "could not map the text onto a dashboard command",
            3,
        ),
    }
}
