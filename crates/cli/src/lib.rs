pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use banklens_core::config::{LoadOptions, Service};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "banklens",
    about = "Banklens operator CLI",
    long_about = "Run the Slack bot, dashboard, CSV analysis server and Jira notifier, and inspect their configuration.",
    after_help = "Examples:\n  banklens serve slack\n  banklens notify --once\n  banklens map \"fraud in the last week\"\n  banklens doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a banklens.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ServeTarget {
    Slack,
    Dashboard,
    Eda,
}

impl From<ServeTarget> for Service {
    fn from(target: ServeTarget) -> Self {
        match target {
            ServeTarget::Slack => Service::SlackBot,
            ServeTarget::Dashboard => Service::Dashboard,
            ServeTarget::Eda => Service::Eda,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run one HTTP service until ctrl-c or SIGTERM")]
    Serve {
        #[arg(value_enum)]
        service: ServeTarget,
    },
    #[command(about = "Post Jira issue updates to the Slack webhook")]
    Notify {
        #[arg(long, help = "Run a single poll cycle and print its report")]
        once: bool,
    },
    #[command(about = "Map a free-text question onto a dashboard slash command")]
    Map {
        #[arg(required = true, num_args = 1.., help = "Question to map")]
        text: Vec<String>,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Slack and notifier readiness, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let options = LoadOptions { config_path: cli.config, ..LoadOptions::default() };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            let result = commands::CommandResult::failure(
                "runtime",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                1,
            );
            println!("{}", result.output);
            return ExitCode::from(result.exit_code);
        }
    };

    let result = runtime.block_on(async move {
        match cli.command {
            Command::Serve { service } => {
                commands::serve::run("serve", service.into(), options).await
            }
            Command::Notify { once } => commands::notify::run(options, once).await,
            Command::Map { text } => commands::map::run(options, &text.join(" ")).await,
            Command::Config => commands::CommandResult {
                exit_code: 0,
                output: commands::config::run(options),
            },
            Command::Doctor { json } => commands::CommandResult {
                exit_code: 0,
                output: commands::doctor::run(options, json).await,
            },
        }
    });

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command, ServeTarget};

    #[test]
    fn parses_serve_target_and_global_config() {
        let cli = Cli::try_parse_from(["banklens", "--config", "ops.toml", "serve", "dashboard"])
            .expect("valid arguments");
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("ops.toml")));
        assert!(matches!(cli.command, Command::Serve { service: ServeTarget::Dashboard }));
    }

    #[test]
    fn map_joins_words_and_requires_text() {
        let cli = Cli::try_parse_from(["banklens", "map", "fraud", "last", "week"])
            .expect("valid arguments");
        match cli.command {
            Command::Map { text } => assert_eq!(text.join(" "), "fraud last week"),
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["banklens", "map"]).is_err());
        assert!(Cli::try_parse_from(["banklens", "serve", "crm"]).is_err());
    }
}
