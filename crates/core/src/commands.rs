//! Slash-command vocabulary shared by the Slack bot and the command mapper.

use std::fmt;

use crate::errors::DomainError;

pub const VALID_BASE_COMMANDS: [&str; 5] =
    ["/dashboard", "/overview_summary", "/fraud_summary", "/daily_summary", "/client_summary"];

/// Sentinel returned by the mapper when free text cannot be mapped.
pub const UNKNOWN_COMMAND: &str = "unknown";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlashCommand {
    Dashboard,
    OverviewSummary,
    FraudSummary,
    DailySummary,
    ClientSummary,
}

impl SlashCommand {
    pub const ALL: [SlashCommand; 5] = [
        Self::Dashboard,
        Self::OverviewSummary,
        Self::FraudSummary,
        Self::DailySummary,
        Self::ClientSummary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dashboard => "/dashboard",
            Self::OverviewSummary => "/overview_summary",
            Self::FraudSummary => "/fraud_summary",
            Self::DailySummary => "/daily_summary",
            Self::ClientSummary => "/client_summary",
        }
    }

    pub fn from_base(base: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.as_str() == base)
    }

    /// Ephemeral acknowledgement sent before the command runs in the background.
    pub fn placeholder(self) -> &'static str {
        match self {
            Self::Dashboard => "⏳ Loading dashboard…",
            Self::OverviewSummary => "⏳ Generating overview…",
            Self::FraudSummary => "⏳ Generating fraud summary…",
            Self::DailySummary => "⏳ Generating daily summary…",
            Self::ClientSummary => "⏳ Generating client summary…",
        }
    }

    pub fn failure_message(self) -> &'static str {
        match self {
            Self::Dashboard => "❌ Error loading dashboard.",
            Self::OverviewSummary => "❌ Error generating overview summary.",
            Self::FraudSummary => "❌ Error generating fraud summary.",
            Self::DailySummary => "❌ Error generating daily summary.",
            Self::ClientSummary => "❌ Error generating client summary.",
        }
    }
}

impl fmt::Display for SlashCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command string that passed vocabulary validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappedCommand {
    raw: String,
    command: SlashCommand,
}

impl MappedCommand {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if !trimmed.starts_with('/') {
            return Err(DomainError::InvalidCommand(raw.to_string()));
        }

        let base = trimmed.split_whitespace().next().unwrap_or_default();
        let command = SlashCommand::from_base(base)
            .ok_or_else(|| DomainError::InvalidCommand(raw.to_string()))?;

        Ok(Self { raw: trimmed.to_string(), command })
    }

    pub fn command(&self) -> SlashCommand {
        self.command
    }

    pub fn args(&self) -> Vec<&str> {
        self.raw.split_whitespace().skip(1).collect()
    }

    /// Arguments re-joined with single spaces, the shape of a slash command's `text` field.
    pub fn text(&self) -> String {
        self.args().join(" ")
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for MappedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MapOutcome {
    Mapped(MappedCommand),
    Unknown,
}

impl MapOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Mapped(command) => command.as_str(),
            Self::Unknown => UNKNOWN_COMMAND,
        }
    }

    pub fn mapped(&self) -> Option<&MappedCommand> {
        match self {
            Self::Mapped(command) => Some(command),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for MapOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn validate_command(command: &str) -> bool {
    MappedCommand::parse(command).is_ok()
}

/// Splits a command into its base and arguments; invalid input yields `("", [])`.
pub fn parse_command(command: &str) -> (String, Vec<String>) {
    match MappedCommand::parse(command) {
        Ok(parsed) => (
            parsed.command().as_str().to_string(),
            parsed.args().into_iter().map(str::to_string).collect(),
        ),
        Err(_) => (String::new(), Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_command, validate_command, MapOutcome, MappedCommand, SlashCommand};

    #[test]
    fn accepts_every_vocabulary_command() {
        for base in super::VALID_BASE_COMMANDS {
            assert!(validate_command(base), "{base} should validate");
        }
        assert!(validate_command("/fraud_summary 15"));
    }

    #[test]
    fn rejects_text_without_slash_or_outside_vocabulary() {
        assert!(!validate_command(""));
        assert!(!validate_command("fraud_summary 15"));
        assert!(!validate_command("/fraud 15"));
        assert!(!validate_command("/fraud_summary_extra"));
        assert!(!validate_command("unknown"));
    }

    #[test]
    fn parse_command_splits_base_and_args() {
        assert_eq!(
            parse_command("/daily_summary 2019-12-31"),
            ("/daily_summary".to_string(), vec!["2019-12-31".to_string()])
        );
        assert_eq!(parse_command("/dashboard"), ("/dashboard".to_string(), Vec::new()));
        assert_eq!(parse_command("hello there"), (String::new(), Vec::new()));
    }

    #[test]
    fn mapped_command_exposes_typed_base() {
        let mapped = MappedCommand::parse("/client_summary 12345").expect("valid command");
        assert_eq!(mapped.command(), SlashCommand::ClientSummary);
        assert_eq!(mapped.args(), vec!["12345"]);
        assert_eq!(mapped.text(), "12345");
    }

    #[test]
    fn unknown_outcome_renders_sentinel() {
        assert_eq!(MapOutcome::Unknown.to_string(), "unknown");
        let mapped = MappedCommand::parse("/overview_summary").expect("valid command");
        assert_eq!(MapOutcome::Mapped(mapped).as_str(), "/overview_summary");
    }
}
