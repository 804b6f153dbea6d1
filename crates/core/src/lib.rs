pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod format;
pub mod summaries;

pub use commands::{
    parse_command, validate_command, MapOutcome, MappedCommand, SlashCommand,
    VALID_BASE_COMMANDS,
};
pub use config::{AppConfig, ConfigError, LoadOptions, Service};
pub use domain::analytics::{
    ClientId, ClientProfile, ClientSpend, ClientSpending, ClientTransaction, DailyComparison,
    DailyTotal, DateBounds, DateWindow, DayOfWeekActivity, FraudComparison, FraudSegment,
    FraudTrendPoint, FraudulentClient, HourlyActivity, HourlyAverage, HourlyFraud,
    OverviewStats, PeriodStats, SegmentActivity,
};
pub use errors::DomainError;
