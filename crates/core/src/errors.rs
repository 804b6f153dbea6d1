use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("`{0}` is not a recognised slash command")]
    InvalidCommand(String),
    #[error("invalid date `{0}` (expected YYYY-MM-DD)")]
    InvalidDate(String),
    #[error("invalid date window: {0}")]
    InvalidWindow(String),
    #[error("client `{0}` was not found")]
    UnknownClient(String),
    #[error("no transactions are available")]
    EmptyDataset,
}
