pub mod connection;
pub mod repositories;

pub use connection::{connect, connect_lazy_with_settings, connect_with_settings, DbPool};
pub use repositories::{
    AnalyticsFixture, InMemoryTransactionRepository, RepositoryError, SqlTransactionRepository,
    TransactionRepository,
};
