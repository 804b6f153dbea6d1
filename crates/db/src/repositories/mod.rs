use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use banklens_core::domain::analytics::{
    ClientId, ClientProfile, ClientSpend, ClientSpending, ClientTransaction, DailyComparison,
    DailyTotal, DateBounds, DateWindow, DayOfWeekActivity, FraudComparison, FraudSegment,
    FraudTrendPoint, FraudulentClient, HourlyActivity, HourlyAverage, HourlyFraud,
    OverviewStats, PeriodStats, SegmentActivity,
};

pub mod memory;
pub mod transactions;

pub use memory::{AnalyticsFixture, InMemoryTransactionRepository};
pub use transactions::SqlTransactionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Read-only analytics over the card-transaction tables.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn overview_stats(&self) -> Result<OverviewStats, RepositoryError>;
    async fn avg_activity_by_dow(&self) -> Result<Vec<DayOfWeekActivity>, RepositoryError>;
    async fn avg_activity_by_hour(&self) -> Result<Vec<HourlyAverage>, RepositoryError>;
    async fn overall_daily_trend(&self) -> Result<Vec<DailyTotal>, RepositoryError>;
    async fn activity_by_gender_overall(&self) -> Result<Vec<SegmentActivity>, RepositoryError>;
    async fn activity_by_age_overall(&self) -> Result<Vec<SegmentActivity>, RepositoryError>;

    async fn daily_comparison(&self, day: NaiveDate) -> Result<DailyComparison, RepositoryError>;
    async fn activity_by_mcc(&self, day: NaiveDate)
        -> Result<Vec<SegmentActivity>, RepositoryError>;
    async fn activity_by_hour(&self, day: NaiveDate)
        -> Result<Vec<HourlyActivity>, RepositoryError>;
    async fn gender_activity(&self, day: NaiveDate)
        -> Result<Vec<SegmentActivity>, RepositoryError>;
    async fn age_group_activity(
        &self,
        day: NaiveDate,
    ) -> Result<Vec<SegmentActivity>, RepositoryError>;
    async fn top_spending_clients(&self, day: NaiveDate)
        -> Result<Vec<ClientSpend>, RepositoryError>;

    /// First and last transaction dates; `None` when the table is empty.
    async fn date_bounds(&self) -> Result<Option<DateBounds>, RepositoryError>;

    async fn client_profile(
        &self,
        client_id: ClientId,
    ) -> Result<Option<ClientProfile>, RepositoryError>;
    async fn client_spending(&self, client_id: ClientId)
        -> Result<ClientSpending, RepositoryError>;
    async fn client_transactions(
        &self,
        client_id: ClientId,
    ) -> Result<Vec<ClientTransaction>, RepositoryError>;

    async fn period_stats(&self, window: DateWindow) -> Result<PeriodStats, RepositoryError>;
    async fn fraud_trend(&self, window: DateWindow)
        -> Result<Vec<FraudTrendPoint>, RepositoryError>;
    async fn fraud_by_gender(&self, window: DateWindow)
        -> Result<Vec<FraudSegment>, RepositoryError>;
    async fn fraud_by_hour(&self, window: DateWindow) -> Result<Vec<HourlyFraud>, RepositoryError>;
    async fn fraud_by_age(&self, window: DateWindow) -> Result<Vec<FraudSegment>, RepositoryError>;
    async fn fraudulent_clients(
        &self,
        window: DateWindow,
    ) -> Result<Vec<FraudulentClient>, RepositoryError>;

    /// Fraud totals for `window` and for the equal-length window just before it.
    async fn fraud_comparison(&self, window: DateWindow)
        -> Result<FraudComparison, RepositoryError>;
}
