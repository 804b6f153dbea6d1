use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use banklens_core::domain::analytics::{
    ClientId, ClientProfile, ClientSpend, ClientSpending, ClientTransaction, DailyComparison,
    DailyTotal, DateBounds, DateWindow, DayOfWeekActivity, FraudComparison, FraudSegment,
    FraudTrendPoint, FraudulentClient, HourlyActivity, HourlyAverage, HourlyFraud,
    OverviewStats, PeriodStats, SegmentActivity,
};

use super::{RepositoryError, TransactionRepository};

/// Canned query results served by [`InMemoryTransactionRepository`].
///
/// Date- and window-scoped lookups return the same rows whatever the argument; the
/// argument is recorded in the call log so callers can assert on it.
#[derive(Clone, Debug, Default)]
pub struct AnalyticsFixture {
    pub overview: Option<OverviewStats>,
    pub dow: Vec<DayOfWeekActivity>,
    pub hourly_average: Vec<HourlyAverage>,
    pub daily_trend: Vec<DailyTotal>,
    pub gender_overall: Vec<SegmentActivity>,
    pub age_overall: Vec<SegmentActivity>,
    pub daily_comparison: HashMap<NaiveDate, DailyComparison>,
    pub mcc: Vec<SegmentActivity>,
    pub hourly: Vec<HourlyActivity>,
    pub gender_daily: Vec<SegmentActivity>,
    pub age_daily: Vec<SegmentActivity>,
    pub top_clients: Vec<ClientSpend>,
    pub bounds: Option<DateBounds>,
    pub profiles: HashMap<ClientId, ClientProfile>,
    pub spending: HashMap<ClientId, ClientSpending>,
    pub transactions: HashMap<ClientId, Vec<ClientTransaction>>,
    pub period_stats: PeriodStats,
    pub fraud_trend: Vec<FraudTrendPoint>,
    pub fraud_by_gender: Vec<FraudSegment>,
    pub fraud_by_hour: Vec<HourlyFraud>,
    pub fraud_by_age: Vec<FraudSegment>,
    pub fraudulent_clients: Vec<FraudulentClient>,
    pub fraud_comparison: FraudComparison,
    /// Makes every query fail, as an unreachable database would.
    pub unavailable: bool,
}

#[derive(Default)]
pub struct InMemoryTransactionRepository {
    fixture: RwLock<AnalyticsFixture>,
    calls: RwLock<Vec<String>>,
}

impl InMemoryTransactionRepository {
    pub fn new(fixture: AnalyticsFixture) -> Self {
        Self { fixture: RwLock::new(fixture), calls: RwLock::new(Vec::new()) }
    }

    pub async fn replace(&self, fixture: AnalyticsFixture) {
        *self.fixture.write().await = fixture;
    }

    /// Every query issued so far, as `name` or `name(arg)`.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    async fn read(&self, call: String) -> Result<AnalyticsFixture, RepositoryError> {
        self.calls.write().await.push(call);
        let fixture = self.fixture.read().await;
        if fixture.unavailable {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(fixture.clone())
    }
}

fn window_arg(window: DateWindow) -> String {
    format!("{}..={}", window.start, window.end)
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn overview_stats(&self) -> Result<OverviewStats, RepositoryError> {
        self.read("overview_stats".to_string()).await?.overview.ok_or_else(|| {
            RepositoryError::Decode("overview query returned no rows".to_string())
        })
    }

    async fn avg_activity_by_dow(&self) -> Result<Vec<DayOfWeekActivity>, RepositoryError> {
        Ok(self.read("avg_activity_by_dow".to_string()).await?.dow)
    }

    async fn avg_activity_by_hour(&self) -> Result<Vec<HourlyAverage>, RepositoryError> {
        Ok(self.read("avg_activity_by_hour".to_string()).await?.hourly_average)
    }

    async fn overall_daily_trend(&self) -> Result<Vec<DailyTotal>, RepositoryError> {
        Ok(self.read("overall_daily_trend".to_string()).await?.daily_trend)
    }

    async fn activity_by_gender_overall(&self) -> Result<Vec<SegmentActivity>, RepositoryError> {
        Ok(self.read("activity_by_gender_overall".to_string()).await?.gender_overall)
    }

    async fn activity_by_age_overall(&self) -> Result<Vec<SegmentActivity>, RepositoryError> {
        Ok(self.read("activity_by_age_overall".to_string()).await?.age_overall)
    }

    async fn daily_comparison(&self, day: NaiveDate) -> Result<DailyComparison, RepositoryError> {
        let fixture = self.read(format!("daily_comparison({day})")).await?;
        Ok(fixture.daily_comparison.get(&day).cloned().unwrap_or_default())
    }

    async fn activity_by_mcc(
        &self,
        day: NaiveDate,
    ) -> Result<Vec<SegmentActivity>, RepositoryError> {
        Ok(self.read(format!("activity_by_mcc({day})")).await?.mcc)
    }

    async fn activity_by_hour(
        &self,
        day: NaiveDate,
    ) -> Result<Vec<HourlyActivity>, RepositoryError> {
        Ok(self.read(format!("activity_by_hour({day})")).await?.hourly)
    }

    async fn gender_activity(
        &self,
        day: NaiveDate,
    ) -> Result<Vec<SegmentActivity>, RepositoryError> {
        Ok(self.read(format!("gender_activity({day})")).await?.gender_daily)
    }

    async fn age_group_activity(
        &self,
        day: NaiveDate,
    ) -> Result<Vec<SegmentActivity>, RepositoryError> {
        Ok(self.read(format!("age_group_activity({day})")).await?.age_daily)
    }

    async fn top_spending_clients(
        &self,
        day: NaiveDate,
    ) -> Result<Vec<ClientSpend>, RepositoryError> {
        Ok(self.read(format!("top_spending_clients({day})")).await?.top_clients)
    }

    async fn date_bounds(&self) -> Result<Option<DateBounds>, RepositoryError> {
        Ok(self.read("date_bounds".to_string()).await?.bounds)
    }

    async fn client_profile(
        &self,
        client_id: ClientId,
    ) -> Result<Option<ClientProfile>, RepositoryError> {
        let fixture = self.read(format!("client_profile({client_id})")).await?;
        Ok(fixture.profiles.get(&client_id).cloned())
    }

    async fn client_spending(
        &self,
        client_id: ClientId,
    ) -> Result<ClientSpending, RepositoryError> {
        let fixture = self.read(format!("client_spending({client_id})")).await?;
        Ok(fixture.spending.get(&client_id).cloned().unwrap_or_default())
    }

    async fn client_transactions(
        &self,
        client_id: ClientId,
    ) -> Result<Vec<ClientTransaction>, RepositoryError> {
        let fixture = self.read(format!("client_transactions({client_id})")).await?;
        Ok(fixture.transactions.get(&client_id).cloned().unwrap_or_default())
    }

    async fn period_stats(&self, window: DateWindow) -> Result<PeriodStats, RepositoryError> {
        Ok(self.read(format!("period_stats({})", window_arg(window))).await?.period_stats)
    }

    async fn fraud_trend(
        &self,
        window: DateWindow,
    ) -> Result<Vec<FraudTrendPoint>, RepositoryError> {
        Ok(self.read(format!("fraud_trend({})", window_arg(window))).await?.fraud_trend)
    }

    async fn fraud_by_gender(
        &self,
        window: DateWindow,
    ) -> Result<Vec<FraudSegment>, RepositoryError> {
        Ok(self.read(format!("fraud_by_gender({})", window_arg(window))).await?.fraud_by_gender)
    }

    async fn fraud_by_hour(&self, window: DateWindow) -> Result<Vec<HourlyFraud>, RepositoryError> {
        Ok(self.read(format!("fraud_by_hour({})", window_arg(window))).await?.fraud_by_hour)
    }

    async fn fraud_by_age(&self, window: DateWindow) -> Result<Vec<FraudSegment>, RepositoryError> {
        Ok(self.read(format!("fraud_by_age({})", window_arg(window))).await?.fraud_by_age)
    }

    async fn fraudulent_clients(
        &self,
        window: DateWindow,
    ) -> Result<Vec<FraudulentClient>, RepositoryError> {
        Ok(self
            .read(format!("fraudulent_clients({})", window_arg(window)))
            .await?
            .fraudulent_clients)
    }

    async fn fraud_comparison(
        &self,
        window: DateWindow,
    ) -> Result<FraudComparison, RepositoryError> {
        Ok(self.read(format!("fraud_comparison({})", window_arg(window))).await?.fraud_comparison)
    }
}
