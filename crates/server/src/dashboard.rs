//! Transaction dashboard.
//!
//! JSON endpoints (one per tab):
//! - `GET /api/overview`
//! - `GET /api/daily?date=YYYY-MM-DD`
//! - `GET /api/fraud?days=N` or `?start=YYYY-MM-DD&end=YYYY-MM-DD`
//! - `GET /api/client/{client_id}`
//! - `GET /api/date-range`
//!
//! HTML: `GET /?tab=overview|fraud|daily|client&...` with the same query parameters.
//!
//! Query groups are cached with a fixed time-to-live and never invalidated by hand.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use moka::future::Cache;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use thiserror::Error;
use tracing::{error, info};

use banklens_core::config::DashboardConfig;
use banklens_core::domain::analytics::{
    ClientId, ClientProfile, ClientSpend, ClientSpending, ClientTransaction, DailyComparison,
    DailyTotal, DateBounds, DateWindow, DayOfWeekActivity, FraudComparison, FraudSegment,
    FraudTrendPoint, FraudulentClient, HourlyActivity, HourlyAverage, HourlyFraud,
    OverviewStats, PeriodStats, SegmentActivity,
};
use banklens_core::errors::DomainError;
use banklens_core::format;
use banklens_core::summaries::DEFAULT_FRAUD_DAYS;
use banklens_db::{RepositoryError, TransactionRepository};

const PAGE_TEMPLATE: &str = "index.html";
pub const TABS: [&str; 4] = ["overview", "fraud", "daily", "client"];

#[derive(Clone, Debug, Serialize)]
pub struct OverviewData {
    pub summary: OverviewStats,
    pub by_dow: Vec<DayOfWeekActivity>,
    pub by_hour: Vec<HourlyAverage>,
    pub daily_trend: Vec<DailyTotal>,
    pub by_gender: Vec<SegmentActivity>,
    pub by_age: Vec<SegmentActivity>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DailyData {
    pub date: NaiveDate,
    pub summary: DailyComparison,
    pub by_hour: Vec<HourlyActivity>,
    pub by_mcc: Vec<SegmentActivity>,
    pub by_gender: Vec<SegmentActivity>,
    pub by_age: Vec<SegmentActivity>,
    pub top_clients: Vec<ClientSpend>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FraudData {
    pub window: DateWindow,
    pub summary_stats: PeriodStats,
    pub fraud_rate_pct: Decimal,
    pub trend: Vec<FraudTrendPoint>,
    pub by_gender: Vec<FraudSegment>,
    pub avg_by_hour: Vec<HourlyFraud>,
    pub by_age: Vec<FraudSegment>,
    pub fraudulent_clients: Vec<FraudulentClient>,
    pub comparison: FraudComparison,
    pub amount_change_pct: Decimal,
    pub count_change_pct: Decimal,
}

#[derive(Clone, Debug, Serialize)]
pub struct ClientData {
    pub info: ClientProfile,
    pub transactions: Vec<ClientTransaction>,
    pub summary: ClientSpending,
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("query failed: {0}")]
    Repository(#[from] RepositoryError),
    #[error("page rendering failed: {0}")]
    Template(String),
}

impl DashboardError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Domain(DomainError::UnknownClient(_)) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Domain(DomainError::EmptyDataset) => StatusCode::NOT_FOUND,
            Self::Domain(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Repository(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(event_name = "dashboard.request.failed", error = %self, "dashboard query failed");
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

/// Time-to-live caches, one per query group.
#[derive(Clone)]
pub struct DashboardCache {
    overview: Cache<(), Arc<OverviewData>>,
    bounds: Cache<(), Arc<DateBounds>>,
    daily: Cache<NaiveDate, Arc<DailyData>>,
    fraud: Cache<DateWindow, Arc<FraudData>>,
    client: Cache<ClientId, Arc<ClientData>>,
}

impl DashboardCache {
    pub fn new(config: &DashboardConfig) -> Self {
        let overview_ttl = Duration::from_secs(config.overview_ttl_secs);
        let query_ttl = Duration::from_secs(config.query_ttl_secs);
        let capacity = config.max_cached_entries;
        Self {
            overview: ttl_cache(1, overview_ttl),
            bounds: ttl_cache(1, query_ttl),
            daily: ttl_cache(capacity, query_ttl),
            fraud: ttl_cache(capacity, query_ttl),
            client: ttl_cache(capacity, query_ttl),
        }
    }
}

fn ttl_cache<K, V>(capacity: u64, ttl: Duration) -> Cache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    Cache::builder().max_capacity(capacity.max(1)).time_to_live(ttl).build()
}

async fn cached<K, V, F, Fut>(
    cache: &Cache<K, Arc<V>>,
    key: K,
    load: F,
) -> Result<Arc<V>, DashboardError>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, DashboardError>>,
{
    if let Some(hit) = cache.get(&key).await {
        return Ok(hit);
    }
    let value = Arc::new(load().await?);
    cache.insert(key, value.clone()).await;
    Ok(value)
}

#[derive(Clone)]
pub struct DashboardState {
    repository: Arc<dyn TransactionRepository>,
    cache: DashboardCache,
    templates: Arc<Tera>,
}

impl DashboardState {
    pub fn new(
        repository: Arc<dyn TransactionRepository>,
        config: &DashboardConfig,
    ) -> Result<Self, DashboardError> {
        Ok(Self { repository, cache: DashboardCache::new(config), templates: Arc::new(init_templates()?) })
    }

    pub async fn overview(&self) -> Result<Arc<OverviewData>, DashboardError> {
        let repo = &self.repository;
        cached(&self.cache.overview, (), || async {
            Ok(OverviewData {
                summary: repo.overview_stats().await?,
                by_dow: repo.avg_activity_by_dow().await?,
                by_hour: repo.avg_activity_by_hour().await?,
                daily_trend: repo.overall_daily_trend().await?,
                by_gender: repo.activity_by_gender_overall().await?,
                by_age: repo.activity_by_age_overall().await?,
            })
        })
        .await
    }

    pub async fn date_range(&self) -> Result<Arc<DateBounds>, DashboardError> {
        let repo = &self.repository;
        cached(&self.cache.bounds, (), || async {
            repo.date_bounds().await?.ok_or(DashboardError::Domain(DomainError::EmptyDataset))
        })
        .await
    }

    /// Defaults to the latest day with data and clamps into the dataset's range.
    pub async fn daily(&self, date: Option<&str>) -> Result<Arc<DailyData>, DashboardError> {
        let bounds = self.date_range().await?;
        let day = match date.map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => bounds.clamp(parse_date(raw)?),
            None => bounds.max_date,
        };

        let repo = &self.repository;
        cached(&self.cache.daily, day, || async move {
            Ok(DailyData {
                date: day,
                summary: repo.daily_comparison(day).await?,
                by_hour: repo.activity_by_hour(day).await?,
                by_mcc: repo.activity_by_mcc(day).await?,
                by_gender: repo.gender_activity(day).await?,
                by_age: repo.age_group_activity(day).await?,
                top_clients: repo.top_spending_clients(day).await?,
            })
        })
        .await
    }

    /// An explicit `start`/`end` pair wins over `days`; both are clamped into the dataset.
    pub async fn fraud(&self, period: &PeriodQuery) -> Result<Arc<FraudData>, DashboardError> {
        let bounds = self.date_range().await?;
        let window = resolve_window(period, &bounds)?;

        let repo = &self.repository;
        cached(&self.cache.fraud, window, || async move {
            let summary_stats = repo.period_stats(window).await?;
            let comparison = repo.fraud_comparison(window).await?;
            Ok(FraudData {
                window,
                fraud_rate_pct: summary_stats.fraud_rate_pct().round_dp(2).normalize(),
                summary_stats,
                trend: repo.fraud_trend(window).await?,
                by_gender: repo.fraud_by_gender(window).await?,
                avg_by_hour: repo.fraud_by_hour(window).await?,
                by_age: repo.fraud_by_age(window).await?,
                fraudulent_clients: repo.fraudulent_clients(window).await?,
                amount_change_pct: rounded_change(
                    comparison.fraud_amount,
                    comparison.prev_fraud_amount,
                ),
                count_change_pct: rounded_change(
                    Decimal::from(comparison.fraud_count),
                    Decimal::from(comparison.prev_fraud_count),
                ),
                comparison,
            })
        })
        .await
    }

    pub async fn client(&self, raw_id: &str) -> Result<Arc<ClientData>, DashboardError> {
        let client_id = ClientId::parse(raw_id)?;
        let repo = &self.repository;
        cached(&self.cache.client, client_id, || async move {
            let info = repo
                .client_profile(client_id)
                .await?
                .ok_or_else(|| DomainError::UnknownClient(client_id.to_string()))?;
            Ok(ClientData {
                info,
                transactions: repo.client_transactions(client_id).await?,
                summary: repo.client_spending(client_id).await?,
            })
        })
        .await
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub days: Option<u32>,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DailyQuery {
    pub date: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PageQuery {
    pub tab: Option<String>,
    pub date: Option<String>,
    pub days: Option<u32>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub client_id: Option<String>,
}

fn rounded_change(current: Decimal, previous: Decimal) -> Decimal {
    format::pct_change(current, previous).round_dp(2).normalize()
}

fn parse_date(raw: &str) -> Result<NaiveDate, DashboardError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| DomainError::InvalidDate(raw.trim().to_string()).into())
}

pub fn resolve_window(period: &PeriodQuery, bounds: &DateBounds) -> Result<DateWindow, DashboardError> {
    let start = period.start.as_deref().filter(|raw| !raw.trim().is_empty());
    let end = period.end.as_deref().filter(|raw| !raw.trim().is_empty());
    match (start, end) {
        (Some(start), Some(end)) => {
            let start = bounds.clamp(parse_date(start)?);
            let end = bounds.clamp(parse_date(end)?);
            if start > end {
                return Err(DashboardError::BadRequest(
                    "Start date must be before end date.".to_string(),
                ));
            }
            Ok(DateWindow { start, end })
        }
        (None, None) => {
            let span = (bounds.max_date - bounds.min_date).num_days() + 1;
            let days = period
                .days
                .filter(|days| *days > 0)
                .unwrap_or(DEFAULT_FRAUD_DAYS)
                .min(u32::try_from(span).unwrap_or(u32::MAX));
            let window = DateWindow::trailing(bounds.max_date, days)?;
            Ok(DateWindow { start: bounds.clamp(window.start), end: window.end })
        }
        _ => Err(DashboardError::BadRequest("Provide both start and end dates.".to_string())),
    }
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(page))
        .route("/api/overview", get(overview))
        .route("/api/daily", get(daily))
        .route("/api/fraud", get(fraud))
        .route("/api/client/{client_id}", get(client))
        .route("/api/date-range", get(date_range))
        .with_state(state)
}

async fn overview(State(state): State<DashboardState>) -> Result<Json<OverviewData>, DashboardError> {
    Ok(Json(state.overview().await?.as_ref().clone()))
}

async fn daily(
    State(state): State<DashboardState>,
    Query(query): Query<DailyQuery>,
) -> Result<Json<DailyData>, DashboardError> {
    Ok(Json(state.daily(query.date.as_deref()).await?.as_ref().clone()))
}

async fn fraud(
    State(state): State<DashboardState>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<FraudData>, DashboardError> {
    Ok(Json(state.fraud(&query).await?.as_ref().clone()))
}

async fn client(
    State(state): State<DashboardState>,
    Path(client_id): Path<String>,
) -> Result<Json<ClientData>, DashboardError> {
    Ok(Json(state.client(&client_id).await?.as_ref().clone()))
}

async fn date_range(State(state): State<DashboardState>) -> Result<Json<DateBounds>, DashboardError> {
    Ok(Json(*state.date_range().await?))
}

async fn page(
    State(state): State<DashboardState>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, (StatusCode, Html<String>)> {
    let tab = query
        .tab
        .as_deref()
        .map(str::trim)
        .filter(|tab| TABS.contains(tab))
        .unwrap_or(TABS[0])
        .to_string();

    let mut context = Context::new();
    context.insert("tab", &tab);
    context.insert("tabs", &TABS);

    let outcome = match tab.as_str() {
        "fraud" => {
            let period =
                PeriodQuery { days: query.days, start: query.start.clone(), end: query.end.clone() };
            state.fraud(&period).await.map(|data| context.insert("fraud", data.as_ref()))
        }
        "daily" => state
            .daily(query.date.as_deref())
            .await
            .map(|data| context.insert("daily", data.as_ref())),
        "client" => match query.client_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            Some(client_id) => {
                context.insert("client_id", client_id);
                state.client(client_id).await.map(|data| context.insert("client", data.as_ref()))
            }
            None => Ok(()),
        },
        _ => state.overview().await.map(|data| context.insert("overview", data.as_ref())),
    };

    let status = match outcome {
        Ok(()) => StatusCode::OK,
        Err(error) => {
            let status = error.status();
            if status.is_server_error() {
                error!(event_name = "dashboard.page.failed", tab = %tab, error = %error, "page data failed");
            }
            context.insert("error", &error.to_string());
            status
        }
    };

    info!(event_name = "dashboard.page.rendered", tab = %tab, status = status.as_u16(), "dashboard page");
    let html = state.templates.render(PAGE_TEMPLATE, &context).map_err(|error| {
        error!(event_name = "dashboard.page.template_failed", error = %error, "template render failed");
        (StatusCode::INTERNAL_SERVER_ERROR, Html("<h1>Dashboard unavailable</h1>".to_string()))
    })?;
    if status.is_success() {
        Ok(Html(html))
    } else {
        Err((status, Html(html)))
    }
}

fn init_templates() -> Result<Tera, DashboardError> {
    let mut tera = Tera::default();
    tera.register_filter("money", money_filter);
    tera.register_filter("count", count_filter);
    tera.add_raw_template(PAGE_TEMPLATE, include_str!("../../../templates/dashboard/index.html.tera"))
        .map_err(|error| DashboardError::Template(error.to_string()))?;
    Ok(tera)
}

fn decimal_of(value: &tera::Value) -> Decimal {
    match value {
        tera::Value::Number(number) => {
            number.as_f64().and_then(|float| Decimal::try_from(float).ok()).unwrap_or_default()
        }
        tera::Value::String(text) => Decimal::from_str(text).unwrap_or_default(),
        _ => Decimal::ZERO,
    }
}

/// `{{ value | money }}` renders `$1,234.56`; `dp` picks the decimal places.
fn money_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let dp = args.get("dp").and_then(tera::Value::as_u64).unwrap_or(2) as u32;
    Ok(tera::Value::String(format!("${}", format::money(decimal_of(value), dp))))
}

fn count_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let whole: i64 = decimal_of(value).round().try_into().unwrap_or(0);
    Ok(tera::Value::String(format::count(whole)))
}
