//! Chat-ready text summaries built from analytics rows.
//!
//! Every function here is pure: the caller fetches rows and supplies `today`, so the
//! same inputs always render the same text.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::analytics::{
    ClientProfile, ClientSpending, DailyComparison, DateBounds, DateWindow, FraudComparison,
    OverviewStats,
};
use crate::errors::DomainError;
use crate::format;

pub const DEFAULT_FRAUD_DAYS: u32 = 30;

pub fn overview_summary(stats: &OverviewStats) -> String {
    format!(
        "🏦 *Overview Summary*\n\
         - Total Volume: ${}\n\
         - Transactions: {}\n\
         - Active Clients: {}\n\
         - Avg. Txn Value: ${}",
        format::money(stats.total_transaction_volume, 0),
        format::count(stats.total_transactions),
        format::count(stats.total_clients),
        format::fixed(stats.avg_transaction_value, 2),
    )
}

/// Reads the day count from a command argument; anything but a positive integer means 30.
pub fn parse_fraud_days(arg: Option<&str>) -> u32 {
    arg.map(str::trim)
        .filter(|raw| !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()))
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|days| *days > 0)
        .unwrap_or(DEFAULT_FRAUD_DAYS)
}

/// The `days`-long window ending at the earlier of `today` and the last transaction date.
pub fn fraud_window(
    days: u32,
    today: NaiveDate,
    bounds: &DateBounds,
) -> Result<DateWindow, DomainError> {
    DateWindow::trailing(today.min(bounds.max_date), days)
}

pub fn fraud_summary(days: u32, comparison: &FraudComparison) -> String {
    let pct_amount = format::pct_change(comparison.fraud_amount, comparison.prev_fraud_amount);
    let pct_count = format::pct_change(
        Decimal::from(comparison.fraud_count),
        Decimal::from(comparison.prev_fraud_count),
    );

    format!(
        "🚨 *Fraud Summary ({days}d)*\n\
         - Fraud Amount: ${} ({}% vs. prior)\n\
         - Fraud Count: {} ({}% vs. prior)",
        format::money(comparison.fraud_amount, 0),
        format::fixed(pct_amount, 1),
        format::count(comparison.fraud_count),
        format::fixed(pct_count, 1),
    )
}

/// Resolves the requested day (default `today`) and clamps it into the dataset bounds.
pub fn resolve_daily_date(
    arg: Option<&str>,
    today: NaiveDate,
    bounds: &DateBounds,
) -> Result<NaiveDate, DomainError> {
    let requested = match arg.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| DomainError::InvalidDate(raw.to_string()))?,
        None => today,
    };
    Ok(bounds.clamp(requested))
}

pub fn daily_summary(date: NaiveDate, comparison: &DailyComparison) -> String {
    let delta_amount = comparison.total_amount - comparison.prev_day_total_amount;
    let delta_txns = comparison.total_txns - comparison.prev_day_total_txns;

    format!(
        "📅 *Daily Summary for {}*\n\
         - Total Amount: ${} ({} vs. prev)\n\
         - Transactions: {} ({} vs. prev)",
        date.format("%Y-%m-%d"),
        format::money(comparison.total_amount, 2),
        format::signed_money(delta_amount, 2),
        format::count(comparison.total_txns),
        format::signed_count(delta_txns),
    )
}

pub fn client_summary(profile: &ClientProfile, spending: &ClientSpending) -> String {
    format!(
        "👤 *Client {} Summary*\n\
         - Name: {}\n\
         - Age/Gender: {}/{}\n\
         - Card Type: {}\n\
         - Lifetime Txns: {}, Spent: ${}",
        profile.client_id,
        profile.name,
        profile.current_age,
        profile.gender,
        format::title_case(&profile.card_type),
        format::count(spending.total_count),
        format::money(spending.total_spent, 2),
    )
}

pub fn append_dashboard_link(text: &str, dashboard_url: &str) -> String {
    format!("{text}\n\n🔗 *View full dashboard:* {dashboard_url}")
}

/// Static description of the dashboard posted when a user presses "Overview".
pub fn dashboard_overview(dashboard_url: &str) -> String {
    format!(
        "📊 *XYZ Bank Smart Transaction Dashboard*\n\
         Our dashboard streamlines monitoring and analysis of card-transaction data:\n\
         • **Overview** – company-wide KPIs, long-term trends and demographics\n\
         • **Fraud Analysis** – period-based fraud patterns, rates and high-risk clients\n\
         • **Daily Snapshot** – one-day KPIs, merchant-category insights, demographic mix\n\
         • **Client Deep-Dive** – 360° client profile with lifetime history\n\n\
         *Key capabilities*\n\
         • Real-time database connection (PostgreSQL) with 10-minute caching\n\
         • Interactive charts, filters & drill-downs\n\
         • Slack slash-commands for quick access\n\
         • Built with Rust, axum and the Slack Web API\n\
         ────────────────────────────\n\
         🔗 *Open full dashboard:* {dashboard_url}"
    )
}
