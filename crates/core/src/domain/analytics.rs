use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub i64);

impl ClientId {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        raw.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| DomainError::UnknownClient(raw.trim().to_string()))
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive date range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DomainError> {
        if start > end {
            return Err(DomainError::InvalidWindow(format!(
                "window start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// The `days`-long window ending on `end`. Fails when the start falls off the calendar.
    pub fn trailing(end: NaiveDate, days: u32) -> Result<Self, DomainError> {
        let span = i64::from(days.max(1)) - 1;
        let start = end
            .checked_sub_signed(Duration::days(span))
            .ok_or_else(|| DomainError::InvalidWindow(format!("{days} days before {end}")))?;
        Ok(Self { start, end })
    }

    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// The window of equal length ending the day before this one starts.
    pub fn preceding(&self) -> Result<Self, DomainError> {
        let out_of_range =
            || DomainError::InvalidWindow(format!("no window precedes {}", self.start));
        let prev_end = self.start.pred_opt().ok_or_else(out_of_range)?;
        let start = prev_end
            .checked_sub_signed(Duration::days(self.len_days() - 1))
            .ok_or_else(out_of_range)?;
        Ok(Self { start, end: prev_end })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateBounds {
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
}

impl DateBounds {
    pub fn clamp(&self, date: NaiveDate) -> NaiveDate {
        date.max(self.min_date).min(self.max_date)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverviewStats {
    pub total_clients: i64,
    pub total_transaction_volume: Decimal,
    pub total_transactions: i64,
    pub avg_transaction_value: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FraudComparison {
    pub fraud_amount: Decimal,
    pub prev_fraud_amount: Decimal,
    pub fraud_count: i64,
    pub prev_fraud_count: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyComparison {
    pub total_txns: i64,
    pub total_amount: Decimal,
    pub prev_day_total_txns: i64,
    pub prev_day_total_amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientProfile {
    pub client_id: ClientId,
    pub name: String,
    pub current_age: i32,
    pub gender: String,
    pub card_type: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientSpending {
    pub total_spent: Decimal,
    pub total_count: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DayOfWeekActivity {
    pub day_of_week_num: i32,
    pub day_of_week_name: String,
    pub avg_txns_count: Decimal,
    pub avg_txns_amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HourlyAverage {
    pub hour: i32,
    pub avg_txns_count: Decimal,
    pub avg_txns_amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyTotal {
    pub day: NaiveDate,
    pub total_count: i64,
    pub total_amount: Decimal,
}

/// Count and amount for one bucket of a breakdown (gender, age group, merchant category).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentActivity {
    pub segment: String,
    pub transaction_count: i64,
    pub total_amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HourlyActivity {
    pub hour: i32,
    pub transaction_count: i64,
    pub total_amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientSpend {
    pub client_id: ClientId,
    pub transaction_count: i64,
    pub total_spent: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodStats {
    pub fraud_amount: Decimal,
    pub total_amount: Decimal,
    pub fraud_txns: i64,
    pub total_txns: i64,
    pub avg_fraud_amount: Option<Decimal>,
}

impl PeriodStats {
    /// Fraudulent share of transactions as a percentage, zero for an empty period.
    pub fn fraud_rate_pct(&self) -> Decimal {
        if self.total_txns == 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.fraud_txns) * Decimal::ONE_HUNDRED / Decimal::from(self.total_txns)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FraudTrendPoint {
    pub day: NaiveDate,
    pub fraud_count: i64,
    pub total_count: i64,
    pub fraud_amount: Decimal,
    pub total_amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FraudSegment {
    pub segment: String,
    pub fraud_count: i64,
    pub fraud_amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HourlyFraud {
    pub hour: i32,
    pub total_frauds_in_period: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FraudulentClient {
    pub client_id: ClientId,
    pub fraud_dates: String,
    pub fraud_count: i64,
    pub total_fraud_amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientTransaction {
    pub id: i64,
    pub date: NaiveDateTime,
    pub amount: Decimal,
    pub use_chip: Option<String>,
    pub merchant_city: Option<String>,
    pub merchant_state: Option<String>,
    pub mcc: Option<String>,
    pub is_fraud: bool,
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{ClientId, DateBounds, DateWindow, PeriodStats};
    use crate::errors::DomainError;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn trailing_window_is_inclusive_of_both_ends() {
        let window = DateWindow::trailing(date(2019, 10, 31), 30).expect("window");
        assert_eq!(window.start, date(2019, 10, 2));
        assert_eq!(window.len_days(), 30);
    }

    #[test]
    fn preceding_window_has_equal_length() {
        let window = DateWindow::trailing(date(2019, 10, 31), 7).expect("window");
        let previous = window.preceding().expect("previous window");
        assert_eq!(previous.end, date(2019, 10, 24));
        assert_eq!(previous.start, date(2019, 10, 18));
        assert_eq!(previous.len_days(), 7);
    }

    #[test]
    fn windows_past_the_calendar_start_are_errors() {
        assert!(matches!(
            DateWindow::trailing(date(2019, 12, 31), u32::MAX),
            Err(DomainError::InvalidWindow(_))
        ));

        let first = DateWindow { start: NaiveDate::MIN, end: date(2019, 12, 31) };
        assert!(matches!(first.preceding(), Err(DomainError::InvalidWindow(_))));
    }

    #[test]
    fn inverted_window_is_rejected() {
        assert!(DateWindow::new(date(2019, 2, 1), date(2019, 1, 1)).is_err());
    }

    #[test]
    fn bounds_clamp_dates_into_dataset_range() {
        let bounds = DateBounds { min_date: date(2010, 1, 1), max_date: date(2019, 10, 31) };
        assert_eq!(bounds.clamp(date(2024, 5, 5)), date(2019, 10, 31));
        assert_eq!(bounds.clamp(date(2001, 5, 5)), date(2010, 1, 1));
        assert_eq!(bounds.clamp(date(2015, 5, 5)), date(2015, 5, 5));
    }

    #[test]
    fn client_id_rejects_non_numeric_input() {
        assert_eq!(ClientId::parse(" 1556 "), Ok(ClientId(1556)));
        assert!(ClientId::parse("abc").is_err());
    }

    #[test]
    fn fraud_rate_handles_empty_period() {
        assert_eq!(PeriodStats::default().fraud_rate_pct(), Decimal::ZERO);
        let stats = PeriodStats { fraud_txns: 5, total_txns: 200, ..PeriodStats::default() };
        assert_eq!(stats.fraud_rate_pct(), Decimal::new(25, 1));
    }
}
