use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use sqlx::{postgres::PgRow, Row};

use banklens_core::domain::analytics::{
    ClientId, ClientProfile, ClientSpend, ClientSpending, ClientTransaction, DailyComparison,
    DailyTotal, DateBounds, DateWindow, DayOfWeekActivity, FraudComparison, FraudSegment,
    FraudTrendPoint, FraudulentClient, HourlyActivity, HourlyAverage, HourlyFraud,
    OverviewStats, PeriodStats, SegmentActivity,
};

use super::{RepositoryError, TransactionRepository};
use crate::DbPool;

const AGE_GROUP_CASE: &str = "CASE \
        WHEN u.current_age < 20 THEN '<20' \
        WHEN u.current_age BETWEEN 20 AND 29 THEN '20-29' \
        WHEN u.current_age BETWEEN 30 AND 39 THEN '30-39' \
        WHEN u.current_age BETWEEN 40 AND 49 THEN '40-49' \
        WHEN u.current_age BETWEEN 50 AND 59 THEN '50-59' \
        WHEN u.current_age BETWEEN 60 AND 69 THEN '60-69' \
        ELSE '70+' \
    END";

const OVERVIEW_SQL: &str = r#"
SELECT
    COUNT(DISTINCT t.client_id)::bigint AS total_clients,
    COALESCE(SUM(t.amount), 0)::numeric AS total_transaction_volume,
    COUNT(t.id)::bigint AS total_transactions,
    COALESCE(AVG(t.amount), 0)::numeric AS avg_transaction_value
FROM transactions_data t
"#;

const AVG_BY_DOW_SQL: &str = r#"
WITH daily_dow_summary AS (
    SELECT
        t.date::date AS day,
        EXTRACT(DOW FROM t.date)::int AS day_of_week_num,
        CASE EXTRACT(DOW FROM t.date)
            WHEN 0 THEN 'Sunday' WHEN 1 THEN 'Monday' WHEN 2 THEN 'Tuesday'
            WHEN 3 THEN 'Wednesday' WHEN 4 THEN 'Thursday' WHEN 5 THEN 'Friday'
            WHEN 6 THEN 'Saturday'
        END AS day_of_week_name,
        COUNT(t.id) AS total_count,
        SUM(t.amount) AS total_amount
    FROM transactions_data t
    GROUP BY day, day_of_week_num, day_of_week_name
)
SELECT
    day_of_week_num,
    day_of_week_name,
    AVG(total_count)::numeric AS avg_txns_count,
    AVG(total_amount)::numeric AS avg_txns_amount
FROM daily_dow_summary
GROUP BY day_of_week_num, day_of_week_name
ORDER BY day_of_week_num
"#;

const AVG_BY_HOUR_SQL: &str = r#"
SELECT
    EXTRACT(HOUR FROM date)::int AS hour,
    (COUNT(id) / CAST(COUNT(DISTINCT date::date) AS NUMERIC))::numeric AS avg_txns_count,
    (SUM(amount) / CAST(COUNT(DISTINCT date::date) AS NUMERIC))::numeric AS avg_txns_amount
FROM transactions_data
GROUP BY hour
ORDER BY hour
"#;

const DAILY_TREND_SQL: &str = r#"
SELECT
    date::date AS day,
    COUNT(id)::bigint AS total_count,
    COALESCE(SUM(amount), 0)::numeric AS total_amount
FROM transactions_data
GROUP BY day
ORDER BY day
"#;

const GENDER_OVERALL_SQL: &str = r#"
SELECT u.gender::text AS segment, COUNT(t.id)::bigint AS transaction_count,
       COALESCE(SUM(t.amount), 0)::numeric AS total_amount
FROM transactions_data t
JOIN users_data u ON t.client_id = u.id
GROUP BY u.gender
"#;

const DAILY_COMPARISON_SQL: &str = r#"
SELECT
    COALESCE(SUM(CASE WHEN t.date::date = CAST($1 AS DATE) THEN 1 ELSE 0 END), 0)::bigint AS total_txns,
    COALESCE(SUM(CASE WHEN t.date::date = CAST($1 AS DATE) THEN t.amount ELSE 0 END), 0)::numeric AS total_amount,
    COALESCE(SUM(CASE WHEN t.date::date = CAST($1 AS DATE) - INTERVAL '1 day' THEN 1 ELSE 0 END), 0)::bigint AS prev_day_total_txns,
    COALESCE(SUM(CASE WHEN t.date::date = CAST($1 AS DATE) - INTERVAL '1 day' THEN t.amount ELSE 0 END), 0)::numeric AS prev_day_total_amount
FROM transactions_data t
WHERE t.date::date = CAST($1 AS DATE) OR t.date::date = CAST($1 AS DATE) - INTERVAL '1 day'
"#;

const MCC_SQL: &str = r#"
SELECT m.description::text AS segment, COUNT(t.id)::bigint AS transaction_count,
       COALESCE(SUM(t.amount), 0)::numeric AS total_amount
FROM transactions_data t
JOIN mcc_codes m ON t.mcc::text = m.mcc_code::text
WHERE t.date::date = $1
GROUP BY m.description
ORDER BY transaction_count DESC
LIMIT 10
"#;

const HOURLY_SQL: &str = r#"
SELECT EXTRACT(HOUR FROM t.date)::int AS hour, COUNT(t.id)::bigint AS transaction_count,
       COALESCE(SUM(t.amount), 0)::numeric AS total_amount
FROM transactions_data t
WHERE t.date::date = $1
GROUP BY hour
ORDER BY hour
"#;

const GENDER_DAILY_SQL: &str = r#"
SELECT u.gender::text AS segment, COUNT(t.id)::bigint AS transaction_count,
       COALESCE(SUM(t.amount), 0)::numeric AS total_amount
FROM transactions_data t
JOIN users_data u ON t.client_id = u.id
WHERE t.date::date = $1
GROUP BY u.gender
"#;

const TOP_CLIENTS_SQL: &str = r#"
SELECT t.client_id::bigint AS client_id, COUNT(*)::bigint AS transaction_count,
       COALESCE(SUM(t.amount), 0)::numeric AS total_spent
FROM transactions_data t
WHERE t.date::date = $1
GROUP BY t.client_id
ORDER BY total_spent DESC
LIMIT 20
"#;

const DATE_BOUNDS_SQL: &str = r#"
SELECT MIN(date)::date AS min_date, MAX(date)::date AS max_date
FROM transactions_data
"#;

const CLIENT_PROFILE_SQL: &str = r#"
SELECT u.id::bigint AS client_id, u.id::text AS name, u.current_age::int AS current_age,
       u.gender::text AS gender, c.card_type::text AS card_type
FROM users_data u
JOIN cards_data c ON u.id = c.client_id
WHERE u.id = $1
LIMIT 1
"#;

const CLIENT_SPENDING_SQL: &str = r#"
SELECT COALESCE(SUM(amount), 0)::numeric AS total_spent, COUNT(t.id)::bigint AS total_count
FROM transactions_data t
WHERE t.client_id = $1
"#;

const CLIENT_TRANSACTIONS_SQL: &str = r#"
SELECT t.id::bigint AS id, t.date::timestamp AS date, t.amount::numeric AS amount,
       t.use_chip::text AS use_chip, t.merchant_city::text AS merchant_city,
       t.merchant_state::text AS merchant_state, t.mcc::text AS mcc,
       (f.target = 'Yes') IS TRUE AS is_fraud
FROM transactions_data t
LEFT JOIN train_fraud_labels f ON t.id = f.id
WHERE t.client_id = $1
ORDER BY t.date DESC
"#;

const PERIOD_STATS_SQL: &str = r#"
SELECT
    COALESCE(SUM(CASE WHEN f.target = 'Yes' THEN amount ELSE 0 END), 0)::numeric AS fraud_amount,
    COALESCE(SUM(amount), 0)::numeric AS total_amount,
    COUNT(CASE WHEN f.target = 'Yes' THEN 1 END)::bigint AS fraud_txns,
    COUNT(t.id)::bigint AS total_txns,
    AVG(CASE WHEN f.target = 'Yes' THEN amount END)::numeric AS avg_fraud_amount
FROM transactions_data t
LEFT JOIN train_fraud_labels f ON t.id = f.id
WHERE t.date::date BETWEEN $1 AND $2
"#;

const FRAUD_TREND_SQL: &str = r#"
SELECT
    t.date::date AS day,
    COUNT(CASE WHEN f.target = 'Yes' THEN 1 END)::bigint AS fraud_count,
    COUNT(t.id)::bigint AS total_count,
    COALESCE(SUM(CASE WHEN f.target = 'Yes' THEN t.amount ELSE 0 END), 0)::numeric AS fraud_amount,
    COALESCE(SUM(t.amount), 0)::numeric AS total_amount
FROM transactions_data t
LEFT JOIN train_fraud_labels f ON t.id = f.id
WHERE t.date::date BETWEEN $1 AND $2
GROUP BY day
ORDER BY day
"#;

const FRAUD_BY_GENDER_SQL: &str = r#"
SELECT u.gender::text AS segment, COUNT(*)::bigint AS fraud_count,
       COALESCE(SUM(t.amount), 0)::numeric AS fraud_amount
FROM transactions_data t
JOIN train_fraud_labels f ON t.id = f.id AND f.target = 'Yes'
JOIN users_data u ON t.client_id = u.id
WHERE t.date::date BETWEEN $1 AND $2
GROUP BY u.gender
"#;

const FRAUD_BY_HOUR_SQL: &str = r#"
SELECT EXTRACT(HOUR FROM t.date)::int AS hour, COUNT(*)::bigint AS total_frauds_in_period
FROM transactions_data t
JOIN train_fraud_labels f ON t.id = f.id AND f.target = 'Yes'
WHERE t.date::date BETWEEN $1 AND $2
GROUP BY hour
ORDER BY hour
"#;

const FRAUDULENT_CLIENTS_SQL: &str = r#"
SELECT
    t.client_id::bigint AS client_id,
    STRING_AGG(DISTINCT TO_CHAR(t.date, 'YYYY-MM-DD'), ', ' ORDER BY TO_CHAR(t.date, 'YYYY-MM-DD')) AS fraud_dates,
    COUNT(*)::bigint AS fraud_count,
    COALESCE(SUM(t.amount), 0)::numeric AS total_fraud_amount
FROM transactions_data t
JOIN train_fraud_labels f ON t.id = f.id AND f.target = 'Yes'
WHERE t.date::date BETWEEN $1 AND $2
GROUP BY t.client_id
ORDER BY total_fraud_amount DESC
"#;

const FRAUD_COMPARISON_SQL: &str = r#"
WITH date_params AS (
    SELECT
        CAST($1 AS DATE) AS current_start,
        CAST($2 AS DATE) AS current_end,
        CAST($1 AS DATE) - (CAST($2 AS DATE) - CAST($1 AS DATE) + 1) AS prev_start,
        CAST($1 AS DATE) - 1 AS prev_end
)
SELECT
    COALESCE(SUM(CASE WHEN t.date::date BETWEEN dp.current_start AND dp.current_end THEN t.amount END), 0)::numeric AS fraud_amount,
    COALESCE(SUM(CASE WHEN t.date::date BETWEEN dp.prev_start AND dp.prev_end THEN t.amount END), 0)::numeric AS prev_fraud_amount,
    COUNT(CASE WHEN t.date::date BETWEEN dp.current_start AND dp.current_end THEN 1 END)::bigint AS fraud_count,
    COUNT(CASE WHEN t.date::date BETWEEN dp.prev_start AND dp.prev_end THEN 1 END)::bigint AS prev_fraud_count
FROM transactions_data t
JOIN train_fraud_labels f ON t.id = f.id AND f.target = 'Yes'
CROSS JOIN date_params dp
WHERE t.date::date BETWEEN dp.prev_start AND dp.current_end
"#;

fn age_group_sql(filter: &str, count_alias: &str, amount_alias: &str, fraud_only: bool) -> String {
    let fraud_join = if fraud_only {
        "JOIN train_fraud_labels f ON t.id = f.id AND f.target = 'Yes'\n"
    } else {
        ""
    };
    format!(
        "SELECT {AGE_GROUP_CASE} AS segment,\n\
         COUNT(t.id)::bigint AS {count_alias},\n\
         COALESCE(SUM(t.amount), 0)::numeric AS {amount_alias}\n\
         FROM transactions_data t\n\
         {fraud_join}\
         JOIN users_data u ON t.client_id = u.id\n\
         {filter}\n\
         GROUP BY segment\n\
         ORDER BY segment"
    )
}

pub struct SqlTransactionRepository {
    pool: DbPool,
}

impl SqlTransactionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn segments_on(
        &self,
        sql: &str,
        day: NaiveDate,
    ) -> Result<Vec<SegmentActivity>, RepositoryError> {
        let rows = sqlx::query(sql).bind(day).fetch_all(&self.pool).await?;
        rows.iter().map(segment_from_row).collect()
    }

    async fn fraud_segments(
        &self,
        sql: &str,
        window: DateWindow,
    ) -> Result<Vec<FraudSegment>, RepositoryError> {
        let rows = sqlx::query(sql)
            .bind(window.start)
            .bind(window.end)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(fraud_segment_from_row).collect()
    }
}

#[async_trait]
impl TransactionRepository for SqlTransactionRepository {
    async fn overview_stats(&self) -> Result<OverviewStats, RepositoryError> {
        let row = sqlx::query(OVERVIEW_SQL).fetch_one(&self.pool).await?;
        Ok(OverviewStats {
            total_clients: row.try_get("total_clients")?,
            total_transaction_volume: row.try_get("total_transaction_volume")?,
            total_transactions: row.try_get("total_transactions")?,
            avg_transaction_value: row.try_get("avg_transaction_value")?,
        })
    }

    async fn avg_activity_by_dow(&self) -> Result<Vec<DayOfWeekActivity>, RepositoryError> {
        let rows = sqlx::query(AVG_BY_DOW_SQL).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<_, RepositoryError> {
                Ok(DayOfWeekActivity {
                    day_of_week_num: row.try_get("day_of_week_num")?,
                    day_of_week_name: row.try_get("day_of_week_name")?,
                    avg_txns_count: decimal_or_zero(row, "avg_txns_count")?,
                    avg_txns_amount: decimal_or_zero(row, "avg_txns_amount")?,
                })
            })
            .collect()
    }

    async fn avg_activity_by_hour(&self) -> Result<Vec<HourlyAverage>, RepositoryError> {
        let rows = sqlx::query(AVG_BY_HOUR_SQL).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<_, RepositoryError> {
                Ok(HourlyAverage {
                    hour: row.try_get("hour")?,
                    avg_txns_count: decimal_or_zero(row, "avg_txns_count")?,
                    avg_txns_amount: decimal_or_zero(row, "avg_txns_amount")?,
                })
            })
            .collect()
    }

    async fn overall_daily_trend(&self) -> Result<Vec<DailyTotal>, RepositoryError> {
        let rows = sqlx::query(DAILY_TREND_SQL).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<_, RepositoryError> {
                Ok(DailyTotal {
                    day: row.try_get("day")?,
                    total_count: row.try_get("total_count")?,
                    total_amount: row.try_get("total_amount")?,
                })
            })
            .collect()
    }

    async fn activity_by_gender_overall(&self) -> Result<Vec<SegmentActivity>, RepositoryError> {
        let rows = sqlx::query(GENDER_OVERALL_SQL).fetch_all(&self.pool).await?;
        rows.iter().map(segment_from_row).collect()
    }

    async fn activity_by_age_overall(&self) -> Result<Vec<SegmentActivity>, RepositoryError> {
        let sql = age_group_sql("", "transaction_count", "total_amount", false);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(segment_from_row).collect()
    }

    async fn daily_comparison(&self, day: NaiveDate) -> Result<DailyComparison, RepositoryError> {
        let row = sqlx::query(DAILY_COMPARISON_SQL).bind(day).fetch_one(&self.pool).await?;
        Ok(DailyComparison {
            total_txns: row.try_get("total_txns")?,
            total_amount: row.try_get("total_amount")?,
            prev_day_total_txns: row.try_get("prev_day_total_txns")?,
            prev_day_total_amount: row.try_get("prev_day_total_amount")?,
        })
    }

    async fn activity_by_mcc(
        &self,
        day: NaiveDate,
    ) -> Result<Vec<SegmentActivity>, RepositoryError> {
        self.segments_on(MCC_SQL, day).await
    }

    async fn activity_by_hour(
        &self,
        day: NaiveDate,
    ) -> Result<Vec<HourlyActivity>, RepositoryError> {
        let rows = sqlx::query(HOURLY_SQL).bind(day).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<_, RepositoryError> {
                Ok(HourlyActivity {
                    hour: row.try_get("hour")?,
                    transaction_count: row.try_get("transaction_count")?,
                    total_amount: row.try_get("total_amount")?,
                })
            })
            .collect()
    }

    async fn gender_activity(
        &self,
        day: NaiveDate,
    ) -> Result<Vec<SegmentActivity>, RepositoryError> {
        self.segments_on(GENDER_DAILY_SQL, day).await
    }

    async fn age_group_activity(
        &self,
        day: NaiveDate,
    ) -> Result<Vec<SegmentActivity>, RepositoryError> {
        let sql =
            age_group_sql("WHERE t.date::date = $1", "transaction_count", "total_amount", false);
        self.segments_on(&sql, day).await
    }

    async fn top_spending_clients(
        &self,
        day: NaiveDate,
    ) -> Result<Vec<ClientSpend>, RepositoryError> {
        let rows = sqlx::query(TOP_CLIENTS_SQL).bind(day).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<_, RepositoryError> {
                Ok(ClientSpend {
                    client_id: ClientId(row.try_get("client_id")?),
                    transaction_count: row.try_get("transaction_count")?,
                    total_spent: row.try_get("total_spent")?,
                })
            })
            .collect()
    }

    async fn date_bounds(&self) -> Result<Option<DateBounds>, RepositoryError> {
        let row = sqlx::query(DATE_BOUNDS_SQL).fetch_one(&self.pool).await?;
        let min_date: Option<NaiveDate> = row.try_get("min_date")?;
        let max_date: Option<NaiveDate> = row.try_get("max_date")?;
        Ok(min_date.zip(max_date).map(|(min_date, max_date)| DateBounds { min_date, max_date }))
    }

    async fn client_profile(
        &self,
        client_id: ClientId,
    ) -> Result<Option<ClientProfile>, RepositoryError> {
        let row =
            sqlx::query(CLIENT_PROFILE_SQL).bind(client_id.0).fetch_optional(&self.pool).await?;
        row.map(|row| -> Result<_, RepositoryError> {
            Ok(ClientProfile {
                client_id: ClientId(row.try_get("client_id")?),
                name: row.try_get("name")?,
                current_age: row.try_get("current_age")?,
                gender: row.try_get::<Option<String>, _>("gender")?.unwrap_or_default(),
                card_type: row.try_get::<Option<String>, _>("card_type")?.unwrap_or_default(),
            })
        })
        .transpose()
    }

    async fn client_spending(
        &self,
        client_id: ClientId,
    ) -> Result<ClientSpending, RepositoryError> {
        let row = sqlx::query(CLIENT_SPENDING_SQL).bind(client_id.0).fetch_one(&self.pool).await?;
        Ok(ClientSpending {
            total_spent: row.try_get("total_spent")?,
            total_count: row.try_get("total_count")?,
        })
    }

    async fn client_transactions(
        &self,
        client_id: ClientId,
    ) -> Result<Vec<ClientTransaction>, RepositoryError> {
        let rows =
            sqlx::query(CLIENT_TRANSACTIONS_SQL).bind(client_id.0).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<_, RepositoryError> {
                let date: NaiveDateTime = row.try_get("date")?;
                Ok(ClientTransaction {
                    id: row.try_get("id")?,
                    date,
                    amount: decimal_or_zero(row, "amount")?,
                    use_chip: row.try_get("use_chip")?,
                    merchant_city: row.try_get("merchant_city")?,
                    merchant_state: row.try_get("merchant_state")?,
                    mcc: row.try_get("mcc")?,
                    is_fraud: row.try_get("is_fraud")?,
                })
            })
            .collect()
    }

    async fn period_stats(&self, window: DateWindow) -> Result<PeriodStats, RepositoryError> {
        let row = sqlx::query(PERIOD_STATS_SQL)
            .bind(window.start)
            .bind(window.end)
            .fetch_one(&self.pool)
            .await?;
        Ok(PeriodStats {
            fraud_amount: row.try_get("fraud_amount")?,
            total_amount: row.try_get("total_amount")?,
            fraud_txns: row.try_get("fraud_txns")?,
            total_txns: row.try_get("total_txns")?,
            avg_fraud_amount: row.try_get("avg_fraud_amount")?,
        })
    }

    async fn fraud_trend(
        &self,
        window: DateWindow,
    ) -> Result<Vec<FraudTrendPoint>, RepositoryError> {
        let rows = sqlx::query(FRAUD_TREND_SQL)
            .bind(window.start)
            .bind(window.end)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| -> Result<_, RepositoryError> {
                Ok(FraudTrendPoint {
                    day: row.try_get("day")?,
                    fraud_count: row.try_get("fraud_count")?,
                    total_count: row.try_get("total_count")?,
                    fraud_amount: row.try_get("fraud_amount")?,
                    total_amount: row.try_get("total_amount")?,
                })
            })
            .collect()
    }

    async fn fraud_by_gender(
        &self,
        window: DateWindow,
    ) -> Result<Vec<FraudSegment>, RepositoryError> {
        self.fraud_segments(FRAUD_BY_GENDER_SQL, window).await
    }

    async fn fraud_by_hour(&self, window: DateWindow) -> Result<Vec<HourlyFraud>, RepositoryError> {
        let rows = sqlx::query(FRAUD_BY_HOUR_SQL)
            .bind(window.start)
            .bind(window.end)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| -> Result<_, RepositoryError> {
                Ok(HourlyFraud {
                    hour: row.try_get("hour")?,
                    total_frauds_in_period: row.try_get("total_frauds_in_period")?,
                })
            })
            .collect()
    }

    async fn fraud_by_age(&self, window: DateWindow) -> Result<Vec<FraudSegment>, RepositoryError> {
        let sql = age_group_sql(
            "WHERE t.date::date BETWEEN $1 AND $2",
            "fraud_count",
            "fraud_amount",
            true,
        );
        self.fraud_segments(&sql, window).await
    }

    async fn fraudulent_clients(
        &self,
        window: DateWindow,
    ) -> Result<Vec<FraudulentClient>, RepositoryError> {
        let rows = sqlx::query(FRAUDULENT_CLIENTS_SQL)
            .bind(window.start)
            .bind(window.end)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| -> Result<_, RepositoryError> {
                Ok(FraudulentClient {
                    client_id: ClientId(row.try_get("client_id")?),
                    fraud_dates: row
                        .try_get::<Option<String>, _>("fraud_dates")?
                        .unwrap_or_default(),
                    fraud_count: row.try_get("fraud_count")?,
                    total_fraud_amount: row.try_get("total_fraud_amount")?,
                })
            })
            .collect()
    }

    async fn fraud_comparison(
        &self,
        window: DateWindow,
    ) -> Result<FraudComparison, RepositoryError> {
        let row = sqlx::query(FRAUD_COMPARISON_SQL)
            .bind(window.start)
            .bind(window.end)
            .fetch_one(&self.pool)
            .await?;
        Ok(FraudComparison {
            fraud_amount: row.try_get("fraud_amount")?,
            prev_fraud_amount: row.try_get("prev_fraud_amount")?,
            fraud_count: row.try_get("fraud_count")?,
            prev_fraud_count: row.try_get("prev_fraud_count")?,
        })
    }
}

fn segment_from_row(row: &PgRow) -> Result<SegmentActivity, RepositoryError> {
    Ok(SegmentActivity {
        segment: segment_label(row)?,
        transaction_count: row.try_get("transaction_count")?,
        total_amount: row.try_get("total_amount")?,
    })
}

fn fraud_segment_from_row(row: &PgRow) -> Result<FraudSegment, RepositoryError> {
    Ok(FraudSegment {
        segment: segment_label(row)?,
        fraud_count: row.try_get("fraud_count")?,
        fraud_amount: row.try_get("fraud_amount")?,
    })
}

fn segment_label(row: &PgRow) -> Result<String, RepositoryError> {
    let label: Option<String> = row.try_get("segment")?;
    Ok(label.unwrap_or_else(|| "Unknown".to_string()))
}

fn decimal_or_zero(row: &PgRow, column: &str) -> Result<Decimal, RepositoryError> {
    let value: Option<Decimal> = row.try_get(column)?;
    Ok(value.unwrap_or(Decimal::ZERO))
}

#[cfg(test)]
mod tests {
    use super::{age_group_sql, FRAUD_COMPARISON_SQL, MCC_SQL};

    #[test]
    fn age_group_query_adds_fraud_join_only_when_requested() {
        let plain = age_group_sql("", "transaction_count", "total_amount", false);
        assert!(!plain.contains("train_fraud_labels"));
        assert!(plain.contains("ELSE '70+'"));

        let fraud = age_group_sql(
            "WHERE t.date::date BETWEEN $1 AND $2",
            "fraud_count",
            "fraud_amount",
            true,
        );
        assert!(fraud.contains("f.target = 'Yes'"));
        assert!(fraud.contains("AS fraud_count"));
        assert!(fraud.contains("BETWEEN $1 AND $2"));
    }

    #[test]
    fn queries_bind_parameters_instead_of_interpolating() {
        assert!(MCC_SQL.contains("= $1"));
        assert!(FRAUD_COMPARISON_SQL.contains("CAST($1 AS DATE)"));
        assert!(FRAUD_COMPARISON_SQL.contains("CAST($2 AS DATE)"));
    }
}
