//! Descriptive statistics summary handed to the insight model.
//!
//! Section names, key spellings and rounding follow the pandas-style report the insight
//! prompt was written against, so the model sees familiar structure.

use serde_json::{json, Map, Value};

use crate::dataset::{Column, ColumnKind, Dataset};
use crate::EdaError;

const SAMPLE_ROWS: usize = 5;
const INDEX_BYTES: usize = 128;
const POINTER_BYTES: usize = 8;
const STRING_OBJECT_BYTES: usize = 49;
const MISSING_OBJECT_BYTES: usize = 24;

/// Builds the summary and serialises it compactly.
pub fn summary_json(dataset: &Dataset) -> Result<String, EdaError> {
    serde_json::to_string(&generate_summary(dataset))
        .map_err(|error| EdaError::Summary(error.to_string()))
}

pub fn generate_summary(dataset: &Dataset) -> Value {
    let numeric: Vec<&Column> = dataset.numeric_columns().collect();

    let mut summary = Map::new();
    summary.insert("data_info".to_string(), data_info(dataset));
    summary.insert("null_percentages".to_string(), null_percentages(dataset));
    summary.insert("descriptive_statistics".to_string(), descriptive_statistics(dataset, &numeric));
    summary.insert("correlation_matrix".to_string(), correlation_matrix(&numeric));
    summary.insert(
        "skewness".to_string(),
        Value::Object(
            numeric
                .iter()
                .map(|column| {
                    (column.name.clone(), number(skewness(&column.present_numbers()).map(round2)))
                })
                .collect(),
        ),
    );
    summary.insert("outlier_summary".to_string(), outlier_summary(&numeric));
    summary.insert("unique_values".to_string(), unique_values(dataset));
    summary.insert("sample_data".to_string(), sample_data(dataset));
    Value::Object(summary)
}

fn data_info(dataset: &Dataset) -> Value {
    let columns: Vec<Value> = dataset
        .columns()
        .iter()
        .map(|column| {
            json!({
                "name": column.name,
                "non_null_count": column.non_null_count(),
                "dtype": column.dtype(),
            })
        })
        .collect();

    json!({
        "columns": columns,
        "total_rows": dataset.row_count(),
        "memory_usage": memory_usage(dataset),
    })
}

/// Deep memory estimate: fixed 8-byte slots for numbers, boxed strings for text.
pub fn memory_usage(dataset: &Dataset) -> usize {
    INDEX_BYTES
        + dataset
            .columns()
            .iter()
            .map(|column| match column.kind {
                ColumnKind::Integer | ColumnKind::Float => POINTER_BYTES * column.len(),
                ColumnKind::Text => column
                    .cells()
                    .iter()
                    .map(|cell| {
                        POINTER_BYTES
                            + cell.as_ref().map_or(MISSING_OBJECT_BYTES, |text| {
                                STRING_OBJECT_BYTES + text.len()
                            })
                    })
                    .sum(),
            })
            .sum::<usize>()
}

fn null_percentages(dataset: &Dataset) -> Value {
    let rows = dataset.row_count();
    Value::Object(
        dataset
            .columns()
            .iter()
            .map(|column| {
                let missing = column.len() - column.non_null_count();
                let percentage =
                    if rows == 0 { None } else { Some(missing as f64 / rows as f64 * 100.0) };
                (column.name.clone(), number(percentage.map(round2)))
            })
            .collect(),
    )
}

fn descriptive_statistics(dataset: &Dataset, numeric: &[&Column]) -> Value {
    if numeric.is_empty() {
        return Value::Object(
            dataset.columns().iter().map(|column| (column.name.clone(), describe_text(column))).collect(),
        );
    }

    Value::Object(
        numeric
            .iter()
            .map(|column| {
                let values = column.present_numbers();
                let mut sorted = values.clone();
                sorted.sort_by(f64::total_cmp);
                let stats = json!({
                    "count": values.len() as f64,
                    "mean": number(mean(&values).map(round2)),
                    "std": number(sample_std(&values).map(round2)),
                    "min": number(sorted.first().copied().map(round2)),
                    "25%": number(quantile(&sorted, 0.25).map(round2)),
                    "50%": number(quantile(&sorted, 0.5).map(round2)),
                    "75%": number(quantile(&sorted, 0.75).map(round2)),
                    "max": number(sorted.last().copied().map(round2)),
                });
                (column.name.clone(), stats)
            })
            .collect(),
    )
}

fn describe_text(column: &Column) -> Value {
    let counts = column.value_counts();
    let (top, freq) = counts
        .first()
        .map(|(value, count)| (Value::String(value.clone()), json!(count)))
        .unwrap_or((Value::Null, Value::Null));
    json!({
        "count": column.non_null_count(),
        "unique": counts.len(),
        "top": top,
        "freq": freq,
    })
}

fn correlation_matrix(numeric: &[&Column]) -> Value {
    Value::Object(
        numeric
            .iter()
            .map(|outer| {
                let row: Map<String, Value> = numeric
                    .iter()
                    .map(|inner| {
                        let r = pearson(outer.numbers(), inner.numbers());
                        (inner.name.clone(), number(r.map(round2)))
                    })
                    .collect();
                (outer.name.clone(), Value::Object(row))
            })
            .collect(),
    )
}

fn outlier_summary(numeric: &[&Column]) -> Value {
    Value::Object(
        numeric
            .iter()
            .map(|column| {
                let values = column.present_numbers();
                let mut sorted = values.clone();
                sorted.sort_by(f64::total_cmp);

                let mean_val = mean(&values);
                let std_val = sample_std(&values);
                let q1 = quantile(&sorted, 0.25);
                let q3 = quantile(&sorted, 0.75);
                let iqr = q1.zip(q3).map(|(q1, q3)| q3 - q1);
                let outlier_count = match (q1, q3, iqr) {
                    (Some(q1), Some(q3), Some(iqr)) => {
                        let (lower, upper) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);
                        values.iter().filter(|value| **value < lower || **value > upper).count()
                    }
                    _ => 0,
                };
                let outlier_ratio = (!values.is_empty())
                    .then(|| outlier_count as f64 / values.len() as f64);
                let max_val = sorted.last().copied();
                let max_z_score = match (max_val, mean_val, std_val) {
                    (Some(max), Some(mean), Some(std)) if std > 0.0 => Some((max - mean) / std),
                    _ => None,
                };

                let entry = json!({
                    "Q1": number(q1.map(round2)),
                    "Q3": number(q3.map(round2)),
                    "IQR": number(iqr.map(round2)),
                    "outlier_count": outlier_count,
                    "outlier_ratio": number(outlier_ratio.map(round2)),
                    "mean_val": number(mean_val.map(round2)),
                    "std_val": number(std_val.map(round2)),
                    "max_val": max_val.map_or(Value::Null, |max| cell_number(column, max)),
                    "max_z_score": number(max_z_score.map(round2)),
                });
                (column.name.clone(), entry)
            })
            .collect(),
    )
}

/// Cardinality flag for one column given its distinct count and the table's row count.
pub fn cardinality_flag(distinct: usize, rows: usize, all_missing: bool) -> &'static str {
    if all_missing || distinct <= 1 {
        "CONSTANT_OR_NULL"
    } else if distinct == rows {
        "UNIQUE_ID"
    } else if distinct < 5 {
        "LOW_CARDINALITY"
    } else if distinct > 50 {
        "HIGH_CARDINALITY"
    } else {
        "CATEGORICAL"
    }
}

fn unique_values(dataset: &Dataset) -> Value {
    Value::Object(
        dataset
            .columns()
            .iter()
            .map(|column| {
                let distinct = column.distinct_count();
                let flag =
                    cardinality_flag(distinct, dataset.row_count(), column.non_null_count() == 0);
                (column.name.clone(), json!({ "count": distinct, "flag": flag }))
            })
            .collect(),
    )
}

fn sample_data(dataset: &Dataset) -> Value {
    let rows = dataset.row_count().min(SAMPLE_ROWS);
    Value::Array(
        (0..rows)
            .map(|row| {
                let record: Map<String, Value> = dataset
                    .columns()
                    .iter()
                    .map(|column| (column.name.clone(), cell_value(column, row)))
                    .collect();
                Value::Object(record)
            })
            .collect(),
    )
}

fn cell_value(column: &Column, row: usize) -> Value {
    match column.kind {
        ColumnKind::Text => column.cells()[row].clone().map_or(Value::Null, Value::String),
        _ => column.numbers()[row].map_or(Value::Null, |value| cell_number(column, value)),
    }
}

/// Whole numbers stay integers in gap-free integer columns.
fn cell_number(column: &Column, value: f64) -> Value {
    if column.dtype() == "int64" {
        json!(value as i64)
    } else {
        number(Some(value))
    }
}

fn number(value: Option<f64>) -> Value {
    value.and_then(serde_json::Number::from_f64).map_or(Value::Null, Value::Number)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Standard deviation with one degree of freedom removed.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let squares: f64 = values.iter().map(|value| (value - mean).powi(2)).sum();
    Some((squares / (values.len() - 1) as f64).sqrt())
}

/// Linear-interpolation quantile over already sorted values.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let position = q.clamp(0.0, 1.0) * last as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Pearson correlation over rows where both values are present.
pub fn pearson(left: &[Option<f64>], right: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = left
        .iter()
        .zip(right)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;
    let (mut covariance, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        covariance += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }
    let denominator = (var_x * var_y).sqrt();
    (denominator > 0.0).then(|| (covariance / denominator).clamp(-1.0, 1.0))
}

/// Adjusted Fisher-Pearson skewness. Needs three values; constant data has zero skew.
pub fn skewness(values: &[f64]) -> Option<f64> {
    if values.len() < 3 {
        return None;
    }
    let n = values.len() as f64;
    let mean = mean(values)?;
    let m2 = values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / n;
    let m3 = values.iter().map(|value| (value - mean).powi(3)).sum::<f64>() / n;
    if m2 <= f64::EPSILON * mean.abs().max(1.0) {
        return Some(0.0);
    }
    Some((n * (n - 1.0)).sqrt() / (n - 2.0) * m3 / m2.powf(1.5))
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{
        cardinality_flag, generate_summary, pearson, quantile, sample_std, skewness, summary_json,
    };
    use crate::dataset::Dataset;

    const BANK: &[u8] = b"age;job;balance;y\n\
        30;admin.;100;no\n\
        40;technician;200;yes\n\
        50;admin.;unknown;no\n\
        60;services;400;no\n\
        70;admin.;5000;yes\n\
        35;technician;150;no\n";

    #[test]
    fn helpers_match_reference_values() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.25), Some(1.75));
        assert_eq!(quantile(&sorted, 0.5), Some(2.5));
        assert_eq!(quantile(&[], 0.5), None);

        let std = sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).expect("std");
        assert!((std - 2.138).abs() < 1e-3);

        let skew = skewness(&[1.0, 2.0, 3.0, 10.0]).expect("skew");
        assert!((skew - 1.764).abs() < 1e-3);
        assert_eq!(skewness(&[3.0, 3.0, 3.0]), Some(0.0));
        assert_eq!(skewness(&[1.0, 2.0]), None);

        let r = pearson(&[Some(1.0), Some(2.0), None, Some(3.0)], &[Some(2.0), Some(4.0), Some(9.0), Some(6.0)]);
        assert_eq!(r, Some(1.0));
        assert_eq!(pearson(&[Some(1.0), Some(1.0)], &[Some(2.0), Some(3.0)]), None);
    }

    #[test]
    fn cardinality_flags_follow_thresholds() {
        assert_eq!(cardinality_flag(0, 10, true), "CONSTANT_OR_NULL");
        assert_eq!(cardinality_flag(1, 10, false), "CONSTANT_OR_NULL");
        assert_eq!(cardinality_flag(10, 10, false), "UNIQUE_ID");
        assert_eq!(cardinality_flag(3, 10, false), "LOW_CARDINALITY");
        assert_eq!(cardinality_flag(51, 100, false), "HIGH_CARDINALITY");
        assert_eq!(cardinality_flag(12, 100, false), "CATEGORICAL");
    }

    #[test]
    fn summary_has_every_section_for_a_small_table() {
        let dataset = Dataset::from_csv_bytes(BANK).expect("dataset");
        let summary = generate_summary(&dataset);

        let keys: Vec<&str> =
            summary.as_object().expect("object").keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "data_info",
                "null_percentages",
                "descriptive_statistics",
                "correlation_matrix",
                "skewness",
                "outlier_summary",
                "unique_values",
                "sample_data"
            ]
        );

        assert_eq!(summary["data_info"]["total_rows"], json!(6));
        assert_eq!(
            summary["data_info"]["columns"][2],
            json!({"name": "balance", "non_null_count": 5, "dtype": "float64"})
        );
        assert_eq!(summary["null_percentages"]["balance"], json!(16.67));
        assert_eq!(summary["null_percentages"]["age"], json!(0.0));

        let age = &summary["descriptive_statistics"]["age"];
        assert_eq!(age["count"], json!(6.0));
        assert_eq!(age["mean"], json!(47.5));
        assert_eq!(age["50%"], json!(45.0));
        assert!(summary["descriptive_statistics"].get("job").is_none());

        assert_eq!(summary["correlation_matrix"]["age"]["age"], json!(1.0));

        let balance = &summary["outlier_summary"]["balance"];
        assert_eq!(balance["Q1"], json!(150.0));
        assert_eq!(balance["Q3"], json!(400.0));
        assert_eq!(balance["outlier_count"], json!(1));
        assert_eq!(balance["outlier_ratio"], json!(0.2));
        assert_eq!(balance["max_val"], json!(5000.0));

        assert_eq!(summary["unique_values"]["job"], json!({"count": 3, "flag": "LOW_CARDINALITY"}));
        assert_eq!(summary["unique_values"]["age"]["flag"], json!("UNIQUE_ID"));

        let sample = summary["sample_data"].as_array().expect("rows");
        assert_eq!(sample.len(), 5);
        assert_eq!(sample[0], json!({"age": 30, "job": "admin.", "balance": 100.0, "y": "no"}));
        assert_eq!(sample[2]["balance"], Value::Null);
    }

    #[test]
    fn text_only_tables_describe_categories() {
        let dataset = Dataset::from_csv_bytes(b"job,y\nadmin.,no\nadmin.,yes\nservices,no\n")
            .expect("dataset");
        let summary = generate_summary(&dataset);

        assert_eq!(
            summary["descriptive_statistics"]["job"],
            json!({"count": 3, "unique": 2, "top": "admin.", "freq": 2})
        );
        assert_eq!(summary["correlation_matrix"], json!({}));

        let text = summary_json(&dataset).expect("json");
        assert!(text.starts_with("{\"data_info\":{\"columns\":["));
        assert!(!text.contains(": "));
    }
}
