//! Uploaded CSV loaded into typed columns.

use std::collections::HashMap;

use crate::EdaError;

/// Cell values read as missing, in addition to the empty string.
pub const NULL_LIKE: [&str; 9] =
    ["Null", "null", "NULL", "unknown", "Unknown", "UNKNOWN", "NaN", "nan", "NAN"];

const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];
const SNIFF_BYTES: usize = 2048;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    cells: Vec<Option<String>>,
    numbers: Vec<Option<f64>>,
}

impl Column {
    fn new(name: String, cells: Vec<Option<String>>) -> Self {
        let present: Vec<&str> = cells.iter().flatten().map(|cell| cell.trim()).collect();
        let kind = if present.is_empty() {
            ColumnKind::Text
        } else if present.iter().all(|cell| cell.parse::<i64>().is_ok()) {
            ColumnKind::Integer
        } else if present.iter().all(|cell| parse_float(cell).is_some()) {
            ColumnKind::Float
        } else {
            ColumnKind::Text
        };

        let numbers = match kind {
            ColumnKind::Text => Vec::new(),
            _ => cells.iter().map(|cell| cell.as_deref().and_then(parse_float)).collect(),
        };

        Self { name, kind, cells, numbers }
    }

    pub fn is_numeric(&self) -> bool {
        self.kind != ColumnKind::Text
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Option<String>] {
        &self.cells
    }

    /// Numeric view with missing cells as `None`; empty for text columns.
    pub fn numbers(&self) -> &[Option<f64>] {
        &self.numbers
    }

    /// Present numeric values only.
    pub fn present_numbers(&self) -> Vec<f64> {
        self.numbers.iter().flatten().copied().collect()
    }

    pub fn non_null_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }

    /// Name of the equivalent pandas dtype. Integers with gaps widen to floats.
    pub fn dtype(&self) -> &'static str {
        match self.kind {
            ColumnKind::Integer if self.non_null_count() == self.len() => "int64",
            ColumnKind::Integer | ColumnKind::Float => "float64",
            ColumnKind::Text => "object",
        }
    }

    /// Distinct present values. Numeric columns compare by value, so `1` and `1.0` match.
    pub fn distinct_count(&self) -> usize {
        if self.is_numeric() {
            let mut values: Vec<u64> =
                self.present_numbers().into_iter().map(|value| (value + 0.0).to_bits()).collect();
            values.sort_unstable();
            values.dedup();
            values.len()
        } else {
            let mut values: Vec<&str> = self.cells.iter().flatten().map(String::as_str).collect();
            values.sort_unstable();
            values.dedup();
            values.len()
        }
    }

    /// Category frequencies, most frequent first, ties in first-seen order.
    pub fn value_counts(&self) -> Vec<(String, usize)> {
        let mut order: Vec<String> = Vec::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for cell in self.cells.iter().flatten() {
            let entry = counts.entry(cell.as_str()).or_insert(0);
            if *entry == 0 {
                order.push(cell.clone());
            }
            *entry += 1;
        }
        let mut ranked: Vec<(String, usize)> = order
            .into_iter()
            .map(|value| {
                let count = counts.get(value.as_str()).copied().unwrap_or_default();
                (value, count)
            })
            .collect();
        ranked.sort_by(|left, right| right.1.cmp(&left.1));
        ranked
    }

    /// Target-style encoding: `yes` is 1, `no` is 0, anything else is missing.
    pub fn yes_no(&self) -> Vec<Option<f64>> {
        self.cells
            .iter()
            .map(|cell| match cell.as_deref().map(str::trim) {
                Some("yes") => Some(1.0),
                Some("no") => Some(0.0),
                _ => None,
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: usize,
    delimiter: u8,
}

impl Dataset {
    /// Decodes, sniffs the delimiter and parses. Every failure is a CSV error.
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self, EdaError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|error| EdaError::Csv(format!("file is not valid UTF-8: {error}")))?;
        let delimiter = sniff_delimiter(text)?;

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(false)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|error| EdaError::Csv(error.to_string()))?
            .iter()
            .map(|header| header.trim().to_string())
            .collect();
        if headers.is_empty() || headers.iter().all(String::is_empty) {
            return Err(EdaError::Csv("no columns to parse from file".to_string()));
        }

        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
        for record in reader.records() {
            let record = record.map_err(|error| EdaError::Csv(error.to_string()))?;
            for (index, column) in cells.iter_mut().enumerate() {
                column.push(record.get(index).and_then(normalize_cell));
            }
        }

        let rows = cells.first().map(Vec::len).unwrap_or_default();
        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, cells)| Column::new(name, cells))
            .collect();

        Ok(Self { columns, rows, delimiter })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn numeric_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|column| column.is_numeric())
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }
}

fn normalize_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || NULL_LIKE.contains(&trimmed) {
        None
    } else {
        Some(raw.to_string())
    }
}

fn parse_float(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Picks the delimiter from the first 2048 bytes.
///
/// Prefers a candidate that appears the same non-zero number of times on every complete
/// line; otherwise the most frequent candidate. Fails when none appears.
pub fn sniff_delimiter(text: &str) -> Result<u8, EdaError> {
    let mut end = text.len().min(SNIFF_BYTES);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let sample = &text[..end];
    let mut lines: Vec<&str> = sample.lines().filter(|line| !line.trim().is_empty()).collect();
    if sample.len() < text.len() && lines.len() > 1 {
        lines.pop();
    }

    let mut best_consistent: Option<(u8, usize)> = None;
    let mut best_total: Option<(u8, usize)> = None;
    for candidate in DELIMITER_CANDIDATES {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| line.bytes().filter(|byte| *byte == candidate).count())
            .collect();
        let total: usize = counts.iter().sum();
        if total == 0 {
            continue;
        }
        if best_total.map_or(true, |(_, best)| total > best) {
            best_total = Some((candidate, total));
        }
        let first = counts[0];
        if first > 0
            && counts.iter().all(|count| *count == first)
            && best_consistent.map_or(true, |(_, best)| first > best)
        {
            best_consistent = Some((candidate, first));
        }
    }

    best_consistent
        .or(best_total)
        .map(|(delimiter, _)| delimiter)
        .ok_or_else(|| EdaError::Csv("Could not determine delimiter".to_string()))
}

#[cfg(test)]
mod tests {
    use super::{sniff_delimiter, ColumnKind, Dataset};
    use crate::EdaError;

    #[test]
    fn sniffs_common_delimiters() {
        assert_eq!(sniff_delimiter("a;b;c\n1;2;3\n").expect("semicolon"), b';');
        assert_eq!(sniff_delimiter("a\tb\n1\t2\n").expect("tab"), b'\t');
        assert_eq!(sniff_delimiter("a|b\n1|2\n").expect("pipe"), b'|');
        assert_eq!(sniff_delimiter("name,note\nx,\"a;b;c;d\"\ny,z\n").expect("comma"), b',');
        assert!(matches!(sniff_delimiter("single\ncolumn\n"), Err(EdaError::Csv(_))));
    }

    #[test]
    fn null_like_cells_are_missing_and_types_inferred() {
        let dataset = Dataset::from_csv_bytes(
            b"age;job;balance;y\n30;admin.;100.5;no\nunknown;NULL;-20;yes\n41;technician;NaN;no\n",
        )
        .expect("dataset");

        assert_eq!(dataset.row_count(), 3);
        assert_eq!(dataset.delimiter(), b';');

        let age = dataset.column("age").expect("age");
        assert_eq!(age.kind, ColumnKind::Integer);
        assert_eq!(age.non_null_count(), 2);
        assert_eq!(age.dtype(), "float64");

        let balance = dataset.column("balance").expect("balance");
        assert_eq!(balance.kind, ColumnKind::Float);
        assert_eq!(balance.present_numbers(), vec![100.5, -20.0]);

        let job = dataset.column("job").expect("job");
        assert_eq!(job.dtype(), "object");
        assert_eq!(job.cells()[1], None);

        let target = dataset.column("y").expect("y");
        assert_eq!(target.yes_no(), vec![Some(0.0), Some(1.0), Some(0.0)]);
    }

    #[test]
    fn value_counts_rank_by_frequency() {
        let dataset =
            Dataset::from_csv_bytes(b"c,n\nb,1\na,2\na,3\nb,4\nc,5\na,6\n").expect("dataset");
        let counts = dataset.column("c").expect("c").value_counts();
        assert_eq!(
            counts,
            vec![("a".to_string(), 3), ("b".to_string(), 2), ("c".to_string(), 1)]
        );
        assert_eq!(dataset.column("n").expect("n").distinct_count(), 6);
    }

    #[test]
    fn invalid_input_is_a_csv_error() {
        assert!(matches!(Dataset::from_csv_bytes(&[0xff, 0xfe, b',']), Err(EdaError::Csv(_))));
        assert!(matches!(
            Dataset::from_csv_bytes(b"a,b\n1,2,3\n4,5\n"),
            Err(EdaError::Csv(_))
        ));
    }
}
