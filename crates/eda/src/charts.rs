//! SVG chart rendering for an insight plan.

use std::collections::HashMap;

use serde::Serialize;
use tera::{Context, Tera};
use tracing::{debug, warn};

use banklens_agent::InsightPlan;

use crate::dataset::{Column, Dataset};
use crate::stats::{pearson, quantile};
use crate::EdaError;

const TEMPLATE_NAME: &str = "chart.svg";
pub const CAPTION_WIDTH: usize = 60;
pub const HISTOGRAM_BINS: usize = 30;
pub const HEATMAP_FILE: &str = "heatmap_correlation.svg";

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 720.0;
const HEATMAP_WIDTH: f64 = 640.0;
const HEATMAP_HEIGHT: f64 = 640.0;

const HISTOGRAM_FILL: &str = "#4C72B0";
const SCATTER_FILL: &str = "#4C72B0";
const PASTEL: [&str; 10] = [
    "#A1C9F4", "#FFB482", "#8DE5A1", "#FF9F9B", "#D0BBFF", "#DEBB9B", "#FAB0E4", "#CFCFCF",
    "#FFFEA3", "#B9F2F0",
];
const SET2: [&str; 8] =
    ["#66C2A5", "#FC8D62", "#8DA0CB", "#E78AC3", "#A6D854", "#FFD92F", "#E5C494", "#B3B3B3"];
const MUTED: [&str; 10] = [
    "#4878D0", "#EE854A", "#6ACC64", "#D65F5F", "#956CB4", "#8C613C", "#DC7EC0", "#797979",
    "#D5BB67", "#82C6E2",
];

/// One chart ready to be written to the plot directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedChart {
    pub file_name: String,
    pub svg: String,
}

#[derive(Clone, Debug, Serialize)]
struct Frame {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

#[derive(Clone, Debug, Serialize)]
struct Rect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    fill: String,
    stroke: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
struct Line {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    stroke: String,
    stroke_width: f64,
}

#[derive(Clone, Debug, Serialize)]
struct Point {
    cx: f64,
    cy: f64,
    r: f64,
    fill: String,
    opacity: f64,
}

#[derive(Clone, Debug, Serialize)]
struct Label {
    x: f64,
    y: f64,
    text: String,
    size: u32,
    fill: String,
    anchor: &'static str,
    rotate: Option<f64>,
}

impl Label {
    fn new(x: f64, y: f64, text: impl Into<String>, anchor: &'static str) -> Self {
        Self {
            x: px(x),
            y: px(y),
            text: text.into(),
            size: 11,
            fill: "#262626".to_string(),
            anchor,
            rotate: None,
        }
    }
}

/// Everything the SVG template draws.
#[derive(Clone, Debug, Serialize)]
struct ChartSpec {
    width: f64,
    height: f64,
    title: String,
    x_label: String,
    y_label: String,
    x_label_y: f64,
    frame: Frame,
    grid: Vec<Line>,
    rects: Vec<Rect>,
    lines: Vec<Line>,
    points: Vec<Point>,
    labels: Vec<Label>,
    caption: Vec<String>,
    caption_y: f64,
}

impl ChartSpec {
    fn new(title: String, x_label: &str, y_label: &str, caption: &str) -> Self {
        let frame = Frame { x: 90.0, y: 60.0, width: 680.0, height: 440.0 };
        Self {
            width: WIDTH,
            height: HEIGHT,
            title,
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            x_label_y: frame.y + frame.height + 90.0,
            caption: wrap_text(caption, CAPTION_WIDTH),
            caption_y: frame.y + frame.height + 130.0,
            frame,
            grid: Vec::new(),
            rects: Vec::new(),
            lines: Vec::new(),
            points: Vec::new(),
            labels: Vec::new(),
        }
    }
}

/// Maps data coordinates into the chart frame.
#[derive(Clone, Copy, Debug)]
struct Axes {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl Axes {
    fn new(frame: &Frame, (x_min, x_max): (f64, f64), (y_min, y_max): (f64, f64)) -> Self {
        let (x_min, x_max) = widen(x_min, x_max);
        let (y_min, y_max) = widen(y_min, y_max);
        Self {
            left: frame.x,
            top: frame.y,
            width: frame.width,
            height: frame.height,
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    fn x(&self, value: f64) -> f64 {
        px(self.left + (value - self.x_min) / (self.x_max - self.x_min) * self.width)
    }

    fn y(&self, value: f64) -> f64 {
        px(self.top + self.height - (value - self.y_min) / (self.y_max - self.y_min) * self.height)
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }

    fn right(&self) -> f64 {
        self.left + self.width
    }

    fn x_ticks(&self, spec: &mut ChartSpec) {
        for tick in ticks(self.x_min, self.x_max) {
            let x = self.x(tick);
            spec.grid.push(grid_line(x, self.top, x, self.bottom()));
            spec.labels.push(Label::new(x, self.bottom() + 18.0, format_tick(tick), "middle"));
        }
    }

    fn y_ticks(&self, spec: &mut ChartSpec) {
        for tick in ticks(self.y_min, self.y_max) {
            let y = self.y(tick);
            spec.grid.push(grid_line(self.left, y, self.right(), y));
            spec.labels.push(Label::new(self.left - 8.0, y + 4.0, format_tick(tick), "end"));
        }
    }
}

/// Owns the compiled SVG template.
#[derive(Clone, Debug)]
pub struct ChartRenderer {
    tera: Tera,
}

impl ChartRenderer {
    pub fn new() -> Result<Self, EdaError> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![".svg"]);
        tera.add_raw_template(
            TEMPLATE_NAME,
            include_str!("../../../templates/eda/chart.svg.tera"),
        )
        .map_err(|error| EdaError::Template(error.to_string()))?;
        Ok(Self { tera })
    }

    fn render(&self, spec: &ChartSpec) -> Result<String, EdaError> {
        let context =
            Context::from_serialize(spec).map_err(|error| EdaError::Template(error.to_string()))?;
        self.tera
            .render(TEMPLATE_NAME, &context)
            .map_err(|error| EdaError::Template(error.to_string()))
    }

    /// Renders every chart the plan asks for. Columns missing from the data and pairings
    /// with no matching chart kind are skipped. A later chart with the same file name
    /// replaces the earlier one.
    pub fn render_plan(
        &self,
        plan: &InsightPlan,
        dataset: &Dataset,
    ) -> Result<Vec<RenderedChart>, EdaError> {
        let mut charts = ChartSet::default();

        for name in &plan.numerical_features {
            let Some(column) = dataset.column(name) else {
                debug!(event_name = "eda.chart.skipped", column = %name, "column not in data");
                continue;
            };
            if let Some(spec) = histogram(plan, column) {
                charts.push(format!("univariate_{}.svg", file_safe(name)), self.render(&spec)?);
            } else {
                warn!(event_name = "eda.chart.skipped", column = %name, "no numeric values to plot");
            }
        }

        for name in &plan.categorical_features {
            let Some(column) = dataset.column(name) else {
                debug!(event_name = "eda.chart.skipped", column = %name, "column not in data");
                continue;
            };
            let spec = count_bars(plan, column);
            charts.push(format!("univariate_{}.svg", file_safe(name)), self.render(&spec)?);
        }

        for (x, y) in &plan.bivariate_pairs {
            let (Some(x_column), Some(y_column)) = (dataset.column(x), dataset.column(y)) else {
                debug!(event_name = "eda.chart.skipped", x = %x, y = %y, "pair not in data");
                continue;
            };
            let is_numerical = |name: &str| plan.numerical_features.iter().any(|f| f == name);
            let is_categorical = |name: &str| plan.categorical_features.iter().any(|f| f == name);

            let spec = if is_numerical(x) && *y == plan.target_col {
                box_by_class(plan, x_column, y_column)
            } else if is_categorical(x) && *y == plan.target_col {
                Some(yes_rate_bars(plan, x_column, y_column))
            } else if is_numerical(x) && is_numerical(y) {
                scatter(plan, x_column, y_column)
            } else {
                None
            };

            match spec {
                Some(spec) => charts.push(
                    format!("bivariate_{}_vs_{}.svg", file_safe(x), file_safe(y)),
                    self.render(&spec)?,
                ),
                None => debug!(event_name = "eda.chart.skipped", x = %x, y = %y, "no chart kind for pair"),
            }
        }

        if let Some(target) = dataset.column(&plan.target_col) {
            let spec = heatmap(plan, dataset, target);
            charts.push(HEATMAP_FILE.to_string(), self.render(&spec)?);
        }

        Ok(charts.into_inner())
    }
}

#[derive(Default)]
struct ChartSet {
    charts: Vec<RenderedChart>,
    positions: HashMap<String, usize>,
}

impl ChartSet {
    fn push(&mut self, file_name: String, svg: String) {
        match self.positions.get(&file_name) {
            Some(index) => self.charts[*index].svg = svg,
            None => {
                self.positions.insert(file_name.clone(), self.charts.len());
                self.charts.push(RenderedChart { file_name, svg });
            }
        }
    }

    fn into_inner(self) -> Vec<RenderedChart> {
        self.charts
    }
}

fn histogram(plan: &InsightPlan, column: &Column) -> Option<ChartSpec> {
    let values = column.present_numbers();
    let min = values.iter().copied().reduce(f64::min)?;
    let max = values.iter().copied().reduce(f64::max)?;
    let (low, high) = widen(min, max);
    let bin_width = (high - low) / HISTOGRAM_BINS as f64;

    let mut counts = [0usize; HISTOGRAM_BINS];
    for value in &values {
        let bin = (((value - low) / bin_width) as usize).min(HISTOGRAM_BINS - 1);
        counts[bin] += 1;
    }
    let peak = counts.iter().copied().max().unwrap_or_default() as f64;

    let label = plan.label(&column.name);
    let mut spec =
        ChartSpec::new(format!("Distribution of {label}"), label, "Count", plan.univariate_note(&column.name));
    let axes = Axes::new(&spec.frame, (low, high), (0.0, peak * 1.05));
    axes.x_ticks(&mut spec);
    axes.y_ticks(&mut spec);

    for (bin, count) in counts.iter().enumerate() {
        if *count == 0 {
            continue;
        }
        let start = low + bin as f64 * bin_width;
        let top = axes.y(*count as f64);
        spec.rects.push(Rect {
            x: axes.x(start),
            y: top,
            width: px(axes.x(start + bin_width) - axes.x(start)),
            height: px(axes.y(0.0) - top),
            fill: HISTOGRAM_FILL.to_string(),
            stroke: Some("#ffffff".to_string()),
        });
    }
    Some(spec)
}

fn count_bars(plan: &InsightPlan, column: &Column) -> ChartSpec {
    let counts = column.value_counts();
    let peak = counts.first().map(|(_, count)| *count).unwrap_or_default() as f64;

    let label = plan.label(&column.name);
    let mut spec =
        ChartSpec::new(format!("Count of {label}"), label, "Count", plan.univariate_note(&column.name));
    let axes = Axes::new(&spec.frame, (0.0, counts.len().max(1) as f64), (0.0, peak.max(1.0) * 1.05));
    axes.y_ticks(&mut spec);

    let bars: Vec<(String, f64)> =
        counts.into_iter().map(|(value, count)| (value, count as f64)).collect();
    category_bars(&mut spec, &axes, &bars, &PASTEL);
    spec
}

fn yes_rate_bars(plan: &InsightPlan, x: &Column, target: &Column) -> ChartSpec {
    let encoded = target.yes_no();
    let mut order: Vec<&str> = Vec::new();
    let mut sums: HashMap<&str, (f64, usize)> = HashMap::new();
    for (cell, outcome) in x.cells().iter().zip(&encoded) {
        let (Some(category), Some(outcome)) = (cell.as_deref(), outcome) else {
            continue;
        };
        let entry = sums.entry(category).or_insert_with(|| {
            order.push(category);
            (0.0, 0)
        });
        entry.0 += outcome;
        entry.1 += 1;
    }
    let bars: Vec<(String, f64)> = order
        .iter()
        .map(|category| {
            let (sum, count) = sums.get(category).copied().unwrap_or((0.0, 1));
            (category.to_string(), sum / count.max(1) as f64)
        })
        .collect();
    let peak = bars.iter().map(|(_, rate)| *rate).fold(0.0, f64::max);

    let (x_label, y_label) = (plan.label(&x.name), plan.label(&target.name));
    let mut spec = ChartSpec::new(
        format!("{x_label} vs {y_label}"),
        x_label,
        y_label,
        plan.bivariate_note(&x.name, &target.name),
    );
    let axes = Axes::new(&spec.frame, (0.0, bars.len().max(1) as f64), (0.0, peak.max(0.1) * 1.1));
    axes.y_ticks(&mut spec);
    category_bars(&mut spec, &axes, &bars, &MUTED);
    spec
}

fn category_bars(spec: &mut ChartSpec, axes: &Axes, bars: &[(String, f64)], palette: &[&str]) {
    for (index, (category, height)) in bars.iter().enumerate() {
        let slot = index as f64;
        let top = axes.y(*height);
        let x = axes.x(slot + 0.1);
        spec.rects.push(Rect {
            x,
            y: top,
            width: px(axes.x(slot + 0.9) - x),
            height: px(axes.y(0.0) - top),
            fill: palette[index % palette.len()].to_string(),
            stroke: None,
        });
        let mut label = Label::new(axes.x(slot + 0.5), axes.bottom() + 16.0, category.clone(), "end");
        label.rotate = Some(-30.0);
        spec.labels.push(label);
    }
}

fn box_by_class(plan: &InsightPlan, x: &Column, target: &Column) -> Option<ChartSpec> {
    if !x.is_numeric() {
        return None;
    }
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<f64>> = HashMap::new();
    for (class, value) in target.cells().iter().zip(x.numbers()) {
        let (Some(class), Some(value)) = (class.as_deref(), value) else {
            continue;
        };
        groups
            .entry(class)
            .or_insert_with(|| {
                order.push(class);
                Vec::new()
            })
            .push(*value);
    }
    let values: Vec<f64> = groups.values().flatten().copied().collect();
    let min = values.iter().copied().reduce(f64::min)?;
    let max = values.iter().copied().reduce(f64::max)?;
    let pad = (max - min).abs().max(1.0) * 0.05;

    let (x_label, y_label) = (plan.label(&target.name), plan.label(&x.name));
    let mut spec = ChartSpec::new(
        format!("{} vs {}", plan.label(&x.name), plan.label(&target.name)),
        x_label,
        y_label,
        plan.bivariate_note(&x.name, &target.name),
    );
    let axes = Axes::new(&spec.frame, (0.0, order.len() as f64), (min - pad, max + pad));
    axes.y_ticks(&mut spec);

    for (index, class) in order.iter().enumerate() {
        let mut sorted = groups.get(class).cloned().unwrap_or_default();
        sorted.sort_by(f64::total_cmp);
        let (Some(q1), Some(median), Some(q3)) =
            (quantile(&sorted, 0.25), quantile(&sorted, 0.5), quantile(&sorted, 0.75))
        else {
            continue;
        };
        let reach = 1.5 * (q3 - q1);
        let low_whisker =
            sorted.iter().copied().find(|value| *value >= q1 - reach).unwrap_or(q1);
        let high_whisker =
            sorted.iter().rev().copied().find(|value| *value <= q3 + reach).unwrap_or(q3);

        let slot = index as f64;
        let fill = SET2[index % SET2.len()].to_string();
        let (left, right, centre) = (axes.x(slot + 0.2), axes.x(slot + 0.8), axes.x(slot + 0.5));
        spec.rects.push(Rect {
            x: left,
            y: axes.y(q3),
            width: px(right - left),
            height: px(axes.y(q1) - axes.y(q3)),
            fill,
            stroke: Some("#3f3f3f".to_string()),
        });
        spec.lines.push(dark_line(left, axes.y(median), right, axes.y(median)));
        spec.lines.push(dark_line(centre, axes.y(q3), centre, axes.y(high_whisker)));
        spec.lines.push(dark_line(centre, axes.y(q1), centre, axes.y(low_whisker)));
        for whisker in [low_whisker, high_whisker] {
            spec.lines.push(dark_line(
                axes.x(slot + 0.35),
                axes.y(whisker),
                axes.x(slot + 0.65),
                axes.y(whisker),
            ));
        }
        for outlier in sorted.iter().filter(|value| **value < low_whisker || **value > high_whisker) {
            spec.points.push(Point {
                cx: centre,
                cy: axes.y(*outlier),
                r: 3.0,
                fill: "#3f3f3f".to_string(),
                opacity: 1.0,
            });
        }
        spec.labels.push(Label::new(centre, axes.bottom() + 18.0, *class, "middle"));
    }
    Some(spec)
}

fn scatter(plan: &InsightPlan, x: &Column, y: &Column) -> Option<ChartSpec> {
    if !x.is_numeric() || !y.is_numeric() {
        return None;
    }
    let pairs: Vec<(f64, f64)> = x
        .numbers()
        .iter()
        .zip(y.numbers())
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    let x_range = bounds(pairs.iter().map(|(x, _)| *x))?;
    let y_range = bounds(pairs.iter().map(|(_, y)| *y))?;

    let (x_label, y_label) = (plan.label(&x.name), plan.label(&y.name));
    let mut spec = ChartSpec::new(
        format!("{x_label} vs {y_label}"),
        x_label,
        y_label,
        plan.bivariate_note(&x.name, &y.name),
    );
    let axes = Axes::new(&spec.frame, padded(x_range), padded(y_range));
    axes.x_ticks(&mut spec);
    axes.y_ticks(&mut spec);
    for (x_value, y_value) in pairs {
        spec.points.push(Point {
            cx: axes.x(x_value),
            cy: axes.y(y_value),
            r: 3.5,
            fill: SCATTER_FILL.to_string(),
            opacity: 0.5,
        });
    }
    Some(spec)
}

fn heatmap(plan: &InsightPlan, dataset: &Dataset, target: &Column) -> ChartSpec {
    let mut series: Vec<(String, Vec<Option<f64>>)> = plan
        .numerical_features
        .iter()
        .filter(|name| **name != target.name)
        .filter_map(|name| dataset.column(name))
        .filter(|column| column.is_numeric())
        .map(|column| (column.name.clone(), column.numbers().to_vec()))
        .collect();
    series.push((target.name.clone(), target.yes_no()));

    let mut spec = ChartSpec::new(
        "Correlation Heatmap".to_string(),
        "",
        "",
        &plan.heatmap_inference,
    );
    spec.width = HEATMAP_WIDTH;
    spec.height = HEATMAP_HEIGHT;
    let size = series.len() as f64;
    let cell = (400.0 / size).min(120.0);
    spec.frame = Frame { x: 140.0, y: 60.0, width: px(cell * size), height: px(cell * size) };
    spec.caption_y = spec.frame.y + spec.frame.height + 80.0;

    for (row, (row_name, row_values)) in series.iter().enumerate() {
        let y = spec.frame.y + row as f64 * cell;
        spec.labels.push(Label::new(spec.frame.x - 8.0, y + cell / 2.0 + 4.0, row_name.clone(), "end"));
        for (col, (_, col_values)) in series.iter().enumerate() {
            let x = spec.frame.x + col as f64 * cell;
            let r = pearson(row_values, col_values);
            spec.rects.push(Rect {
                x: px(x),
                y: px(y),
                width: px(cell),
                height: px(cell),
                fill: r.map_or_else(|| "#d9d9d9".to_string(), coolwarm),
                stroke: Some("#ffffff".to_string()),
            });
            let text = r.map_or_else(|| "nan".to_string(), |r| format!("{r:.2}"));
            let mut annotation = Label::new(x + cell / 2.0, y + cell / 2.0 + 4.0, text, "middle");
            annotation.size = 10;
            spec.labels.push(annotation);
        }
    }
    for (col, (name, _)) in series.iter().enumerate() {
        let x = spec.frame.x + col as f64 * cell + cell / 2.0;
        let mut label = Label::new(x, spec.frame.y + spec.frame.height + 16.0, name.clone(), "end");
        label.rotate = Some(-45.0);
        spec.labels.push(label);
    }
    spec
}

/// Greedy word wrap. Words longer than `width` are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        if word.is_empty() {
            continue;
        }
        let current_len = current.chars().count();
        if current_len > 0 && current_len + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Blue through grey to red for correlations in `[-1, 1]`.
fn coolwarm(r: f64) -> String {
    const COLD: (f64, f64, f64) = (59.0, 76.0, 192.0);
    const MID: (f64, f64, f64) = (221.0, 221.0, 221.0);
    const WARM: (f64, f64, f64) = (180.0, 4.0, 38.0);
    let r = r.clamp(-1.0, 1.0);
    let (from, to, t) = if r < 0.0 { (MID, COLD, -r) } else { (MID, WARM, r) };
    let mix = |a: f64, b: f64| (a + (b - a) * t).round() as u8;
    format!("#{:02x}{:02x}{:02x}", mix(from.0, to.0), mix(from.1, to.1), mix(from.2, to.2))
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect()
}

fn grid_line(x1: f64, y1: f64, x2: f64, y2: f64) -> Line {
    Line { x1: px(x1), y1: px(y1), x2: px(x2), y2: px(y2), stroke: "#ffffff".to_string(), stroke_width: 1.0 }
}

fn dark_line(x1: f64, y1: f64, x2: f64, y2: f64) -> Line {
    Line { x1: px(x1), y1: px(y1), x2: px(x2), y2: px(y2), stroke: "#3f3f3f".to_string(), stroke_width: 1.5 }
}

fn bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |range, value| match range {
        None => Some((value, value)),
        Some((low, high)) => Some((low.min(value), high.max(value))),
    })
}

fn padded((low, high): (f64, f64)) -> (f64, f64) {
    let pad = (high - low).abs().max(1.0) * 0.05;
    (low - pad, high + pad)
}

fn widen(low: f64, high: f64) -> (f64, f64) {
    if high > low {
        (low, high)
    } else {
        (low - 0.5, high + 0.5)
    }
}

fn ticks(low: f64, high: f64) -> Vec<f64> {
    (0..=4).map(|step| low + (high - low) * step as f64 / 4.0).collect()
}

fn format_tick(value: f64) -> String {
    if value.abs() >= 1000.0 || value.fract().abs() < 1e-9 {
        format!("{value:.0}")
    } else {
        let text = format!("{value:.2}");
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn px(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use banklens_agent::InsightPlan;

    use super::{coolwarm, file_safe, wrap_text, ChartRenderer, HEATMAP_FILE};
    use crate::dataset::Dataset;

    const BANK: &[u8] = b"age,job,balance,y\n\
        30,admin.,100,no\n\
        40,technician,200,yes\n\
        50,admin.,300,no\n\
        60,services,400,no\n\
        70,admin.,5000,yes\n";

    fn plan() -> InsightPlan {
        InsightPlan {
            insights: Some("Older clients subscribe more.".to_string()),
            categorical_features: vec!["job".to_string(), "missing".to_string()],
            numerical_features: vec!["age".to_string(), "balance".to_string()],
            target_col: "y".to_string(),
            bivariate_pairs: vec![
                ("age".to_string(), "y".to_string()),
                ("job".to_string(), "y".to_string()),
                ("age".to_string(), "balance".to_string()),
                ("job".to_string(), "balance".to_string()),
                ("ghost".to_string(), "y".to_string()),
            ],
            inference_univariate: HashMap::from([(
                "age".to_string(),
                "Most clients are between thirty and fifty years old & the tail is long.".to_string(),
            )]),
            heatmap_inference: "Balance barely tracks age.".to_string(),
            col_schema: HashMap::from([("age".to_string(), "Age (years)".to_string())]),
            ..InsightPlan::default()
        }
    }

    #[test]
    fn wraps_on_word_boundaries() {
        let text = "Most clients are between thirty and fifty years old, with a long tail of older clients.";
        let lines = wrap_text(text, 60);
        assert_eq!(
            lines,
            vec![
                "Most clients are between thirty and fifty years old, with a",
                "long tail of older clients."
            ]
        );
        assert!(lines.iter().all(|line| line.chars().count() <= 60));
        assert_eq!(wrap_text("abcdefgh ij", 4), vec!["abcd", "efgh", "ij"]);
        assert!(wrap_text("   ", 60).is_empty());
    }

    #[test]
    fn renders_each_chart_kind_and_skips_unknown_columns() {
        let dataset = Dataset::from_csv_bytes(BANK).expect("dataset");
        let renderer = ChartRenderer::new().expect("renderer");
        let charts = renderer.render_plan(&plan(), &dataset).expect("charts");

        let names: Vec<&str> = charts.iter().map(|chart| chart.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "univariate_age.svg",
                "univariate_balance.svg",
                "univariate_job.svg",
                "bivariate_age_vs_y.svg",
                "bivariate_job_vs_y.svg",
                "bivariate_age_vs_balance.svg",
                HEATMAP_FILE,
            ]
        );

        let age = &charts[0].svg;
        assert!(age.starts_with("<svg"));
        assert!(age.contains("Distribution of Age (years)"));
        assert!(age.contains("old &amp; the"));

        assert!(charts[2].svg.contains("Count of job"));
        assert!(charts[3].svg.contains("Age (years) vs y"));
        assert!(charts[6].svg.contains("Correlation Heatmap"));
        assert!(charts[6].svg.contains("Balance barely tracks age."));
        assert!(charts[6].svg.contains(">1.00<"));
    }

    #[test]
    fn heatmap_needs_the_target_column() {
        let dataset = Dataset::from_csv_bytes(b"age,balance\n1,2\n3,4\n").expect("dataset");
        let renderer = ChartRenderer::new().expect("renderer");
        let plan = InsightPlan {
            numerical_features: vec!["age".to_string()],
            target_col: "y".to_string(),
            ..InsightPlan::default()
        };
        let charts = renderer.render_plan(&plan, &dataset).expect("charts");
        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].file_name, "univariate_age.svg");
    }

    #[test]
    fn colours_and_file_names() {
        assert_eq!(coolwarm(0.0), "#dddddd");
        assert_eq!(coolwarm(1.0), "#b40426");
        assert_eq!(coolwarm(-1.0), "#3b4cc0");
        assert_eq!(file_safe("pdays/prev"), "pdays_prev");
    }
}
