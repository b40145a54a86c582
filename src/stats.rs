use std::collections::BTreeMap;

use crate::{
    data::{Value, format_metric},
    table::RenderOptions,
};

/// The count/mean/std/quantile block of a numeric sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Describe {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

pub const DESCRIBE_LABELS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];

impl Describe {
    /// Describes the finite values of `values`; an empty sample yields NaN
    /// metrics with a zero count.
    pub fn from_values(values: &[f64]) -> Self {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        sorted.sort_by(f64::total_cmp);
        let count = sorted.len();
        if count == 0 {
            return Self {
                count,
                mean: f64::NAN,
                std_dev: f64::NAN,
                min: f64::NAN,
                q25: f64::NAN,
                median: f64::NAN,
                q75: f64::NAN,
                max: f64::NAN,
            };
        }
        let sum: f64 = sorted.iter().sum();
        let mean = sum / count as f64;
        let std_dev = if count < 2 {
            f64::NAN
        } else {
            let squares: f64 = sorted.iter().map(|v| (v - mean) * (v - mean)).sum();
            (squares / (count as f64 - 1.0)).sqrt()
        };
        Self {
            count,
            mean,
            std_dev,
            min: sorted[0],
            q25: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q75: quantile(&sorted, 0.75),
            max: sorted[count - 1],
        }
    }

    pub fn metrics(&self) -> [f64; 8] {
        [
            self.count as f64,
            self.mean,
            self.std_dev,
            self.min,
            self.q25,
            self.median,
            self.q75,
            self.max,
        ]
    }

    /// Renders the block as aligned `label value` lines.
    pub fn render(&self, options: &RenderOptions) -> String {
        let values: Vec<String> = self
            .metrics()
            .iter()
            .map(|metric| format_metric(*metric, options.precision))
            .collect();
        let label_width = DESCRIBE_LABELS.iter().map(|l| l.len()).max().unwrap_or(0);
        let value_width = values.iter().map(String::len).max().unwrap_or(0);
        let mut output = String::new();
        for (label, value) in DESCRIBE_LABELS.iter().zip(values) {
            output.push_str(&format!("{label:<label_width$}  {value:>value_width$}\n"));
        }
        output
    }

    pub fn render_row(&self, options: &RenderOptions) -> Vec<String> {
        let mut row = vec![self.count.to_string()];
        row.extend(
            self.metrics()[1..]
                .iter()
                .map(|metric| format_metric(*metric, options.precision)),
        );
        row
    }
}

/// Linear interpolation between closest ranks over a sorted sample.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let position = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

pub fn numeric_values<'a, I>(cells: I) -> Vec<f64>
where
    I: IntoIterator<Item = Option<&'a Value>>,
{
    cells
        .into_iter()
        .filter_map(|cell| cell.and_then(Value::as_f64))
        .collect()
}

/// Statistics of one numeric sample per group key.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedDescribe {
    pub group_column: String,
    pub groups: Vec<(String, Describe)>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GroupOptions {
    /// Groups with fewer non-null values are dropped.
    pub min_count: usize,
    /// Order groups by descending mean instead of by key.
    pub sort_by_mean: bool,
}

impl GroupedDescribe {
    pub fn build<I>(group_column: &str, pairs: I, options: GroupOptions) -> Self
    where
        I: IntoIterator<Item = (String, Option<f64>)>,
    {
        let mut buckets: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for (key, value) in pairs {
            let bucket = buckets.entry(key).or_default();
            if let Some(value) = value {
                bucket.push(value);
            }
        }
        let mut groups: Vec<(String, Describe)> = buckets
            .into_iter()
            .map(|(key, values)| (key, Describe::from_values(&values)))
            .filter(|(_, describe)| describe.count >= options.min_count)
            .collect();
        if options.sort_by_mean {
            groups.sort_by(|a, b| b.1.mean.total_cmp(&a.1.mean).then_with(|| a.0.cmp(&b.0)));
        }
        Self {
            group_column: group_column.to_string(),
            groups,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn headers(&self) -> Vec<String> {
        std::iter::once(self.group_column.clone())
            .chain(DESCRIBE_LABELS.iter().map(|l| l.to_string()))
            .collect()
    }

    pub fn render_rows(&self, options: &RenderOptions) -> Vec<Vec<String>> {
        self.groups
            .iter()
            .map(|(key, describe)| {
                let mut row = vec![key.clone()];
                row.extend(describe.render_row(options));
                row
            })
            .collect()
    }
}
