use std::collections::HashMap;

use crate::{
    atomize::atomize_column,
    data::{Value, is_missing},
    reshape::WideTable,
};

/// Bucket label used for absent and null cells.
pub const NULL_BUCKET: &str = "<null>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrequencyMode {
    /// Count each cell's display value as-is.
    #[default]
    Plain,
    /// Count the sorted combination key of each cell's labels.
    Combination,
    /// Count every atomic label once per row that carries it.
    Exploded,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrequencyOptions {
    pub mode: FrequencyMode,
    /// Count absent/null cells under [`NULL_BUCKET`].
    pub include_null: bool,
    /// Keep only the `top` most frequent values (0 keeps all).
    pub top: usize,
}

/// Ordered value counts of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyTable {
    pub column: String,
    pub total: usize,
    pub counts: Vec<(String, usize)>,
}

impl FrequencyTable {
    pub fn headers() -> Vec<String> {
        vec![
            "value".to_string(),
            "count".to_string(),
            "percent".to_string(),
        ]
    }

    pub fn render_rows(&self) -> Vec<Vec<String>> {
        self.counts
            .iter()
            .map(|(value, count)| {
                let percent = if self.total > 0 {
                    (*count as f64 / self.total as f64) * 100.0
                } else {
                    0.0
                };
                vec![value.clone(), count.to_string(), format!("{percent:.2}%")]
            })
            .collect()
    }

    pub fn count_of(&self, value: &str) -> Option<usize> {
        self.counts
            .iter()
            .find(|(candidate, _)| candidate == value)
            .map(|(_, count)| *count)
    }
}

/// Counts the values of `column`; `None` when the table lacks it.
pub fn compute_frequency(
    table: &WideTable,
    column: &str,
    options: &FrequencyOptions,
) -> Option<FrequencyTable> {
    let keys: Vec<String> = match options.mode {
        FrequencyMode::Plain => {
            let cells = table.column(column)?;
            cells
                .iter()
                .filter_map(|cell| bucket_key(cell.as_ref(), options.include_null))
                .collect()
        }
        FrequencyMode::Combination => atomize_column(table, column)?.combinations,
        FrequencyMode::Exploded => atomize_column(table, column)?
            .exploded
            .into_iter()
            .map(|row| row.label)
            .collect(),
    };
    Some(count_keys(column, keys, options.top))
}

/// Counts pre-computed keys, most frequent first, ties broken by key.
pub fn count_keys<I>(column: &str, keys: I, top: usize) -> FrequencyTable
where
    I: IntoIterator<Item = String>,
{
    let mut counter: HashMap<String, usize> = HashMap::new();
    let mut total = 0usize;
    for key in keys {
        total += 1;
        *counter.entry(key).or_insert(0) += 1;
    }
    let mut counts = counter.into_iter().collect::<Vec<_>>();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    if top > 0 && counts.len() > top {
        counts.truncate(top);
    }
    FrequencyTable {
        column: column.to_string(),
        total,
        counts,
    }
}

fn bucket_key(cell: Option<&Value>, include_null: bool) -> Option<String> {
    if is_missing(cell) {
        return include_null.then(|| NULL_BUCKET.to_string());
    }
    cell.map(Value::as_display)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reshape::Fact;

    fn text(value: &str) -> Value {
        Value::Text(value.to_string())
    }

    fn table() -> WideTable {
        let facts = vec![
            Fact::new("R1", "country", text("Canada")),
            Fact::new("R2", "country", text("Peru")),
            Fact::new("R3", "country", text("Canada")),
            Fact::new("R4", "mine_type", text("Open Pit")),
            Fact::new(
                "R1",
                "deposit_type",
                Value::List(vec![text("Skarn"), text("Porphyry")]),
            ),
            Fact::new(
                "R2",
                "deposit_type",
                Value::List(vec![text("Porphyry (primary)"), text("Skarn")]),
            ),
            Fact::new("R3", "deposit_type", text("Porphyry")),
        ];
        WideTable::pivot(facts).expect("pivot")
    }

    #[test]
    fn plain_counts_drop_nulls_by_default() {
        let frequency =
            compute_frequency(&table(), "country", &FrequencyOptions::default()).expect("column");
        assert_eq!(frequency.total, 3);
        assert_eq!(
            frequency.counts,
            vec![("Canada".to_string(), 2), ("Peru".to_string(), 1)]
        );
        assert_eq!(frequency.render_rows()[0][2], "66.67%");
    }

    #[test]
    fn null_bucket_is_explicit_when_requested() {
        let options = FrequencyOptions {
            include_null: true,
            ..FrequencyOptions::default()
        };
        let frequency = compute_frequency(&table(), "country", &options).expect("column");
        assert_eq!(frequency.total, 4);
        assert_eq!(frequency.count_of(NULL_BUCKET), Some(1));
    }

    #[test]
    fn combination_and_exploded_modes() {
        let combination = FrequencyOptions {
            mode: FrequencyMode::Combination,
            ..FrequencyOptions::default()
        };
        let collapsed = compute_frequency(&table(), "deposit_type", &combination).expect("column");
        assert_eq!(collapsed.count_of("Porphyry, Skarn"), Some(2));
        assert_eq!(collapsed.count_of("Unknown"), Some(1));

        let exploded = FrequencyOptions {
            mode: FrequencyMode::Exploded,
            ..FrequencyOptions::default()
        };
        let atoms = compute_frequency(&table(), "deposit_type", &exploded).expect("column");
        assert_eq!(atoms.count_of("Porphyry"), Some(3));
        assert_eq!(atoms.count_of("Skarn"), Some(2));
        assert_eq!(atoms.count_of("Unknown"), None);
    }

    #[test]
    fn missing_column_yields_none_and_top_truncates() {
        assert!(compute_frequency(&table(), "absent", &FrequencyOptions::default()).is_none());
        let frequency = count_keys("x", ["a", "b", "b"].map(String::from), 1);
        assert_eq!(frequency.counts, vec![("b".to_string(), 2)]);
    }
}
