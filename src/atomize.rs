//! Normalization of multi-valued categorical columns such as `deposit_type`
//! or `processing_method`.
//!
//! A cell is reduced to a set of clean labels. The labels are either collapsed
//! into one order-independent combination key per row, or exploded into one
//! row per label.

use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;

use crate::{data::Value, reshape::WideTable};

/// Combination key for a row whose label set is empty.
pub const UNKNOWN_KEY: &str = "Unknown";

static QUALIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(.*?\)").expect("qualifier pattern compiles"));

/// Splits a cell into cleaned labels. Lists contribute one label per element,
/// any other non-null value is a single label, and null yields nothing.
pub fn clean_labels(cell: Option<&Value>) -> Vec<String> {
    let raw: Vec<String> = match cell {
        None => Vec::new(),
        Some(value) if value.is_null() => Vec::new(),
        Some(Value::List(items)) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(Value::as_display)
            .collect(),
        Some(other) => vec![other.as_display()],
    };
    raw.iter().filter_map(|label| clean_label(label)).collect()
}

/// Removes parenthesized qualifiers and surrounding whitespace.
pub fn clean_label(label: &str) -> Option<String> {
    let stripped = QUALIFIER.replace_all(label, "");
    let trimmed = stripped.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn combination_key(labels: &[String]) -> String {
    if labels.is_empty() {
        return UNKNOWN_KEY.to_string();
    }
    labels.iter().sorted().join(", ")
}

/// One atomic label of one source row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplodedRow {
    pub row: usize,
    pub report_id: String,
    pub label: String,
}

/// Both views of an atomized column, aligned with the table's rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atomized {
    pub combinations: Vec<String>,
    pub exploded: Vec<ExplodedRow>,
}

impl Atomized {
    pub fn exploded_labels(&self) -> impl Iterator<Item = &str> {
        self.exploded.iter().map(|row| row.label.as_str())
    }
}

/// Atomizes `column`, or returns `None` when the table has no such column.
pub fn atomize_column(table: &WideTable, column: &str) -> Option<Atomized> {
    let idx = table.column_index(column)?;
    let labels: Vec<Vec<String>> = table
        .rows()
        .iter()
        .map(|row| clean_labels(row.cells[idx].as_ref()))
        .collect();
    let combinations = labels.iter().map(|set| combination_key(set)).collect();
    let exploded = table
        .rows()
        .iter()
        .zip(&labels)
        .enumerate()
        .flat_map(|(row_idx, (row, set))| {
            set.iter().map(move |label| ExplodedRow {
                row: row_idx,
                report_id: row.report_id.clone(),
                label: label.clone(),
            })
        })
        .collect();
    Some(Atomized {
        combinations,
        exploded,
    })
}

/// Replaces `column` with its combination keys. Returns false when absent.
pub fn collapse_column(table: &mut WideTable, column: &str) -> bool {
    table.map_column(column, |cell| {
        let labels = clean_labels(cell.as_ref());
        Some(Value::Text(combination_key(&labels)))
    })
}
