//! The overall analysis report: mine types, deposit types, commodity
//! producers by country and open-pit cost statistics.

use std::fmt::Write as _;

use crate::{
    config::AnalysisConfig,
    data::{Value, is_missing},
    frequency::{FrequencyMode, FrequencyOptions, FrequencyTable, compute_frequency, count_keys},
    reshape::WideTable,
    stats::{Describe, numeric_values},
    table::{RenderOptions, render_table},
};

/// `title` underlined with `=`.
pub fn section(title: &str, rule: usize) -> String {
    format!("{title}\n{}\n", "=".repeat(rule))
}

pub fn render_counts(frequency: &FrequencyTable, options: &RenderOptions) -> String {
    render_table(&FrequencyTable::headers(), &frequency.render_rows(), options)
}

pub fn has_data(table: &WideTable, column: &str) -> bool {
    table
        .column(column)
        .is_some_and(|cells| cells.iter().any(|cell| !is_missing(cell.as_ref())))
}

/// Statistics of the numeric cells of `column`; `None` when there are none.
pub fn describe_column(table: &WideTable, column: &str) -> Option<Describe> {
    let cells = table.column(column)?;
    let values = numeric_values(cells.iter().map(Option::as_ref));
    (!values.is_empty()).then(|| Describe::from_values(&values))
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn analysis_report(table: &WideTable, config: &AnalysisConfig) -> String {
    let options = &config.render;
    let mut out = String::new();
    let _ = writeln!(out, "Analysis Report for {} Mine Studies\n", table.row_count());

    out.push_str(&section("ANALYSIS: MINE TYPES SUMMARY", 30));
    match compute_frequency(table, &config.mine_type_column, &FrequencyOptions::default()) {
        Some(counts) => {
            let _ = writeln!(out, "Counts for each unique mine type:");
            out.push_str(&render_counts(&counts, options));
        }
        None => {
            let _ = writeln!(out, "Warning: '{}' column not found.", config.mine_type_column);
        }
    }

    out.push('\n');
    out.push_str(&section("ANALYSIS: DEPOSIT TYPES", 30));
    let combination = FrequencyOptions {
        mode: FrequencyMode::Combination,
        ..FrequencyOptions::default()
    };
    match compute_frequency(table, &config.deposit_column, &combination) {
        Some(counts) if has_data(table, &config.deposit_column) => {
            let _ = writeln!(out, "Counts for each unique deposit type:");
            out.push_str(&render_counts(&counts, options));
        }
        _ => {
            let _ = writeln!(out, "No data available for deposit type.");
        }
    }

    out.push('\n');
    out.push_str(&section("ANALYSIS: COMMODITY PRODUCTION & LOCATION", 45));
    for commodity in &config.commodities {
        out.push_str(&commodity_section(table, commodity, config));
    }

    out.push('\n');
    out.push_str(&section("ANALYSIS: OPEN PIT MINING COSTS", 35));
    for column in &config.cost_columns {
        let _ = writeln!(out, "\n--- Statistics for '{column}' ---");
        match describe_column(table, column) {
            Some(describe) => out.push_str(&describe.render(options)),
            None => {
                let _ = writeln!(out, "No data available for this parameter.");
            }
        }
    }

    let _ = writeln!(out, "\n--- Summary for '{}' ---", config.currency_column);
    match compute_frequency(table, &config.currency_column, &FrequencyOptions::default()) {
        Some(counts) if counts.total > 0 => out.push_str(&render_counts(&counts, options)),
        _ => {
            let _ = writeln!(out, "No data available for this parameter.");
        }
    }
    out
}

fn commodity_section(table: &WideTable, commodity: &str, config: &AnalysisConfig) -> String {
    let mut out = String::new();
    let name = title_case(commodity);
    let flag_column = AnalysisConfig::produces_column(commodity);
    let _ = writeln!(out, "\n--- {name} Production Summary ---");
    let Some(flags) = table.column(&flag_column) else {
        let _ = writeln!(out, "Warning: Column '{flag_column}' not found.");
        return out;
    };
    let producers: Vec<usize> = flags
        .iter()
        .enumerate()
        .filter(|(_, cell)| cell.as_ref().is_some_and(Value::is_true_flag))
        .map(|(idx, _)| idx)
        .collect();
    let _ = writeln!(out, "Total mines producing {name}: {}", producers.len());
    if producers.is_empty() || !table.has_column(&config.country_column) {
        return out;
    }
    let countries = producers.iter().filter_map(|row| {
        table
            .cell(*row, &config.country_column)
            .filter(|value| !value.is_null())
            .map(Value::as_display)
    });
    let counts = count_keys(&config.country_column, countries, 0);
    let _ = writeln!(out, "Location breakdown:");
    out.push_str(&render_counts(&counts, &config.render));
    out
}
