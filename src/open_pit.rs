//! Open-pit report: rows whose mine type mentions the open-pit keyword, with
//! a derived daily mining rate and study year, deposit-type atomization, a
//! cost-by-deposit "hardness" table, capex by year and distribution plots.

use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::Datelike;
use log::{debug, info, warn};

use crate::{
    analysis::{describe_column, has_data, render_counts},
    atomize::atomize_column,
    caster::force_numeric,
    config::{AnalysisConfig, OpenPitConfig},
    data::{Value, parse_naive_date, parse_naive_datetime},
    frequency::{FrequencyOptions, compute_frequency, count_keys},
    plot::{BoxStats, LogHistogram, render_box_plot, render_histogram},
    reshape::WideTable,
    stats::{GroupOptions, GroupedDescribe},
    table::{RenderOptions, render_table},
};

pub const MINING_RATE_COLUMN: &str = "calculated_mining_rate_tpd";
pub const YEAR_COLUMN: &str = "year";
pub const HISTOGRAM_FILE: &str = "mining_rate_histogram.svg";
pub const BOX_PLOT_FILE: &str = "mining_rate_boxplot.svg";

const DAYS_PER_YEAR: f64 = 365.25;
const PLOT_AXIS_LABEL: &str = "Tonnes Per Day (TPD)";

#[derive(Debug, Clone)]
pub struct OpenPitReport {
    pub studies: usize,
    pub text: String,
    pub plots: Vec<PathBuf>,
}

/// Rows whose mine type contains `keyword`, ignoring case. `None` when the
/// table has no mine type column.
pub fn select_open_pit(table: &WideTable, mine_type_column: &str, keyword: &str) -> Option<WideTable> {
    table.column_index(mine_type_column)?;
    let needle = keyword.to_lowercase();
    let mut selected = table.clone();
    selected.retain_rows(|t, row| {
        t.cell(row, mine_type_column)
            .filter(|value| !value.is_null())
            .is_some_and(|value| value.as_display().to_lowercase().contains(&needle))
    });
    Some(selected)
}

pub fn force_numeric_columns(table: &mut WideTable, columns: &[String]) {
    for column in columns {
        if table.map_column(column, |cell| cell.map(force_numeric)) {
            debug!("Forced '{column}' to numbers");
        }
    }
}

/// Total material over life of mine in days; a zero life of mine gives null.
pub fn mining_rate(total_material: Option<f64>, life_of_mine: Option<f64>) -> Option<f64> {
    let days = life_of_mine? * DAYS_PER_YEAR;
    if days == 0.0 {
        return None;
    }
    let rate = total_material? / days;
    rate.is_finite().then_some(rate)
}

/// Adds the mining rate column when both inputs exist. Returns whether it did.
pub fn add_mining_rate(table: &mut WideTable, config: &OpenPitConfig) -> Result<bool> {
    let (Some(material), Some(life)) = (
        table.column(&config.total_material_column),
        table.column(&config.life_of_mine_column),
    ) else {
        return Ok(false);
    };
    let cells = material
        .into_iter()
        .zip(life)
        .map(|(material, life)| {
            let material = material.map(force_numeric).and_then(|v| v.as_f64());
            let life = life.map(force_numeric).and_then(|v| v.as_f64());
            mining_rate(material, life).map(Value::Float)
        })
        .collect();
    table.set_column(MINING_RATE_COLUMN, cells)?;
    Ok(true)
}

/// Calendar year of a date cell. Bare years are accepted as text or integers.
pub fn year_of(cell: &Value) -> Option<i64> {
    match cell {
        Value::Integer(year) if (1800..=2200).contains(year) => Some(*year),
        Value::Text(text) => {
            let text = text.trim();
            if let Ok(date) = parse_naive_date(text) {
                return Some(i64::from(date.year()));
            }
            if let Ok(datetime) = parse_naive_datetime(text) {
                return Some(i64::from(datetime.year()));
            }
            text.parse::<i64>()
                .ok()
                .filter(|year| (1800..=2200).contains(year))
        }
        _ => None,
    }
}

pub fn add_year(table: &mut WideTable, config: &OpenPitConfig) -> Result<bool> {
    let Some(dates) = table.column(&config.effective_date_column) else {
        return Ok(false);
    };
    let cells = dates
        .iter()
        .map(|cell| cell.as_ref().and_then(year_of).map(Value::Integer))
        .collect();
    table.set_column(YEAR_COLUMN, cells)?;
    Ok(true)
}

/// Prepares the open-pit subset and writes nothing. `None` when there is no
/// mine type column or no row matches.
pub fn prepare(table: &WideTable, config: &AnalysisConfig) -> Result<Option<WideTable>> {
    let Some(mut open_pit) = select_open_pit(table, &config.mine_type_column, &config.open_pit.keyword)
    else {
        warn!("'{}' column not found", config.mine_type_column);
        return Ok(None);
    };
    info!(
        "Found {} report(s) related to open pit mining",
        open_pit.row_count()
    );
    if open_pit.is_empty() {
        return Ok(None);
    }
    add_mining_rate(&mut open_pit, &config.open_pit)?;
    add_year(&mut open_pit, &config.open_pit)?;
    force_numeric_columns(&mut open_pit, &config.numeric_columns);
    Ok(Some(open_pit))
}

/// Builds the report text and draws the plots into `reports_dir`.
pub fn open_pit_report(
    table: &WideTable,
    config: &AnalysisConfig,
    reports_dir: &Path,
) -> Result<Option<OpenPitReport>> {
    let Some(open_pit) = prepare(table, config)? else {
        return Ok(None);
    };
    let options = &config.render;
    let op = &config.open_pit;
    let rule = "=".repeat(20);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\nThis report is based on {} studies with an open pit component.",
        open_pit.row_count()
    );

    let _ = writeln!(out, "\n{rule} ADVANCED DEPOSIT TYPE ANALYSIS {rule}");
    out.push_str(&deposit_sections(&open_pit, config));

    if open_pit.has_column(YEAR_COLUMN) && open_pit.has_column(&op.capex_column) {
        let _ = writeln!(out, "\n--- Initial Capex (in Millions) by Year ---");
        out.push_str(&capex_by_year(&open_pit, op, options));
    } else {
        let _ = writeln!(
            out,
            "Could not perform Capex trend analysis: '{YEAR_COLUMN}' or '{}' column is missing.",
            op.capex_column
        );
    }

    let _ = writeln!(out, "\n\n{rule} DIRECT FACTOR ANALYSIS {rule}");
    let _ = writeln!(out, "\n--- Country Distribution ---");
    if let Some(counts) =
        compute_frequency(&open_pit, &config.country_column, &FrequencyOptions::default())
    {
        out.push_str(&render_counts(&counts, options));
    }

    let _ = writeln!(out, "\n--- Open Pit Mining Rate (Calculated) ---");
    match describe_column(&open_pit, MINING_RATE_COLUMN) {
        Some(describe) => {
            let _ = writeln!(out, "Statistics for Calculated Mining Rate (tonnes per day):");
            out.push_str(&describe.render(options));
        }
        None => {
            let _ = writeln!(out, "Could not calculate mining rate.");
        }
    }

    let _ = writeln!(out, "\n--- Average Strip Ratio (Direct) ---");
    match describe_column(&open_pit, &op.strip_ratio_column) {
        Some(describe) => out.push_str(&describe.render(options)),
        None => {
            let _ = writeln!(out, "No data for '{}'.", op.strip_ratio_column);
        }
    }

    let _ = writeln!(out, "\n--- Total OP Mining Cost (Direct) ---");
    match describe_column(&open_pit, &op.cost_column) {
        Some(describe) => {
            let _ = writeln!(out, "Statistics for '{}':", op.cost_column);
            out.push_str(&describe.render(options));
        }
        None => {
            let _ = writeln!(out, "No data for total open pit mining cost.");
        }
    }

    let _ = writeln!(out, "\n\n{rule} DATA VISUALIZATIONS {rule}");
    let _ = writeln!(
        out,
        "The following plots have been generated and saved to the reports directory."
    );
    let plots = draw_mining_rate(&open_pit, op, reports_dir)?;
    if plots.is_empty() {
        let _ = writeln!(
            out,
            "\n- Could not generate plots for Mining Rate: No data available."
        );
    } else {
        let _ = writeln!(out);
        for path in &plots {
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let _ = writeln!(out, "- Plot saved to: {name}");
        }
    }

    Ok(Some(OpenPitReport {
        studies: open_pit.row_count(),
        text: out,
        plots,
    }))
}

fn deposit_sections(open_pit: &WideTable, config: &AnalysisConfig) -> String {
    let mut out = String::new();
    let deposit_column = &config.deposit_column;
    let atomized = atomize_column(open_pit, deposit_column).filter(|_| has_data(open_pit, deposit_column));
    let Some(atomized) = atomized else {
        let _ = writeln!(out, "No data available for deposit type analysis.");
        let _ = writeln!(
            out,
            "Could not perform hardness analysis: '{deposit_column}' or mining cost column is missing."
        );
        return out;
    };

    let _ = writeln!(
        out,
        "\n--- Counts of Unique Deposit Type Combinations (Collapsed) ---"
    );
    let collapsed = count_keys(deposit_column, atomized.combinations.iter().cloned(), 0);
    out.push_str(&render_counts(&collapsed, &config.render));

    let _ = writeln!(
        out,
        "\n--- Total Occurrences of Each Individual Deposit Type (Atomized) ---"
    );
    let atoms = count_keys(
        deposit_column,
        atomized.exploded_labels().map(str::to_string),
        0,
    );
    out.push_str(&render_counts(&atoms, &config.render));

    let cost_column = &config.open_pit.cost_column;
    if !open_pit.has_column(cost_column) {
        let _ = writeln!(
            out,
            "Could not perform hardness analysis: '{deposit_column}' or mining cost column is missing."
        );
        return out;
    }
    let pairs = atomized.exploded.iter().map(|row| {
        let cost = open_pit.cell(row.row, cost_column).and_then(Value::as_f64);
        (row.label.clone(), cost)
    });
    let hardness = GroupedDescribe::build(
        "atomized_deposit_type",
        pairs,
        GroupOptions {
            min_count: config.open_pit.min_group_count,
            sort_by_mean: true,
        },
    );
    let _ = writeln!(
        out,
        "\n--- Mining Cost by Atomized Deposit Type (at least {} costed reports) ---",
        config.open_pit.min_group_count
    );
    if hardness.is_empty() {
        let _ = writeln!(out, "No deposit type meets the minimum report count.");
    } else {
        out.push_str(&render_table(
            &hardness.headers(),
            &hardness.render_rows(&config.render),
            &config.render,
        ));
    }
    out
}

fn capex_by_year(
    open_pit: &WideTable,
    config: &OpenPitConfig,
    options: &RenderOptions,
) -> String {
    let pairs = (0..open_pit.row_count()).filter_map(|row| {
        let year = open_pit.cell(row, YEAR_COLUMN).and_then(Value::as_f64)?;
        let capex = open_pit.cell(row, &config.capex_column).and_then(Value::as_f64);
        Some((format!("{year:.0}"), capex))
    });
    let grouped = GroupedDescribe::build(YEAR_COLUMN, pairs, GroupOptions::default());
    render_table(&grouped.headers(), &grouped.render_rows(options), options)
}

fn draw_mining_rate(open_pit: &WideTable, config: &OpenPitConfig, reports_dir: &Path) -> Result<Vec<PathBuf>> {
    let Some(cells) = open_pit.column(MINING_RATE_COLUMN) else {
        return Ok(Vec::new());
    };
    let values: Vec<f64> = cells.iter().filter_map(|cell| cell.as_ref()?.as_f64()).collect();
    let mut plots = Vec::new();
    if let Some(histogram) = LogHistogram::build(&values, config.histogram_bins) {
        let path = reports_dir.join(HISTOGRAM_FILE);
        render_histogram(
            &path,
            "Distribution of Calculated Mining Rate (Log Scale)",
            PLOT_AXIS_LABEL,
            &histogram,
        )?;
        plots.push(path);
    }
    if let Some(stats) = BoxStats::from_values(&values) {
        let path = reports_dir.join(BOX_PLOT_FILE);
        render_box_plot(
            &path,
            "Box Plot of Calculated Mining Rate (Log Scale)",
            PLOT_AXIS_LABEL,
            &stats,
        )?;
        plots.push(path);
    }
    Ok(plots)
}
