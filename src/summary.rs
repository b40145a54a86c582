//! Per-column descriptive summaries of a wide table.
//!
//! Every requested column produces a [`ColumnReport`] holding either a
//! [`ColumnSummary`] or a [`SummaryError`]. Callers render the successes,
//! show missing columns as text, and log and skip any other failure, so one
//! unusable column never stops the rest of a report from being written.

use std::{fmt::Write as _, io::Write};

use anyhow::{Context, Result};
use log::warn;
use thiserror::Error;

use crate::{
    caster::force_numeric,
    data::{Value, is_missing},
    frequency::{FrequencyOptions, FrequencyTable, compute_frequency},
    reshape::WideTable,
    stats::Describe,
    table::{RenderOptions, render_table},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Categorical,
    /// Counts only; for identifiers, names and coordinates.
    Null,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SummaryError {
    #[error("column '{0}' not found")]
    ColumnNotFound(String),
    #[error("column '{column}' holds non-numeric value '{value}' in row {row}")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericSummary {
    pub column: String,
    pub total: usize,
    pub nulls: usize,
    pub describe: Describe,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalSummary {
    pub column: String,
    pub total: usize,
    pub nulls: usize,
    pub unique: usize,
    pub frequencies: FrequencyTable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NullSummary {
    pub column: String,
    pub total: usize,
    pub nulls: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSummary {
    Numeric(NumericSummary),
    Categorical(CategoricalSummary),
    Null(NullSummary),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnReport {
    pub column: String,
    pub outcome: Result<ColumnSummary, SummaryError>,
}

/// Which columns get which treatment. Columns named in neither list are
/// summarized by their inferred kind.
#[derive(Debug, Clone, Default)]
pub struct SummaryPlan {
    pub numeric: Vec<String>,
    pub null_only: Vec<String>,
    /// Summarize every other table column as well.
    pub include_remaining: bool,
}

/// Numeric when every present cell is a number and there is at least one.
pub fn infer_kind(cells: &[Option<Value>]) -> ColumnKind {
    let mut present = cells.iter().filter(|cell| !is_missing(cell.as_ref())).peekable();
    if present.peek().is_none() {
        return ColumnKind::Categorical;
    }
    if present.all(|cell| cell.as_ref().is_some_and(Value::is_numeric)) {
        ColumnKind::Numeric
    } else {
        ColumnKind::Categorical
    }
}

pub fn summarize_numeric(table: &WideTable, column: &str) -> Result<NumericSummary, SummaryError> {
    let cells = table
        .column(column)
        .ok_or_else(|| SummaryError::ColumnNotFound(column.to_string()))?;
    let mut values = Vec::with_capacity(cells.len());
    let mut nulls = 0usize;
    for (row, cell) in cells.iter().enumerate() {
        if is_missing(cell.as_ref()) {
            nulls += 1;
            continue;
        }
        match cell.as_ref().and_then(Value::as_f64) {
            Some(number) => values.push(number),
            None => {
                return Err(SummaryError::NonNumeric {
                    column: column.to_string(),
                    row,
                    value: cell.as_ref().map(Value::as_display).unwrap_or_default(),
                });
            }
        }
    }
    Ok(NumericSummary {
        column: column.to_string(),
        total: cells.len(),
        nulls,
        describe: Describe::from_values(&values),
    })
}

pub fn summarize_categorical(
    table: &WideTable,
    column: &str,
) -> Result<CategoricalSummary, SummaryError> {
    let cells = table
        .column(column)
        .ok_or_else(|| SummaryError::ColumnNotFound(column.to_string()))?;
    let options = FrequencyOptions {
        include_null: true,
        ..FrequencyOptions::default()
    };
    let frequencies = compute_frequency(table, column, &options)
        .ok_or_else(|| SummaryError::ColumnNotFound(column.to_string()))?;
    let nulls = count_nulls(&cells);
    let unique = frequencies.counts.len() - usize::from(nulls > 0);
    Ok(CategoricalSummary {
        column: column.to_string(),
        total: cells.len(),
        nulls,
        unique,
        frequencies,
    })
}

pub fn summarize_null(table: &WideTable, column: &str) -> Result<NullSummary, SummaryError> {
    let cells = table
        .column(column)
        .ok_or_else(|| SummaryError::ColumnNotFound(column.to_string()))?;
    Ok(NullSummary {
        column: column.to_string(),
        total: cells.len(),
        nulls: count_nulls(&cells),
    })
}

pub fn summarize(table: &WideTable, column: &str, kind: ColumnKind) -> ColumnReport {
    let outcome = match kind {
        ColumnKind::Numeric => summarize_numeric(table, column).map(ColumnSummary::Numeric),
        ColumnKind::Categorical => {
            summarize_categorical(table, column).map(ColumnSummary::Categorical)
        }
        ColumnKind::Null => summarize_null(table, column).map(ColumnSummary::Null),
    };
    ColumnReport {
        column: column.to_string(),
        outcome,
    }
}

/// Forces every planned numeric column to numbers (non-numbers become null).
pub fn coerce_planned_numeric(table: &mut WideTable, plan: &SummaryPlan) {
    for column in &plan.numeric {
        table.map_column(column, |cell| cell.map(force_numeric));
    }
}

/// Runs the plan: numeric columns first, then null-only columns, then the rest.
pub fn build_reports(table: &WideTable, plan: &SummaryPlan) -> Vec<ColumnReport> {
    let mut reports = Vec::new();
    for column in &plan.numeric {
        reports.push(summarize(table, column, ColumnKind::Numeric));
    }
    for column in &plan.null_only {
        reports.push(summarize(table, column, ColumnKind::Null));
    }
    if plan.include_remaining {
        let remaining = table
            .columns()
            .iter()
            .filter(|name| !plan.numeric.contains(name) && !plan.null_only.contains(name));
        for column in remaining {
            let kind = table
                .column(column)
                .map_or(ColumnKind::Categorical, |cells| infer_kind(&cells));
            reports.push(summarize(table, column, kind));
        }
    }
    reports
}

/// Renders one report. Failures other than a missing column render as `None`
/// after being logged.
pub fn render_report(report: &ColumnReport, options: &RenderOptions) -> Option<String> {
    match &report.outcome {
        Ok(summary) => Some(render_summary(summary, options)),
        Err(SummaryError::ColumnNotFound(column)) => Some(format!(
            "--- Error: Column '{column}' not found in table. ---\n\n"
        )),
        Err(err) => {
            warn!("Skipping column '{}': {err}", report.column);
            None
        }
    }
}

pub fn render_summary(summary: &ColumnSummary, options: &RenderOptions) -> String {
    let mut output = String::new();
    match summary {
        ColumnSummary::Numeric(numeric) => {
            let _ = writeln!(output, "--- Numerical Summary for: '{}' ---", numeric.column);
            let _ = writeln!(output, "Total Samples: {}", numeric.total);
            let _ = writeln!(output, "Null Values: {}", numeric.nulls);
            output.push_str(&numeric.describe.render(options));
        }
        ColumnSummary::Categorical(categorical) => {
            let _ = writeln!(
                output,
                "--- Qualitative Summary for: '{}' ---",
                categorical.column
            );
            let _ = writeln!(output, "Total Samples: {}", categorical.total);
            let _ = writeln!(output, "Null Values: {}", categorical.nulls);
            let _ = writeln!(output, "Total Unique Values: {}", categorical.unique);
            let _ = writeln!(output, "\nValue Counts:");
            output.push_str(&render_table(
                &FrequencyTable::headers(),
                &categorical.frequencies.render_rows(),
                options,
            ));
        }
        ColumnSummary::Null(null) => {
            let _ = writeln!(output, "--- Null Summary for: '{}' ---", null.column);
            let _ = writeln!(output, "Total Samples: {}", null.total);
            let _ = writeln!(output, "Null Values: {}", null.nulls);
        }
    }
    output.push('\n');
    output
}

/// Counts of a written report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportOutcome {
    pub written: usize,
    pub missing: usize,
    pub failed: usize,
}

/// Writes the title and every renderable section, then flushes.
pub fn write_report<W: Write>(
    writer: &mut W,
    title: &str,
    reports: &[ColumnReport],
    options: &RenderOptions,
) -> Result<ReportOutcome> {
    let mut outcome = ReportOutcome::default();
    writeln!(writer, "{title}\n").context("Writing report title")?;
    for report in reports {
        let written = match (&report.outcome, render_report(report, options)) {
            (Err(SummaryError::ColumnNotFound(_)), Some(text)) => {
                outcome.missing += 1;
                writer.write_all(text.as_bytes())
            }
            (_, Some(text)) => {
                outcome.written += 1;
                writer.write_all(text.as_bytes())
            }
            (_, None) => {
                outcome.failed += 1;
                Ok(())
            }
        };
        written.with_context(|| format!("Writing summary for column '{}'", report.column))?;
    }
    writer.flush().context("Flushing report")?;
    Ok(outcome)
}

fn count_nulls(cells: &[Option<Value>]) -> usize {
    cells.iter().filter(|cell| is_missing(cell.as_ref())).count()
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
            Fact::new("R1", "stripping_ratio", text("3.5")),
            Fact::new("R2", "stripping_ratio", text("abc")),
            Fact::new("R3", "stripping_ratio", text("5")),
            Fact::new("R1", "country", text("Canada")),
            Fact::new("R2", "country", text("Canada")),
            Fact::new("R1", "life_of_mine", Value::Integer(12)),
            Fact::new("R2", "life_of_mine", Value::Float(8.5)),
        ];
        let mut table = WideTable::pivot(facts).expect("pivot");
        table.normalize();
        table
    }

    #[test]
    fn missing_column_is_a_reported_outcome() {
        let report = summarize(&table(), "no_such_column", ColumnKind::Numeric);
        assert_eq!(
            report.outcome,
            Err(SummaryError::ColumnNotFound("no_such_column".into()))
        );
        let rendered = render_report(&report, &RenderOptions::default()).expect("rendered");
        assert!(rendered.contains("not found"));
    }

    #[test]
    fn numeric_summary_fails_on_text_until_coerced() {
        let mut table = table();
        let report = summarize(&table, "stripping_ratio", ColumnKind::Numeric);
        assert!(matches!(report.outcome, Err(SummaryError::NonNumeric { row: 1, .. })));
        assert!(render_report(&report, &RenderOptions::default()).is_none());

        let plan = SummaryPlan {
            numeric: vec!["stripping_ratio".into()],
            ..SummaryPlan::default()
        };
        coerce_planned_numeric(&mut table, &plan);
        let Ok(ColumnSummary::Numeric(numeric)) =
            summarize(&table, "stripping_ratio", ColumnKind::Numeric).outcome
        else {
            panic!("expected numeric summary");
        };
        assert_eq!(numeric.total, 3);
        assert_eq!(numeric.nulls, 1);
        assert_eq!(numeric.describe.count, 2);
        assert!((numeric.describe.mean - 4.25).abs() < 1e-9);
    }

    #[test]
    fn categorical_summary_counts_nulls_separately() {
        let Ok(summary) = summarize_categorical(&table(), "country") else {
            panic!("expected categorical summary");
        };
        assert_eq!(summary.total, 3);
        assert_eq!(summary.nulls, 1);
        assert_eq!(summary.unique, 1);
        let rendered = render_summary(
            &ColumnSummary::Categorical(summary),
            &RenderOptions::default(),
        );
        assert!(rendered.contains("Total Unique Values: 1"));
        assert!(rendered.contains("<null>"));
    }

    #[test]
    fn infer_kind_dispatches_on_present_cells() {
        let table = table();
        let lom = table.column("life_of_mine").expect("column");
        assert_eq!(infer_kind(&lom), ColumnKind::Numeric);
        let country = table.column("country").expect("column");
        assert_eq!(infer_kind(&country), ColumnKind::Categorical);
        assert_eq!(infer_kind(&[None, None]), ColumnKind::Categorical);
    }

    #[test]
    fn batch_continues_past_failures() {
        let table = table();
        let plan = SummaryPlan {
            numeric: vec!["stripping_ratio".into(), "absent".into()],
            null_only: vec!["report_id".into()],
            include_remaining: true,
        };
        let reports = build_reports(&table, &plan);
        let mut buffer = Vec::new();
        let outcome =
            write_report(&mut buffer, "Summary", &reports, &RenderOptions::default()).expect("write");
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.missing, 1);
        assert_eq!(outcome.written, 3);
        let text = String::from_utf8(buffer).expect("utf8");
        assert!(text.contains("--- Null Summary for: 'report_id' ---"));
        assert!(text.contains("--- Numerical Summary for: 'life_of_mine' ---"));
        assert!(text.contains("--- Qualitative Summary for: 'country' ---"));
        assert!(text.contains("Column 'absent' not found"));
    }
}
