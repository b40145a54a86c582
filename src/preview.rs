use anyhow::{Result, bail};
use log::info;

use crate::{
    cli::PreviewArgs,
    data::Value,
    load_table,
    reshape::{REPORT_ID_COLUMN, WideTable},
    table::{self, RenderOptions},
};

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let table = load_table(&args.source)?;
    let columns = if args.columns.is_empty() {
        table.columns().to_vec()
    } else {
        args.columns.clone()
    };
    if let Some(missing) = columns.iter().find(|c| !table.has_column(c)) {
        bail!("Column '{missing}' not found in table");
    }
    let (headers, rows) = preview_rows(&table, &columns, args.rows);
    let options = RenderOptions {
        max_colwidth: args.max_width,
        ..RenderOptions::default()
    };
    table::print_table(&headers, &rows, &options);
    info!(
        "Displayed {} of {} row(s)",
        rows.len(),
        table.row_count()
    );
    Ok(())
}

/// Header and display cells of the first `limit` rows, report id first.
pub fn preview_rows(
    table: &WideTable,
    columns: &[String],
    limit: usize,
) -> (Vec<String>, Vec<Vec<String>>) {
    let columns: Vec<&String> = columns.iter().filter(|c| *c != REPORT_ID_COLUMN).collect();
    let headers = std::iter::once(REPORT_ID_COLUMN.to_string())
        .chain(columns.iter().map(|c| c.to_string()))
        .collect();
    let rows = table
        .rows()
        .iter()
        .enumerate()
        .take(limit)
        .map(|(idx, row)| {
            std::iter::once(row.report_id.clone())
                .chain(
                    columns
                        .iter()
                        .map(|c| table.cell(idx, c).map(Value::as_display).unwrap_or_default()),
                )
                .collect()
        })
        .collect();
    (headers, rows)
}
