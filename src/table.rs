use std::borrow::Cow;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// Display settings handed to every renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Maximum body rows per table; `None` prints every row.
    pub max_rows: Option<usize>,
    /// Cells wider than this are cut and suffixed with `...`.
    pub max_colwidth: Option<usize>,
    /// Digits after the decimal point for statistics.
    pub precision: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_rows: None,
            max_colwidth: None,
            precision: 6,
        }
    }
}

pub fn render_table(headers: &[String], rows: &[Vec<String>], options: &RenderOptions) -> String {
    let column_count = headers.len();
    let total = rows.len();
    let shown = options.max_rows.map_or(total, |limit| limit.min(total));
    let rows = &rows[..shown];

    let mut widths = headers
        .iter()
        .map(|h| display_width(&clip(h, options)))
        .collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(&clip(cell, options)));
        }
    }

    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();

    // Header
    let header_line = format_row(headers, &widths, options);
    let _ = writeln!(output, "{header_line}");

    // Separator
    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let separator_line = format_row(&separator_cells, &separator_widths, options);
    let _ = writeln!(output, "{separator_line}");

    // Rows
    for row in rows {
        let row_line = format_row(row, &widths, options);
        let _ = writeln!(output, "{row_line}");
    }

    if shown < total {
        let _ = writeln!(output, "... ({shown} of {total} rows shown)");
    }

    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>], options: &RenderOptions) {
    let rendered = render_table(headers, rows, options);
    print!("{rendered}");
}

fn format_row(values: &[String], widths: &[usize], options: &RenderOptions) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate() {
        if idx >= widths.len() {
            break;
        }
        let clipped = clip(value, options);
        let sanitized = sanitize_cell(clipped.as_ref());
        let display = display_width(sanitized.as_ref());
        let mut cell = sanitized.into_owned();
        let padding = widths
            .get(idx)
            .copied()
            .unwrap_or_default()
            .saturating_sub(display);
        if padding > 0 {
            cell.push_str(&" ".repeat(padding));
        }
        cells.push(cell);
    }
    let mut line = cells.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn clip<'a>(value: &'a str, options: &RenderOptions) -> Cow<'a, str> {
    match options.max_colwidth {
        Some(limit) if value.chars().count() > limit => {
            let keep = limit.saturating_sub(3);
            let mut clipped: String = value.chars().take(keep).collect();
            clipped.push_str("...");
            Cow::Owned(clipped)
        }
        _ => Cow::Borrowed(value),
    }
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // Skip ANSI escape sequence (e.g. \x1b[31m)
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        let mut sanitized = String::with_capacity(value.len());
        for ch in value.chars() {
            match ch {
                '\n' | '\r' | '\t' => sanitized.push(' '),
                other => sanitized.push(other),
            }
        }
        Cow::Owned(sanitized)
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn render_table_aligns_columns() {
        let headers = strings(&["value", "count"]);
        let rows = vec![strings(&["Canada", "3"]), strings(&["Peru", "12"])];
        let rendered = render_table(&headers, &rows, &RenderOptions::default());
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "value   count");
        assert_eq!(lines[1], "------  -----");
        assert_eq!(lines[2], "Canada  3");
        assert_eq!(lines[3], "Peru    12");
    }

    #[test]
    fn render_table_honours_row_and_width_limits() {
        let headers = strings(&["value"]);
        let rows = vec![
            strings(&["a very long category name"]),
            strings(&["b"]),
            strings(&["c"]),
        ];
        let options = RenderOptions {
            max_rows: Some(2),
            max_colwidth: Some(8),
            precision: 6,
        };
        let rendered = render_table(&headers, &rows, &options);
        assert!(rendered.contains("a ver..."));
        assert!(!rendered.contains("\nc\n"));
        assert!(rendered.contains("(2 of 3 rows shown)"));
    }
}
