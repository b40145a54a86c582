//! Delimited checkpoint of the wide table.
//!
//! The header is `report_id` followed by the parameter columns. Composite
//! cells are written as JSON, floats always with a fractional part or an
//! exponent, and absent cells as empty fields. Reading a checkpoint back and
//! normalizing it recovers the same cell kinds, except that empty text and
//! non-finite floats come back as absent cells.

use std::{io::Read, path::Path};

use anyhow::{Context, Result, anyhow};
use encoding_rs::Encoding;
use log::info;

use crate::{
    data::Value,
    io_utils,
    reshape::{REPORT_ID_COLUMN, WideRow, WideTable},
};

/// Writes `table` to `path` (`-` for stdout) and returns the row count.
pub fn write_wide_csv(table: &WideTable, path: &Path, delimiter: u8) -> Result<usize> {
    let mut writer = io_utils::open_csv_writer(path, delimiter)?;
    let header = std::iter::once(REPORT_ID_COLUMN).chain(table.columns().iter().map(String::as_str));
    writer
        .write_record(header)
        .with_context(|| format!("Writing header to {path:?}"))?;
    for row in table.rows() {
        let record = std::iter::once(row.report_id.clone()).chain(
            row.cells
                .iter()
                .map(|cell| cell.as_ref().map(checkpoint_field).unwrap_or_default()),
        );
        writer
            .write_record(record)
            .with_context(|| format!("Writing row '{}'", row.report_id))?;
    }
    writer.flush().with_context(|| format!("Flushing {path:?}"))?;
    info!("Wrote {} row(s) to {:?}", table.row_count(), path);
    Ok(table.row_count())
}

fn checkpoint_field(value: &Value) -> String {
    match value {
        Value::Float(f) if f.is_finite() => format!("{f:?}"),
        Value::Float(_) => String::new(),
        other => other.as_display(),
    }
}

/// Reads a checkpoint. Cells come back as raw text; call
/// [`WideTable::normalize`] to recover numbers and composites.
pub fn read_wide_csv(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<WideTable> {
    let reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
    read_wide_records(reader, encoding).with_context(|| format!("Reading table from {path:?}"))
}

pub fn read_wide_records<R: Read>(
    mut reader: csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<WideTable> {
    let headers = io_utils::reader_headers(&mut reader, encoding)?;
    let key_idx = headers
        .iter()
        .position(|h| h == REPORT_ID_COLUMN)
        .ok_or_else(|| anyhow!("Missing '{REPORT_ID_COLUMN}' column"))?;
    let columns: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != key_idx)
        .map(|(_, name)| name.clone())
        .collect();

    let mut rows = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", idx + 2))?;
        let mut fields = io_utils::decode_record(&record, encoding)?;
        let report_id = std::mem::take(&mut fields[key_idx]);
        let cells = fields
            .into_iter()
            .enumerate()
            .filter(|(pos, _)| *pos != key_idx)
            .map(|(_, field)| (!field.is_empty()).then_some(Value::Text(field)))
            .collect();
        rows.push(WideRow { report_id, cells });
    }
    Ok(WideTable::from_parts(columns, rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reshape::Fact;
    use encoding_rs::UTF_8;
    use serde_json::json;

    #[test]
    fn checkpoint_round_trip_recovers_cell_kinds() {
        let facts = vec![
            Fact::new("R1", "country", Value::Text("Chile, Region II".into())),
            Fact::new("R1", "life_of_mine", Value::Integer(14)),
            Fact::new("R2", "deposit_type", Value::from(json!(["Porphyry", "Skarn"]))),
            Fact::new("R2", "copper_price", Value::Float(3.85)),
        ];
        let table = WideTable::pivot(facts).expect("pivot");
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("wide.csv");
        assert_eq!(write_wide_csv(&table, &path, b',').expect("write"), 2);

        let mut restored = read_wide_csv(&path, b',', UTF_8).expect("read");
        restored.normalize();
        assert_eq!(restored.columns(), table.columns());
        assert_eq!(restored.cell(0, "life_of_mine"), Some(&Value::Integer(14)));
        assert_eq!(restored.cell(0, "deposit_type"), None);
        assert_eq!(
            restored.cell(1, "deposit_type"),
            Some(&Value::from(json!(["Porphyry", "Skarn"])))
        );
        assert_eq!(
            restored.cell(0, "country"),
            Some(&Value::Text("Chile, Region II".into()))
        );
    }

    #[test]
    fn integral_floats_stay_floats() {
        let facts = vec![
            Fact::new("R1", "strip_ratio", Value::Float(3.0)),
            Fact::new("R1", "capex", Value::Float(2.5e16)),
            Fact::new("R1", "mine_life", Value::Integer(3)),
            Fact::new("R1", "grades", Value::from(json!([1.0, 2]))),
            Fact::new("R2", "strip_ratio", Value::Float(-0.0)),
            Fact::new("R2", "capex", Value::Float(f64::NAN)),
        ];
        let mut table = WideTable::pivot(facts).expect("pivot");
        table.normalize();
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("wide.csv");
        write_wide_csv(&table, &path, b',').expect("write");

        let mut restored = read_wide_csv(&path, b',', UTF_8).expect("read");
        restored.normalize();
        for column in ["strip_ratio", "mine_life", "grades"] {
            for row in 0..2 {
                assert_eq!(
                    restored.cell(row, column),
                    table.cell(row, column),
                    "{column} row {row}"
                );
            }
        }
        assert_eq!(restored.cell(0, "strip_ratio"), Some(&Value::Float(3.0)));
        assert_eq!(restored.cell(0, "capex"), Some(&Value::Float(2.5e16)));
        assert_eq!(restored.cell(1, "capex"), None);
    }

    #[test]
    fn missing_key_column_is_an_error() {
        let reader = io_utils::open_csv_reader("name,value\na,1\n".as_bytes(), b',');
        let err = read_wide_records(reader, UTF_8).expect_err("no key");
        assert!(err.to_string().contains("report_id"));
    }
}
