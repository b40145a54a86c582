//! Long-to-wide pivot of the fact relation.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::{
    caster::{cast_value, coerce_column},
    data::Value,
};

/// Name of the row-key column in every wide rendering.
pub const REPORT_ID_COLUMN: &str = "report_id";

/// One (report, parameter, value) triple of the long format.
#[derive(Debug, Clone, PartialEq)]
pub struct Fact {
    pub report_id: String,
    pub parameter_id: String,
    pub value: Value,
}

impl Fact {
    pub fn new(report_id: impl Into<String>, parameter_id: impl Into<String>, value: Value) -> Self {
        Self {
            report_id: report_id.into(),
            parameter_id: parameter_id.into(),
            value,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ReshapeError {
    #[error("duplicate fact for report '{report_id}' and parameter '{parameter_id}'")]
    DuplicateFact {
        report_id: String,
        parameter_id: String,
    },
    #[error("column '{0}' has {1} cell(s) but the table has {2} row(s)")]
    ColumnLength(String, usize, usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    pub report_id: String,
    pub cells: Vec<Option<Value>>,
}

/// One row per report, one column per parameter. `None` marks an absent fact.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WideTable {
    columns: Vec<String>,
    rows: Vec<WideRow>,
}

impl WideTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a table from already-shaped rows; used by the CSV checkpoint reader.
    pub fn from_parts(columns: Vec<String>, rows: Vec<WideRow>) -> Result<Self, ReshapeError> {
        for row in &rows {
            if row.cells.len() != columns.len() {
                return Err(ReshapeError::ColumnLength(
                    row.report_id.clone(),
                    row.cells.len(),
                    columns.len(),
                ));
            }
        }
        Ok(Self { columns, rows })
    }

    /// Pivots the fact relation. Rows are ordered by report id and columns by
    /// parameter id; a repeated (report, parameter) pair is an error.
    pub fn pivot<I>(facts: I) -> Result<Self, ReshapeError>
    where
        I: IntoIterator<Item = Fact>,
    {
        let mut by_report: BTreeMap<String, BTreeMap<String, Value>> = BTreeMap::new();
        let mut parameters = BTreeSet::new();
        for fact in facts {
            let cells = by_report.entry(fact.report_id.clone()).or_default();
            if cells.contains_key(&fact.parameter_id) {
                return Err(ReshapeError::DuplicateFact {
                    report_id: fact.report_id,
                    parameter_id: fact.parameter_id,
                });
            }
            parameters.insert(fact.parameter_id.clone());
            cells.insert(fact.parameter_id, fact.value);
        }
        if by_report.is_empty() {
            return Ok(Self::empty());
        }

        let columns: Vec<String> = parameters.into_iter().collect();
        let rows = by_report
            .into_iter()
            .map(|(report_id, mut cells)| WideRow {
                report_id,
                cells: columns.iter().map(|column| cells.remove(column)).collect(),
            })
            .collect();
        Ok(Self { columns, rows })
    }

    /// Applies the value cast and the numeric coercion to every column.
    pub fn normalize(&mut self) {
        for idx in 0..self.columns.len() {
            let mut cells = self.take_column(idx);
            for cell in cells.iter_mut() {
                if let Some(value) = cell.take() {
                    *cell = Some(cast_value(value));
                }
            }
            coerce_column(&mut cells);
            self.put_column(idx, cells);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[WideRow] {
        &self.rows
    }

    pub fn has_column(&self, name: &str) -> bool {
        name == REPORT_ID_COLUMN || self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Cells of a column in row order; the row key is addressable by name too.
    pub fn column(&self, name: &str) -> Option<Vec<Option<Value>>> {
        if name == REPORT_ID_COLUMN && self.column_index(name).is_none() {
            return Some(
                self.rows
                    .iter()
                    .map(|row| Some(Value::Text(row.report_id.clone())))
                    .collect(),
            );
        }
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row.cells[idx].clone()).collect())
    }

    pub fn cell(&self, row: usize, name: &str) -> Option<&Value> {
        let idx = self.column_index(name)?;
        self.rows.get(row)?.cells[idx].as_ref()
    }

    /// Rewrites every cell of `name` in place; returns false when the column is absent.
    pub fn map_column<F>(&mut self, name: &str, mut f: F) -> bool
    where
        F: FnMut(Option<Value>) -> Option<Value>,
    {
        let Some(idx) = self.column_index(name) else {
            return false;
        };
        for row in &mut self.rows {
            let cell = row.cells[idx].take();
            row.cells[idx] = f(cell);
        }
        true
    }

    /// Adds a derived column, replacing an existing one with the same name.
    pub fn set_column(
        &mut self,
        name: &str,
        cells: Vec<Option<Value>>,
    ) -> Result<(), ReshapeError> {
        if cells.len() != self.rows.len() {
            return Err(ReshapeError::ColumnLength(
                name.to_string(),
                cells.len(),
                self.rows.len(),
            ));
        }
        match self.column_index(name) {
            Some(idx) => self.put_column(idx, cells),
            None => {
                self.columns.push(name.to_string());
                for (row, cell) in self.rows.iter_mut().zip(cells) {
                    row.cells.push(cell);
                }
            }
        }
        Ok(())
    }

    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&WideTable, usize) -> bool,
    {
        let decisions: Vec<bool> = (0..self.rows.len()).map(|idx| keep(&*self, idx)).collect();
        let mut flags = decisions.into_iter();
        self.rows.retain(|_| flags.next().unwrap_or(false));
    }

    /// Re-flattens the table into facts, one per present cell.
    pub fn to_facts(&self) -> Vec<Fact> {
        self.rows
            .iter()
            .flat_map(|row| {
                self.columns
                    .iter()
                    .zip(&row.cells)
                    .filter_map(move |(column, cell)| {
                        cell.as_ref()
                            .map(|value| Fact::new(&row.report_id, column, value.clone()))
                    })
            })
            .collect()
    }

    fn take_column(&mut self, idx: usize) -> Vec<Option<Value>> {
        self.rows.iter_mut().map(|row| row.cells[idx].take()).collect()
    }

    fn put_column(&mut self, idx: usize, cells: Vec<Option<Value>>) {
        for (row, cell) in self.rows.iter_mut().zip(cells) {
            row.cells[idx] = cell;
        }
    }
}
