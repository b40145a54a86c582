//! SQLite persistence for parameters, reports and facts.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use log::debug;
use rusqlite::{
    Connection, DatabaseName, OptionalExtension, Transaction, params,
    types::{Value as SqlValue, ValueRef},
};

use crate::{
    data::Value,
    io_utils::ensure_parent_dir,
    reshape::Fact,
    schema::{PRAGMAS, SCHEMA},
};

/// Tag recorded for every report loaded from the extraction JSON.
pub const REPORT_TYPE: &str = "lhir";

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub parameter_id: String,
    pub description: Option<String>,
    pub conf_upper: Option<f64>,
    pub conf_lower: Option<f64>,
    pub prob_correct: Option<f64>,
    pub samples_checked: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub report_id: String,
    pub report_type: String,
    pub filing_year: Option<String>,
    pub is_new: bool,
    pub pages: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub parameters: usize,
    pub reports: usize,
    pub facts: usize,
}

pub struct FactStore {
    conn: Connection,
}

impl FactStore {
    /// Opens (or creates) a store file and applies the schema.
    pub fn open(path: &Path) -> Result<Self> {
        ensure_parent_dir(path)?;
        let conn = Connection::open(path)
            .with_context(|| format!("Opening fact store at {}", path.display()))?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Opening in-memory fact store")?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Copies an existing store file into memory; a missing file starts empty.
    /// Pair with [`FactStore::persist`] to write the result back.
    pub fn load_into_memory(path: &Path) -> Result<Self> {
        let mut conn = Connection::open_in_memory().context("Opening in-memory fact store")?;
        if path.exists() {
            conn.restore(DatabaseName::Main, path, None::<fn(rusqlite::backup::Progress)>)
                .with_context(|| format!("Restoring fact store from {}", path.display()))?;
            debug!("Restored {} into memory", path.display());
        }
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Writes the whole database to `path`, replacing its contents.
    pub fn persist(&self, path: &Path) -> Result<()> {
        ensure_parent_dir(path)?;
        self.conn
            .backup(DatabaseName::Main, path, None)
            .with_context(|| format!("Writing fact store to {}", path.display()))
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch(PRAGMAS)
            .context("Configuring sqlite pragmas")?;
        self.conn
            .execute_batch(SCHEMA)
            .context("Applying fact store schema")
    }

    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        self.conn.transaction().context("Starting transaction")
    }

    pub fn parameters(&self) -> Result<Vec<Parameter>> {
        let mut stmt = self.conn.prepare(
            "SELECT parameter_id, parameter_desc, conf_upper, conf_lower, prob_correct, samples_checked
             FROM parameters ORDER BY parameter_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Parameter {
                parameter_id: row.get(0)?,
                description: row.get(1)?,
                conf_upper: row.get(2)?,
                conf_lower: row.get(3)?,
                prob_correct: row.get(4)?,
                samples_checked: row.get(5)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Reading parameters")
    }

    pub fn reports(&self) -> Result<Vec<Report>> {
        let mut stmt = self.conn.prepare(
            "SELECT report_id, report_type, sedar_year, is_new, pages FROM reports ORDER BY report_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Report {
                report_id: row.get(0)?,
                report_type: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                filing_year: row.get(2)?,
                is_new: row.get::<_, Option<bool>>(3)?.unwrap_or(false),
                pages: row.get(4)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Reading reports")
    }

    pub fn report(&self, report_id: &str) -> Result<Option<Report>> {
        Ok(self.reports()?.into_iter().find(|r| r.report_id == report_id))
    }

    /// Every fact in the long format, ordered by report then parameter.
    pub fn facts(&self) -> Result<Vec<Fact>> {
        let mut stmt = self.conn.prepare(
            "SELECT report_id, parameter_id, value FROM main ORDER BY report_id, parameter_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Fact {
                report_id: row.get(0)?,
                parameter_id: row.get(1)?,
                value: from_sql_value(row.get_ref(2)?),
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Reading facts")
    }

    pub fn is_flagged(&self, report_id: &str, parameter_id: &str) -> Result<Option<bool>> {
        self.conn
            .query_row(
                "SELECT flagged FROM main WHERE report_id = ?1 AND parameter_id = ?2",
                params![report_id, parameter_id],
                |row| row.get::<_, Option<bool>>(0),
            )
            .optional()
            .map(|flag| flag.map(|f| f.unwrap_or(false)))
            .context("Reading fact flag")
    }

    pub fn counts(&self) -> Result<StoreCounts> {
        let count = |table: &str| -> Result<usize> {
            let sql = format!("SELECT COUNT(*) FROM {table}");
            let n: i64 = self
                .conn
                .query_row(&sql, [], |row| row.get(0))
                .with_context(|| format!("Counting rows of {table}"))?;
            usize::try_from(n).map_err(|_| anyhow!("Negative row count for {table}"))
        };
        Ok(StoreCounts {
            parameters: count("parameters")?,
            reports: count("reports")?,
            facts: count("main")?,
        })
    }
}

/// Registers a parameter id; returns false when it was already known.
pub fn register_parameter(tx: &Transaction<'_>, parameter_id: &str) -> Result<bool> {
    let inserted = tx
        .execute(
            "INSERT OR IGNORE INTO parameters (parameter_id) VALUES (?1)",
            params![parameter_id],
        )
        .with_context(|| format!("Registering parameter '{parameter_id}'"))?;
    Ok(inserted > 0)
}

/// Inserts or fully replaces a report's metadata.
pub fn upsert_report(tx: &Transaction<'_>, report: &Report) -> Result<()> {
    tx.execute(
        "INSERT INTO reports (report_id, report_type, sedar_year, is_new, pages)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(report_id) DO UPDATE SET
             report_type = excluded.report_type,
             sedar_year  = excluded.sedar_year,
             is_new      = excluded.is_new,
             pages       = excluded.pages",
        params![
            report.report_id,
            report.report_type,
            report.filing_year,
            report.is_new,
            report.pages,
        ],
    )
    .with_context(|| format!("Writing report '{}'", report.report_id))?;
    Ok(())
}

/// Inserts a fact unless its (report, parameter) pair already exists.
/// Returns false when an existing fact was kept.
pub fn insert_fact(tx: &Transaction<'_>, fact: &Fact) -> Result<bool> {
    let inserted = tx
        .execute(
            "INSERT OR IGNORE INTO main (report_id, parameter_id, value, flagged)
             VALUES (?1, ?2, ?3, 0)",
            params![fact.report_id, fact.parameter_id, to_sql_value(&fact.value)],
        )
        .with_context(|| {
            format!(
                "Writing fact '{}' for report '{}'",
                fact.parameter_id, fact.report_id
            )
        })?;
    Ok(inserted > 0)
}

/// Storage form of a cell: scalars natively, composites as JSON text.
pub fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Float(f) if f.is_nan() => SqlValue::Null,
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::List(_) | Value::Object(_) => SqlValue::Text(value.to_json().to_string()),
    }
}

pub fn from_sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(id: &str, pages: i64) -> Report {
        Report {
            report_id: id.to_string(),
            report_type: REPORT_TYPE.to_string(),
            filing_year: Some("2024".to_string()),
            is_new: true,
            pages: Some(pages),
        }
    }

    #[test]
    fn facts_are_insert_if_absent() {
        let mut store = FactStore::open_in_memory().expect("store");
        let tx = store.transaction().expect("tx");
        register_parameter(&tx, "country").expect("param");
        upsert_report(&tx, &report("R1", 10)).expect("report");
        let first = Fact::new("R1", "country", Value::Text("Canada".into()));
        let second = Fact::new("R1", "country", Value::Text("Peru".into()));
        assert!(insert_fact(&tx, &first).expect("insert"));
        assert!(!insert_fact(&tx, &second).expect("insert"));
        tx.commit().expect("commit");

        let facts = store.facts().expect("facts");
        assert_eq!(facts, vec![first]);
        assert_eq!(store.is_flagged("R1", "country").expect("flag"), Some(false));
    }

    #[test]
    fn reports_are_replaced() {
        let mut store = FactStore::open_in_memory().expect("store");
        let tx = store.transaction().expect("tx");
        upsert_report(&tx, &report("R1", 10)).expect("report");
        register_parameter(&tx, "country").expect("param");
        insert_fact(&tx, &Fact::new("R1", "country", Value::Text("Chile".into()))).expect("fact");
        upsert_report(&tx, &report("R1", 42)).expect("report again");
        tx.commit().expect("commit");

        let stored = store.report("R1").expect("query").expect("present");
        assert_eq!(stored.pages, Some(42));
        assert_eq!(store.counts().expect("counts").facts, 1);
    }

    #[test]
    fn facts_require_known_report_and_parameter() {
        let mut store = FactStore::open_in_memory().expect("store");
        let tx = store.transaction().expect("tx");
        let orphan = Fact::new("R9", "unknown", Value::Integer(1));
        assert!(insert_fact(&tx, &orphan).is_err());
    }

    #[test]
    fn composite_values_are_stored_as_json_text() {
        let list = Value::from(json!(["Porphyry", "Skarn"]));
        assert_eq!(
            to_sql_value(&list),
            SqlValue::Text(r#"["Porphyry","Skarn"]"#.to_string())
        );
        assert_eq!(to_sql_value(&Value::Boolean(true)), SqlValue::Integer(1));
        assert_eq!(from_sql_value(ValueRef::Real(2.5)), Value::Float(2.5));
        assert_eq!(from_sql_value(ValueRef::Null), Value::Null);
    }

    #[test]
    fn persist_and_reload_round_trip() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("db").join("database.db");
        {
            let mut store = FactStore::load_into_memory(&path).expect("store");
            let tx = store.transaction().expect("tx");
            register_parameter(&tx, "life_of_mine").expect("param");
            upsert_report(&tx, &report("R1", 3)).expect("report");
            insert_fact(&tx, &Fact::new("R1", "life_of_mine", Value::Integer(12))).expect("fact");
            tx.commit().expect("commit");
            store.persist(&path).expect("persist");
        }
        let reopened = FactStore::open(&path).expect("reopen");
        assert_eq!(
            reopened.counts().expect("counts"),
            StoreCounts {
                parameters: 1,
                reports: 1,
                facts: 1
            }
        );
        assert_eq!(reopened.parameters().expect("params")[0].description, None);
    }
}
