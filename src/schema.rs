//! SQL schema for the fact store.
//!
//! Applied on every open; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
//! Table and column names match the databases produced by earlier loaders so
//! existing files can be opened in place.

/// Connection-level settings. Applied after any restore into memory.
pub const PRAGMAS: &str = "
PRAGMA foreign_keys = ON;
";

pub const SCHEMA: &str = "
-- Curation columns are reserved for manual review and never written by ingestion.
CREATE TABLE IF NOT EXISTS parameters (
    parameter_id    TEXT PRIMARY KEY,
    parameter_desc  TEXT,
    conf_upper      REAL,
    conf_lower      REAL,
    prob_correct    REAL,
    samples_checked INTEGER
);

CREATE TABLE IF NOT EXISTS reports (
    report_id   TEXT PRIMARY KEY,
    report_type TEXT,
    sedar_year  TEXT,
    is_new      BOOLEAN,
    pages       INTEGER
);

-- Long-format facts; composite values are JSON text.
CREATE TABLE IF NOT EXISTS main (
    report_id    TEXT,
    parameter_id TEXT,
    value        BLOB,
    flagged      BOOLEAN,
    PRIMARY KEY (report_id, parameter_id),
    FOREIGN KEY (report_id) REFERENCES reports(report_id),
    FOREIGN KEY (parameter_id) REFERENCES parameters(parameter_id)
);
";
