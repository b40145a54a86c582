//! Loading of extraction JSON documents into the fact store.
//!
//! Each document carries a `metadata` object describing the source filing and
//! a `faf` object whose categories hold `final_values` maps of parameter name
//! to value. A document is written in one transaction: its parameters first,
//! then its report, then its facts, so every fact references rows that exist.

use std::{
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Deserialize;

use crate::{
    data::Value,
    reshape::Fact,
    store::{self, FactStore, REPORT_TYPE, Report},
};

const NEW_ERA_MARKER: &str = "new";

#[derive(Debug, Default, Deserialize)]
pub struct SourceDocument {
    #[serde(default)]
    pub metadata: Option<DocumentMetadata>,
    #[serde(default)]
    pub faf: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub pdf_filename: Option<String>,
    #[serde(default)]
    pub sedar_year: Option<serde_json::Value>,
    #[serde(default, rename = "43_101_era")]
    pub era: Option<serde_json::Value>,
    #[serde(default)]
    pub final_page_index: Option<serde_json::Value>,
}

impl SourceDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening document {path:?}"))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing document {path:?}"))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Parsing document")
    }

    /// Report id from `pdf_filename` without its extension, falling back to
    /// the document's own file stem.
    pub fn report_id(&self, source: &Path) -> String {
        let from_metadata = self
            .metadata
            .as_ref()
            .and_then(|m| m.pdf_filename.as_deref())
            .map(strip_extension)
            .filter(|id| !id.is_empty());
        match from_metadata {
            Some(id) => id,
            None => source
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    pub fn report(&self, source: &Path) -> Report {
        let metadata = self.metadata.clone().unwrap_or_default();
        Report {
            report_id: self.report_id(source),
            report_type: REPORT_TYPE.to_string(),
            filing_year: metadata.sedar_year.as_ref().and_then(scalar_text),
            is_new: metadata
                .era
                .as_ref()
                .and_then(serde_json::Value::as_str)
                .is_some_and(|era| era == NEW_ERA_MARKER),
            pages: metadata.final_page_index.as_ref().and_then(scalar_integer),
        }
    }

    /// Parameter/value pairs in document order. Categories without an object
    /// `final_values` are skipped.
    pub fn final_values(&self) -> Vec<(String, Value)> {
        let Some(faf) = &self.faf else {
            return Vec::new();
        };
        faf.values()
            .filter_map(|category| category.get("final_values")?.as_object())
            .flat_map(|values| {
                values
                    .iter()
                    .map(|(name, value)| (name.clone(), Value::from(value.clone())))
            })
            .collect()
    }

    pub fn facts(&self, source: &Path) -> Vec<Fact> {
        let report_id = self.report_id(source);
        self.final_values()
            .into_iter()
            .map(|(parameter, value)| Fact::new(report_id.clone(), parameter, value))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub documents: usize,
    pub skipped_documents: usize,
    pub new_parameters: usize,
    pub new_facts: usize,
    pub kept_facts: usize,
}

/// Writes one document. Facts already present for the same pair are kept.
pub fn ingest_document(
    store: &mut FactStore,
    document: &SourceDocument,
    source: &Path,
) -> Result<IngestSummary> {
    let report = document.report(source);
    let facts = document.facts(source);
    let mut summary = IngestSummary {
        documents: 1,
        ..IngestSummary::default()
    };

    let tx = store.transaction()?;
    for fact in &facts {
        if store::register_parameter(&tx, &fact.parameter_id)? {
            summary.new_parameters += 1;
        }
    }
    store::upsert_report(&tx, &report)?;
    for fact in &facts {
        if store::insert_fact(&tx, fact)? {
            summary.new_facts += 1;
        } else {
            summary.kept_facts += 1;
        }
    }
    tx.commit()
        .with_context(|| format!("Committing report '{}'", report.report_id))?;
    debug!(
        "Report '{}': {} new fact(s), {} kept",
        report.report_id, summary.new_facts, summary.kept_facts
    );
    Ok(summary)
}

/// Ingests every `*.json` file of `dir` in file-name order. Unreadable
/// documents are logged and skipped.
pub fn ingest_directory(store: &mut FactStore, dir: &Path) -> Result<IngestSummary> {
    let files = list_documents(dir)?;
    info!("Found {} document(s) in {:?}", files.len(), dir);
    let mut total = IngestSummary::default();
    for path in files {
        let document = match SourceDocument::load(&path) {
            Ok(document) => document,
            Err(err) => {
                warn!("Skipping {:?}: {err:#}", path);
                total.skipped_documents += 1;
                continue;
            }
        };
        let summary = ingest_document(store, &document, &path)?;
        total.documents += summary.documents;
        total.new_parameters += summary.new_parameters;
        total.new_facts += summary.new_facts;
        total.kept_facts += summary.kept_facts;
    }
    Ok(total)
}

pub fn list_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("Listing document directory {dir:?}"))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.with_context(|| format!("Reading entry of {dir:?}"))?.path();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if path.is_file() && is_json {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn strip_extension(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

fn scalar_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn scalar_integer(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "metadata": {
            "pdf_filename": "2024-000052252 Silver Mountain-f1.pdf",
            "sedar_year": 2024,
            "43_101_era": "new",
            "final_page_index": 212
        },
        "faf": {
            "location": {"final_values": {"country": "Peru", "latitude": -12.5}},
            "geology": {"final_values": {"deposit_type": ["Epithermal (low sulphidation)", "Skarn"]}},
            "notes": {"summary": "no values here"},
            "broken": {"final_values": ["not", "a", "map"]}
        }
    }"#;

    #[test]
    fn report_metadata_is_extracted() {
        let document = SourceDocument::from_json_str(DOCUMENT).expect("parse");
        let report = document.report(Path::new("ignored.json"));
        assert_eq!(report.report_id, "2024-000052252 Silver Mountain-f1");
        assert_eq!(report.report_type, REPORT_TYPE);
        assert_eq!(report.filing_year.as_deref(), Some("2024"));
        assert!(report.is_new);
        assert_eq!(report.pages, Some(212));
    }

    #[test]
    fn final_values_skip_categories_without_maps() {
        let document = SourceDocument::from_json_str(DOCUMENT).expect("parse");
        let names: Vec<String> = document.final_values().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["country", "latitude", "deposit_type"]);
    }

    #[test]
    fn missing_metadata_falls_back_to_file_stem() {
        let document = SourceDocument::from_json_str(r#"{"faf": null}"#).expect("parse");
        let report = document.report(Path::new("/data/report-7.json"));
        assert_eq!(report.report_id, "report-7");
        assert!(!report.is_new);
        assert_eq!(report.pages, None);
        assert!(document.final_values().is_empty());
    }

    #[test]
    fn ingesting_twice_keeps_existing_facts() {
        let mut store = FactStore::open_in_memory().expect("store");
        let document = SourceDocument::from_json_str(DOCUMENT).expect("parse");
        let source = Path::new("doc.json");

        let first = ingest_document(&mut store, &document, source).expect("ingest");
        assert_eq!(first.new_parameters, 3);
        assert_eq!(first.new_facts, 3);

        let second = ingest_document(&mut store, &document, source).expect("ingest again");
        assert_eq!(second.new_parameters, 0);
        assert_eq!(second.new_facts, 0);
        assert_eq!(second.kept_facts, 3);
        assert_eq!(store.counts().expect("counts").facts, 3);
    }
}
