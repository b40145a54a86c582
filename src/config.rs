//! Column lists and thresholds for the report commands.
//!
//! Every field has a default matching the established report layout, so a
//! YAML file only needs the keys it changes.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{reshape::REPORT_ID_COLUMN, table::RenderOptions};

const DEFAULT_NUMERIC_COLUMNS: &[&str] = &[
    "stripping_ratio",
    "open_pit_mining_cost_dollars_per_t_mined_or_moved",
    "total_operating_cost_dollars_per_t_milled",
    "initial_capex_in_millions",
    "life_of_mine",
    "processing_rate",
    "total_ore_mined",
    "total_waste_mined",
    "copper_price",
    "gold_price",
    "silver_price",
    "copper_cut_off_grade",
    "gold_cut_off_grade",
    "copper_metallurgical_recovery",
    "gold_metallurgical_recovery",
    "pre_tax_npv_8_in_millions",
    "after_tax_irr",
];

const DEFAULT_NULL_COLUMNS: &[&str] = &[
    REPORT_ID_COLUMN,
    "project_name",
    "property_name",
    "latitude",
    "longitude",
];

const DEFAULT_COMMODITIES: &[&str] = &["copper", "lead", "zinc", "iron", "gold", "silver", "sulphur"];

const DEFAULT_COST_COLUMNS: &[&str] = &[
    "open_pit_mining_cost_dollars_per_t_milled_or_processed",
    "open_pit_mining_cost_dollars_per_t_mined_or_moved",
];

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Forced to numbers before summarizing; unconvertible cells become null.
    pub numeric_columns: Vec<String>,
    /// Reported with total and null counts only.
    pub null_columns: Vec<String>,
    /// Multi-valued columns collapsed into combination keys.
    pub combination_columns: Vec<String>,
    pub mine_type_column: String,
    pub deposit_column: String,
    pub country_column: String,
    /// Checked through `produces_<commodity>` flag columns.
    pub commodities: Vec<String>,
    pub cost_columns: Vec<String>,
    pub currency_column: String,
    pub open_pit: OpenPitConfig,
    pub render: RenderOptions,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            numeric_columns: strings(DEFAULT_NUMERIC_COLUMNS),
            null_columns: strings(DEFAULT_NULL_COLUMNS),
            combination_columns: vec!["processing_method".to_string()],
            mine_type_column: "mine_type".to_string(),
            deposit_column: "deposit_type".to_string(),
            country_column: "country".to_string(),
            commodities: strings(DEFAULT_COMMODITIES),
            cost_columns: strings(DEFAULT_COST_COLUMNS),
            currency_column: "open_pit_mining_cost_currency".to_string(),
            open_pit: OpenPitConfig::default(),
            render: RenderOptions::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config file {path:?}"))
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).context("Parsing config YAML")
    }

    /// Loads `path` when given, otherwise the defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn produces_column(commodity: &str) -> String {
        format!("produces_{commodity}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenPitConfig {
    /// Case-insensitive substring of the mine type that selects a row.
    pub keyword: String,
    pub effective_date_column: String,
    pub total_material_column: String,
    pub life_of_mine_column: String,
    pub strip_ratio_column: String,
    pub cost_column: String,
    pub capex_column: String,
    /// Deposit types with fewer costed reports are left out of the hardness table.
    pub min_group_count: usize,
    pub histogram_bins: usize,
}

impl Default for OpenPitConfig {
    fn default() -> Self {
        Self {
            keyword: "open pit".to_string(),
            effective_date_column: "effective_date".to_string(),
            total_material_column: "total_material_mined".to_string(),
            life_of_mine_column: "life_of_mine".to_string(),
            strip_ratio_column: "stripping_ratio".to_string(),
            cost_column: "open_pit_mining_cost_dollars_per_t_mined_or_moved".to_string(),
            capex_column: "initial_capex_in_millions".to_string(),
            min_group_count: 10,
            histogram_bins: 50,
        }
    }
}
