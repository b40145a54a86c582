use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::frequency::FrequencyMode;

pub const DEFAULT_DB: &str = "db/database.db";
pub const DEFAULT_JSON_DIR: &str = "db/jsons/lhir_json";
pub const DEFAULT_REPORTS_DIR: &str = "reports";

#[derive(Debug, Parser)]
#[command(author, version, about = "Load mining report facts into SQLite and summarize them", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load a directory of extraction JSON documents into the fact store
    Ingest(IngestArgs),
    /// Write the wide table (one row per report) to a delimited file
    Export(ExportArgs),
    /// Preview the first few rows of the wide table
    Preview(PreviewArgs),
    /// Write per-column numeric, qualitative and null summaries to a report
    Summary(SummaryArgs),
    /// Produce frequency counts for categorical columns
    Frequency(FrequencyArgs),
    /// Write the mine type, deposit, commodity and cost analysis report
    Analyze(AnalyzeArgs),
    /// Write the open-pit report and its mining rate plots
    OpenPit(OpenPitArgs),
    /// Write the combination key of a multi-valued column for every report
    Combinations(CombinationsArgs),
}

/// Where commands read the wide table from.
#[derive(Debug, Args)]
pub struct TableSource {
    /// SQLite fact store to read
    #[arg(long, default_value = DEFAULT_DB)]
    pub db: PathBuf,
    /// Read a wide CSV checkpoint instead of the fact store
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,
    /// CSV delimiter character of the checkpoint (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the checkpoint (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Directory holding the `*.json` documents
    #[arg(long = "json-dir", default_value = DEFAULT_JSON_DIR)]
    pub json_dir: PathBuf,
    /// SQLite fact store to create or extend
    #[arg(long, default_value = DEFAULT_DB)]
    pub db: PathBuf,
    /// Build in memory and write the store file once at the end
    #[arg(long = "in-memory")]
    pub in_memory: bool,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// SQLite fact store to read
    #[arg(long, default_value = DEFAULT_DB)]
    pub db: PathBuf,
    /// Output file (`-` for stdout)
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Output delimiter (defaults from the file extension)
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub source: TableSource,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    /// Restrict the preview to these columns
    #[arg(short = 'C', long = "columns", value_delimiter = ',')]
    pub columns: Vec<String>,
    /// Cut cells wider than this many characters
    #[arg(long = "max-width")]
    pub max_width: Option<usize>,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub source: TableSource,
    /// Report file to write
    #[arg(short = 'o', long = "output", default_value = "reports/overall_summary.txt")]
    pub output: PathBuf,
    /// YAML file overriding the column lists and display settings
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum ModeArg {
    #[default]
    Plain,
    Combination,
    Exploded,
}

impl From<ModeArg> for FrequencyMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Plain => FrequencyMode::Plain,
            ModeArg::Combination => FrequencyMode::Combination,
            ModeArg::Exploded => FrequencyMode::Exploded,
        }
    }
}

#[derive(Debug, Args)]
pub struct FrequencyArgs {
    #[command(flatten)]
    pub source: TableSource,
    /// Columns to compute frequency counts for
    #[arg(short = 'C', long = "columns", required = true, value_delimiter = ',')]
    pub columns: Vec<String>,
    /// Count raw values, combination keys or atomic labels
    #[arg(long, value_enum, default_value = "plain")]
    pub mode: ModeArg,
    /// Maximum distinct values to display per column (0 = all)
    #[arg(long, default_value_t = 0)]
    pub top: usize,
    /// Count empty cells under an explicit null bucket
    #[arg(long = "include-null")]
    pub include_null: bool,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub source: TableSource,
    /// Report file to write
    #[arg(short = 'o', long = "output", default_value = "reports/analysis_report.txt")]
    pub output: PathBuf,
    /// YAML file overriding the column lists and display settings
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct OpenPitArgs {
    #[command(flatten)]
    pub source: TableSource,
    /// Directory receiving `openpit_report.txt` and the plots
    #[arg(long = "reports-dir", default_value = DEFAULT_REPORTS_DIR)]
    pub reports_dir: PathBuf,
    /// YAML file overriding the column lists and display settings
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CombinationsArgs {
    #[command(flatten)]
    pub source: TableSource,
    /// Multi-valued column to collapse
    #[arg(long, default_value = "processing_method")]
    pub column: String,
    /// Output file of `report_id<TAB>key` lines (`-` for stdout)
    #[arg(
        short = 'o',
        long = "output",
        default_value = "reports/processing/processing_method.txt"
    )]
    pub output: PathBuf,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
