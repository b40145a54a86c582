pub mod analysis;
pub mod atomize;
pub mod caster;
pub mod cli;
pub mod config;
pub mod data;
pub mod export;
pub mod frequency;
pub mod ingest;
pub mod io_utils;
pub mod open_pit;
pub mod plot;
pub mod preview;
pub mod reshape;
pub mod schema;
pub mod stats;
pub mod store;
pub mod summary;
pub mod table;

use std::{env, io::Write, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    atomize::{atomize_column, collapse_column},
    cli::{Cli, Commands, TableSource},
    config::AnalysisConfig,
    frequency::{FrequencyOptions, FrequencyTable, compute_frequency},
    reshape::WideTable,
    store::FactStore,
    summary::SummaryPlan,
};

static LOGGER: OnceLock<()> = OnceLock::new();

const SUMMARY_TITLE: &str = "      Overall Summary Report     ";
const OPEN_PIT_REPORT_FILE: &str = "openpit_report.txt";

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("mining_facts", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Ingest(args) => handle_ingest(&args),
        Commands::Export(args) => handle_export(&args),
        Commands::Preview(args) => preview::execute(&args),
        Commands::Summary(args) => handle_summary(&args),
        Commands::Frequency(args) => handle_frequency(&args),
        Commands::Analyze(args) => handle_analyze(&args),
        Commands::OpenPit(args) => handle_open_pit(&args),
        Commands::Combinations(args) => handle_combinations(&args),
    }
}

/// Reads the fact store and pivots it into a normalized wide table.
pub fn load_store_table(store: &FactStore) -> Result<WideTable> {
    let facts = store.facts()?;
    debug!("Pivoting {} fact(s)", facts.len());
    let mut table = WideTable::pivot(facts).context("Pivoting facts")?;
    table.normalize();
    Ok(table)
}

/// Loads the wide table from the checkpoint when one is given, otherwise
/// from the fact store.
pub fn load_table(source: &TableSource) -> Result<WideTable> {
    let table = match &source.input {
        Some(input) => {
            let delimiter = io_utils::resolve_delimiter(input, source.delimiter);
            let encoding = io_utils::resolve_encoding(source.input_encoding.as_deref())?;
            let mut table = export::read_wide_csv(input, delimiter, encoding)?;
            table.normalize();
            table
        }
        None => {
            if !source.db.exists() {
                bail!("Fact store {:?} not found; run `ingest` first", source.db);
            }
            let store = FactStore::open(&source.db)?;
            load_store_table(&store)?
        }
    };
    info!(
        "Loaded {} report(s) across {} parameter(s)",
        table.row_count(),
        table.columns().len()
    );
    Ok(table)
}

fn handle_ingest(args: &cli::IngestArgs) -> Result<()> {
    info!(
        "Ingesting documents from {:?} into {:?}",
        args.json_dir, args.db
    );
    let summary = if args.in_memory {
        let mut store = FactStore::load_into_memory(&args.db)?;
        let summary = ingest::ingest_directory(&mut store, &args.json_dir)?;
        store.persist(&args.db)?;
        summary
    } else {
        let mut store = FactStore::open(&args.db)?;
        ingest::ingest_directory(&mut store, &args.json_dir)?
    };
    if summary.skipped_documents > 0 {
        warn!("Skipped {} unreadable document(s)", summary.skipped_documents);
    }
    info!(
        "Ingested {} document(s): {} new parameter(s), {} new fact(s), {} fact(s) already present",
        summary.documents, summary.new_parameters, summary.new_facts, summary.kept_facts
    );
    Ok(())
}

fn handle_export(args: &cli::ExportArgs) -> Result<()> {
    let table = load_table(&TableSource {
        db: args.db.clone(),
        input: None,
        delimiter: None,
        input_encoding: None,
    })?;
    let delimiter = io_utils::resolve_delimiter(&args.output, args.delimiter);
    export::write_wide_csv(&table, &args.output, delimiter)
        .with_context(|| format!("Exporting table to {:?}", args.output))?;
    Ok(())
}

fn handle_summary(args: &cli::SummaryArgs) -> Result<()> {
    let config = AnalysisConfig::resolve(args.config.as_deref())?;
    let mut table = load_table(&args.source)?;
    for column in &config.combination_columns {
        if collapse_column(&mut table, column) {
            debug!("Collapsed '{column}' into combination keys");
        }
    }
    let plan = SummaryPlan {
        numeric: config.numeric_columns.clone(),
        null_only: config.null_columns.clone(),
        include_remaining: true,
    };
    summary::coerce_planned_numeric(&mut table, &plan);
    let reports = summary::build_reports(&table, &plan);
    let mut writer = io_utils::create_output_file(&args.output)?;
    let outcome = summary::write_report(&mut writer, SUMMARY_TITLE, &reports, &config.render)
        .with_context(|| format!("Writing summary report {:?}", args.output))?;
    info!(
        "Summary written to {:?}: {} column(s), {} not found, {} skipped",
        args.output, outcome.written, outcome.missing, outcome.failed
    );
    Ok(())
}

fn handle_frequency(args: &cli::FrequencyArgs) -> Result<()> {
    let wide = load_table(&args.source)?;
    let options = FrequencyOptions {
        mode: args.mode.into(),
        include_null: args.include_null,
        top: args.top,
    };
    let mut found = 0usize;
    for column in &args.columns {
        let Some(frequency) = compute_frequency(&wide, column, &options) else {
            println!("Column '{column}' not found in table");
            println!();
            warn!("Skipping frequency for missing column '{column}'");
            continue;
        };
        found += 1;
        println!("Column: {column}");
        table::print_table(
            &FrequencyTable::headers(),
            &frequency.render_rows(),
            &table::RenderOptions::default(),
        );
        println!();
    }
    if found == 0 {
        bail!("None of the requested columns were found in table");
    }
    Ok(())
}

fn handle_analyze(args: &cli::AnalyzeArgs) -> Result<()> {
    let config = AnalysisConfig::resolve(args.config.as_deref())?;
    let table = load_table(&args.source)?;
    if table.is_empty() {
        warn!("Wide table is empty; no analysis to perform");
        return Ok(());
    }
    let report = analysis::analysis_report(&table, &config);
    write_text(&args.output, &report)?;
    info!("Analysis report written to {:?}", args.output);
    Ok(())
}

fn handle_open_pit(args: &cli::OpenPitArgs) -> Result<()> {
    let config = AnalysisConfig::resolve(args.config.as_deref())?;
    let table = load_table(&args.source)?;
    if table.is_empty() {
        warn!("Wide table is empty; no analysis to perform");
        return Ok(());
    }
    let Some(report) = open_pit::open_pit_report(&table, &config, &args.reports_dir)? else {
        warn!("No open pit reports found; no report generated");
        return Ok(());
    };
    let path = args.reports_dir.join(OPEN_PIT_REPORT_FILE);
    write_text(&path, &report.text)?;
    info!(
        "Open pit report for {} studies written to {:?} with {} plot(s)",
        report.studies,
        path,
        report.plots.len()
    );
    Ok(())
}

fn handle_combinations(args: &cli::CombinationsArgs) -> Result<()> {
    let table = load_table(&args.source)?;
    let atomized = atomize_column(&table, &args.column)
        .with_context(|| format!("Column '{}' not found in table", args.column))?;
    let mut lines = String::new();
    for (row, key) in table.rows().iter().zip(&atomized.combinations) {
        lines.push_str(&format!("{}\t{key}\n", row.report_id));
    }
    if io_utils::is_dash(&args.output) {
        print!("{lines}");
    } else {
        write_text(&args.output, &lines)?;
    }
    info!(
        "Wrote {} combination key(s) for '{}'",
        atomized.combinations.len(),
        args.column
    );
    Ok(())
}

fn write_text(path: &std::path::Path, text: &str) -> Result<()> {
    let mut writer = io_utils::create_output_file(path)?;
    writer
        .write_all(text.as_bytes())
        .with_context(|| format!("Writing {path:?}"))?;
    writer.flush().with_context(|| format!("Flushing {path:?}"))
}
