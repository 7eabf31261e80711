// 🔁 Pipeline - metadata → DDL → ingest, and accounts → balances
//
// Strictly sequential. Fatal errors stop the run; everything else reaches
// the caller as report events.

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;
use std::fs;

use crate::analyzer::{analyze, report_analysis, AssetReport};
use crate::catalog::Catalog;
use crate::config::Config;
use crate::db::{Database, SqliteDatabase};
use crate::errors::PipelineResult;
use crate::ingest::{DataIngester, TableLoad};
use crate::materializer::create_tables;
use crate::metadata::load_metadata;
use crate::queries::{fetch_checking_accounts, fetch_loan_accounts};
use crate::report::ReportSink;

#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub catalog: Catalog,
    pub tables: Vec<TableLoad>,
}

impl LoadSummary {
    pub fn complete_tables(&self) -> usize {
        self.tables.iter().filter(|t| t.is_complete()).count()
    }
}

/// Open the configured SQLite database, creating its directories
pub fn open_database(config: &Config) -> Result<SqliteDatabase> {
    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let schema_dir = config.schema_dir();
    fs::create_dir_all(&schema_dir)
        .with_context(|| format!("Failed to create {}", schema_dir.display()))?;

    SqliteDatabase::open(&config.database_path, &schema_dir).with_context(|| {
        format!("Failed to open database {}", config.database_path.display())
    })
}

/// Phase 1: build the catalog, create its tables, load every data file
pub fn run_load<D, R>(config: &Config, db: &mut D, sink: &mut R) -> PipelineResult<LoadSummary>
where
    D: Database + ?Sized,
    R: ReportSink + ?Sized,
{
    let catalog = load_metadata(&config.metadata_path(), config.delimiter_byte())?;

    create_tables(&catalog, db)?;

    let ingester = DataIngester::new(&config.data_dir, config.ingest_options());
    let tables = ingester.ingest(&catalog, db, sink)?;

    let summary = LoadSummary { catalog, tables };
    info!(
        "load finished: {}/{} table(s) complete",
        summary.complete_tables(),
        summary.tables.len()
    );

    Ok(summary)
}

/// Phase 2: read accounts from the default schema and report balances
pub fn run_analysis<D, R>(config: &Config, db: &mut D, sink: &mut R) -> Result<AssetReport>
where
    D: Database + ?Sized,
    R: ReportSink + ?Sized,
{
    let checking = fetch_checking_accounts(db, &config.default_schema)?;
    let loans = fetch_loan_accounts(db, &config.default_schema, config.loan_convention)?;
    info!(
        "analyzing {} checking account(s), {} loan(s)",
        checking.len(),
        loans.len()
    );

    let report = analyze(&checking, &loans);
    report_analysis(&report, sink);

    Ok(report)
}
