// Ledger Load - Core Library
// Metadata-driven CSV → SQL loading plus checking/loan balance analysis

pub mod catalog;
pub mod metadata;
pub mod db;
pub mod materializer;
pub mod ingest;
pub mod report;
pub mod errors;
pub mod config;
pub mod entities;
pub mod queries;
pub mod analyzer;
pub mod pipeline;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogError, Column, Schema, Table};
pub use metadata::load_metadata;
pub use db::{Database, DbError, SqlRow, SqlValue, SqliteDatabase};
pub use materializer::create_tables;
pub use ingest::{
    reconcile_columns, ColumnReconciliation, DataIngester, IngestOptions, LoadStatus, TableLoad,
};
pub use report::{
    ConsoleReport, JsonLinesReport, MemoryReport, ReportEvent, ReportSink, Severity,
};
pub use errors::{PipelineError, PipelineResult};
pub use config::Config;
pub use entities::{
    AccountData, CheckingAccount, FinalBalance, LoanAccount, LoanConvention, Owner,
};
pub use queries::{fetch_checking_accounts, fetch_loan_accounts};
pub use analyzer::{
    analyze, compute_checking_totals, compute_loan_totals, report_analysis, total_asset_size,
    AssetReport, CheckingTotals, LoanTotals,
};
pub use pipeline::{open_database, run_analysis, run_load, LoadSummary};
