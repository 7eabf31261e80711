use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ledger_load::{
    open_database, run_analysis, run_load, Config, ConsoleReport, JsonLinesReport, ReportSink,
};

/// Load an INFORMATION_SCHEMA description and CSV data into SQLite, then
/// compute checking and loan balances
#[derive(Parser, Debug)]
#[command(name = "ledger-load")]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON configuration file (every key optional)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override the SQLite database file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Emit report events as JSON lines instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create schemas/tables from the metadata file and load every data file
    Load,
    /// Compute balances from the loaded accounts
    Analyze,
    /// Load, then analyze
    Run,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    let mut sink: Box<dyn ReportSink> = if cli.json {
        Box::new(JsonLinesReport::new(std::io::stdout()))
    } else {
        Box::new(ConsoleReport)
    };

    let mut db = open_database(&config)?;

    if matches!(cli.command, Command::Load | Command::Run) {
        if !cli.json {
            println!(
                "🗄️  Loading {} into {}",
                config.metadata_path().display(),
                config.database_path.display()
            );
        }
        let summary = run_load(&config, &mut db, &mut *sink)?;
        if !cli.json {
            println!(
                "✅ {}/{} tables loaded completely",
                summary.complete_tables(),
                summary.tables.len()
            );
        }
    }

    if matches!(cli.command, Command::Analyze | Command::Run) {
        if !cli.json {
            println!("\n⚖️  Analyzing balances in schema {}", config.default_schema);
        }
        run_analysis(&config, &mut db, &mut *sink)?;
    }

    Ok(())
}

fn build_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(db) = &cli.database {
        config.database_path = db.clone();
    }

    config.validate()?;
    Ok(config)
}
