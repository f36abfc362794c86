use clap::{Args, Parser, Subcommand};
use cot_qc::config::{self, AppConfig};
use cot_qc::error::AppError;
use cot_qc::pipeline::{checks::builtin, Orchestrator, RunSummary};
use cot_qc::telemetry;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "cot-qc",
    about = "Reconcile an account roster against per-portfolio chain-of-title history",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the reconciliation over every portfolio folder (default command)
    Run(RunArgs),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Directory containing one subdirectory per portfolio
    #[arg(long)]
    root: Option<PathBuf>,
    /// Account roster CSV
    #[arg(long)]
    roster: Option<PathBuf>,
    /// Directory receiving flag files, the master file, and the error log
    #[arg(long)]
    output: Option<PathBuf>,
    /// Roster column holding the numeric portfolio identifier
    #[arg(long)]
    portfolio_column: Option<String>,
    /// Substring a history filename must contain (case-sensitive)
    #[arg(long)]
    marker: Option<String>,
    /// Literal text treated as a missing value in source files
    #[arg(long)]
    sentinel: Option<String>,
    /// Column joining flag rows back to roster rows
    #[arg(long)]
    account_key: Option<String>,
    /// Comma-separated roster columns copied onto flag rows
    #[arg(long)]
    lookup_columns: Option<String>,
}

fn main() {
    if let Err(err) = run_cli() {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or_else(|| Command::Run(RunArgs::default()));

    match command {
        Command::Run(args) => run_reconciliation(args),
    }
}

fn run_reconciliation(mut args: RunArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(root) = args.root.take() {
        config.qc.root_dir = root;
    }
    if let Some(roster) = args.roster.take() {
        config.qc.roster_path = roster;
    }
    if let Some(output) = args.output.take() {
        config.qc.output_dir = output;
    }
    if let Some(column) = args.portfolio_column.take() {
        config.qc.portfolio_column = column;
    }
    if let Some(marker) = args.marker.take() {
        config.qc.history_marker = marker;
    }
    if let Some(sentinel) = args.sentinel.take() {
        config.qc.null_sentinel = sentinel;
    }
    if let Some(account_key) = args.account_key.take() {
        config.qc.account_key_column = account_key;
    }
    if let Some(raw) = args.lookup_columns.take() {
        config.qc.lookup_columns = config::parse_column_list(&raw);
    }

    telemetry::init(&config.telemetry)?;

    let checks = builtin::default_checks(&config.qc.account_key_column);
    let orchestrator = Orchestrator::new(config.qc, checks);
    let summary = orchestrator.run()?;

    render_summary(&summary);
    Ok(())
}

fn render_summary(summary: &RunSummary) {
    println!("Chain-of-title QC run");

    if summary.written.is_empty() {
        println!("\nPortfolios written: none");
    } else {
        println!("\nPortfolios written");
        for written in &summary.written {
            println!(
                "- {} ({}): {} flag rows -> {}",
                written.portfolio_id,
                written.folder,
                written.rows,
                written.output_path.display()
            );
        }
    }

    if !summary.skipped.is_empty() {
        println!("\nPortfolios skipped");
        for skipped in &summary.skipped {
            println!(
                "- {} ({}): {}",
                skipped.portfolio_id,
                skipped.folder,
                skipped.reason.describe()
            );
        }
    }

    if summary.errors.is_empty() {
        println!("\nPortfolio errors: none");
    } else {
        println!("\nPortfolio errors");
        for failure in &summary.errors {
            println!("- {} ({}): {}", failure.portfolio_id, failure.folder, failure.message);
        }
    }

    if let Some(path) = &summary.master_path {
        println!("\nMaster file: {}", path.display());
    }
    if let Some(path) = &summary.error_log_path {
        println!("Error log: {}", path.display());
    }
}
