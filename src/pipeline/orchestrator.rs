use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info};

use crate::config::QcConfig;
use crate::pipeline::checks::{self, EnrichmentSpec, QcCheck};
use crate::pipeline::discovery::{self, PortfolioUnit};
use crate::pipeline::loader;
use crate::pipeline::normalize::{self, NormalizeSpec};
use crate::table::{Cell, Table, TableError};

const MASTER_FILE: &str = "COT_QC_Flags_ALL.csv";
const ERROR_FILE: &str = "COT_QC_Errors.csv";

/// Fatal, run-aborting failures. Anything that goes wrong for a single
/// portfolio is captured as a [`PortfolioFailure`] instead and never
/// surfaces here.
#[derive(Debug)]
pub enum RunError {
    RosterLoad { path: PathBuf, source: TableError },
    MissingPortfolioColumn { column: String, available: Vec<String> },
    Discovery { root: PathBuf, source: io::Error },
    OutputDir { path: PathBuf, source: io::Error },
    MasterWrite { path: PathBuf, source: io::Error },
    ErrorLogWrite { path: PathBuf, source: io::Error },
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::RosterLoad { path, source } => {
                write!(f, "failed to load roster {}: {source}", path.display())
            }
            RunError::MissingPortfolioColumn { column, available } => write!(
                f,
                "portfolio column '{column}' not found in roster; available columns: {}",
                available.join(", ")
            ),
            RunError::Discovery { root, source } => {
                write!(f, "failed to list portfolio folders under {}: {source}", root.display())
            }
            RunError::OutputDir { path, source } => {
                write!(f, "failed to create output directory {}: {source}", path.display())
            }
            RunError::MasterWrite { path, source } => {
                write!(f, "failed to write master file {}: {source}", path.display())
            }
            RunError::ErrorLogWrite { path, source } => {
                write!(f, "failed to write error log {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::RosterLoad { source, .. } => Some(source),
            RunError::MissingPortfolioColumn { .. } => None,
            RunError::Discovery { source, .. }
            | RunError::OutputDir { source, .. }
            | RunError::MasterWrite { source, .. }
            | RunError::ErrorLogWrite { source, .. } => Some(source),
        }
    }
}

/// Why a portfolio produced no RunResult at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyRoster,
    NoHistoryFiles,
}

impl SkipReason {
    pub fn describe(self) -> &'static str {
        match self {
            SkipReason::EmptyRoster => "no roster accounts for portfolio",
            SkipReason::NoHistoryFiles => "no marker-matching history files",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkippedPortfolio {
    pub portfolio_id: i64,
    pub folder: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct WrittenPortfolio {
    pub portfolio_id: i64,
    pub folder: String,
    pub rows: usize,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PortfolioFailure {
    pub portfolio_id: i64,
    pub folder: String,
    pub message: String,
}

/// Audit trail of one run: every discovered portfolio with a parsable
/// identifier lands in exactly one of the three buckets.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub written: Vec<WrittenPortfolio>,
    pub skipped: Vec<SkippedPortfolio>,
    pub errors: Vec<PortfolioFailure>,
    pub master_path: Option<PathBuf>,
    pub error_log_path: Option<PathBuf>,
}

/// Drives discovery, loading, normalization, checking, and output for
/// every portfolio under the configured root. Constructed from explicit
/// configuration plus an injected, ordered check list; holds no global
/// state.
pub struct Orchestrator {
    config: QcConfig,
    checks: Vec<QcCheck>,
    normalize: NormalizeSpec,
}

impl Orchestrator {
    pub fn new(config: QcConfig, checks: Vec<QcCheck>) -> Self {
        let normalize = NormalizeSpec::with_sentinel(&config.null_sentinel);
        Self {
            config,
            checks,
            normalize,
        }
    }

    /// Override the default normalization spec (date/int coercion maps).
    pub fn with_normalize_spec(mut self, spec: NormalizeSpec) -> Self {
        self.normalize = spec;
        self
    }

    /// Process every discovered portfolio to completion, one at a time.
    /// A failure inside one portfolio is recorded and the run moves on;
    /// only setup problems abort.
    pub fn run(&self) -> Result<RunSummary, RunError> {
        std::fs::create_dir_all(&self.config.output_dir).map_err(|source| {
            RunError::OutputDir {
                path: self.config.output_dir.clone(),
                source,
            }
        })?;

        let roster =
            Table::from_csv_path(&self.config.roster_path).map_err(|source| {
                RunError::RosterLoad {
                    path: self.config.roster_path.clone(),
                    source,
                }
            })?;

        // A missing portfolio column breaks every portfolio identically,
        // so it is validated once, up front, as a setup failure.
        if !roster.has_column(&self.config.portfolio_column) {
            return Err(RunError::MissingPortfolioColumn {
                column: self.config.portfolio_column.clone(),
                available: roster.columns().to_vec(),
            });
        }

        let units = discovery::discover_units(&self.config.root_dir).map_err(|source| {
            RunError::Discovery {
                root: self.config.root_dir.clone(),
                source,
            }
        })?;
        info!(portfolios = units.len(), "discovered portfolio folders");

        let mut summary = RunSummary::default();
        let mut master_parts: Vec<Table> = Vec::new();

        for unit in &units {
            match self.process_unit(&roster, unit) {
                Ok(UnitOutcome::Skipped(reason)) => {
                    info!(
                        portfolio = unit.portfolio_id,
                        folder = %unit.name,
                        "skipped: {}",
                        reason.describe()
                    );
                    summary.skipped.push(SkippedPortfolio {
                        portfolio_id: unit.portfolio_id,
                        folder: unit.name.clone(),
                        reason,
                    });
                }
                Ok(UnitOutcome::Written { flags, output_path }) => {
                    info!(
                        portfolio = unit.portfolio_id,
                        folder = %unit.name,
                        rows = flags.row_count(),
                        output = %output_path.display(),
                        "portfolio done"
                    );
                    master_parts.push(tag_for_master(&flags, unit));
                    summary.written.push(WrittenPortfolio {
                        portfolio_id: unit.portfolio_id,
                        folder: unit.name.clone(),
                        rows: flags.row_count(),
                        output_path,
                    });
                }
                Err(failure) => {
                    let message = failure.to_string();
                    error!(
                        portfolio = unit.portfolio_id,
                        folder = %unit.name,
                        "portfolio failed: {message}"
                    );
                    summary.errors.push(PortfolioFailure {
                        portfolio_id: unit.portfolio_id,
                        folder: unit.path.display().to_string(),
                        message,
                    });
                }
            }
        }

        if !master_parts.is_empty() {
            let master = Table::concat(&master_parts);
            let path = self.config.output_dir.join(MASTER_FILE);
            write_table(&master, &path)
                .map_err(|source| RunError::MasterWrite { path: path.clone(), source })?;
            info!(rows = master.row_count(), path = %path.display(), "wrote master file");
            summary.master_path = Some(path);
        }

        if !summary.errors.is_empty() {
            let path = self.config.output_dir.join(ERROR_FILE);
            write_error_log(&summary.errors, &path)
                .map_err(|source| RunError::ErrorLogWrite { path: path.clone(), source })?;
            info!(count = summary.errors.len(), path = %path.display(), "wrote error log");
            summary.error_log_path = Some(path);
        }

        Ok(summary)
    }

    /// One portfolio through the whole pipeline. Returns a skip, a
    /// written result, or the failure that stopped it; the output file
    /// appears only after every stage has succeeded.
    fn process_unit(&self, roster: &Table, unit: &PortfolioUnit) -> Result<UnitOutcome, UnitError> {
        let subset = loader::filter_roster(roster, &self.config.portfolio_column, unit.portfolio_id);
        if subset.is_empty() {
            return Ok(UnitOutcome::Skipped(SkipReason::EmptyRoster));
        }

        let history = loader::load_history(&unit.path, &self.config.history_marker)
            .map_err(UnitError::HistoryLoad)?;
        if history.is_empty() {
            return Ok(UnitOutcome::Skipped(SkipReason::NoHistoryFiles));
        }

        let (subset, history) = normalize::normalize_pair(&subset, &history, &self.normalize);

        let enrichment = EnrichmentSpec {
            account_key: self.config.account_key_column.clone(),
            lookup_columns: self.config.lookup_columns.clone(),
        };
        let flags = checks::run_checks(&self.checks, &subset, &history, &enrichment)
            .map_err(UnitError::Checks)?;

        let output_path = self
            .config
            .output_dir
            .join(format!("COT_QC_Flags_{}.csv", unit.portfolio_id));
        let bytes = flags.to_csv_bytes().map_err(UnitError::Render)?;
        std::fs::write(&output_path, bytes).map_err(UnitError::Write)?;

        Ok(UnitOutcome::Written { flags, output_path })
    }
}

enum UnitOutcome {
    Skipped(SkipReason),
    Written { flags: Table, output_path: PathBuf },
}

#[derive(Debug)]
enum UnitError {
    HistoryLoad(TableError),
    Checks(TableError),
    Render(TableError),
    Write(io::Error),
}

impl fmt::Display for UnitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitError::HistoryLoad(err) => write!(f, "loading history files: {err}"),
            UnitError::Checks(err) => write!(f, "running checks: {err}"),
            UnitError::Render(err) => write!(f, "rendering flags: {err}"),
            UnitError::Write(err) => write!(f, "writing flags file: {err}"),
        }
    }
}

fn tag_for_master(flags: &Table, unit: &PortfolioUnit) -> Table {
    flags
        .with_constant_column("PortfolioNo", Cell::Int(unit.portfolio_id))
        .with_constant_column("PortfolioFolder", Cell::Text(unit.path.display().to_string()))
}

fn write_table(table: &Table, path: &Path) -> Result<(), io::Error> {
    let bytes = table
        .to_csv_bytes()
        .map_err(|err| io::Error::other(err.to_string()))?;
    std::fs::write(path, bytes)
}

#[derive(Serialize)]
struct ErrorRow<'a> {
    #[serde(rename = "PortfolioNo")]
    portfolio_no: i64,
    #[serde(rename = "Folder")]
    folder: &'a str,
    #[serde(rename = "Error")]
    error: &'a str,
}

fn write_error_log(errors: &[PortfolioFailure], path: &Path) -> Result<(), io::Error> {
    let mut buffer = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buffer);
        for failure in errors {
            writer
                .serialize(ErrorRow {
                    portfolio_no: failure.portfolio_id,
                    folder: &failure.folder,
                    error: &failure.message,
                })
                .map_err(|err| io::Error::other(err.to_string()))?;
        }
        writer.flush()?;
    }
    std::fs::write(path, buffer)
}
