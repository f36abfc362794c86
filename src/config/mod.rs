use std::env;
use std::fmt;
use std::path::PathBuf;

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub qc: QcConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let log_level = env::var("COT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            qc: QcConfig::from_env()?,
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// Settings driving one reconciliation run: where the inputs live,
/// where outputs go, and the column/marker names that tie the roster to
/// the per-portfolio history files.
#[derive(Debug, Clone)]
pub struct QcConfig {
    /// Directory containing one subdirectory per portfolio.
    pub root_dir: PathBuf,
    /// The global account roster CSV.
    pub roster_path: PathBuf,
    /// Directory receiving per-portfolio, master, and error files.
    pub output_dir: PathBuf,
    /// Roster column holding the numeric portfolio identifier.
    pub portfolio_column: String,
    /// Substring a history filename must contain (case-sensitive).
    pub history_marker: String,
    /// Literal text standing in for a missing value in source files.
    pub null_sentinel: String,
    /// Column joining flag rows back to roster rows.
    pub account_key_column: String,
    /// Roster columns copied onto flag rows during enrichment.
    pub lookup_columns: Vec<String>,
}

impl QcConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let lookup_columns = env::var("COT_LOOKUP_COLUMNS")
            .map(|raw| parse_column_list(&raw))
            .unwrap_or_default();

        Ok(Self {
            root_dir: env::var("COT_ROOT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./portfolios")),
            roster_path: env::var("COT_ROSTER_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./AccountList.csv")),
            output_dir: env::var("COT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./qc_output")),
            portfolio_column: non_empty_var("COT_PORTFOLIO_COLUMN", "PortfolioNo")?,
            history_marker: non_empty_var("COT_HISTORY_MARKER", "COT Data")?,
            null_sentinel: non_empty_var("COT_NULL_SENTINEL", "(null)")?,
            account_key_column: non_empty_var("COT_ACCOUNT_KEY_COLUMN", "AccountNo")?,
            lookup_columns,
        })
    }
}

fn non_empty_var(name: &'static str, default: &str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Err(ConfigError::EmptyVar { name }),
        Ok(value) => Ok(value),
        Err(_) => Ok(default.to_string()),
    }
}

/// Parse a comma-separated column list, dropping blanks.
pub fn parse_column_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|column| !column.is_empty())
        .map(str::to_string)
        .collect()
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    EmptyVar { name: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyVar { name } => {
                write!(f, "{name} is set but empty; unset it to use the default")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
