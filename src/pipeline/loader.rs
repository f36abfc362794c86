use std::path::Path;

use crate::table::{Cell, Table, TableError};

/// Extensions accepted for chain-of-title exports. Matched without
/// regard to case, so `Data.CSV` loads like `data.csv`.
const HISTORY_EXTENSIONS: &[&str] = &["csv"];

/// Rows of the global roster whose portfolio column equals
/// `portfolio_id`. The roster itself is left untouched; the caller is
/// expected to have validated that `portfolio_column` exists.
pub fn filter_roster(roster: &Table, portfolio_column: &str, portfolio_id: i64) -> Table {
    roster.filter(|row| match row.cell(portfolio_column) {
        Some(Cell::Int(value)) => *value == portfolio_id,
        Some(Cell::Text(value)) => value
            .trim()
            .parse::<i64>()
            .map(|parsed| parsed == portfolio_id)
            .unwrap_or(false),
        _ => false,
    })
}

/// Load and concatenate every history file directly inside `unit_dir`
/// whose name contains `marker` (case-sensitive) and whose extension is
/// recognized. Files are read in lexicographic name order so repeated
/// runs stack rows identically. Zero matches yields an empty table.
pub fn load_history(unit_dir: &Path, marker: &str) -> Result<Table, TableError> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(unit_dir).map_err(csv::Error::from)? {
        let entry = entry.map_err(csv::Error::from)?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = match path.file_name().and_then(|name| name.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if name.contains(marker) && has_history_extension(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut parts = Vec::with_capacity(paths.len());
    for path in paths {
        parts.push(Table::from_csv_path(path)?);
    }
    Ok(Table::concat(&parts))
}

fn has_history_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| {
            HISTORY_EXTENSIONS
                .iter()
                .any(|known| extension.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}
