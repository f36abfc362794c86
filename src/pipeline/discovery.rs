use std::io;
use std::path::{Path, PathBuf};

/// One candidate portfolio directory under the root, paired with the
/// identifier parsed from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioUnit {
    pub name: String,
    pub path: PathBuf,
    pub portfolio_id: i64,
}

/// Leading decimal-digit run of a directory name, if any. Leading
/// whitespace is tolerated; anything after the digits is ignored.
pub fn extract_portfolio_id(name: &str) -> Option<i64> {
    let trimmed = name.trim_start();
    let digits: String = trimmed.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// List portfolio directories under `root` in lexicographic name order.
/// Non-directories and names that do not start with a digit are
/// silently excluded; exclusion is not an error.
pub fn discover_units(root: &Path) -> Result<Vec<PortfolioUnit>, io::Error> {
    let mut names: Vec<(String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        names.push((name, entry.path()));
    }
    names.sort_by(|a, b| a.0.cmp(&b.0));

    let units = names
        .into_iter()
        .filter_map(|(name, path)| {
            extract_portfolio_id(&name).map(|portfolio_id| PortfolioUnit {
                name,
                path,
                portfolio_id,
            })
        })
        .collect();
    Ok(units)
}
