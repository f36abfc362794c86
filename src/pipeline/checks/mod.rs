pub mod builtin;

use crate::table::{Table, TableError};

/// Column every check writes its discriminant into.
pub const CHECK_COLUMN: &str = "Check";

/// One named, pure QC check. The contract is deliberately narrow: two
/// normalized tables in, a flag table out. A check never performs I/O
/// and never fails on structurally valid input; malformed domain
/// values are something to *flag*, not to error on.
pub struct QcCheck {
    name: &'static str,
    run: Box<dyn Fn(&Table, &Table) -> Table + Send + Sync>,
}

impl QcCheck {
    pub fn new<F>(name: &'static str, run: F) -> Self
    where
        F: Fn(&Table, &Table) -> Table + Send + Sync + 'static,
    {
        Self {
            name,
            run: Box::new(run),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn run(&self, roster: &Table, history: &Table) -> Table {
        (self.run)(roster, history)
    }
}

impl std::fmt::Debug for QcCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QcCheck").field("name", &self.name).finish()
    }
}

/// How flag rows are tied back to roster attributes after all checks
/// have run.
#[derive(Debug, Clone)]
pub struct EnrichmentSpec {
    /// Join column shared by flag tables and the roster.
    pub account_key: String,
    /// Roster columns to copy onto matching flag rows. Columns missing
    /// from the roster subset are skipped rather than failing the join.
    pub lookup_columns: Vec<String>,
}

/// Run every check in order, concatenate the flag tables, and enrich
/// the result with roster lookup attributes via a left join on the
/// account key. Checks all run even when earlier ones found nothing;
/// their order fixes the row order of the output.
pub fn run_checks(
    checks: &[QcCheck],
    roster: &Table,
    history: &Table,
    enrichment: &EnrichmentSpec,
) -> Result<Table, TableError> {
    let flag_tables: Vec<Table> = checks
        .iter()
        .map(|check| check.run(roster, history))
        .collect();
    let all_flags = Table::concat(&flag_tables);

    if all_flags.columns().is_empty() {
        // No checks registered; nothing to enrich.
        return Ok(all_flags);
    }

    let mut projection: Vec<&str> = vec![enrichment.account_key.as_str()];
    projection.extend(
        enrichment
            .lookup_columns
            .iter()
            .map(String::as_str)
            .filter(|column| roster.has_column(column)),
    );
    let lookup = roster.select(&projection)?;

    all_flags.left_join(&lookup, &enrichment.account_key)
}
