use chrono::NaiveDate;

use crate::table::{Cell, Table};

/// Declarative per-portfolio cleanup: which columns become dates, which
/// become integers, and the literal that stands in for a missing value.
/// Columns named here but absent from a table are silently ignored, so
/// a schema can grow ahead of the configuration.
#[derive(Debug, Clone)]
pub struct NormalizeSpec {
    pub null_sentinel: String,
    pub history_date_columns: Vec<String>,
    pub roster_date_columns: Vec<String>,
    pub history_int_columns: Vec<String>,
    pub roster_int_columns: Vec<String>,
}

impl Default for NormalizeSpec {
    fn default() -> Self {
        Self {
            null_sentinel: "(null)".to_string(),
            history_date_columns: vec!["sold_date".to_string(), "purchase_date".to_string()],
            roster_date_columns: vec!["PlacementDate".to_string()],
            history_int_columns: Vec::new(),
            roster_int_columns: Vec::new(),
        }
    }
}

impl NormalizeSpec {
    pub fn with_sentinel(sentinel: &str) -> Self {
        Self {
            null_sentinel: sentinel.to_string(),
            ..Self::default()
        }
    }
}

/// Apply the spec to both tables, returning fresh copies; the inputs
/// are never aliased or mutated.
pub fn normalize_pair(roster: &Table, history: &Table, spec: &NormalizeSpec) -> (Table, Table) {
    let mut roster = roster.clone();
    let mut history = history.clone();

    for column in &spec.history_date_columns {
        coerce_dates(&mut history, column, &spec.null_sentinel);
    }
    for column in &spec.roster_date_columns {
        coerce_dates(&mut roster, column, &spec.null_sentinel);
    }
    for column in &spec.history_int_columns {
        coerce_ints(&mut history, column, &spec.null_sentinel);
    }
    for column in &spec.roster_int_columns {
        coerce_ints(&mut roster, column, &spec.null_sentinel);
    }

    (roster, history)
}

/// Best-effort date parsing. Formats mirror what the upstream exports
/// actually contain; anything else coerces to `Null` rather than
/// erroring.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }

    // Timestamp forms: keep the calendar date, drop the time.
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(datetime) = chrono::NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime.date());
        }
    }

    None
}

fn coerce_dates(table: &mut Table, column: &str, sentinel: &str) {
    *table = table.map_column(column, |cell| match cell {
        Cell::Date(date) => Cell::Date(*date),
        Cell::Text(value) if value == sentinel => Cell::Null,
        Cell::Text(value) => parse_date(value).map(Cell::Date).unwrap_or(Cell::Null),
        _ => Cell::Null,
    });
}

fn coerce_ints(table: &mut Table, column: &str, sentinel: &str) {
    *table = table.map_column(column, |cell| match cell {
        Cell::Int(value) => Cell::Int(*value),
        Cell::Text(value) if value == sentinel => Cell::Null,
        Cell::Text(value) => value
            .trim()
            .parse::<i64>()
            .map(Cell::Int)
            .unwrap_or(Cell::Null),
        _ => Cell::Null,
    });
}
