use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::path::Path;

use chrono::NaiveDate;

/// A single value in a [`Table`]. Source files arrive as text; the
/// normalizer upgrades cells to typed variants where a coercion is
/// configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Null,
    Text(String),
    Int(i64),
    Date(NaiveDate),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Canonical textual form used when writing CSV output. `Null`
    /// renders as the empty field.
    pub fn render(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Text(value) => value.clone(),
            Cell::Int(value) => value.to_string(),
            Cell::Date(value) => value.format("%Y-%m-%d").to_string(),
        }
    }

    /// Key form for joins: trimmed canonical text, or `None` for `Null`
    /// (a null key never matches anything).
    fn join_key(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            other => {
                let rendered = other.render();
                let trimmed = rendered.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("row has {got} cells but the table has {expected} columns")]
    ArityMismatch { expected: usize, got: usize },
    #[error("column '{0}' not present in table")]
    UnknownColumn(String),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Column-named, row-ordered tabular data. This is the shape shared by
/// the roster, the chain-of-title history, and every flag table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: Vec<S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::ArityMismatch {
                expected: self.columns.len(),
                got: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Cell at `(row, column-name)`, if both exist.
    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let index = self.column_index(column)?;
        self.rows.get(row).and_then(|cells| cells.get(index))
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, column: &str) -> Result<Vec<&Cell>, TableError> {
        let index = self
            .column_index(column)
            .ok_or_else(|| TableError::UnknownColumn(column.to_string()))?;
        Ok(self.rows.iter().map(|row| &row[index]).collect())
    }

    /// New table keeping only rows the predicate accepts. Row order is
    /// preserved; the source table is untouched.
    pub fn filter<F>(&self, mut predicate: F) -> Table
    where
        F: FnMut(&TableRow<'_>) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .filter(|cells| {
                predicate(&TableRow {
                    columns: &self.columns,
                    cells,
                })
            })
            .cloned()
            .collect();
        Table {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Projection onto the named columns, in the given order.
    pub fn select(&self, columns: &[&str]) -> Result<Table, TableError> {
        let mut indices = Vec::with_capacity(columns.len());
        for name in columns {
            let index = self
                .column_index(name)
                .ok_or_else(|| TableError::UnknownColumn((*name).to_string()))?;
            indices.push(index);
        }

        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(Table {
            columns: columns.iter().map(|name| (*name).to_string()).collect(),
            rows,
        })
    }

    /// Row-wise concatenation with column-union semantics: the output
    /// columns are the union of all input columns in first-seen order,
    /// and rows are padded with `Null` where a source table lacked a
    /// column. Tables without columns contribute nothing.
    pub fn concat(tables: &[Table]) -> Table {
        let mut columns: Vec<String> = Vec::new();
        for table in tables {
            for column in &table.columns {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }

        let mut rows = Vec::new();
        for table in tables {
            let mapping: Vec<Option<usize>> = columns
                .iter()
                .map(|column| table.column_index(column))
                .collect();
            for source in &table.rows {
                let row = mapping
                    .iter()
                    .map(|index| match index {
                        Some(i) => source[*i].clone(),
                        None => Cell::Null,
                    })
                    .collect();
                rows.push(row);
            }
        }

        Table { columns, rows }
    }

    /// Left join against `lookup` on `key`: every row of `self` appears
    /// exactly once in the output, extended with the non-key columns of
    /// the first `lookup` row whose key matches (or `Null`s when no row
    /// matches). Both tables must carry the key column.
    pub fn left_join(&self, lookup: &Table, key: &str) -> Result<Table, TableError> {
        let left_key = self
            .column_index(key)
            .ok_or_else(|| TableError::UnknownColumn(key.to_string()))?;
        let right_key = lookup
            .column_index(key)
            .ok_or_else(|| TableError::UnknownColumn(key.to_string()))?;

        let extra_indices: Vec<usize> = (0..lookup.columns.len())
            .filter(|&i| i != right_key)
            .collect();

        // First occurrence wins when the lookup side has duplicate keys.
        let mut index: HashMap<String, usize> = HashMap::new();
        for (row_no, row) in lookup.rows.iter().enumerate() {
            if let Some(join_key) = row[right_key].join_key() {
                index.entry(join_key).or_insert(row_no);
            }
        }

        let mut columns = self.columns.clone();
        for &i in &extra_indices {
            columns.push(lookup.columns[i].clone());
        }

        let mut rows = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let mut joined = row.clone();
            let matched = row[left_key]
                .join_key()
                .and_then(|join_key| index.get(&join_key));
            match matched {
                Some(&row_no) => {
                    for &i in &extra_indices {
                        joined.push(lookup.rows[row_no][i].clone());
                    }
                }
                None => joined.extend(extra_indices.iter().map(|_| Cell::Null)),
            }
            rows.push(joined);
        }

        Ok(Table { columns, rows })
    }

    /// Copy of the table with `convert` applied to every cell of the
    /// named column. A table without that column is returned unchanged;
    /// callers treat column maps as forward-compatible.
    pub fn map_column<F>(&self, column: &str, convert: F) -> Table
    where
        F: Fn(&Cell) -> Cell,
    {
        let Some(index) = self.column_index(column) else {
            return self.clone();
        };
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut cells = row.clone();
                cells[index] = convert(&cells[index]);
                cells
            })
            .collect();
        Table {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Copy of the table with one constant-valued column appended.
    pub fn with_constant_column(&self, name: &str, value: Cell) -> Table {
        let mut columns = self.columns.clone();
        columns.push(name.to_string());
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut extended = row.clone();
                extended.push(value.clone());
                extended
            })
            .collect();
        Table { columns, rows }
    }

    /// Read a CSV document into a table of `Text` cells; empty fields
    /// become `Null`. Typing is the normalizer's concern, not the
    /// reader's.
    pub fn from_csv<R: Read>(reader: R) -> Result<Table, TableError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|header| header.to_string())
            .collect();

        let mut table = Table::new(columns);
        for record in csv_reader.records() {
            let record = record?;
            let row = record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Cell::Null
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect();
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Table, TableError> {
        let file = std::fs::File::open(path).map_err(csv::Error::from)?;
        Self::from_csv(file)
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), TableError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.columns)?;
        for row in &self.rows {
            csv_writer.write_record(row.iter().map(Cell::render))?;
        }
        csv_writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    /// Render the full document in memory. Callers that must never
    /// leave a partial file behind write these bytes in one shot.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, TableError> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        Ok(buffer)
    }
}

/// Borrowed view of one row with column-name access, handed to filter
/// predicates.
pub struct TableRow<'a> {
    columns: &'a [String],
    cells: &'a [Cell],
}

impl<'a> TableRow<'a> {
    pub fn cell(&self, column: &str) -> Option<&'a Cell> {
        let index = self.columns.iter().position(|name| name == column)?;
        self.cells.get(index)
    }
}
