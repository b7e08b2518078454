//! In-memory CSV tables.
//!
//! A [`Table`] is a header row plus string cells. Nothing is parsed eagerly:
//! the lookup and cost-row readers decide which columns are numeric.

use crate::errors::{PvError, PvResult};
use std::io::Read;
use std::path::Path;

/// A delimited table loaded into memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Builds a table from headers and rows.
    ///
    /// Rows shorter than the header are padded with empty cells.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Reads a comma separated table from a file.
    pub fn from_path(path: impl AsRef<Path>) -> PvResult<Self> {
        let path = path.as_ref();
        log::debug!("Reading table from {}", path.display());
        Self::from_reader(std::fs::File::open(path)?)
    }

    /// Reads a comma separated table from any reader.
    pub fn from_reader<R: Read>(reader: R) -> PvResult<Self> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        Self::from_csv(reader)
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> PvResult<Self> {
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<Result<Vec<Vec<String>>, csv::Error>>()?;
        Ok(Self::new(columns, rows))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of a column, ignoring ASCII case.
    pub fn column_index_ignore_case(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Returns a copy with every column name lower-cased.
    pub fn with_lowercase_columns(&self) -> Self {
        Self {
            columns: self.columns.iter().map(|c| c.to_lowercase()).collect(),
            rows: self.rows.clone(),
        }
    }

    /// Keeps the rows for which `predicate` holds.
    pub fn filter_rows<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&[String]) -> bool,
    {
        Self {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| predicate(row))
                .cloned()
                .collect(),
        }
    }

    /// Keeps the rows whose `column` holds `year`.
    ///
    /// Year cells are compared numerically, so `2024` and `2024.0` both match.
    pub fn filter_year(&self, column: usize, year: i64) -> Self {
        self.filter_rows(|row| parse_year(&row[column]) == Some(year))
    }

    /// Returns a copy without the named columns.
    pub fn drop_columns(&self, names: &[&str]) -> Self {
        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|&i| !names.contains(&self.columns[i].as_str()))
            .collect();
        Self {
            columns: keep.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }

    /// Finds the year column, preferring `Year` over `year`.
    pub fn year_column(&self) -> PvResult<usize> {
        self.column_index("Year")
            .or_else(|| self.column_index("year"))
            .or_else(|| self.column_index_ignore_case("year"))
            .ok_or_else(|| PvError::MissingColumn("year".to_string()))
    }
}

/// Parses a year cell, accepting integral floats.
pub(crate) fn parse_year(cell: &str) -> Option<i64> {
    let cell = cell.trim();
    if let Ok(year) = cell.parse::<i64>() {
        return Some(year);
    }
    match cell.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.is_finite() => Some(v as i64),
        _ => None,
    }
}

/// Parses an optional numeric cell. Empty and `NaN` cells are missing.
pub(crate) fn parse_number(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    cell.parse::<f64>().ok().filter(|v| !v.is_nan())
}
