//! Readers for the reference data files.
//!
//! Three tables feed the cost model:
//!
//! - solar module data: one row of physical constants per year (and
//!   optionally per `solar_panel` variant), read with [`read_conversion_constants`],
//! - production step data: process costs with bounds and units, read with
//!   [`read_production_steps`],
//! - efficiency data: efficiency ranges per year, read with
//!   [`read_efficiency_data`].

use crate::constants::{lookup, ConstantSet};
use crate::errors::{PvError, PvResult};
use crate::rows::CostRow;
use crate::table::{parse_number, parse_year, Table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Column holding efficiency ranges in the efficiency table.
pub const EFFICIENCY_RANGE_COLUMN: &str = "Efficiency Range";

/// Names of the cost columns in a production step table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostColumns {
    pub value: String,
    pub min: String,
    pub max: String,
    pub unit: String,
}

impl Default for CostColumns {
    fn default() -> Self {
        Self {
            value: "Process Cost".to_string(),
            min: "Process Cost Min".to_string(),
            max: "Process Cost Max".to_string(),
            unit: "Unit".to_string(),
        }
    }
}

impl CostColumns {
    /// Columns for a cost column named `value`, with `"<value> Min"` and
    /// `"<value> Max"` bounds.
    pub fn for_cost_column(value: &str) -> Self {
        Self {
            value: value.to_string(),
            min: format!("{value} Min"),
            max: format!("{value} Max"),
            ..Default::default()
        }
    }
}

/// Loads the constants for `year` from a solar module data file.
pub fn read_conversion_constants(
    path: impl AsRef<Path>,
    year: i64,
    panel: Option<&str>,
) -> PvResult<ConstantSet> {
    lookup(&Table::from_path(path)?, year, panel)
}

/// Keeps the rows for `year` and drops the year column.
///
/// # Errors
///
/// [`PvError::NotFound`] if no row matches.
pub fn year_filtered(table: &Table, year: i64) -> PvResult<Table> {
    let year_idx = table.year_column()?;
    let year_name = table.columns()[year_idx].clone();
    let rows = table.filter_year(year_idx, year);
    if rows.is_empty() {
        return Err(PvError::NotFound { year, panel: None });
    }
    Ok(rows.drop_columns(&[year_name.as_str()]))
}

/// Reads a file and keeps the rows for `year`. See [`year_filtered`].
pub fn read_year_filtered(path: impl AsRef<Path>, year: i64) -> PvResult<Table> {
    year_filtered(&Table::from_path(path)?, year)
}

/// Turns a production step table into cost rows.
///
/// When `year` is given only rows for that year are kept, and the table
/// must have a year column. Unlike [`year_filtered`] an empty result is not
/// an error.
pub fn cost_rows(
    table: &Table,
    year: Option<i64>,
    columns: &CostColumns,
) -> PvResult<Vec<CostRow>> {
    let value_idx = table
        .column_index(&columns.value)
        .ok_or_else(|| PvError::MissingColumn(columns.value.clone()))?;
    let min_idx = table.column_index(&columns.min);
    let max_idx = table.column_index(&columns.max);
    let unit_idx = table.column_index(&columns.unit);
    let (table, year_idx) = match year {
        Some(year) => {
            let idx = table.year_column()?;
            (table.filter_year(idx, year), Some(idx))
        }
        None => (table.clone(), table.year_column().ok()),
    };
    if table.is_empty() {
        log::warn!(
            "No cost rows found{}",
            year.map(|y| format!(" for year {y}")).unwrap_or_default()
        );
    }

    let interpreted = [Some(value_idx), min_idx, max_idx, unit_idx, year_idx];
    table
        .rows()
        .iter()
        .map(|row| -> PvResult<CostRow> {
            let value = parse_number(&row[value_idx]).ok_or_else(|| PvError::InvalidValue {
                column: columns.value.clone(),
                value: row[value_idx].clone(),
            })?;
            let attributes = table
                .columns()
                .iter()
                .enumerate()
                .filter(|(i, _)| !interpreted.contains(&Some(*i)))
                .map(|(i, name)| (name.clone(), row[i].clone()))
                .collect();
            Ok(CostRow {
                value,
                min: min_idx.and_then(|i| parse_number(&row[i])),
                max: max_idx.and_then(|i| parse_number(&row[i])),
                unit: unit_idx
                    .map(|i| row[i].trim().to_string())
                    .filter(|u| !u.is_empty()),
                year: year_idx.and_then(|i| parse_year(&row[i])),
                attributes,
            })
        })
        .collect()
}

/// Reads the production steps for `year` from a file.
pub fn read_production_steps(
    path: impl AsRef<Path>,
    year: i64,
    columns: &CostColumns,
) -> PvResult<Vec<CostRow>> {
    cost_rows(&Table::from_path(path)?, Some(year), columns)
}

/// Parses a `(low, high)` range literal.
///
/// Brackets may be round or square; whitespace is ignored.
pub fn parse_range(text: &str) -> Option<(f64, f64)> {
    let inner = text.trim();
    let inner = inner
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .or_else(|| inner.strip_prefix('[').and_then(|s| s.strip_suffix(']')))?;
    let (low, high) = inner.split_once(',')?;
    let high = high.trim().trim_end_matches(',');
    Some((low.trim().parse().ok()?, high.trim().parse().ok()?))
}

/// One row of the efficiency table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyRecord {
    /// Parsed `Efficiency Range`, if the table has one.
    pub range: Option<(f64, f64)>,
    /// The remaining columns, unparsed.
    pub attributes: BTreeMap<String, String>,
}

/// Extracts efficiency records from a year-filtered efficiency table.
pub fn efficiency_records(table: &Table) -> PvResult<Vec<EfficiencyRecord>> {
    let range_idx = table.column_index(EFFICIENCY_RANGE_COLUMN);
    table
        .rows()
        .iter()
        .map(|row| -> PvResult<EfficiencyRecord> {
            let range = match range_idx {
                Some(i) if !row[i].trim().is_empty() => {
                    Some(parse_range(&row[i]).ok_or_else(|| PvError::InvalidValue {
                        column: EFFICIENCY_RANGE_COLUMN.to_string(),
                        value: row[i].clone(),
                    })?)
                }
                _ => None,
            };
            let attributes = table
                .columns()
                .iter()
                .zip(row)
                .enumerate()
                .filter(|(i, _)| Some(*i) != range_idx)
                .map(|(_, (name, cell))| (name.clone(), cell.clone()))
                .collect();
            Ok(EfficiencyRecord { range, attributes })
        })
        .collect()
}

/// Reads the efficiency records for `year` from a file.
pub fn read_efficiency_data(path: impl AsRef<Path>, year: i64) -> PvResult<Vec<EfficiencyRecord>> {
    efficiency_records(&read_year_filtered(path, year)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEPS: &str = "\
Year,Process Step,Process Cost,Process Cost Min,Process Cost Max,Unit
2024,Polysilicon,8.5,7.0,10.0,kg
2024,Wafering,0.12,,0.15,wafer
2025,Polysilicon,7.9,6.5,9.5,kg
2024,Module assembly,0.08,0.07,0.09,
";

    fn steps() -> Table {
        Table::from_reader(STEPS.as_bytes()).unwrap()
    }

    #[test]
    fn test_cost_rows_for_year() {
        let rows = cost_rows(&steps(), Some(2024), &CostColumns::default()).unwrap();
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].value, 8.5);
        assert_eq!(rows[0].min, Some(7.0));
        assert_eq!(rows[0].max, Some(10.0));
        assert_eq!(rows[0].unit.as_deref(), Some("kg"));
        assert_eq!(rows[0].year, Some(2024));
        assert_eq!(rows[0].attributes.len(), 1);
        assert_eq!(rows[0].attributes["Process Step"], "Polysilicon");

        assert_eq!(rows[1].min, None);
        assert_eq!(rows[2].unit, None);
    }

    #[test]
    fn test_cost_rows_empty_year_is_not_an_error() {
        let rows = cost_rows(&steps(), Some(2030), &CostColumns::default()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_cost_rows_year_requires_year_column() {
        let table =
            Table::from_reader("Process Cost,Unit\n1.0,kg\n2.0,wafer\n".as_bytes()).unwrap();
        let err = cost_rows(&table, Some(2024), &CostColumns::default()).unwrap_err();
        assert!(matches!(err, PvError::MissingColumn(ref c) if c == "year"));

        let rows = cost_rows(&table, None, &CostColumns::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].year, None);
    }

    #[test]
    fn test_cost_rows_missing_value_column() {
        let err = cost_rows(&steps(), None, &CostColumns::for_cost_column("Material Cost"))
            .unwrap_err();
        assert!(matches!(err, PvError::MissingColumn(ref c) if c == "Material Cost"));
    }

    #[test]
    fn test_cost_rows_invalid_value() {
        let table = Table::from_reader("Process Cost,Unit\nn/a,kg\n".as_bytes()).unwrap();
        let err = cost_rows(&table, None, &CostColumns::default()).unwrap_err();
        assert!(matches!(err, PvError::InvalidValue { ref value, .. } if value == "n/a"));
    }

    #[test]
    fn test_year_filtered_drops_year_column() {
        let filtered = year_filtered(&steps(), 2025).unwrap();
        assert_eq!(filtered.len(), 1);
        assert!(filtered.column_index("Year").is_none());

        assert!(matches!(
            year_filtered(&steps(), 1999),
            Err(PvError::NotFound { year: 1999, panel: None })
        ));
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("(0.2, 0.24)"), Some((0.2, 0.24)));
        assert_eq!(parse_range(" [19.5,23] "), Some((19.5, 23.0)));
        assert_eq!(parse_range("(0.2, 0.24,)"), Some((0.2, 0.24)));
        assert_eq!(parse_range("0.2-0.24"), None);
        assert_eq!(parse_range("(a, b)"), None);
    }

    #[test]
    fn test_efficiency_records() {
        let table = Table::from_reader(
            "Year,Technology,Efficiency Range\n2024,PERC,\"(0.21, 0.23)\"\n2024,TOPCon,\n"
                .as_bytes(),
        )
        .unwrap();
        let records = efficiency_records(&year_filtered(&table, 2024).unwrap()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].range, Some((0.21, 0.23)));
        assert_eq!(records[0].attributes["Technology"], "PERC");
        assert!(!records[0].attributes.contains_key("Year"));
        assert_eq!(records[1].range, None);
    }
}
