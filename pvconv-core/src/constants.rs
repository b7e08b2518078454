//! Per-year physical constants and their lookup.
//!
//! A solar module data table holds one row per year (and optionally per
//! panel variant). [`lookup`] selects the row and returns its numeric
//! columns as a [`ConstantSet`].

use crate::errors::{PvError, PvResult};
use crate::table::{parse_number, Table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mass of one (physical) cell in kg.
pub const KG_PER_CELL: &str = "kg_per_cell";
/// Active area of one (physical) cell in m^2.
pub const CELL_ACTIVE_AREA: &str = "cell_active_area";
/// Cell efficiency as a fraction.
pub const EFFICIENCY: &str = "efficiency";
/// Cell-to-module power ratio.
pub const CELL_TO_MODULE_RATIO: &str = "cell_to_module_ratio";
/// Physical cells per module.
pub const CELLS_PER_MODULE: &str = "cells_per_module";

/// Year column name after lower-casing.
pub const YEAR_COLUMN: &str = "year";
/// Optional panel variant column.
pub const PANEL_COLUMN: &str = "solar_panel";

/// Named numeric constants for one year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstantSet {
    values: BTreeMap<String, f64>,
}

impl ConstantSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Returns a constant or fails with [`PvError::MissingField`].
    pub fn require(&self, name: &str) -> PvResult<f64> {
        self.get(name)
            .ok_or_else(|| PvError::MissingField(name.to_string()))
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) -> Option<f64> {
        self.values.insert(name.into(), value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Applies `f` to a constant in place. Missing names are ignored.
    pub(crate) fn update<F: FnOnce(f64) -> f64>(&mut self, name: &str, f: F) {
        if let Some(v) = self.values.get_mut(name) {
            *v = f(*v);
        }
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for ConstantSet {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl From<ConstantSet> for BTreeMap<String, f64> {
    fn from(value: ConstantSet) -> Self {
        value.values
    }
}

/// Trims and lower-cases a panel label. Blank labels mean "no filter".
pub fn normalize_panel(panel: &str) -> Option<String> {
    let panel = panel.trim().to_lowercase();
    (!panel.is_empty()).then_some(panel)
}

/// Looks up the constants for `year`.
///
/// When `panel` is given and the table has a `solar_panel` column, only rows
/// for that panel variant are considered. If several rows match, the first
/// one wins.
///
/// Empty and non-numeric cells are left out of the result.
pub fn lookup(table: &Table, year: i64, panel: Option<&str>) -> PvResult<ConstantSet> {
    let table = table.with_lowercase_columns();
    let year_idx = table
        .column_index(YEAR_COLUMN)
        .ok_or_else(|| PvError::MissingColumn(YEAR_COLUMN.to_string()))?;

    let mut rows = table.filter_year(year_idx, year);
    let mut applied_panel = None;
    if let (Some(panel), Some(panel_idx)) = (
        panel.and_then(normalize_panel),
        table.column_index(PANEL_COLUMN),
    ) {
        rows = rows.filter_rows(|row| {
            normalize_panel(&row[panel_idx]).as_deref() == Some(panel.as_str())
        });
        applied_panel = Some(panel);
    }

    let Some(row) = rows.rows().first() else {
        return Err(PvError::NotFound {
            year,
            panel: applied_panel,
        });
    };
    if rows.len() > 1 {
        log::debug!(
            "{} rows match year {year}{}; using the first",
            rows.len(),
            applied_panel
                .as_deref()
                .map(|p| format!(" and panel '{p}'"))
                .unwrap_or_default()
        );
    }

    let mut constants = ConstantSet::new();
    for (name, cell) in rows.columns().iter().zip(row) {
        if name == YEAR_COLUMN || name == PANEL_COLUMN {
            continue;
        }
        match parse_number(cell) {
            Some(value) => {
                constants.insert(name.as_str(), value);
            }
            None if !cell.trim().is_empty() => {
                log::debug!("Skipping non-numeric constant {name}='{cell}'");
            }
            None => {}
        }
    }
    Ok(constants)
}
