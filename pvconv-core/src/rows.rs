//! Cost rows and their conversion between matrix units.

use crate::errors::PvResult;
use crate::matrix::ConversionMatrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of a cost table.
///
/// `value`, `min` and `max` are rates quoted per `unit`. Columns the
/// converter does not interpret are carried in `attributes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostRow {
    pub value: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub unit: Option<String>,
    pub year: Option<i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl CostRow {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_year(mut self, year: i64) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Multiplies the value and any bounds by `factor`.
    fn scaled(&self, factor: f64) -> Self {
        Self {
            value: self.value * factor,
            min: self.min.map(|v| v * factor),
            max: self.max.map(|v| v * factor),
            ..self.clone()
        }
    }
}

/// Trims a unit label; blank labels count as absent.
fn clean_unit(unit: Option<&str>) -> Option<&str> {
    unit.map(str::trim).filter(|u| !u.is_empty())
}

/// Re-expresses cost rows in `target_unit`.
///
/// Rows already in the target unit, or without a unit, only have their unit
/// label set to the target. Every other row is scaled by
/// `matrix[row unit][target]`.
///
/// # Errors
///
/// [`PvError::UnknownUnit`](crate::errors::PvError::UnknownUnit) if a row
/// needs converting and either label is not a matrix unit. Nothing is
/// returned in that case.
pub fn convert_rows(
    rows: &[CostRow],
    target_unit: &str,
    matrix: &ConversionMatrix,
) -> PvResult<Vec<CostRow>> {
    let target = target_unit.trim();
    rows.iter()
        .map(|row| -> PvResult<CostRow> {
            let mut converted = match clean_unit(row.unit.as_deref()) {
                Some(from) if from != target => row.scaled(matrix.factor(from, target)?),
                _ => row.clone(),
            };
            converted.unit = Some(target.to_string());
            Ok(converted)
        })
        .collect()
}
