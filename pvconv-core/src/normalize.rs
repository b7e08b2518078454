//! Unit normalization for cost rates and module parameters.
//!
//! Cost tables quote rates against whatever unit the source used
//! (`$/g`, `USD per kW`, `$/cm2`, ...). Module parameter tables likewise mix
//! grams, square centimetres and percentages. This module brings both to a
//! fixed standard basis:
//!
//! | Quantity | Standard unit |
//! |----------|---------------|
//! | mass     | kg            |
//! | area     | m^2           |
//! | power    | Wp            |
//!
//! Unknown unit tokens are not an error here: the value is passed through
//! unchanged so that partially unit-free tables still load.

use crate::constants::{ConstantSet, CELL_ACTIVE_AREA, EFFICIENCY, KG_PER_CELL};
use crate::rows::CostRow;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

/// Physical quantity a unit token measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Mass,
    Area,
    Power,
}

/// Static factor tables from unit token to standard unit.
///
/// Each factor is the multiplier that converts one of the token's unit into
/// the standard unit, e.g. `g` has factor `1e-3` (1 g = 1e-3 kg).
#[derive(Debug)]
pub struct UnitFactorTable {
    mass: HashMap<&'static str, f64>,
    area: HashMap<&'static str, f64>,
    power: HashMap<&'static str, f64>,
}

/// The process-wide factor tables.
pub static UNIT_FACTORS: LazyLock<UnitFactorTable> = LazyLock::new(UnitFactorTable::new);

/// Tokens marking a value stored as a percentage.
pub const PERCENT_TOKENS: &[&str] = &["%", "percent", "percentage"];

impl Default for UnitFactorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitFactorTable {
    pub fn new() -> Self {
        let mass = HashMap::from([
            ("kg", 1.0),
            ("g", 1e-3),
            ("gram", 1e-3),
            ("grams", 1e-3),
            ("mg", 1e-6),
            ("milligram", 1e-6),
            ("milligrams", 1e-6),
            ("lb", 0.453592),
            ("lbs", 0.453592),
        ]);
        let area = HashMap::from([
            ("m2", 1.0),
            ("m^2", 1.0),
            ("cm2", 1e-4),
            ("cm^2", 1e-4),
            ("mm2", 1e-6),
            ("mm^2", 1e-6),
        ]);
        let power = HashMap::from([
            ("wp", 1.0),
            ("w", 1.0),
            ("kw", 1e3),
            ("mw", 1e6),
            ("kwp", 1e3),
            ("mwp", 1e6),
        ]);
        Self { mass, area, power }
    }

    /// Factor for a token in one quantity's table.
    pub fn factor(&self, quantity: Quantity, token: &str) -> Option<f64> {
        let table = match quantity {
            Quantity::Mass => &self.mass,
            Quantity::Area => &self.area,
            Quantity::Power => &self.power,
        };
        table.get(token).copied()
    }

    /// Resolves a token against mass, then area, then power.
    pub fn resolve(&self, token: &str) -> Option<(Quantity, f64)> {
        [Quantity::Mass, Quantity::Area, Quantity::Power]
            .into_iter()
            .find_map(|q| self.factor(q, token).map(|f| (q, f)))
    }
}

/// Extracts the denominator of a rate unit such as `$/kg` or `USD per g`.
///
/// A token without `/` is taken to be the denominator itself.
pub fn rate_denominator(unit: &str) -> Option<String> {
    let unit = unit
        .trim()
        .to_lowercase()
        .replace("usd", "$")
        .replace("per ", "/");
    let denominator = match unit.rsplit_once('/') {
        Some((_, denom)) => denom.trim(),
        None => unit.as_str(),
    };
    (!denominator.is_empty()).then(|| denominator.to_string())
}

/// Converts a rate quoted per `unit` into a rate per standard unit.
///
/// `normalize_rate(5.0, Some("$/g"))` is 5000 $/kg. Missing, empty or
/// unrecognised units return `value` unchanged.
pub fn normalize_rate(value: f64, unit: Option<&str>) -> f64 {
    let Some(denominator) = unit.and_then(rate_denominator) else {
        return value;
    };
    match UNIT_FACTORS.resolve(&denominator) {
        Some((_, factor)) => value / factor,
        None => {
            log::trace!("Unrecognised rate unit '{denominator}'; leaving value unchanged");
            value
        }
    }
}

/// Where the unit of each cost row comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CostUnitSource {
    /// Leave the rows as they are.
    #[default]
    Unspecified,
    /// Use each row's own unit label.
    RowUnit,
    /// Every row is quoted in this unit.
    Fixed(String),
}

/// Normalizes the value and any present bounds of one row.
pub fn normalize_cost_row(row: &CostRow, unit: Option<&str>) -> CostRow {
    let mut out = row.clone();
    out.value = normalize_rate(row.value, unit);
    out.min = row.min.map(|v| normalize_rate(v, unit));
    out.max = row.max.map(|v| normalize_rate(v, unit));
    out
}

/// Normalizes a cost table to standard rates.
pub fn normalize_cost_rows(rows: &[CostRow], source: &CostUnitSource) -> Vec<CostRow> {
    match source {
        CostUnitSource::Unspecified => rows.to_vec(),
        CostUnitSource::RowUnit => rows
            .iter()
            .map(|row| normalize_cost_row(row, row.unit.as_deref()))
            .collect(),
        CostUnitSource::Fixed(unit) => rows
            .iter()
            .map(|row| normalize_cost_row(row, Some(unit.as_str())))
            .collect(),
    }
}

fn is_percent(token: &str) -> bool {
    PERCENT_TOKENS.contains(&token)
}

/// Rescales module parameters to kg, m^2 and fractional efficiency.
///
/// `unit_hints` maps a constant name to the unit its value is stored in.
/// Only hinted constants are touched:
///
/// - `kg_per_cell` is multiplied by its mass factor,
/// - `cell_active_area` by its area factor,
/// - `efficiency` (and `efficiency_<technology>`) is divided by 100 when the
///   hint is a percentage, or when the stored value exceeds 1.
pub fn normalize_parameters(
    constants: &ConstantSet,
    unit_hints: &BTreeMap<String, String>,
) -> ConstantSet {
    let mut out = constants.clone();
    for (name, unit) in unit_hints {
        if !out.contains(name) {
            continue;
        }
        let unit = unit.trim().to_lowercase();
        if name == KG_PER_CELL {
            if let Some(factor) = UNIT_FACTORS.factor(Quantity::Mass, &unit) {
                out.update(name, |v| v * factor);
            }
        } else if name == CELL_ACTIVE_AREA {
            if let Some(factor) = UNIT_FACTORS.factor(Quantity::Area, &unit) {
                out.update(name, |v| v * factor);
            }
        } else if name == EFFICIENCY || name.starts_with("efficiency_") {
            let percent = is_percent(&unit);
            out.update(name, |v| if percent || v > 1.0 { v / 100.0 } else { v });
        }
    }
    out
}
