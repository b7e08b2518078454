//! Conversion matrix between mass, count and power units.
//!
//! Cost data for solar modules is quoted per kilogram of silicon, per wafer,
//! per cell, per module or per watt-peak. For a given year the module
//! geometry constants fix how these relate, and [`build_matrix`] turns them
//! into a square table of multiplicative factors:
//!
//! $$ q_j = q_i \cdot M_{ij} $$
//!
//! # Half-cell modules
//!
//! Modules with 100 or more cells are assumed to be built from half-cut
//! cells. The recorded per-cell area and mass then describe a half cell, so
//! both are doubled to get full-cell equivalents before power and mass are
//! derived. A physical half cell counts as half a nameplate cell when quoting
//! power per cell.
//!
//! # Populated pairs
//!
//! Only the pairs below (and their reciprocals) are derived. Every other
//! off-diagonal entry stays at 1.0; in particular wafer and module are not
//! linked through cell.
//!
//! | From   | To     | Factor                               |
//! |--------|--------|--------------------------------------|
//! | kg     | cell   | full-cell mass                       |
//! | wafer  | cell   | 1                                    |
//! | kg     | wafer  | full-cell mass                       |
//! | module | cell   | 1 / cells per module                 |
//! | kg     | module | mass per module                      |
//! | Wp     | cell   | counted power per cell               |
//! | Wp     | wafer  | full-cell power                      |
//! | Wp     | module | power per module                     |
//! | Wp     | kg     | full-cell power / full-cell mass     |

use crate::constants::{
    ConstantSet, CELLS_PER_MODULE, CELL_ACTIVE_AREA, CELL_TO_MODULE_RATIO, EFFICIENCY,
    KG_PER_CELL,
};
use crate::errors::{PvError, PvResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Peak power per square metre of active area at standard test irradiance.
pub const WP_PER_M2: f64 = 1000.0;
/// Cells per module when the table does not say.
pub const DEFAULT_CELLS_PER_MODULE: f64 = 60.0;
/// Cell count from which a module is taken to use half-cut cells.
pub const HALF_CELL_THRESHOLD: f64 = 100.0;

/// Units the conversion matrix is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatrixUnit {
    #[serde(rename = "kg")]
    Kg,
    #[serde(rename = "wafer")]
    Wafer,
    #[serde(rename = "cell")]
    Cell,
    #[serde(rename = "module")]
    Module,
    #[serde(rename = "Wp")]
    Wp,
}

impl MatrixUnit {
    /// All units in matrix order.
    pub const ALL: [MatrixUnit; 5] = [
        MatrixUnit::Kg,
        MatrixUnit::Wafer,
        MatrixUnit::Cell,
        MatrixUnit::Module,
        MatrixUnit::Wp,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MatrixUnit::Kg => "kg",
            MatrixUnit::Wafer => "wafer",
            MatrixUnit::Cell => "cell",
            MatrixUnit::Module => "module",
            MatrixUnit::Wp => "Wp",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for MatrixUnit {
    type Err = PvError;

    /// Parses a matrix key. Surrounding whitespace is ignored, case is not.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        MatrixUnit::ALL
            .into_iter()
            .find(|u| u.label() == label)
            .ok_or_else(|| PvError::UnknownUnit(label.to_string()))
    }
}

impl fmt::Display for MatrixUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Quantities derived from one year's module constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellGeometry {
    /// Cell efficiency as a fraction.
    pub efficiency: f64,
    /// Physical cells per module as recorded.
    pub cells_per_module: f64,
    /// Whether the module uses half-cut cells.
    pub half_cell: bool,
    /// Full-cell equivalents per module.
    pub full_cells_in_module: f64,
    /// Active area of a full cell (m^2).
    pub full_cell_area: f64,
    /// Mass of a full cell (kg).
    pub full_cell_kg: f64,
    /// Peak power of a full cell (Wp).
    pub full_cell_wp: f64,
    /// Peak power attributed to one physical cell (Wp).
    pub counted_cell_wp: f64,
    /// Mass per module (kg).
    pub kg_per_module: f64,
    /// Peak power per module (Wp), after cell-to-module losses.
    pub wp_per_module: f64,
}

impl CellGeometry {
    /// Derives the geometry using the generic `efficiency` constant.
    pub fn from_constants(constants: &ConstantSet) -> PvResult<Self> {
        Self::from_constants_for(constants, None)
    }

    /// Derives the geometry, preferring `efficiency_<technology>` when it is
    /// present.
    pub fn from_constants_for(
        constants: &ConstantSet,
        technology: Option<&str>,
    ) -> PvResult<Self> {
        let efficiency = resolve_efficiency(constants, technology)?;
        let kg_per_cell = constants.require(KG_PER_CELL)?;
        let cell_active_area = constants.require(CELL_ACTIVE_AREA)?;
        let cell_to_module_ratio = constants.require(CELL_TO_MODULE_RATIO)?;
        let cells_per_module = constants
            .get(CELLS_PER_MODULE)
            .unwrap_or(DEFAULT_CELLS_PER_MODULE);

        for (name, value) in [
            (KG_PER_CELL, kg_per_cell),
            (CELL_ACTIVE_AREA, cell_active_area),
            (CELL_TO_MODULE_RATIO, cell_to_module_ratio),
            (CELLS_PER_MODULE, cells_per_module),
        ] {
            if !(value.is_finite() && value > 0.0) {
                log::warn!("Constant {name}={value} is not a positive number");
            }
        }

        let half_cell = cells_per_module >= HALF_CELL_THRESHOLD;
        let (full_cells_in_module, full_cell_area, full_cell_kg) = if half_cell {
            (
                (cells_per_module / 2.0).floor(),
                cell_active_area * 2.0,
                kg_per_cell * 2.0,
            )
        } else {
            (cells_per_module, cell_active_area, kg_per_cell)
        };

        let full_cell_wp = full_cell_area * efficiency * WP_PER_M2;
        let counted_cell_wp = if half_cell {
            full_cell_wp / 2.0
        } else {
            full_cell_wp
        };

        Ok(Self {
            efficiency,
            cells_per_module,
            half_cell,
            full_cells_in_module,
            full_cell_area,
            full_cell_kg,
            full_cell_wp,
            counted_cell_wp,
            kg_per_module: full_cell_kg * full_cells_in_module,
            wp_per_module: full_cell_wp * full_cells_in_module * cell_to_module_ratio,
        })
    }
}

/// Picks the efficiency constant and converts a percentage to a fraction.
fn resolve_efficiency(constants: &ConstantSet, technology: Option<&str>) -> PvResult<f64> {
    let specific = technology
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .map(|t| {
            if t.starts_with("efficiency_") {
                t
            } else {
                format!("efficiency_{t}")
            }
        });

    let value = match specific.as_deref().and_then(|key| constants.get(key)) {
        Some(v) => v,
        None => {
            if let Some(key) = &specific {
                log::debug!("No '{key}' constant; falling back to '{EFFICIENCY}'");
            }
            constants.require(EFFICIENCY)?
        }
    };
    Ok(if value > 1.0 { value / 100.0 } else { value })
}

/// Pairwise conversion factors between [`MatrixUnit`]s.
///
/// `get(from, to)` is the number of `to` units per `from` unit, so a
/// quantity in `from` is multiplied by it to express it in `to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionMatrix {
    factors: Array2<f64>,
}

impl Default for ConversionMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl ConversionMatrix {
    /// A matrix with every entry set to 1.
    pub fn identity() -> Self {
        let n = MatrixUnit::ALL.len();
        Self {
            factors: Array2::from_elem((n, n), 1.0),
        }
    }

    /// Builds the matrix from derived geometry.
    pub fn from_geometry(geometry: &CellGeometry) -> Self {
        use MatrixUnit::*;

        let mut matrix = Self::identity();
        let pairs = [
            (Kg, Cell, geometry.full_cell_kg),
            (Wafer, Cell, 1.0),
            (Kg, Wafer, geometry.full_cell_kg),
            (Module, Cell, 1.0 / geometry.cells_per_module),
            (Kg, Module, geometry.kg_per_module),
            (Wp, Cell, geometry.counted_cell_wp),
            (Wp, Wafer, geometry.full_cell_wp),
            (Wp, Module, geometry.wp_per_module),
            (Wp, Kg, geometry.full_cell_wp / geometry.full_cell_kg),
        ];
        for (from, to, factor) in pairs {
            matrix.set_pair(from, to, factor);
        }
        matrix
    }

    /// Sets `from -> to` to `factor` and `to -> from` to its reciprocal.
    pub fn set_pair(&mut self, from: MatrixUnit, to: MatrixUnit, factor: f64) {
        self.factors[[from.index(), to.index()]] = factor;
        self.factors[[to.index(), from.index()]] = 1.0 / factor;
    }

    pub fn get(&self, from: MatrixUnit, to: MatrixUnit) -> f64 {
        self.factors[[from.index(), to.index()]]
    }

    /// Factor between two unit labels.
    pub fn factor(&self, from: &str, to: &str) -> PvResult<f64> {
        Ok(self.get(from.parse()?, to.parse()?))
    }

    /// Expresses `value` (in `from`) in `to`.
    pub fn convert_value(&self, value: f64, from: &str, to: &str) -> PvResult<f64> {
        Ok(value * self.factor(from, to)?)
    }

    pub fn units(&self) -> &'static [MatrixUnit] {
        &MatrixUnit::ALL
    }

    /// The raw factors, rows and columns in [`MatrixUnit::ALL`] order.
    pub fn as_array(&self) -> &Array2<f64> {
        &self.factors
    }
}

impl fmt::Display for ConversionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}", "")?;
        for unit in MatrixUnit::ALL {
            write!(f, "{:>14}", unit.label())?;
        }
        writeln!(f)?;
        for from in MatrixUnit::ALL {
            write!(f, "{:>8}", from.label())?;
            for to in MatrixUnit::ALL {
                write!(f, "{:>14.6e}", self.get(from, to))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Builds the conversion matrix for one year's constants.
///
/// # Errors
///
/// [`PvError::MissingField`] when `efficiency`, `kg_per_cell`,
/// `cell_active_area` or `cell_to_module_ratio` is absent.
pub fn build_matrix(constants: &ConstantSet) -> PvResult<ConversionMatrix> {
    build_matrix_for(constants, None)
}

/// As [`build_matrix`], preferring `efficiency_<technology>` when present.
pub fn build_matrix_for(
    constants: &ConstantSet,
    technology: Option<&str>,
) -> PvResult<ConversionMatrix> {
    let geometry = CellGeometry::from_constants_for(constants, technology)?;
    log::debug!(
        "Module geometry: half_cell={} full_cell_wp={:.4} wp_per_module={:.2} kg_per_module={:.4}",
        geometry.half_cell,
        geometry.full_cell_wp,
        geometry.wp_per_module,
        geometry.kg_per_module
    );
    Ok(ConversionMatrix::from_geometry(&geometry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::MatrixUnit::*;
    use approx::assert_relative_eq;

    fn half_cell_constants() -> ConstantSet {
        [
            (CELL_ACTIVE_AREA, 0.026),
            (EFFICIENCY, 0.223),
            (KG_PER_CELL, 0.01),
            (CELL_TO_MODULE_RATIO, 0.98),
            (CELLS_PER_MODULE, 120.0),
        ]
        .into_iter()
        .collect()
    }

    fn full_cell_constants() -> ConstantSet {
        [
            (CELL_ACTIVE_AREA, 0.0244),
            (EFFICIENCY, 0.215),
            (KG_PER_CELL, 0.012),
            (CELL_TO_MODULE_RATIO, 0.97),
            (CELLS_PER_MODULE, 60.0),
        ]
        .into_iter()
        .collect()
    }

    const POPULATED: [(MatrixUnit, MatrixUnit); 9] = [
        (Kg, Cell),
        (Wafer, Cell),
        (Kg, Wafer),
        (Module, Cell),
        (Kg, Module),
        (Wp, Cell),
        (Wp, Wafer),
        (Wp, Module),
        (Wp, Kg),
    ];

    #[test]
    fn test_worked_half_cell_example() {
        let geometry = CellGeometry::from_constants(&half_cell_constants()).unwrap();
        assert!(geometry.half_cell);
        assert_eq!(geometry.full_cells_in_module, 60.0);
        assert_relative_eq!(geometry.full_cell_wp, 0.052 * 0.223 * 1000.0, epsilon = 1e-9);
        assert_relative_eq!(geometry.full_cell_wp, 11.596, epsilon = 1e-9);
        assert_relative_eq!(geometry.counted_cell_wp, 5.798, epsilon = 1e-9);
        assert_relative_eq!(geometry.kg_per_module, 1.2, epsilon = 1e-12);
        assert_relative_eq!(geometry.wp_per_module, 11.596 * 60.0 * 0.98, epsilon = 1e-9);
        assert_relative_eq!(geometry.wp_per_module, 681.8, epsilon = 0.1);

        let matrix = build_matrix(&half_cell_constants()).unwrap();
        assert_relative_eq!(matrix.get(Wp, Cell), 5.798, epsilon = 1e-9);
        assert_relative_eq!(matrix.get(Wp, Wafer), 11.596, epsilon = 1e-9);
        assert_relative_eq!(matrix.get(Kg, Module), 1.2, epsilon = 1e-12);
        assert_relative_eq!(matrix.get(Module, Cell), 1.0 / 120.0, epsilon = 1e-15);
        assert_relative_eq!(matrix.get(Cell, Module), 120.0, epsilon = 1e-9);
        assert_relative_eq!(matrix.get(Kg, Cell), 0.02, epsilon = 1e-15);
        assert_relative_eq!(matrix.get(Wp, Kg), 11.596 / 0.02, epsilon = 1e-6);
    }

    #[test]
    fn test_full_cell_module() {
        let geometry = CellGeometry::from_constants(&full_cell_constants()).unwrap();
        assert!(!geometry.half_cell);
        assert_eq!(geometry.full_cells_in_module, 60.0);
        assert_eq!(geometry.counted_cell_wp, geometry.full_cell_wp);
        assert_eq!(geometry.full_cell_kg, 0.012);
        assert_eq!(geometry.full_cell_area, 0.0244);
    }

    #[test]
    fn test_diagonal_is_one() {
        for constants in [half_cell_constants(), full_cell_constants()] {
            let matrix = build_matrix(&constants).unwrap();
            for unit in MatrixUnit::ALL {
                assert_eq!(matrix.get(unit, unit), 1.0, "diagonal for {unit}");
            }
        }
    }

    #[test]
    fn test_populated_pairs_are_reciprocal() {
        let matrix = build_matrix(&half_cell_constants()).unwrap();
        for (i, j) in POPULATED {
            assert_relative_eq!(matrix.get(i, j) * matrix.get(j, i), 1.0, epsilon = 1e-12);
        }
        assert_eq!(matrix.get(Wafer, Cell), 1.0);
        assert_eq!(matrix.get(Cell, Wafer), 1.0);
    }

    #[test]
    fn test_unlisted_pairs_default_to_one() {
        let matrix = build_matrix(&half_cell_constants()).unwrap();
        assert_eq!(matrix.get(Wafer, Module), 1.0);
        assert_eq!(matrix.get(Module, Wafer), 1.0);
    }

    #[test]
    fn test_cells_per_module_default() {
        let mut constants = full_cell_constants();
        let without: ConstantSet = constants
            .iter()
            .filter(|(k, _)| *k != CELLS_PER_MODULE)
            .collect();
        let geometry = CellGeometry::from_constants(&without).unwrap();
        assert_eq!(geometry.cells_per_module, 60.0);
        assert!(!geometry.half_cell);

        constants.insert(CELLS_PER_MODULE, 144.0);
        let geometry = CellGeometry::from_constants(&constants).unwrap();
        assert!(geometry.half_cell);
        assert_eq!(geometry.full_cells_in_module, 72.0);
    }

    #[test]
    fn test_percentage_efficiency() {
        let mut constants = half_cell_constants();
        constants.insert(EFFICIENCY, 22.3);
        let geometry = CellGeometry::from_constants(&constants).unwrap();
        assert_relative_eq!(geometry.efficiency, 0.223, epsilon = 1e-12);
        assert_relative_eq!(geometry.full_cell_wp, 11.596, epsilon = 1e-9);
    }

    #[test]
    fn test_technology_specific_efficiency() {
        let mut constants = half_cell_constants();
        constants.insert("efficiency_bi", 24.0);
        let geometry = CellGeometry::from_constants_for(&constants, Some("bi")).unwrap();
        assert_relative_eq!(geometry.efficiency, 0.24, epsilon = 1e-12);

        let geometry =
            CellGeometry::from_constants_for(&constants, Some("efficiency_bi")).unwrap();
        assert_relative_eq!(geometry.efficiency, 0.24, epsilon = 1e-12);

        // Falls back to the generic key
        let geometry = CellGeometry::from_constants_for(&constants, Some("mono")).unwrap();
        assert_relative_eq!(geometry.efficiency, 0.223, epsilon = 1e-12);
    }

    #[test]
    fn test_technology_efficiency_without_generic_key() {
        let constants: ConstantSet = half_cell_constants()
            .iter()
            .filter(|(k, _)| *k != EFFICIENCY)
            .chain([("efficiency_mono", 0.22)])
            .collect();
        let matrix = build_matrix_for(&constants, Some("mono")).unwrap();
        assert_relative_eq!(matrix.get(Wp, Wafer), 0.052 * 0.22 * 1000.0, epsilon = 1e-9);

        assert!(matches!(
            build_matrix(&constants),
            Err(PvError::MissingField(ref f)) if f == EFFICIENCY
        ));
    }

    #[test]
    fn test_missing_fields() {
        for missing in [KG_PER_CELL, CELL_ACTIVE_AREA, CELL_TO_MODULE_RATIO, EFFICIENCY] {
            let constants: ConstantSet = half_cell_constants()
                .iter()
                .filter(|(k, _)| *k != missing)
                .collect();
            match build_matrix(&constants) {
                Err(PvError::MissingField(field)) => assert_eq!(field, missing),
                other => panic!("expected MissingField({missing}), got {other:?}"),
            }
        }
    }

    #[test]
    fn test_factor_by_label() {
        let matrix = build_matrix(&half_cell_constants()).unwrap();
        assert_relative_eq!(
            matrix.factor(" cell ", "module").unwrap(),
            120.0,
            epsilon = 1e-9
        );
        assert!(matches!(
            matrix.factor("kg", "tonne"),
            Err(PvError::UnknownUnit(ref u)) if u == "tonne"
        ));
        assert!(matrix.factor("wp", "kg").is_err());
        assert_relative_eq!(
            matrix.convert_value(2.0, "module", "Wp").unwrap(),
            2.0 * matrix.get(Module, Wp),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_serde_labels() {
        assert_eq!(serde_json::to_string(&Wp).unwrap(), "\"Wp\"");
        let unit: MatrixUnit = serde_json::from_str("\"wafer\"").unwrap();
        assert_eq!(unit, Wafer);
    }

    #[test]
    fn test_display_lists_units() {
        let rendered = build_matrix(&full_cell_constants()).unwrap().to_string();
        for unit in MatrixUnit::ALL {
            assert!(rendered.contains(unit.label()));
        }
        assert_eq!(rendered.lines().count(), 6);
    }
}
