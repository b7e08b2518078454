//! Pipeline configuration.
//!
//! Settings are plain data with defaults matching the usual `data/` layout,
//! so a TOML file only needs to list what differs:
//!
//! ```toml
//! solar_panel = "topcon"
//! technology = "bi"
//! cost_unit = "$/g"
//!
//! [parameter_units]
//! kg_per_cell = "g"
//! cell_active_area = "cm2"
//! efficiency = "%"
//! ```

use crate::errors::PvResult;
use crate::io::CostColumns;
use crate::normalize::CostUnitSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable naming the panel variant to select.
pub const SOLAR_PANEL_ENV: &str = "SOLAR_PANEL";

/// Settings for loading reference tables and building conversions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Solar module constants, one row per year.
    pub solar_module_data: PathBuf,
    /// Production step costs.
    pub production_step_data: PathBuf,
    /// Efficiency ranges.
    pub efficiency_data: PathBuf,

    /// Panel variant to select from the `solar_panel` column.
    pub solar_panel: Option<String>,
    /// Technology whose `efficiency_<technology>` constant is preferred.
    pub technology: Option<String>,

    /// Unit every cost row is quoted in, e.g. `$/g`.
    pub cost_unit: Option<String>,
    /// Take the unit of each cost row from its own unit column instead.
    /// Wins over `cost_unit`.
    pub unit_column: bool,
    /// Cost table column names.
    pub cost_columns: CostColumns,

    /// Units the module constants are stored in, keyed by constant name.
    pub parameter_units: BTreeMap<String, String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            solar_module_data: PathBuf::from("data/solar_module_data.csv"),
            production_step_data: PathBuf::from("data/production_step_data.csv"),
            efficiency_data: PathBuf::from("data/efficiency_data.csv"),
            solar_panel: None,
            technology: None,
            cost_unit: None,
            unit_column: false,
            cost_columns: CostColumns::default(),
            parameter_units: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(text: &str) -> PvResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> PvResult<Self> {
        let path = path.as_ref();
        log::debug!("Loading configuration from {}", path.display());
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Fills `solar_panel` from `SOLAR_PANEL` when it is not already set.
    pub fn with_env_panel(mut self) -> Self {
        if self.solar_panel.is_none() {
            self.solar_panel = std::env::var(SOLAR_PANEL_ENV)
                .ok()
                .filter(|p| !p.trim().is_empty());
        }
        self
    }

    /// How cost rows find their unit.
    pub fn cost_unit_source(&self) -> CostUnitSource {
        if self.unit_column {
            CostUnitSource::RowUnit
        } else if let Some(unit) = &self.cost_unit {
            CostUnitSource::Fixed(unit.clone())
        } else {
            CostUnitSource::Unspecified
        }
    }
}
