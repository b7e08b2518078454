//! Lookup, normalization and conversion composed end to end.
//!
//! Normalized constants are handed straight to the matrix builder; nothing
//! is written back to disk between the steps.

use crate::config::PipelineConfig;
use crate::constants::{lookup, ConstantSet};
use crate::errors::PvResult;
use crate::io::cost_rows;
use crate::matrix::{build_matrix_for, ConversionMatrix};
use crate::normalize::{normalize_cost_rows, normalize_parameters};
use crate::rows::{convert_rows, CostRow};
use crate::table::Table;

/// Looks up `year` and normalizes the constants per `config.parameter_units`.
pub fn normalised_constants(
    module_table: &Table,
    year: i64,
    config: &PipelineConfig,
) -> PvResult<ConstantSet> {
    let constants = lookup(module_table, year, config.solar_panel.as_deref())?;
    Ok(normalize_parameters(&constants, &config.parameter_units))
}

/// Builds the conversion matrix for `year` from an in-memory module table.
pub fn build_normalised_matrix(
    module_table: &Table,
    year: i64,
    config: &PipelineConfig,
) -> PvResult<ConversionMatrix> {
    let constants = normalised_constants(module_table, year, config)?;
    build_matrix_for(&constants, config.technology.as_deref())
}

/// Cost rows for `year` at standard rates.
pub fn normalised_cost_rows(
    step_table: &Table,
    year: i64,
    config: &PipelineConfig,
) -> PvResult<Vec<CostRow>> {
    let rows = cost_rows(step_table, Some(year), &config.cost_columns)?;
    Ok(normalize_cost_rows(&rows, &config.cost_unit_source()))
}

/// Cost rows for `year`, normalized and then expressed in `target_unit`.
pub fn costs_in_unit(
    module_table: &Table,
    step_table: &Table,
    year: i64,
    target_unit: &str,
    config: &PipelineConfig,
) -> PvResult<Vec<CostRow>> {
    let matrix = build_normalised_matrix(module_table, year, config)?;
    let rows = normalised_cost_rows(step_table, year, config)?;
    convert_rows(&rows, target_unit, &matrix)
}

/// Reads `config.solar_module_data` and builds the matrix for `year`.
pub fn normalised_build_conversion_matrix(
    year: i64,
    config: &PipelineConfig,
) -> PvResult<ConversionMatrix> {
    build_normalised_matrix(&Table::from_path(&config.solar_module_data)?, year, config)
}

/// Reads `config.production_step_data` and normalizes the rows for `year`.
pub fn normalised_read_production_steps(
    year: i64,
    config: &PipelineConfig,
) -> PvResult<Vec<CostRow>> {
    normalised_cost_rows(&Table::from_path(&config.production_step_data)?, year, config)
}
