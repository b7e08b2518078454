//! Python bindings.
//!
//! ```python
//! from pvconv._lib import ConversionMatrix, CostRow, convert_rows
//!
//! matrix = ConversionMatrix.build(
//!     {"kg_per_cell": 0.01, "cell_active_area": 0.026, "efficiency": 22.3,
//!      "cell_to_module_ratio": 0.98, "cells_per_module": 120},
//! )
//! rows = convert_rows([CostRow(0.25, unit="cell")], "Wp", matrix)
//! matrix.to_numpy()  # 5x5, ordered as matrix.units
//! ```

use numpy::{PyArray2, ToPyArray};
use pvconv_core::config::PipelineConfig;
use pvconv_core::constants::ConstantSet;
use pvconv_core::errors::PvError;
use pvconv_core::io::read_conversion_constants;
use pvconv_core::matrix::{build_matrix_for, ConversionMatrix};
use pvconv_core::normalize;
use pvconv_core::pipeline;
use pvconv_core::rows::{self, CostRow};
use pyo3::create_exception;
use pyo3::exceptions::{PyIOError, PyKeyError, PyLookupError, PyValueError};
use pyo3::prelude::*;
use std::collections::{BTreeMap, HashMap};

create_exception!(_lib, NotFoundError, PyLookupError);
create_exception!(_lib, MissingFieldError, PyKeyError);
create_exception!(_lib, UnknownUnitError, PyValueError);

fn to_py_err(err: PvError) -> PyErr {
    let message = err.to_string();
    match err {
        PvError::NotFound { .. } => NotFoundError::new_err(message),
        PvError::MissingField(_) => MissingFieldError::new_err(message),
        PvError::UnknownUnit(_) => UnknownUnitError::new_err(message),
        PvError::Io(_) => PyIOError::new_err(message),
        _ => PyValueError::new_err(message),
    }
}

/// Pairwise conversion factors between kg, wafer, cell, module and Wp.
#[pyclass(name = "ConversionMatrix")]
#[derive(Clone)]
pub struct PyConversionMatrix(pub ConversionMatrix);

#[pymethods]
impl PyConversionMatrix {
    /// Build the matrix from a mapping of module constants.
    #[staticmethod]
    #[pyo3(signature = (constants, technology=None))]
    fn build(constants: HashMap<String, f64>, technology: Option<String>) -> PyResult<Self> {
        let constants: ConstantSet = constants.into_iter().collect();
        build_matrix_for(&constants, technology.as_deref())
            .map(Self)
            .map_err(to_py_err)
    }

    /// Build the matrix for `year` from the files named in a TOML config.
    #[staticmethod]
    fn from_config(path: String, year: i64) -> PyResult<Self> {
        let config = PipelineConfig::from_path(path)
            .map_err(to_py_err)?
            .with_env_panel();
        pipeline::normalised_build_conversion_matrix(year, &config)
            .map(Self)
            .map_err(to_py_err)
    }

    /// Unit labels, in row and column order.
    #[getter]
    fn units(&self) -> Vec<&'static str> {
        self.0.units().iter().map(|u| u.label()).collect()
    }

    /// Factor converting a quantity in `from_unit` to `to_unit`.
    fn factor(&self, from_unit: String, to_unit: String) -> PyResult<f64> {
        self.0.factor(&from_unit, &to_unit).map_err(to_py_err)
    }

    fn convert(&self, value: f64, from_unit: String, to_unit: String) -> PyResult<f64> {
        self.0
            .convert_value(value, &from_unit, &to_unit)
            .map_err(to_py_err)
    }

    fn to_numpy<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        self.0.as_array().to_pyarray_bound(py)
    }

    fn __repr__(&self) -> String {
        self.0.to_string()
    }
}

/// A cost value with optional bounds and unit.
#[pyclass(name = "CostRow")]
#[derive(Clone)]
pub struct PyCostRow(pub CostRow);

#[pymethods]
impl PyCostRow {
    #[new]
    #[pyo3(signature = (value, min=None, max=None, unit=None))]
    fn new(value: f64, min: Option<f64>, max: Option<f64>, unit: Option<String>) -> Self {
        let mut row = CostRow::new(value).with_bounds(min, max);
        row.unit = unit;
        Self(row)
    }

    #[getter]
    fn value(&self) -> f64 {
        self.0.value
    }

    #[getter]
    fn min(&self) -> Option<f64> {
        self.0.min
    }

    #[getter]
    fn max(&self) -> Option<f64> {
        self.0.max
    }

    #[getter]
    fn unit(&self) -> Option<String> {
        self.0.unit.clone()
    }

    fn __repr__(&self) -> String {
        format!(
            "CostRow(value={}, min={:?}, max={:?}, unit={:?})",
            self.0.value, self.0.min, self.0.max, self.0.unit
        )
    }
}

/// Look up the module constants for `year`.
#[pyfunction]
#[pyo3(signature = (path, year, solar_panel=None))]
fn lookup_constants(
    path: String,
    year: i64,
    solar_panel: Option<String>,
) -> PyResult<BTreeMap<String, f64>> {
    read_conversion_constants(path, year, solar_panel.as_deref())
        .map(Into::into)
        .map_err(to_py_err)
}

/// Convert a rate quoted per `unit` to a rate per kg, m^2 or Wp.
#[pyfunction]
#[pyo3(signature = (value, unit=None))]
fn normalize_rate(value: f64, unit: Option<String>) -> f64 {
    normalize::normalize_rate(value, unit.as_deref())
}

/// Rescale module constants according to `unit_hints`.
#[pyfunction]
fn normalize_parameters(
    constants: HashMap<String, f64>,
    unit_hints: BTreeMap<String, String>,
) -> BTreeMap<String, f64> {
    let constants: ConstantSet = constants.into_iter().collect();
    normalize::normalize_parameters(&constants, &unit_hints).into()
}

/// Express `rows` in `target_unit`.
#[pyfunction]
fn convert_rows(
    rows: Vec<PyCostRow>,
    target_unit: String,
    matrix: PyRef<'_, PyConversionMatrix>,
) -> PyResult<Vec<PyCostRow>> {
    let input: Vec<CostRow> = rows.into_iter().map(|r| r.0).collect();
    rows::convert_rows(&input, &target_unit, &matrix.0)
        .map(|out| out.into_iter().map(PyCostRow).collect())
        .map_err(to_py_err)
}

#[pymodule]
#[pyo3(name = "_lib")]
fn pvconv(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add_class::<PyConversionMatrix>()?;
    m.add_class::<PyCostRow>()?;
    m.add_function(wrap_pyfunction!(lookup_constants, m)?)?;
    m.add_function(wrap_pyfunction!(normalize_rate, m)?)?;
    m.add_function(wrap_pyfunction!(normalize_parameters, m)?)?;
    m.add_function(wrap_pyfunction!(convert_rows, m)?)?;
    m.add("NotFoundError", m.py().get_type_bound::<NotFoundError>())?;
    m.add("MissingFieldError", m.py().get_type_bound::<MissingFieldError>())?;
    m.add("UnknownUnitError", m.py().get_type_bound::<UnknownUnitError>())?;
    Ok(())
}
