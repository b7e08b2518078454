//! Reference-table loading and unit conversion for solar-module cost models.
//!
//! Costs in photovoltaic manufacturing are quoted per kilogram of silicon,
//! per wafer, per cell, per module or per watt-peak. This crate loads the
//! year-indexed reference tables, normalizes their units, and builds the
//! [`ConversionMatrix`](matrix::ConversionMatrix) that moves cost rows
//! between those bases.
//!
//! ```
//! use pvconv_core::constants::ConstantSet;
//! use pvconv_core::matrix::build_matrix;
//! use pvconv_core::rows::{convert_rows, CostRow};
//!
//! let constants: ConstantSet = [
//!     ("kg_per_cell", 0.01),
//!     ("cell_active_area", 0.026),
//!     ("efficiency", 22.3),
//!     ("cell_to_module_ratio", 0.98),
//!     ("cells_per_module", 120.0),
//! ]
//! .into_iter()
//! .collect();
//!
//! let matrix = build_matrix(&constants).unwrap();
//! let rows = vec![CostRow::new(0.25).with_unit("cell")];
//! let per_wp = convert_rows(&rows, "Wp", &matrix).unwrap();
//! assert_eq!(per_wp[0].unit.as_deref(), Some("Wp"));
//! ```

pub mod config;
pub mod constants;
pub mod io;
pub mod matrix;
pub mod normalize;
pub mod pipeline;
pub mod rows;
pub mod table;

pub mod errors;
