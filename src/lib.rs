//! Solar-module cost unit conversion.
//!
//! The Rust API lives in [`pvconv_core`] and is re-exported here. Building
//! with the `python` feature adds the `_lib` extension module.

pub use pvconv_core::*;

#[cfg(feature = "python")]
mod python;
