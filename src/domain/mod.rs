//! Domain types used throughout the crate.
//!
//! This module defines:
//!
//! - grid building blocks (`ParameterAxis`, `EnergyBin`, `Overrides`)
//! - outputs (`Curve` with `DisplayHints`, `LightCurve`)

pub mod types;

pub use types::*;
