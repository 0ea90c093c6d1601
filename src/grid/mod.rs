//! Tabulated spectral model grids.
//!
//! - `index`: immutable `Grid`, `CurrentSelection`, nearest-value snapping
//!   and row-major flattening (`ParameterGridIndex`)
//! - `extract`: energy-bin lookup and row extraction (`SpectrumExtractor`)
//! - `source`: the `GridSource` backend seam
//! - `model`: `SpectralModel`, which ties the pieces together

pub mod extract;
pub mod index;
pub mod model;
pub mod source;

pub use extract::*;
pub use index::*;
pub use model::*;
pub use source::*;
