//! `specgrid` library crate.
//!
//! The binary (`specgrid`) is a thin wrapper around this library so that:
//!
//! - grid lookup and GP regression are testable without spawning processes
//! - the reader and the regression helper are usable from other tools

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod gp;
pub mod grid;
pub mod io;
pub mod math;
pub mod report;
