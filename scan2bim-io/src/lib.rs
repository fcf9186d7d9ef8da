#![warn(clippy::all)]

//! File I/O for the scan classification pipeline
//!
//! Point clouds are read from and written back to LAS/LAZ files, feature tables are persisted as CSV, trained models
//! and their evaluation reports as binary and JSON artifacts. Every writer in this crate creates its output next to the
//! final location and moves it into place only on success.

/// Model and report artifacts, input checks and atomic writes
pub mod artifacts;
/// Feature tables as CSV text
pub mod feature_csv;
/// Reading LAS/LAZ files and writing classifications back
pub mod las_io;

/// Re-export of the `las` crate, for building headers and points by hand
pub extern crate las as las_rs;
