//! Configuration, stages and command line handling shared by the scan2bim binaries

pub mod cli;
pub mod config;
pub mod stages;
