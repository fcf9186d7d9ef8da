#![warn(clippy::all)]

//! Core data structures for classifying building interior scans
//!
//! scan2bim turns a raw point cloud of a building interior into a per-point classification (floor, ceiling,
//! wall, column). This crate holds the types shared by all stages of that pipeline: the closed [Label](crate::classification::Label)
//! taxonomy, the [PointCloud](crate::cloud::PointCloud) container, the [FeatureTable](crate::features::FeatureTable)
//! together with its column contract, and the [PipelineError](crate::error::PipelineError) taxonomy.

pub extern crate nalgebra;

/// The closed classification taxonomy
pub mod classification;
/// Point and point cloud containers
pub mod cloud;
/// Error taxonomy shared by all pipeline stages
pub mod error;
/// Per-point feature vectors and the feature-name contract
pub mod features;
/// Useful mathematical tools when working with point cloud data
pub mod math;

pub use self::classification::Label;
pub use self::cloud::{Point, PointCloud};
pub use self::error::PipelineError;
pub use self::features::FeatureTable;
