#![warn(clippy::all)]
//! Algorithms of the scan classification pipeline.
//!
//! Everything here works on in-memory [PointClouds](scan2bim_core::PointCloud) and
//! [FeatureTables](scan2bim_core::FeatureTable); reading and writing files is the job of `scan2bim-io`.

// Kd-tree over point positions for radius and nearest neighbour queries.
pub mod spatial_index;
// Contains methods to compute various structure measures using the structure tensor, and the per-point feature table
// built from them.
pub mod structure_measures;
// Voxel grid downsampling with an explicit point to voxel mapping.
pub mod voxel_grid;
// Random forest classifier, stratified cross-validation and the evaluation report.
pub mod classification;
// Classification of voxel feature tables and upsampling of voxel labels to full resolution.
pub mod prediction;
// Deterministic correction rules based on height and proximity.
pub mod correction;
