//! Geometric descriptors derived from the structure tensor of local point neighbourhoods. The definitions for the
//! structure measures are taken from the paper 'FEATURE RELEVANCE ASSESSMENT FOR THE SEMANTIC INTERPRETATION OF 3D POINT
//! CLOUD DATA' (Martin Weinmann, Boris Jutzi, Clément Mallet, ISPRS Annals of the Photogrammetry, Remote Sensing and
//! Spatial Information Sciences, Volume II-5/W2, 2013)
//!
//! The neighbourhood search radius is part of the contract between a trained model and the data it is applied to:
//! features for the training cloud and for every cloud that is classified later must be computed with the same
//! `radius`. A mismatch is not detected and silently degrades the classification.

use rayon::prelude::*;
use scan2bim_core::{
    features::{default_feature_columns, UNDEFINED},
    nalgebra::{linalg::SymmetricEigen, Matrix3, Vector3},
    FeatureTable, PipelineError, PointCloud,
};

use crate::spatial_index::SpatialIndex;

/// A neighbourhood needs at least this many points (the point itself included) for a meaningful structure tensor
pub const MIN_NEIGHBOURHOOD_SIZE: usize = 3;

/// Structure measures of a single point, in the same order as [GEOMETRIC_FEATURES](scan2bim_core::features::GEOMETRIC_FEATURES)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StructureMeasures {
    pub planarity: f64,
    pub linearity: f64,
    pub verticality: f64,
    pub sphericity: f64,
    pub omnivariance: f64,
}

impl StructureMeasures {
    pub fn to_array(&self) -> [f64; 5] {
        [
            self.planarity,
            self.linearity,
            self.verticality,
            self.sphericity,
            self.omnivariance,
        ]
    }
}

/// Calculates the structure measures of every position. The neighbourhood of a position is made up of all indexed
/// positions within Euclidean distance `radius`, which includes the position itself if `index` was built from
/// `positions`. Returns one entry per position in the same order; the entry is `None` if the neighbourhood holds
/// less than [MIN_NEIGHBOURHOOD_SIZE] points or its structure tensor vanishes.
///
/// Positions are processed in parallel.
pub fn compute_structure_measures(
    positions: &[Vector3<f64>],
    index: &SpatialIndex,
    radius: f64,
) -> Vec<Option<StructureMeasures>> {
    positions
        .par_iter()
        .map(|position| {
            let neighbours = index
                .within_radius(position, radius)
                .into_iter()
                .map(|idx| positions[idx])
                .collect::<Vec<_>>();
            structure_measures_of_neighbourhood(&neighbours)
        })
        .collect()
}

/// Computes the structure measures for a single neighbourhood. Returns `None` for degenerate neighbourhoods
pub fn structure_measures_of_neighbourhood(
    neighbourhood: &[Vector3<f64>],
) -> Option<StructureMeasures> {
    if neighbourhood.len() < MIN_NEIGHBOURHOOD_SIZE {
        return None;
    }

    // 1) covariance matrix of the neighbourhood
    // 2) eigenvalues sorted descending, normalized by their sum
    // 3) measures from the normalized eigenvalues, verticality from the eigenvector of the smallest one
    let centroid = calc_centroid(neighbourhood);
    let covariance_matrix = calc_covariance_matrix(&centroid, neighbourhood);
    let eigen = SymmetricEigen::new(covariance_matrix);

    let mut order = [0usize, 1, 2];
    order.sort_unstable_by(|a, b| {
        eigen.eigenvalues[*b]
            .partial_cmp(&eigen.eigenvalues[*a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    // Tiny negative eigenvalues are numerical noise of a positive semi-definite matrix
    let e1 = eigen.eigenvalues[order[0]].max(0.0);
    let e2 = eigen.eigenvalues[order[1]].max(0.0);
    let e3 = eigen.eigenvalues[order[2]].max(0.0);

    let sum_of_eigenvalues = e1 + e2 + e3;
    if !sum_of_eigenvalues.is_finite() || sum_of_eigenvalues <= f64::EPSILON {
        return None;
    }
    let e1_norm = e1 / sum_of_eigenvalues;
    let e2_norm = e2 / sum_of_eigenvalues;
    let e3_norm = e3 / sum_of_eigenvalues;

    let normal = eigen.eigenvectors.column(order[2]);

    Some(StructureMeasures {
        planarity: planarity(e1_norm, e2_norm, e3_norm),
        linearity: linearity(e1_norm, e2_norm, e3_norm),
        verticality: 1.0 - normal[2].abs().min(1.0),
        sphericity: sphericity(e1_norm, e2_norm, e3_norm),
        omnivariance: omnivariance(e1_norm, e2_norm, e3_norm),
    })
}

/// Computes the feature table of `cloud`: one row per point, in point order, with the columns given by
/// [default_feature_columns]. Points with a degenerate neighbourhood get [UNDEFINED] geometric descriptors but keep
/// their color and height values. The table carries no labels.
///
/// # Errors
///
/// If `radius` is not a positive number
pub fn compute_features(cloud: &PointCloud, radius: f64) -> Result<FeatureTable, PipelineError> {
    if !(radius > 0.0) || !radius.is_finite() {
        return Err(PipelineError::configuration(format!(
            "search radius must be positive, got {}",
            radius
        )));
    }
    let index = SpatialIndex::build(cloud.positions());
    let measures = compute_structure_measures(cloud.positions(), &index, radius);

    let min_z = cloud
        .positions()
        .iter()
        .map(|p| p.z)
        .fold(f64::INFINITY, f64::min);
    let columns = default_feature_columns();
    let mut values = Vec::with_capacity(cloud.len() * columns.len());
    for ((measure, color), position) in measures
        .iter()
        .zip(cloud.colors().iter())
        .zip(cloud.positions().iter())
    {
        match measure {
            Some(measure) => values.extend_from_slice(&measure.to_array()),
            None => values.extend_from_slice(&[UNDEFINED; 5]),
        }
        values.extend_from_slice(&[
            color.x as f64,
            color.y as f64,
            color.z as f64,
            position.z - min_z,
        ]);
    }
    FeatureTable::from_values(columns, values, None)
}

/// Like [compute_features], but attaches the labels of `cloud` to the table
pub fn compute_labeled_features(
    cloud: &PointCloud,
    radius: f64,
) -> Result<FeatureTable, PipelineError> {
    let mut table = compute_features(cloud, radius)?;
    table.set_labels(cloud.labels().to_vec())?;
    Ok(table)
}

fn linearity(e1_norm: f64, e2_norm: f64, _e3_norm: f64) -> f64 {
    (e1_norm - e2_norm) / e1_norm
}

fn planarity(e1_norm: f64, e2_norm: f64, e3_norm: f64) -> f64 {
    (e2_norm - e3_norm) / e1_norm
}

fn sphericity(e1_norm: f64, _e2_norm: f64, e3_norm: f64) -> f64 {
    e3_norm / e1_norm
}

fn omnivariance(e1_norm: f64, e2_norm: f64, e3_norm: f64) -> f64 {
    (e1_norm * e2_norm * e3_norm).powf(1.0 / 3.0)
}

fn calc_centroid(neighbourhood: &[Vector3<f64>]) -> Vector3<f64> {
    let sum: Vector3<f64> = neighbourhood.iter().sum();
    sum / (neighbourhood.len() as f64)
}

fn calc_covariance_matrix(centroid: &Vector3<f64>, neighbourhood: &[Vector3<f64>]) -> Matrix3<f64> {
    let unweighted_covariance_matrix: Matrix3<f64> = neighbourhood
        .iter()
        .map(|v| {
            let diff: Vector3<f64> = v - centroid;
            diff * diff.transpose()
        })
        .sum();
    unweighted_covariance_matrix / (neighbourhood.len() as f64)
}
