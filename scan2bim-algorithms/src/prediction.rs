use std::fmt::Display;

use rayon::prelude::*;
use scan2bim_core::{nalgebra::Vector3, FeatureTable, Label, PipelineError};
use serde::{Deserialize, Serialize};

use crate::{classification::TrainedModel, spatial_index::SpatialIndex};

/// Value that replaces undefined and missing feature values at inference time
pub const NEUTRAL_FEATURE_VALUE: f64 = 0.0;

/// How to handle a feature table whose columns only partially overlap the features a model was trained on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaPolicy {
    /// Predict on the shared columns, model features missing from the table are set to [NEUTRAL_FEATURE_VALUE]. The
    /// classification quality of a model fed with neutral values is not validated.
    Lenient,
    /// Every model feature must be present in the table
    Strict,
}

impl Default for SchemaPolicy {
    fn default() -> Self {
        SchemaPolicy::Lenient
    }
}

impl Display for SchemaPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaPolicy::Lenient => write!(f, "lenient"),
            SchemaPolicy::Strict => write!(f, "strict"),
        }
    }
}

impl std::str::FromStr for SchemaPolicy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lenient" => Ok(SchemaPolicy::Lenient),
            "strict" => Ok(SchemaPolicy::Strict),
            other => Err(PipelineError::configuration(format!(
                "unknown schema policy '{}', expected 'lenient' or 'strict'",
                other
            ))),
        }
    }
}

/// Result of matching the columns of a feature table against the features of a model
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaAlignment {
    /// Model features present in the table, in model order
    pub shared: Vec<String>,
    /// Model features absent from the table
    pub missing: Vec<String>,
    /// Table columns the model does not know
    pub ignored: Vec<String>,
}

/// Compares the columns of a feature table with the features of a model
///
/// # Errors
///
/// - [PipelineError::DisjointSchema] if the two share no column
/// - [PipelineError::IncompleteSchema] if `policy` is [SchemaPolicy::Strict] and a model feature is missing
pub fn align_schema(
    table_columns: &[String],
    model_features: &[String],
    policy: SchemaPolicy,
) -> Result<SchemaAlignment, PipelineError> {
    let (shared, missing): (Vec<String>, Vec<String>) = model_features
        .iter()
        .cloned()
        .partition(|feature| table_columns.contains(feature));
    let ignored = table_columns
        .iter()
        .filter(|column| !model_features.contains(column))
        .cloned()
        .collect::<Vec<_>>();

    if shared.is_empty() {
        return Err(PipelineError::DisjointSchema {
            table: table_columns.to_vec(),
            model: model_features.to_vec(),
        });
    }
    if policy == SchemaPolicy::Strict && !missing.is_empty() {
        return Err(PipelineError::IncompleteSchema { missing });
    }
    Ok(SchemaAlignment {
        shared,
        missing,
        ignored,
    })
}

/// Counts of the soft failures compensated during prediction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredictionDiagnostics {
    pub alignment: SchemaAlignment,
    /// Number of undefined cells that were replaced with [NEUTRAL_FEATURE_VALUE]
    pub filled_cells: usize,
}

/// Classifies every row of `table` with `model`. The table is aligned to the model features first: extra columns are
/// dropped, missing model features are filled with [NEUTRAL_FEATURE_VALUE] if `policy` allows it. Undefined values are
/// filled with [NEUTRAL_FEATURE_VALUE] too; no row is ever dropped, so the result holds exactly one label per row of
/// `table`.
///
/// # Errors
///
/// If the table columns are incompatible with the model features under `policy`, see [align_schema]
pub fn predict_voxels(
    table: &FeatureTable,
    model: &TrainedModel,
    policy: SchemaPolicy,
) -> Result<(Vec<Label>, PredictionDiagnostics), PipelineError> {
    let alignment = align_schema(table.columns(), model.feature_names(), policy)?;
    if !alignment.missing.is_empty() {
        log::warn!(
            "Model features {:?} are missing from the feature table and are set to {}",
            alignment.missing,
            NEUTRAL_FEATURE_VALUE
        );
    }
    if !alignment.ignored.is_empty() {
        log::warn!(
            "Feature columns {:?} are unknown to the model and are ignored",
            alignment.ignored
        );
    }

    let mut aligned = FeatureTable::from_values(
        model.feature_names().to_vec(),
        aligned_values(table, model.feature_names()),
        None,
    )?;
    let filled_cells = aligned.fill_undefined(NEUTRAL_FEATURE_VALUE);
    if filled_cells > 0 {
        log::warn!(
            "Filled {} undefined feature values with {}",
            filled_cells,
            NEUTRAL_FEATURE_VALUE
        );
    }

    let labels = model.predict(&aligned)?;
    Ok((
        labels,
        PredictionDiagnostics {
            alignment,
            filled_cells,
        },
    ))
}

/// Row-major values of `table` rearranged into the order of `features`. Features that `table` does not have are set
/// to [NEUTRAL_FEATURE_VALUE]
fn aligned_values(table: &FeatureTable, features: &[String]) -> Vec<f64> {
    let sources = features
        .iter()
        .map(|feature| table.column_index(feature))
        .collect::<Vec<_>>();
    table
        .rows()
        .flat_map(|row| {
            sources
                .iter()
                .map(move |source| source.map(|idx| row[idx]).unwrap_or(NEUTRAL_FEATURE_VALUE))
        })
        .collect()
}

/// Transfers labels from voxel representatives back to full resolution. Every position in `full_positions` receives
/// the label of its nearest representative in `voxel_positions`; equidistant representatives resolve the same way on
/// every run. Positions are processed in parallel.
///
/// # Errors
///
/// If `voxel_labels` does not hold one label per representative, or there are no representatives but positions to
/// label
pub fn upsample(
    voxel_positions: &[Vector3<f64>],
    voxel_labels: &[Label],
    full_positions: &[Vector3<f64>],
) -> Result<Vec<Label>, PipelineError> {
    if voxel_positions.len() != voxel_labels.len() {
        return Err(PipelineError::LengthMismatch {
            what: "voxel labels",
            expected: voxel_positions.len(),
            actual: voxel_labels.len(),
        });
    }
    if voxel_positions.is_empty() && !full_positions.is_empty() {
        return Err(PipelineError::configuration(
            "cannot upsample labels without any voxel representatives",
        ));
    }

    let index = SpatialIndex::build(voxel_positions);
    full_positions
        .par_iter()
        .map(|position| {
            index
                .nearest(position)
                .map(|neighbour| voxel_labels[neighbour.index])
                .ok_or_else(|| {
                    PipelineError::configuration("nearest voxel lookup on an empty index")
                })
        })
        .collect()
}
