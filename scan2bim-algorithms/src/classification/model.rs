use rayon::prelude::*;
use scan2bim_core::{FeatureTable, Label, PipelineError};
use serde::{Deserialize, Serialize};

use super::forest::RandomForest;

/// A fitted classifier together with the exact ordered list of feature names it was trained on and the labels its
/// class indices stand for. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    feature_names: Vec<String>,
    classes: Vec<Label>,
    forest: RandomForest,
}

impl TrainedModel {
    /// # Errors
    ///
    /// If the forest was fit on a different number of features or classes than given
    pub fn new(
        feature_names: Vec<String>,
        classes: Vec<Label>,
        forest: RandomForest,
    ) -> Result<Self, PipelineError> {
        if forest.num_features() != feature_names.len() {
            return Err(PipelineError::LengthMismatch {
                what: "feature names",
                expected: forest.num_features(),
                actual: feature_names.len(),
            });
        }
        if forest.num_classes() != classes.len() {
            return Err(PipelineError::LengthMismatch {
                what: "classes",
                expected: forest.num_classes(),
                actual: classes.len(),
            });
        }
        Ok(Self {
            feature_names,
            classes,
            forest,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Labels the model can predict, ordered by classification code
    pub fn classes(&self) -> &[Label] {
        &self.classes
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Classifies a single feature vector, given in the order of [feature_names](Self::feature_names)
    pub fn predict_row(&self, row: &[f64]) -> Label {
        self.classes[self.forest.predict(row)]
    }

    /// Classifies every row of `table` in parallel. The columns of `table` must match the model's feature names
    /// exactly, in the same order.
    ///
    /// # Errors
    ///
    /// If the table columns differ from the model's feature names
    pub fn predict(&self, table: &FeatureTable) -> Result<Vec<Label>, PipelineError> {
        if table.columns() != self.feature_names.as_slice() {
            return Err(PipelineError::configuration(format!(
                "feature columns {:?} do not match the model features {:?}",
                table.columns(),
                self.feature_names
            )));
        }
        Ok((0..table.len())
            .into_par_iter()
            .map(|row| self.predict_row(table.row(row)))
            .collect())
    }
}
