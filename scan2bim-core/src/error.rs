use std::path::PathBuf;

use thiserror::Error;

/// Fatal conditions that abort a pipeline stage. Soft failures (degenerate neighbourhoods, filled
/// feature cells, partially overlapping schemas) are compensated where they occur and only logged.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("required input artifact {} does not exist", path.display())]
    MissingArtifact { path: PathBuf },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("configuration error: feature columns {table:?} share no column with the model features {model:?}")]
    DisjointSchema {
        table: Vec<String>,
        model: Vec<String>,
    },
    #[error("configuration error: model features {missing:?} are missing from the feature table")]
    IncompleteSchema { missing: Vec<String> },
    #[error("configuration error: no training rows left after excluding unclassified and undefined rows")]
    EmptyTrainingSet,
    #[error("classification code {0} is not part of the label taxonomy")]
    InvalidLabel(u8),
    #[error("expected {expected} {what}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl PipelineError {
    /// Shorthand for a [PipelineError::Configuration] error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns `true` for every error that the configuration of a stage (rather than its input data) has to fix
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::DisjointSchema { .. }
                | Self::IncompleteSchema { .. }
                | Self::EmptyTrainingSet
        )
    }
}
