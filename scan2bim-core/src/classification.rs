use std::convert::TryFrom;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Semantic class of a point. The discriminants are the classification codes stored in LAS files and in the
/// `label` column of feature tables. `Unclassified` is never a valid training target.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Label {
    #[default]
    Unclassified = 0,
    Floor = 2,
    Column = 4,
    Wall = 6,
    Ceiling = 10,
}

impl Label {
    /// All labels of the taxonomy, ordered by classification code
    pub const ALL: [Label; 5] = [
        Label::Unclassified,
        Label::Floor,
        Label::Column,
        Label::Wall,
        Label::Ceiling,
    ];

    /// The classification code of this label
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Looks up the label for the given classification code. Returns `None` for codes outside of the taxonomy
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|label| label.code() == code)
    }

    /// Human-readable name of this label
    pub fn name(self) -> &'static str {
        match self {
            Label::Unclassified => "unclassified",
            Label::Floor => "floor",
            Label::Column => "column",
            Label::Wall => "wall",
            Label::Ceiling => "ceiling",
        }
    }

    /// Can a point with this label be used to train a classifier?
    pub fn is_training_target(self) -> bool {
        self != Label::Unclassified
    }
}

impl TryFrom<u8> for Label {
    type Error = PipelineError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Label::from_code(code).ok_or(PipelineError::InvalidLabel(code))
    }
}

impl From<Label> for u8 {
    fn from(label: Label) -> Self {
        label.code()
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for label in Label::ALL.iter() {
            assert_eq!(Some(*label), Label::from_code(label.code()));
            assert_eq!(*label, Label::try_from(u8::from(*label)).unwrap());
        }
    }

    #[test]
    fn test_unknown_code_is_rejected() {
        assert_eq!(None, Label::from_code(1));
        assert!(matches!(
            Label::try_from(7),
            Err(PipelineError::InvalidLabel(7))
        ));
    }

    #[test]
    fn test_unclassified_is_not_a_training_target() {
        assert!(!Label::Unclassified.is_training_target());
        assert!(Label::Floor.is_training_target());
        assert!(Label::Ceiling.is_training_target());
    }
}
