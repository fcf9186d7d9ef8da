use crate::{classification::Label, error::PipelineError};

/// Column name of the 'planarity' structure measure, `(l2 - l3) / l1`
pub const PLANARITY: &str = "planarity";
/// Column name of the 'linearity' structure measure, `(l1 - l2) / l1`
pub const LINEARITY: &str = "linearity";
/// Column name of the 'verticality' measure, `1 - |n_z|` with `n` being the local surface normal
pub const VERTICALITY: &str = "verticality";
/// Column name of the 'sphericity' structure measure, `l3 / l1`
pub const SPHERICITY: &str = "sphericity";
/// Column name of the 'omnivariance' structure measure, `(l1 * l2 * l3)^1/3`
pub const OMNIVARIANCE: &str = "omnivariance";
pub const RED: &str = "red";
pub const GREEN: &str = "green";
pub const BLUE: &str = "blue";
/// Column name of the height above the lowest point of the cloud
pub const Z_NORM: &str = "z_norm";
/// Name of the label column in persisted training tables. Never a feature column
pub const LABEL_COLUMN: &str = "label";

/// The geometric descriptors in the order in which they are stored in every feature table
pub const GEOMETRIC_FEATURES: [&str; 5] = [PLANARITY, LINEARITY, VERTICALITY, SPHERICITY, OMNIVARIANCE];
pub const COLOR_FEATURES: [&str; 3] = [RED, GREEN, BLUE];

/// Sentinel for a feature value that could not be computed (e.g. because the neighbourhood of a point was too
/// small). Undefined values are not zero: rows containing them are dropped for training and filled for inference.
pub const UNDEFINED: f64 = f64::NAN;

/// Is `value` the [UNDEFINED] sentinel?
pub fn is_undefined(value: f64) -> bool {
    value.is_nan()
}

/// The full ordered feature contract: geometric descriptors, color channels, normalized height
pub fn default_feature_columns() -> Vec<String> {
    GEOMETRIC_FEATURES
        .iter()
        .chain(COLOR_FEATURES.iter())
        .chain(std::iter::once(&Z_NORM))
        .map(|name| name.to_string())
        .collect()
}

/// Table of feature vectors, one row per point or voxel, aligned by index with the cloud it was computed from.
/// Values are stored row-major. Training tables additionally carry one [Label] per row.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    values: Vec<f64>,
    num_rows: usize,
    labels: Option<Vec<Label>>,
}

impl FeatureTable {
    /// Creates an empty table without label column
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            values: vec![],
            num_rows: 0,
            labels: None,
        }
    }

    /// Creates an empty table with a label column
    pub fn new_labeled(columns: Vec<String>) -> Self {
        Self {
            labels: Some(vec![]),
            ..Self::new(columns)
        }
    }

    /// Creates a table from row-major `values`
    ///
    /// # Errors
    ///
    /// If `values` is not a whole number of rows, or `labels` does not hold one label per row
    pub fn from_values(
        columns: Vec<String>,
        values: Vec<f64>,
        labels: Option<Vec<Label>>,
    ) -> Result<Self, PipelineError> {
        if columns.is_empty() {
            return Err(PipelineError::configuration(
                "a feature table needs at least one column",
            ));
        }
        if values.len() % columns.len() != 0 {
            return Err(PipelineError::LengthMismatch {
                what: "values (multiple of the column count)",
                expected: (values.len() / columns.len() + 1) * columns.len(),
                actual: values.len(),
            });
        }
        let num_rows = values.len() / columns.len();
        if let Some(labels) = &labels {
            if labels.len() != num_rows {
                return Err(PipelineError::LengthMismatch {
                    what: "labels",
                    expected: num_rows,
                    actual: labels.len(),
                });
            }
        }
        Ok(Self {
            columns,
            values,
            num_rows,
            labels,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.num_rows
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// Index of the column with the given `name`
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Appends a row to an unlabeled table
    ///
    /// # Errors
    ///
    /// If the arity of `row` does not match the column count, or the table has a label column
    pub fn push_row(&mut self, row: &[f64]) -> Result<(), PipelineError> {
        if self.labels.is_some() {
            return Err(PipelineError::configuration(
                "rows of a labeled feature table need a label",
            ));
        }
        self.push_values(row)
    }

    /// Appends a row together with its label
    ///
    /// # Errors
    ///
    /// If the arity of `row` does not match the column count, or the table has no label column
    pub fn push_labeled_row(&mut self, row: &[f64], label: Label) -> Result<(), PipelineError> {
        if self.labels.is_none() {
            return Err(PipelineError::configuration(
                "feature table has no label column",
            ));
        }
        self.push_values(row)?;
        if let Some(labels) = self.labels.as_mut() {
            labels.push(label);
        }
        Ok(())
    }

    fn push_values(&mut self, row: &[f64]) -> Result<(), PipelineError> {
        if row.len() != self.columns.len() {
            return Err(PipelineError::LengthMismatch {
                what: "feature values",
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.values.extend_from_slice(row);
        self.num_rows += 1;
        Ok(())
    }

    /// The values of the row at `index`
    ///
    /// # Panics
    ///
    /// If `index` is out of bounds
    pub fn row(&self, index: usize) -> &[f64] {
        let stride = self.columns.len();
        &self.values[index * stride..(index + 1) * stride]
    }

    /// Iterates over all rows in order
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.num_rows).map(move |index| self.row(index))
    }

    /// Iterates over the values of the column `name`, `None` if there is no such column
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = f64> + '_> {
        let column = self.column_index(name)?;
        Some(self.rows().map(move |row| row[column]))
    }

    pub fn labels(&self) -> Option<&[Label]> {
        self.labels.as_deref()
    }

    /// Attaches a label column to this table, replacing any existing one
    ///
    /// # Errors
    ///
    /// If `labels` does not hold one label per row
    pub fn set_labels(&mut self, labels: Vec<Label>) -> Result<(), PipelineError> {
        if labels.len() != self.num_rows {
            return Err(PipelineError::LengthMismatch {
                what: "labels",
                expected: self.num_rows,
                actual: labels.len(),
            });
        }
        self.labels = Some(labels);
        Ok(())
    }

    /// Does the row at `index` contain at least one [UNDEFINED] value?
    pub fn is_row_undefined(&self, index: usize) -> bool {
        self.row(index).iter().copied().any(is_undefined)
    }

    /// Number of rows containing at least one [UNDEFINED] value
    pub fn count_undefined_rows(&self) -> usize {
        (0..self.num_rows)
            .filter(|index| self.is_row_undefined(*index))
            .count()
    }

    /// Replaces every [UNDEFINED] cell with `value`. Rows are never removed. Returns the number of filled cells
    pub fn fill_undefined(&mut self, value: f64) -> usize {
        let mut filled = 0;
        for cell in self.values.iter_mut().filter(|cell| is_undefined(**cell)) {
            *cell = value;
            filled += 1;
        }
        filled
    }

    /// Keeps only the rows for which `keep` returns `true`. The predicate receives the row values and the row label
    /// (if this table is labeled). Returns the number of removed rows
    pub fn retain_rows<F: FnMut(&[f64], Option<Label>) -> bool>(&mut self, mut keep: F) -> usize {
        let stride = self.columns.len();
        let mut values = Vec::with_capacity(self.values.len());
        let mut labels = self.labels.as_ref().map(|l| Vec::with_capacity(l.len()));
        for index in 0..self.num_rows {
            let label = self.labels.as_ref().map(|l| l[index]);
            let row = &self.values[index * stride..(index + 1) * stride];
            if keep(row, label) {
                values.extend_from_slice(row);
                if let (Some(labels), Some(label)) = (labels.as_mut(), label) {
                    labels.push(label);
                }
            }
        }
        let kept = if stride == 0 { 0 } else { values.len() / stride };
        let removed = self.num_rows - kept;
        self.values = values;
        self.labels = labels;
        self.num_rows = kept;
        removed
    }

    /// Builds a new table holding only the given columns, in the given order. Labels are carried over
    ///
    /// # Errors
    ///
    /// If one of the `columns` does not exist in this table
    pub fn select_columns<S: AsRef<str>>(&self, columns: &[S]) -> Result<FeatureTable, PipelineError> {
        let indices = columns
            .iter()
            .map(|name| {
                self.column_index(name.as_ref()).ok_or_else(|| {
                    PipelineError::configuration(format!(
                        "feature table has no column '{}'",
                        name.as_ref()
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let values = self
            .rows()
            .flat_map(|row| indices.iter().map(move |idx| row[*idx]))
            .collect();
        FeatureTable::from_values(
            columns.iter().map(|name| name.as_ref().to_string()).collect(),
            values,
            self.labels.clone(),
        )
    }
}
