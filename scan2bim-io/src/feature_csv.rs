//! Feature tables as CSV text.
//!
//! The first row names the columns. Feature values are written in their shortest round-trip representation and
//! undefined values as empty fields. Labeled tables carry an additional `label` column with the classification code;
//! it is placed in front of the `z_norm` column if the table has one, and last otherwise.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use scan2bim_core::{
    features::{is_undefined, LABEL_COLUMN, UNDEFINED, Z_NORM},
    FeatureTable, Label,
};

use crate::artifacts::{require_input, write_atomically};

/// Position of the label column among `feature_columns` plus the label column
fn label_position(feature_columns: &[String]) -> usize {
    feature_columns
        .iter()
        .position(|column| column == Z_NORM)
        .unwrap_or(feature_columns.len())
}

fn format_value(value: f64) -> String {
    if is_undefined(value) {
        String::new()
    } else {
        value.to_string()
    }
}

/// Writes `table` as CSV to `writer`
pub fn write_feature_table_to<W: Write>(table: &FeatureTable, writer: W) -> Result<()> {
    let mut csv_writer = WriterBuilder::new().has_headers(false).from_writer(writer);
    let label_at = table.labels().map(|_| label_position(table.columns()));

    let mut header = table.columns().to_vec();
    if let Some(label_at) = label_at {
        header.insert(label_at, LABEL_COLUMN.to_string());
    }
    csv_writer.write_record(&header)?;

    let mut record = Vec::with_capacity(header.len());
    for (index, row) in table.rows().enumerate() {
        record.clear();
        record.extend(row.iter().map(|value| format_value(*value)));
        if let (Some(label_at), Some(labels)) = (label_at, table.labels()) {
            record.insert(label_at, labels[index].code().to_string());
        }
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Writes `table` as CSV file to `path`. The file only appears once it is complete
pub fn write_feature_table<P: AsRef<Path>>(table: &FeatureTable, path: P) -> Result<()> {
    let path = path.as_ref();
    write_atomically(path, |temporary| {
        let writer = BufWriter::new(File::create(temporary)?);
        write_feature_table_to(table, writer)
    })
    .with_context(|| format!("Could not write feature table {}", path.display()))
}

fn parse_value(field: &str, row: usize, column: &str) -> Result<f64> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(UNDEFINED);
    }
    field
        .parse()
        .with_context(|| format!("Invalid value '{}' in row {}, column '{}'", field, row, column))
}

fn parse_label(field: &str, row: usize) -> Result<Label> {
    let code: u8 = field
        .trim()
        .parse()
        .with_context(|| format!("Invalid label '{}' in row {}", field, row))?;
    Label::from_code(code).ok_or_else(|| {
        anyhow!(
            "Label {} in row {} is not part of the classification taxonomy",
            code,
            row
        )
    })
}

/// Reads a feature table from CSV. A column named `label` becomes the label column of the table, all other columns
/// are feature columns in file order.
pub fn read_feature_table_from<R: std::io::Read>(reader: R) -> Result<FeatureTable> {
    let mut csv_reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let label_index = headers.iter().position(|name| name.trim() == LABEL_COLUMN);
    let columns = headers
        .iter()
        .enumerate()
        .filter(|(index, _)| Some(*index) != label_index)
        .map(|(_, name)| name.trim().to_string())
        .collect::<Vec<_>>();

    let mut table = if label_index.is_some() {
        FeatureTable::new_labeled(columns)
    } else {
        FeatureTable::new(columns)
    };
    let mut row = Vec::with_capacity(table.num_columns());
    let mut record = StringRecord::new();
    let mut row_index = 0;
    while csv_reader.read_record(&mut record)? {
        row.clear();
        for (index, field) in record.iter().enumerate() {
            if Some(index) == label_index {
                continue;
            }
            row.push(parse_value(field, row_index, &headers[index])?);
        }
        match label_index {
            Some(label_index) => {
                let label = parse_label(&record[label_index], row_index)?;
                table.push_labeled_row(&row, label)?;
            }
            None => table.push_row(&row)?,
        }
        row_index += 1;
    }
    Ok(table)
}

/// Reads a feature table from the CSV file at `path`
///
/// # Errors
///
/// [PipelineError::MissingArtifact](scan2bim_core::PipelineError::MissingArtifact) if `path` does not exist, or an
/// error if the file is malformed
pub fn read_feature_table<P: AsRef<Path>>(path: P) -> Result<FeatureTable> {
    let path = path.as_ref();
    require_input(path)?;
    let file = File::open(path).with_context(|| format!("Could not open {}", path.display()))?;
    read_feature_table_from(file)
        .with_context(|| format!("Could not read feature table {}", path.display()))
}
