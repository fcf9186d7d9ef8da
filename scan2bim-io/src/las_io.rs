use std::{fs::File, io::BufWriter, path::Path};

use anyhow::{Context, Result};
use las::{point::Classification, Color, Read, Reader, Write, Writer};
use scan2bim_core::{nalgebra::Vector3, Label, PipelineError, Point, PointCloud};

/// Soft failures encountered while reading a LAS/LAZ file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LasReadSummary {
    /// Points whose classification code is not part of the taxonomy. They are read as [Label::Unclassified]
    pub unknown_classifications: usize,
    /// Points without color information. They are read as black
    pub missing_colors: usize,
}

/// Reads all points of the LAS/LAZ file at `path` into a [PointCloud], in file order
///
/// # Errors
///
/// [PipelineError::MissingArtifact] if `path` does not exist, or an error if the file cannot be parsed
pub fn read_point_cloud<P: AsRef<Path>>(path: P) -> Result<(PointCloud, LasReadSummary)> {
    let path = path.as_ref();
    crate::artifacts::require_input(path)?;
    let mut reader =
        Reader::from_path(path).with_context(|| format!("Could not open LAS file {}", path.display()))?;
    let num_points = reader.header().number_of_points() as usize;

    let mut summary = LasReadSummary::default();
    let mut points = Vec::with_capacity(num_points);
    for las_point in reader.points() {
        let las_point = las_point.with_context(|| format!("Could not read point from {}", path.display()))?;
        let color = match las_point.color {
            Some(color) => Vector3::new(color.red, color.green, color.blue),
            None => {
                summary.missing_colors += 1;
                Vector3::new(0, 0, 0)
            }
        };
        let code = u8::from(las_point.classification);
        let label = Label::from_code(code).unwrap_or_else(|| {
            summary.unknown_classifications += 1;
            Label::Unclassified
        });
        let mut point = Point::new(Vector3::new(las_point.x, las_point.y, las_point.z), color).with_label(label);
        point.intensity = Some(las_point.intensity);
        points.push(point);
    }

    if summary.unknown_classifications > 0 {
        log::warn!(
            "{} points in {} have classification codes outside of the taxonomy and are read as unclassified",
            summary.unknown_classifications,
            path.display()
        );
    }
    if summary.missing_colors > 0 {
        log::warn!(
            "{} points in {} have no color",
            summary.missing_colors,
            path.display()
        );
    }
    let cloud: PointCloud = points.into_iter().collect();
    log::info!("Read {} points from {}", cloud.len(), path.display());
    if let Some(bounds) = cloud.bounds() {
        let extent = bounds.extent();
        log::debug!(
            "Bounds start at {:?} and extend {:.3} x {:.3} x {:.3}",
            bounds.min(),
            extent.x,
            extent.y,
            extent.z
        );
    }
    Ok((cloud, summary))
}

/// Copies the LAS/LAZ file at `source` to `destination`, replacing the classification of the i-th point with the i-th
/// entry of `labels`. The header and every other point attribute are taken over unchanged. The destination file only
/// appears once it has been written completely.
///
/// # Errors
///
/// [PipelineError::MissingArtifact] if `source` does not exist, [PipelineError::LengthMismatch] if `labels` does not
/// hold exactly one label per point of `source`, or an error if reading or writing fails
pub fn write_classified_copy<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    destination: Q,
    labels: &[Label],
) -> Result<()> {
    let source = source.as_ref();
    let destination = destination.as_ref();
    crate::artifacts::require_input(source)?;
    let mut reader =
        Reader::from_path(source).with_context(|| format!("Could not open LAS file {}", source.display()))?;
    let header = reader.header().clone();
    let num_points = header.number_of_points() as usize;
    if num_points != labels.len() {
        return Err(PipelineError::LengthMismatch {
            what: "labels",
            expected: num_points,
            actual: labels.len(),
        }
        .into());
    }

    crate::artifacts::write_atomically(destination, |temporary| {
        let mut writer = Writer::new(BufWriter::new(File::create(temporary)?), header)?;
        let mut written = 0;
        for (las_point, label) in reader.points().zip(labels.iter()) {
            let mut las_point = las_point?;
            las_point.classification = Classification::new(label.code())?;
            writer.write(las_point)?;
            written += 1;
        }
        writer.close()?;
        if written != labels.len() {
            return Err(PipelineError::LengthMismatch {
                what: "points",
                expected: labels.len(),
                actual: written,
            }
            .into());
        }
        Ok(())
    })
    .with_context(|| format!("Could not write LAS file {}", destination.display()))?;
    log::info!(
        "Wrote {} classified points to {}",
        labels.len(),
        destination.display()
    );
    Ok(())
}

/// Writes `cloud` to a new LAS file at `path` using point format 2 (positions, intensity, classification, color).
/// Intended for synthetic data; real scans are written with [write_classified_copy] so that their header survives.
pub fn write_point_cloud<P: AsRef<Path>>(cloud: &PointCloud, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut builder = las::Builder::from((1, 2));
    builder.point_format = las::point::Format::new(2)?;
    let header = builder.into_header()?;

    crate::artifacts::write_atomically(path, |temporary| {
        let mut writer = Writer::new(BufWriter::new(File::create(temporary)?), header)?;
        for point in cloud.iter() {
            let las_point = las::Point {
                x: point.position.x,
                y: point.position.y,
                z: point.position.z,
                intensity: point.intensity.unwrap_or_default(),
                classification: Classification::new(point.label.code())?,
                color: Some(Color::new(point.color.x, point.color.y, point.color.z)),
                ..Default::default()
            };
            writer.write(las_point)?;
        }
        writer.close()?;
        Ok(())
    })
    .with_context(|| format!("Could not write LAS file {}", path.display()))
}
