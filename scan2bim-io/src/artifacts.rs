use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use scan2bim_algorithms::classification::{EvaluationReport, TrainedModel};
use scan2bim_core::PipelineError;
use serde::{Deserialize, Serialize};

/// Returns a [PipelineError::MissingArtifact] error if nothing exists at `path`
pub fn require_input<P: AsRef<Path>>(path: P) -> Result<(), PipelineError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PipelineError::MissingArtifact {
            path: path.to_owned(),
        });
    }
    Ok(())
}

/// Path of the temporary file that an artifact at `path` is written to before it is moved into place
fn temporary_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", file_name))
}

/// Writes the artifact at `path` through `write`, which receives the path of a temporary sibling file. The temporary
/// file is renamed to `path` only if `write` succeeds, so a failed stage never leaves a partial artifact behind.
/// Missing parent directories are created.
pub fn write_atomically<P, F>(path: P, write: F) -> Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&Path) -> Result<()>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Could not create directory {}", parent.display()))?;
        }
    }
    let temporary = temporary_sibling(path);
    if let Err(error) = write(&temporary) {
        if temporary.exists() {
            if let Err(cleanup_error) = fs::remove_file(&temporary) {
                log::warn!(
                    "Could not remove temporary file {}: {}",
                    temporary.display(),
                    cleanup_error
                );
            }
        }
        return Err(error);
    }
    fs::rename(&temporary, path).with_context(|| {
        format!(
            "Could not move {} to {}",
            temporary.display(),
            path.display()
        )
    })
}

/// Header of model files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct ModelHeader {
    magic: [u8; 4],
    version: u32,
}

impl ModelHeader {
    const MAGIC: [u8; 4] = *b"s2bm";
    const VERSION: u32 = 1;

    fn current() -> Self {
        Self {
            magic: Self::MAGIC,
            version: Self::VERSION,
        }
    }

    /// Returns an Err if this header does not belong to a model file this version can read
    fn verify(&self) -> Result<()> {
        if self.magic != Self::MAGIC {
            bail!(
                "No valid model file, expected the first four bytes to be '{:?}', but was '{:?}' instead",
                Self::MAGIC,
                self.magic
            );
        }
        if self.version != Self::VERSION {
            bail!(
                "Unsupported model file version {}, expected version {}",
                self.version,
                Self::VERSION
            );
        }
        Ok(())
    }
}

/// Writes `model` to `path` in a binary format. The feature names and class labels are stored with the forest, so the
/// file is all that is needed to classify new data
pub fn save_model<P: AsRef<Path>>(model: &TrainedModel, path: P) -> Result<()> {
    let path = path.as_ref();
    write_atomically(path, |temporary| {
        let mut writer = BufWriter::new(File::create(temporary)?);
        bincode::serialize_into(&mut writer, &ModelHeader::current())
            .context("Could not serialize model header")?;
        bincode::serialize_into(&mut writer, model).context("Could not serialize model")?;
        writer.flush()?;
        Ok(())
    })
    .with_context(|| format!("Could not write model file {}", path.display()))
}

/// Reads a model written by [save_model]
///
/// # Errors
///
/// [PipelineError::MissingArtifact] if `path` does not exist, or an error if the file is no valid model file
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<TrainedModel> {
    let path = path.as_ref();
    require_input(path)?;
    let mut reader = BufReader::new(
        File::open(path).with_context(|| format!("Could not open model file {}", path.display()))?,
    );
    let header: ModelHeader = bincode::deserialize_from(&mut reader)
        .with_context(|| format!("Could not deserialize model header from {}", path.display()))?;
    header.verify()?;
    let model = bincode::deserialize_from(&mut reader)
        .with_context(|| format!("Could not deserialize model from {}", path.display()))?;
    Ok(model)
}

/// Writes `report` to `path` as pretty-printed JSON
pub fn save_report<P: AsRef<Path>>(report: &EvaluationReport, path: P) -> Result<()> {
    let path = path.as_ref();
    write_atomically(path, |temporary| {
        let mut writer = BufWriter::new(File::create(temporary)?);
        serde_json::to_writer_pretty(&mut writer, report)?;
        writer.flush()?;
        Ok(())
    })
    .with_context(|| format!("Could not write training report {}", path.display()))
}

/// Reads a report written by [save_report]
pub fn load_report<P: AsRef<Path>>(path: P) -> Result<EvaluationReport> {
    let path = path.as_ref();
    require_input(path)?;
    let reader = BufReader::new(File::open(path)?);
    serde_json::from_reader(reader)
        .with_context(|| format!("Could not parse training report {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporary_sibling() {
        assert_eq!(
            PathBuf::from("output/.model.bin.tmp"),
            temporary_sibling(Path::new("output/model.bin"))
        );
    }

    #[test]
    fn test_missing_input() {
        let error = require_input("this/file/does/not/exist.las").unwrap_err();
        assert!(matches!(error, PipelineError::MissingArtifact { .. }));
    }

    #[test]
    fn test_failed_write_leaves_nothing_behind() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("artifact.bin");
        let result = write_atomically(&path, |temporary| {
            fs::write(temporary, b"partial")?;
            bail!("computation failed")
        });
        assert!(result.is_err());
        assert!(!path.exists());
        assert!(!temporary_sibling(&path).exists());

        write_atomically(&path, |temporary| {
            fs::write(temporary, b"complete")?;
            Ok(())
        })?;
        assert_eq!(b"complete".to_vec(), fs::read(&path)?);
        Ok(())
    }
}
