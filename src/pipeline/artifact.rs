//! Per-transition artifact persistence.
//!
//! K_i: An artifact is a JSON array of ContrastRecord objects, pretty-printed
//! with four-space indentation.
//! K_i: Writes go to a temp file first and are renamed into place, so a
//! crashed run never leaves a half-written artifact.

use crate::models::{ContrastError, ContrastRecord, Result};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Artifact path for a transition name inside `dir`.
pub fn artifact_path(dir: &Path, transition_name: &str) -> PathBuf {
    dir.join(format!("{transition_name}.json"))
}

/// Serialize `value` as 4-space pretty JSON to `path`, atomically.
pub fn write_json_atomic<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| ContrastError::Internal(format!("not a file path: {}", path.display())))?;
    let temp_path = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    let file =
        File::create(&temp_path).map_err(|e| ContrastError::io("creating temp artifact", e))?;
    let mut writer = BufWriter::new(file);

    let mut ser =
        serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
    value
        .serialize(&mut ser)
        .map_err(|e| ContrastError::Internal(format!("Serializing {}: {}", path.display(), e)))?;
    writer
        .flush()
        .map_err(|e| ContrastError::io("flushing temp artifact", e))?;
    drop(writer);

    fs::rename(&temp_path, path).map_err(|e| ContrastError::io("renaming artifact", e))?;

    debug!(path = %path.display(), "Artifact written");
    Ok(())
}

/// Write a transition's records as an artifact.
pub fn write_artifact(records: &[ContrastRecord], path: &Path) -> Result<()> {
    write_json_atomic(records, path)
}

/// Read back an artifact written by [`write_artifact`].
#[cfg(test)]
pub(crate) fn read_artifact(path: &Path) -> Result<Vec<ContrastRecord>> {
    use std::io::BufReader;

    let file = File::open(path)
        .map_err(|e| ContrastError::io(format!("opening artifact {}", path.display()), e))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| ContrastError::malformed(path, e.to_string()))
}
