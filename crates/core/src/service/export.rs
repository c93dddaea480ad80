//! Snapshot export to disk
//!
//! After each successful cycle the new snapshot can be written out as pretty
//! JSON for offline inspection. The cache never reads these files back.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core_types::PredictionSnapshot;
use crate::error::PersistenceError;

/// Writes snapshots to a fixed path.
#[derive(Debug, Clone)]
pub struct SnapshotExporter {
    path: PathBuf,
}

impl SnapshotExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save a snapshot, replacing any previous export.
    ///
    /// Writes to a sibling temporary file first and renames it into place so
    /// a reader of the export never sees a truncated document.
    ///
    /// # Errors
    /// Returns error if the snapshot cannot be serialized or written
    pub fn save(&self, snapshot: &PredictionSnapshot) -> Result<(), PersistenceError> {
        let contents = serde_json::to_string_pretty(snapshot)
            .map_err(|e| PersistenceError::SerializeFailed(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::SaveFailed(e.to_string()))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents).map_err(|e| PersistenceError::SaveFailed(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| PersistenceError::SaveFailed(e.to_string()))?;

        Ok(())
    }

    /// Read back an exported snapshot.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(&self) -> Result<PredictionSnapshot, PersistenceError> {
        let contents =
            fs::read_to_string(&self.path).map_err(|e| PersistenceError::LoadFailed(e.to_string()))?;
        serde_json::from_str(&contents).map_err(|e| PersistenceError::ParseFailed(e.to_string()))
    }
}
