//! Local state records
//!
//! The last-known representation of each managed perspective, one JSON file
//! per label: `<state_dir>/<label>.json`. Holds the external id plus the model
//! as last written or read, including ref ids, server-computed entries and the
//! reference-id watermark.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use persp_common::{Error, Perspective, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Persisted state of one managed perspective
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    /// External id assigned by the server
    pub id: String,
    pub perspective: Perspective,
    pub updated_at: DateTime<Utc>,
}

impl StateRecord {
    pub fn new(id: impl Into<String>, perspective: Perspective) -> Self {
        Self {
            id: id.into(),
            perspective,
            updated_at: Utc::now(),
        }
    }
}

/// Directory of state records
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Labels become file names, so only a safe character set is allowed
    fn path_for(&self, label: &str) -> Result<PathBuf> {
        let valid = !label.is_empty()
            && !label.starts_with('.')
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(Error::Config(format!(
                "Invalid label `{}` (use letters, digits, '-', '_' or '.')",
                label
            )));
        }
        Ok(self.dir.join(format!("{}.json", label)))
    }

    pub fn exists(&self, label: &str) -> Result<bool> {
        Ok(self.path_for(label)?.exists())
    }

    pub fn load(&self, label: &str) -> Result<StateRecord> {
        let path = self.path_for(label)?;
        if !path.exists() {
            return Err(Error::NotFound(format!("no state for `{}` in {}", label, self.dir.display())));
        }

        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Corrupt state file {}: {}", path.display(), e)))
    }

    /// Write atomically (temp file + rename)
    pub fn save(&self, label: &str, record: &StateRecord) -> Result<()> {
        let path = self.path_for(label)?;
        std::fs::create_dir_all(&self.dir)?;

        let content = serde_json::to_string_pretty(record)
            .map_err(|e| Error::Config(format!("Serialize state failed: {}", e)))?;
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, &path)?;

        debug!(label = %label, path = %path.display(), "Saved state");
        Ok(())
    }

    pub fn remove(&self, label: &str) -> Result<()> {
        let path = self.path_for(label)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
