//! On-disk record of the backups of a run in progress.
//!
//! The manifest is rewritten after every new backup and before any file is
//! patched, so a run killed half way can be undone by `recover`.

use crate::backup::errors::ManifestError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::xxh3_64;

pub const MANIFEST_FILE_NAME: &str = ".qt-binpatcher-backup.json";
const MANIFEST_VERSION: u32 = 1;

/// Manifest location for the installation at `qt_dir`.
pub fn manifest_path(qt_dir: &Path) -> PathBuf {
    qt_dir.join(MANIFEST_FILE_NAME)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupMode {
    /// Move the original aside; it must not exist while patching.
    Rename,
    /// Duplicate the original; it is rewritten in place afterwards.
    Copy,
}

/// Snapshot of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub original: PathBuf,
    pub backup: PathBuf,
    pub mode: BackupMode,
    /// xxh3 of the backup's bytes when it was taken.
    pub hash: u64,
}

impl BackupRecord {
    /// Whether the backup still holds the bytes it was taken with.
    pub fn verify(&self) -> std::io::Result<bool> {
        let content = fs::read(&self.backup)?;
        Ok(xxh3_64(&content) == self.hash)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub records: Vec<BackupRecord>,
}

impl Manifest {
    pub fn new(records: Vec<BackupRecord>) -> Self {
        Self {
            version: MANIFEST_VERSION,
            records,
        }
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&content).map_err(|source| ManifestError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn store(&self, path: &Path) -> Result<(), ManifestError> {
        let content = serde_json::to_vec_pretty(self).map_err(|source| ManifestError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        atomic_write(path, &content).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn remove(path: &Path) -> Result<(), ManifestError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ManifestError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Atomic file write: tempfile + fsync + rename.
fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Path has no parent directory",
        )
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
