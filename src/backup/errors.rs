use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("file to back up does not exist: {0}")]
    Missing(PathBuf),

    #[error("cannot back up {path} to {backup}: {source}")]
    Snapshot {
        path: PathBuf,
        backup: PathBuf,
        source: std::io::Error,
    },

    #[error("no free backup name next to {0}")]
    NoBackupName(PathBuf),

    #[error("cannot delete backup {path}: {source}")]
    Delete {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(
        "backup manifest {0} exists: a previous run was interrupted, run `recover` before patching again"
    )]
    Pending(PathBuf),
}

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("backup manifest I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed backup manifest {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// One backup that could not be put back.
#[derive(Debug)]
pub struct RestoreFailure {
    pub original: PathBuf,
    pub backup: PathBuf,
    pub reason: String,
}

impl fmt::Display for RestoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot restore {} from {}: {}",
            self.original.display(),
            self.backup.display(),
            self.reason
        )
    }
}

/// Every restoration that failed during one restore pass.
#[derive(Debug)]
pub struct RestoreError {
    pub failures: Vec<RestoreFailure>,
}

impl fmt::Display for RestoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} file(s) could not be restored", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RestoreError {}
