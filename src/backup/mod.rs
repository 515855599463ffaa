//! Reversible snapshots of every file a run touches.
//!
//! Backups sit next to the originals (`<name>.bak`). A [`BackupSession`]
//! tracks them and mirrors its records to a JSON manifest in the Qt root, so
//! the installation can be restored even after the process died mid-run.

pub mod errors;
pub mod manifest;
pub mod session;

pub use errors::{BackupError, ManifestError, RestoreError, RestoreFailure};
pub use manifest::{manifest_path, BackupMode, BackupRecord, Manifest, MANIFEST_FILE_NAME};
pub use session::{is_backup_file, BackupSession};

use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum RecoverError {
    #[error("no interrupted run found in {0}")]
    NothingToRecover(std::path::PathBuf),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error(transparent)]
    Restore(#[from] RestoreError),
}

/// Restore the backups left behind by an interrupted run at `qt_dir`.
///
/// Returns the number of files restored.
pub fn recover(qt_dir: &Path) -> Result<usize, RecoverError> {
    let path = manifest_path(qt_dir);
    if !path.exists() {
        return Err(RecoverError::NothingToRecover(qt_dir.to_path_buf()));
    }

    let session = BackupSession::resume(&path)?;
    info!(
        "Recovering {} file(s) listed in {}",
        session.records().len(),
        path.display()
    );
    Ok(session.restore()?)
}
