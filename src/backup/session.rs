use crate::backup::errors::{BackupError, RestoreError, RestoreFailure};
use crate::backup::manifest::{BackupMode, BackupRecord, Manifest};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use xxhash_rust::xxh3::xxh3_64;

const MAX_BACKUP_SUFFIX: usize = 1000;

/// Owns every backup made during one run.
///
/// A session must be finished with [`save`](Self::save),
/// [`delete_backup`](Self::delete_backup) or [`restore`](Self::restore).
/// Dropping an unfinished session restores all backups.
#[derive(Debug)]
pub struct BackupSession {
    records: Vec<BackupRecord>,
    manifest: Option<PathBuf>,
    skip_backup: bool,
    finished: bool,
}

impl BackupSession {
    /// Start a session whose records are mirrored to `manifest`.
    ///
    /// Fails when a manifest from an earlier, unfinished run is present.
    pub fn begin(manifest: impl Into<PathBuf>) -> Result<Self, BackupError> {
        let manifest = manifest.into();
        if manifest.exists() {
            return Err(BackupError::Pending(manifest));
        }
        Ok(Self {
            records: Vec::new(),
            manifest: Some(manifest),
            skip_backup: false,
            finished: false,
        })
    }

    /// Start a session without an on-disk manifest.
    pub fn in_memory() -> Self {
        Self {
            records: Vec::new(),
            manifest: None,
            skip_backup: false,
            finished: false,
        }
    }

    /// Pick up the records of an interrupted run.
    pub fn resume(manifest: impl Into<PathBuf>) -> Result<Self, BackupError> {
        let manifest = manifest.into();
        let loaded = Manifest::load(&manifest)?;
        Ok(Self {
            records: loaded.records,
            manifest: Some(manifest),
            skip_backup: false,
            finished: false,
        })
    }

    /// Turn every backup operation into a successful no-op.
    ///
    /// Whoever sets this accepts that a failed run cannot be undone.
    pub fn with_skip_backup(mut self, skip_backup: bool) -> Self {
        self.skip_backup = skip_backup;
        self
    }

    pub fn records(&self) -> &[BackupRecord] {
        &self.records
    }

    pub fn is_skipping(&self) -> bool {
        self.skip_backup
    }

    /// Snapshot `path` before it is mutated.
    ///
    /// In rename mode a missing file is not an error; there is nothing to
    /// protect. A path already snapshotted in this session is left alone.
    pub fn backup_file(&mut self, path: &Path, mode: BackupMode) -> Result<(), BackupError> {
        if self.skip_backup {
            return Ok(());
        }
        if self.records.iter().any(|r| r.original == path) {
            debug!("{} already backed up", path.display());
            return Ok(());
        }

        if !path.exists() {
            return match mode {
                BackupMode::Rename => {
                    debug!("{} does not exist, nothing to back up", path.display());
                    Ok(())
                }
                BackupMode::Copy => Err(BackupError::Missing(path.to_path_buf())),
            };
        }

        let backup = free_backup_name(path)?;
        let snapshot_error = |source: io::Error| BackupError::Snapshot {
            path: path.to_path_buf(),
            backup: backup.clone(),
            source,
        };
        let content = fs::read(path).map_err(snapshot_error)?;

        // The record reaches the manifest before the file moves, so a crash
        // in between still leaves `recover` something to find.
        self.records.push(BackupRecord {
            original: path.to_path_buf(),
            backup: backup.clone(),
            mode,
            hash: xxh3_64(&content),
        });
        if let Err(e) = self.persist() {
            self.records.pop();
            return Err(e);
        }

        let taken = match mode {
            BackupMode::Rename => fs::rename(path, &backup),
            BackupMode::Copy => fs::copy(path, &backup).map(|_| ()),
        };
        if let Err(source) = taken {
            self.records.pop();
            if let Err(e) = self.persist() {
                warn!("{e}");
            }
            return Err(snapshot_error(source));
        }

        debug!("backed up {} -> {}", path.display(), backup.display());
        Ok(())
    }

    /// Copy-mode backup of every path. Stops at the first failure; backups
    /// already taken stay in the session.
    pub fn backup_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<(), BackupError> {
        for path in paths {
            self.backup_file(path.as_ref(), BackupMode::Copy)?;
        }
        Ok(())
    }

    /// Commit and keep every backup file on disk.
    pub fn save(mut self) -> Result<(), BackupError> {
        self.finished = true;
        for record in &self.records {
            info!("Backup kept: {}", record.backup.display());
        }
        self.records.clear();
        self.remove_manifest()
    }

    /// Commit and delete every backup file.
    ///
    /// All deletions are attempted; the first failure is returned.
    pub fn delete_backup(mut self) -> Result<(), BackupError> {
        self.finished = true;
        let mut first_error = None;
        for record in std::mem::take(&mut self.records) {
            if let Err(source) = fs::remove_file(&record.backup) {
                if source.kind() == io::ErrorKind::NotFound {
                    continue;
                }
                error!("cannot delete backup {}: {source}", record.backup.display());
                first_error.get_or_insert(BackupError::Delete {
                    path: record.backup,
                    source,
                });
            }
        }
        self.remove_manifest()?;
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Put every backup back in place, newest first.
    ///
    /// Every record is attempted even after a failure. Records that could not
    /// be restored stay in the manifest for a later `recover`.
    pub fn restore(mut self) -> Result<usize, RestoreError> {
        self.finished = true;
        self.restore_all()
    }

    fn restore_all(&mut self) -> Result<usize, RestoreError> {
        let records = std::mem::take(&mut self.records);
        if records.is_empty() {
            return Ok(0);
        }
        info!("Restoring {} backed up file(s)", records.len());

        let mut restored = 0;
        let mut failures = Vec::new();
        let mut remaining = Vec::new();
        for record in records.into_iter().rev() {
            match restore_record(&record) {
                Ok(()) => {
                    debug!("restored {}", record.original.display());
                    restored += 1;
                }
                Err(reason) => {
                    let failure = RestoreFailure {
                        original: record.original.clone(),
                        backup: record.backup.clone(),
                        reason,
                    };
                    error!("{failure}");
                    failures.push(failure);
                    remaining.push(record);
                }
            }
        }

        if let Some(path) = &self.manifest {
            let outcome = if remaining.is_empty() {
                Manifest::remove(path)
            } else {
                remaining.reverse();
                Manifest::new(remaining).store(path)
            };
            if let Err(e) = outcome {
                warn!("{e}");
            }
        }

        if failures.is_empty() {
            Ok(restored)
        } else {
            Err(RestoreError { failures })
        }
    }

    fn persist(&self) -> Result<(), BackupError> {
        if let Some(path) = &self.manifest {
            Manifest::new(self.records.clone()).store(path)?;
        }
        Ok(())
    }

    fn remove_manifest(&self) -> Result<(), BackupError> {
        if let Some(path) = &self.manifest {
            Manifest::remove(path)?;
        }
        Ok(())
    }
}

impl Drop for BackupSession {
    fn drop(&mut self) {
        if self.finished || self.records.is_empty() {
            return;
        }
        warn!("run did not finish, restoring backups");
        if let Err(e) = self.restore_all() {
            error!("{e}");
        }
    }
}

fn restore_record(record: &BackupRecord) -> Result<(), String> {
    if !record.backup.exists() {
        // Recorded but never taken: fine as long as the original is intact.
        return match fs::read(&record.original) {
            Ok(content) if xxh3_64(&content) == record.hash => Ok(()),
            Ok(_) => Err("backup is missing and the file has changed".to_string()),
            Err(e) => Err(format!("backup is missing: {e}")),
        };
    }

    match record.verify() {
        Ok(true) => {}
        Ok(false) => return Err("backup content changed since it was taken".to_string()),
        Err(e) => return Err(e.to_string()),
    }

    match fs::remove_file(&record.original) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.to_string()),
    }
    fs::rename(&record.backup, &record.original).map_err(|e| e.to_string())
}

/// `<name>.bak`, or `<name>.bak.N` for the first free `N`.
fn free_backup_name(path: &Path) -> Result<PathBuf, BackupError> {
    let name = path
        .file_name()
        .ok_or_else(|| BackupError::NoBackupName(path.to_path_buf()))?
        .to_string_lossy();

    let first = path.with_file_name(format!("{name}.bak"));
    if !first.exists() {
        return Ok(first);
    }
    (1..MAX_BACKUP_SUFFIX)
        .map(|n| path.with_file_name(format!("{name}.bak.{n}")))
        .find(|candidate| !candidate.exists())
        .ok_or_else(|| BackupError::NoBackupName(path.to_path_buf()))
}

/// Whether `path` is named like a backup: `<name>.bak` or `<name>.bak.N`.
pub fn is_backup_file(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return false;
    };
    if name.ends_with(".bak") {
        return true;
    }
    match name.rsplit_once(".bak.") {
        Some((stem, n)) => {
            !stem.is_empty() && !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}
