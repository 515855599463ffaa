//! A complete relocation run.
//!
//! Every step either completes or aborts the run. Once the first backup
//! exists, an abort restores everything backed up so far.

use crate::backup::{manifest_path, BackupError, BackupMode, BackupSession};
use crate::fileset::{
    self, FileSetError, FileSetResolver, PatternConfigError, PatternSource, WalkdirFinder,
};
use crate::options::{BackupPolicy, PatchOptions};
use crate::patch::{BinaryPatcher, PatchError, TextPatcher};
use crate::platform::{self, TargetOs, MAX_NEW_DIR_LEN};
use crate::prefix::{PathPrefixTable, PrefixError};
use crate::qmake::{self, KeyValueTable, QMake, QueryError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum RelocateError {
    #[error("cannot determine the working directory: {0}")]
    WorkingDir(std::io::Error),

    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    #[error("path to new Qt directory too long ({len} characters, at most {max} allowed)")]
    NewDirTooLong { len: usize, max: usize },

    #[error(transparent)]
    Patterns(#[from] PatternConfigError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Prefix(#[from] PrefixError),

    #[error(transparent)]
    FileSet(#[from] FileSetError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error(transparent)]
    Patch(#[from] PatchError),
}

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The installation already lives where qmake says it was built.
    NotNeeded { qt_dir: String },
    Patched {
        qt_dir: String,
        new_dir: String,
        text_files: usize,
        binary_files: usize,
        replacements: usize,
    },
}

/// Runs relocations for one host.
#[derive(Debug, Clone)]
pub struct Relocator {
    os: TargetOs,
    cwd: PathBuf,
}

impl Relocator {
    pub fn new() -> Result<Self, RelocateError> {
        let cwd = std::env::current_dir().map_err(RelocateError::WorkingDir)?;
        Ok(Self {
            os: TargetOs::current(),
            cwd,
        })
    }

    pub fn with_os(mut self, os: TargetOs) -> Self {
        self.os = os;
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// Relocate the installation described by `opts`.
    pub fn run(&self, opts: &PatchOptions) -> Result<RunOutcome, RelocateError> {
        let patterns =
            PatternSource::from_option(opts.patterns.as_deref().map(|p| self.absolute(p)))
                .load()?;

        let qt_dir_arg = opts.qt_dir.as_deref().map(|p| self.absolute(p));
        let qmake = QMake::locate(qt_dir_arg.as_deref(), &self.cwd, self.os)?;
        info!("Path to qmake: {}", qmake.path().display());

        let qt_root = qmake.qt_dir().to_path_buf();
        let qt_dir = normal_string(&qt_root)?;
        info!("Path to Qt directory: {qt_dir}");

        let new_dir = match &opts.new_dir {
            Some(path) => normal_string(&self.absolute(path))?,
            None => qt_dir.clone(),
        };
        info!("Path to new Qt directory: {new_dir}");
        let len = new_dir.chars().count();
        if len > MAX_NEW_DIR_LEN {
            return Err(RelocateError::NewDirTooLong {
                len,
                max: MAX_NEW_DIR_LEN,
            });
        }

        let case_fold = opts
            .case_fold
            .unwrap_or_else(|| self.os.default_case_fold());

        let manifest = manifest_path(&qt_root);
        let mut session = match opts.backup {
            BackupPolicy::Skip => {
                if manifest.exists() {
                    return Err(BackupError::Pending(manifest).into());
                }
                BackupSession::in_memory().with_skip_backup(true)
            }
            BackupPolicy::Keep | BackupPolicy::Discard => BackupSession::begin(manifest)?,
        };

        let run = Run {
            os: self.os,
            qmake: &qmake,
            qt_root: &qt_root,
            qt_dir: &qt_dir,
            new_dir: &new_dir,
            case_fold,
            patterns: &patterns,
            opts,
        };

        match run.execute(&mut session) {
            Ok(outcome @ RunOutcome::NotNeeded { .. }) => {
                // Only qt.conf may have been moved aside; put it back.
                if let Err(e) = session.restore() {
                    error!("{e}");
                }
                Ok(outcome)
            }
            Ok(outcome) => {
                match opts.backup {
                    BackupPolicy::Keep => session.save()?,
                    BackupPolicy::Discard | BackupPolicy::Skip => session.delete_backup()?,
                }
                Ok(outcome)
            }
            Err(e) => {
                error!("{e}");
                if !session.is_skipping() {
                    match session.restore() {
                        Ok(count) => info!("Restored {count} file(s)"),
                        Err(restore) => error!("{restore}"),
                    }
                }
                Err(e)
            }
        }
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        platform::absolute_path(&self.cwd, path)
    }
}

/// The steps that run under backup protection.
struct Run<'a> {
    os: TargetOs,
    qmake: &'a QMake,
    qt_root: &'a Path,
    qt_dir: &'a str,
    new_dir: &'a str,
    case_fold: bool,
    patterns: &'a fileset::PatternConfig,
    opts: &'a PatchOptions,
}

impl Run<'_> {
    fn execute(&self, session: &mut BackupSession) -> Result<RunOutcome, RelocateError> {
        // qt.conf overrides compiled-in paths; qmake must answer without it.
        session.backup_file(&qmake::qt_conf_path(self.qt_dir), BackupMode::Rename)?;

        let vars = self.qmake.variables()?;

        if !self.patch_needed(&vars) {
            if self.opts.force {
                info!("The new and the old paths to Qt directory are the same, forcing patch");
            } else {
                info!("The new and the old paths to Qt directory are the same, patching not needed");
                return Ok(RunOutcome::NotNeeded {
                    qt_dir: self.qt_dir.to_string(),
                });
            }
        }

        let tables = PathPrefixTable::new(self.new_dir, self.os)
            .with_case_fold(self.case_fold)
            .build(&vars, &self.opts.old_dirs)?;

        let finder = WalkdirFinder::new(self.os.default_case_fold());
        let files = FileSetResolver::new(self.patterns, finder, self.os)
            .resolve(vars.version_tag(), self.qt_root)?;

        session.backup_files(&files.text)?;
        session.backup_files(&files.binary)?;

        let mut replacements = 0;
        let text = TextPatcher::new(&tables.text, self.case_fold);
        for file in &files.text {
            replacements += text.patch_file(file)?;
        }
        let binary = BinaryPatcher::new(&tables.binary);
        for file in &files.binary {
            replacements += binary.patch_file(file)?;
        }

        Ok(RunOutcome::Patched {
            qt_dir: self.qt_dir.to_string(),
            new_dir: self.new_dir.to_string(),
            text_files: files.text.len(),
            binary_files: files.binary.len(),
            replacements,
        })
    }

    fn patch_needed(&self, vars: &KeyValueTable) -> bool {
        let old = vars
            .install_prefix()
            .map(platform::to_normal_separators)
            .unwrap_or_default();
        debug!("old Qt directory: {old:?}");
        !old.is_empty()
            && !self.new_dir.is_empty()
            && !platform::paths_equal(&old, self.new_dir, self.case_fold)
    }
}

/// UTF-8 path with `/` separators and no trailing separator.
fn normal_string(path: &Path) -> Result<String, RelocateError> {
    let s = path
        .to_str()
        .ok_or_else(|| RelocateError::NonUtf8Path(path.to_path_buf()))?;
    let normal = platform::to_normal_separators(s);
    let trimmed = normal.trim_end_matches('/');
    Ok(if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    })
}
