//! Which files of an installation get patched.
//!
//! The knowledge lives in a TOML pattern table (see `default_patterns.toml`);
//! rows are picked by Qt major version and target OS at run time, and the
//! actual directory search is delegated to a [`FileFinder`].

pub mod finder;
pub mod loader;
pub mod schema;

pub use finder::{glob_to_regex, FileFinder, WalkdirFinder};
pub use loader::{parse_table, PatternConfigError, PatternSource, TableError};
pub use schema::{FileKind, PatternConfig, PatternRow, ValidationError, ValidationIssue};

use crate::backup::is_backup_file;
use crate::platform::TargetOs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileSetError {
    #[error("unsupported Qt version ({0:?})")]
    UnsupportedVersion(Option<char>),
}

/// Files to patch, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSets {
    pub text: Vec<PathBuf>,
    pub binary: Vec<PathBuf>,
}

/// Resolves a pattern table against an installation.
pub struct FileSetResolver<'a, F: FileFinder> {
    config: &'a PatternConfig,
    finder: F,
    os: TargetOs,
}

impl<'a, F: FileFinder> FileSetResolver<'a, F> {
    pub fn new(config: &'a PatternConfig, finder: F, os: TargetOs) -> Self {
        Self { config, finder, os }
    }

    /// List the text and binary files of the installation at `qt_dir`.
    ///
    /// An unknown `version` fails before any directory is searched.
    pub fn resolve(&self, version: Option<char>, qt_dir: &Path) -> Result<FileSets, FileSetError> {
        let version = match version {
            Some(v) if self.config.supports(v) => v,
            other => return Err(FileSetError::UnsupportedVersion(other)),
        };

        let sets = FileSets {
            text: self.collect(FileKind::Text, version, qt_dir),
            binary: self.collect(FileKind::Binary, version, qt_dir),
        };

        debug!("text files for patch:");
        for file in &sets.text {
            debug!("  {}", file.display());
        }
        debug!("binary files for patch:");
        for file in &sets.binary {
            debug!("  {}", file.display());
        }
        Ok(sets)
    }

    fn collect(&self, kind: FileKind, version: char, qt_dir: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for row in self.config.rows(kind, version, self.os) {
            let dir = if row.dir.is_empty() {
                qt_dir.to_path_buf()
            } else {
                qt_dir.join(&row.dir)
            };
            for file in self.finder.find(&dir, &row.name, row.recursive) {
                if is_backup_file(&file) {
                    debug!("skipping backup {}", file.display());
                    continue;
                }
                files.push(file);
            }
        }
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingFinder {
        calls: RefCell<Vec<(PathBuf, String, bool)>>,
    }

    impl FileFinder for &RecordingFinder {
        fn find(&self, dir: &Path, pattern: &str, recursive: bool) -> Vec<PathBuf> {
            self.calls
                .borrow_mut()
                .push((dir.to_path_buf(), pattern.to_string(), recursive));
            vec![dir.join(pattern)]
        }
    }

    const TABLE: &str = r#"
[[text]]
qt = "5"
dir = ""
name = "*.pri"
recursive = true

[[text]]
qt = "4"
dir = "lib"
name = "*.prl"

[[binary]]
qt = "5"
os = ["linux"]
dir = "bin"
name = "qmake"

[[binary]]
qt = "5"
os = ["windows"]
dir = "bin"
name = "qmake.exe"
"#;

    #[test]
    fn test_resolve_selects_rows() {
        let config = parse_table(TABLE).unwrap();
        let finder = RecordingFinder::default();
        let resolver = FileSetResolver::new(&config, &finder, TargetOs::Linux);

        let sets = resolver.resolve(Some('5'), Path::new("/opt/qt5")).unwrap();
        assert_eq!(sets.text, vec![PathBuf::from("/opt/qt5/*.pri")]);
        assert_eq!(sets.binary, vec![PathBuf::from("/opt/qt5/bin/qmake")]);

        let calls = finder.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].2, "first row is recursive");
    }

    #[test]
    fn test_unsupported_version_skips_discovery() {
        let config = parse_table(TABLE).unwrap();
        let finder = RecordingFinder::default();
        let resolver = FileSetResolver::new(&config, &finder, TargetOs::Linux);

        let err = resolver.resolve(Some('6'), Path::new("/opt/qt6")).unwrap_err();
        assert_eq!(err, FileSetError::UnsupportedVersion(Some('6')));
        assert_eq!(
            resolver.resolve(None, Path::new("/opt/qt")).unwrap_err(),
            FileSetError::UnsupportedVersion(None)
        );
        assert!(finder.calls.borrow().is_empty());
    }

    struct FixedFinder(Vec<PathBuf>);

    impl FileFinder for FixedFinder {
        fn find(&self, _dir: &Path, _pattern: &str, _recursive: bool) -> Vec<PathBuf> {
            self.0.clone()
        }
    }

    #[test]
    fn test_backups_of_earlier_runs_are_not_patched() {
        let config = parse_table(TABLE).unwrap();
        let finder = FixedFinder(vec![
            PathBuf::from("/opt/qt5/lib/libQt5Core.so.5"),
            PathBuf::from("/opt/qt5/lib/libQt5Core.so.5.bak"),
            PathBuf::from("/opt/qt5/lib/libQt5Core.so.5.bak.1"),
        ]);
        let sets = FileSetResolver::new(&config, finder, TargetOs::Linux)
            .resolve(Some('5'), Path::new("/opt/qt5"))
            .unwrap();
        assert_eq!(sets.binary, vec![PathBuf::from("/opt/qt5/lib/libQt5Core.so.5")]);
    }
}
