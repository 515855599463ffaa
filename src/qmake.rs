//! Locating and querying `qmake`.
//!
//! `qmake -query` prints one `KEY:VALUE` pair per line. The resulting
//! [`KeyValueTable`] is the only source of the old installation paths.

use crate::platform::{self, TargetOs};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::debug;

const QMAKE_BASE_NAME: &str = "qmake";
const BIN_DIR_NAME: &str = "bin";

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("can't find qmake (looked in {})", format_candidates(.searched))]
    NotFound { searched: Vec<PathBuf> },

    #[error("can't determine path to Qt directory from {0}")]
    NoQtDir(PathBuf),

    #[error("failed to run {path}: {source}")]
    Spawn {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} -query exited with {status}")]
    Failed {
        path: PathBuf,
        status: std::process::ExitStatus,
    },

    #[error("qmake produced no output")]
    EmptyOutput,

    #[error("error parsing qmake output line {line_number}: {line:?}")]
    MalformedLine { line_number: usize, line: String },
}

fn format_candidates(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parsed `qmake -query` output. Keys are unique; later lines win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueTable {
    values: BTreeMap<String, String>,
}

impl KeyValueTable {
    /// Split `output` into lines and each line at its first `:`.
    ///
    /// Blank lines are ignored. A line without `:` rejects the whole output.
    pub fn parse(output: &str) -> Result<Self, QueryError> {
        if output.trim().is_empty() {
            return Err(QueryError::EmptyOutput);
        }

        let mut values = BTreeMap::new();
        for (idx, line) in output.split(['\r', '\n']).enumerate() {
            if line.is_empty() {
                continue;
            }
            match line.split_once(':') {
                Some((key, value)) => {
                    values.insert(key.to_string(), value.to_string());
                }
                None => {
                    return Err(QueryError::MalformedLine {
                        line_number: idx + 1,
                        line: line.to_string(),
                    })
                }
            }
        }

        let table = Self { values };
        debug!("parsed {} qmake variables", table.len());
        for (key, value) in table.iter() {
            debug!("  {key} = {value:?}");
        }
        Ok(table)
    }

    /// Non-empty value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn install_prefix(&self) -> Option<&str> {
        self.get("QT_INSTALL_PREFIX")
    }

    pub fn host_prefix(&self) -> Option<&str> {
        self.get("QT_HOST_PREFIX")
    }

    /// First character of `QT_VERSION`, e.g. `'5'` for `5.15.2`.
    pub fn version_tag(&self) -> Option<char> {
        self.get("QT_VERSION").and_then(|v| v.chars().next())
    }
}

impl FromIterator<(String, String)> for KeyValueTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// A located qmake executable and the Qt directory it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QMake {
    path: PathBuf,
    qt_dir: PathBuf,
}

impl QMake {
    /// Find qmake.
    ///
    /// With `qt_dir` the executable must be `<qt_dir>/bin/qmake`. Without it
    /// `<cwd>/qmake` is tried first (Qt directory is then the parent of `cwd`),
    /// then `<cwd>/bin/qmake` (Qt directory is `cwd`).
    pub fn locate(qt_dir: Option<&Path>, cwd: &Path, os: TargetOs) -> Result<Self, QueryError> {
        let exe = os.executable_name(QMAKE_BASE_NAME);

        if let Some(qt_dir) = qt_dir {
            let path = qt_dir.join(BIN_DIR_NAME).join(&exe);
            if path.is_file() {
                return Ok(Self {
                    path,
                    qt_dir: qt_dir.to_path_buf(),
                });
            }
            return Err(QueryError::NotFound {
                searched: vec![path],
            });
        }

        let in_cwd = cwd.join(&exe);
        if in_cwd.is_file() {
            let qt_dir = cwd
                .parent()
                .ok_or_else(|| QueryError::NoQtDir(cwd.to_path_buf()))?
                .to_path_buf();
            return Ok(Self {
                path: in_cwd,
                qt_dir,
            });
        }

        let in_bin = cwd.join(BIN_DIR_NAME).join(&exe);
        if in_bin.is_file() {
            return Ok(Self {
                path: in_bin,
                qt_dir: cwd.to_path_buf(),
            });
        }

        Err(QueryError::NotFound {
            searched: vec![in_cwd, in_bin],
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Qt directory implied by the qmake location.
    pub fn qt_dir(&self) -> &Path {
        &self.qt_dir
    }

    /// Run `qmake -query` and return its raw standard output.
    pub fn query(&self) -> Result<String, QueryError> {
        debug!("qmake command line: {} -query", self.path.display());
        let output = Command::new(&self.path)
            .arg("-query")
            .output()
            .map_err(|source| QueryError::Spawn {
                path: self.path.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(QueryError::Failed {
                path: self.path.clone(),
                status: output.status,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("qmake output:\n{stdout}");
        if stdout.trim().is_empty() {
            return Err(QueryError::EmptyOutput);
        }
        Ok(stdout)
    }

    /// Query and parse in one step.
    pub fn variables(&self) -> Result<KeyValueTable, QueryError> {
        KeyValueTable::parse(&self.query()?)
    }
}

/// Path of the `qt.conf` that overrides compiled-in paths when present.
pub fn qt_conf_path(qt_dir: &str) -> PathBuf {
    PathBuf::from(format!(
        "{}/{BIN_DIR_NAME}/qt.conf",
        platform::to_normal_separators(qt_dir).trim_end_matches('/')
    ))
}
