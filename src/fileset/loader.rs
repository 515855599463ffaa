//! Where a pattern table comes from and how it is turned into a
//! [`PatternConfig`].

use crate::fileset::schema::{PatternConfig, ValidationError};
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

const BUILTIN_TABLE: &str = include_str!("default_patterns.toml");

/// Origin of a pattern table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSource {
    /// The table compiled into the binary.
    Builtin,
    /// A `--patterns` override.
    File(PathBuf),
}

impl fmt::Display for PatternSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternSource::Builtin => f.write_str("<built-in>"),
            PatternSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A table that was read but cannot be used.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("not valid TOML: {0}")]
    Toml(#[from] toml_edit::de::Error),

    #[error("{0}")]
    Invalid(#[from] ValidationError),
}

#[derive(Error, Debug)]
pub enum PatternConfigError {
    #[error("cannot read pattern table {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("pattern table {origin}: {source}")]
    Table {
        origin: PatternSource,
        source: TableError,
    },
}

impl PatternSource {
    /// The override file when one was given, the built-in table otherwise.
    pub fn from_option(path: Option<PathBuf>) -> Self {
        path.map_or(PatternSource::Builtin, PatternSource::File)
    }

    /// Read, parse and validate the table.
    pub fn load(&self) -> Result<PatternConfig, PatternConfigError> {
        let config = match self {
            PatternSource::Builtin => parse_table(BUILTIN_TABLE),
            PatternSource::File(path) => {
                let text = fs::read_to_string(path).map_err(|source| PatternConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                parse_table(&text)
            }
        }
        .map_err(|source| PatternConfigError::Table {
            origin: self.clone(),
            source,
        })?;

        debug!(
            "pattern table {self}: {} text row(s), {} binary row(s)",
            config.text.len(),
            config.binary.len()
        );
        Ok(config)
    }
}

/// Parse a TOML pattern table and reject it unless every row is usable.
pub fn parse_table(input: &str) -> Result<PatternConfig, TableError> {
    let config: PatternConfig = toml_edit::de::from_str(input)?;
    config.validate()?;
    Ok(config)
}
