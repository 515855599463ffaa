use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("error reading from file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error writing to file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot patch {path}: {source}")]
    ValueGrew {
        path: PathBuf,
        source: GrowthViolation,
    },
}

/// A binary replacement that does not fit the span it replaces.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "{new:?} ({new_len} bytes) is longer than {old:?} ({old_len} bytes) at offset {offset}; binary values cannot grow"
)]
pub struct GrowthViolation {
    pub offset: usize,
    pub old: String,
    pub new: String,
    pub old_len: usize,
    pub new_len: usize,
}
