//! In-place path substitution for text and binary files.
//!
//! Both patchers buffer the whole file, apply a [`SubstitutionTable`] in its
//! natural order and write the buffer back over the original.
//!
//! [`SubstitutionTable`]: crate::prefix::SubstitutionTable

pub mod binary;
pub mod errors;
pub mod text;

pub use binary::BinaryPatcher;
pub use errors::{GrowthViolation, PatchError};
pub use text::TextPatcher;

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Position of the first occurrence of `needle` in `haystack` at or after
/// `from`, optionally folding ASCII case.
pub fn find_from(haystack: &[u8], needle: &[u8], from: usize, case_fold: bool) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() || haystack.len() - from < needle.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| {
            if case_fold {
                window.eq_ignore_ascii_case(needle)
            } else {
                window == needle
            }
        })
        .map(|offset| from + offset)
}

fn read_file(path: &Path) -> Result<Vec<u8>, PatchError> {
    fs::read(path).map_err(|source| PatchError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Replace the contents of `path` with `content`, keeping the file's identity
/// and permissions.
fn write_back(path: &Path, content: &[u8]) -> Result<(), PatchError> {
    let write = || -> std::io::Result<()> {
        let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
        file.write_all(content)?;
        file.sync_all()
    };
    write().map_err(|source| PatchError::Write {
        path: path.to_path_buf(),
        source,
    })
}
