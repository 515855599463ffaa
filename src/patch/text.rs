//! Variable-length substitution for text files.

use crate::patch::errors::PatchError;
use crate::patch::{find_from, read_file, write_back};
use crate::prefix::SubstitutionTable;
use std::path::Path;
use tracing::{debug, info};

/// Rewrites text files with a substitution table.
#[derive(Debug, Clone, Copy)]
pub struct TextPatcher<'a> {
    table: &'a SubstitutionTable,
    case_fold: bool,
}

impl<'a> TextPatcher<'a> {
    pub fn new(table: &'a SubstitutionTable, case_fold: bool) -> Self {
        Self { table, case_fold }
    }

    /// Apply every pair to `buf`, growing or shrinking it as needed.
    ///
    /// Each pair is applied exhaustively before the next one. The scan for a
    /// pair resumes behind the text it just inserted, so a new value that
    /// contains its old value is never expanded twice.
    pub fn patch_buffer(&self, buf: &mut Vec<u8>) -> usize {
        let mut replacements = 0;
        for (old, new) in self.table.iter() {
            if old.is_empty() {
                continue;
            }
            let mut from = 0;
            while let Some(pos) = find_from(buf, old, from, self.case_fold) {
                buf.splice(pos..pos + old.len(), new.iter().copied());
                from = pos + new.len();
                replacements += 1;
            }
        }
        replacements
    }

    /// Patch one file in place. Returns the number of replacements.
    pub fn patch_file(&self, path: &Path) -> Result<usize, PatchError> {
        info!("Patching text file {}", path.display());

        let mut buf = read_file(path)?;
        if buf.is_empty() {
            debug!("  file is empty, skipping");
            return Ok(0);
        }

        let replacements = self.patch_buffer(&mut buf);
        if replacements == 0 {
            debug!("  nothing to replace");
            return Ok(0);
        }

        write_back(path, &buf)?;
        debug!("  {replacements} replacement(s), {} bytes", buf.len());
        Ok(replacements)
    }
}
