//! Fixed-width substitution for binary files.
//!
//! Paths are stored in binaries as `tag=path` followed by NUL padding inside a
//! field of fixed size. A replacement overwrites the matched span and zeroes
//! whatever it does not cover, so the file keeps its length and every offset
//! stays valid.

use crate::patch::errors::{GrowthViolation, PatchError};
use crate::patch::{find_from, read_file, write_back};
use crate::prefix::SubstitutionTable;
use std::ops::Range;
use std::path::Path;
use tracing::{debug, info};

/// Rewrites binary files with a substitution table.
#[derive(Debug, Clone, Copy)]
pub struct BinaryPatcher<'a> {
    table: &'a SubstitutionTable,
}

impl<'a> BinaryPatcher<'a> {
    pub fn new(table: &'a SubstitutionTable) -> Self {
        Self { table }
    }

    /// Apply every pair to `buf` without changing its length.
    ///
    /// Bytes written by one pair are never matched again by a later pair. A
    /// replacement longer than its match is rejected; `buf` may then be
    /// partially patched and must be discarded.
    pub fn patch_buffer(&self, buf: &mut [u8]) -> Result<usize, GrowthViolation> {
        let mut written: Vec<Range<usize>> = Vec::new();
        let mut replacements = 0;

        for (old, new) in self.table.iter() {
            if old.is_empty() {
                continue;
            }
            let mut from = 0;
            while let Some(pos) = find_from(buf, old, from, false) {
                let span = pos..pos + old.len();
                if written
                    .iter()
                    .any(|w| w.start < span.end && span.start < w.end)
                {
                    from = pos + 1;
                    continue;
                }
                if new.len() > old.len() {
                    return Err(GrowthViolation {
                        offset: pos,
                        old: String::from_utf8_lossy(old).into_owned(),
                        new: String::from_utf8_lossy(new).into_owned(),
                        old_len: old.len(),
                        new_len: new.len(),
                    });
                }

                let value_end = pos + new.len();
                buf[pos..value_end].copy_from_slice(new);
                buf[value_end..span.end].fill(0);

                from = span.end;
                written.push(span);
                replacements += 1;
            }
        }
        Ok(replacements)
    }

    /// Patch one file in place. Returns the number of replacements.
    ///
    /// Nothing is written when any replacement would grow.
    pub fn patch_file(&self, path: &Path) -> Result<usize, PatchError> {
        info!("Patching binary file {}", path.display());

        let mut buf = read_file(path)?;
        if buf.is_empty() {
            debug!("  file is empty, skipping");
            return Ok(0);
        }
        let original_len = buf.len();

        let replacements =
            self.patch_buffer(&mut buf)
                .map_err(|source| PatchError::ValueGrew {
                    path: path.to_path_buf(),
                    source,
                })?;
        debug_assert_eq!(buf.len(), original_len);

        if replacements == 0 {
            debug!("  nothing to replace");
            return Ok(0);
        }

        write_back(path, &buf)?;
        debug!("  {replacements} replacement(s)");
        Ok(replacements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn table(pairs: &[(&str, &str)]) -> SubstitutionTable {
        let mut table = SubstitutionTable::new();
        for (old, new) in pairs {
            table.insert(*old, *new);
        }
        table
    }

    #[test]
    fn test_shorter_value_is_zero_padded() {
        let table = table(&[("qt_libspath=/opt/qt5/lib", "qt_libspath=/opt/qt5/l")]);
        let mut buf = b"\x7fELF..qt_libspath=/opt/qt5/lib\0\0\0\0..".to_vec();
        let len = buf.len();

        assert_eq!(BinaryPatcher::new(&table).patch_buffer(&mut buf).unwrap(), 1);
        assert_eq!(buf.len(), len);
        assert_eq!(&buf[..], &b"\x7fELF..qt_libspath=/opt/qt5/l\0\0\0\0\0\0.."[..]);
    }

    #[test]
    fn test_longer_value_is_rejected() {
        let table = table(&[("qt_libspath=/opt/qt5/lib", "qt_libspath=/opt/qt5-x/lib")]);
        let mut buf = b"qt_libspath=/opt/qt5/lib\0\0\0\0\0\0\0\0".to_vec();

        let err = BinaryPatcher::new(&table)
            .patch_buffer(&mut buf)
            .unwrap_err();
        assert_eq!(err.offset, 0);
        assert_eq!(err.old_len, 24);
        assert_eq!(err.new_len, 26);
    }

    #[test]
    fn test_written_spans_are_not_rematched() {
        // The first pair writes a value the second pair would match.
        let table = table(&[
            ("qt_prfxpath=/a/qt", "qt_prfxpath=/b"),
            ("qt_prfxpath=/b", "qt_prfxpath=/c"),
        ]);
        let mut buf = b"qt_prfxpath=/a/qt\0|qt_prfxpath=/b\0".to_vec();

        assert_eq!(BinaryPatcher::new(&table).patch_buffer(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..], &b"qt_prfxpath=/b\0\0\0\0|qt_prfxpath=/c\0"[..]);
    }

    #[test]
    fn test_every_occurrence_replaced() {
        let table = table(&[("qt_binspath=/opt/qt5/bin", "qt_binspath=/q/bin")]);
        let mut buf = b"qt_binspath=/opt/qt5/bin\0qt_binspath=/opt/qt5/bin\0".to_vec();

        assert_eq!(BinaryPatcher::new(&table).patch_buffer(&mut buf).unwrap(), 2);
        assert_eq!(
            &buf[..],
            &b"qt_binspath=/q/bin\0\0\0\0\0\0\0qt_binspath=/q/bin\0\0\0\0\0\0\0"[..]
        );
    }

    #[test]
    fn test_patch_file_keeps_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("libQt5Core.so.5.15.2");
        let mut content = vec![0xAAu8; 64];
        content.extend_from_slice(b"qt_prfxpath=/opt/qt5\0\0\0\0");
        content.extend(vec![0x55u8; 64]);
        fs::write(&path, &content).unwrap();

        let table = table(&[("qt_prfxpath=/opt/qt5", "qt_prfxpath=/srv")]);
        let count = BinaryPatcher::new(&table).patch_file(&path).unwrap();

        let after = fs::read(&path).unwrap();
        assert_eq!(count, 1);
        assert_eq!(after.len(), content.len());
        assert_eq!(&after[64..88], &b"qt_prfxpath=/srv\0\0\0\0\0\0\0\0"[..]);
        assert_eq!(&after[88..], &content[88..]);
    }

    #[test]
    fn test_growth_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qmake");
        let content = b"qt_libspath=/opt/qt5/lib\0\0\0\0".to_vec();
        fs::write(&path, &content).unwrap();

        let table = table(&[("qt_libspath=/opt/qt5/lib", "qt_libspath=/opt/qt5-x/lib")]);
        let err = BinaryPatcher::new(&table).patch_file(&path).unwrap_err();

        assert!(matches!(err, PatchError::ValueGrew { .. }));
        assert_eq!(fs::read(&path).unwrap(), content);
    }
}
