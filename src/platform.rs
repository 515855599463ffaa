//! Host platform knowledge: separators, case folding and path limits.
//!
//! Everything platform dependent is a run-time value so the same build can be
//! exercised against every target in tests.

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Longest accepted new installation root, in characters.
///
/// Binary tagged values live in fixed-size fields inside QtCore and qmake.
pub const MAX_NEW_DIR_LEN: usize = 450;

/// Operating system the installation was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetOs {
    Windows,
    Linux,
    MacOs,
    Other,
}

impl TargetOs {
    /// Detect the OS this process runs on.
    pub fn current() -> Self {
        Self::from_name(std::env::consts::OS)
    }

    /// Map a `std::env::consts::OS` style name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "windows" => TargetOs::Windows,
            "linux" => TargetOs::Linux,
            "macos" => TargetOs::MacOs,
            _ => TargetOs::Other,
        }
    }

    /// Name used in pattern tables.
    pub fn name(self) -> &'static str {
        match self {
            TargetOs::Windows => "windows",
            TargetOs::Linux => "linux",
            TargetOs::MacOs => "macos",
            TargetOs::Other => "other",
        }
    }

    pub fn native_separator(self) -> char {
        match self {
            TargetOs::Windows => '\\',
            _ => '/',
        }
    }

    /// Whether path comparison folds ASCII case by default.
    pub fn default_case_fold(self) -> bool {
        matches!(self, TargetOs::Windows)
    }

    pub fn executable_name(self, base: &str) -> String {
        match self {
            TargetOs::Windows => format!("{base}.exe"),
            _ => base.to_string(),
        }
    }
}

impl fmt::Display for TargetOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rewrite every `\` as `/`.
pub fn to_normal_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Rewrite every `/` as the native separator of `os`.
pub fn to_native_separators(path: &str, os: TargetOs) -> String {
    let sep = os.native_separator();
    if sep == '/' {
        path.to_string()
    } else {
        path.replace('/', &sep.to_string())
    }
}

pub fn has_only_normal_separators(path: &str) -> bool {
    !path.contains('\\')
}

/// Compare two paths, optionally folding ASCII case.
pub fn paths_equal(a: &str, b: &str, case_fold: bool) -> bool {
    if case_fold {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}

/// Case-aware `starts_with` for normalized path strings.
pub fn path_starts_with(path: &str, prefix: &str, case_fold: bool) -> bool {
    if path.len() < prefix.len() {
        return false;
    }
    match path.get(..prefix.len()) {
        Some(head) => paths_equal(head, prefix, case_fold),
        None => false,
    }
}

/// `path` made absolute against `base`, with `.` and `..` folded away.
///
/// Purely lexical: symlinks are not resolved and the path need not exist.
pub fn absolute_path(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut folded = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                folded.pop();
            }
            other => folded.push(other.as_os_str()),
        }
    }
    folded
}
