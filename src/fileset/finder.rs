use regex::{Regex, RegexBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Finds files by name pattern below a directory.
pub trait FileFinder {
    /// Regular files in `dir` whose name matches `pattern`, descending into
    /// subdirectories when `recursive` is set. A missing `dir` yields nothing.
    fn find(&self, dir: &Path, pattern: &str, recursive: bool) -> Vec<PathBuf>;
}

/// [`FileFinder`] backed by `walkdir`. Symlinks are not followed and are
/// never returned, so every physical file is reported once.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkdirFinder {
    case_insensitive: bool,
}

impl WalkdirFinder {
    pub fn new(case_insensitive: bool) -> Self {
        Self { case_insensitive }
    }
}

impl FileFinder for WalkdirFinder {
    fn find(&self, dir: &Path, pattern: &str, recursive: bool) -> Vec<PathBuf> {
        let Some(matcher) = glob_to_regex(pattern, self.case_insensitive) else {
            return Vec::new();
        };
        if !dir.is_dir() {
            return Vec::new();
        }

        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(if recursive { usize::MAX } else { 1 })
            .sort_by_file_name();

        walker
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| matcher.is_match(name))
            })
            .map(|entry| entry.into_path())
            .collect()
    }
}

/// Compile a `*`/`?` file name glob into an anchored regex.
pub fn glob_to_regex(pattern: &str, case_insensitive: bool) -> Option<Regex> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');

    RegexBuilder::new(&source)
        .case_insensitive(case_insensitive)
        .build()
        .ok()
}
