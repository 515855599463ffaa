use crate::platform::TargetOs;
use serde::Deserialize;
use std::fmt;

/// Declarative table of patchable files.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct PatternConfig {
    #[serde(default)]
    pub text: Vec<PatternRow>,
    #[serde(default)]
    pub binary: Vec<PatternRow>,
}

/// One `(directory, glob, recursive)` row, scoped to a Qt major version and
/// optionally to a set of operating systems.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PatternRow {
    pub qt: String,
    #[serde(default)]
    pub os: Option<Vec<String>>,
    #[serde(default)]
    pub dir: String,
    pub name: String,
    #[serde(default)]
    pub recursive: bool,
}

impl PatternRow {
    pub fn applies_to(&self, version: char, os: TargetOs) -> bool {
        let version_matches = self.qt.chars().eq(std::iter::once(version));
        let os_matches = match &self.os {
            Some(names) => names.iter().any(|n| n == os.name()),
            None => true,
        };
        version_matches && os_matches
    }
}

const KNOWN_OS_NAMES: &[&str] = &["windows", "linux", "macos", "other"];

impl PatternConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.text.is_empty() && self.binary.is_empty() {
            issues.push(ValidationIssue::EmptyTable);
        }

        let rows = self
            .text
            .iter()
            .enumerate()
            .map(|(i, r)| (FileKind::Text, i, r))
            .chain(
                self.binary
                    .iter()
                    .enumerate()
                    .map(|(i, r)| (FileKind::Binary, i, r)),
            );

        for (kind, index, row) in rows {
            if row.name.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    kind,
                    index,
                    field: "name",
                });
            }
            if row.qt.chars().count() != 1 {
                issues.push(ValidationIssue::InvalidRow {
                    kind,
                    index,
                    message: format!("qt must be a single character, got {:?}", row.qt),
                });
            }
            if row.name.contains('/') || row.name.contains('\\') {
                issues.push(ValidationIssue::InvalidRow {
                    kind,
                    index,
                    message: "name must be a file name, use dir for directories".to_string(),
                });
            }
            if kind == FileKind::Binary && row.recursive {
                issues.push(ValidationIssue::InvalidRow {
                    kind,
                    index,
                    message: "binary rows cannot be recursive".to_string(),
                });
            }
            for os in row.os.iter().flatten() {
                if !KNOWN_OS_NAMES.contains(&os.as_str()) {
                    issues.push(ValidationIssue::InvalidRow {
                        kind,
                        index,
                        message: format!("unknown os {os:?}"),
                    });
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Rows of `kind` that apply to `version` on `os`, in table order.
    pub fn rows(
        &self,
        kind: FileKind,
        version: char,
        os: TargetOs,
    ) -> impl Iterator<Item = &PatternRow> {
        let rows = match kind {
            FileKind::Text => &self.text,
            FileKind::Binary => &self.binary,
        };
        rows.iter().filter(move |r| r.applies_to(version, os))
    }

    /// Whether any row mentions `version`.
    pub fn supports(&self, version: char) -> bool {
        self.text
            .iter()
            .chain(&self.binary)
            .any(|r| r.qt.chars().eq(std::iter::once(version)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Text,
    Binary,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::Text => f.write_str("text"),
            FileKind::Binary => f.write_str("binary"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyTable,
    MissingField {
        kind: FileKind,
        index: usize,
        field: &'static str,
    },
    InvalidRow {
        kind: FileKind,
        index: usize,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyTable => write!(f, "pattern table contains no rows"),
            ValidationIssue::MissingField { kind, index, field } => {
                write!(f, "{kind} row {index} missing required field '{field}'")
            }
            ValidationIssue::InvalidRow {
                kind,
                index,
                message,
            } => write!(f, "{kind} row {index} is invalid: {message}"),
        }
    }
}
