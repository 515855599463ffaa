//! Validation of the raw option mapping handed over by the command line.
//!
//! Each option has exactly one [`OptionRule`]; rules are evaluated
//! independently and every violation is collected, so a single run reports
//! all problems at once.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Option name → one entry per occurrence. An empty string marks an
/// occurrence given without a value.
pub type ArgsMap = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionRule {
    /// Flag; must not carry a value.
    Forbidden,
    /// Exactly one occurrence with a value.
    RequiredSingle,
    /// One or more occurrences, each with a value.
    RequiredMulti,
}

/// Options accepted by a patch run and their rules.
pub const PATCH_OPTION_RULES: &[(&str, OptionRule)] = &[
    ("backup", OptionRule::Forbidden),
    ("nobackup", OptionRule::Forbidden),
    ("force", OptionRule::Forbidden),
    ("ignore-case", OptionRule::Forbidden),
    ("match-case", OptionRule::Forbidden),
    ("qt-dir", OptionRule::RequiredSingle),
    ("new-dir", OptionRule::RequiredSingle),
    ("old-dir", OptionRule::RequiredMulti),
    ("patterns", OptionRule::RequiredSingle),
];

/// Pairs of options that cannot be combined.
pub const INCOMPATIBLE_OPTIONS: &[(&str, &str)] =
    &[("backup", "nobackup"), ("ignore-case", "match-case")];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionIssue {
    ValueNotAllowed { option: String },
    MoreThanOne { option: String },
    MissingValue { option: String },
    Incompatible { first: String, second: String },
    Unknown { option: String },
}

impl fmt::Display for OptionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionIssue::ValueNotAllowed { option } => {
                write!(f, "option --{option} cannot have a value")
            }
            OptionIssue::MoreThanOne { option } => {
                write!(f, "option --{option} can be given only once")
            }
            OptionIssue::MissingValue { option } => write!(f, "option --{option} must have a value"),
            OptionIssue::Incompatible { first, second } => {
                write!(f, "options --{first} and --{second} are incompatible")
            }
            OptionIssue::Unknown { option } => write!(f, "unknown option --{option}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptionsError {
    pub issues: Vec<OptionIssue>,
}

impl fmt::Display for OptionsError {
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

impl std::error::Error for OptionsError {}

/// Evaluate one rule against the occurrences of one option.
pub fn check_rule(option: &str, rule: OptionRule, values: &[String]) -> Vec<OptionIssue> {
    let mut issues = Vec::new();
    let has_value = values.iter().any(|v| !v.is_empty());
    let missing_value = values.is_empty() || values.iter().any(String::is_empty);

    match rule {
        OptionRule::Forbidden => {
            if has_value {
                issues.push(OptionIssue::ValueNotAllowed {
                    option: option.to_string(),
                });
            }
        }
        OptionRule::RequiredSingle => {
            if values.len() > 1 {
                issues.push(OptionIssue::MoreThanOne {
                    option: option.to_string(),
                });
            }
            if missing_value {
                issues.push(OptionIssue::MissingValue {
                    option: option.to_string(),
                });
            }
        }
        OptionRule::RequiredMulti => {
            if missing_value {
                issues.push(OptionIssue::MissingValue {
                    option: option.to_string(),
                });
            }
        }
    }
    issues
}

/// Check `args` against `rules` and `incompatible` pairs.
pub fn check(
    args: &ArgsMap,
    rules: &[(&str, OptionRule)],
    incompatible: &[(&str, &str)],
) -> Result<(), OptionsError> {
    let mut issues = Vec::new();

    for (first, second) in incompatible {
        if args.contains_key(*first) && args.contains_key(*second) {
            issues.push(OptionIssue::Incompatible {
                first: first.to_string(),
                second: second.to_string(),
            });
        }
    }

    for (option, values) in args {
        match rules.iter().find(|(name, _)| name == option) {
            Some((_, rule)) => issues.extend(check_rule(option, *rule, values)),
            None => issues.push(OptionIssue::Unknown {
                option: option.clone(),
            }),
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(OptionsError { issues })
    }
}

/// What happens to backups once a run succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackupPolicy {
    /// Keep backup files next to the originals.
    Keep,
    /// Back up, then delete the backups on success.
    #[default]
    Discard,
    /// Do not back up at all.
    Skip,
}

/// Validated inputs of a patch run.
#[derive(Debug, Clone, Default)]
pub struct PatchOptions {
    pub qt_dir: Option<PathBuf>,
    pub new_dir: Option<PathBuf>,
    pub old_dirs: Vec<String>,
    pub backup: BackupPolicy,
    pub force: bool,
    /// Overrides the platform default for case-insensitive matching.
    pub case_fold: Option<bool>,
    /// Pattern table replacing the built-in one.
    pub patterns: Option<PathBuf>,
}

impl PatchOptions {
    /// Validate `args` and convert them.
    pub fn from_args(args: &ArgsMap) -> Result<Self, OptionsError> {
        check(args, PATCH_OPTION_RULES, INCOMPATIBLE_OPTIONS)?;

        let single = |name: &str| {
            args.get(name)
                .and_then(|values| values.first())
                .map(PathBuf::from)
        };

        let backup = if args.contains_key("nobackup") {
            BackupPolicy::Skip
        } else if args.contains_key("backup") {
            BackupPolicy::Keep
        } else {
            BackupPolicy::Discard
        };

        let case_fold = if args.contains_key("ignore-case") {
            Some(true)
        } else if args.contains_key("match-case") {
            Some(false)
        } else {
            None
        };

        Ok(Self {
            qt_dir: single("qt-dir"),
            new_dir: single("new-dir"),
            old_dirs: args.get("old-dir").cloned().unwrap_or_default(),
            backup,
            force: args.contains_key("force"),
            case_fold,
            patterns: single("patterns"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(entries: &[(&str, &[&str])]) -> ArgsMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_single_value_both_violations_reported() {
        let issues = check_rule(
            "qt-dir",
            OptionRule::RequiredSingle,
            &["".to_string(), "/opt/qt".to_string()],
        );
        assert_eq!(
            issues,
            vec![
                OptionIssue::MoreThanOne {
                    option: "qt-dir".into()
                },
                OptionIssue::MissingValue {
                    option: "qt-dir".into()
                },
            ]
        );
    }

    #[test]
    fn test_single_value_only_one_violation() {
        let issues = check_rule(
            "qt-dir",
            OptionRule::RequiredSingle,
            &["/a".to_string(), "/b".to_string()],
        );
        assert_eq!(issues.len(), 1);
        assert!(matches!(issues[0], OptionIssue::MoreThanOne { .. }));
    }

    #[test]
    fn test_multi_value_allows_repeats() {
        let issues = check_rule(
            "old-dir",
            OptionRule::RequiredMulti,
            &["/a".to_string(), "/b".to_string()],
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn test_flag_with_value() {
        let issues = check_rule("force", OptionRule::Forbidden, &["yes".to_string()]);
        assert!(matches!(issues[0], OptionIssue::ValueNotAllowed { .. }));
    }

    #[test]
    fn test_incompatible_and_unknown() {
        let map = args(&[("backup", &[""]), ("nobackup", &[""]), ("bogus", &[""])]);
        let err = PatchOptions::from_args(&map).unwrap_err();
        assert!(err.issues.contains(&OptionIssue::Incompatible {
            first: "backup".into(),
            second: "nobackup".into()
        }));
        assert!(err.issues.contains(&OptionIssue::Unknown {
            option: "bogus".into()
        }));
    }

    #[test]
    fn test_from_args() {
        let map = args(&[
            ("qt-dir", &["/opt/qt5"]),
            ("old-dir", &["/build/a", "/build/b"]),
            ("backup", &[""]),
            ("force", &[""]),
        ]);
        let opts = PatchOptions::from_args(&map).unwrap();
        assert_eq!(opts.qt_dir, Some(PathBuf::from("/opt/qt5")));
        assert_eq!(opts.new_dir, None);
        assert_eq!(opts.old_dirs, vec!["/build/a", "/build/b"]);
        assert_eq!(opts.backup, BackupPolicy::Keep);
        assert!(opts.force);
        assert_eq!(opts.case_fold, None);
    }

    #[test]
    fn test_default_backup_policy() {
        let opts = PatchOptions::from_args(&ArgsMap::new()).unwrap();
        assert_eq!(opts.backup, BackupPolicy::Discard);
        let opts = PatchOptions::from_args(&args(&[("nobackup", &[""])])).unwrap();
        assert_eq!(opts.backup, BackupPolicy::Skip);
    }
}
