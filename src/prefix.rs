//! Substitution tables: which old byte sequences become which new ones.
//!
//! Text files get full path substitutions in every separator spelling. Binary
//! files get `tag=path` substitutions, one per known qmake variable, where the
//! tag identifies the fixed-size field the path is stored in.

use crate::platform::{self, TargetOs};
use crate::qmake::KeyValueTable;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrefixError {
    #[error("qmake reported no QT_INSTALL_PREFIX")]
    MissingInstallPrefix,

    #[error("{variable} = {value:?} does not start with {class} prefix {prefix:?}")]
    OutsidePrefix {
        variable: String,
        value: String,
        class: VariableClass,
        prefix: String,
    },
}

/// Ordered old → new mapping. Iteration follows the natural order of the old
/// values, so a patch pass is reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionTable {
    pairs: BTreeMap<String, String>,
}

impl SubstitutionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pair; a repeated old value keeps the latest new value.
    pub fn insert(&mut self, old: impl Into<String>, new: impl Into<String>) {
        self.pairs.insert(old.into(), new.into());
    }

    pub fn get(&self, old: &str) -> Option<&str> {
        self.pairs.get(old).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.pairs
            .iter()
            .map(|(old, new)| (old.as_bytes(), new.as_bytes()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn log(&self, title: &str) {
        debug!("{title}:");
        for (old, new) in &self.pairs {
            debug!("  {old:?} -> {new:?}");
        }
    }
}

/// Which prefix a qmake variable must live under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableClass {
    Install,
    Host,
}

impl VariableClass {
    /// Classify `QT_INSTALL_*` and `QT_HOST_*` keys. Qualified keys such as
    /// `QT_INSTALL_PREFIX/get` are not classified.
    pub fn of(key: &str) -> Option<Self> {
        if key.contains('/') {
            return None;
        }
        if key.starts_with("QT_INSTALL_") {
            Some(VariableClass::Install)
        } else if key.starts_with("QT_HOST_") {
            Some(VariableClass::Host)
        } else {
            None
        }
    }
}

impl std::fmt::Display for VariableClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableClass::Install => f.write_str("install"),
            VariableClass::Host => f.write_str("host"),
        }
    }
}

/// A known binary field: qmake variable, field tag, and the directory the
/// field points at below the installation root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryTag {
    pub variable: &'static str,
    pub tag: &'static str,
    pub sub_dir: Option<&'static str>,
}

const fn tag(variable: &'static str, tag: &'static str, sub_dir: Option<&'static str>) -> BinaryTag {
    BinaryTag {
        variable,
        tag,
        sub_dir,
    }
}

pub const BINARY_TAGS: &[BinaryTag] = &[
    tag("QT_INSTALL_PREFIX", "qt_prfxpath", None),
    tag("QT_INSTALL_ARCHDATA", "qt_adatpath", None),
    tag("QT_INSTALL_DOCS", "qt_docspath", Some("doc")),
    tag("QT_INSTALL_HEADERS", "qt_hdrspath", Some("include")),
    tag("QT_INSTALL_LIBS", "qt_libspath", Some("lib")),
    tag("QT_INSTALL_LIBEXECS", "qt_lbexpath", Some("libexec")),
    tag("QT_INSTALL_BINS", "qt_binspath", Some("bin")),
    tag("QT_INSTALL_PLUGINS", "qt_plugpath", Some("plugins")),
    tag("QT_INSTALL_IMPORTS", "qt_impspath", Some("imports")),
    tag("QT_INSTALL_QML", "qt_qml2path", Some("qml")),
    tag("QT_INSTALL_DATA", "qt_datapath", None),
    tag("QT_INSTALL_TRANSLATIONS", "qt_trnspath", Some("translations")),
    tag("QT_INSTALL_EXAMPLES", "qt_xmplpath", Some("examples")),
    tag("QT_INSTALL_DEMOS", "qt_demopath", Some("demos")),
    tag("QT_INSTALL_TESTS", "qt_tstspath", Some("tests")),
    tag("QT_HOST_PREFIX", "qt_hpfxpath", None),
    tag("QT_HOST_BINS", "qt_hbinpath", Some("bin")),
    tag("QT_HOST_DATA", "qt_hdatpath", None),
    tag("QT_HOST_LIBS", "qt_hlibpath", Some("lib")),
];

pub fn binary_tag(variable: &str) -> Option<&'static BinaryTag> {
    BINARY_TAGS.iter().find(|t| t.variable == variable)
}

/// `tag=value` as stored in binaries.
pub fn tagged_value(tag: &str, value: &str) -> String {
    format!("{tag}={value}")
}

/// Recognized variables with their class prefix stripped, normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuffixTable {
    suffixes: BTreeMap<String, String>,
}

impl SuffixTable {
    /// Strip the class prefix from every recognized variable.
    ///
    /// Fails on the first variable outside its prefix: qmake answered
    /// inconsistently and nothing derived from it can be trusted.
    pub fn build(vars: &KeyValueTable, case_fold: bool) -> Result<Self, PrefixError> {
        let install = vars
            .install_prefix()
            .map(platform::to_normal_separators)
            .ok_or(PrefixError::MissingInstallPrefix)?;
        let host = vars
            .host_prefix()
            .map(platform::to_normal_separators)
            .unwrap_or_else(|| install.clone());

        let mut suffixes = BTreeMap::new();
        for (key, value) in vars.iter() {
            let Some(class) = VariableClass::of(key) else {
                continue;
            };
            if value.is_empty() {
                debug!("variable {key:?} is empty in qmake output, skipping");
                continue;
            }
            if binary_tag(key).is_none() {
                debug!("variable {key:?} has no known binary tag, skipping");
                continue;
            }
            let prefix = match class {
                VariableClass::Install => &install,
                VariableClass::Host => &host,
            };
            let normal = platform::to_normal_separators(value);
            if !platform::path_starts_with(&normal, prefix, case_fold) {
                return Err(PrefixError::OutsidePrefix {
                    variable: key.to_string(),
                    value: value.to_string(),
                    class,
                    prefix: prefix.clone(),
                });
            }
            suffixes.insert(key.to_string(), normal[prefix.len()..].to_string());
        }
        Ok(Self { suffixes })
    }

    pub fn get(&self, variable: &str) -> Option<&str> {
        self.suffixes.get(variable).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.suffixes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.suffixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }
}

/// Text and binary substitution tables for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixTables {
    pub text: SubstitutionTable,
    pub binary: SubstitutionTable,
}

/// Builds [`PrefixTables`] from the qmake answer and the user's paths.
#[derive(Debug, Clone)]
pub struct PathPrefixTable<'a> {
    new_root: &'a str,
    os: TargetOs,
    case_fold: bool,
}

impl<'a> PathPrefixTable<'a> {
    /// `new_root` must use normal separators only.
    pub fn new(new_root: &'a str, os: TargetOs) -> Self {
        Self {
            new_root,
            os,
            case_fold: os.default_case_fold(),
        }
    }

    pub fn with_case_fold(mut self, case_fold: bool) -> Self {
        self.case_fold = case_fold;
        self
    }

    /// Build both tables. Errors leave no partial table behind.
    pub fn build(
        &self,
        vars: &KeyValueTable,
        old_dirs: &[String],
    ) -> Result<PrefixTables, PrefixError> {
        let install = vars
            .install_prefix()
            .ok_or(PrefixError::MissingInstallPrefix)?;

        let mut text = SubstitutionTable::new();
        self.add_text_pairs(&mut text, &platform::to_normal_separators(install));
        for old in old_dirs {
            self.add_text_pairs(&mut text, &platform::to_normal_separators(old));
        }

        let binary = self.binary_pairs(vars)?;

        text.log("patch values for text files");
        binary.log("patch values for binary files");
        Ok(PrefixTables { text, binary })
    }

    /// Register `old` in each separator spelling. Empty `old` is ignored.
    pub fn add_text_pairs(&self, table: &mut SubstitutionTable, old: &str) {
        debug_assert!(platform::has_only_normal_separators(old));
        if old.is_empty() {
            return;
        }

        table.insert(old, self.new_root);
        table.insert(old.replace('/', "\\"), self.new_root);

        if self.os == TargetOs::Windows {
            // Escaped spelling written into generated qmake files.
            table.insert(old.replace('/', "\\\\"), self.new_root.replace('/', "\\\\"));
        }
    }

    /// Binary pairs for every recognized install/host variable.
    ///
    /// Pairs are built from the [`SuffixTable`], so a variable outside its
    /// prefix fails the whole table before any pair exists.
    pub fn binary_pairs(&self, vars: &KeyValueTable) -> Result<SubstitutionTable, PrefixError> {
        let suffixes = SuffixTable::build(vars, self.case_fold)?;

        let new_root_native = platform::to_native_separators(self.new_root, self.os);
        let sep = self.os.native_separator();

        let mut table = SubstitutionTable::new();
        for (key, suffix) in suffixes.iter() {
            let (Some(field), Some(value)) = (binary_tag(key), vars.get(key)) else {
                continue;
            };
            let new_value = match field.sub_dir {
                Some(dir) => format!("{new_root_native}{sep}{dir}"),
                None => new_root_native.clone(),
            };
            let expected = field.sub_dir.map(|dir| format!("/{dir}")).unwrap_or_default();
            if suffix != expected {
                debug!("{key} sits at {suffix:?} below its prefix, relocating to {new_value:?}");
            }
            table.insert(
                tagged_value(field.tag, value),
                tagged_value(field.tag, &new_value),
            );
        }

        for field in BINARY_TAGS {
            if vars.get(field.variable).is_none() {
                debug!("variable {:?} not found in qmake output", field.variable);
            }
        }
        Ok(table)
    }
}
