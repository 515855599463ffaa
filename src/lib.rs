//! qt-binpatcher: relocate a moved Qt installation
//!
//! A Qt build hardcodes its installation prefix into text files (`.prl`,
//! `.pc`, `.pri`, `qmake.conf`) and into binaries (qmake, QtCore), where each
//! path sits in a fixed-size `tag=path` field. After moving the installation
//! these paths have to be rewritten before qmake and the libraries work again.
//!
//! # Architecture
//!
//! - [`qmake`] asks `qmake -query` where the installation was built.
//! - [`prefix`] turns that answer into old → new [`SubstitutionTable`]s.
//! - [`fileset`] lists the files to patch from a TOML pattern table.
//! - [`patch`] rewrites text files (lengths may change) and binaries (lengths
//!   never change, shorter values are zero padded, longer ones rejected).
//! - [`backup`] snapshots every file first and restores them all if anything
//!   fails, with an on-disk manifest for recovery after a crash.
//! - [`relocate`] runs the whole sequence.
//!
//! # Example
//!
//! ```no_run
//! use qt_binpatcher::{PatchOptions, Relocator};
//! use std::path::PathBuf;
//!
//! let opts = PatchOptions {
//!     qt_dir: Some(PathBuf::from("/home/user/Qt/5.15.2/gcc_64")),
//!     ..PatchOptions::default()
//! };
//!
//! match Relocator::new().and_then(|r| r.run(&opts)) {
//!     Ok(outcome) => println!("{outcome:?}"),
//!     Err(e) => eprintln!("relocation failed: {e}"),
//! }
//! ```

pub mod backup;
pub mod fileset;
pub mod logging;
pub mod options;
pub mod patch;
pub mod platform;
pub mod prefix;
pub mod qmake;
pub mod relocate;

// Re-exports
pub use backup::{recover, BackupError, BackupMode, BackupSession, RecoverError, RestoreError};
pub use fileset::{FileFinder, FileSetError, FileSetResolver, FileSets, WalkdirFinder};
pub use options::{ArgsMap, BackupPolicy, OptionRule, OptionsError, PatchOptions};
pub use patch::{BinaryPatcher, GrowthViolation, PatchError, TextPatcher};
pub use platform::TargetOs;
pub use prefix::{PathPrefixTable, PrefixError, PrefixTables, SubstitutionTable, SuffixTable};
pub use qmake::{KeyValueTable, QMake, QueryError};
pub use relocate::{RelocateError, Relocator, RunOutcome};
