use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use colored::Colorize;
use qt_binpatcher::logging::setup_logging;
use qt_binpatcher::platform;
use qt_binpatcher::{
    recover, ArgsMap, BackupPolicy, PatchOptions, QMake, Relocator, RunOutcome, TargetOs,
};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "qt-binpatcher")]
#[command(about = "Patch hardcoded paths in a moved Qt installation", long_about = None)]
#[command(version)]
struct Cli {
    /// Print extended runtime information
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Duplicate messages into this file
    #[arg(long, global = true, value_name = "FILE")]
    logfile: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Patch a Qt installation for its current or a new location
    Patch(PatchArgs),

    /// Restore the files of an interrupted patch run
    Recover {
        /// Qt directory (located from qmake in the current directory if not specified)
        #[arg(long)]
        qt_dir: Option<PathBuf>,
    },
}

#[derive(Args)]
struct PatchArgs {
    /// Directory where Qt or qmake is now located (may be relative).
    /// If not specified, qmake is searched in the current directory, then in its "bin" subdirectory
    #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = "")]
    qt_dir: Vec<String>,

    /// Directory where Qt will be located (may be relative).
    /// If not specified, the current location is used
    #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = "")]
    new_dir: Vec<String>,

    /// Directory where Qt was located. May be given more than once; replaced in text files only
    #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = "")]
    old_dir: Vec<String>,

    /// Keep the backup files after a successful run
    #[arg(long)]
    backup: bool,

    /// Don't create backup files. If an error occurs, the Qt installation can be damaged permanently
    #[arg(long)]
    nobackup: bool,

    /// Patch even if the old and new paths are the same
    #[arg(long)]
    force: bool,

    /// Match paths in text files case-insensitively (default on Windows)
    #[arg(long)]
    ignore_case: bool,

    /// Match paths in text files case-sensitively (default elsewhere)
    #[arg(long)]
    match_case: bool,

    /// TOML table of files to patch, replacing the built-in one
    #[arg(long, value_name = "FILE", num_args = 0..=1, default_missing_value = "")]
    patterns: Vec<String>,
}

impl PatchArgs {
    /// Raw option mapping, one value per occurrence.
    fn to_args_map(&self) -> ArgsMap {
        let mut map = ArgsMap::new();
        let valued = [
            ("qt-dir", &self.qt_dir),
            ("new-dir", &self.new_dir),
            ("old-dir", &self.old_dir),
            ("patterns", &self.patterns),
        ];
        for (name, values) in valued {
            if !values.is_empty() {
                map.insert(name.to_string(), values.clone());
            }
        }

        let flags = [
            ("backup", self.backup),
            ("nobackup", self.nobackup),
            ("force", self.force),
            ("ignore-case", self.ignore_case),
            ("match-case", self.match_case),
        ];
        for (name, set) in flags {
            if set {
                map.insert(name.to_string(), vec![String::new()]);
            }
        }
        map
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.verbose, cli.logfile.as_deref())?;

    match cli.command {
        Commands::Patch(args) => cmd_patch(&args),
        Commands::Recover { qt_dir } => cmd_recover(qt_dir),
    }
}

fn cmd_patch(args: &PatchArgs) -> Result<ExitCode> {
    let opts = match PatchOptions::from_args(&args.to_args_map()) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("{}", e.to_string().red());
            eprintln!();
            let mut cmd = Cli::command();
            if let Some(patch) = cmd.find_subcommand_mut("patch") {
                patch.print_help()?;
            }
            return Ok(ExitCode::FAILURE);
        }
    };

    match Relocator::new()?.run(&opts) {
        Ok(RunOutcome::NotNeeded { qt_dir }) => {
            println!("{} Qt in {} is already in place, nothing to patch", "⊙".yellow(), qt_dir);
            Ok(ExitCode::SUCCESS)
        }
        Ok(RunOutcome::Patched {
            qt_dir,
            new_dir,
            text_files,
            binary_files,
            replacements,
        }) => {
            println!("{} Patched Qt in {}", "✓".green(), qt_dir);
            println!();
            println!("{}", "Summary:".bold());
            println!("  new location: {}", new_dir);
            println!("  {} text files", format!("{}", text_files).green());
            println!("  {} binary files", format!("{}", binary_files).green());
            println!("  {} replacements", format!("{}", replacements).cyan());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e);
            if opts.backup == BackupPolicy::Skip {
                eprintln!(
                    "  {}",
                    "Backups were disabled: the installation may be damaged.".red()
                );
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn cmd_recover(qt_dir: Option<PathBuf>) -> Result<ExitCode> {
    let cwd = env::current_dir()?;
    let qt_dir = match qt_dir {
        Some(dir) => platform::absolute_path(&cwd, &dir),
        None => QMake::locate(None, &cwd, TargetOs::current())?
            .qt_dir()
            .to_path_buf(),
    };

    match recover(&qt_dir) {
        Ok(count) => {
            println!("{} Restored {} file(s) in {}", "✓".green(), count, qt_dir.display());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e);
            Ok(ExitCode::FAILURE)
        }
    }
}
