//! End-to-end relocation runs against a fake Qt installation.
//!
//! qmake is replaced by a shell script that prints a fixed `-query` answer,
//! so these tests only run on Unix hosts.

#![cfg(unix)]

use qt_binpatcher::backup::manifest_path;
use qt_binpatcher::{
    BackupError, BackupPolicy, PatchError, PatchOptions, RelocateError, Relocator, RunOutcome,
    TargetOs,
};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PC_FILE: &str = "prefix=/opt/qt5\nlibdir=/opt/qt5/lib\nincludedir=/opt/qt5/include\n";
const PRL_FILE: &str = "QMAKE_PRL_BUILD_DIR = /opt/qt5/src/corelib\n";

/// Binary with two NUL-padded path fields of 64 bytes each.
fn core_library() -> Vec<u8> {
    let mut data = b"\x7fELF\x02\x01\x01".to_vec();
    for field in ["qt_prfxpath=/opt/qt5", "qt_libspath=/opt/qt5/lib"] {
        let mut bytes = field.as_bytes().to_vec();
        bytes.resize(64, 0);
        data.extend_from_slice(&bytes);
    }
    data.extend_from_slice(b"\x00trailer");
    data
}

/// Write an executable script answering `-query` with `prefix`.
///
/// The script fails when `bin/qt.conf` is present, the same way a real
/// qmake would report the paths from qt.conf instead of its own.
fn write_fake_qmake(qt_dir: &Path, prefix: &str) {
    let script = format!(
        "#!/bin/sh\n\
[ -f \"$(dirname \"$0\")/qt.conf\" ] && exit 3\n\
cat <<'EOF'\n\
QT_SYSROOT:\n\
QT_INSTALL_PREFIX:{prefix}\n\
QT_INSTALL_LIBS:{prefix}/lib\n\
QT_INSTALL_HEADERS:{prefix}/include\n\
QT_INSTALL_PREFIX/get:{prefix}\n\
QT_VERSION:5.15.2\n\
EOF\n"
    );
    let path = qt_dir.join("bin/qmake");
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// A Qt 5 Linux installation that claims to live in `/opt/qt5`.
fn setup_installation() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("bin")).unwrap();
    fs::create_dir_all(root.join("lib/pkgconfig")).unwrap();

    write_fake_qmake(root, "/opt/qt5");
    fs::write(root.join("lib/pkgconfig/Qt5Core.pc"), PC_FILE).unwrap();
    fs::write(root.join("lib/Qt5Core.prl"), PRL_FILE).unwrap();
    fs::write(root.join("lib/libQt5Core.so.5"), core_library()).unwrap();
    dir
}

fn relocator(dir: &TempDir) -> Relocator {
    Relocator::new()
        .unwrap()
        .with_os(TargetOs::Linux)
        .with_cwd(dir.path())
}

fn options(dir: &TempDir, new_dir: &str) -> PatchOptions {
    PatchOptions {
        qt_dir: Some(dir.path().to_path_buf()),
        new_dir: Some(PathBuf::from(new_dir)),
        ..PatchOptions::default()
    }
}

fn backups_in(dir: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().contains(".bak"))
        .map(|e| e.into_path())
        .collect()
}

#[test]
fn test_patch_text_and_binary_files() {
    let dir = setup_installation();
    let outcome = relocator(&dir).run(&options(&dir, "/q5")).unwrap();

    match outcome {
        RunOutcome::Patched {
            new_dir,
            text_files,
            binary_files,
            ..
        } => {
            assert_eq!(new_dir, "/q5");
            assert_eq!(text_files, 2);
            // bin/qmake and lib/libQt5Core.so.5
            assert_eq!(binary_files, 2);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let pc = fs::read_to_string(dir.path().join("lib/pkgconfig/Qt5Core.pc")).unwrap();
    assert_eq!(pc, "prefix=/q5\nlibdir=/q5/lib\nincludedir=/q5/include\n");
    let prl = fs::read_to_string(dir.path().join("lib/Qt5Core.prl")).unwrap();
    assert_eq!(prl, "QMAKE_PRL_BUILD_DIR = /q5/src/corelib\n");

    let lib = fs::read(dir.path().join("lib/libQt5Core.so.5")).unwrap();
    let original = core_library();
    assert_eq!(lib.len(), original.len());

    let mut prefix_field = b"qt_prfxpath=/q5".to_vec();
    prefix_field.resize(64, 0);
    assert_eq!(&lib[7..71], &prefix_field[..]);
    let mut libs_field = b"qt_libspath=/q5/lib".to_vec();
    libs_field.resize(64, 0);
    assert_eq!(&lib[71..135], &libs_field[..]);
    assert!(lib.ends_with(b"\x00trailer"));

    // Default policy: backups are gone, and so is the manifest.
    assert!(backups_in(dir.path()).is_empty());
    assert!(!manifest_path(dir.path()).exists());
}

#[test]
fn test_not_needed_when_already_in_place() {
    let dir = setup_installation();
    let here = dir.path().to_str().unwrap().to_string();
    write_fake_qmake(dir.path(), &here);
    fs::write(dir.path().join("bin/qt.conf"), "[Paths]\nPrefix=..\n").unwrap();

    let opts = PatchOptions {
        qt_dir: Some(dir.path().to_path_buf()),
        ..PatchOptions::default()
    };
    let outcome = relocator(&dir).run(&opts).unwrap();
    assert_eq!(outcome, RunOutcome::NotNeeded { qt_dir: here });

    // Nothing touched, qt.conf back in place.
    assert_eq!(
        fs::read_to_string(dir.path().join("lib/pkgconfig/Qt5Core.pc")).unwrap(),
        PC_FILE
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("bin/qt.conf")).unwrap(),
        "[Paths]\nPrefix=..\n"
    );
    assert!(backups_in(dir.path()).is_empty());
}

#[test]
fn test_relative_qt_dir_from_bin() {
    let dir = setup_installation();
    let here = dir.path().to_str().unwrap().to_string();
    write_fake_qmake(dir.path(), &here);

    let opts = PatchOptions {
        qt_dir: Some(PathBuf::from("..")),
        ..PatchOptions::default()
    };
    let outcome = Relocator::new()
        .unwrap()
        .with_os(TargetOs::Linux)
        .with_cwd(dir.path().join("bin"))
        .run(&opts)
        .unwrap();
    assert_eq!(outcome, RunOutcome::NotNeeded { qt_dir: here });
    assert_eq!(
        fs::read_to_string(dir.path().join("lib/pkgconfig/Qt5Core.pc")).unwrap(),
        PC_FILE
    );
}

#[test]
fn test_force_patches_in_place() {
    let dir = setup_installation();
    let here = dir.path().to_str().unwrap().to_string();
    write_fake_qmake(dir.path(), &here);
    fs::write(
        dir.path().join("lib/pkgconfig/Qt5Core.pc"),
        format!("prefix={here}\n"),
    )
    .unwrap();

    let opts = PatchOptions {
        qt_dir: Some(dir.path().to_path_buf()),
        force: true,
        ..PatchOptions::default()
    };
    let outcome = relocator(&dir).run(&opts).unwrap();
    assert!(matches!(outcome, RunOutcome::Patched { .. }));
    assert_eq!(
        fs::read_to_string(dir.path().join("lib/pkgconfig/Qt5Core.pc")).unwrap(),
        format!("prefix={here}\n")
    );
}

#[test]
fn test_growth_rolls_back_every_file() {
    let dir = setup_installation();
    fs::write(dir.path().join("bin/qt.conf"), "[Paths]\n").unwrap();

    let err = relocator(&dir)
        .run(&options(&dir, "/a/much/longer/location/for/qt"))
        .unwrap_err();
    match err {
        RelocateError::Patch(PatchError::ValueGrew { path, .. }) => {
            assert_eq!(path, dir.path().join("lib/libQt5Core.so.5"));
        }
        other => panic!("unexpected error: {other}"),
    }

    // Text files were patched before the binary failed; all are restored.
    assert_eq!(
        fs::read_to_string(dir.path().join("lib/pkgconfig/Qt5Core.pc")).unwrap(),
        PC_FILE
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("lib/Qt5Core.prl")).unwrap(),
        PRL_FILE
    );
    assert_eq!(
        fs::read(dir.path().join("lib/libQt5Core.so.5")).unwrap(),
        core_library()
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("bin/qt.conf")).unwrap(),
        "[Paths]\n"
    );
    assert!(backups_in(dir.path()).is_empty());
    assert!(!manifest_path(dir.path()).exists());
}

#[test]
fn test_keep_policy_leaves_backups() {
    let dir = setup_installation();
    let opts = PatchOptions {
        backup: BackupPolicy::Keep,
        ..options(&dir, "/q5")
    };
    relocator(&dir).run(&opts).unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("lib/pkgconfig/Qt5Core.pc.bak")).unwrap(),
        PC_FILE
    );
    assert_eq!(
        fs::read(dir.path().join("lib/libQt5Core.so.5.bak")).unwrap(),
        core_library()
    );
    assert!(!manifest_path(dir.path()).exists());
}

#[test]
fn test_second_run_skips_earlier_backups() {
    let dir = setup_installation();
    let first = PatchOptions {
        backup: BackupPolicy::Keep,
        ..options(&dir, "/q5")
    };
    relocator(&dir).run(&first).unwrap();

    let second = PatchOptions {
        backup: BackupPolicy::Keep,
        ..options(&dir, "/q4")
    };
    match relocator(&dir).run(&second).unwrap() {
        RunOutcome::Patched {
            text_files,
            binary_files,
            ..
        } => {
            assert_eq!(text_files, 2);
            assert_eq!(binary_files, 2);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let lib = dir.path().join("lib");
    assert!(!lib.join("libQt5Core.so.5.bak.bak").exists());
    assert!(lib.join("libQt5Core.so.5.bak.1").exists());
    assert_eq!(fs::read(lib.join("libQt5Core.so.5.bak")).unwrap(), core_library());
}

#[test]
fn test_discard_policy_removes_qt_conf() {
    let dir = setup_installation();
    fs::write(dir.path().join("bin/qt.conf"), "[Paths]\n").unwrap();

    relocator(&dir).run(&options(&dir, "/q5")).unwrap();

    assert!(!dir.path().join("bin/qt.conf").exists());
    assert!(backups_in(dir.path()).is_empty());
}

#[test]
fn test_old_dir_patches_extra_prefix() {
    let dir = setup_installation();
    fs::write(
        dir.path().join("lib/Qt5Core.prl"),
        "QMAKE_PRL_BUILD_DIR = /build/qt5/src/corelib\n",
    )
    .unwrap();

    let opts = PatchOptions {
        old_dirs: vec!["/build/qt5".to_string()],
        ..options(&dir, "/q5")
    };
    relocator(&dir).run(&opts).unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("lib/Qt5Core.prl")).unwrap(),
        "QMAKE_PRL_BUILD_DIR = /q5/src/corelib\n"
    );
}

#[test]
fn test_pending_manifest_blocks_run() {
    let dir = setup_installation();
    fs::write(manifest_path(dir.path()), r#"{"version":1,"records":[]}"#).unwrap();

    let err = relocator(&dir).run(&options(&dir, "/q5")).unwrap_err();
    assert!(matches!(err, RelocateError::Backup(BackupError::Pending(_))));
    assert_eq!(
        fs::read_to_string(dir.path().join("lib/pkgconfig/Qt5Core.pc")).unwrap(),
        PC_FILE
    );
}

#[test]
fn test_unsupported_version_changes_nothing() {
    let dir = setup_installation();
    let script = "#!/bin/sh\necho QT_INSTALL_PREFIX:/opt/qt6\necho QT_VERSION:6.5.0\n";
    let qmake = dir.path().join("bin/qmake");
    fs::write(&qmake, script).unwrap();
    fs::set_permissions(&qmake, fs::Permissions::from_mode(0o755)).unwrap();

    let err = relocator(&dir).run(&options(&dir, "/q6")).unwrap_err();
    assert!(matches!(err, RelocateError::FileSet(_)));
    assert_eq!(
        fs::read_to_string(dir.path().join("lib/pkgconfig/Qt5Core.pc")).unwrap(),
        PC_FILE
    );
    assert!(!manifest_path(dir.path()).exists());
}
