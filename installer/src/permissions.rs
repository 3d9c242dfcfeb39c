//! Write-access checks for game folders and the files inside them.
//!
//! Game folders often live under protected system locations or contain
//! read-only or locked libraries. These helpers detect such conditions
//! before any file is replaced and produce remediation guidance.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

const PROBE_FILE_NAME: &str = ".dxvk-manager-write-test";

/// Environment variables naming protected program folders on Windows.
const PROGRAM_FILES_VARS: &[&str] = &["ProgramFiles", "ProgramFiles(x86)", "ProgramW6432"];

/// Filesystem write-access checks, abstracted for testing.
#[cfg_attr(test, mockall::automock)]
pub trait WriteAccess {
    /// Verify that new files can be created in `dir`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while creating the probe file.
    fn probe_dir(&self, dir: &Path) -> io::Result<()>;

    /// Verify that the existing file at `path` can be opened for writing.
    ///
    /// A missing file passes.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while opening the file.
    fn check_file(&self, path: &Path) -> io::Result<()>;
}

/// [`WriteAccess`] implementation that touches the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsWriteAccess;

impl WriteAccess for FsWriteAccess {
    fn probe_dir(&self, dir: &Path) -> io::Result<()> {
        let probe = dir.join(PROBE_FILE_NAME);
        fs::write(&probe, b"probe")?;
        if let Err(err) = fs::remove_file(&probe) {
            log::debug!("could not remove probe file {}: {err}", probe.display());
        }
        Ok(())
    }

    fn check_file(&self, path: &Path) -> io::Result<()> {
        if !path.exists() {
            return Ok(());
        }
        OpenOptions::new().write(true).open(path).map(drop)
    }
}

/// Clear the read-only flag on `path` if it is set.
///
/// Returns `true` when the permissions were changed.
///
/// # Errors
///
/// Returns an error if the metadata cannot be read or the permissions cannot
/// be updated.
pub fn clear_readonly(path: &Path) -> io::Result<bool> {
    let mut permissions = fs::metadata(path)?.permissions();
    if !permissions.readonly() {
        return Ok(false);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        permissions.set_mode(permissions.mode() | 0o200);
    }
    #[cfg(not(unix))]
    {
        permissions.set_readonly(false);
    }

    fs::set_permissions(path, permissions)?;
    log::debug!("cleared read-only flag on {}", path.display());
    Ok(true)
}

/// Protected locations that usually require elevation to modify.
///
/// On Windows these come from the Program Files environment variables; on
/// Unix `/usr` and `/opt` are included as well.
#[must_use]
pub fn privileged_roots() -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = PROGRAM_FILES_VARS
        .iter()
        .filter_map(std::env::var_os)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .collect();

    if cfg!(unix) {
        roots.push(PathBuf::from("/usr"));
        roots.push(PathBuf::from("/opt"));
    }
    roots
}

/// Return the protected root containing `path`, if any.
#[must_use]
pub fn privileged_root_of(path: &Path) -> Option<PathBuf> {
    privileged_roots()
        .into_iter()
        .find(|root| starts_with_ignoring_case(path, root))
}

fn starts_with_ignoring_case(path: &Path, root: &Path) -> bool {
    if cfg!(windows) {
        let path = path.to_string_lossy().to_lowercase();
        let root = root.to_string_lossy().to_lowercase();
        Path::new(&path).starts_with(Path::new(&root))
    } else {
        path.starts_with(root)
    }
}

/// Remediation guidance for a folder that cannot be written.
#[must_use]
pub fn folder_hint(path: &Path) -> String {
    match privileged_root_of(path) {
        Some(root) => format!(
            "The game folder is inside the protected location {}. Run dxvk-manager as \
             administrator (or with sudo), or move the game to a folder you own.",
            root.display()
        ),
        None => "Check that the folder is not read-only and that your user may write to it."
            .to_owned(),
    }
}

/// Remediation guidance for individual files that could not be replaced.
#[must_use]
pub fn locked_file_hint() -> &'static str {
    "Close the game and its launcher, and make sure antivirus software is not \
     locking the files."
}

#[cfg(test)]
mod tests {
    use super::*;

    /// True when the current process can write to read-only files anyway
    /// (for example when running as root).
    fn permissions_are_bypassed(dir: &Path) -> bool {
        let probe = dir.join("bypass-probe");
        fs::write(&probe, b"x").expect("write probe");
        let mut perms = fs::metadata(&probe).expect("metadata").permissions();
        perms.set_readonly(true);
        fs::set_permissions(&probe, perms).expect("set readonly");
        let bypassed = OpenOptions::new().write(true).open(&probe).is_ok();
        clear_readonly(&probe).expect("restore permissions");
        bypassed
    }

    #[test]
    fn probe_dir_leaves_no_file_behind() {
        let temp = tempfile::tempdir().expect("temp dir");
        FsWriteAccess.probe_dir(temp.path()).expect("probe");
        let leftovers = fs::read_dir(temp.path()).expect("read dir").count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn probe_dir_fails_for_missing_directory() {
        let temp = tempfile::tempdir().expect("temp dir");
        let err = FsWriteAccess
            .probe_dir(&temp.path().join("missing"))
            .expect_err("missing dir");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn check_file_accepts_missing_files() {
        let temp = tempfile::tempdir().expect("temp dir");
        assert!(FsWriteAccess.check_file(&temp.path().join("d3d11.dll")).is_ok());
    }

    #[test]
    fn check_file_does_not_truncate() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("d3d11.dll");
        fs::write(&path, b"original").expect("write");
        FsWriteAccess.check_file(&path).expect("check");
        assert_eq!(fs::read(&path).expect("read"), b"original");
    }

    #[test]
    fn clear_readonly_makes_file_writable() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("dxgi.dll");
        fs::write(&path, b"x").expect("write");
        let mut perms = fs::metadata(&path).expect("metadata").permissions();
        perms.set_readonly(true);
        fs::set_permissions(&path, perms).expect("set readonly");

        assert!(clear_readonly(&path).expect("clear"));
        assert!(!fs::metadata(&path).expect("metadata").permissions().readonly());
        assert!(!clear_readonly(&path).expect("second clear"));
    }

    #[test]
    fn check_file_rejects_readonly_file() {
        let temp = tempfile::tempdir().expect("temp dir");
        if permissions_are_bypassed(temp.path()) {
            return;
        }
        let path = temp.path().join("d3d9.dll");
        fs::write(&path, b"x").expect("write");
        let mut perms = fs::metadata(&path).expect("metadata").permissions();
        perms.set_readonly(true);
        fs::set_permissions(&path, perms).expect("set readonly");

        let err = FsWriteAccess.check_file(&path).expect_err("readonly");
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        clear_readonly(&path).expect("restore permissions");
    }

    #[test]
    fn program_files_variable_marks_privileged_location() {
        let temp = tempfile::tempdir().expect("temp dir");
        let game = temp.path().join("Steam").join("Quake");
        let root = temp.path().to_path_buf();
        temp_env::with_var("ProgramFiles", Some(root.as_os_str()), || {
            assert_eq!(privileged_root_of(&game), Some(root.clone()));
            assert!(folder_hint(&game).contains("administrator"));
        });
    }

    #[test]
    fn user_folder_hint_does_not_mention_elevation() {
        let temp = tempfile::tempdir().expect("temp dir");
        temp_env::with_vars(
            [
                ("ProgramFiles", None::<&str>),
                ("ProgramFiles(x86)", None),
                ("ProgramW6432", None),
            ],
            || {
                let game = temp.path().join("games");
                if privileged_root_of(&game).is_some() {
                    return;
                }
                assert!(!folder_hint(&game).contains("administrator"));
            },
        );
    }

    #[cfg(unix)]
    #[test]
    fn system_prefixes_are_privileged_on_unix() {
        assert_eq!(
            privileged_root_of(Path::new("/opt/games/quake")),
            Some(PathBuf::from("/opt"))
        );
    }
}
