//! Transactional replacement of libraries in a game folder.
//!
//! The installer moves through [`InstallPhase`] states: originals are backed
//! up into [`BACKUP_DIR_NAME`], staged files are copied in, and every file is
//! verified. Per-file failures never abort the batch. Restore copies the
//! backup back and removes it.
//!
//! The backup directory also carries [`INSTALLED_MANIFEST`], the names this
//! installer has placed in the game folder. A later install with a larger
//! file set backs up only the originals it has not seen yet.

use crate::diagnostics::Diagnostics;
use crate::error::{ErrorClass, InstallerError};
use crate::outcome::{FailureReason, FileFailure, InstallResult};
use crate::permissions::{WriteAccess, clear_readonly, folder_hint, locked_file_hint};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the backup directory created inside the game folder.
pub const BACKUP_DIR_NAME: &str = "dxvk_backup";

/// Manifest inside the backup directory naming libraries installed by DXVK.
///
/// Listed files are never backed up as originals and never restored.
pub const INSTALLED_MANIFEST: &str = ".dxvk_installed";

/// States of one install transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallPhase {
    /// Nothing has happened yet.
    Idle,
    /// Originals are being copied into the backup.
    BackingUp,
    /// Staged files are being copied into the game folder.
    Installing,
    /// Installed files are being checked.
    Verifying,
    /// At least one file is installed and verified.
    Committed,
    /// The attempt was undone; the game folder is as it was.
    RolledBack,
    /// The attempt stopped without installing anything.
    Failed,
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::BackingUp => "backing up",
            Self::Installing => "installing",
            Self::Verifying => "verifying",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Result of [`FileInstaller::install`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutcome {
    /// Terminal install result.
    pub result: InstallResult,
    /// Terminal transaction state.
    pub phase: InstallPhase,
    /// Every state entered after [`InstallPhase::Idle`], in order.
    pub phases: Vec<InstallPhase>,
    /// Per-file failures recorded while installing.
    pub failures: Vec<FileFailure>,
}

/// Return the backup directory path for a game folder.
#[must_use]
pub fn backup_dir(target_dir: &Path) -> PathBuf {
    target_dir.join(BACKUP_DIR_NAME)
}

/// Returns true when `target_dir` holds a backup from an earlier install.
///
/// # Examples
///
/// ```
/// use dxvk_installer::transaction::backup_exists;
///
/// let temp = tempfile::tempdir()?;
/// assert!(!backup_exists(temp.path()));
/// std::fs::create_dir(temp.path().join("dxvk_backup"))?;
/// assert!(backup_exists(temp.path()));
/// # Ok::<(), std::io::Error>(())
/// ```
#[must_use]
pub fn backup_exists(target_dir: &Path) -> bool {
    backup_dir(target_dir).is_dir()
}

/// Check that `target_dir` is an existing directory.
///
/// # Errors
///
/// Returns [`InstallerError::InvalidTarget`] when the path is missing or is
/// not a directory.
pub fn validate_target(target_dir: &Path) -> Result<(), InstallerError> {
    if target_dir.is_dir() {
        return Ok(());
    }
    let reason = if target_dir.exists() {
        "not a directory"
    } else {
        "does not exist"
    };
    Err(InstallerError::InvalidTarget {
        path: target_dir.to_path_buf(),
        reason: reason.to_owned(),
    })
}

/// Copies staged libraries into a game folder with backup and verification.
pub struct FileInstaller<'a> {
    access: &'a dyn WriteAccess,
}

impl<'a> FileInstaller<'a> {
    /// Create an installer using `access` for write checks.
    #[must_use]
    pub fn new(access: &'a dyn WriteAccess) -> Self {
        Self { access }
    }

    /// Install `files` from `staging_dir` into `target_dir`.
    ///
    /// With `backup_enabled`, existing copies of `files` are saved into the
    /// backup directory first. Files already in the backup are never
    /// overwritten, and files an earlier install placed are never captured.
    pub fn install(
        &self,
        staging_dir: &Path,
        target_dir: &Path,
        files: &[String],
        backup_enabled: bool,
        trail: &mut Diagnostics,
    ) -> TransactionOutcome {
        let mut tx = Transaction::new(target_dir);

        if let Err(err) = self.check_target(target_dir) {
            return tx.fail(err);
        }

        let backup = if backup_enabled {
            tx.enter(InstallPhase::BackingUp);
            match back_up(target_dir, files, trail) {
                Ok(backup) => Some(backup),
                Err(failure) => return tx.abort_backup(failure, trail),
            }
        } else {
            None
        };

        tx.enter(InstallPhase::Installing);
        let mut touched_live = false;
        for file in files {
            self.install_one(staging_dir, target_dir, file, &mut tx, &mut touched_live, trail);
        }

        tx.enter(InstallPhase::Verifying);
        let (verified, missing) = verify(staging_dir, target_dir, files, &tx.failures, trail);

        if verified.is_empty() && !touched_live {
            if let Some(created) = backup.as_ref().filter(|b| b.created_dir) {
                created.discard(trail);
                tx.enter(InstallPhase::RolledBack);
            }
        }
        if !verified.is_empty() && backup_exists(target_dir) {
            record_installed(&backup_dir(target_dir), &verified, trail);
        }
        tx.finish(verified, missing)
    }

    fn check_target(&self, target_dir: &Path) -> Result<(), InstallerError> {
        validate_target(target_dir)?;
        self.access
            .probe_dir(target_dir)
            .map_err(|err| InstallerError::TargetNotWritable {
                path: target_dir.to_path_buf(),
                reason: err.to_string(),
                hint: folder_hint(target_dir),
            })
    }

    fn install_one(
        &self,
        staging_dir: &Path,
        target_dir: &Path,
        file: &str,
        tx: &mut Transaction,
        touched_live: &mut bool,
        trail: &mut Diagnostics,
    ) {
        let source = staging_dir.join(file);
        if !source.is_file() {
            return;
        }
        let dest = target_dir.join(file);

        let prepared = if dest.exists() {
            clear_readonly(&dest)
                .map(drop)
                .and_then(|()| self.access.check_file(&dest))
        } else {
            Ok(())
        };
        let copied = prepared.and_then(|()| {
            *touched_live = true;
            fs::copy(&source, &dest).map(drop)
        });

        match copied {
            Ok(()) => trail.info(format!("Installed {file}")),
            Err(err) => {
                let failure = FileFailure::from_io(file, &err);
                trail.warn(format!("Could not install {failure}"));
                tx.failures.push(failure);
            }
        }
    }

    /// Copy the backup back into `target_dir` and delete it.
    ///
    /// Returns `false` when there is no backup, the backup is empty, or any
    /// file fails to restore; the backup is kept in every such case. Files
    /// restored before a failure stay restored.
    pub fn restore(&self, target_dir: &Path, trail: &mut Diagnostics) -> bool {
        let backup = backup_dir(target_dir);
        if !backup.is_dir() {
            trail.error(format!("No backup found in {}", target_dir.display()));
            return false;
        }

        let files = match backup_files(&backup) {
            Ok(files) => files,
            Err(err) => {
                trail.error(format!("Cannot read backup {}: {err}", backup.display()));
                return false;
            }
        };
        if files.is_empty() {
            trail.error(format!("Backup {} is empty; nothing to restore", backup.display()));
            return false;
        }

        for name in &files {
            if let Err(err) = self.restore_one(&backup, target_dir, name) {
                let failure = FileFailure::from_io(name, &err);
                trail.error(format!("Could not restore {failure}"));
                if failure.class == ErrorClass::PermissionDenied {
                    trail.error(locked_file_hint());
                }
                return false;
            }
            trail.info(format!("Restored {name}"));
        }

        match fs::remove_dir_all(&backup) {
            Ok(()) => trail.info(format!("Removed backup {}", backup.display())),
            Err(err) => trail.warn(format!(
                "Restored files but could not remove {}: {err}",
                backup.display()
            )),
        }
        true
    }

    fn restore_one(&self, backup: &Path, target_dir: &Path, name: &str) -> io::Result<()> {
        let dest = target_dir.join(name);
        if dest.exists() {
            clear_readonly(&dest)?;
            self.access.check_file(&dest)?;
        }
        fs::copy(backup.join(name), &dest).map(drop)
    }
}

/// Phase bookkeeping for one install attempt.
struct Transaction {
    target_dir: PathBuf,
    phase: InstallPhase,
    phases: Vec<InstallPhase>,
    failures: Vec<FileFailure>,
}

impl Transaction {
    fn new(target_dir: &Path) -> Self {
        Self {
            target_dir: target_dir.to_path_buf(),
            phase: InstallPhase::Idle,
            phases: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn enter(&mut self, next: InstallPhase) {
        log::debug!(
            "install transaction for {}: {} -> {next}",
            self.target_dir.display(),
            self.phase
        );
        self.phase = next;
        self.phases.push(next);
    }

    fn into_outcome(self, result: InstallResult) -> TransactionOutcome {
        TransactionOutcome {
            result,
            phase: self.phase,
            phases: self.phases,
            failures: self.failures,
        }
    }

    fn fail(mut self, err: InstallerError) -> TransactionOutcome {
        self.enter(InstallPhase::Failed);
        self.into_outcome(InstallResult::failed(err))
    }

    fn abort_backup(mut self, failure: BackupFailure, trail: &mut Diagnostics) -> TransactionOutcome {
        let rolled_back = failure.partial.is_some();
        if let Some(partial) = failure.partial {
            partial.discard(trail);
        }
        let err = InstallerError::BackupFailed {
            path: backup_dir(&self.target_dir),
            source: failure.source,
        };
        trail.error(err.to_string());
        if rolled_back {
            self.enter(InstallPhase::RolledBack);
            self.into_outcome(InstallResult::failed(err))
        } else {
            self.fail(err)
        }
    }

    fn finish(mut self, verified: Vec<String>, missing: Vec<String>) -> TransactionOutcome {
        let failures = &self.failures;
        let target_dir = &self.target_dir;
        let result = InstallResult::from_verification(verified, missing, || {
            nothing_installed_reason(target_dir, failures)
        });
        if self.phase != InstallPhase::RolledBack {
            let next = if result.is_success() {
                InstallPhase::Committed
            } else {
                InstallPhase::Failed
            };
            self.enter(next);
        }
        self.into_outcome(result)
    }
}

fn nothing_installed_reason(target_dir: &Path, failures: &[FileFailure]) -> FailureReason {
    let all_denied = !failures.is_empty()
        && failures
            .iter()
            .all(|f| f.class == ErrorClass::PermissionDenied);
    let details = if failures.is_empty() {
        "no staged file was found".to_owned()
    } else {
        failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    };

    if all_denied {
        FailureReason::new(
            ErrorClass::PermissionDenied,
            format!(
                "no file could be installed into {}: {details}. {}",
                target_dir.display(),
                locked_file_hint()
            ),
        )
    } else {
        FailureReason::new(
            ErrorClass::Io,
            format!(
                "no file could be installed into {}: {details}",
                target_dir.display()
            ),
        )
    }
}

/// A backup written by the current attempt.
struct BackupSet {
    dir: PathBuf,
    created_dir: bool,
    added: Vec<PathBuf>,
}

impl BackupSet {
    /// Remove what this attempt added to the backup.
    fn discard(&self, trail: &mut Diagnostics) {
        for path in &self.added {
            if let Err(err) = fs::remove_file(path) {
                trail.warn(format!("Could not remove {}: {err}", path.display()));
            }
        }
        if self.created_dir {
            if let Err(err) = fs::remove_dir(&self.dir) {
                trail.warn(format!("Could not remove {}: {err}", self.dir.display()));
            }
        }
    }
}

struct BackupFailure {
    source: io::Error,
    /// Present when the backup directory was created and must be undone.
    partial: Option<BackupSet>,
}

fn back_up(
    target_dir: &Path,
    files: &[String],
    trail: &mut Diagnostics,
) -> Result<BackupSet, BackupFailure> {
    let dir = backup_dir(target_dir);
    let created_dir = if dir.is_dir() {
        trail.info(format!(
            "Keeping existing backup in {}; adding only originals it lacks",
            dir.display()
        ));
        false
    } else {
        fs::create_dir(&dir).map_err(|source| BackupFailure {
            source,
            partial: None,
        })?;
        true
    };
    let installed = read_manifest(&dir, trail);
    let mut set = BackupSet {
        dir,
        created_dir,
        added: Vec::new(),
    };

    for file in files {
        let original = target_dir.join(file);
        let copy = set.dir.join(file);
        if !original.is_file() || copy.exists() || installed.contains(file) {
            continue;
        }
        if let Err(source) = fs::copy(&original, &copy) {
            if copy.exists() {
                set.added.push(copy);
            }
            return Err(BackupFailure {
                source,
                partial: Some(set),
            });
        }
        trail.info(format!("Backed up {file}"));
        set.added.push(copy);
    }
    Ok(set)
}

/// Names recorded in the manifest; a missing or unreadable one is empty.
fn read_manifest(backup: &Path, trail: &mut Diagnostics) -> BTreeSet<String> {
    match fs::read_to_string(backup.join(INSTALLED_MANIFEST)) {
        Ok(text) => text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeSet::new(),
        Err(err) => {
            trail.warn(format!("Cannot read {INSTALLED_MANIFEST}: {err}"));
            BTreeSet::new()
        }
    }
}

fn record_installed(backup: &Path, verified: &[String], trail: &mut Diagnostics) {
    let mut names = read_manifest(backup, trail);
    names.extend(verified.iter().cloned());
    let mut text = names.into_iter().collect::<Vec<_>>().join("\n");
    text.push('\n');
    if let Err(err) = fs::write(backup.join(INSTALLED_MANIFEST), text) {
        trail.warn(format!("Could not update {INSTALLED_MANIFEST}: {err}"));
    }
}

fn verify(
    staging_dir: &Path,
    target_dir: &Path,
    files: &[String],
    failures: &[FileFailure],
    trail: &mut Diagnostics,
) -> (Vec<String>, Vec<String>) {
    let mut verified = Vec::new();
    let mut missing = Vec::new();
    for file in files {
        let failed = failures.iter().any(|failure| &failure.file == file);
        let in_place = !failed
            && matches_staged(&staging_dir.join(file), &target_dir.join(file)).unwrap_or(false);
        if in_place {
            verified.push(file.clone());
        } else {
            trail.warn(format!("{file} is not in place after install"));
            missing.push(file.clone());
        }
    }
    (verified, missing)
}

/// True when `installed` holds the same bytes as `staged`.
fn matches_staged(staged: &Path, installed: &Path) -> io::Result<bool> {
    if fs::metadata(staged)?.len() != fs::metadata(installed)?.len() {
        return Ok(false);
    }
    Ok(fs::read(staged)? == fs::read(installed)?)
}

fn backup_files(backup: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(backup)? {
        let entry = entry?;
        if entry.file_type()?.is_file() && entry.file_name() != INSTALLED_MANIFEST {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
#[path = "transaction_tests.rs"]
mod tests;
