//! Error types for the DXVK installer.
//!
//! This module defines semantic error variants that provide actionable guidance
//! to users when installation fails. Every error maps onto an [`ErrorClass`] so
//! callers can distinguish "stop everything" from "note and continue" without
//! matching on individual variants.

use crate::config::ConfigError;
use crate::install_log::InstallLogError;
use crate::release::extraction::ExtractionError;
use crate::release::provider::ReleaseError;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification shared by errors, per-file failures, and results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Bad input, caught before any side effect.
    Validation,
    /// A file, archive entry, or release asset was not found.
    NotFound,
    /// The filesystem refused access.
    PermissionDenied,
    /// Archive or header bytes do not parse.
    Corrupt,
    /// Some files succeeded and some did not.
    Partial,
    /// Any other I/O failure.
    Io,
}

impl ErrorClass {
    /// Classify an I/O error kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use dxvk_installer::error::ErrorClass;
    ///
    /// let class = ErrorClass::from_io_kind(std::io::ErrorKind::PermissionDenied);
    /// assert_eq!(class, ErrorClass::PermissionDenied);
    /// ```
    #[must_use]
    pub fn from_io_kind(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem => {
                Self::PermissionDenied
            }
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => Self::Corrupt,
            _ => Self::Io,
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Validation => "validation",
            Self::NotFound => "not found",
            Self::PermissionDenied => "permission denied",
            Self::Corrupt => "corrupt",
            Self::Partial => "partial",
            Self::Io => "I/O",
        };
        f.write_str(label)
    }
}

/// Errors that can occur during installation or uninstallation.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// The target directory is missing or is not a directory.
    #[error("game folder {path} is not usable: {reason}")]
    InvalidTarget {
        /// The rejected directory.
        path: PathBuf,
        /// Why the directory was rejected.
        reason: String,
    },

    /// The architecture is neither 32-bit nor 64-bit.
    #[error(
        "could not determine the game architecture ({value}); make sure the folder \
         contains the game's .exe, that it is not corrupted, and that it is readable"
    )]
    UnsupportedArchitecture {
        /// Human-readable description of the rejected value.
        value: String,
    },

    /// The release provider returned an asset without a download reference.
    #[error("release asset {asset} has no download reference")]
    MissingDownloadRef {
        /// Name of the offending asset.
        asset: String,
    },

    /// No release asset uses a supported archive format.
    #[error("no compatible DXVK archive in release {version}; assets seen: {}", format_seen(.seen))]
    NoCompatibleAsset {
        /// Release tag that was inspected.
        version: String,
        /// Names of every asset in the release.
        seen: Vec<String>,
    },

    /// Fetching release metadata or the archive failed.
    #[error(transparent)]
    Release(#[from] ReleaseError),

    /// Extracting the archive failed.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The target directory exists but is not writable.
    #[error("cannot write to game folder {path}: {reason}\n\n{hint}")]
    TargetNotWritable {
        /// Path to the non-writable directory.
        path: PathBuf,
        /// Description of the underlying I/O error.
        reason: String,
        /// Remediation guidance for the user.
        hint: String,
    },

    /// The backup directory could not be created or populated.
    #[error("failed to back up existing files into {path}: {source}")]
    BackupFailed {
        /// Backup directory path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Creating the staging directory failed.
    #[error("failed to create staging directory: {source}")]
    Staging {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The configuration file could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The install log could not be read or written.
    #[error(transparent)]
    InstallLog(#[from] InstallLogError),

    /// Writing command output failed.
    #[error("failed to write output: {source}")]
    WriteFailed {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl InstallerError {
    /// Return the [`ErrorClass`] of this error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidTarget { .. }
            | Self::UnsupportedArchitecture { .. }
            | Self::MissingDownloadRef { .. } => ErrorClass::Validation,
            Self::NoCompatibleAsset { .. } => ErrorClass::NotFound,
            Self::Release(err) => err.class(),
            Self::Extraction(err) => err.class(),
            Self::Config(err) => err.class(),
            Self::InstallLog(err) => err.class(),
            Self::TargetNotWritable { .. } => ErrorClass::PermissionDenied,
            Self::BackupFailed { source, .. }
            | Self::Staging { source }
            | Self::WriteFailed { source }
            | Self::Io(source) => ErrorClass::from_io_kind(source.kind()),
        }
    }
}

fn format_seen(seen: &[String]) -> String {
    if seen.is_empty() {
        return "(none)".to_owned();
    }
    seen.join(", ")
}

/// Result type alias using [`InstallerError`].
pub type Result<T> = std::result::Result<T, InstallerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::denied(io::ErrorKind::PermissionDenied, ErrorClass::PermissionDenied)]
    #[case::missing(io::ErrorKind::NotFound, ErrorClass::NotFound)]
    #[case::invalid(io::ErrorKind::InvalidData, ErrorClass::Corrupt)]
    #[case::other(io::ErrorKind::Other, ErrorClass::Io)]
    fn io_kinds_are_classified(#[case] kind: io::ErrorKind, #[case] expected: ErrorClass) {
        assert_eq!(ErrorClass::from_io_kind(kind), expected);
    }

    #[test]
    fn no_compatible_asset_lists_seen_names() {
        let err = InstallerError::NoCompatibleAsset {
            version: "v2.4".to_owned(),
            seen: vec!["dxvk-2.4.sha256".to_owned(), "notes.txt".to_owned()],
        };
        let msg = err.to_string();
        assert!(msg.contains("dxvk-2.4.sha256, notes.txt"));
        assert_eq!(err.class(), ErrorClass::NotFound);
    }

    #[test]
    fn no_compatible_asset_with_empty_release() {
        let err = InstallerError::NoCompatibleAsset {
            version: "v2.4".to_owned(),
            seen: Vec::new(),
        };
        assert!(err.to_string().contains("(none)"));
    }

    #[test]
    fn target_not_writable_includes_hint() {
        let err = InstallerError::TargetNotWritable {
            path: PathBuf::from("/games/quake"),
            reason: "permission denied".to_owned(),
            hint: "Try running as administrator.".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/games/quake"));
        assert!(msg.contains("administrator"));
        assert_eq!(err.class(), ErrorClass::PermissionDenied);
    }

    #[test]
    fn backup_failed_preserves_source() {
        let err = InstallerError::BackupFailed {
            path: PathBuf::from("/games/quake/dxvk_backup"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.class(), ErrorClass::PermissionDenied);
    }

    #[test]
    fn validation_errors_are_classified() {
        let err = InstallerError::UnsupportedArchitecture {
            value: "unrecognized".to_owned(),
        };
        assert_eq!(err.class(), ErrorClass::Validation);
        assert!(err.to_string().contains(".exe"));
    }
}
