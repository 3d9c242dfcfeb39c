//! Result values produced by install attempts.
//!
//! An attempt always ends in exactly one [`InstallResult`]. Per-file problems
//! never abort a batch; they are carried as [`FileFailure`] values and folded
//! into the final result.

use crate::error::{ErrorClass, InstallerError};
use std::fmt;

/// Why an install attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReason {
    class: ErrorClass,
    message: String,
}

impl FailureReason {
    /// Create a reason with an explicit class.
    #[must_use]
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }

    /// The classification of the failure.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        self.class
    }

    /// Human-readable explanation, including remediation hints.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&InstallerError> for FailureReason {
    fn from(err: &InstallerError) -> Self {
        Self::new(err.class(), err.to_string())
    }
}

impl From<InstallerError> for FailureReason {
    fn from(err: InstallerError) -> Self {
        Self::from(&err)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.class)
    }
}

/// Terminal outcome of one install attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallResult {
    /// Every requested file was installed and verified.
    Installed {
        /// Installed file names.
        files: Vec<String>,
    },
    /// Some requested files were installed, others were not.
    PartiallyInstalled {
        /// Installed file names.
        files: Vec<String>,
        /// Requested file names that are not in place.
        missing: Vec<String>,
    },
    /// Nothing was installed.
    Failed {
        /// Why the attempt failed.
        reason: FailureReason,
    },
}

impl InstallResult {
    /// Build the result from the verified and missing file lists.
    ///
    /// Zero verified files is a failure described by `reason_if_empty`.
    #[must_use]
    pub fn from_verification(
        files: Vec<String>,
        missing: Vec<String>,
        reason_if_empty: impl FnOnce() -> FailureReason,
    ) -> Self {
        if files.is_empty() {
            return Self::Failed {
                reason: reason_if_empty(),
            };
        }
        if missing.is_empty() {
            Self::Installed { files }
        } else {
            Self::PartiallyInstalled { files, missing }
        }
    }

    /// Shorthand for a failed result.
    #[must_use]
    pub fn failed(reason: impl Into<FailureReason>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Returns true when at least one file was installed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Files that ended up installed.
    #[must_use]
    pub fn installed_files(&self) -> &[String] {
        match self {
            Self::Installed { files } | Self::PartiallyInstalled { files, .. } => files,
            Self::Failed { .. } => &[],
        }
    }

    /// The classification of the result; `None` for a full success.
    #[must_use]
    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            Self::Installed { .. } => None,
            Self::PartiallyInstalled { .. } => Some(ErrorClass::Partial),
            Self::Failed { reason } => Some(reason.class()),
        }
    }
}

/// A per-file failure recorded during install or restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    /// File name relative to the target directory.
    pub file: String,
    /// Classification of the failure.
    pub class: ErrorClass,
    /// Description of what went wrong.
    pub message: String,
}

impl FileFailure {
    /// Build a failure from an I/O error.
    #[must_use]
    pub fn from_io(file: &str, err: &std::io::Error) -> Self {
        Self {
            file: file.to_owned(),
            class: ErrorClass::from_io_kind(err.kind()),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.file, self.message, self.class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    fn unreachable_reason() -> FailureReason {
        FailureReason::new(ErrorClass::Io, "should not be used")
    }

    #[test]
    fn all_verified_is_installed() {
        let result =
            InstallResult::from_verification(names(&["dxgi.dll"]), Vec::new(), unreachable_reason);
        assert_eq!(
            result,
            InstallResult::Installed {
                files: names(&["dxgi.dll"])
            }
        );
        assert_eq!(result.class(), None);
    }

    #[test]
    fn some_missing_is_partial() {
        let result = InstallResult::from_verification(
            names(&["dxgi.dll"]),
            names(&["d3d9.dll"]),
            unreachable_reason,
        );
        assert!(result.is_success());
        assert_eq!(result.class(), Some(ErrorClass::Partial));
        assert_eq!(result.installed_files(), names(&["dxgi.dll"]).as_slice());
    }

    #[test]
    fn nothing_verified_uses_supplied_reason() {
        let result = InstallResult::from_verification(Vec::new(), names(&["dxgi.dll"]), || {
            FailureReason::new(ErrorClass::PermissionDenied, "locked")
        });
        assert!(!result.is_success());
        assert_eq!(result.class(), Some(ErrorClass::PermissionDenied));
        assert!(result.installed_files().is_empty());
    }

    #[test]
    fn file_failure_classifies_io_errors() {
        let err = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        let failure = FileFailure::from_io("d3d11.dll", &err);
        assert_eq!(failure.class, ErrorClass::PermissionDenied);
        assert!(failure.to_string().starts_with("d3d11.dll: "));
    }
}
