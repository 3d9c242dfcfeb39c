//! Append-only record of successful installs.
//!
//! Records are kept as a JSON array at `<data_dir>/install_log.json`. A file
//! that no longer parses is replaced by a fresh array and the caller is told
//! so through [`RecordOutcome::recovered_from_corrupt_file`].

use crate::architecture::Architecture;
use crate::dirs::BaseDirs;
use crate::error::ErrorClass;
use crate::graphics_api::GraphicsApi;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const LOG_FILENAME: &str = "install_log.json";

/// One successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecord {
    /// When the install finished.
    pub timestamp: DateTime<Utc>,
    /// Game folder the libraries were installed into.
    pub game_path: PathBuf,
    /// Architecture label, e.g. `64-bit`.
    pub architecture: String,
    /// Graphics API label, e.g. `Direct3D 11`.
    pub graphics_api: String,
    /// Installed DXVK version tag.
    pub dxvk_version: String,
}

impl InstallRecord {
    /// Create a record stamped with the current time.
    #[must_use]
    pub fn now(
        game_path: &Path,
        architecture: Architecture,
        graphics_api: GraphicsApi,
        dxvk_version: &str,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            game_path: game_path.to_path_buf(),
            architecture: architecture.to_string(),
            graphics_api: graphics_api.to_string(),
            dxvk_version: dxvk_version.to_owned(),
        }
    }
}

/// Outcome details returned after recording an install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    entries: usize,
    recovered_from_corrupt_file: bool,
}

impl RecordOutcome {
    /// Describe a completed append.
    #[must_use]
    pub const fn new(entries: usize, recovered_from_corrupt_file: bool) -> Self {
        Self {
            entries,
            recovered_from_corrupt_file,
        }
    }

    /// Number of records in the log after appending.
    #[must_use]
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Returns true when a malformed log file was reset before appending.
    #[must_use]
    pub fn recovered_from_corrupt_file(&self) -> bool {
        self.recovered_from_corrupt_file
    }
}

/// Errors that prevent log persistence.
#[derive(Debug, thiserror::Error)]
pub enum InstallLogError {
    /// The data directory could not be resolved.
    #[error("could not determine the dxvk-manager data directory")]
    MissingDataDirectory,

    /// Creating the log directory failed.
    #[error("failed to create log directory {path}: {source}")]
    CreateDirectory {
        /// Directory path that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Reading the log file failed.
    #[error("failed to read install log {path}: {source}")]
    ReadLog {
        /// File path that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The log file exists but is not a JSON array of records.
    #[error("install log {path} is corrupt: {source}")]
    CorruptLog {
        /// File path that could not be parsed.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Serializing the log failed.
    #[error("failed to serialize install log: {source}")]
    SerializeLog {
        /// Underlying serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// Writing the log file failed.
    #[error("failed to write install log {path}: {source}")]
    WriteLog {
        /// File path that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl InstallLogError {
    /// Return the [`ErrorClass`] of this error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingDataDirectory => ErrorClass::NotFound,
            Self::CreateDirectory { source, .. }
            | Self::ReadLog { source, .. }
            | Self::WriteLog { source, .. } => ErrorClass::from_io_kind(source.kind()),
            Self::CorruptLog { .. } => ErrorClass::Corrupt,
            Self::SerializeLog { .. } => ErrorClass::Io,
        }
    }
}

/// Destination for install records.
#[cfg_attr(test, mockall::automock)]
pub trait InstallLogSink {
    /// Append one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be persisted.
    fn record(&self, record: &InstallRecord) -> Result<RecordOutcome, InstallLogError>;
}

/// Install log stored as a JSON array file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonInstallLog {
    path: PathBuf,
}

impl JsonInstallLog {
    /// Use the log file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use the default log file in the manager's data directory.
    ///
    /// # Errors
    ///
    /// Returns [`InstallLogError::MissingDataDirectory`] when the data
    /// directory cannot be resolved.
    pub fn in_data_dir(dirs: &dyn BaseDirs) -> Result<Self, InstallLogError> {
        let data_dir = dirs
            .data_dir()
            .ok_or(InstallLogError::MissingDataDirectory)?;
        Ok(Self::new(data_dir.join(LOG_FILENAME)))
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record, oldest first.
    ///
    /// A missing file yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not parse.
    pub fn entries(&self) -> Result<Vec<InstallRecord>, InstallLogError> {
        match self.load()? {
            Loaded::Records(records) => Ok(records),
            Loaded::Corrupt(source) => Err(InstallLogError::CorruptLog {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn load(&self) -> Result<Loaded, InstallLogError> {
        if !self.path.exists() {
            return Ok(Loaded::Records(Vec::new()));
        }

        let content =
            std::fs::read_to_string(&self.path).map_err(|source| InstallLogError::ReadLog {
                path: self.path.clone(),
                source,
            })?;
        if content.trim().is_empty() {
            return Ok(Loaded::Records(Vec::new()));
        }

        Ok(match serde_json::from_str::<Vec<InstallRecord>>(&content) {
            Ok(records) => Loaded::Records(records),
            Err(source) => Loaded::Corrupt(source),
        })
    }

    fn persist(&self, records: &[InstallRecord]) -> Result<(), InstallLogError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| InstallLogError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(records)
            .map_err(|source| InstallLogError::SerializeLog { source })?;
        std::fs::write(&self.path, json).map_err(|source| InstallLogError::WriteLog {
            path: self.path.clone(),
            source,
        })
    }
}

enum Loaded {
    Records(Vec<InstallRecord>),
    Corrupt(serde_json::Error),
}

impl InstallLogSink for JsonInstallLog {
    fn record(&self, record: &InstallRecord) -> Result<RecordOutcome, InstallLogError> {
        let (mut records, recovered_from_corrupt_file) = match self.load()? {
            Loaded::Records(records) => (records, false),
            Loaded::Corrupt(err) => {
                log::warn!(
                    "install log {} is corrupt ({err}); starting a new one",
                    self.path.display()
                );
                (Vec::new(), true)
            }
        };
        records.push(record.clone());
        self.persist(&records)?;

        Ok(RecordOutcome {
            entries: records.len(),
            recovered_from_corrupt_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dirs::MockBaseDirs;
    use std::io::ErrorKind;

    fn sample(version: &str) -> InstallRecord {
        InstallRecord::now(
            Path::new("/games/quake"),
            Architecture::SixtyFourBit,
            GraphicsApi::Direct3D11,
            version,
        )
    }

    #[test]
    fn record_creates_log_file_and_parent() {
        let temp_dir = tempfile::tempdir().expect("create tempdir");
        let log = JsonInstallLog::new(temp_dir.path().join("nested").join(LOG_FILENAME));

        let outcome = log.record(&sample("v2.4")).expect("record install");
        assert_eq!(outcome.entries(), 1);
        assert!(!outcome.recovered_from_corrupt_file());
        assert!(log.path().exists());
    }

    #[test]
    fn records_are_appended_in_order() {
        let temp_dir = tempfile::tempdir().expect("create tempdir");
        let log = JsonInstallLog::new(temp_dir.path().join(LOG_FILENAME));

        log.record(&sample("v2.3")).expect("first record");
        let outcome = log.record(&sample("v2.4")).expect("second record");

        assert_eq!(outcome.entries(), 2);
        let versions: Vec<String> = log
            .entries()
            .expect("entries")
            .into_iter()
            .map(|r| r.dxvk_version)
            .collect();
        assert_eq!(versions, vec!["v2.3", "v2.4"]);
    }

    #[test]
    fn records_use_display_labels() {
        let record = sample("v2.4");
        assert_eq!(record.architecture, "64-bit");
        assert_eq!(record.graphics_api, "Direct3D 11");
    }

    #[test]
    fn malformed_log_is_reset_and_recovered() {
        let temp_dir = tempfile::tempdir().expect("create tempdir");
        let path = temp_dir.path().join(LOG_FILENAME);
        std::fs::write(&path, "{not valid json").expect("write corrupt data");
        let log = JsonInstallLog::new(&path);

        assert!(matches!(
            log.entries(),
            Err(InstallLogError::CorruptLog { .. })
        ));
        let outcome = log.record(&sample("v2.4")).expect("record from corrupt file");
        assert!(outcome.recovered_from_corrupt_file());
        assert_eq!(outcome.entries(), 1);
    }

    #[test]
    fn missing_log_has_no_entries() {
        let temp_dir = tempfile::tempdir().expect("create tempdir");
        let log = JsonInstallLog::new(temp_dir.path().join(LOG_FILENAME));
        assert!(log.entries().expect("entries").is_empty());
    }

    #[test]
    fn persistence_failure_is_reported() {
        let temp_dir = tempfile::tempdir().expect("create tempdir");
        let path = temp_dir.path().join(LOG_FILENAME);
        std::fs::create_dir_all(&path).expect("create blocking directory");
        let log = JsonInstallLog::new(&path);

        let error = log.record(&sample("v2.4")).expect_err("expected failure");
        match error {
            InstallLogError::ReadLog { source, .. } | InstallLogError::WriteLog { source, .. } => {
                assert!(
                    matches!(
                        source.kind(),
                        ErrorKind::IsADirectory | ErrorKind::PermissionDenied
                    ),
                    "unexpected error kind: {}",
                    source.kind()
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn data_dir_is_required() {
        let mut dirs = MockBaseDirs::new();
        dirs.expect_data_dir().return_const(None::<PathBuf>);
        let err = JsonInstallLog::in_data_dir(&dirs).expect_err("no data dir");
        assert!(matches!(err, InstallLogError::MissingDataDirectory));
        assert_eq!(err.class(), ErrorClass::NotFound);
    }

    #[test]
    fn default_log_lives_in_data_dir() {
        let mut dirs = MockBaseDirs::new();
        dirs.expect_data_dir()
            .return_const(Some(PathBuf::from("/data/dxvk-manager")));
        let log = JsonInstallLog::in_data_dir(&dirs).expect("log");
        assert_eq!(log.path(), Path::new("/data/dxvk-manager/install_log.json"));
    }
}
