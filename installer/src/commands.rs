//! Handlers for the read-only subcommands.
//!
//! `detect`, `prefixes`, and `history` inspect state without changing it.
//! Their output goes to stdout so it can be piped; progress and errors stay
//! on stderr.

use crate::architecture::detect_game_executable;
use crate::cli::{FolderArgs, HistoryArgs};
use crate::config::ManagerConfig;
use crate::dirs::BaseDirs;
use crate::error::{InstallerError, Result};
use crate::file_set::FileSet;
use crate::graphics_api::{self, GraphicsApi};
use crate::install_log::{InstallLogError, JsonInstallLog};
use crate::output::{DetectionReport, history_json, history_lines};
use crate::transaction::validate_target;
use crate::wine::find_wine_prefixes;
use std::fmt::Display;
use std::io::Write;
use std::path::Path;

/// Inspect a game folder without installing anything.
#[must_use]
pub fn detect_folder(target_dir: &Path) -> DetectionReport {
    let apis = graphics_api::scan(target_dir);
    let files = FileSet::for_api(GraphicsApi::preferred(&apis)).to_vec();
    DetectionReport {
        target_dir: target_dir.to_path_buf(),
        executable: detect_game_executable(target_dir),
        apis,
        files,
    }
}

/// Print what an install into the folder would use.
///
/// # Errors
///
/// Returns an error if the folder does not exist or writing fails.
pub fn run_detect(args: &FolderArgs, stdout: &mut dyn Write) -> Result<()> {
    let target_dir = args.target_dir();
    validate_target(&target_dir)?;
    write_line(stdout, detect_folder(&target_dir))
}

/// Print the Wine prefixes found in the usual locations.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn run_prefixes(dirs: &dyn BaseDirs, stdout: &mut dyn Write) -> Result<()> {
    let prefixes = find_wine_prefixes(dirs);
    if prefixes.is_empty() {
        return write_line(stdout, "No Wine prefixes found.");
    }
    for prefix in prefixes {
        write_line(stdout, prefix.display())?;
    }
    Ok(())
}

/// The install log named by the config file, or the default one.
///
/// # Errors
///
/// Returns [`InstallLogError::MissingDataDirectory`] when no override is
/// configured and the data directory cannot be resolved.
pub fn install_log_for(
    config: &ManagerConfig,
    dirs: &dyn BaseDirs,
) -> std::result::Result<JsonInstallLog, InstallLogError> {
    match &config.install_log {
        Some(path) => Ok(JsonInstallLog::new(path.clone())),
        None => JsonInstallLog::in_data_dir(dirs),
    }
}

/// Print previous installs, oldest first.
///
/// # Errors
///
/// Returns an error if the log cannot be read or writing fails.
pub fn run_history(args: &HistoryArgs, log: &JsonInstallLog, stdout: &mut dyn Write) -> Result<()> {
    let records = log.entries()?;
    let output = if args.json {
        history_json(&records).map_err(|source| InstallLogError::SerializeLog { source })?
    } else {
        history_lines(&records).join("\n")
    };
    write_line(stdout, output)
}

fn write_line(stdout: &mut dyn Write, line: impl Display) -> Result<()> {
    writeln!(stdout, "{line}").map_err(|source| InstallerError::WriteFailed { source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::Architecture;
    use crate::dirs::MockBaseDirs;
    use crate::install_log::{InstallLogSink, InstallRecord};
    use crate::test_utils::pe_image;
    use camino::Utf8PathBuf;
    use rstest::rstest;
    use std::path::PathBuf;

    /// A Write implementation that always fails, for testing error paths.
    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("stdout closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn folder_args(path: &Path) -> FolderArgs {
        FolderArgs {
            game_dir: Utf8PathBuf::from_path_buf(path.to_path_buf()).expect("utf-8 temp path"),
            wine_prefix: None,
        }
    }

    #[test]
    fn detect_reports_executable_and_libraries() {
        let temp = tempfile::tempdir().expect("temp dir");
        std::fs::write(temp.path().join("game.exe"), pe_image(0x014C)).expect("write exe");
        std::fs::write(temp.path().join("D3D9.DLL"), b"native").expect("write dll");

        let report = detect_folder(temp.path());

        let exe = report.executable.as_ref().expect("executable");
        assert_eq!(exe.architecture, Architecture::ThirtyTwoBit);
        assert_eq!(report.files, vec!["d3d9.dll".to_owned(), "dxgi.dll".to_owned()]);

        let mut stdout = Vec::new();
        run_detect(&folder_args(temp.path()), &mut stdout).expect("detect");
        let text = String::from_utf8_lossy(&stdout);
        assert!(text.contains("Architecture: 32-bit"));
        assert!(text.contains("Direct3D 9"));
    }

    #[test]
    fn detect_rejects_missing_folder() {
        let temp = tempfile::tempdir().expect("temp dir");
        let err = run_detect(&folder_args(&temp.path().join("nope")), &mut Vec::new())
            .expect_err("missing folder");
        assert!(matches!(err, InstallerError::InvalidTarget { .. }));
    }

    #[test]
    fn detect_reports_write_failures() {
        let temp = tempfile::tempdir().expect("temp dir");
        let err = run_detect(&folder_args(temp.path()), &mut FailingWriter).expect_err("write");
        assert!(matches!(err, InstallerError::WriteFailed { .. }));
    }

    #[test]
    fn prefixes_reports_when_none_found() {
        let home = tempfile::tempdir().expect("temp dir");
        let mut dirs = MockBaseDirs::new();
        dirs.expect_home_dir()
            .return_const(Some(home.path().to_path_buf()));

        let mut stdout = Vec::new();
        temp_env::with_var_unset("WINEPREFIX", || run_prefixes(&dirs, &mut stdout))
            .expect("prefixes");

        assert_eq!(String::from_utf8_lossy(&stdout), "No Wine prefixes found.\n");
    }

    #[rstest]
    #[case::override_path(Some(PathBuf::from("/tmp/installs.json")), "/tmp/installs.json")]
    #[case::default_path(None, "/data/install_log.json")]
    fn install_log_location(#[case] configured: Option<PathBuf>, #[case] expected: &str) {
        let mut dirs = MockBaseDirs::new();
        dirs.expect_data_dir()
            .return_const(Some(PathBuf::from("/data")));
        let config = ManagerConfig {
            install_log: configured,
            ..ManagerConfig::default()
        };

        let log = install_log_for(&config, &dirs).expect("log");

        assert_eq!(log.path(), Path::new(expected));
    }

    #[test]
    fn history_prints_records() {
        let temp = tempfile::tempdir().expect("temp dir");
        let log = JsonInstallLog::new(temp.path().join("log.json"));
        let record = InstallRecord::now(
            Path::new("/games/quake"),
            Architecture::SixtyFourBit,
            GraphicsApi::Direct3D11,
            "v2.4",
        );
        log.record(&record).expect("record");

        let mut text = Vec::new();
        run_history(&HistoryArgs { json: false }, &log, &mut text).expect("history");
        assert!(String::from_utf8_lossy(&text).contains("/games/quake"));

        let mut json = Vec::new();
        run_history(&HistoryArgs { json: true }, &log, &mut json).expect("history");
        let parsed: Vec<InstallRecord> =
            serde_json::from_slice(&json).expect("valid json");
        assert_eq!(parsed, vec![record]);
    }

    #[test]
    fn history_of_corrupt_log_is_an_error() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("log.json");
        std::fs::write(&path, "{ not json").expect("write log");

        let err = run_history(&HistoryArgs { json: false }, &JsonInstallLog::new(path), &mut Vec::new())
            .expect_err("corrupt");

        assert!(matches!(
            err,
            InstallerError::InstallLog(InstallLogError::CorruptLog { .. })
        ));
    }
}
