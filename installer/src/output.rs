//! Output formatting for the DXVK manager CLI.
//!
//! Everything user-facing is rendered here as plain strings so the binary
//! only decides where to write them.

use crate::architecture::GameExecutable;
use crate::diagnostics::{Diagnostics, Severity};
use crate::graphics_api::GraphicsApi;
use crate::install_log::InstallRecord;
use crate::outcome::InstallResult;
use crate::pipeline::{InstallOutcome, UninstallOutcome};
use std::collections::BTreeSet;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write one line to `out`, ignoring write failures.
pub fn write_stderr_line(out: &mut dyn Write, message: impl fmt::Display) {
    if writeln!(out, "{message}").is_err() {
        // Best-effort output; nothing sensible to do on failure.
    }
}

/// Format a success message after installation.
#[must_use]
pub fn success_message(count: usize, target_dir: &Path, version: Option<&str>) -> String {
    let plural = if count == 1 { "library" } else { "libraries" };
    let version = version.map(|v| format!("DXVK {v}: ")).unwrap_or_default();
    format!(
        "{version}installed {count} {plural} into {}",
        target_dir.display()
    )
}

/// Lines summarizing an install attempt.
///
/// Diagnostics below `min_severity` are left out.
#[must_use]
pub fn install_summary(
    outcome: &InstallOutcome,
    target_dir: &Path,
    min_severity: Severity,
) -> Vec<String> {
    let mut lines = trail_lines(&outcome.trail, min_severity);
    match &outcome.result {
        InstallResult::Installed { files } => {
            lines.push(success_message(files.len(), target_dir, outcome.version.as_deref()));
        }
        InstallResult::PartiallyInstalled { files, missing } => {
            lines.push(success_message(files.len(), target_dir, outcome.version.as_deref()));
            lines.push(format!("Not installed: {}", missing.join(", ")));
        }
        InstallResult::Failed { reason } => {
            lines.push(format!("Install failed: {reason}"));
        }
    }
    lines
}

/// Lines summarizing an uninstall attempt.
#[must_use]
pub fn uninstall_summary(
    outcome: &UninstallOutcome,
    target_dir: &Path,
    min_severity: Severity,
) -> Vec<String> {
    let mut lines = trail_lines(&outcome.trail, min_severity);
    if outcome.restored {
        lines.push(format!(
            "Restored original libraries in {}",
            target_dir.display()
        ));
    } else {
        lines.push(format!("Nothing restored in {}", target_dir.display()));
    }
    lines
}

fn trail_lines(trail: &Diagnostics, min_severity: Severity) -> Vec<String> {
    trail
        .at_least(min_severity)
        .map(ToString::to_string)
        .collect()
}

/// What `detect` found in a game folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionReport {
    /// Game folder that was inspected.
    pub target_dir: PathBuf,
    /// Executable used for architecture detection, if any.
    pub executable: Option<GameExecutable>,
    /// Graphics APIs implied by marker libraries.
    pub apis: BTreeSet<GraphicsApi>,
    /// Libraries that would be installed.
    pub files: Vec<String>,
}

impl fmt::Display for DetectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Game folder:  {}", self.target_dir.display())?;
        match &self.executable {
            Some(exe) => {
                writeln!(f, "Executable:   {}", exe.path.display())?;
                writeln!(f, "Architecture: {}", exe.architecture)?;
            }
            None => writeln!(f, "Executable:   (none found)")?,
        }
        let apis: Vec<String> = self.apis.iter().map(ToString::to_string).collect();
        writeln!(f, "Graphics API: {}", apis.join(", "))?;
        write!(f, "Libraries:    {}", self.files.join(", "))
    }
}

/// Render the install log as aligned text lines.
#[must_use]
pub fn history_lines(records: &[InstallRecord]) -> Vec<String> {
    if records.is_empty() {
        return vec!["No installs recorded.".to_owned()];
    }
    records
        .iter()
        .map(|record| {
            format!(
                "{}  {:<8} {:<12} {:<8} {}",
                record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                record.dxvk_version,
                record.graphics_api,
                record.architecture,
                record.game_path.display()
            )
        })
        .collect()
}

/// Render the install log as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn history_json(records: &[InstallRecord]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(records)
}
