//! Install and uninstall orchestration.
//!
//! Sequences detection, file-set selection, release retrieval, extraction,
//! and the transactional file installer. Every attempt ends in exactly one
//! [`InstallResult`] plus a [`Diagnostics`] trail; errors from the stages
//! are folded into the result rather than returned.

use crate::architecture::{self, Architecture};
use crate::diagnostics::Diagnostics;
use crate::error::{InstallerError, Result};
use crate::file_set::FileSet;
use crate::graphics_api::{self, GraphicsApi};
use crate::install_log::{InstallLogSink, InstallRecord};
use crate::outcome::InstallResult;
use crate::permissions::{FsWriteAccess, WriteAccess, folder_hint};
use crate::release::asset::{select_asset, version_from_asset_name};
use crate::release::{ArchiveExtractor, ExtractionReport, ReleaseProvider};
use crate::transaction::{FileInstaller, InstallPhase, validate_target};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Stages of an install attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    /// Checking the request and the game folder.
    Validating,
    /// Fetching release metadata and the archive.
    ResolvingRelease,
    /// Extracting libraries into the staging directory.
    Extracting,
    /// Saving the files about to be replaced.
    BackingUp,
    /// Copying libraries into the game folder.
    Installing,
    /// Checking the installed libraries.
    Verifying,
    /// The attempt finished with at least one file installed.
    Done,
    /// The attempt failed.
    Failed,
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Validating => "validating",
            Self::ResolvingRelease => "resolving release",
            Self::Extracting => "extracting",
            Self::BackingUp => "backing up",
            Self::Installing => "installing",
            Self::Verifying => "verifying",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// What to install and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    /// Game folder receiving the libraries.
    pub target_dir: PathBuf,
    /// Architecture override; detected from the game executable when absent.
    pub architecture: Option<Architecture>,
    /// Graphics API override; inferred from marker libraries when absent.
    pub api_override: Option<GraphicsApi>,
    /// Whether to back up the files being replaced.
    pub backup_enabled: bool,
}

impl InstallRequest {
    /// Request an install into `target_dir` with detection and backup.
    #[must_use]
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            architecture: None,
            api_override: None,
            backup_enabled: true,
        }
    }
}

/// Everything an install attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    /// Terminal result.
    pub result: InstallResult,
    /// DXVK version, once the release was resolved.
    pub version: Option<String>,
    /// Architecture used, once validated.
    pub architecture: Option<Architecture>,
    /// Graphics API used, once chosen.
    pub api: Option<GraphicsApi>,
    /// Phase the attempt ended in.
    pub phase: PipelinePhase,
    /// Every phase the attempt passed through, starting with
    /// [`PipelinePhase::Validating`].
    pub phases: Vec<PipelinePhase>,
    /// Messages describing the attempt.
    pub trail: Diagnostics,
}

/// Everything an uninstall attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallOutcome {
    /// True when the backup was restored and removed.
    pub restored: bool,
    /// Messages describing the attempt.
    pub trail: Diagnostics,
}

/// Injected collaborators for an install attempt.
pub struct Collaborators<'a> {
    /// Source of releases and archives.
    pub provider: &'a dyn ReleaseProvider,
    /// Archive extractor.
    pub extractor: &'a dyn ArchiveExtractor,
    /// Destination for install records.
    pub log_sink: &'a dyn InstallLogSink,
    /// Filesystem write checks.
    pub access: &'a dyn WriteAccess,
}

/// Install DXVK into a game folder using the real filesystem.
pub fn install(
    request: &InstallRequest,
    provider: &dyn ReleaseProvider,
    extractor: &dyn ArchiveExtractor,
    log_sink: &dyn InstallLogSink,
) -> InstallOutcome {
    install_with(
        request,
        &Collaborators {
            provider,
            extractor,
            log_sink,
            access: &FsWriteAccess,
        },
    )
}

/// Testable inner function with injected dependencies.
///
/// The production entry point [`install`] delegates here; tests inject
/// mocks for every collaborator.
pub fn install_with(request: &InstallRequest, with: &Collaborators<'_>) -> InstallOutcome {
    let mut attempt = Attempt::new(request);
    let result = match attempt.run(with) {
        Ok(result) => result,
        Err(err) => {
            attempt.trail.error(err.to_string());
            InstallResult::failed(err)
        }
    };

    if result.is_success() {
        attempt.record(with.log_sink);
        attempt.enter(PipelinePhase::Done);
    } else {
        attempt.enter(PipelinePhase::Failed);
    }

    InstallOutcome {
        result,
        version: attempt.version,
        architecture: attempt.architecture,
        api: attempt.api,
        phase: attempt.phase,
        phases: attempt.phases,
        trail: attempt.trail,
    }
}

/// Restore the backup in `target_dir` using the real filesystem.
#[must_use]
pub fn uninstall(target_dir: &Path) -> UninstallOutcome {
    uninstall_with(target_dir, &FsWriteAccess)
}

/// Testable inner function for [`uninstall`].
#[must_use]
pub fn uninstall_with(target_dir: &Path, access: &dyn WriteAccess) -> UninstallOutcome {
    let mut trail = Diagnostics::new();
    if let Err(err) = validate_target(target_dir) {
        trail.error(err.to_string());
        return UninstallOutcome {
            restored: false,
            trail,
        };
    }
    let restored = FileInstaller::new(access).restore(target_dir, &mut trail);
    UninstallOutcome { restored, trail }
}

/// Pipeline counterpart of a file-installer state, if it has one.
const fn pipeline_phase(phase: InstallPhase) -> Option<PipelinePhase> {
    match phase {
        InstallPhase::BackingUp => Some(PipelinePhase::BackingUp),
        InstallPhase::Installing => Some(PipelinePhase::Installing),
        InstallPhase::Verifying => Some(PipelinePhase::Verifying),
        InstallPhase::Idle
        | InstallPhase::Committed
        | InstallPhase::RolledBack
        | InstallPhase::Failed => None,
    }
}

/// State carried through one install attempt.
struct Attempt<'r> {
    request: &'r InstallRequest,
    phase: PipelinePhase,
    phases: Vec<PipelinePhase>,
    version: Option<String>,
    architecture: Option<Architecture>,
    api: Option<GraphicsApi>,
    trail: Diagnostics,
}

impl<'r> Attempt<'r> {
    fn new(request: &'r InstallRequest) -> Self {
        Self {
            request,
            phase: PipelinePhase::Validating,
            phases: vec![PipelinePhase::Validating],
            version: None,
            architecture: None,
            api: None,
            trail: Diagnostics::new(),
        }
    }

    fn enter(&mut self, next: PipelinePhase) {
        log::debug!("install pipeline: {} -> {next}", self.phase);
        self.phase = next;
        self.phases.push(next);
    }

    fn run(&mut self, with: &Collaborators<'_>) -> Result<InstallResult> {
        let request = self.request;
        let target = request.target_dir.as_path();

        validate_target(target)?;
        with.access
            .probe_dir(target)
            .map_err(|err| InstallerError::TargetNotWritable {
                path: target.to_path_buf(),
                reason: err.to_string(),
                hint: folder_hint(target),
            })?;
        let architecture = self.resolve_architecture(target)?;
        let api = self.resolve_api(target);
        let files = FileSet::for_api(api).to_vec();

        self.enter(PipelinePhase::ResolvingRelease);
        let release = with.provider.latest_release()?;
        let (asset, format) = select_asset(&release)?;
        let download_ref = asset.require_download_ref()?;
        let version = if release.version.trim().is_empty() {
            version_from_asset_name(&asset.name)
        } else {
            release.version.clone()
        };
        self.trail
            .info(format!("Downloading DXVK {version} ({})", asset.name));
        self.version = Some(version);
        let archive = with.provider.fetch(download_ref)?;
        if archive.format != format {
            log::debug!(
                "asset {} looked like {format} but was fetched as {}",
                asset.name,
                archive.format
            );
        }

        self.enter(PipelinePhase::Extracting);
        let staging = tempfile::tempdir().map_err(|source| InstallerError::Staging { source })?;
        let report = with
            .extractor
            .extract(&archive, architecture, &files, staging.path())?;
        self.note_extraction(&report);

        let tx = FileInstaller::new(with.access).install(
            staging.path(),
            target,
            &report.extracted,
            request.backup_enabled,
            &mut self.trail,
        );
        for phase in tx.phases.iter().filter_map(|&phase| pipeline_phase(phase)) {
            self.enter(phase);
        }

        Ok(merge_missing(tx.result, &files, &report.missing))
    }

    fn resolve_architecture(&mut self, target: &Path) -> Result<Architecture> {
        let architecture = match self.request.architecture {
            Some(architecture) => architecture,
            None => {
                let exe = architecture::detect_game_executable(target).ok_or_else(|| {
                    InstallerError::UnsupportedArchitecture {
                        value: "no .exe file found in the folder or its subfolders".to_owned(),
                    }
                })?;
                self.trail.info(format!(
                    "Detected {} executable {}",
                    exe.architecture,
                    exe.path.display()
                ));
                exe.architecture
            }
        };
        if !architecture.is_recognized() {
            return Err(InstallerError::UnsupportedArchitecture {
                value: architecture.to_string(),
            });
        }
        self.architecture = Some(architecture);
        Ok(architecture)
    }

    fn resolve_api(&mut self, target: &Path) -> GraphicsApi {
        let overridden = self.request.api_override;
        let api = overridden.unwrap_or_else(|| {
            let found = graphics_api::scan(target);
            GraphicsApi::preferred(&found)
        });
        match (api, overridden) {
            (GraphicsApi::Unknown, None) => self.trail.warn(
                "No Direct3D libraries found in the game folder; installing every DXVK library",
            ),
            (GraphicsApi::Unknown, Some(_)) => self.trail.info("Installing every DXVK library"),
            _ => self.trail.info(format!("Using {api}")),
        }
        self.api = Some(api);
        api
    }

    fn note_extraction(&mut self, report: &ExtractionReport) {
        if !report.missing.is_empty() {
            self.trail.warn(format!(
                "The archive does not contain {}; installing {} only",
                report.missing.join(", "),
                report.extracted.join(", ")
            ));
        }
    }

    fn record(&mut self, sink: &dyn InstallLogSink) {
        let (Some(architecture), Some(api), Some(version)) =
            (self.architecture, self.api, self.version.as_deref())
        else {
            return;
        };
        let record = InstallRecord::now(&self.request.target_dir, architecture, api, version);
        match sink.record(&record) {
            Ok(outcome) if outcome.recovered_from_corrupt_file() => self
                .trail
                .warn("The install log was corrupt and has been started afresh"),
            Ok(_) => {}
            Err(err) => self.trail.warn(format!("Could not record install: {err}")),
        }
    }
}

/// Fold files absent from the archive into the installer's result.
///
/// Missing names are reported in file-set order.
fn merge_missing(result: InstallResult, files: &[String], absent: &[String]) -> InstallResult {
    if absent.is_empty() {
        return result;
    }
    let (installed, missing) = match result {
        InstallResult::Installed { files } => (files, Vec::new()),
        InstallResult::PartiallyInstalled { files, missing } => (files, missing),
        failed @ InstallResult::Failed { .. } => return failed,
    };
    let missing: HashSet<&str> = missing
        .iter()
        .chain(absent)
        .map(String::as_str)
        .collect();
    InstallResult::PartiallyInstalled {
        files: installed,
        missing: files
            .iter()
            .filter(|f| missing.contains(f.as_str()))
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
