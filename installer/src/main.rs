//! DXVK manager CLI entrypoint.
//!
//! This binary installs DXVK into game folders, restores the original
//! libraries, and reports what it detects. Progress goes to stderr; data
//! requested by `detect`, `prefixes`, and `history` goes to stdout.

use clap::Parser;
use dxvk_installer::cli::{Cli, Command, FolderArgs, InstallArgs};
use dxvk_installer::commands::{install_log_for, run_detect, run_history, run_prefixes};
use dxvk_installer::config::{self, ManagerConfig};
use dxvk_installer::diagnostics::Severity;
use dxvk_installer::dirs::{BaseDirs, system_or_none};
use dxvk_installer::error::Result;
use dxvk_installer::install_log::{InstallLogError, InstallLogSink, InstallRecord, RecordOutcome};
use dxvk_installer::output::{install_summary, uninstall_summary, write_stderr_line};
use dxvk_installer::pipeline::{install, uninstall};
use dxvk_installer::release::{GithubReleaseProvider, ReleaseArchiveExtractor};
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Initialise `env_logger` at the level implied by `-v`/`-q`.
///
/// `RUST_LOG` still overrides the default.
fn init_logging(cli: &Cli) {
    let env = env_logger::Env::default().default_filter_or(cli.log_level().as_str());
    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

/// Runs the selected command.
///
/// Returns `Ok(false)` when the command completed but did not achieve its
/// goal, such as an install that placed no files.
fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<bool> {
    let dirs = system_or_none();
    let config = config::load(
        cli.config.as_ref().map(|path| path.as_std_path()),
        dirs.as_ref(),
    )?;
    let min_severity = if cli.quiet {
        Severity::Error
    } else {
        Severity::Info
    };

    match &cli.command {
        Command::Install(args) => {
            run_install(args, &config, dirs.as_ref(), min_severity, stderr)
        }
        Command::Uninstall(args) => Ok(run_uninstall(args, min_severity, stderr)),
        Command::Detect(args) => run_detect(args, stdout).map(|()| true),
        Command::Prefixes => run_prefixes(dirs.as_ref(), stdout).map(|()| true),
        Command::History(args) => {
            let log = install_log_for(&config, dirs.as_ref())?;
            run_history(args, &log, stdout).map(|()| true)
        }
    }
}

/// Downloads and installs DXVK into the requested folder.
fn run_install(
    args: &InstallArgs,
    config: &ManagerConfig,
    dirs: &dyn BaseDirs,
    min_severity: Severity,
    stderr: &mut dyn Write,
) -> Result<bool> {
    let provider = GithubReleaseProvider::new(args.repository(config), config.http_timeout())?;
    let request = args.to_request(config);
    if min_severity <= Severity::Info {
        write_stderr_line(
            stderr,
            format!(
                "Installing DXVK from {} into {}...",
                provider.repository(),
                request.target_dir.display()
            ),
        );
    }

    let log = install_log_for(config, dirs);
    let sink: &dyn InstallLogSink = match &log {
        Ok(log) => log,
        Err(err) => {
            log::debug!("install log unavailable: {err}");
            &UnavailableLog
        }
    };
    let outcome = install(&request, &provider, &ReleaseArchiveExtractor, sink);

    for line in install_summary(&outcome, &request.target_dir, min_severity) {
        write_stderr_line(stderr, line);
    }
    Ok(outcome.result.is_success())
}

/// Restores the backup in the requested folder.
fn run_uninstall(args: &FolderArgs, min_severity: Severity, stderr: &mut dyn Write) -> bool {
    let target_dir = args.target_dir();
    let outcome = uninstall(&target_dir);
    for line in uninstall_summary(&outcome, &target_dir, min_severity) {
        write_stderr_line(stderr, line);
    }
    outcome.restored
}

/// Sink used when no install log location can be resolved.
struct UnavailableLog;

impl InstallLogSink for UnavailableLog {
    fn record(
        &self,
        _record: &InstallRecord,
    ) -> std::result::Result<RecordOutcome, InstallLogError> {
        Err(InstallLogError::MissingDataDirectory)
    }
}

fn exit_code_for_run_result(result: Result<bool>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(err) => {
            write_stderr_line(stderr, format!("Error: {err}"));
            1
        }
    }
}
