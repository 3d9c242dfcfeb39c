//! CLI argument definitions for the DXVK manager.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use crate::architecture::Architecture;
use crate::config::ManagerConfig;
use crate::graphics_api::GraphicsApi;
use crate::pipeline::InstallRequest;
use crate::wine::windows_path_in_prefix;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;

/// Install DXVK into game folders.
#[derive(Parser, Debug)]
#[command(name = "dxvk-manager")]
#[command(version, about)]
#[command(long_about = concat!(
    "Install DXVK into game folders.\n\n",
    "DXVK translates Direct3D 9, 10, and 11 calls to Vulkan. This tool downloads ",
    "the latest DXVK release, works out which libraries a game needs from the ",
    "Direct3D libraries already in its folder, and copies the matching 32-bit or ",
    "64-bit builds next to the game executable.\n\n",
    "Replaced files are saved to a dxvk_backup folder so `uninstall` can put ",
    "them back.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Install into a game folder, detecting everything:\n",
    "    $ dxvk-manager install ~/Games/Quake\n\n",
    "  Force a 32-bit Direct3D 9 install without a backup:\n",
    "    $ dxvk-manager install ~/Games/Quake --arch 32 --api d3d9 --no-backup\n\n",
    "  Install into a game inside a Wine prefix:\n",
    "    $ dxvk-manager install 'C:\\Games\\Quake' --wine-prefix ~/.wine\n\n",
    "  Restore the original libraries:\n",
    "    $ dxvk-manager uninstall ~/Games/Quake\n\n",
    "  Show what would be installed:\n",
    "    $ dxvk-manager detect ~/Games/Quake",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file [default: platform-specific].
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<Utf8PathBuf>,
}

impl Cli {
    /// Log level implied by `-v` and `-q`.
    #[must_use]
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Download DXVK and install it into a game folder.
    Install(InstallArgs),

    /// Restore the libraries saved by the last install.
    Uninstall(FolderArgs),

    /// Show the detected architecture and graphics APIs of a game folder.
    Detect(FolderArgs),

    /// List Wine prefixes found in the usual locations.
    Prefixes,

    /// Show previous installs.
    History(HistoryArgs),
}

/// Arguments for the install command.
#[derive(Parser, Debug, Clone)]
pub struct InstallArgs {
    /// Game folder containing the executable.
    #[arg(value_name = "DIR")]
    pub game_dir: Utf8PathBuf,

    /// Architecture to install instead of detecting it (32 or 64).
    #[arg(long, value_name = "BITS")]
    pub arch: Option<Architecture>,

    /// Graphics API to install for instead of detecting it
    /// (d3d9, d3d10, d3d11, or all).
    #[arg(long, value_name = "API")]
    pub api: Option<GraphicsApi>,

    /// Replace files without saving the originals.
    #[arg(long)]
    pub no_backup: bool,

    /// GitHub repository to download releases from, as owner/name.
    #[arg(long, value_name = "OWNER/NAME")]
    pub repo: Option<String>,

    /// Treat DIR as a Windows path inside this Wine prefix.
    #[arg(long, value_name = "PREFIX")]
    pub wine_prefix: Option<Utf8PathBuf>,
}

impl InstallArgs {
    /// Game folder on the host filesystem.
    ///
    /// With `--wine-prefix`, `DIR` is mapped from a Windows path into the
    /// prefix.
    #[must_use]
    pub fn target_dir(&self) -> PathBuf {
        host_game_dir(&self.game_dir, self.wine_prefix.as_deref())
    }

    /// Repository to fetch releases from; the flag wins over the config file.
    #[must_use]
    pub fn repository<'a>(&'a self, config: &'a ManagerConfig) -> &'a str {
        self.repo.as_deref().unwrap_or(&config.repository)
    }

    /// Build the install request, applying config-file defaults.
    #[must_use]
    pub fn to_request(&self, config: &ManagerConfig) -> InstallRequest {
        InstallRequest {
            architecture: self.arch,
            api_override: self.api,
            backup_enabled: config.backup && !self.no_backup,
            ..InstallRequest::new(self.target_dir())
        }
    }
}

/// Arguments naming one game folder.
#[derive(Parser, Debug, Clone)]
pub struct FolderArgs {
    /// Game folder.
    #[arg(value_name = "DIR")]
    pub game_dir: Utf8PathBuf,

    /// Treat DIR as a Windows path inside this Wine prefix.
    #[arg(long, value_name = "PREFIX")]
    pub wine_prefix: Option<Utf8PathBuf>,
}

impl FolderArgs {
    /// Game folder on the host filesystem, mapped like
    /// [`InstallArgs::target_dir`].
    #[must_use]
    pub fn target_dir(&self) -> PathBuf {
        host_game_dir(&self.game_dir, self.wine_prefix.as_deref())
    }
}

fn host_game_dir(game_dir: &Utf8Path, wine_prefix: Option<&Utf8Path>) -> PathBuf {
    match wine_prefix {
        Some(prefix) => windows_path_in_prefix(prefix.as_std_path(), game_dir.as_str()),
        None => game_dir.as_std_path().to_path_buf(),
    }
}

/// Arguments for the history command.
#[derive(Parser, Debug, Clone)]
pub struct HistoryArgs {
    /// Output in JSON format for scripting.
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
