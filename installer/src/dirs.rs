//! Directory resolution abstraction for platform-specific paths.
//!
//! Wraps `directories-next` behind a trait so commands that read the config
//! file, write the install log, or look for Wine prefixes can be tested with
//! fixed directories.

use std::path::PathBuf;

const APPLICATION: &str = "dxvk-manager";

/// Platform directories used by the manager.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// The user's home directory.
    fn home_dir(&self) -> Option<PathBuf>;

    /// Directory holding `config.toml`.
    fn config_dir(&self) -> Option<PathBuf>;

    /// Directory holding the install log.
    fn data_dir(&self) -> Option<PathBuf>;
}

/// [`BaseDirs`] backed by the operating system's conventions.
///
/// # Examples
///
/// ```no_run
/// use dxvk_installer::dirs::{BaseDirs, SystemBaseDirs};
///
/// let dirs = SystemBaseDirs::new().expect("failed to initialise directories");
/// println!("config lives in {:?}", dirs.config_dir());
/// ```
#[derive(Debug, Clone)]
pub struct SystemBaseDirs {
    base: directories_next::BaseDirs,
    project: Option<directories_next::ProjectDirs>,
}

impl SystemBaseDirs {
    /// Resolve the platform directories.
    ///
    /// Returns `None` when no home directory can be determined.
    #[must_use]
    pub fn new() -> Option<Self> {
        let base = directories_next::BaseDirs::new()?;
        let project = directories_next::ProjectDirs::from("", "", APPLICATION);
        Some(Self { base, project })
    }
}

impl BaseDirs for SystemBaseDirs {
    fn home_dir(&self) -> Option<PathBuf> {
        Some(self.base.home_dir().to_path_buf())
    }

    fn config_dir(&self) -> Option<PathBuf> {
        match &self.project {
            Some(project) => Some(project.config_dir().to_path_buf()),
            None => Some(self.base.config_dir().join(APPLICATION)),
        }
    }

    fn data_dir(&self) -> Option<PathBuf> {
        match &self.project {
            Some(project) => Some(project.data_dir().to_path_buf()),
            None => Some(self.base.data_dir().join(APPLICATION)),
        }
    }
}

/// [`BaseDirs`] for platforms where no home directory can be found.
///
/// Every lookup returns `None`, so callers fall back to defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBaseDirs;

impl BaseDirs for NoBaseDirs {
    fn home_dir(&self) -> Option<PathBuf> {
        None
    }

    fn config_dir(&self) -> Option<PathBuf> {
        None
    }

    fn data_dir(&self) -> Option<PathBuf> {
        None
    }
}

/// Resolve the platform directories, or [`NoBaseDirs`] when there are none.
#[must_use]
pub fn system_or_none() -> Box<dyn BaseDirs> {
    match SystemBaseDirs::new() {
        Some(dirs) => Box::new(dirs),
        None => {
            log::warn!("no home directory found; using built-in defaults");
            Box::new(NoBaseDirs)
        }
    }
}
