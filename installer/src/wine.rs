//! Wine prefix discovery and Windows path mapping.
//!
//! On Linux, Windows games live inside Wine prefixes: directories holding a
//! `drive_c` tree. These helpers find the usual prefixes and map a Windows
//! path such as `C:\Games\Quake` to its location on the host.

use crate::dirs::BaseDirs;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Directories whose children are prefixes, relative to the home directory.
const PREFIX_COLLECTIONS: &[&[&str]] = &[
    &[".local", "share", "wineprefixes"],
    &[".steam", "steam", "steamapps", "compatdata"],
];

/// Returns true when `path` contains a `drive_c` directory.
#[must_use]
pub fn is_wine_prefix(path: &Path) -> bool {
    path.join("drive_c").is_dir()
}

/// Find Wine prefixes in the usual locations.
///
/// Checks `WINEPREFIX`, `~/.wine`, every prefix under
/// `~/.local/share/wineprefixes`, and every Proton prefix under Steam's
/// `compatdata` (where the prefix itself is the `pfx` subdirectory).
/// Returns an empty list on Windows.
#[must_use]
pub fn find_wine_prefixes(dirs: &dyn BaseDirs) -> Vec<PathBuf> {
    if cfg!(windows) {
        return Vec::new();
    }

    let mut found = Vec::new();
    let mut seen = BTreeSet::new();
    let mut push = |path: PathBuf| {
        if seen.insert(path.clone()) {
            found.push(path);
        }
    };

    if let Some(env_prefix) = std::env::var_os("WINEPREFIX").filter(|v| !v.is_empty()) {
        let env_prefix = PathBuf::from(env_prefix);
        if env_prefix.is_dir() {
            push(env_prefix);
        }
    }

    let Some(home) = dirs.home_dir() else {
        return found;
    };

    let default_prefix = home.join(".wine");
    if is_wine_prefix(&default_prefix) {
        push(default_prefix);
    }

    for segments in PREFIX_COLLECTIONS {
        let collection = segments.iter().fold(home.clone(), |dir, s| dir.join(s));
        for prefix in prefixes_in(&collection) {
            push(prefix);
        }
    }
    found
}

fn prefixes_in(collection: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(collection) {
        Ok(entries) => entries,
        Err(err) => {
            log::debug!("skipping {}: {err}", collection.display());
            return Vec::new();
        }
    };

    let mut prefixes: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter_map(|path| {
            if is_wine_prefix(&path) {
                Some(path)
            } else {
                let proton = path.join("pfx");
                is_wine_prefix(&proton).then_some(proton)
            }
        })
        .collect();
    prefixes.sort();
    prefixes
}

/// Map a Windows path into a Wine prefix.
///
/// `C:` maps to `drive_c`; other drive letters map to the prefix's
/// `dosdevices` links. Relative paths are taken relative to `C:\`.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use dxvk_installer::wine::windows_path_in_prefix;
///
/// let mapped = windows_path_in_prefix(Path::new("/home/u/.wine"), r"C:\Games\Quake");
/// assert_eq!(mapped, Path::new("/home/u/.wine/drive_c/Games/Quake"));
/// ```
#[must_use]
pub fn windows_path_in_prefix(prefix: &Path, windows_path: &str) -> PathBuf {
    let normalized = windows_path.trim().replace('\\', "/");
    let (drive, rest) = split_drive(&normalized);

    let mut result = match drive {
        None | Some('c') => prefix.join("drive_c"),
        Some(letter) => prefix.join("dosdevices").join(format!("{letter}:")),
    };
    let mut depth = 0_usize;
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if depth > 0 {
                    result.pop();
                    depth -= 1;
                }
            }
            other => {
                result.push(other);
                depth += 1;
            }
        }
    }
    result
}

fn split_drive(path: &str) -> (Option<char>, &str) {
    let mut chars = path.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic() => {
            (Some(letter.to_ascii_lowercase()), chars.as_str())
        }
        _ => (None, path),
    }
}
