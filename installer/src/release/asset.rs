//! Release metadata and archive asset selection.

use crate::error::{InstallerError, Result};
use std::fmt;

/// One published release of DXVK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Version tag, e.g. `v2.4`.
    pub version: String,
    /// Downloadable assets attached to the release.
    pub assets: Vec<ReleaseAsset>,
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    /// Asset file name, e.g. `dxvk-2.4.tar.gz`.
    pub name: String,
    /// Opaque reference the provider can fetch, usually a URL.
    pub download_ref: Option<String>,
}

impl ReleaseAsset {
    /// Construct an asset with a download reference.
    #[must_use]
    pub fn new(name: impl Into<String>, download_ref: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            download_ref: Some(download_ref.into()),
        }
    }

    /// Return the download reference, rejecting absent or blank values.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::MissingDownloadRef`] when the asset carries
    /// no usable reference.
    pub fn require_download_ref(&self) -> Result<&str> {
        self.download_ref
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| InstallerError::MissingDownloadRef {
                asset: self.name.clone(),
            })
    }
}

/// Compression format of a release archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// A zip archive.
    Zip,
    /// A gzip-compressed tarball.
    TarGz,
}

impl ArchiveFormat {
    /// Infer the format from an asset file name.
    ///
    /// # Examples
    ///
    /// ```
    /// use dxvk_installer::release::ArchiveFormat;
    ///
    /// assert_eq!(ArchiveFormat::from_asset_name("dxvk-2.4.zip"), Some(ArchiveFormat::Zip));
    /// assert_eq!(ArchiveFormat::from_asset_name("DXVK-2.4.TGZ"), Some(ArchiveFormat::TarGz));
    /// assert_eq!(ArchiveFormat::from_asset_name("dxvk-2.4.tar.zst"), None);
    /// ```
    #[must_use]
    pub fn from_asset_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else {
            None
        }
    }

    /// Lower ranks are preferred.
    const fn rank(self) -> u8 {
        match self {
            Self::Zip => 0,
            Self::TarGz => 1,
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zip => f.write_str("zip"),
            Self::TarGz => f.write_str("tar.gz"),
        }
    }
}

/// Archive bytes fetched from a provider.
#[derive(Clone, PartialEq, Eq)]
pub struct FetchedArchive {
    /// Raw archive bytes.
    pub bytes: Vec<u8>,
    /// Declared archive format.
    pub format: ArchiveFormat,
}

impl fmt::Debug for FetchedArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchedArchive")
            .field("len", &self.bytes.len())
            .field("format", &self.format)
            .finish()
    }
}

/// Pick the archive to install from a release.
///
/// Zip archives win over tarballs. Within a format, Windows builds win over
/// `dxvk-native` builds, which ship Linux shared objects instead of DLLs.
///
/// # Errors
///
/// Returns [`InstallerError::NoCompatibleAsset`] listing every asset name
/// when no asset has a supported archive extension.
pub fn select_asset(release: &Release) -> Result<(&ReleaseAsset, ArchiveFormat)> {
    release
        .assets
        .iter()
        .filter_map(|asset| ArchiveFormat::from_asset_name(&asset.name).map(|f| (asset, f)))
        .min_by_key(|(asset, format)| (format.rank(), is_native_build(&asset.name)))
        .ok_or_else(|| InstallerError::NoCompatibleAsset {
            version: release.version.clone(),
            seen: release.assets.iter().map(|a| a.name.clone()).collect(),
        })
}

fn is_native_build(name: &str) -> bool {
    name.to_ascii_lowercase().contains("native")
}

/// Derive a version label from an asset name when the tag is blank.
///
/// `dxvk-2.4.tar.gz` becomes `2.4`.
#[must_use]
pub fn version_from_asset_name(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    let stem_len = [".tar.gz", ".tgz", ".zip"]
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .map_or(name.len(), |ext| name.len() - ext.len());
    let stem = name.get(..stem_len).unwrap_or(name);
    stem.strip_prefix("dxvk-").unwrap_or(stem).to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use rstest::rstest;

    fn release(names: &[&str]) -> Release {
        Release {
            version: "v2.4".to_owned(),
            assets: names
                .iter()
                .map(|n| ReleaseAsset::new(*n, format!("https://example.test/{n}")))
                .collect(),
        }
    }

    #[test]
    fn zip_is_preferred_over_tarball() {
        let rel = release(&["dxvk-2.4.tar.gz", "dxvk-2.4.zip"]);
        let (asset, format) = select_asset(&rel).expect("asset");
        assert_eq!(asset.name, "dxvk-2.4.zip");
        assert_eq!(format, ArchiveFormat::Zip);
    }

    #[test]
    fn native_builds_lose_to_windows_builds() {
        let rel = release(&["dxvk-native-2.4-steamrt-sniper.tar.gz", "dxvk-2.4.tar.gz"]);
        let (asset, format) = select_asset(&rel).expect("asset");
        assert_eq!(asset.name, "dxvk-2.4.tar.gz");
        assert_eq!(format, ArchiveFormat::TarGz);
    }

    #[test]
    fn no_archive_lists_seen_assets() {
        let rel = release(&["checksums.txt"]);
        let err = select_asset(&rel).expect_err("no archive");
        assert_eq!(err.class(), ErrorClass::NotFound);
        assert!(err.to_string().contains("checksums.txt"));
    }

    #[rstest]
    #[case::absent(None)]
    #[case::empty(Some(""))]
    #[case::blank(Some("   "))]
    fn missing_download_ref_is_validation_error(#[case] download_ref: Option<&str>) {
        let asset = ReleaseAsset {
            name: "dxvk-2.4.zip".to_owned(),
            download_ref: download_ref.map(str::to_owned),
        };
        let err = asset.require_download_ref().expect_err("missing ref");
        assert_eq!(err.class(), ErrorClass::Validation);
    }

    #[rstest]
    #[case::tarball("dxvk-2.4.tar.gz", "2.4")]
    #[case::zip("dxvk-1.10.3.zip", "1.10.3")]
    #[case::unprefixed("release.tgz", "release")]
    fn versions_from_asset_names(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(version_from_asset_name(name), expected);
    }
}
