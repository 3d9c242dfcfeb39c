//! Selective extraction of DXVK libraries from release archives.
//!
//! Release archives nest the libraries under a version directory and one
//! folder per architecture (`dxvk-2.4/x64/d3d11.dll`). Only entries below
//! the folder for the requested architecture whose base name is wanted are
//! written, and only ever as `staging_dir/<wanted name>`, so an entry name
//! can never place a file outside the staging directory.

use super::asset::{ArchiveFormat, FetchedArchive};
use crate::architecture::Architecture;
use crate::error::ErrorClass;
use flate2::read::GzDecoder;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Component, Path};

/// Trait for extracting release archives, enabling test mocking.
///
/// # Examples
///
/// ```
/// use dxvk_installer::release::ReleaseArchiveExtractor;
///
/// let extractor = ReleaseArchiveExtractor;
/// // Use extractor.extract(&archive, arch, &wanted, staging_dir) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor {
    /// Extract the `wanted` libraries for `architecture` into `staging_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Corrupt`] if the bytes do not parse as the
    /// declared format, [`ExtractionError::NothingExtracted`] if no wanted
    /// file was found, and [`ExtractionError::Io`] on write failures.
    fn extract(
        &self,
        archive: &FetchedArchive,
        architecture: Architecture,
        wanted: &[String],
        staging_dir: &Path,
    ) -> Result<ExtractionReport, ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The archive bytes could not be parsed.
    #[error("{format} archive is corrupt: {reason}")]
    Corrupt {
        /// Declared archive format.
        format: ArchiveFormat,
        /// Parser error description.
        reason: String,
    },

    /// None of the wanted files exist in the archive.
    #[error("archive contains none of the expected files under {folder}/: {}", .expected.join(", "))]
    NothingExtracted {
        /// Architecture folder that was searched.
        folder: String,
        /// Files that were looked for.
        expected: Vec<String>,
    },

    /// I/O error writing to the staging directory.
    #[error("extraction I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ExtractionError {
    /// Return the [`ErrorClass`] of this error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Corrupt { .. } => ErrorClass::Corrupt,
            Self::NothingExtracted { .. } => ErrorClass::NotFound,
            Self::Io(err) => ErrorClass::from_io_kind(err.kind()),
        }
    }
}

/// Which wanted files were extracted and which were absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Extracted file names, in wanted order.
    pub extracted: Vec<String>,
    /// Wanted file names absent from the archive, in wanted order.
    pub missing: Vec<String>,
}

/// Default extractor handling zip and gzip-compressed tar archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReleaseArchiveExtractor;

impl ArchiveExtractor for ReleaseArchiveExtractor {
    fn extract(
        &self,
        archive: &FetchedArchive,
        architecture: Architecture,
        wanted: &[String],
        staging_dir: &Path,
    ) -> Result<ExtractionReport, ExtractionError> {
        let mut selector = EntrySelector::new(architecture.folder_token(), wanted);
        match archive.format {
            ArchiveFormat::Zip => extract_zip(&archive.bytes, &mut selector, staging_dir)?,
            ArchiveFormat::TarGz => extract_tar_gz(&archive.bytes, &mut selector, staging_dir)?,
        }
        selector.into_report()
    }
}

fn extract_zip(
    bytes: &[u8],
    selector: &mut EntrySelector<'_>,
    staging_dir: &Path,
) -> Result<(), ExtractionError> {
    let corrupt = |e: zip::result::ZipError| ExtractionError::Corrupt {
        format: ArchiveFormat::Zip,
        reason: e.to_string(),
    };
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).map_err(corrupt)?;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(corrupt)?;
        if entry.is_dir() || entry.is_symlink() {
            continue;
        }
        let raw_name = entry.name().to_owned();
        if let Some(name) = selector.select(&raw_name) {
            write_entry(&mut entry, staging_dir, name, ArchiveFormat::Zip)?;
        }
    }
    Ok(())
}

fn extract_tar_gz(
    bytes: &[u8],
    selector: &mut EntrySelector<'_>,
    staging_dir: &Path,
) -> Result<(), ExtractionError> {
    let corrupt = |e: io::Error| ExtractionError::Corrupt {
        format: ArchiveFormat::TarGz,
        reason: e.to_string(),
    };
    let mut tar = tar::Archive::new(GzDecoder::new(bytes));

    for entry_result in tar.entries().map_err(corrupt)? {
        let mut entry = entry_result.map_err(corrupt)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let raw_name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        if let Some(name) = selector.select(&raw_name) {
            write_entry(&mut entry, staging_dir, name, ArchiveFormat::TarGz)?;
        }
    }
    Ok(())
}

/// Stream one entry to `staging_dir/name`.
fn write_entry(
    source: &mut dyn Read,
    staging_dir: &Path,
    name: &str,
    format: ArchiveFormat,
) -> Result<(), ExtractionError> {
    let dest = staging_dir.join(name);
    let mut file = File::create(&dest)?;
    io::copy(source, &mut file).map_err(|e| match e.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => ExtractionError::Corrupt {
            format,
            reason: e.to_string(),
        },
        _ => ExtractionError::Io(e),
    })?;
    log::debug!("staged {}", dest.display());
    Ok(())
}

/// Decides which archive entries to extract and tracks what was taken.
struct EntrySelector<'a> {
    token: &'static str,
    wanted: &'a [String],
    taken: HashSet<&'a str>,
}

impl<'a> EntrySelector<'a> {
    fn new(token: &'static str, wanted: &'a [String]) -> Self {
        Self {
            token,
            wanted,
            taken: HashSet::new(),
        }
    }

    /// Return the wanted name to stage `raw_name` as, if the entry qualifies
    /// and no earlier entry already supplied that name.
    fn select(&mut self, raw_name: &str) -> Option<&'a str> {
        let name = match_entry(raw_name, self.token, self.wanted)?;
        if !self.taken.insert(name) {
            log::warn!("ignoring duplicate archive entry {raw_name} for {name}");
            return None;
        }
        Some(name)
    }

    fn into_report(self) -> Result<ExtractionReport, ExtractionError> {
        let (extracted, missing): (Vec<String>, Vec<String>) = self
            .wanted
            .iter()
            .cloned()
            .partition(|w| self.taken.contains(w.as_str()));
        if extracted.is_empty() {
            return Err(ExtractionError::NothingExtracted {
                folder: self.token.to_owned(),
                expected: self.wanted.to_vec(),
            });
        }
        Ok(ExtractionReport { extracted, missing })
    }
}

/// Match an archive entry name against the architecture token and the
/// wanted file names.
///
/// The token must equal one of the entry's directory segments exactly
/// (ignoring ASCII case); the base name must equal a wanted name. Returns
/// the wanted name, never the archive's spelling.
fn match_entry<'w>(raw_name: &str, token: &str, wanted: &'w [String]) -> Option<&'w str> {
    let normalized = raw_name.replace('\\', "/");
    let mut segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
    let base = segments.pop()?;
    if !is_safe_base_name(base) {
        return None;
    }
    if !segments.iter().any(|dir| dir.eq_ignore_ascii_case(token)) {
        return None;
    }
    wanted
        .iter()
        .map(String::as_str)
        .find(|w| w.eq_ignore_ascii_case(base) && is_plain_file_name(w))
}

fn is_safe_base_name(base: &str) -> bool {
    !matches!(base, "." | "..") && !base.contains(':')
}

/// True when `name` is a single normal path component.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{tar_gz_archive, zip_archive};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    fn wanted(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_owned()).collect()
    }

    #[fixture]
    fn staging() -> TempDir {
        tempfile::tempdir().expect("staging dir")
    }

    fn archive(format: ArchiveFormat, entries: &[(&str, &[u8])]) -> FetchedArchive {
        let bytes = match format {
            ArchiveFormat::Zip => zip_archive(entries),
            ArchiveFormat::TarGz => tar_gz_archive(entries),
        };
        FetchedArchive { bytes, format }
    }

    #[rstest]
    #[case::zip(ArchiveFormat::Zip)]
    #[case::tar_gz(ArchiveFormat::TarGz)]
    fn extracts_wanted_files_for_architecture(staging: TempDir, #[case] format: ArchiveFormat) {
        let archive = archive(
            format,
            &[
                ("dxvk-2.4/x64/d3d11.dll", b"d3d11-64"),
                ("dxvk-2.4/x64/dxgi.dll", b"dxgi-64"),
                ("dxvk-2.4/x32/d3d11.dll", b"d3d11-32"),
                ("dxvk-2.4/x64/d3d9.dll", b"d3d9-64"),
            ],
        );
        let report = ReleaseArchiveExtractor
            .extract(
                &archive,
                Architecture::SixtyFourBit,
                &wanted(&["d3d11.dll", "dxgi.dll"]),
                staging.path(),
            )
            .expect("extract");

        assert_eq!(report.extracted, wanted(&["d3d11.dll", "dxgi.dll"]));
        assert!(report.missing.is_empty());
        let staged = std::fs::read(staging.path().join("d3d11.dll")).expect("read staged");
        assert_eq!(staged, b"d3d11-64");
        assert!(!staging.path().join("d3d9.dll").exists());
    }

    #[rstest]
    #[case::zip(ArchiveFormat::Zip)]
    #[case::tar_gz(ArchiveFormat::TarGz)]
    fn reports_missing_files(staging: TempDir, #[case] format: ArchiveFormat) {
        let archive = archive(format, &[("dxvk-2.4/x32/dxgi.dll", b"dxgi")]);
        let report = ReleaseArchiveExtractor
            .extract(
                &archive,
                Architecture::ThirtyTwoBit,
                &wanted(&["d3d9.dll", "dxgi.dll"]),
                staging.path(),
            )
            .expect("extract");

        assert_eq!(report.extracted, wanted(&["dxgi.dll"]));
        assert_eq!(report.missing, wanted(&["d3d9.dll"]));
    }

    #[rstest]
    fn nothing_extracted_is_an_error(staging: TempDir) {
        let archive = archive(ArchiveFormat::Zip, &[("dxvk-2.4/x64/readme.txt", b"hi")]);
        let err = ReleaseArchiveExtractor
            .extract(
                &archive,
                Architecture::SixtyFourBit,
                &wanted(&["d3d11.dll"]),
                staging.path(),
            )
            .expect_err("nothing to extract");
        assert!(matches!(err, ExtractionError::NothingExtracted { .. }));
        assert_eq!(err.class(), ErrorClass::NotFound);
    }

    #[rstest]
    #[case::zip(ArchiveFormat::Zip)]
    #[case::tar_gz(ArchiveFormat::TarGz)]
    fn garbage_bytes_are_corrupt(staging: TempDir, #[case] format: ArchiveFormat) {
        let archive = FetchedArchive {
            bytes: b"definitely not an archive".to_vec(),
            format,
        };
        let err = ReleaseArchiveExtractor
            .extract(
                &archive,
                Architecture::SixtyFourBit,
                &wanted(&["d3d11.dll"]),
                staging.path(),
            )
            .expect_err("corrupt");
        assert_eq!(err.class(), ErrorClass::Corrupt);
    }

    #[rstest]
    fn first_duplicate_wins(staging: TempDir) {
        let archive = archive(
            ArchiveFormat::Zip,
            &[
                ("a/x64/D3D11.DLL", b"first"),
                ("b/x64/d3d11.dll", b"second"),
            ],
        );
        ReleaseArchiveExtractor
            .extract(
                &archive,
                Architecture::SixtyFourBit,
                &wanted(&["d3d11.dll"]),
                staging.path(),
            )
            .expect("extract");
        let staged = std::fs::read(staging.path().join("d3d11.dll")).expect("read staged");
        assert_eq!(staged, b"first");
    }

    #[rstest]
    #[case::parent_dirs("../../x64/d3d11.dll")]
    #[case::absolute("/tmp/x64/d3d11.dll")]
    #[case::backslashes("..\\..\\x64\\d3d11.dll")]
    #[case::drive("C:\\x64\\d3d11.dll")]
    fn hostile_entry_names_stay_in_staging(staging: TempDir, #[case] entry: &str) {
        let root = staging.path().join("stage");
        std::fs::create_dir(&root).expect("create stage");
        let archive = archive(ArchiveFormat::Zip, &[(entry, b"payload")]);
        let report = ReleaseArchiveExtractor
            .extract(
                &archive,
                Architecture::SixtyFourBit,
                &wanted(&["d3d11.dll"]),
                &root,
            )
            .expect("extract");

        assert_eq!(report.extracted, wanted(&["d3d11.dll"]));
        let children: Vec<_> = std::fs::read_dir(staging.path())
            .expect("read dir")
            .filter_map(Result::ok)
            .map(|e| e.file_name())
            .collect();
        assert_eq!(children, vec![std::ffi::OsString::from("stage")]);
        assert!(root.join("d3d11.dll").is_file());
    }

    #[rstest]
    #[case::exact("dxvk/x64/d3d11.dll", Some("d3d11.dll"))]
    #[case::case_insensitive("DXVK/X64/D3D11.dll", Some("d3d11.dll"))]
    #[case::prefix_only("dxvk/x6432/d3d11.dll", None)]
    #[case::suffix_only("dxvk/bin-x64/d3d11.dll", None)]
    #[case::token_as_base_name("dxvk/d3d11.dll/x64", None)]
    #[case::no_directory("d3d11.dll", None)]
    #[case::dot_base("x64/..", None)]
    fn token_matching_is_segment_exact(#[case] raw: &str, #[case] expected: Option<&str>) {
        let names = wanted(&["d3d11.dll"]);
        assert_eq!(match_entry(raw, "x64", &names), expected);
    }

    #[test]
    fn wanted_names_with_separators_are_never_used() {
        let names = wanted(&["../d3d11.dll"]);
        assert_eq!(match_entry("x64/../d3d11.dll", "x64", &names), None);
    }
}
