//! Shared test utilities for the installer crate.
//!
//! Exposed to integration tests through the `test-support` feature.

use crate::install_log::{InstallLogError, InstallLogSink, InstallRecord, RecordOutcome};
use crate::permissions::WriteAccess;
use crate::release::{ArchiveFormat, FetchedArchive, Release, ReleaseAsset, ReleaseError, ReleaseProvider};
use std::cell::{Cell, RefCell};
use std::io::{self, Cursor, Write};
use std::path::Path;

/// Offset of the PE signature in images built by [`pe_image`].
pub const PE_OFFSET: u32 = 0x80;

/// Builds a minimal PE image whose COFF header declares `machine`.
///
/// The `PE\0\0` signature sits at [`PE_OFFSET`].
pub fn pe_image(machine: u16) -> Vec<u8> {
    pe_image_with_offset(machine, PE_OFFSET)
}

/// Builds a minimal PE image with the signature at `offset`.
///
/// # Panics
///
/// Panics if `offset` overlaps the DOS header.
pub fn pe_image_with_offset(machine: u16, offset: u32) -> Vec<u8> {
    let start = usize::try_from(offset).expect("offset fits in usize");
    let mut image = b"MZ".to_vec();
    image.resize(0x3C, 0);
    image.extend_from_slice(&offset.to_le_bytes());
    assert!(image.len() <= start, "offset {offset} overlaps the DOS header");
    image.resize(start, 0);
    image.extend_from_slice(b"PE\0\0");
    image.extend_from_slice(&machine.to_le_bytes());
    image.resize(start + 0x100, 0);
    image
}

/// Builds an ELF identification plus `e_machine` field.
///
/// `data` selects the byte order of `e_machine`: `2` is big-endian, anything
/// else little-endian.
pub fn elf_header(class: u8, data: u8, machine: u16) -> Vec<u8> {
    let mut header = b"\x7FELF".to_vec();
    header.extend_from_slice(&[class, data, 1]);
    header.resize(18, 0);
    let bytes = if data == 2 {
        machine.to_be_bytes()
    } else {
        machine.to_le_bytes()
    };
    header.extend_from_slice(&bytes);
    header.resize(64, 0);
    header
}

/// Builds an in-memory zip archive.
///
/// Names ending in `/` become directory entries.
///
/// # Panics
///
/// Panics if the in-memory writer fails.
pub fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, contents) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).expect("add directory");
        } else {
            writer.start_file(*name, options).expect("start file");
            writer.write_all(contents).expect("write entry");
        }
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Builds an in-memory gzip-compressed tarball.
///
/// Entry names are written verbatim into the header, so hostile names such
/// as `../x64/d3d11.dll` survive. Names ending in `/` become directories.
///
/// # Panics
///
/// Panics if a name exceeds the 100-byte header field or the in-memory
/// writer fails.
pub fn tar_gz_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, contents) in entries {
        let mut header = tar::Header::new_old();
        let raw = name.as_bytes();
        header
            .as_old_mut()
            .name
            .get_mut(..raw.len())
            .expect("entry name fits the header field")
            .copy_from_slice(raw);
        if name.ends_with('/') {
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            header.set_mode(0o755);
        } else {
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(u64::try_from(contents.len()).expect("entry size fits in u64"));
            header.set_mode(0o644);
        }
        header.set_cksum();
        builder.append(&header, *contents).expect("append entry");
    }
    let encoder = builder.into_inner().expect("finish tar");
    encoder.finish().expect("finish gzip")
}

/// Builds a DXVK-style release archive holding every library for both
/// architectures. Each file's contents name its architecture and file.
///
/// # Panics
///
/// Panics if the in-memory archive cannot be built.
pub fn dxvk_archive(format: ArchiveFormat, version: &str) -> FetchedArchive {
    dxvk_archive_with(format, version, &["d3d9.dll", "d3d10core.dll", "d3d11.dll", "dxgi.dll"])
}

/// Builds a DXVK-style release archive holding only `libraries`.
///
/// # Panics
///
/// Panics if the in-memory archive cannot be built.
pub fn dxvk_archive_with(format: ArchiveFormat, version: &str, libraries: &[&str]) -> FetchedArchive {
    let mut owned = Vec::new();
    for arch in ["x32", "x64"] {
        for library in libraries {
            owned.push((
                format!("dxvk-{version}/{arch}/{library}"),
                library_contents(arch, library),
            ));
        }
    }
    let entries: Vec<(&str, &[u8])> = owned
        .iter()
        .map(|(name, contents)| (name.as_str(), contents.as_slice()))
        .collect();
    let bytes = match format {
        ArchiveFormat::Zip => zip_archive(&entries),
        ArchiveFormat::TarGz => tar_gz_archive(&entries),
    };
    FetchedArchive { bytes, format }
}

/// Contents [`dxvk_archive`] stores for `library` in the `arch` folder.
pub fn library_contents(arch: &str, library: &str) -> Vec<u8> {
    format!("dxvk {arch} {library}").into_bytes()
}

/// A [`ReleaseProvider`] serving one canned release and archive.
#[derive(Debug)]
pub struct StubReleaseProvider {
    release: Option<Release>,
    archive: Option<FetchedArchive>,
    fetches: RefCell<Vec<String>>,
}

impl StubReleaseProvider {
    /// Serve `archive` as the only asset of release `version`.
    pub fn new(version: &str, archive: FetchedArchive) -> Self {
        let extension = match archive.format {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::TarGz => "tar.gz",
        };
        let name = format!("dxvk-{}.{extension}", version.trim_start_matches('v'));
        let release = Release {
            version: version.to_owned(),
            assets: vec![ReleaseAsset::new(
                name.clone(),
                format!("https://example.test/download/{name}"),
            )],
        };
        Self::with_release(release, Some(archive))
    }

    /// Serve an arbitrary release; `archive` answers every fetch.
    pub fn with_release(release: Release, archive: Option<FetchedArchive>) -> Self {
        Self {
            release: Some(release),
            archive,
            fetches: RefCell::new(Vec::new()),
        }
    }

    /// A provider whose every request fails as if offline.
    pub fn offline() -> Self {
        Self {
            release: None,
            archive: None,
            fetches: RefCell::new(Vec::new()),
        }
    }

    /// Download references fetched so far.
    pub fn fetches(&self) -> Vec<String> {
        self.fetches.borrow().clone()
    }

    fn offline_error(url: &str) -> ReleaseError {
        ReleaseError::HttpError {
            url: url.to_owned(),
            reason: "network unreachable".to_owned(),
        }
    }
}

impl ReleaseProvider for StubReleaseProvider {
    fn latest_release(&self) -> Result<Release, ReleaseError> {
        self.release
            .clone()
            .ok_or_else(|| Self::offline_error("https://example.test/releases/latest"))
    }

    fn fetch(&self, download_ref: &str) -> Result<FetchedArchive, ReleaseError> {
        self.fetches.borrow_mut().push(download_ref.to_owned());
        self.archive
            .clone()
            .ok_or_else(|| Self::offline_error(download_ref))
    }
}

/// An [`InstallLogSink`] keeping records in memory.
#[derive(Debug, Default)]
pub struct RecordingInstallLog {
    records: RefCell<Vec<InstallRecord>>,
    fail: Cell<bool>,
}

impl RecordingInstallLog {
    /// A sink whose every write fails.
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.fail.set(true);
        sink
    }

    /// Records received so far.
    pub fn records(&self) -> Vec<InstallRecord> {
        self.records.borrow().clone()
    }
}

impl InstallLogSink for RecordingInstallLog {
    fn record(&self, record: &InstallRecord) -> Result<RecordOutcome, InstallLogError> {
        if self.fail.get() {
            return Err(InstallLogError::MissingDataDirectory);
        }
        let mut records = self.records.borrow_mut();
        records.push(record.clone());
        Ok(RecordOutcome::new(records.len(), false))
    }
}

/// A [`WriteAccess`] that refuses every write.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeniedWriteAccess;

impl WriteAccess for DeniedWriteAccess {
    fn probe_dir(&self, _dir: &Path) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::PermissionDenied))
    }

    fn check_file(&self, _path: &Path) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::PermissionDenied))
    }
}
