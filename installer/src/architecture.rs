//! Executable architecture detection.
//!
//! Classifies a native executable as 32-bit or 64-bit by reading only its
//! header. Windows PE images are the primary target; ELF images are also
//! understood so Linux-native binaries inside a game folder do not confuse
//! detection. Bytes that match neither layout yield
//! [`Architecture::Unrecognized`] rather than an error.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Number of bytes read from the start of the file.
const HEADER_PREFIX_LEN: u64 = 4096;

/// Offset of `e_lfanew` in the DOS header.
const PE_OFFSET_FIELD: usize = 0x3C;

/// `PE\0\0` followed by the two-byte machine field.
const PE_SIGNATURE_WINDOW: usize = 6;

/// Upper bound for `e_lfanew`; anything larger is treated as corrupt.
const MAX_PE_OFFSET: u32 = 16 * 1024 * 1024;

const IMAGE_FILE_MACHINE_I386: u16 = 0x014C;
const IMAGE_FILE_MACHINE_ARMNT: u16 = 0x01C4;
const IMAGE_FILE_MACHINE_AMD64: u16 = 0x8664;
const IMAGE_FILE_MACHINE_ARM64: u16 = 0xAA64;

const ELF_MAGIC: &[u8; 4] = b"\x7FELF";
const ELFCLASS32: u8 = 1;
const ELFCLASS64: u8 = 2;
/// `e_machine` values paired with the only `EI_CLASS` they are valid under.
const ELF_MACHINES: &[(u16, u8, Architecture)] = &[
    (3, ELFCLASS32, Architecture::ThirtyTwoBit), // EM_386
    (40, ELFCLASS32, Architecture::ThirtyTwoBit), // EM_ARM
    (62, ELFCLASS64, Architecture::SixtyFourBit), // EM_X86_64
    (183, ELFCLASS64, Architecture::SixtyFourBit), // EM_AARCH64
    (243, ELFCLASS64, Architecture::SixtyFourBit), // EM_RISCV
];

/// Instruction-width classification of an executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    /// 32-bit image.
    ThirtyTwoBit,
    /// 64-bit image.
    SixtyFourBit,
    /// The header did not match any known layout.
    Unrecognized,
}

impl Architecture {
    /// Archive folder token holding the libraries for this architecture.
    ///
    /// # Examples
    ///
    /// ```
    /// use dxvk_installer::architecture::Architecture;
    ///
    /// assert_eq!(Architecture::SixtyFourBit.folder_token(), "x64");
    /// assert_eq!(Architecture::ThirtyTwoBit.folder_token(), "x32");
    /// ```
    #[must_use]
    pub const fn folder_token(self) -> &'static str {
        match self {
            Self::SixtyFourBit => "x64",
            Self::ThirtyTwoBit | Self::Unrecognized => "x32",
        }
    }

    /// Returns true for the two installable architectures.
    #[must_use]
    pub const fn is_recognized(self) -> bool {
        matches!(self, Self::ThirtyTwoBit | Self::SixtyFourBit)
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ThirtyTwoBit => "32-bit",
            Self::SixtyFourBit => "64-bit",
            Self::Unrecognized => "unrecognized",
        };
        f.write_str(label)
    }
}

/// Error returned when parsing an architecture from user input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown architecture \"{0}\"; expected 32 or 64")]
pub struct ParseArchitectureError(String);

impl FromStr for Architecture {
    type Err = ParseArchitectureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "32" | "32-bit" | "32bit" | "x32" | "x86" | "i386" | "win32" => Ok(Self::ThirtyTwoBit),
            "64" | "64-bit" | "64bit" | "x64" | "x86_64" | "amd64" | "win64" => {
                Ok(Self::SixtyFourBit)
            }
            other => Err(ParseArchitectureError(other.to_owned())),
        }
    }
}

/// Outcome of inspecting a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// The file exists; its header was classified.
    Found(Architecture),
    /// No file exists at the path.
    NotFound,
}

impl Detection {
    /// The detected architecture, treating a missing file as unrecognized.
    #[must_use]
    pub const fn architecture(self) -> Architecture {
        match self {
            Self::Found(arch) => arch,
            Self::NotFound => Architecture::Unrecognized,
        }
    }
}

/// Detect the architecture of the executable at `path`.
///
/// Only a header prefix is read. Missing files produce
/// [`Detection::NotFound`]; unreadable or malformed files produce
/// `Found(Unrecognized)`.
#[must_use]
pub fn detect(path: &Path) -> Detection {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Detection::NotFound,
        Err(err) => {
            log::warn!("cannot read {}: {err}", path.display());
            return Detection::Found(Architecture::Unrecognized);
        }
    };

    match detect_from_reader(&mut file) {
        Ok(arch) => Detection::Found(arch),
        Err(err) => {
            log::warn!("failed reading header of {}: {err}", path.display());
            Detection::Found(Architecture::Unrecognized)
        }
    }
}

/// Classify a seekable stream positioned at the start of an image.
///
/// # Errors
///
/// Returns an I/O error only when reading fails; unknown layouts are
/// reported as [`Architecture::Unrecognized`].
pub fn detect_from_reader<R: Read + Seek>(reader: &mut R) -> io::Result<Architecture> {
    let mut header = Vec::new();
    reader
        .by_ref()
        .take(HEADER_PREFIX_LEN)
        .read_to_end(&mut header)?;

    if let Some(offset) = pe_header_offset(&header) {
        let window = pe_signature_window(reader, &header, offset)?;
        return Ok(window.as_deref().map_or(Architecture::Unrecognized, classify_pe_window));
    }
    Ok(classify_header(&header))
}

/// Classify an in-memory header prefix.
///
/// The PE signature must lie inside `header`; use [`detect_from_reader`] when
/// the image may place it further out.
#[must_use]
pub fn classify_header(header: &[u8]) -> Architecture {
    if let Some(offset) = pe_header_offset(header) {
        return usize::try_from(offset)
            .ok()
            .and_then(|start| header.get(start..start.checked_add(PE_SIGNATURE_WINDOW)?))
            .map_or(Architecture::Unrecognized, classify_pe_window);
    }
    if header.starts_with(ELF_MAGIC) {
        return classify_elf(header);
    }
    Architecture::Unrecognized
}

/// Read `e_lfanew` when the buffer starts with a DOS header.
fn pe_header_offset(header: &[u8]) -> Option<u32> {
    if !header.starts_with(b"MZ") {
        return None;
    }
    let bytes = header.get(PE_OFFSET_FIELD..PE_OFFSET_FIELD + 4)?;
    let offset = u32::from_le_bytes(bytes.try_into().ok()?);
    (offset <= MAX_PE_OFFSET).then_some(offset)
}

fn pe_signature_window<R: Read + Seek>(
    reader: &mut R,
    header: &[u8],
    offset: u32,
) -> io::Result<Option<Vec<u8>>> {
    let Ok(start) = usize::try_from(offset) else {
        return Ok(None);
    };
    if let Some(window) = header.get(start..start + PE_SIGNATURE_WINDOW) {
        return Ok(Some(window.to_vec()));
    }

    reader.seek(SeekFrom::Start(u64::from(offset)))?;
    let mut window = vec![0_u8; PE_SIGNATURE_WINDOW];
    match reader.read_exact(&mut window) {
        Ok(()) => Ok(Some(window)),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(err) => Err(err),
    }
}

fn classify_pe_window(window: &[u8]) -> Architecture {
    let Some((signature, machine)) = window.split_first_chunk::<4>() else {
        return Architecture::Unrecognized;
    };
    if signature != b"PE\0\0" {
        return Architecture::Unrecognized;
    }
    let Some(machine) = machine.first_chunk::<2>() else {
        return Architecture::Unrecognized;
    };
    match u16::from_le_bytes(*machine) {
        IMAGE_FILE_MACHINE_AMD64 | IMAGE_FILE_MACHINE_ARM64 => Architecture::SixtyFourBit,
        IMAGE_FILE_MACHINE_I386 | IMAGE_FILE_MACHINE_ARMNT => Architecture::ThirtyTwoBit,
        _ => Architecture::Unrecognized,
    }
}

fn classify_elf(header: &[u8]) -> Architecture {
    let (Some(&class), Some(&data)) = (header.get(4), header.get(5)) else {
        return Architecture::Unrecognized;
    };
    let Some(raw) = header.get(18..20).and_then(|b| b.first_chunk::<2>()) else {
        return Architecture::Unrecognized;
    };
    let machine = match data {
        1 => u16::from_le_bytes(*raw),
        2 => u16::from_be_bytes(*raw),
        _ => return Architecture::Unrecognized,
    };
    ELF_MACHINES
        .iter()
        .find(|&&(known, expected_class, _)| known == machine && expected_class == class)
        .map_or(Architecture::Unrecognized, |&(_, _, architecture)| architecture)
}

/// A game executable and its detected architecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameExecutable {
    /// Path to the executable.
    pub path: PathBuf,
    /// Detected architecture.
    pub architecture: Architecture,
}

/// List `.exe` files in `dir` and its immediate subdirectories.
///
/// Results are sorted, top-level files first, so repeated runs pick the same
/// executable.
///
/// # Errors
///
/// Returns an error if `dir` itself cannot be read. Unreadable
/// subdirectories are skipped.
pub fn find_game_executables(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut top_level = Vec::new();
    let mut nested = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            match std::fs::read_dir(&path) {
                Ok(children) => nested.extend(
                    children
                        .filter_map(Result::ok)
                        .map(|child| child.path())
                        .filter(|child| is_exe(child)),
                ),
                Err(err) => log::debug!("skipping {}: {err}", path.display()),
            }
        } else if is_exe(&path) {
            top_level.push(path);
        }
    }

    top_level.sort();
    nested.sort();
    top_level.extend(nested);
    Ok(top_level)
}

fn is_exe(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"))
}

/// Detect the first game executable found in `dir`.
///
/// Returns `None` when the directory has no executable or cannot be read.
#[must_use]
pub fn detect_game_executable(dir: &Path) -> Option<GameExecutable> {
    let executables = match find_game_executables(dir) {
        Ok(found) => found,
        Err(err) => {
            log::warn!("cannot list {}: {err}", dir.display());
            return None;
        }
    };
    let path = executables.first()?.clone();
    if executables.len() > 1 {
        log::info!(
            "{} executables found; using {} for analysis",
            executables.len(),
            path.display()
        );
    }
    let architecture = detect(&path).architecture();
    Some(GameExecutable { path, architecture })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{elf_header, pe_image, pe_image_with_offset};
    use rstest::rstest;
    use std::io::Cursor;

    #[rstest]
    #[case::amd64(0x8664, Architecture::SixtyFourBit)]
    #[case::arm64(0xAA64, Architecture::SixtyFourBit)]
    #[case::i386(0x014C, Architecture::ThirtyTwoBit)]
    #[case::armnt(0x01C4, Architecture::ThirtyTwoBit)]
    #[case::ia64(0x0200, Architecture::Unrecognized)]
    #[case::unknown(0x0000, Architecture::Unrecognized)]
    fn pe_machine_values_map_to_architectures(#[case] machine: u16, #[case] expected: Architecture) {
        assert_eq!(classify_header(&pe_image(machine)), expected);
    }

    #[rstest]
    #[case::x86_64_le(2, 1, 62, Architecture::SixtyFourBit)]
    #[case::i386_le(1, 1, 3, Architecture::ThirtyTwoBit)]
    #[case::aarch64(2, 1, 183, Architecture::SixtyFourBit)]
    #[case::riscv64(2, 1, 243, Architecture::SixtyFourBit)]
    #[case::arm_be(1, 2, 40, Architecture::ThirtyTwoBit)]
    #[case::x86_64_claiming_32(1, 1, 62, Architecture::Unrecognized)]
    #[case::i386_claiming_64(2, 1, 3, Architecture::Unrecognized)]
    #[case::riscv32(1, 1, 243, Architecture::Unrecognized)]
    #[case::ppc64_unlisted(2, 2, 21, Architecture::Unrecognized)]
    #[case::bad_class(3, 1, 62, Architecture::Unrecognized)]
    #[case::bad_data(2, 9, 62, Architecture::Unrecognized)]
    #[case::unknown_machine(2, 1, 9999, Architecture::Unrecognized)]
    fn elf_headers_map_to_architectures(
        #[case] class: u8,
        #[case] data: u8,
        #[case] machine: u16,
        #[case] expected: Architecture,
    ) {
        assert_eq!(classify_header(&elf_header(class, data, machine)), expected);
    }

    #[rstest]
    #[case::empty(b"".to_vec())]
    #[case::mz_only(b"MZ".to_vec())]
    #[case::text(b"#!/bin/sh\necho hi\n".to_vec())]
    #[case::elf_magic_only(b"\x7FELF".to_vec())]
    fn truncated_or_foreign_bytes_are_unrecognized(#[case] bytes: Vec<u8>) {
        assert_eq!(classify_header(&bytes), Architecture::Unrecognized);
    }

    #[test]
    fn truncated_pe_signature_is_unrecognized() {
        let mut image = pe_image(0x8664);
        image.truncate(0x80 + 3);
        assert_eq!(classify_header(&image), Architecture::Unrecognized);
    }

    #[test]
    fn wrong_pe_signature_is_unrecognized() {
        let mut image = pe_image(0x8664);
        if let Some(byte) = image.get_mut(0x80) {
            *byte = b'X';
        }
        assert_eq!(classify_header(&image), Architecture::Unrecognized);
    }

    #[test]
    fn pe_signature_beyond_prefix_is_read_by_seeking() {
        let image = pe_image_with_offset(0x014C, 6000);
        let mut cursor = Cursor::new(image);
        let arch = detect_from_reader(&mut cursor).expect("read header");
        assert_eq!(arch, Architecture::ThirtyTwoBit);
    }

    #[test]
    fn pe_offset_past_end_of_file_is_unrecognized() {
        let mut image = pe_image(0x8664);
        image.truncate(0x40);
        if let Some(field) = image.get_mut(0x3C..0x40) {
            field.copy_from_slice(&9000_u32.to_le_bytes());
        }
        let mut cursor = Cursor::new(image);
        let arch = detect_from_reader(&mut cursor).expect("read header");
        assert_eq!(arch, Architecture::Unrecognized);
    }

    #[test]
    fn missing_file_is_not_found() {
        let temp = tempfile::tempdir().expect("temp dir");
        let detection = detect(&temp.path().join("game.exe"));
        assert_eq!(detection, Detection::NotFound);
        assert_eq!(detection.architecture(), Architecture::Unrecognized);
    }

    #[test]
    fn detect_reads_file_on_disk() {
        let temp = tempfile::tempdir().expect("temp dir");
        let exe = temp.path().join("game.exe");
        std::fs::write(&exe, pe_image(0x8664)).expect("write exe");
        assert_eq!(detect(&exe), Detection::Found(Architecture::SixtyFourBit));
    }

    #[rstest]
    #[case::thirty_two("32", Architecture::ThirtyTwoBit)]
    #[case::label("64-bit", Architecture::SixtyFourBit)]
    #[case::token("X64", Architecture::SixtyFourBit)]
    #[case::x86("x86", Architecture::ThirtyTwoBit)]
    fn parses_user_input(#[case] input: &str, #[case] expected: Architecture) {
        assert_eq!(input.parse::<Architecture>(), Ok(expected));
    }

    #[test]
    fn rejects_unknown_input() {
        let err = "sparc".parse::<Architecture>().expect_err("expected failure");
        assert!(err.to_string().contains("sparc"));
    }

    #[test]
    fn finds_executables_at_depth_one_sorted() {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = temp.path();
        std::fs::create_dir_all(root.join("bin").join("deep")).expect("create dirs");
        std::fs::write(root.join("Game.EXE"), b"").expect("write");
        std::fs::write(root.join("readme.txt"), b"").expect("write");
        std::fs::write(root.join("bin").join("launcher.exe"), b"").expect("write");
        std::fs::write(root.join("bin").join("deep").join("hidden.exe"), b"").expect("write");

        let found = find_game_executables(root).expect("list");
        assert_eq!(
            found,
            vec![root.join("Game.EXE"), root.join("bin").join("launcher.exe")]
        );
    }

    #[test]
    fn detect_game_executable_uses_first_candidate() {
        let temp = tempfile::tempdir().expect("temp dir");
        std::fs::write(temp.path().join("a.exe"), pe_image(0x014C)).expect("write");
        std::fs::write(temp.path().join("b.exe"), pe_image(0x8664)).expect("write");

        let exe = detect_game_executable(temp.path()).expect("executable");
        assert_eq!(exe.path, temp.path().join("a.exe"));
        assert_eq!(exe.architecture, Architecture::ThirtyTwoBit);
    }

    #[test]
    fn detect_game_executable_without_candidates_is_none() {
        let temp = tempfile::tempdir().expect("temp dir");
        assert!(detect_game_executable(temp.path()).is_none());
    }
}
