//! DXVK release retrieval and archive extraction.
//!
//! This module groups everything between "which release is current" and
//! "the wanted libraries sit in a staging directory":
//!
//! - [`asset`] - Release metadata, archive formats, and asset selection
//! - [`provider`] - Release metadata and archive download over HTTP
//! - [`extraction`] - Selective extraction of libraries from zip and tar.gz archives

pub mod asset;
pub mod extraction;
pub mod provider;

pub use asset::{ArchiveFormat, FetchedArchive, Release, ReleaseAsset};
pub use extraction::{ArchiveExtractor, ExtractionError, ExtractionReport, ReleaseArchiveExtractor};
pub use provider::{GithubReleaseProvider, ReleaseError, ReleaseProvider};
