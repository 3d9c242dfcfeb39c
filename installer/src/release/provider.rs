//! Release metadata and archive retrieval.
//!
//! Provides a trait-based abstraction over the release source so the
//! orchestrator can be exercised without network access. The production
//! implementation talks to the GitHub releases API.

use super::asset::{ArchiveFormat, FetchedArchive, Release, ReleaseAsset};
use crate::error::ErrorClass;
use serde::Deserialize;
use std::time::Duration;

/// Repository queried when no override is configured.
pub const DEFAULT_REPOSITORY: &str = "doitsujin/dxvk";

/// Default global timeout for every HTTP request.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

const GITHUB_API: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("dxvk-manager/", env!("CARGO_PKG_VERSION"));

/// Source of DXVK releases.
///
/// # Examples
///
/// ```no_run
/// use dxvk_installer::release::{GithubReleaseProvider, ReleaseProvider};
///
/// let provider = GithubReleaseProvider::default();
/// let release = provider.latest_release()?;
/// println!("latest DXVK is {}", release.version);
/// # Ok::<(), dxvk_installer::release::ReleaseError>(())
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ReleaseProvider {
    /// Fetch metadata for the most recent release.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    fn latest_release(&self) -> Result<Release, ReleaseError>;

    /// Download the archive behind `download_ref`.
    ///
    /// # Errors
    ///
    /// Returns an error if the download fails or the archive format cannot
    /// be determined.
    fn fetch(&self, download_ref: &str) -> Result<FetchedArchive, ReleaseError>;
}

/// Errors arising from release retrieval.
#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    /// HTTP request failed.
    #[error("request failed for {url}: {reason}")]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The release or asset was not found (HTTP 404).
    #[error("release not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// The response body could not be understood.
    #[error("unexpected response from {url}: {reason}")]
    InvalidResponse {
        /// The URL that was requested.
        url: String,
        /// What was wrong with the body.
        reason: String,
    },

    /// The configured repository is not of the form `owner/name`.
    #[error("invalid repository \"{value}\"; expected owner/name")]
    InvalidRepository {
        /// The rejected value.
        value: String,
    },

    /// I/O error reading the response body.
    #[error("I/O error reading download: {0}")]
    Io(#[from] std::io::Error),
}

impl ReleaseError {
    /// Return the [`ErrorClass`] of this error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::HttpError { .. } => ErrorClass::Io,
            Self::NotFound { .. } => ErrorClass::NotFound,
            Self::InvalidResponse { .. } => ErrorClass::Corrupt,
            Self::InvalidRepository { .. } => ErrorClass::Validation,
            Self::Io(err) => ErrorClass::from_io_kind(err.kind()),
        }
    }
}

/// Release provider backed by the GitHub REST API.
pub struct GithubReleaseProvider {
    repository: String,
    agent: ureq::Agent,
}

impl std::fmt::Debug for GithubReleaseProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubReleaseProvider")
            .field("repository", &self.repository)
            .finish_non_exhaustive()
    }
}

impl GithubReleaseProvider {
    /// Create a provider for `repository` with a global request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::InvalidRepository`] unless `repository` has
    /// the form `owner/name`.
    pub fn new(repository: &str, timeout: Duration) -> Result<Self, ReleaseError> {
        let repository = validate_repository(repository)?;
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Ok(Self {
            repository,
            agent: ureq::Agent::new_with_config(config),
        })
    }

    /// The `owner/name` repository this provider queries.
    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// URL of the latest-release endpoint for a repository.
    ///
    /// # Examples
    ///
    /// ```
    /// use dxvk_installer::release::GithubReleaseProvider;
    ///
    /// let url = GithubReleaseProvider::latest_release_url("doitsujin/dxvk");
    /// assert_eq!(url, "https://api.github.com/repos/doitsujin/dxvk/releases/latest");
    /// ```
    #[must_use]
    pub fn latest_release_url(repository: &str) -> String {
        format!("{GITHUB_API}/repos/{repository}/releases/latest")
    }

    fn get(&self, url: &str, accept: &str) -> Result<ureq::Body, ReleaseError> {
        log::debug!("GET {url}");
        let response = self
            .agent
            .get(url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", accept)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        Ok(response.into_body())
    }
}

impl Default for GithubReleaseProvider {
    fn default() -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(DEFAULT_HTTP_TIMEOUT))
            .build();
        Self {
            repository: DEFAULT_REPOSITORY.to_owned(),
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl ReleaseProvider for GithubReleaseProvider {
    fn latest_release(&self) -> Result<Release, ReleaseError> {
        let url = Self::latest_release_url(&self.repository);
        let body = self
            .get(&url, "application/vnd.github+json")?
            .read_to_string()
            .map_err(|e| ReleaseError::HttpError {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        parse_release(&url, &body)
    }

    fn fetch(&self, download_ref: &str) -> Result<FetchedArchive, ReleaseError> {
        let format = format_from_ref(download_ref)?;
        let mut body = self.get(download_ref, "application/octet-stream")?;
        let mut bytes = Vec::new();
        std::io::copy(&mut body.as_reader(), &mut bytes)?;
        log::debug!("downloaded {} bytes from {download_ref}", bytes.len());
        Ok(FetchedArchive { bytes, format })
    }
}

#[derive(Debug, Deserialize)]
struct GithubRelease {
    tag_name: String,
    #[serde(default)]
    assets: Vec<GithubAsset>,
}

#[derive(Debug, Deserialize)]
struct GithubAsset {
    name: String,
    #[serde(default)]
    browser_download_url: Option<String>,
}

/// Parse a GitHub release JSON document.
fn parse_release(url: &str, body: &str) -> Result<Release, ReleaseError> {
    let raw: GithubRelease =
        serde_json::from_str(body).map_err(|e| ReleaseError::InvalidResponse {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;
    Ok(Release {
        version: raw.tag_name,
        assets: raw
            .assets
            .into_iter()
            .map(|a| ReleaseAsset {
                name: a.name,
                download_ref: a.browser_download_url,
            })
            .collect(),
    })
}

/// Infer the archive format from the last path segment of a download URL.
fn format_from_ref(download_ref: &str) -> Result<ArchiveFormat, ReleaseError> {
    let path = download_ref
        .split(['?', '#'])
        .next()
        .unwrap_or(download_ref);
    let file_name = path.rsplit('/').next().unwrap_or(path);
    ArchiveFormat::from_asset_name(file_name).ok_or_else(|| ReleaseError::InvalidResponse {
        url: download_ref.to_owned(),
        reason: format!("cannot tell the archive format of \"{file_name}\""),
    })
}

fn validate_repository(value: &str) -> Result<String, ReleaseError> {
    let trimmed = value.trim().trim_matches('/');
    let mut parts = trimmed.split('/');
    let valid = matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
    );
    if valid {
        Ok(trimmed.to_owned())
    } else {
        Err(ReleaseError::InvalidRepository {
            value: value.to_owned(),
        })
    }
}

/// Map a ureq error to a [`ReleaseError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> ReleaseError {
    match err {
        ureq::Error::StatusCode(404) => ReleaseError::NotFound {
            url: url.to_owned(),
        },
        other => ReleaseError::HttpError {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
