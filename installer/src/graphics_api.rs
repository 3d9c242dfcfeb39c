//! Graphics API inference from marker libraries.
//!
//! Games ship or load specific Direct3D runtime libraries. Their presence in
//! the top level of a game folder is a cheap hint at which API generation the
//! game renders with.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Graphics API generations DXVK can translate.
///
/// The declaration order is the precedence order: later variants are newer
/// and win when a single API has to be chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GraphicsApi {
    /// No marker library was found.
    Unknown,
    /// Direct3D 9.
    Direct3D9,
    /// Direct3D 10 / 10.1.
    Direct3D10,
    /// Direct3D 11.
    Direct3D11,
}

/// Where a marker points.
#[derive(Debug, Clone, Copy)]
enum Marker {
    /// The marker identifies exactly one API.
    Exact(GraphicsApi),
    /// The marker is shared between two generations; the newer one wins.
    Ambiguous(GraphicsApi, GraphicsApi),
}

impl Marker {
    fn resolve(self) -> GraphicsApi {
        match self {
            Self::Exact(api) => api,
            Self::Ambiguous(a, b) => a.max(b),
        }
    }
}

const MARKERS: &[(&str, Marker)] = &[
    ("d3d9.dll", Marker::Exact(GraphicsApi::Direct3D9)),
    ("d3d10.dll", Marker::Exact(GraphicsApi::Direct3D10)),
    ("d3d10_1.dll", Marker::Exact(GraphicsApi::Direct3D10)),
    ("d3d10core.dll", Marker::Exact(GraphicsApi::Direct3D10)),
    ("d3d11.dll", Marker::Exact(GraphicsApi::Direct3D11)),
    (
        "dxgi.dll",
        Marker::Ambiguous(GraphicsApi::Direct3D10, GraphicsApi::Direct3D11),
    ),
];

impl GraphicsApi {
    /// Pick one API from a scan result using newest-first precedence.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::BTreeSet;
    /// use dxvk_installer::graphics_api::GraphicsApi;
    ///
    /// let found = BTreeSet::from([GraphicsApi::Direct3D9, GraphicsApi::Direct3D11]);
    /// assert_eq!(GraphicsApi::preferred(&found), GraphicsApi::Direct3D11);
    /// assert_eq!(GraphicsApi::preferred(&BTreeSet::new()), GraphicsApi::Unknown);
    /// ```
    #[must_use]
    pub fn preferred(found: &BTreeSet<Self>) -> Self {
        found.last().copied().unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for GraphicsApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unknown => "Unknown",
            Self::Direct3D9 => "Direct3D 9",
            Self::Direct3D10 => "Direct3D 10",
            Self::Direct3D11 => "Direct3D 11",
        };
        f.write_str(label)
    }
}

/// Error returned when parsing an API from user input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown graphics API \"{0}\"; expected d3d9, d3d10, d3d11 or all")]
pub struct ParseGraphicsApiError(String);

impl FromStr for GraphicsApi {
    type Err = ParseGraphicsApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "d3d9" | "dx9" | "direct3d9" => Ok(Self::Direct3D9),
            "d3d10" | "dx10" | "direct3d10" => Ok(Self::Direct3D10),
            "d3d11" | "dx11" | "direct3d11" => Ok(Self::Direct3D11),
            "all" | "unknown" => Ok(Self::Unknown),
            _ => Err(ParseGraphicsApiError(s.to_owned())),
        }
    }
}

/// Scan the top level of `dir` for marker libraries.
///
/// Returns `{Unknown}` when no markers are present or the directory cannot be
/// read.
#[must_use]
pub fn scan(dir: &Path) -> BTreeSet<GraphicsApi> {
    let mut found = BTreeSet::new();

    match std::fs::read_dir(dir) {
        Ok(entries) => {
            for entry in entries.filter_map(Result::ok) {
                if !entry.file_type().is_ok_and(|t| t.is_file()) {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().to_ascii_lowercase();
                if let Some(api) = api_for_marker(&name) {
                    found.insert(api);
                }
            }
        }
        Err(err) => log::warn!("cannot scan {} for marker libraries: {err}", dir.display()),
    }

    if found.is_empty() {
        found.insert(GraphicsApi::Unknown);
    }
    found
}

fn api_for_marker(lowercase_name: &str) -> Option<GraphicsApi> {
    MARKERS
        .iter()
        .find(|(marker, _)| *marker == lowercase_name)
        .map(|(_, marker)| marker.resolve())
}
