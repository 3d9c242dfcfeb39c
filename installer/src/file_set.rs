//! Static table of the DXVK libraries required per graphics API.

use crate::graphics_api::GraphicsApi;

const D3D9: &[&str] = &["d3d9.dll", "dxgi.dll"];
// DXVK ships d3d10core.dll for D3D10; it has no d3d10.dll.
const D3D10: &[&str] = &["d3d10core.dll", "dxgi.dll"];
const D3D11: &[&str] = &["d3d11.dll", "dxgi.dll"];
const ALL: &[&str] = &["d3d9.dll", "d3d10core.dll", "d3d11.dll", "dxgi.dll"];

/// Ordered set of library file names for one API selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSet {
    files: &'static [&'static str],
}

impl FileSet {
    /// Look up the file set for `api`.
    ///
    /// [`GraphicsApi::Unknown`] falls back to the union of every known
    /// library: installing unused libraries is cheaper than refusing.
    ///
    /// # Examples
    ///
    /// ```
    /// use dxvk_installer::file_set::FileSet;
    /// use dxvk_installer::graphics_api::GraphicsApi;
    ///
    /// let set = FileSet::for_api(GraphicsApi::Direct3D11);
    /// assert_eq!(set.names(), &["d3d11.dll", "dxgi.dll"]);
    /// assert_eq!(FileSet::for_api(GraphicsApi::Unknown).names().len(), 4);
    /// ```
    #[must_use]
    pub const fn for_api(api: GraphicsApi) -> Self {
        let files = match api {
            GraphicsApi::Direct3D9 => D3D9,
            GraphicsApi::Direct3D10 => D3D10,
            GraphicsApi::Direct3D11 => D3D11,
            GraphicsApi::Unknown => ALL,
        };
        Self { files }
    }

    /// File names in table order.
    #[must_use]
    pub const fn names(&self) -> &'static [&'static str] {
        self.files
    }

    /// Owned copies of the file names.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.files.iter().map(|name| (*name).to_owned()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::d3d9(GraphicsApi::Direct3D9, "d3d9.dll")]
    #[case::d3d10(GraphicsApi::Direct3D10, "d3d10core.dll")]
    #[case::d3d11(GraphicsApi::Direct3D11, "d3d11.dll")]
    fn every_api_includes_its_runtime_and_dxgi(#[case] api: GraphicsApi, #[case] runtime: &str) {
        let names = FileSet::for_api(api).names();
        assert!(names.contains(&runtime));
        assert!(names.contains(&"dxgi.dll"));
    }

    #[test]
    fn unknown_is_union_of_all_sets() {
        let union = FileSet::for_api(GraphicsApi::Unknown);
        for api in [
            GraphicsApi::Direct3D9,
            GraphicsApi::Direct3D10,
            GraphicsApi::Direct3D11,
        ] {
            for name in FileSet::for_api(api).names() {
                assert!(union.names().contains(name), "{name} missing from union");
            }
        }
        assert!(!union.names().contains(&"d3d10.dll"));
    }
}
