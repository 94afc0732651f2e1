//! NuGet existence probe.
//!
//! External references are checked against the flat-container index, which
//! is case-sensitive and keyed by lowercase package id. Project references
//! never touch the network: they are "fake" iff the referenced file does
//! not exist on disk relative to the declaring build file.

use std::path::Path;

use depfix_core::RegistryProbe;

/// Builds the flat-container index URL for a package id.
pub fn index_url(base: &str, name: &str) -> String {
    format!(
        "{}/v3-flatcontainer/{}/index.json",
        base.trim_end_matches('/'),
        name.to_lowercase()
    )
}

/// Returns `true` iff nuget.org does not know the package.
pub async fn is_fake_package(probe: &RegistryProbe, base: &str, name: &str) -> bool {
    probe.is_missing(&index_url(base, name)).await
}

/// Returns `true` iff a project reference does not resolve on disk.
///
/// `build_file` is the csproj that declares the reference; Windows path
/// separators in the reference are normalised first.
pub fn is_dangling_project_ref(project_root: &Path, build_file: &str, reference: &str) -> bool {
    let reference = reference.replace('\\', "/");
    let base = project_root
        .join(build_file)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| project_root.to_path_buf());
    !base.join(reference).exists()
}
