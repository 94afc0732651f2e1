//! crates.io existence probe.
//!
//! `https://crates.io/api/v1/crates/{name}/versions` answers 404 for names
//! that were never published, which is exactly the fake-library signal.

use depfix_core::RegistryProbe;

/// Builds the versions-endpoint URL for a crate name.
pub fn versions_url(base: &str, name: &str) -> String {
    format!(
        "{}/api/v1/crates/{}/versions",
        base.trim_end_matches('/'),
        urlencoding::encode(name)
    )
}

/// Returns `true` iff crates.io does not know the crate.
pub async fn is_fake_crate(probe: &RegistryProbe, base: &str, name: &str) -> bool {
    probe.is_missing(&versions_url(base, name)).await
}
