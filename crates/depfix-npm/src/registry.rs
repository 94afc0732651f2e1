//! npm registry existence probe.

use depfix_core::RegistryProbe;

/// Builds the package-metadata URL for an npm package name.
///
/// Scoped names (`@scope/pkg`) are percent-encoded the way the registry
/// expects them.
pub fn package_url(base: &str, name: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        urlencoding::encode(name)
    )
}

/// Returns `true` iff the npm registry does not know the package.
pub async fn is_fake_package(probe: &RegistryProbe, base: &str, name: &str) -> bool {
    probe.is_missing(&package_url(base, name)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_url() {
        assert_eq!(
            package_url("https://registry.npmjs.org", "react"),
            "https://registry.npmjs.org/react"
        );
        assert_eq!(
            package_url("https://registry.npmjs.org", "@types/node"),
            "https://registry.npmjs.org/%40types%2Fnode"
        );
    }

    #[tokio::test]
    async fn test_fake_package_404() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/surely-not-a-package-xyz")
            .with_status(404)
            .create_async()
            .await;

        let probe = RegistryProbe::new();
        assert!(is_fake_package(&probe, &server.url(), "surely-not-a-package-xyz").await);
    }

    #[tokio::test]
    #[ignore]
    async fn test_real_react_exists() {
        let probe = RegistryProbe::new();
        assert!(!is_fake_package(&probe, "https://registry.npmjs.org", "react").await);
    }
}
