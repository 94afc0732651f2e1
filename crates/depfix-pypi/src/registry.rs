//! PyPI existence probe.
//!
//! Direct-URL requirements are probed at their own URL; everything else is
//! checked against the PyPI JSON API.

use depfix_core::{PypiDependency, RegistryProbe};

/// Builds the JSON-API URL for a package name.
pub fn package_url(base: &str, name: &str) -> String {
    format!(
        "{}/pypi/{}/json",
        base.trim_end_matches('/'),
        urlencoding::encode(name)
    )
}

/// Returns `true` iff the requirement names something PyPI (or, for direct
/// references, the referenced URL) does not serve.
pub async fn is_fake_requirement(probe: &RegistryProbe, base: &str, dep: &PypiDependency) -> bool {
    if let Some(url) = &dep.url {
        return probe.is_missing(url).await;
    }
    probe.is_missing(&package_url(base, &dep.name)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_url() {
        assert_eq!(
            package_url("https://pypi.org", "requests"),
            "https://pypi.org/pypi/requests/json"
        );
    }

    #[tokio::test]
    async fn test_fake_requirement_404() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pypi/not-a-real-pkg-xyz-123/json")
            .with_status(404)
            .create_async()
            .await;

        let probe = RegistryProbe::new();
        let dep = PypiDependency::bare("not-a-real-pkg-xyz-123");
        assert!(is_fake_requirement(&probe, &server.url(), &dep).await);
    }

    #[tokio::test]
    async fn test_url_requirement_probes_url() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/dist/mylib-1.0.tar.gz")
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let probe = RegistryProbe::new();
        let dep = PypiDependency {
            url: Some(format!("{}/dist/mylib-1.0.tar.gz", server.url())),
            ..PypiDependency::bare("mylib")
        };
        // The package name never hits PyPI when a URL is present.
        assert!(!is_fake_requirement(&probe, "http://127.0.0.1:1", &dep).await);
    }

    #[tokio::test]
    #[ignore]
    async fn test_real_requests_exists() {
        let probe = RegistryProbe::new();
        let dep = PypiDependency::bare("requests");
        assert!(!is_fake_requirement(&probe, "https://pypi.org", &dep).await);
    }
}
