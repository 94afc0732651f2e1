//! Fake-library registry probe.
//!
//! The textual metric counts how many predicted dependencies name packages
//! that do not exist on the ecosystem's public registry. The probe is a
//! best-effort HTTPS GET: only a definitive 404 marks a package as fake;
//! rate limits, 5xx responses and network errors are logged and treated as
//! not-fake so registry outages can never dominate the metric.

use std::time::Duration;

use crate::error::{CoreError, Result};

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("depfix/", env!("CARGO_PKG_VERSION"));

/// Base URLs of the per-ecosystem registries.
///
/// `Default` points at the production registries; tests override individual
/// fields to target a local mock server.
#[derive(Debug, Clone)]
pub struct RegistryEndpoints {
    pub pypi: String,
    pub crates_io: String,
    pub nuget: String,
    pub npm: String,
}

impl Default for RegistryEndpoints {
    fn default() -> Self {
        Self {
            pypi: "https://pypi.org".to_string(),
            crates_io: "https://crates.io".to_string(),
            nuget: "https://api.nuget.org".to_string(),
            npm: "https://registry.npmjs.org".to_string(),
        }
    }
}

/// Shared HTTPS client for registry probes.
#[derive(Clone)]
pub struct RegistryProbe {
    client: reqwest::Client,
}

impl RegistryProbe {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(PROBE_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Returns `true` iff the registry definitively reports the resource as
    /// missing (HTTP 404).
    pub async fn is_missing(&self, url: &str) -> bool {
        match self.status(url).await {
            Ok(status) if status == reqwest::StatusCode::NOT_FOUND => true,
            Ok(status) if status.is_success() => false,
            Ok(status) => {
                tracing::warn!(url, %status, "registry probe inconclusive, counting as real");
                false
            }
            Err(err) => {
                tracing::warn!(url, %err, "registry probe failed, counting as real");
                false
            }
        }
    }

    async fn status(&self, url: &str) -> Result<reqwest::StatusCode> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| CoreError::Registry {
                package: url.to_string(),
                source,
            })?;
        Ok(response.status())
    }
}

impl Default for RegistryProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints() {
        let endpoints = RegistryEndpoints::default();
        assert_eq!(endpoints.pypi, "https://pypi.org");
        assert_eq!(endpoints.npm, "https://registry.npmjs.org");
    }

    #[tokio::test]
    async fn test_missing_on_404() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/pypi/not-a-real-pkg-xyz-123/json")
            .with_status(404)
            .create_async()
            .await;

        let probe = RegistryProbe::new();
        let url = format!("{}/pypi/not-a-real-pkg-xyz-123/json", server.url());
        assert!(probe.is_missing(&url).await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_present_on_200() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pypi/requests/json")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let probe = RegistryProbe::new();
        let url = format!("{}/pypi/requests/json", server.url());
        assert!(!probe.is_missing(&url).await);
    }

    #[tokio::test]
    async fn test_server_error_is_conservative() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pypi/requests/json")
            .with_status(503)
            .create_async()
            .await;

        let probe = RegistryProbe::new();
        let url = format!("{}/pypi/requests/json", server.url());
        assert!(!probe.is_missing(&url).await);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_conservative() {
        let probe = RegistryProbe::new();
        // Nothing listens on this port.
        assert!(!probe.is_missing("http://127.0.0.1:1/pypi/requests/json").await);
    }
}
