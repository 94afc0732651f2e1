use thiserror::Error;

/// Errors specific to package.json handling.
#[derive(Error, Debug)]
pub enum NpmManifestError {
    #[error("failed to parse package.json: {source}")]
    Json {
        #[source]
        source: serde_json::Error,
    },

    #[error("package.json root is not an object")]
    NotAnObject,
}

/// Result type alias for package.json operations.
pub type Result<T> = std::result::Result<T, NpmManifestError>;
