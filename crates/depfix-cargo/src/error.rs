use thiserror::Error;

/// Errors specific to Cargo.toml handling.
#[derive(Error, Debug)]
pub enum CargoManifestError {
    /// Failed to parse Cargo.toml
    #[error("failed to parse Cargo.toml: {source}")]
    Toml {
        #[source]
        source: toml_edit::TomlError,
    },
}

/// Result type alias for Cargo manifest operations.
pub type Result<T> = std::result::Result<T, CargoManifestError>;
