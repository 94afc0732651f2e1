use thiserror::Error;

/// Core error types shared by every build-file implementation.
///
/// Ecosystem crates define their own error enums for format-specific
/// failures and convert them into [`CoreError::Parse`] at the trait
/// boundary, so the harness only ever matches on one error kind per file.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A manifest is structurally invalid.
    ///
    /// A *missing* dependency section is never a parse error; parsers
    /// return an empty list for that file instead.
    #[error("failed to parse {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("unsupported build file: {0}")]
    UnsupportedBuildFile(String),

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("registry request failed for {package}: {source}")]
    Registry {
        package: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Wrap a format-specific error as a parse failure for `file`.
    pub fn parse(
        file: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Parse {
            file: file.into(),
            source: Box::new(source),
        }
    }
}

/// Convenience alias used throughout the depfix crates.
pub type Result<T> = std::result::Result<T, CoreError>;
