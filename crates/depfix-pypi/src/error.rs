use thiserror::Error;

/// Errors specific to Python build-file handling.
#[derive(Error, Debug)]
pub enum PypiError {
    /// A PEP 508 requirement string did not parse.
    #[error("invalid requirement '{input}': {message}")]
    Requirement { input: String, message: String },

    /// pyproject.toml / setup.cfg TOML-level failure.
    #[error("failed to parse pyproject.toml: {source}")]
    Toml {
        #[source]
        source: toml_edit::TomlError,
    },

    /// setup.py could not be parsed into a syntax tree.
    #[error("failed to parse setup.py: {0}")]
    Python(String),

    /// pyproject.toml has neither a `tool.poetry` nor a `project` table.
    #[error("unsupported pyproject.toml layout in {0}")]
    UnsupportedPyproject(String),

    /// The build-file name maps to no known Python flavour.
    #[error("unsupported Python build file: {0}")]
    UnsupportedBuildFile(String),
}

impl PypiError {
    pub fn requirement(input: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Requirement {
            input: input.into(),
            message: message.to_string(),
        }
    }
}

/// Result type alias for Python build-file operations.
pub type Result<T> = std::result::Result<T, PypiError>;
