use thiserror::Error;

/// Errors specific to .csproj handling.
#[derive(Error, Debug)]
pub enum NugetManifestError {
    #[error("failed to parse .csproj XML: {source}")]
    Xml {
        #[source]
        source: quick_xml::Error,
    },

    #[error("invalid attribute in .csproj: {source}")]
    Attr {
        #[source]
        source: quick_xml::events::attributes::AttrError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for NugetManifestError {
    fn from(source: quick_xml::Error) -> Self {
        Self::Xml { source }
    }
}

impl From<quick_xml::events::attributes::AttrError> for NugetManifestError {
    fn from(source: quick_xml::events::attributes::AttrError) -> Self {
        Self::Attr { source }
    }
}

/// Result type alias for .csproj operations.
pub type Result<T> = std::result::Result<T, NugetManifestError>;
