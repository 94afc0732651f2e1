//! Dataset records.
//!
//! A [`RepoInstance`] is one row of the benchmark dataset: a masked
//! repository snapshot plus everything needed to evaluate a candidate patch
//! against it. Instances are deserialized once at dataset load and are
//! read-only afterwards.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The ecosystem a repository instance belongs to.
///
/// TypeScript and JavaScript are distinct dataset labels but share the npm
/// build-file implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Rust,
    Csharp,
    Typescript,
    Javascript,
    Java,
}

impl Language {
    /// Lowercase dataset label, also used for workspace directory names.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Rust => "rust",
            Self::Csharp => "csharp",
            Self::Typescript => "typescript",
            Self::Javascript => "javascript",
            Self::Java => "java",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Language {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "python" => Ok(Self::Python),
            "rust" => Ok(Self::Rust),
            "csharp" => Ok(Self::Csharp),
            "typescript" => Ok(Self::Typescript),
            "javascript" => Ok(Self::Javascript),
            "java" => Ok(Self::Java),
            other => Err(CoreError::UnsupportedLanguage(other.to_string())),
        }
    }
}

/// One benchmark instance: a masked repository plus its oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoInstance {
    /// Unique instance identifier.
    pub instance_id: String,
    pub language: Language,
    /// Opaque curator metadata (repo name, commit sha, stars, …).
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Shell command that runs the CI test job locally, including the
    /// workflow-file flag and `-j <job>` selector.
    pub act_command: String,
    /// Workflow file path within the repository.
    pub ci_file: String,
    /// The oracle unified diff restoring the masked dependency sections.
    pub patch: String,
    /// Repo-relative paths of the manifests whose dependency sections were
    /// masked. Parser output keys must equal this list exactly.
    pub build_files: Vec<String>,
    /// Environment requirements; `SDK` and `OS` are always present.
    pub env_specs: BTreeMap<String, String>,
}
