//! The build-file contract every ecosystem implements.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::dep::Dependency;
use crate::error::Result;

/// Parsed dependencies keyed by repo-relative build-file path.
///
/// The key set of a successful parse equals the instance's `build_files`
/// list exactly; a file without a dependency section maps to an empty list.
pub type DependencyMap = BTreeMap<String, Vec<Dependency>>;

/// A canonical manifest snippet used when constructing generation prompts.
#[derive(Debug, Clone, Copy)]
pub struct Example {
    pub file: &'static str,
    pub content: &'static str,
}

/// Capability interface over one (ecosystem, repo, build-file list) triple.
///
/// Implementations are constructed with the project root, the ordered
/// build-file list and the registry endpoints, so no operation needs hidden
/// call-time context. One instance covers all of the repo's listed
/// manifests.
#[async_trait]
pub trait BuildFile: Send + Sync {
    /// Reads and parses every listed build file.
    ///
    /// A missing dependency section yields `[]` for that file and is never
    /// an error; only structurally invalid syntax fails, with
    /// [`CoreError::Parse`](crate::CoreError::Parse) naming the file.
    fn parse_dependencies(&self) -> Result<DependencyMap>;

    /// Re-emits each manifest with the given set substituted into its
    /// dependency section.
    ///
    /// Unrelated sections are preserved byte-for-byte where the underlying
    /// format permits; where dependency order carries no meaning, entries
    /// are sorted by canonical name for deterministic output.
    fn dumps_dependencies(&self, deps: &DependencyMap) -> Result<BTreeMap<String, String>>;

    /// Probes whether `dep` names a package the public registry does not
    /// know (HTTP 404), or, for on-disk project references, a path that
    /// does not resolve relative to `build_file`'s directory.
    ///
    /// Registry outages and non-404 errors are conservative: the dependency
    /// counts as *not* fake and a warning is logged.
    async fn is_fake_lib(&self, build_file: &str, dep: &Dependency) -> bool;

    /// A canonical snippet of this ecosystem's manifest format.
    fn example(&self) -> Example;
}
