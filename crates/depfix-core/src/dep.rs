//! Canonical dependency model.
//!
//! Every ecosystem parser produces values of the tagged [`Dependency`] type.
//! The evaluation metrics are plain set operations over these values, so the
//! equality and hashing rules here *are* the metric definition:
//!
//! - the name-only metric compares [`canonical_name`]s across all ecosystems
//! - the exact metric compares the full ecosystem payload (see each variant)
//!
//! Hash implementations are kept consistent with equality; wherever equality
//! canonicalises the package name, the hash does too.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use toml_edit::{InlineTable, Value};

/// Canonicalises a package name for cross-ecosystem comparison:
/// case-folded, with `-` normalised to `_`.
///
/// # Examples
///
/// ```
/// assert_eq!(depfix_core::canonical_name("Foo-Bar"), "foo_bar");
/// ```
pub fn canonical_name(name: &str) -> String {
    name.to_lowercase().replace('-', "_")
}

/// A parsed dependency from any supported ecosystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dependency {
    Pypi(PypiDependency),
    Cargo(CargoDependency),
    Nuget(NugetDependency),
    Npm(NpmDependency),
    Maven(MavenDependency),
}

impl Dependency {
    /// The declared package name (for Maven, the `groupId:artifactId` key).
    pub fn name(&self) -> &str {
        match self {
            Self::Pypi(d) => &d.name,
            Self::Cargo(d) => &d.name,
            Self::Nuget(d) => &d.name,
            Self::Npm(d) => &d.name,
            Self::Maven(d) => &d.coordinate,
        }
    }

    /// The canonicalised name used by the name-only metric.
    pub fn canonical_name(&self) -> String {
        canonical_name(self.name())
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pypi(d) => write!(f, "{d}"),
            Self::Cargo(d) => write!(f, "{}", d.name),
            Self::Nuget(d) => write!(f, "{}", d.name),
            Self::Npm(d) => write!(f, "{}@{}", d.name, d.specifier),
            Self::Maven(d) => write!(f, "{}", d.coordinate),
        }
    }
}

/// A Python requirement in decomposed PEP 508 form.
///
/// Exact equality compares the full requirement after name
/// canonicalisation: extras (as a set), the normalised version specifier,
/// the direct URL and the environment marker all participate.
#[derive(Debug, Clone)]
pub struct PypiDependency {
    pub name: String,
    pub extras: BTreeSet<String>,
    /// Normalised PEP 440 specifier set, e.g. `>=2.28, <3`.
    pub specifier: Option<String>,
    /// Direct reference URL (`pkg @ https://…`), mutually exclusive with
    /// a version specifier.
    pub url: Option<String>,
    /// Raw environment marker text (the part after `;`), if any.
    pub marker: Option<String>,
}

impl PypiDependency {
    /// A bare requirement with neither specifier nor URL.
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extras: BTreeSet::new(),
            specifier: None,
            url: None,
            marker: None,
        }
    }

    /// A requirement constrained by a version specifier set.
    pub fn versioned(name: impl Into<String>, specifier: impl Into<String>) -> Self {
        Self {
            specifier: Some(specifier.into()),
            ..Self::bare(name)
        }
    }
}

impl fmt::Display for PypiDependency {
    /// Renders the requirement back to PEP 508 form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() {
            let extras: Vec<&str> = self.extras.iter().map(String::as_str).collect();
            write!(f, "[{}]", extras.join(","))?;
        }
        if let Some(url) = &self.url {
            write!(f, " @ {url}")?;
        } else if let Some(spec) = &self.specifier {
            write!(f, "{spec}")?;
        }
        if let Some(marker) = &self.marker {
            write!(f, "; {marker}")?;
        }
        Ok(())
    }
}

impl PartialEq for PypiDependency {
    fn eq(&self, other: &Self) -> bool {
        canonical_name(&self.name) == canonical_name(&other.name)
            && self.extras == other.extras
            && self.specifier == other.specifier
            && self.url == other.url
            && self.marker == other.marker
    }
}

impl Eq for PypiDependency {}

impl Hash for PypiDependency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        canonical_name(&self.name).hash(state);
        self.extras.hash(state);
        self.specifier.hash(state);
        self.url.hash(state);
        self.marker.hash(state);
    }
}

/// A `[dependencies]` entry from a Cargo.toml.
///
/// The manifest payload is kept verbatim as a TOML inline table so that
/// re-emission loses nothing. Equality reads only `version`, `features`
/// (set-valued) and `optional` from the table; every other key is carried
/// but ignored by the metric.
#[derive(Debug, Clone)]
pub struct CargoDependency {
    pub name: String,
    pub table: InlineTable,
}

impl CargoDependency {
    /// A dependency declared as a bare version string (`serde = "1.0"`).
    pub fn versioned(name: impl Into<String>, version: &str) -> Self {
        let mut table = InlineTable::new();
        table.insert("version", Value::from(version));
        Self {
            name: name.into(),
            table,
        }
    }

    /// A dependency declared as a table value, taken verbatim.
    pub fn from_table(name: impl Into<String>, table: InlineTable) -> Self {
        Self {
            name: name.into(),
            table,
        }
    }

    pub fn version(&self) -> Option<&str> {
        self.table.get("version").and_then(Value::as_str)
    }

    pub fn features(&self) -> BTreeSet<String> {
        self.table
            .get("features")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn optional(&self) -> Option<bool> {
        self.table.get("optional").and_then(Value::as_bool)
    }
}

impl PartialEq for CargoDependency {
    fn eq(&self, other: &Self) -> bool {
        canonical_name(&self.name) == canonical_name(&other.name)
            && self.version() == other.version()
            && self.features() == other.features()
            && self.optional() == other.optional()
    }
}

impl Eq for CargoDependency {}

impl Hash for CargoDependency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        canonical_name(&self.name).hash(state);
        self.version().hash(state);
        self.features().hash(state);
        self.optional().hash(state);
    }
}

/// A `.csproj` reference: a NuGet package (`external = true`) or an
/// on-disk project reference (`external = false`, version empty).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NugetDependency {
    pub name: String,
    pub version: String,
    pub external: bool,
}

impl NugetDependency {
    pub fn package(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            external: true,
        }
    }

    pub fn project(path: impl Into<String>) -> Self {
        Self {
            name: path.into(),
            version: String::new(),
            external: false,
        }
    }
}

/// A `package.json` dependency: name plus the raw specifier string
/// (version range, URL, `npm:…`, `file:…`, tag, …).
///
/// Exact equality compares the specifier literally; only the name is
/// canonicalised.
#[derive(Debug, Clone)]
pub struct NpmDependency {
    pub name: String,
    pub specifier: String,
}

impl NpmDependency {
    pub fn new(name: impl Into<String>, specifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            specifier: specifier.into(),
        }
    }
}

impl PartialEq for NpmDependency {
    fn eq(&self, other: &Self) -> bool {
        canonical_name(&self.name) == canonical_name(&other.name)
            && self.specifier == other.specifier
    }
}

impl Eq for NpmDependency {}

impl Hash for NpmDependency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        canonical_name(&self.name).hash(state);
        self.specifier.hash(state);
    }
}

/// A Maven coordinate, keyed by `groupId:artifactId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MavenDependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    /// Precomputed `groupId:artifactId` key used as the dependency name.
    pub coordinate: String,
}

impl MavenDependency {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: Option<String>,
    ) -> Self {
        let group_id = group_id.into();
        let artifact_id = artifact_id.into();
        let coordinate = format!("{group_id}:{artifact_id}");
        Self {
            group_id,
            artifact_id,
            version,
            coordinate,
        }
    }
}
