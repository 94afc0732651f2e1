//! Python build-file support for depfix.
//!
//! Python repositories declare dependencies in any of four places, so this
//! crate is a family of flavours behind one [`BuildFile`] implementation:
//!
//! | flavour    | file                        | section                          |
//! |------------|-----------------------------|----------------------------------|
//! | pip        | `requirements*.txt`, `*.pip`| one requirement per line         |
//! | setup.cfg  | `setup.cfg`                 | `[options] install_requires`     |
//! | setup.py   | `setup.py`                  | `setup(install_requires=…)`      |
//! | pyproject  | `pyproject.toml`            | Poetry or PEP 621 `dependencies` |

pub mod error;
pub mod pyproject;
pub mod registry;
pub mod requirement;
pub mod requirements_txt;
pub mod setup_cfg;
pub mod setup_py;

pub use error::{PypiError, Result};
pub use pyproject::{PyprojectFlavor, poetry_to_specifier};
pub use requirement::parse_requirement;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use depfix_core::{
    BuildFile, CoreError, Dependency, DependencyMap, Example, RegistryEndpoints, RegistryProbe,
};

/// How one Python build file is to be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Pip,
    SetupCfg,
    SetupPy,
    Poetry,
    Pep621,
}

fn flavor_for(root: &Path, file: &str) -> Result<Flavor> {
    let name = Path::new(file)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file);
    if name.ends_with(".txt") || name.ends_with(".pip") {
        return Ok(Flavor::Pip);
    }
    if name == "setup.cfg" {
        return Ok(Flavor::SetupCfg);
    }
    if name == "pyproject.toml" {
        let content = std::fs::read_to_string(root.join(file))
            .map_err(|e| PypiError::UnsupportedPyproject(format!("{file}: {e}")))?;
        return Ok(match pyproject::detect_flavor(&content, file)? {
            PyprojectFlavor::Poetry => Flavor::Poetry,
            PyprojectFlavor::Pep621 => Flavor::Pep621,
        });
    }
    if name.ends_with(".py") {
        return Ok(Flavor::SetupPy);
    }
    Err(PypiError::UnsupportedBuildFile(file.to_string()))
}

/// [`BuildFile`] implementation over a repo's listed Python manifests.
///
/// The flavour of each file is fixed at construction; a repository mixing,
/// say, a requirements file and a setup.py gets both handled.
pub struct PypiBuildFile {
    root: PathBuf,
    build_files: Vec<String>,
    flavors: BTreeMap<String, Flavor>,
    probe: RegistryProbe,
    endpoints: RegistryEndpoints,
}

impl PypiBuildFile {
    /// # Errors
    ///
    /// Fails when a listed file maps to no known Python flavour, or when a
    /// pyproject.toml cannot be sniffed.
    pub fn new(
        root: PathBuf,
        build_files: Vec<String>,
        endpoints: RegistryEndpoints,
    ) -> Result<Self> {
        let mut flavors = BTreeMap::new();
        for file in &build_files {
            flavors.insert(file.clone(), flavor_for(&root, file)?);
        }
        Ok(Self {
            root,
            build_files,
            flavors,
            probe: RegistryProbe::new(),
            endpoints,
        })
    }

    fn parse_file(&self, file: &str, content: &str) -> Result<Vec<Dependency>> {
        match self.flavors[file] {
            Flavor::Pip => Ok(requirements_txt::parse_manifest(content)),
            Flavor::SetupCfg => Ok(setup_cfg::parse_manifest(content)),
            Flavor::SetupPy => setup_py::parse_manifest(content),
            Flavor::Poetry => pyproject::parse_poetry(content),
            Flavor::Pep621 => pyproject::parse_pep621(content),
        }
    }

    fn render_file(&self, file: &str, content: &str, deps: &[Dependency]) -> Result<String> {
        match self.flavors[file] {
            Flavor::Pip => Ok(requirements_txt::render_manifest(deps)),
            Flavor::SetupCfg => Ok(setup_cfg::render_manifest(content, deps)),
            Flavor::SetupPy => setup_py::render_manifest(content, deps),
            Flavor::Poetry => pyproject::render_poetry(content, deps),
            Flavor::Pep621 => pyproject::render_pep621(content, deps),
        }
    }
}

#[async_trait]
impl BuildFile for PypiBuildFile {
    fn parse_dependencies(&self) -> depfix_core::Result<DependencyMap> {
        let mut map = DependencyMap::new();
        for file in &self.build_files {
            let content = std::fs::read_to_string(self.root.join(file))?;
            let deps = self
                .parse_file(file, &content)
                .map_err(|e| CoreError::parse(file.clone(), e))?;
            map.insert(file.clone(), deps);
        }
        Ok(map)
    }

    fn dumps_dependencies(
        &self,
        deps: &DependencyMap,
    ) -> depfix_core::Result<BTreeMap<String, String>> {
        let mut out = BTreeMap::new();
        for (file, file_deps) in deps {
            let content = std::fs::read_to_string(self.root.join(file))?;
            let rendered = self
                .render_file(file, &content, file_deps)
                .map_err(|e| CoreError::parse(file.clone(), e))?;
            out.insert(file.clone(), rendered);
        }
        Ok(out)
    }

    async fn is_fake_lib(&self, _build_file: &str, dep: &Dependency) -> bool {
        let Dependency::Pypi(pypi) = dep else {
            return false;
        };
        registry::is_fake_requirement(&self.probe, &self.endpoints.pypi, pypi).await
    }

    fn example(&self) -> Example {
        let flavor = self
            .build_files
            .first()
            .and_then(|f| self.flavors.get(f))
            .copied()
            .unwrap_or(Flavor::Pip);
        match flavor {
            Flavor::Pip => Example {
                file: "requirements/base.txt",
                content: "requests\nnumpy\n",
            },
            Flavor::SetupCfg => Example {
                file: "setup.cfg",
                content: r"[metadata]
name = example
version = 0.1.0

[options]
zip_safe = False
packages = find:
python_requires = >=3.9
install_requires =
    numpy
    requests
",
            },
            Flavor::SetupPy => Example {
                file: "setup.py",
                content: r#"from setuptools import setup, find_packages

setup(
    name="example",
    version="0.1.0",
    install_requires=[
        "numpy",
        "requests",
    ],
    packages=find_packages(),
)
"#,
            },
            Flavor::Poetry => Example {
                file: "pyproject.toml",
                content: r#"[tool.poetry]
name = "example"
version = "0.1.0"

[tool.poetry.dependencies]
python = "^3.9"
requests = "*"
numpy = "*"
"#,
            },
            Flavor::Pep621 => Example {
                file: "pyproject.toml",
                content: r#"[project]
name = "example"
version = "0.1.0"
description = "example project"
dependencies = [
    "requests",
    "numpy",
]
"#,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, content).unwrap();
        }
        dir
    }

    #[test]
    fn test_flavor_dispatch() {
        let dir = stage(&[
            ("requirements.txt", "requests\n"),
            ("deps.pip", "numpy\n"),
            ("setup.cfg", "[metadata]\n"),
            ("setup.py", "setup()\n"),
            ("poetry/pyproject.toml", "[tool.poetry]\nname = \"x\"\n"),
            ("pep621/pyproject.toml", "[project]\nname = \"x\"\n"),
        ]);
        assert_eq!(flavor_for(dir.path(), "requirements.txt").unwrap(), Flavor::Pip);
        assert_eq!(flavor_for(dir.path(), "deps.pip").unwrap(), Flavor::Pip);
        assert_eq!(flavor_for(dir.path(), "setup.cfg").unwrap(), Flavor::SetupCfg);
        assert_eq!(flavor_for(dir.path(), "setup.py").unwrap(), Flavor::SetupPy);
        assert_eq!(
            flavor_for(dir.path(), "poetry/pyproject.toml").unwrap(),
            Flavor::Poetry
        );
        assert_eq!(
            flavor_for(dir.path(), "pep621/pyproject.toml").unwrap(),
            Flavor::Pep621
        );
        assert!(flavor_for(dir.path(), "build.gradle").is_err());
    }

    #[test]
    fn test_keys_equal_build_files() {
        let dir = stage(&[
            ("requirements.txt", "requests\nnumpy\n"),
            ("requirements-dev.txt", ""),
        ]);
        let bf = PypiBuildFile::new(
            dir.path().to_path_buf(),
            vec!["requirements.txt".into(), "requirements-dev.txt".into()],
            RegistryEndpoints::default(),
        )
        .unwrap();
        let deps = bf.parse_dependencies().unwrap();
        let keys: Vec<_> = deps.keys().cloned().collect();
        assert_eq!(keys, vec!["requirements-dev.txt", "requirements.txt"]);
        assert_eq!(deps["requirements.txt"].len(), 2);
        assert!(deps["requirements-dev.txt"].is_empty());
    }

    #[test]
    fn test_dump_then_parse_is_identity() {
        let dir = stage(&[(
            "pyproject.toml",
            "[project]\nname = \"x\"\ndependencies = [\"requests>=2.28\", \"numpy\"]\n",
        )]);
        let bf = PypiBuildFile::new(
            dir.path().to_path_buf(),
            vec!["pyproject.toml".into()],
            RegistryEndpoints::default(),
        )
        .unwrap();
        let parsed = bf.parse_dependencies().unwrap();
        let dumped = bf.dumps_dependencies(&parsed).unwrap();
        std::fs::write(dir.path().join("pyproject.toml"), &dumped["pyproject.toml"]).unwrap();
        let reparsed = bf.parse_dependencies().unwrap();

        let before: std::collections::HashSet<_> = parsed["pyproject.toml"].iter().collect();
        let after: std::collections::HashSet<_> = reparsed["pyproject.toml"].iter().collect();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_is_fake_lib_against_mock_registry() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/pypi/not-a-real-pkg-xyz-123/json")
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/pypi/requests/json")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let dir = stage(&[("requirements.txt", "")]);
        let bf = PypiBuildFile::new(
            dir.path().to_path_buf(),
            vec!["requirements.txt".into()],
            RegistryEndpoints {
                pypi: server.url(),
                ..RegistryEndpoints::default()
            },
        )
        .unwrap();

        let fake = Dependency::Pypi(depfix_core::PypiDependency::bare("not-a-real-pkg-xyz-123"));
        let real = Dependency::Pypi(depfix_core::PypiDependency::bare("requests"));
        assert!(bf.is_fake_lib("requirements.txt", &fake).await);
        assert!(!bf.is_fake_lib("requirements.txt", &real).await);
    }
}
