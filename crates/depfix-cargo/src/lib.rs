//! Cargo.toml build-file support for depfix.

pub mod error;
pub mod parser;
pub mod registry;

pub use error::{CargoManifestError, Result};
pub use parser::{parse_manifest, render_manifest};

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use depfix_core::{
    BuildFile, CoreError, Dependency, DependencyMap, Example, RegistryEndpoints, RegistryProbe,
};

/// [`BuildFile`] implementation over a repo's listed `Cargo.toml` files.
pub struct CargoBuildFile {
    root: PathBuf,
    build_files: Vec<String>,
    probe: RegistryProbe,
    endpoints: RegistryEndpoints,
}

impl CargoBuildFile {
    pub fn new(root: PathBuf, build_files: Vec<String>, endpoints: RegistryEndpoints) -> Self {
        Self {
            root,
            build_files,
            probe: RegistryProbe::new(),
            endpoints,
        }
    }
}

#[async_trait]
impl BuildFile for CargoBuildFile {
    fn parse_dependencies(&self) -> depfix_core::Result<DependencyMap> {
        let mut map = DependencyMap::new();
        for file in &self.build_files {
            let content = std::fs::read_to_string(self.root.join(file))?;
            let deps = parser::parse_manifest(&content)
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
            let rendered = parser::render_manifest(&content, file_deps)
                .map_err(|e| CoreError::parse(file.clone(), e))?;
            out.insert(file.clone(), rendered);
        }
        Ok(out)
    }

    async fn is_fake_lib(&self, _build_file: &str, dep: &Dependency) -> bool {
        registry::is_fake_crate(&self.probe, &self.endpoints.crates_io, dep.name()).await
    }

    fn example(&self) -> Example {
        Example {
            file: "Cargo.toml",
            content: r#"[package]
name = "rust_example"
version = "0.1.0"
edition = "2021"

[dependencies]
serde = { version = "1.0", features = ["derive"] }
serde_json = "1.0"
"#,
        }
    }
}
