//! .csproj build-file support for depfix.

pub mod error;
pub mod parser;
pub mod registry;

pub use error::{NugetManifestError, Result};
pub use parser::{parse_manifest, render_manifest};

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use depfix_core::{
    BuildFile, CoreError, Dependency, DependencyMap, Example, RegistryEndpoints, RegistryProbe,
};

/// [`BuildFile`] implementation over a repo's listed `.csproj` files.
///
/// The project root is carried here so project-reference probes can resolve
/// relative paths without call-time context.
pub struct NugetBuildFile {
    root: PathBuf,
    build_files: Vec<String>,
    probe: RegistryProbe,
    endpoints: RegistryEndpoints,
}

impl NugetBuildFile {
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
impl BuildFile for NugetBuildFile {
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

    async fn is_fake_lib(&self, build_file: &str, dep: &Dependency) -> bool {
        let Dependency::Nuget(nuget) = dep else {
            return false;
        };
        if nuget.external {
            registry::is_fake_package(&self.probe, &self.endpoints.nuget, &nuget.name).await
        } else {
            registry::is_dangling_project_ref(&self.root, build_file, &nuget.name)
        }
    }

    fn example(&self) -> Example {
        Example {
            file: "src/src.csproj",
            content: r#"<?xml version="1.0" encoding="utf-8"?>
<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <OutputType>Exe</OutputType>
    <TargetFramework>net8.0</TargetFramework>
  </PropertyGroup>
  <ItemGroup>
    <PackageReference Include="Microsoft.Extensions.Logging" Version="8.0.0" />
    <PackageReference Include="Newtonsoft.Json" Version="13.0.3" />
  </ItemGroup>
  <ItemGroup>
    <ProjectReference Include="../lib/lib.csproj" />
  </ItemGroup>
</Project>
"#,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depfix_core::NugetDependency;

    #[tokio::test]
    async fn test_project_reference_probe_uses_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join("lib")).unwrap();
        std::fs::write(
            dir.path().join("src/app.csproj"),
            "<Project Sdk=\"Microsoft.NET.Sdk\">\n</Project>\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("lib/lib.csproj"), "<Project/>").unwrap();

        let bf = NugetBuildFile::new(
            dir.path().to_path_buf(),
            vec!["src/app.csproj".into()],
            RegistryEndpoints::default(),
        );

        let present = Dependency::Nuget(NugetDependency::project("../lib/lib.csproj"));
        let missing = Dependency::Nuget(NugetDependency::project("../lib/nope.csproj"));
        assert!(!bf.is_fake_lib("src/app.csproj", &present).await);
        assert!(bf.is_fake_lib("src/app.csproj", &missing).await);
    }

    #[test]
    fn test_keys_equal_build_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("app.csproj"),
            "<Project Sdk=\"Microsoft.NET.Sdk\">\n</Project>\n",
        )
        .unwrap();

        let bf = NugetBuildFile::new(
            dir.path().to_path_buf(),
            vec!["app.csproj".into()],
            RegistryEndpoints::default(),
        );
        let deps = bf.parse_dependencies().unwrap();
        assert_eq!(deps.keys().collect::<Vec<_>>(), vec!["app.csproj"]);
        assert!(deps["app.csproj"].is_empty());
    }
}
