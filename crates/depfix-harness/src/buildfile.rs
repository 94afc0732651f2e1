//! Ecosystem dispatch.
//!
//! Replaces string-keyed parser lookup with a factory over the tagged
//! [`Language`]: each branch constructs the ecosystem's [`BuildFile`]
//! implementation with all of its context (project root, build-file list,
//! registry endpoints) fixed up front.

use std::path::Path;

use depfix_core::{BuildFile, CoreError, Language, RegistryEndpoints, Result};

/// Builds the [`BuildFile`] implementation for one repository.
pub fn make_build_file(
    language: Language,
    root: &Path,
    build_files: &[String],
    endpoints: RegistryEndpoints,
) -> Result<Box<dyn BuildFile>> {
    let root = root.to_path_buf();
    let build_files = build_files.to_vec();
    match language {
        Language::Python => {
            let bf = depfix_pypi::PypiBuildFile::new(root, build_files, endpoints)
                .map_err(|e| CoreError::parse("python build files", e))?;
            Ok(Box::new(bf))
        }
        Language::Rust => Ok(Box::new(depfix_cargo::CargoBuildFile::new(
            root,
            build_files,
            endpoints,
        ))),
        Language::Csharp => Ok(Box::new(depfix_nuget::NugetBuildFile::new(
            root,
            build_files,
            endpoints,
        ))),
        Language::Typescript | Language::Javascript => Ok(Box::new(
            depfix_npm::NpmBuildFile::new(root, build_files, endpoints),
        )),
        Language::Java => Ok(Box::new(depfix_maven::MavenBuildFile::new(
            root,
            build_files,
        ))),
    }
}
