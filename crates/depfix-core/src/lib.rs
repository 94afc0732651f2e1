//! Core abstractions for depfix.
//!
//! This crate provides the foundational types and traits used across all
//! ecosystem-specific build-file implementations (Cargo, npm, PyPI, NuGet,
//! Maven) and by the evaluation harness.
//!
//! # Architecture
//!
//! depfix-core defines:
//! - **Dependency model**: the tagged [`Dependency`] variant with the
//!   equality and hashing rules each ecosystem's metric comparison relies on
//! - **Build-file contract**: the [`BuildFile`] trait implemented once per
//!   ecosystem (parse, re-emit, registry probe, prompt example)
//! - **Registry probe**: a shared HTTPS client that asks public registries
//!   whether a predicted package actually exists
//! - **Dataset model**: the immutable [`RepoInstance`] record
//! - **Provider interfaces**: abstract LLM/tokenizer traits the harness
//!   never constructs itself

pub mod buildfile;
pub mod dep;
pub mod error;
pub mod instance;
pub mod probe;
pub mod provider;

// Re-export commonly used types
pub use buildfile::{BuildFile, DependencyMap, Example};
pub use dep::{
    CargoDependency, Dependency, MavenDependency, NpmDependency, NugetDependency,
    PypiDependency, canonical_name,
};
pub use error::{CoreError, Result};
pub use instance::{Language, RepoInstance};
pub use probe::{RegistryEndpoints, RegistryProbe};
pub use provider::{LlmProvider, Message, Tokenizer};
