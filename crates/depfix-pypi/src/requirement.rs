//! PEP 508 requirement parsing shared by every Python flavour.

use std::str::FromStr;

use pep508_rs::{Requirement, VerbatimUrl, VersionOrUrl};

use crate::error::{PypiError, Result};
use depfix_core::PypiDependency;

/// Parses one PEP 508 requirement string into the canonical form.
///
/// The version specifier is normalised by `pep508_rs` (so both sides of a
/// comparison agree on spacing); the environment marker is kept as the raw
/// text after `;` because it participates in exact equality verbatim.
pub fn parse_requirement(input: &str) -> Result<PypiDependency> {
    let input = input.trim();
    let req =
        Requirement::<VerbatimUrl>::from_str(input).map_err(|e| PypiError::requirement(input, e))?;

    let (specifier, url) = match req.version_or_url {
        Some(VersionOrUrl::VersionSpecifier(specs)) => {
            let rendered = specs.to_string();
            if rendered.is_empty() {
                (None, None)
            } else {
                (Some(rendered), None)
            }
        }
        Some(VersionOrUrl::Url(u)) => (None, Some(u.to_string())),
        None => (None, None),
    };

    let marker = input
        .split_once(';')
        .map(|(_, m)| m.trim().to_string())
        .filter(|m| !m.is_empty());

    Ok(PypiDependency {
        name: req.name.to_string(),
        extras: req.extras.iter().map(ToString::to_string).collect(),
        specifier,
        url,
        marker,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare() {
        let dep = parse_requirement("requests").unwrap();
        assert_eq!(dep.name, "requests");
        assert_eq!(dep.specifier, None);
        assert!(dep.extras.is_empty());
    }

    #[test]
    fn test_parse_versioned_with_extras() {
        let dep = parse_requirement("requests[security,socks]>=2.28.0,<3.0").unwrap();
        assert_eq!(dep.name, "requests");
        assert!(dep.extras.contains("security"));
        assert!(dep.extras.contains("socks"));
        let spec = dep.specifier.unwrap();
        assert!(spec.contains(">=2.28.0"));
        assert!(spec.contains("<3.0"));
    }

    #[test]
    fn test_parse_with_marker() {
        let dep = parse_requirement("pywin32>=1.0; sys_platform == 'win32'").unwrap();
        assert_eq!(dep.name, "pywin32");
        assert_eq!(dep.marker.as_deref(), Some("sys_platform == 'win32'"));
    }

    #[test]
    fn test_parse_direct_url() {
        let dep =
            parse_requirement("mylib @ git+https://github.com/user/mylib.git@main").unwrap();
        assert_eq!(dep.name, "mylib");
        assert!(dep.url.is_some());
        assert_eq!(dep.specifier, None);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_requirement(">>>nonsense<<<").is_err());
    }

    #[test]
    fn test_normalisation_makes_both_sides_agree() {
        let a = parse_requirement("maturin>=1.7,<2.0").unwrap();
        let b = parse_requirement("maturin>=1.7, <2.0").unwrap();
        assert_eq!(a, b);
    }
}
