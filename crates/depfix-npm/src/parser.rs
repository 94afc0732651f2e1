//! package.json dependency extraction and re-emission.
//!
//! Only the top-level `dependencies` object participates in the benchmark.
//! Specifiers are kept as raw strings: version ranges, URLs, `npm:…`
//! aliases, `file:…` paths and dist-tags all compare literally under the
//! exact metric. Document key order is preserved on re-emission
//! (`serde_json` with `preserve_order`).

use crate::error::{NpmManifestError, Result};
use depfix_core::{Dependency, NpmDependency, canonical_name};
use serde_json::Value;

/// Extracts the `dependencies` object from package.json content.
///
/// A manifest without a `dependencies` object parses as the empty list.
///
/// # Errors
///
/// Returns an error on invalid JSON or a non-object document root.
pub fn parse_manifest(content: &str) -> Result<Vec<Dependency>> {
    let doc: Value =
        serde_json::from_str(content).map_err(|source| NpmManifestError::Json { source })?;
    if !doc.is_object() {
        return Err(NpmManifestError::NotAnObject);
    }

    let Some(deps_obj) = doc.get("dependencies").and_then(Value::as_object) else {
        return Ok(Vec::new());
    };

    let mut deps = Vec::new();
    for (name, specifier) in deps_obj {
        match specifier.as_str() {
            Some(spec) => deps.push(Dependency::Npm(NpmDependency::new(name, spec))),
            None => tracing::warn!(%name, "skipping non-string dependency specifier"),
        }
    }
    Ok(deps)
}

/// Re-emits package.json with its `dependencies` object replaced.
///
/// The replacement object is sorted by canonical name; every other key of
/// the document keeps its original insertion order. Output uses two-space
/// indentation and a trailing newline, matching npm's own formatting.
pub fn render_manifest(content: &str, deps: &[Dependency]) -> Result<String> {
    let mut doc: Value =
        serde_json::from_str(content).map_err(|source| NpmManifestError::Json { source })?;
    let Some(obj) = doc.as_object_mut() else {
        return Err(NpmManifestError::NotAnObject);
    };

    let mut sorted: Vec<&NpmDependency> = deps
        .iter()
        .filter_map(|d| match d {
            Dependency::Npm(n) => Some(n),
            _ => None,
        })
        .collect();
    sorted.sort_by_key(|d| canonical_name(&d.name));

    let mut deps_obj = serde_json::Map::new();
    for dep in sorted {
        deps_obj.insert(dep.name.clone(), Value::String(dep.specifier.clone()));
    }
    obj.insert("dependencies".to_string(), Value::Object(deps_obj));

    let mut rendered =
        serde_json::to_string_pretty(&doc).map_err(|source| NpmManifestError::Json { source })?;
    rendered.push('\n');
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
  "name": "web-example",
  "version": "0.0.1",
  "scripts": {
    "build": "tsc && vite build"
  },
  "dependencies": {
    "react": "^18.2.0",
    "react-dom": "^18.2.0",
    "zustand": "^4.5.2"
  },
  "devDependencies": {
    "typescript": "^5.3.2"
  }
}
"#;

    #[test]
    fn test_parse_dependencies_only() {
        let deps = parse_manifest(MANIFEST).unwrap();
        assert_eq!(deps.len(), 3);
        let names: Vec<_> = deps.iter().map(Dependency::name).collect();
        assert_eq!(names, vec!["react", "react-dom", "zustand"]);
    }

    #[test]
    fn test_parse_exotic_specifiers() {
        let manifest = r#"{
  "dependencies": {
    "asd": "http://asdf.com/asdf.tar.gz",
    "dyl": "file:../dyl",
    "kpg": "npm:pkg@1.0.0",
    "lat": "latest"
  }
}"#;
        let deps = parse_manifest(manifest).unwrap();
        assert_eq!(deps.len(), 4);
        let Dependency::Npm(dyl) = deps.iter().find(|d| d.name() == "dyl").unwrap() else {
            unreachable!()
        };
        assert_eq!(dyl.specifier, "file:../dyl");
    }

    #[test]
    fn test_missing_dependencies_parses_empty() {
        let deps = parse_manifest(r#"{"name": "bare"}"#).unwrap();
        assert!(deps.is_empty());
    }

    #[test]
    fn test_invalid_json_errors() {
        assert!(parse_manifest("{not json").is_err());
        assert!(parse_manifest("[]").is_err());
    }

    #[test]
    fn test_render_preserves_key_order() {
        let deps = vec![Dependency::Npm(NpmDependency::new("vue", "^3.4.0"))];
        let rendered = render_manifest(MANIFEST, &deps).unwrap();

        let name_pos = rendered.find("\"name\"").unwrap();
        let scripts_pos = rendered.find("\"scripts\"").unwrap();
        let deps_pos = rendered.find("\"dependencies\"").unwrap();
        let dev_pos = rendered.find("\"devDependencies\"").unwrap();
        assert!(name_pos < scripts_pos && scripts_pos < deps_pos && deps_pos < dev_pos);

        assert!(rendered.contains("\"vue\": \"^3.4.0\""));
        assert!(!rendered.contains("\"react\""));
    }

    #[test]
    fn test_render_sorts_by_canonical_name() {
        let deps = vec![
            Dependency::Npm(NpmDependency::new("zustand", "^4.5.2")),
            Dependency::Npm(NpmDependency::new("React-DOM", "^18.2.0")),
            Dependency::Npm(NpmDependency::new("axios", "^1.6.0")),
        ];
        let rendered = render_manifest(r#"{"name": "x"}"#, &deps).unwrap();
        let axios = rendered.find("axios").unwrap();
        let react = rendered.find("React-DOM").unwrap();
        let zustand = rendered.find("zustand").unwrap();
        assert!(axios < react && react < zustand);
    }

    #[test]
    fn test_render_parse_roundtrip() {
        let deps = parse_manifest(MANIFEST).unwrap();
        let rendered = render_manifest(MANIFEST, &deps).unwrap();
        let reparsed = parse_manifest(&rendered).unwrap();

        let before: std::collections::HashSet<_> = deps.iter().collect();
        let after: std::collections::HashSet<_> = reparsed.iter().collect();
        assert_eq!(before, after);
    }
}
