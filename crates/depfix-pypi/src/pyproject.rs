//! pyproject.toml flavours: Poetry and PEP 621.
//!
//! A `tool.poetry` table marks the Poetry flavour; otherwise a `project`
//! table marks PEP 621. Poetry version constraints are normalised to
//! PEP 440 specifier sets so both flavours produce comparable
//! requirements. The `python` interpreter constraint is never a
//! dependency, but it is preserved on re-emission.

use std::str::FromStr;

use toml_edit::{Array, DocumentMut, Item, Value};

use crate::error::{PypiError, Result};
use crate::requirement::parse_requirement;
use depfix_core::{Dependency, PypiDependency, canonical_name};

/// Which pyproject dialect a document speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PyprojectFlavor {
    Poetry,
    Pep621,
}

/// Sniffs the dialect of pyproject content.
pub fn detect_flavor(content: &str, file: &str) -> Result<PyprojectFlavor> {
    let doc: DocumentMut = content.parse().map_err(|source| PypiError::Toml { source })?;
    let has_poetry = doc
        .get("tool")
        .and_then(Item::as_table_like)
        .is_some_and(|tool| tool.get("poetry").is_some());
    if has_poetry {
        return Ok(PyprojectFlavor::Poetry);
    }
    if doc.get("project").is_some() {
        return Ok(PyprojectFlavor::Pep621);
    }
    Err(PypiError::UnsupportedPyproject(file.to_string()))
}

/// Converts a Poetry version constraint to a PEP 440 specifier set.
///
/// Returns `None` for the wildcard constraint (`*` or empty), which means
/// "any version" and renders as a bare requirement.
pub fn poetry_to_specifier(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "*" {
        return None;
    }

    let parts: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .filter_map(convert_constraint_part)
        .collect();
    if parts.is_empty() {
        return None;
    }

    let joined = parts.join(", ");
    match pep440_rs::VersionSpecifiers::from_str(&joined) {
        Ok(specs) => Some(specs.to_string()),
        Err(err) => {
            tracing::warn!(constraint = raw, %err, "dropping unconvertible Poetry constraint");
            None
        }
    }
}

fn convert_constraint_part(part: &str) -> Option<String> {
    if let Some(version) = part.strip_prefix('^') {
        return caret_bounds(version.trim());
    }
    if let Some(version) = part.strip_prefix('~') {
        // `~=` is already a PEP 440 operator.
        if !version.starts_with('=') {
            return tilde_bounds(version.trim());
        }
    }
    if part.starts_with(['>', '<', '=', '!', '~']) {
        return Some(part.to_string());
    }
    if part.contains('*') {
        return Some(format!("=={part}"));
    }
    Some(format!("=={part}"))
}

fn numeric_components(version: &str) -> Option<Vec<u64>> {
    version
        .split('.')
        .map(|c| c.parse::<u64>().ok())
        .collect()
}

fn render_components(components: &[u64]) -> String {
    components
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// `^1.2.3` ⇒ `>=1.2.3, <2.0.0` (first non-zero component bumps).
fn caret_bounds(version: &str) -> Option<String> {
    let components = numeric_components(version)?;
    let pivot = components
        .iter()
        .position(|&c| c != 0)
        .unwrap_or(components.len() - 1);
    let mut upper = components[..=pivot].to_vec();
    upper[pivot] += 1;
    upper.resize(components.len(), 0);
    Some(format!(
        ">={version}, <{}",
        render_components(&upper)
    ))
}

/// `~1.2.3` ⇒ `>=1.2.3, <1.3.0`; `~1` ⇒ `>=1, <2`.
fn tilde_bounds(version: &str) -> Option<String> {
    let components = numeric_components(version)?;
    let pivot = 1.min(components.len() - 1);
    let mut upper = components[..=pivot].to_vec();
    upper[pivot] += 1;
    upper.resize(components.len(), 0);
    Some(format!(
        ">={version}, <{}",
        render_components(&upper)
    ))
}

/// Parses the `[tool.poetry.dependencies]` table.
pub fn parse_poetry(content: &str) -> Result<Vec<Dependency>> {
    let doc: DocumentMut = content.parse().map_err(|source| PypiError::Toml { source })?;
    let Some(deps_table) = doc
        .get("tool")
        .and_then(Item::as_table_like)
        .and_then(|tool| tool.get("poetry"))
        .and_then(Item::as_table_like)
        .and_then(|poetry| poetry.get("dependencies"))
        .and_then(Item::as_table_like)
    else {
        return Ok(Vec::new());
    };

    let mut deps = Vec::new();
    for (name, item) in deps_table.iter() {
        if name.eq_ignore_ascii_case("python") {
            continue;
        }
        let constraint = match item {
            Item::Value(Value::String(s)) => Some(s.value().to_string()),
            Item::Value(Value::Array(arr)) => arr
                .iter()
                .next()
                .and_then(Value::as_inline_table)
                .and_then(|t| t.get("version"))
                .and_then(Value::as_str)
                .map(ToString::to_string),
            other => other
                .as_table_like()
                .and_then(|t| t.get("version"))
                .and_then(Item::as_str)
                .map(ToString::to_string),
        };
        let specifier = constraint.as_deref().and_then(poetry_to_specifier);
        deps.push(Dependency::Pypi(PypiDependency {
            specifier,
            ..PypiDependency::bare(name)
        }));
    }
    Ok(deps)
}

/// Re-emits pyproject content with `[tool.poetry.dependencies]` replaced.
///
/// The existing `python` constraint survives; all other entries are
/// substituted, sorted by canonical name.
pub fn render_poetry(content: &str, deps: &[Dependency]) -> Result<String> {
    let mut doc: DocumentMut = content.parse().map_err(|source| PypiError::Toml { source })?;

    let python = doc
        .get("tool")
        .and_then(Item::as_table_like)
        .and_then(|tool| tool.get("poetry"))
        .and_then(Item::as_table_like)
        .and_then(|poetry| poetry.get("dependencies"))
        .and_then(Item::as_table_like)
        .and_then(|t| t.get("python"))
        .cloned();

    let mut sorted: Vec<&PypiDependency> = deps
        .iter()
        .filter_map(|d| match d {
            Dependency::Pypi(p) => Some(p),
            _ => None,
        })
        .collect();
    sorted.sort_by_key(|d| canonical_name(&d.name));

    let mut table = toml_edit::Table::new();
    table.set_implicit(false);
    if let Some(python) = python {
        table.insert("python", python);
    }
    for dep in sorted {
        let constraint = dep.specifier.clone().unwrap_or_else(|| "*".to_string());
        table.insert(&dep.name, Item::Value(Value::from(constraint)));
    }

    let poetry = doc
        .get_mut("tool")
        .and_then(Item::as_table_like_mut)
        .and_then(|tool| tool.get_mut("poetry"))
        .and_then(Item::as_table_like_mut)
        .ok_or_else(|| PypiError::UnsupportedPyproject("missing tool.poetry".to_string()))?;
    poetry.insert("dependencies", Item::Table(table));

    Ok(doc.to_string())
}

/// Parses the PEP 621 `[project] dependencies` array.
pub fn parse_pep621(content: &str) -> Result<Vec<Dependency>> {
    let doc: DocumentMut = content.parse().map_err(|source| PypiError::Toml { source })?;
    let Some(deps_array) = doc
        .get("project")
        .and_then(Item::as_table_like)
        .and_then(|project| project.get("dependencies"))
        .and_then(Item::as_value)
        .and_then(Value::as_array)
    else {
        return Ok(Vec::new());
    };

    let mut deps = Vec::new();
    for value in deps_array.iter() {
        if let Some(entry) = value.as_str() {
            deps.push(Dependency::Pypi(parse_requirement(entry)?));
        }
    }
    Ok(deps)
}

/// Re-emits pyproject content with `project.dependencies` replaced.
pub fn render_pep621(content: &str, deps: &[Dependency]) -> Result<String> {
    let mut doc: DocumentMut = content.parse().map_err(|source| PypiError::Toml { source })?;

    let mut sorted: Vec<&PypiDependency> = deps
        .iter()
        .filter_map(|d| match d {
            Dependency::Pypi(p) => Some(p),
            _ => None,
        })
        .collect();
    sorted.sort_by_key(|d| canonical_name(&d.name));

    let mut array = Array::new();
    for dep in &sorted {
        array.push_formatted(Value::from(dep.to_string()).decorated("\n    ", ""));
    }
    if !sorted.is_empty() {
        array.set_trailing("\n");
        array.set_trailing_comma(true);
    }

    let project = doc
        .get_mut("project")
        .and_then(Item::as_table_like_mut)
        .ok_or_else(|| PypiError::UnsupportedPyproject("missing project table".to_string()))?;
    project.insert("dependencies", Item::Value(Value::Array(array)));

    Ok(doc.to_string())
}
