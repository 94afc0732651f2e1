//! Cargo.toml dependency extraction and re-emission.
//!
//! Only the top-level `[dependencies]` table participates in the benchmark:
//! masked instances never touch dev- or build-dependencies. Parsing keeps
//! table payloads verbatim so nothing is lost between parse and re-emit;
//! `toml_edit` preserves every unrelated section byte-for-byte.

use crate::error::{CargoManifestError, Result};
use depfix_core::{CargoDependency, Dependency, canonical_name};
use toml_edit::{DocumentMut, Item, Value};

/// Extracts the `[dependencies]` entries from manifest content.
///
/// Scalar entries (`serde = "1.0"`) become `{ version = "1.0" }` payloads;
/// table entries are taken verbatim. A manifest without a `[dependencies]`
/// table parses as the empty list.
///
/// # Errors
///
/// Returns an error only on invalid TOML syntax.
pub fn parse_manifest(content: &str) -> Result<Vec<Dependency>> {
    let doc: DocumentMut = content
        .parse()
        .map_err(|source| CargoManifestError::Toml { source })?;

    let Some(deps_table) = doc.get("dependencies").and_then(Item::as_table_like) else {
        return Ok(Vec::new());
    };

    let mut deps = Vec::new();
    for (name, item) in deps_table.iter() {
        let dep = match item {
            Item::Value(Value::String(s)) => CargoDependency::versioned(name, s.value()),
            Item::Value(Value::InlineTable(t)) => CargoDependency::from_table(name, t.clone()),
            Item::Table(t) => CargoDependency::from_table(name, t.clone().into_inline_table()),
            other => {
                tracing::warn!(name, kind = other.type_name(), "skipping dependency entry");
                continue;
            }
        };
        deps.push(Dependency::Cargo(dep));
    }

    Ok(deps)
}

/// Re-emits the manifest with its entire `[dependencies]` table replaced.
///
/// Entries are sorted by canonical name; payloads that carry only a
/// `version` key collapse back to scalar form.
pub fn render_manifest(content: &str, deps: &[Dependency]) -> Result<String> {
    let mut doc: DocumentMut = content
        .parse()
        .map_err(|source| CargoManifestError::Toml { source })?;

    let mut sorted: Vec<&CargoDependency> = deps
        .iter()
        .filter_map(|d| match d {
            Dependency::Cargo(c) => Some(c),
            _ => None,
        })
        .collect();
    sorted.sort_by_key(|d| canonical_name(&d.name));

    let mut table = toml_edit::Table::new();
    table.set_implicit(false);
    for dep in sorted {
        table.insert(&dep.name, dependency_item(dep));
    }
    doc.insert("dependencies", Item::Table(table));

    Ok(doc.to_string())
}

fn dependency_item(dep: &CargoDependency) -> Item {
    let only_version = dep.table.len() == 1 && dep.table.contains_key("version");
    if only_version
        && let Some(version) = dep.version()
    {
        return Item::Value(Value::from(version));
    }
    let mut table = dep.table.clone();
    table.fmt();
    Item::Value(Value::InlineTable(table))
}
