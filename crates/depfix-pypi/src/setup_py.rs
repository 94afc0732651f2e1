//! setup.py flavour.
//!
//! The requirements are defined as a list of strings passed directly or
//! indirectly to the `install_requires` keyword of a `setup(…)` call. The
//! file is parsed with tree-sitter: a literal list is read in place, and an
//! identifier value is resolved against assignments in the same module,
//! following single-hop name→name chains.
//!
//! Re-emission splices a list literal over the keyword value's byte range,
//! so the rest of the file is preserved byte-for-byte.

use std::collections::HashMap;

use tree_sitter::{Node, Parser};

use crate::error::{PypiError, Result};
use crate::requirement::parse_requirement;
use depfix_core::Dependency;

fn parse_tree(content: &str) -> Result<tree_sitter::Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| PypiError::Python(e.to_string()))?;
    parser
        .parse(content, None)
        .ok_or_else(|| PypiError::Python("tree-sitter returned no tree".to_string()))
}

fn walk<'t>(node: Node<'t>, visit: &mut impl FnMut(Node<'t>)) {
    visit(node);
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk(child, visit);
    }
}

/// The value node of the `install_requires=` keyword of a `setup(…)` call.
fn install_requires_value<'t>(root: Node<'t>, src: &str) -> Option<Node<'t>> {
    let mut found = None;
    walk(root, &mut |node| {
        if found.is_some() || node.kind() != "call" {
            return;
        }
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let callee = function.utf8_text(src.as_bytes()).unwrap_or_default();
        if callee != "setup" && !callee.ends_with(".setup") {
            return;
        }
        let Some(args) = node.child_by_field_name("arguments") else {
            return;
        };
        let mut cursor = args.walk();
        for arg in args.named_children(&mut cursor) {
            if arg.kind() != "keyword_argument" {
                continue;
            }
            let name = arg
                .child_by_field_name("name")
                .and_then(|n| n.utf8_text(src.as_bytes()).ok());
            if name == Some("install_requires")
                && let Some(value) = arg.child_by_field_name("value")
            {
                found = Some(value);
                return;
            }
        }
    });
    found
}

/// All `name = value` assignments in the module, outermost first.
fn assignments<'t>(root: Node<'t>, src: &str) -> HashMap<String, Node<'t>> {
    let mut map = HashMap::new();
    walk(root, &mut |node| {
        if node.kind() != "assignment" {
            return;
        }
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        if left.kind() != "identifier" {
            return;
        }
        let Some(right) = node.child_by_field_name("right") else {
            return;
        };
        if let Ok(name) = left.utf8_text(src.as_bytes()) {
            map.entry(name.to_string()).or_insert(right);
        }
    });
    map
}

fn string_value(node: Node<'_>, src: &str) -> Option<String> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "string_content" {
            return child.utf8_text(src.as_bytes()).ok().map(ToString::to_string);
        }
    }
    None
}

fn list_entries(node: Node<'_>, src: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "string"
            && let Some(value) = string_value(child, src)
        {
            entries.push(value);
        }
    }
    entries
}

/// Resolves the keyword value to a list of requirement strings, chasing
/// name references through module assignments.
fn resolve_entries(value: Node<'_>, root: Node<'_>, src: &str) -> Vec<String> {
    let vars = assignments(root, src);
    let mut node = value;
    // Chained single-hop resolution; the bound guards against reference cycles.
    for _ in 0..8 {
        match node.kind() {
            "list" => return list_entries(node, src),
            "identifier" => {
                let Some(next) = node
                    .utf8_text(src.as_bytes())
                    .ok()
                    .and_then(|name| vars.get(name))
                else {
                    return Vec::new();
                };
                node = *next;
            }
            _ => return Vec::new(),
        }
    }
    Vec::new()
}

/// Parses setup.py content into dependencies.
///
/// A file without a `setup(…)` call or without `install_requires` parses as
/// the empty list; unparseable requirement strings are skipped.
pub fn parse_manifest(content: &str) -> Result<Vec<Dependency>> {
    let tree = parse_tree(content)?;
    let root = tree.root_node();

    let Some(value) = install_requires_value(root, content) else {
        return Ok(Vec::new());
    };

    Ok(resolve_entries(value, root, content)
        .into_iter()
        .filter_map(|entry| match parse_requirement(&entry) {
            Ok(dep) => Some(Dependency::Pypi(dep)),
            Err(err) => {
                tracing::warn!(%entry, %err, "skipping unparseable install_requires entry");
                None
            }
        })
        .collect())
}

/// Re-emits setup.py with the `install_requires` value replaced by a list
/// literal of the given dependencies.
pub fn render_manifest(content: &str, deps: &[Dependency]) -> Result<String> {
    let tree = parse_tree(content)?;
    let root = tree.root_node();

    let Some(value) = install_requires_value(root, content) else {
        // Nothing to substitute into; the file is returned unchanged.
        return Ok(content.to_string());
    };

    let rendered: Vec<String> = deps
        .iter()
        .filter_map(|d| match d {
            Dependency::Pypi(p) => Some(format!("\"{p}\"")),
            _ => None,
        })
        .collect();
    let literal = format!("[{}]", rendered.join(", "));

    let mut out = String::with_capacity(content.len() + literal.len());
    out.push_str(&content[..value.start_byte()]);
    out.push_str(&literal);
    out.push_str(&content[value.end_byte()..]);
    Ok(out)
}
