//! requirements.txt / *.pip flavour.
//!
//! A tolerant line-oriented PEP 508 parser: comments, blank lines, editable
//! installs (`-e …`) and every other pip option line are dropped, and lines
//! that fail to parse are skipped with a warning rather than failing the
//! file. Backslash continuations are folded before parsing.

use crate::requirement::parse_requirement;
use depfix_core::Dependency;

/// Parses requirements-file content into dependencies.
pub fn parse_manifest(content: &str) -> Vec<Dependency> {
    let mut deps = Vec::new();
    let mut pending = String::new();

    for raw_line in content.lines() {
        pending.push_str(raw_line);
        if pending.ends_with('\\') {
            pending.pop();
            continue;
        }
        let line = std::mem::take(&mut pending);
        if let Some(dep) = parse_line(&line) {
            deps.push(Dependency::Pypi(dep));
        }
    }
    if let Some(dep) = parse_line(&pending) {
        deps.push(Dependency::Pypi(dep));
    }

    deps
}

fn parse_line(line: &str) -> Option<depfix_core::PypiDependency> {
    let mut line = line.trim();
    if let Some((head, _comment)) = line.split_once(" #") {
        line = head.trim();
    }
    if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
        return None;
    }
    match parse_requirement(line) {
        Ok(dep) => Some(dep),
        Err(err) => {
            tracing::warn!(line, %err, "skipping unparseable requirement line");
            None
        }
    }
}

/// Renders dependencies back to requirements-file content, one per line.
pub fn render_manifest(deps: &[Dependency]) -> String {
    let mut out = String::new();
    for dep in deps {
        if let Dependency::Pypi(d) = dep {
            out.push_str(&d.to_string());
            out.push('\n');
        }
    }
    out
}
