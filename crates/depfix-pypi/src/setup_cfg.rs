//! setup.cfg flavour.
//!
//! Reads `install_requires` from the `[options]` section of the raw INI
//! text, honouring multi-line (indented continuation) values. Re-emission
//! rewrites only the `install_requires` block and leaves the rest of the
//! file byte-identical, which is more than configparser-style round-trips
//! can promise.

use crate::requirement::parse_requirement;
use depfix_core::Dependency;

fn is_continuation(line: &str) -> bool {
    line.starts_with([' ', '\t']) && !line.trim().is_empty()
}

/// Line span of the install_requires option inside `[options]`, if any.
///
/// Returns `(start, end)` where `start` is the option line and `end` is the
/// first line after its continuation block.
fn install_requires_span(lines: &[&str]) -> Option<(usize, usize)> {
    let mut in_options = false;
    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            in_options = trimmed == "[options]";
            continue;
        }
        if !in_options || line.starts_with(|c: char| c.is_whitespace()) {
            continue;
        }
        let Some(key) = trimmed.split(['=', ':']).next() else {
            continue;
        };
        if key.trim() != "install_requires" {
            continue;
        }
        let mut end = idx + 1;
        while end < lines.len() {
            let next = lines[end];
            // Interior blank lines stay inside the block when more
            // indented value lines follow.
            let blank_inside_block = next.trim().is_empty()
                && end + 1 < lines.len()
                && is_continuation(lines[end + 1]);
            if is_continuation(next) || blank_inside_block {
                end += 1;
            } else {
                break;
            }
        }
        return Some((idx, end));
    }
    None
}

/// Parses setup.cfg content into dependencies.
///
/// A file without `[options] install_requires` parses as the empty list.
/// Individual requirement lines that fail PEP 508 parsing are skipped.
pub fn parse_manifest(content: &str) -> Vec<Dependency> {
    let lines: Vec<&str> = content.split('\n').collect();
    let Some((start, end)) = install_requires_span(&lines) else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    // Value on the option line itself, after the delimiter.
    if let Some((_, rest)) = lines[start].split_once(['=', ':']) {
        entries.push(rest.trim());
    }
    for line in &lines[start + 1..end] {
        entries.push(line.trim());
    }

    entries
        .into_iter()
        .filter(|e| !e.is_empty())
        .filter_map(|entry| match parse_requirement(entry) {
            Ok(dep) => Some(Dependency::Pypi(dep)),
            Err(err) => {
                tracing::warn!(entry, %err, "skipping unparseable install_requires entry");
                None
            }
        })
        .collect()
}

/// Re-emits setup.cfg with the `install_requires` block replaced.
///
/// If the option (or the whole `[options]` section) is absent it is
/// created; everything else in the file is untouched.
pub fn render_manifest(content: &str, deps: &[Dependency]) -> String {
    let mut block = String::from("install_requires =");
    for dep in deps {
        if let Dependency::Pypi(d) = dep {
            block.push_str("\n    ");
            block.push_str(&d.to_string());
        }
    }

    let lines: Vec<&str> = content.split('\n').collect();
    if let Some((start, end)) = install_requires_span(&lines) {
        let mut out: Vec<String> = lines[..start].iter().map(ToString::to_string).collect();
        out.push(block);
        out.extend(lines[end..].iter().map(ToString::to_string));
        return out.join("\n");
    }

    // No existing option: insert after the [options] header, or append a
    // fresh section.
    if let Some(header) = lines.iter().position(|l| l.trim() == "[options]") {
        let mut out: Vec<String> = lines[..=header].iter().map(ToString::to_string).collect();
        out.push(block);
        out.extend(lines[header + 1..].iter().map(ToString::to_string));
        return out.join("\n");
    }

    let mut out = content.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("\n[options]\n");
    out.push_str(&block);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = "[metadata]\nname = example\nversion = 0.1.0\n\n[options]\nzip_safe = False\npackages = find:\npython_requires = >=3.9\ninstall_requires =\n    numpy\n    requests>=2.28\n\n[options.extras_require]\ndev =\n    pytest\n";

    #[test]
    fn test_parse_multiline_value() {
        let deps = parse_manifest(MANIFEST);
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name(), "numpy");
        assert_eq!(deps[1].name(), "requests");
    }

    #[test]
    fn test_parse_inline_value() {
        let content = "[options]\ninstall_requires = requests>=2.28\n";
        let deps = parse_manifest(content);
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name(), "requests");
    }

    #[test]
    fn test_missing_option_parses_empty() {
        assert!(parse_manifest("[metadata]\nname = example\n").is_empty());
        assert!(parse_manifest("[options]\nzip_safe = False\n").is_empty());
    }

    #[test]
    fn test_other_sections_not_scanned() {
        let content = "[options.extras_require]\ninstall_requires =\n    pytest\n";
        assert!(parse_manifest(content).is_empty());
    }

    #[test]
    fn test_render_preserves_rest_of_file() {
        let deps = vec![Dependency::Pypi(
            crate::requirement::parse_requirement("flask>=3.0").unwrap(),
        )];
        let rendered = render_manifest(MANIFEST, &deps);
        assert!(rendered.contains("[metadata]\nname = example"));
        assert!(rendered.contains("zip_safe = False"));
        assert!(rendered.contains("[options.extras_require]\ndev =\n    pytest"));
        assert!(rendered.contains("install_requires =\n    flask>=3.0"));
        assert!(!rendered.contains("numpy"));
    }

    #[test]
    fn test_render_creates_missing_section() {
        let deps = vec![Dependency::Pypi(
            crate::requirement::parse_requirement("numpy").unwrap(),
        )];
        let rendered = render_manifest("[metadata]\nname = example\n", &deps);
        assert!(rendered.contains("[options]\ninstall_requires =\n    numpy"));
    }

    #[test]
    fn test_render_parse_roundtrip() {
        let deps = parse_manifest(MANIFEST);
        let rendered = render_manifest(MANIFEST, &deps);
        let reparsed = parse_manifest(&rendered);
        assert_eq!(deps, reparsed);
    }
}
