//! pom.xml build-file support for depfix.
//!
//! The Java tier of the benchmark is optional, so this implementation stays
//! deliberately small: it reads the top-level `<dependencies>` block of a
//! POM into `groupId:artifactId` coordinates and regenerates that block on
//! re-emission. Gradle build scripts and registry probing are out of scope
//! for this tier.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use thiserror::Error;

use depfix_core::{
    BuildFile, CoreError, Dependency, DependencyMap, Example, MavenDependency, canonical_name,
};

/// Errors specific to pom.xml handling.
#[derive(Error, Debug)]
pub enum MavenManifestError {
    #[error("failed to parse pom.xml: {source}")]
    Xml {
        #[source]
        source: quick_xml::Error,
    },
}

impl From<quick_xml::Error> for MavenManifestError {
    fn from(source: quick_xml::Error) -> Self {
        Self::Xml { source }
    }
}

/// Result type alias for pom.xml operations.
pub type Result<T> = std::result::Result<T, MavenManifestError>;

#[derive(Default)]
struct PendingDependency {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
}

fn path_is(stack: &[String], suffix: &[&str]) -> bool {
    stack.len() >= suffix.len()
        && stack[stack.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(a, b)| a == b)
}

/// Extracts the top-level `<project><dependencies>` coordinates.
///
/// Dependencies under `<dependencyManagement>` or build plugins are not
/// part of the masked section and are ignored. A POM without a
/// dependencies block parses as the empty list.
pub fn parse_manifest(content: &str) -> Result<Vec<Dependency>> {
    let mut reader = Reader::from_str(content);
    let mut deps = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut pending: Option<PendingDependency> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                stack.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                if path_is(&stack, &["project", "dependencies", "dependency"]) {
                    pending = Some(PendingDependency::default());
                }
            }
            Event::Text(t) => {
                if let Some(dep) = pending.as_mut() {
                    let text = String::from_utf8_lossy(&t.into_inner()).trim().to_string();
                    if text.is_empty() {
                        continue;
                    }
                    match stack.last().map(String::as_str) {
                        Some("groupId") => dep.group_id = Some(text),
                        Some("artifactId") => dep.artifact_id = Some(text),
                        Some("version") => dep.version = Some(text),
                        _ => {}
                    }
                }
            }
            Event::End(_) => {
                let closed = stack.pop();
                if closed.as_deref() == Some("dependency")
                    && path_is(&stack, &["project", "dependencies"])
                    && let Some(dep) = pending.take()
                    && let (Some(group), Some(artifact)) = (dep.group_id, dep.artifact_id)
                {
                    deps.push(Dependency::Maven(MavenDependency::new(
                        group,
                        artifact,
                        dep.version,
                    )));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(deps)
}

fn dependency_block(deps: &[&MavenDependency]) -> String {
    let mut block = String::new();
    for dep in deps {
        block.push_str("    <dependency>\n");
        block.push_str(&format!(
            "      <groupId>{}</groupId>\n",
            escape(dep.group_id.as_str())
        ));
        block.push_str(&format!(
            "      <artifactId>{}</artifactId>\n",
            escape(dep.artifact_id.as_str())
        ));
        if let Some(version) = &dep.version {
            block.push_str(&format!(
                "      <version>{}</version>\n",
                escape(version.as_str())
            ));
        }
        block.push_str("    </dependency>\n");
    }
    block
}

/// Byte span of the top-level `<dependencies>` element's contents:
/// (after the opening tag, after the closing tag).
fn top_level_block_span(content: &str) -> Result<Option<(usize, usize)>> {
    let mut reader = Reader::from_str(content);
    let mut stack: Vec<String> = Vec::new();
    let mut inner_start: Option<usize> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                stack.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                if path_is(&stack, &["project", "dependencies"]) && stack.len() == 2 {
                    inner_start = Some(reader.buffer_position() as usize);
                }
            }
            Event::End(_) => {
                let closed = stack.pop();
                if closed.as_deref() == Some("dependencies")
                    && stack.len() == 1
                    && stack[0] == "project"
                    && let Some(start) = inner_start
                {
                    return Ok(Some((start, reader.buffer_position() as usize)));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(None)
}

/// Re-emits the POM with the top-level `<dependencies>` block regenerated,
/// sorted by canonical coordinate.
pub fn render_manifest(content: &str, deps: &[Dependency]) -> Result<String> {
    let mut sorted: Vec<&MavenDependency> = deps
        .iter()
        .filter_map(|d| match d {
            Dependency::Maven(m) => Some(m),
            _ => None,
        })
        .collect();
    sorted.sort_by_key(|d| canonical_name(&d.coordinate));

    if let Some((inner_start, after_close)) = top_level_block_span(content)? {
        let mut out = String::with_capacity(content.len());
        out.push_str(&content[..inner_start]);
        out.push('\n');
        out.push_str(&dependency_block(&sorted));
        out.push_str("  </dependencies>");
        out.push_str(&content[after_close..]);
        return Ok(out);
    }

    // No existing block: insert one before </project>.
    let Some(end) = content.rfind("</project>") else {
        return Ok(content.to_string());
    };
    let mut out = String::with_capacity(content.len());
    out.push_str(&content[..end]);
    out.push_str("  <dependencies>\n");
    out.push_str(&dependency_block(&sorted));
    out.push_str("  </dependencies>\n");
    out.push_str(&content[end..]);
    Ok(out)
}

/// [`BuildFile`] implementation over a repo's listed `pom.xml` files.
pub struct MavenBuildFile {
    root: PathBuf,
    build_files: Vec<String>,
}

impl MavenBuildFile {
    pub fn new(root: PathBuf, build_files: Vec<String>) -> Self {
        Self { root, build_files }
    }
}

#[async_trait]
impl BuildFile for MavenBuildFile {
    fn parse_dependencies(&self) -> depfix_core::Result<DependencyMap> {
        let mut map = DependencyMap::new();
        for file in &self.build_files {
            let content = std::fs::read_to_string(self.root.join(file))?;
            let deps =
                parse_manifest(&content).map_err(|e| CoreError::parse(file.clone(), e))?;
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
            let rendered =
                render_manifest(&content, file_deps).map_err(|e| CoreError::parse(file.clone(), e))?;
            out.insert(file.clone(), rendered);
        }
        Ok(out)
    }

    async fn is_fake_lib(&self, _build_file: &str, _dep: &Dependency) -> bool {
        // No registry probe on the optional tier.
        false
    }

    fn example(&self) -> Example {
        Example {
            file: "pom.xml",
            content: r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <modelVersion>4.0.0</modelVersion>
  <groupId>com.example</groupId>
  <artifactId>example</artifactId>
  <version>0.1.0</version>
  <dependencies>
    <dependency>
      <groupId>com.fasterxml.jackson.core</groupId>
      <artifactId>jackson-databind</artifactId>
      <version>2.17.0</version>
    </dependency>
  </dependencies>
</project>
"#,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <modelVersion>4.0.0</modelVersion>
  <groupId>com.example</groupId>
  <artifactId>example</artifactId>
  <version>0.1.0</version>
  <dependencyManagement>
    <dependencies>
      <dependency>
        <groupId>org.managed</groupId>
        <artifactId>managed</artifactId>
        <version>1.0</version>
      </dependency>
    </dependencies>
  </dependencyManagement>
  <dependencies>
    <dependency>
      <groupId>org.junit</groupId>
      <artifactId>junit-jupiter</artifactId>
      <version>5.10.0</version>
    </dependency>
    <dependency>
      <groupId>com.google.guava</groupId>
      <artifactId>guava</artifactId>
    </dependency>
  </dependencies>
</project>
"#;

    #[test]
    fn test_parse_top_level_dependencies_only() {
        let deps = parse_manifest(POM).unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name(), "org.junit:junit-jupiter");
        assert_eq!(deps[1].name(), "com.google.guava:guava");

        let Dependency::Maven(guava) = &deps[1] else { unreachable!() };
        assert_eq!(guava.version, None);
    }

    #[test]
    fn test_parse_no_dependencies() {
        let pom = "<project><groupId>x</groupId></project>";
        assert!(parse_manifest(pom).unwrap().is_empty());
    }

    #[test]
    fn test_render_regenerates_block_sorted() {
        let deps = vec![
            Dependency::Maven(MavenDependency::new("org.z", "zeta", Some("1.0".into()))),
            Dependency::Maven(MavenDependency::new("org.a", "alpha", None)),
        ];
        let rendered = render_manifest(POM, &deps).unwrap();
        assert!(rendered.contains("<groupId>com.example</groupId>"));
        let alpha = rendered.find("alpha").unwrap();
        let zeta = rendered.find("zeta").unwrap();
        assert!(alpha < zeta);
        assert!(!rendered.contains("junit-jupiter"));
    }

    #[test]
    fn test_render_parse_roundtrip() {
        let deps = parse_manifest(POM).unwrap();
        let rendered = render_manifest(POM, &deps).unwrap();
        let reparsed = parse_manifest(&rendered).unwrap();
        let before: std::collections::HashSet<_> = deps.iter().collect();
        let after: std::collections::HashSet<_> = reparsed.iter().collect();
        assert_eq!(before, after);
    }
}
