//! .csproj dependency extraction and re-emission.
//!
//! Every `<ItemGroup>` is scanned for `<PackageReference>` (external NuGet
//! package) and `<ProjectReference>` (on-disk project) children. `Update`
//! is accepted as a synonym of `Include`, which MSBuild uses to amend an
//! item declared elsewhere. Matching is by local element name, so both
//! plain SDK-style projects and documents carrying the legacy MSBuild
//! default namespace parse identically.
//!
//! Re-emission streams the original document, drops every item group that
//! declared references, and appends a package group then a project group
//! (each name-sorted) right before `</Project>`; everything else in the
//! file passes through untouched.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::escape::escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesText, Event};

use crate::error::Result;
use depfix_core::{Dependency, NugetDependency};

fn attr_value(attr: &Attribute) -> String {
    attr.unescape_value()
        .map(Cow::into_owned)
        .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned())
}

/// Pulls the `Include` (or `Update`) and `Version` attributes off a
/// reference element.
fn reference_attrs(
    e: &quick_xml::events::BytesStart<'_>,
) -> Result<(Option<String>, Option<String>, Option<String>)> {
    let mut include = None;
    let mut update = None;
    let mut version = None;
    for attr in e.attributes() {
        let attr = attr?;
        match attr.key.local_name().as_ref() {
            b"Include" => include = Some(attr_value(&attr)),
            b"Update" => update = Some(attr_value(&attr)),
            b"Version" => version = Some(attr_value(&attr)),
            _ => {}
        }
    }
    Ok((include, update, version))
}

/// Extracts all package and project references from csproj content.
///
/// A project without reference item groups parses as the empty list.
///
/// # Errors
///
/// Returns an error on malformed XML.
pub fn parse_manifest(content: &str) -> Result<Vec<Dependency>> {
    let mut reader = Reader::from_str(content);
    let mut deps = Vec::new();
    let mut item_group_depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"ItemGroup" => {
                item_group_depth += 1;
            }
            Event::End(e) if e.local_name().as_ref() == b"ItemGroup" => {
                item_group_depth = item_group_depth.saturating_sub(1);
            }
            Event::Start(e) | Event::Empty(e) if item_group_depth > 0 => {
                match e.local_name().as_ref() {
                    b"PackageReference" => {
                        let (include, update, version) = reference_attrs(&e)?;
                        if let Some(name) = include.or(update) {
                            deps.push(Dependency::Nuget(NugetDependency::package(
                                name,
                                version.unwrap_or_default(),
                            )));
                        }
                    }
                    b"ProjectReference" => {
                        let (include, update, _) = reference_attrs(&e)?;
                        if let Some(path) = include.or(update) {
                            deps.push(Dependency::Nuget(NugetDependency::project(path)));
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(deps)
}

/// First pass over the document: which item groups (in document order)
/// contain package or project references.
fn flag_reference_groups(content: &str) -> Result<Vec<bool>> {
    let mut reader = Reader::from_str(content);
    let mut flags = Vec::new();
    let mut open = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"ItemGroup" => {
                flags.push(false);
                open.push(flags.len() - 1);
            }
            Event::End(e) if e.local_name().as_ref() == b"ItemGroup" => {
                open.pop();
            }
            Event::Empty(e) if e.local_name().as_ref() == b"ItemGroup" => {
                flags.push(false);
            }
            Event::Start(e) | Event::Empty(e)
                if matches!(
                    e.local_name().as_ref(),
                    b"PackageReference" | b"ProjectReference"
                ) =>
            {
                if let Some(&group) = open.last() {
                    flags[group] = true;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(flags)
}

fn reference_group(deps: &[&NugetDependency], element: &str) -> String {
    let mut group = String::from("  <ItemGroup>\n");
    for dep in deps {
        group.push_str("    <");
        group.push_str(element);
        group.push_str(" Include=\"");
        group.push_str(&escape(dep.name.as_str()));
        group.push('"');
        if dep.external && !dep.version.is_empty() {
            group.push_str(" Version=\"");
            group.push_str(&escape(dep.version.as_str()));
            group.push('"');
        }
        group.push_str(" />\n");
    }
    group.push_str("  </ItemGroup>\n");
    group
}

/// Re-emits the csproj with reference item groups replaced by the given
/// dependency set.
pub fn render_manifest(content: &str, deps: &[Dependency]) -> Result<String> {
    let flags = flag_reference_groups(content)?;

    let mut external: Vec<&NugetDependency> = Vec::new();
    let mut internal: Vec<&NugetDependency> = Vec::new();
    for dep in deps {
        if let Dependency::Nuget(d) = dep {
            if d.external {
                external.push(d);
            } else {
                internal.push(d);
            }
        }
    }
    external.sort_by(|a, b| a.name.cmp(&b.name));
    internal.sort_by(|a, b| a.name.cmp(&b.name));

    let mut addition = String::new();
    if !external.is_empty() {
        addition.push_str(&reference_group(&external, "PackageReference"));
    }
    if !internal.is_empty() {
        addition.push_str(&reference_group(&internal, "ProjectReference"));
    }

    let mut reader = Reader::from_str(content);
    let mut writer = Writer::new(Vec::new());
    let mut group_idx = 0usize;
    let mut swallow_ws = false;

    loop {
        let event = reader.read_event()?;
        match event {
            Event::Start(ref e) if e.local_name().as_ref() == b"ItemGroup" => {
                let flagged = flags.get(group_idx).copied().unwrap_or(false);
                group_idx += 1;
                if flagged {
                    // Drop the whole subtree plus the trailing blank line.
                    let mut depth = 1usize;
                    while depth > 0 {
                        match reader.read_event()? {
                            Event::Start(inner) if inner.local_name().as_ref() == b"ItemGroup" => {
                                depth += 1;
                            }
                            Event::End(inner) if inner.local_name().as_ref() == b"ItemGroup" => {
                                depth -= 1;
                            }
                            Event::Eof => break,
                            _ => {}
                        }
                    }
                    swallow_ws = true;
                    continue;
                }
                writer.write_event(event)?;
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"ItemGroup" => {
                group_idx += 1;
                writer.write_event(event)?;
            }
            Event::Text(ref t) if swallow_ws => {
                swallow_ws = false;
                let raw = t.clone().into_inner();
                if !raw.iter().all(|b| b.is_ascii_whitespace()) {
                    writer.write_event(event)?;
                }
            }
            Event::End(ref e) if e.local_name().as_ref() == b"Project" => {
                swallow_ws = false;
                if !addition.is_empty() {
                    let mut text = addition.clone();
                    if !writer.get_ref().ends_with(b"\n") {
                        text.insert(0, '\n');
                    }
                    writer.write_event(Event::Text(BytesText::from_escaped(text)))?;
                }
                writer.write_event(event)?;
            }
            Event::Eof => break,
            _ => {
                swallow_ws = false;
                writer.write_event(event)?;
            }
        }
    }

    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <OutputType>Exe</OutputType>
    <TargetFramework>net8.0</TargetFramework>
  </PropertyGroup>
  <ItemGroup>
    <PackageReference Include="Newtonsoft.Json" Version="13.0.3" />
    <PackageReference Include="Serilog" Version="3.1.1" />
  </ItemGroup>
  <ItemGroup>
    <ProjectReference Include="../lib/lib.csproj" />
  </ItemGroup>
</Project>
"#;

    #[test]
    fn test_parse_package_and_project_references() {
        let deps = parse_manifest(MANIFEST).unwrap();
        assert_eq!(deps.len(), 3);

        let Dependency::Nuget(json) = &deps[0] else { unreachable!() };
        assert_eq!(json.name, "Newtonsoft.Json");
        assert_eq!(json.version, "13.0.3");
        assert!(json.external);

        let Dependency::Nuget(lib) = &deps[2] else { unreachable!() };
        assert_eq!(lib.name, "../lib/lib.csproj");
        assert!(!lib.external);
        assert!(lib.version.is_empty());
    }

    #[test]
    fn test_parse_update_synonym() {
        let manifest = r#"<Project Sdk="Microsoft.NET.Sdk">
  <ItemGroup>
    <PackageReference Update="Serilog" Version="3.1.1" />
  </ItemGroup>
</Project>"#;
        let deps = parse_manifest(manifest).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name(), "Serilog");
    }

    #[test]
    fn test_parse_legacy_namespace() {
        let manifest = r#"<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <ItemGroup>
    <PackageReference Include="NUnit" Version="3.14.0" />
  </ItemGroup>
</Project>"#;
        let deps = parse_manifest(manifest).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name(), "NUnit");
    }

    #[test]
    fn test_parse_no_references() {
        let manifest = r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <TargetFramework>net8.0</TargetFramework>
  </PropertyGroup>
  <ItemGroup>
    <Compile Include="Program.cs" />
  </ItemGroup>
</Project>"#;
        assert!(parse_manifest(manifest).unwrap().is_empty());
    }

    #[test]
    fn test_parse_malformed_xml_errors() {
        assert!(parse_manifest("<Project><ItemGroup></Project>").is_err());
    }

    #[test]
    fn test_render_replaces_reference_groups() {
        let deps = vec![
            Dependency::Nuget(NugetDependency::package("Serilog", "3.1.1")),
            Dependency::Nuget(NugetDependency::package("AutoMapper", "12.0.1")),
            Dependency::Nuget(NugetDependency::project("../lib/lib.csproj")),
        ];
        let rendered = render_manifest(MANIFEST, &deps).unwrap();

        // Property group untouched, old references gone.
        assert!(rendered.contains("<TargetFramework>net8.0</TargetFramework>"));
        assert!(!rendered.contains("Newtonsoft.Json"));

        // External group sorted by name, before the project group.
        let auto = rendered.find("AutoMapper").unwrap();
        let serilog = rendered.find("Serilog").unwrap();
        let lib = rendered.find("../lib/lib.csproj").unwrap();
        assert!(auto < serilog && serilog < lib);
    }

    #[test]
    fn test_render_keeps_non_reference_groups() {
        let manifest = r#"<Project Sdk="Microsoft.NET.Sdk">
  <ItemGroup>
    <Compile Include="Program.cs" />
  </ItemGroup>
  <ItemGroup>
    <PackageReference Include="Old" Version="1.0.0" />
  </ItemGroup>
</Project>
"#;
        let deps = vec![Dependency::Nuget(NugetDependency::package("New", "2.0.0"))];
        let rendered = render_manifest(manifest, &deps).unwrap();
        assert!(rendered.contains("<Compile Include=\"Program.cs\" />"));
        assert!(!rendered.contains("\"Old\""));
        assert!(rendered.contains("<PackageReference Include=\"New\" Version=\"2.0.0\" />"));
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

    #[test]
    fn test_render_escapes_attribute_values() {
        let deps = vec![Dependency::Nuget(NugetDependency::project(
            "../a&b/lib.csproj",
        ))];
        let rendered =
            render_manifest("<Project Sdk=\"Microsoft.NET.Sdk\">\n</Project>\n", &deps).unwrap();
        assert!(rendered.contains("../a&amp;b/lib.csproj"));
    }
}
