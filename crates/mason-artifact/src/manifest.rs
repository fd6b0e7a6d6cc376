//! Manifest (POM) model and reader
//!
//! Parses the repository manifest resource for one coordinate into a
//! [`Manifest`]: parent reference, declared dependencies, managed dependency
//! versions and the property map. Only the fields the resolver consumes are
//! modeled; everything else in the document is ignored.

use crate::coordinate::{ArtifactCoordinate, ArtifactKey};
use quick_xml::de::from_reader;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to parse manifest at {origin}: {source}")]
    Parse {
        origin: String,
        source: quick_xml::DeError,
    },

    #[error("manifest at {origin} has no version and no parent to inherit one from")]
    MissingVersion { origin: String },

    #[error("unresolved property placeholder '${{{placeholder}}}' in manifest {origin}")]
    UnresolvedProperty { placeholder: String, origin: String },

    #[error("property expansion exceeded depth limit for '{value}' in manifest {origin}")]
    RecursiveProperty { value: String, origin: String },
}

/// Parsed dependency metadata for one coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub coordinate: ArtifactCoordinate,
    pub parent: Option<ArtifactCoordinate>,
    pub dependencies: Vec<Dependency>,
    pub managed_dependencies: Vec<Dependency>,
    pub properties: HashMap<String, String>,
    /// Resource location this manifest was read from, for diagnostics
    pub origin: String,
}

impl Manifest {
    /// Look up a managed version for the given artifact, declaration order.
    pub fn managed_version(&self, key: &ArtifactKey) -> Option<&str> {
        self.managed_dependencies
            .iter()
            .find(|dep| dep.coordinate.key() == *key)
            .and_then(|dep| dep.coordinate.version.as_deref())
    }
}

/// One declared dependency: coordinate (version optional), scope, exclusions.
#[derive(Debug, Clone, PartialEq)]
pub struct Dependency {
    pub coordinate: ArtifactCoordinate,
    pub scope: DependencyScope,
    pub exclusions: Vec<ExclusionPattern>,
}

impl Dependency {
    pub fn new(coordinate: ArtifactCoordinate) -> Self {
        Self {
            coordinate,
            scope: DependencyScope::Compile,
            exclusions: Vec::new(),
        }
    }

    pub fn with_scope(mut self, scope: DependencyScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_exclusions(mut self, exclusions: Vec<ExclusionPattern>) -> Self {
        self.exclusions = exclusions;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DependencyScope {
    #[default]
    Compile,
    Provided,
    Runtime,
    Test,
    System,
    Import,
}

impl DependencyScope {
    fn parse(value: &str) -> Self {
        match value {
            "provided" => Self::Provided,
            "runtime" => Self::Runtime,
            "test" => Self::Test,
            "system" => Self::System,
            "import" => Self::Import,
            _ => Self::Compile,
        }
    }
}

/// A (group, identifier) pattern suppressing a transitively reachable
/// artifact. `*` matches any group or any identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExclusionPattern {
    pub group: String,
    pub identifier: String,
}

impl ExclusionPattern {
    pub fn new(group: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            identifier: identifier.into(),
        }
    }

    pub fn matches(&self, key: &ArtifactKey) -> bool {
        (self.group == "*" || self.group == key.group)
            && (self.identifier == "*" || self.identifier == key.identifier)
    }
}

impl fmt::Display for ExclusionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.identifier)
    }
}

// Raw deserialization shapes for the XML document. Converted into the domain
// model by `ManifestReader::parse` so the rest of the crate never sees them.

#[derive(Debug, Deserialize)]
struct RawProject {
    #[serde(rename = "groupId")]
    group_id: Option<String>,
    #[serde(rename = "artifactId")]
    artifact_id: Option<String>,
    version: Option<String>,
    parent: Option<RawParent>,
    #[serde(default)]
    properties: Option<HashMap<String, String>>,
    dependencies: Option<RawDependencies>,
    #[serde(rename = "dependencyManagement")]
    dependency_management: Option<RawDependencyManagement>,
}

#[derive(Debug, Deserialize)]
struct RawParent {
    #[serde(rename = "groupId")]
    group_id: String,
    #[serde(rename = "artifactId")]
    artifact_id: String,
    version: String,
}

#[derive(Debug, Deserialize)]
struct RawDependencyManagement {
    dependencies: Option<RawDependencies>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDependencies {
    #[serde(default, rename = "dependency")]
    items: Vec<RawDependency>,
}

#[derive(Debug, Deserialize)]
struct RawDependency {
    #[serde(rename = "groupId")]
    group_id: String,
    #[serde(rename = "artifactId")]
    artifact_id: String,
    version: Option<String>,
    scope: Option<String>,
    exclusions: Option<RawExclusions>,
}

#[derive(Debug, Default, Deserialize)]
struct RawExclusions {
    #[serde(default, rename = "exclusion")]
    items: Vec<RawExclusion>,
}

#[derive(Debug, Deserialize)]
struct RawExclusion {
    #[serde(rename = "groupId")]
    group_id: String,
    #[serde(rename = "artifactId")]
    artifact_id: String,
}

/// Reads manifest resources into [`Manifest`] records.
#[derive(Debug, Default)]
pub struct ManifestReader;

impl ManifestReader {
    /// Parse a manifest document fetched for `requested`.
    ///
    /// Group and version may be omitted in the document when a parent is
    /// declared; the parent's values fill the gap. `origin` names the resource
    /// location for diagnostics.
    pub fn parse(
        bytes: &[u8],
        requested: &ArtifactCoordinate,
        origin: &str,
    ) -> Result<Manifest, ManifestError> {
        let raw: RawProject = from_reader(bytes).map_err(|source| ManifestError::Parse {
            origin: origin.to_string(),
            source,
        })?;

        let parent = raw.parent.as_ref().map(|p| {
            ArtifactCoordinate::versioned(
                p.group_id.as_str(),
                p.artifact_id.as_str(),
                p.version.as_str(),
            )
        });

        let group = raw
            .group_id
            .or_else(|| parent.as_ref().map(|p| p.group.clone()))
            .unwrap_or_else(|| requested.group.clone());
        let identifier = raw
            .artifact_id
            .unwrap_or_else(|| requested.identifier.clone());
        let version = raw
            .version
            .or_else(|| parent.as_ref().and_then(|p| p.version.clone()))
            .or_else(|| requested.version.clone())
            .ok_or_else(|| ManifestError::MissingVersion {
                origin: origin.to_string(),
            })?;

        let coordinate = ArtifactCoordinate::versioned(group, identifier, version);

        let dependencies = raw
            .dependencies
            .unwrap_or_default()
            .items
            .into_iter()
            .map(convert_dependency)
            .collect();
        let managed_dependencies = raw
            .dependency_management
            .and_then(|dm| dm.dependencies)
            .unwrap_or_default()
            .items
            .into_iter()
            .map(convert_dependency)
            .collect();

        Ok(Manifest {
            coordinate,
            parent,
            dependencies,
            managed_dependencies,
            properties: raw.properties.unwrap_or_default(),
            origin: origin.to_string(),
        })
    }
}

fn convert_dependency(raw: RawDependency) -> Dependency {
    let coordinate = match raw.version {
        Some(version) => {
            ArtifactCoordinate::versioned(raw.group_id, raw.artifact_id, version)
        }
        None => ArtifactCoordinate::new(raw.group_id, raw.artifact_id),
    };

    let exclusions = raw
        .exclusions
        .unwrap_or_default()
        .items
        .into_iter()
        .map(|e| ExclusionPattern::new(e.group_id, e.artifact_id))
        .collect();

    Dependency {
        coordinate,
        scope: raw
            .scope
            .as_deref()
            .map(DependencyScope::parse)
            .unwrap_or_default(),
        exclusions,
    }
}

const MAX_EXPANSIONS: usize = 64;

/// Resolve `${...}` placeholders in `value` against a manifest chain.
///
/// `chain[0]` is the owning manifest, followed by its parents in order.
/// Property values may themselves contain placeholders; expansion repeats up
/// to a fixed depth. An unresolvable placeholder is an error, never an empty
/// string.
pub fn interpolate(value: &str, chain: &[&Manifest]) -> Result<String, ManifestError> {
    let owner = chain.first().expect("interpolation chain is never empty");
    let mut current = value.to_string();

    for _ in 0..MAX_EXPANSIONS {
        let Some(start) = current.find("${") else {
            return Ok(current);
        };
        let Some(end) = current[start..].find('}') else {
            return Ok(current);
        };
        let key = &current[start + 2..start + end];

        let replacement = lookup_property(key, owner, chain).ok_or_else(|| {
            ManifestError::UnresolvedProperty {
                placeholder: key.to_string(),
                origin: owner.origin.clone(),
            }
        })?;

        current.replace_range(start..start + end + 1, &replacement);
    }

    Err(ManifestError::RecursiveProperty {
        value: value.to_string(),
        origin: owner.origin.clone(),
    })
}

fn lookup_property(key: &str, owner: &Manifest, chain: &[&Manifest]) -> Option<String> {
    // Built-ins resolve from the owning manifest's own coordinate
    match key {
        "project.groupId" | "pom.groupId" => return Some(owner.coordinate.group.clone()),
        "project.artifactId" | "pom.artifactId" => {
            return Some(owner.coordinate.identifier.clone())
        }
        "project.version" | "pom.version" => return owner.coordinate.version.clone(),
        _ => {}
    }

    chain
        .iter()
        .find_map(|manifest| manifest.properties.get(key).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SAMPLE: &str = r#"
        <project>
          <groupId>org.example</groupId>
          <artifactId>demo</artifactId>
          <version>1.0.0</version>
          <properties>
            <lib.version>2.5.1</lib.version>
          </properties>
          <dependencies>
            <dependency>
              <groupId>org.example</groupId>
              <artifactId>core</artifactId>
              <version>${lib.version}</version>
            </dependency>
            <dependency>
              <groupId>org.example</groupId>
              <artifactId>extras</artifactId>
              <scope>test</scope>
              <exclusions>
                <exclusion>
                  <groupId>org.unwanted</groupId>
                  <artifactId>noise</artifactId>
                </exclusion>
              </exclusions>
            </dependency>
          </dependencies>
          <dependencyManagement>
            <dependencies>
              <dependency>
                <groupId>org.example</groupId>
                <artifactId>extras</artifactId>
                <version>3.0.0</version>
              </dependency>
            </dependencies>
          </dependencyManagement>
        </project>
    "#;

    fn requested() -> ArtifactCoordinate {
        ArtifactCoordinate::versioned("org.example", "demo", "1.0.0")
    }

    #[test]
    fn test_parse_sample_manifest() {
        let manifest = ManifestReader::parse(SAMPLE.as_bytes(), &requested(), "test").unwrap();

        assert_eq!(manifest.coordinate, requested());
        assert!(manifest.parent.is_none());
        assert_eq!(manifest.dependencies.len(), 2);
        assert_eq!(manifest.managed_dependencies.len(), 1);
        assert_eq!(manifest.properties.get("lib.version").unwrap(), "2.5.1");

        let extras = &manifest.dependencies[1];
        assert_eq!(extras.scope, DependencyScope::Test);
        assert_eq!(extras.exclusions.len(), 1);
        assert!(extras.coordinate.version.is_none());
    }

    #[test]
    fn test_dependency_order_is_declaration_order() {
        let manifest = ManifestReader::parse(SAMPLE.as_bytes(), &requested(), "test").unwrap();
        assert_eq!(manifest.dependencies[0].coordinate.identifier, "core");
        assert_eq!(manifest.dependencies[1].coordinate.identifier, "extras");
    }

    #[test]
    fn test_parent_fills_missing_group_and_version() {
        let xml = r#"
            <project>
              <artifactId>child</artifactId>
              <parent>
                <groupId>org.example</groupId>
                <artifactId>parent</artifactId>
                <version>7.0</version>
              </parent>
            </project>
        "#;
        let requested = ArtifactCoordinate::new("org.example", "child");
        let manifest = ManifestReader::parse(xml.as_bytes(), &requested, "test").unwrap();

        assert_eq!(
            manifest.coordinate,
            ArtifactCoordinate::versioned("org.example", "child", "7.0")
        );
        assert_eq!(
            manifest.parent.unwrap(),
            ArtifactCoordinate::versioned("org.example", "parent", "7.0")
        );
    }

    #[test]
    fn test_malformed_document_names_origin() {
        let result = ManifestReader::parse(
            b"<project><dependencies>",
            &requested(),
            "repo/org/example/demo.pom",
        );
        match result {
            Err(ManifestError::Parse { origin, .. }) => {
                assert_eq!(origin, "repo/org/example/demo.pom");
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_interpolate_own_properties() {
        let manifest = ManifestReader::parse(SAMPLE.as_bytes(), &requested(), "test").unwrap();
        let chain = [&manifest];

        assert_eq!(interpolate("${lib.version}", &chain).unwrap(), "2.5.1");
        assert_eq!(
            interpolate("prefix-${lib.version}-suffix", &chain).unwrap(),
            "prefix-2.5.1-suffix"
        );
        assert_eq!(interpolate("plain", &chain).unwrap(), "plain");
    }

    #[test]
    fn test_interpolate_builtins() {
        let manifest = ManifestReader::parse(SAMPLE.as_bytes(), &requested(), "test").unwrap();
        let chain = [&manifest];

        assert_eq!(interpolate("${project.version}", &chain).unwrap(), "1.0.0");
        assert_eq!(
            interpolate("${project.groupId}", &chain).unwrap(),
            "org.example"
        );
    }

    #[test]
    fn test_interpolate_walks_parent_chain() {
        let parent_xml = r#"
            <project>
              <groupId>org.example</groupId>
              <artifactId>parent</artifactId>
              <version>7.0</version>
              <properties>
                <shared.version>4.4.4</shared.version>
              </properties>
            </project>
        "#;
        let parent_coord = ArtifactCoordinate::versioned("org.example", "parent", "7.0");
        let parent = ManifestReader::parse(parent_xml.as_bytes(), &parent_coord, "test").unwrap();
        let child = ManifestReader::parse(SAMPLE.as_bytes(), &requested(), "test").unwrap();

        let chain = [&child, &parent];
        assert_eq!(interpolate("${shared.version}", &chain).unwrap(), "4.4.4");
    }

    #[test]
    fn test_unresolved_placeholder_is_an_error() {
        let manifest = ManifestReader::parse(SAMPLE.as_bytes(), &requested(), "test").unwrap();
        let result = interpolate("${does.not.exist}", &[&manifest]);

        match result {
            Err(ManifestError::UnresolvedProperty { placeholder, .. }) => {
                assert_eq!(placeholder, "does.not.exist");
            }
            other => panic!("expected unresolved property error, got {:?}", other),
        }
    }

    #[rstest]
    #[case("org.unwanted", "noise", true)]
    #[case("org.unwanted", "*", true)]
    #[case("*", "noise", true)]
    #[case("*", "*", true)]
    #[case("org.other", "*", false)]
    #[case("*", "silence", false)]
    #[case("org.unwanted", "silence", false)]
    fn test_exclusion_wildcards(
        #[case] group: &str,
        #[case] identifier: &str,
        #[case] excluded: bool,
    ) {
        let key = ArtifactKey::new("org.unwanted", "noise");
        assert_eq!(ExclusionPattern::new(group, identifier).matches(&key), excluded);
    }

    #[test]
    fn test_managed_version_lookup() {
        let manifest = ManifestReader::parse(SAMPLE.as_bytes(), &requested(), "test").unwrap();
        let key = ArtifactKey::new("org.example", "extras");
        assert_eq!(manifest.managed_version(&key), Some("3.0.0"));
        assert_eq!(
            manifest.managed_version(&ArtifactKey::new("org.example", "missing")),
            None
        );
    }
}
