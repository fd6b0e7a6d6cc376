//! Artifact coordinates (group, identifier, version)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an artifact in a repository.
///
/// The version is optional until resolution pins it; two coordinates with the
/// same group and identifier refer to the same artifact for matching purposes
/// even when their versions differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactCoordinate {
    pub group: String,
    pub identifier: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Matching identity: (group, identifier) without the version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub group: String,
    pub identifier: String,
}

impl ArtifactKey {
    pub fn new(group: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            identifier: identifier.into(),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.identifier)
    }
}

impl ArtifactCoordinate {
    /// Create an unversioned coordinate
    pub fn new(group: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            identifier: identifier.into(),
            version: None,
        }
    }

    /// Create a fully versioned coordinate
    pub fn versioned(
        group: impl Into<String>,
        identifier: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            identifier: identifier.into(),
            version: Some(version.into()),
        }
    }

    /// Copy of this coordinate with the version set; the original is untouched
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            group: self.group.clone(),
            identifier: self.identifier.clone(),
            version: Some(version.into()),
        }
    }

    /// Matching identity, ignoring the version
    pub fn key(&self) -> ArtifactKey {
        ArtifactKey::new(self.group.as_str(), self.identifier.as_str())
    }

    /// Whether this coordinate names the same artifact as `other`
    pub fn matches(&self, other: &ArtifactCoordinate) -> bool {
        self.group == other.group && self.identifier == other.identifier
    }

    pub fn is_versioned(&self) -> bool {
        self.version.is_some()
    }

    /// File name for the artifact with the given extension, e.g. `demo-1.0.jar`
    pub fn file_name(&self, extension: &str) -> Option<String> {
        self.version
            .as_ref()
            .map(|version| format!("{}-{}.{}", self.identifier, version, extension))
    }

    /// Repository-relative path for the artifact with the given extension,
    /// following the `group/as/dirs/identifier/version/` convention.
    pub fn relative_path(&self, extension: &str) -> Option<String> {
        let version = self.version.as_ref()?;
        let file_name = self.file_name(extension)?;
        Some(format!(
            "{}/{}/{}/{}",
            self.group.replace('.', "/"),
            self.identifier,
            version,
            file_name
        ))
    }

    /// Repository-relative path of the manifest (`.pom`) resource
    pub fn manifest_path(&self) -> Option<String> {
        self.relative_path("pom")
    }
}

impl fmt::Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}:{}:{}", self.group, self.identifier, version),
            None => write!(f, "{}:{}", self.group, self.identifier),
        }
    }
}
