//! Repositories: sources of artifacts and manifests
//!
//! A [`Repository`] resolves a coordinate to a manifest or a file location and
//! can install artifact bytes into a local cache. Repositories are queried in
//! the priority order supplied by the caller; the first responder wins.

use crate::coordinate::ArtifactCoordinate;
use crate::manifest::{Manifest, ManifestError, ManifestReader};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fixed remote HTTPS endpoint for the well-known central repository.
pub const CENTRAL_URL: &str = "https://repo1.maven.org/maven2";

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("coordinate {0} has no version; cannot derive a repository path")]
    Unversioned(ArtifactCoordinate),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("HTTP request to {url} failed: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("repository '{0}' does not support installing artifacts")]
    InstallUnsupported(String),
}

impl RepositoryError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Where an artifact file can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileLocation {
    Local(PathBuf),
    Remote(String),
}

impl fmt::Display for FileLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileLocation::Local(path) => write!(f, "{}", path.display()),
            FileLocation::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// A source of artifacts: remote HTTP endpoint or local cache/mirror.
pub trait Repository: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch and parse the manifest for `coordinate`, or `None` if this
    /// repository does not have it.
    fn resolve_manifest(
        &self,
        coordinate: &ArtifactCoordinate,
    ) -> RepositoryResult<Option<Manifest>>;

    /// Resolve the location of the artifact file with the given extension,
    /// or `None` if this repository does not have it.
    fn resolve_file(
        &self,
        coordinate: &ArtifactCoordinate,
        extension: &str,
    ) -> RepositoryResult<Option<FileLocation>>;

    /// Write artifact bytes into this repository's storage.
    fn install(
        &self,
        coordinate: &ArtifactCoordinate,
        extension: &str,
        bytes: &[u8],
    ) -> RepositoryResult<PathBuf>;
}

/// Version-scoped cache directory layout for the running tool.
///
/// The bootstrap owns creation and cleanup of this layout; the core only
/// reads and writes within it.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    /// Layout rooted at the user-scoped cache for a specific tool version
    pub fn for_version(tool_version: &str) -> Option<Self> {
        dirs::home_dir().map(|home| Self {
            root: home.join(".mason").join(tool_version),
        })
    }

    /// Layout for the running tool's own version
    pub fn current() -> Option<Self> {
        Self::for_version(env!("CARGO_PKG_VERSION"))
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fetched runtime artifacts land here
    pub fn downloads(&self) -> PathBuf {
        self.root.join("downloads")
    }

    /// Build output lands here
    pub fn target(&self) -> PathBuf {
        self.root.join("target")
    }

    /// Local repository view over the downloads folder
    pub fn downloads_repository(&self) -> LocalRepository {
        LocalRepository::new("local", self.downloads())
    }
}

/// Filesystem-backed repository (cache or mirror).
#[derive(Debug, Clone)]
pub struct LocalRepository {
    name: String,
    root: PathBuf,
}

impl LocalRepository {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(
        &self,
        coordinate: &ArtifactCoordinate,
        extension: &str,
    ) -> RepositoryResult<PathBuf> {
        coordinate
            .relative_path(extension)
            .map(|rel| self.root.join(rel))
            .ok_or_else(|| RepositoryError::Unversioned(coordinate.clone()))
    }
}

impl Repository for LocalRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve_manifest(
        &self,
        coordinate: &ArtifactCoordinate,
    ) -> RepositoryResult<Option<Manifest>> {
        let path = self.path_for(coordinate, "pom")?;
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path).map_err(|e| RepositoryError::io(&path, e))?;
        let manifest =
            ManifestReader::parse(&bytes, coordinate, &path.display().to_string())?;
        Ok(Some(manifest))
    }

    fn resolve_file(
        &self,
        coordinate: &ArtifactCoordinate,
        extension: &str,
    ) -> RepositoryResult<Option<FileLocation>> {
        let path = self.path_for(coordinate, extension)?;
        if path.exists() {
            Ok(Some(FileLocation::Local(path)))
        } else {
            Ok(None)
        }
    }

    fn install(
        &self,
        coordinate: &ArtifactCoordinate,
        extension: &str,
        bytes: &[u8],
    ) -> RepositoryResult<PathBuf> {
        let path = self.path_for(coordinate, extension)?;
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent).map_err(|e| RepositoryError::io(parent, e))?;

        // Temp file + rename so a concurrent reader never sees a partial write
        let staging = path.with_extension(format!("{extension}.part"));
        fs::write(&staging, bytes).map_err(|e| RepositoryError::io(&staging, e))?;
        fs::rename(&staging, &path).map_err(|e| RepositoryError::io(&path, e))?;

        tracing::debug!(repository = %self.name, artifact = %coordinate, path = %path.display(), "installed artifact");
        Ok(path)
    }
}

/// HTTP(S) repository identified by a name and a base URL.
pub struct RemoteRepository {
    name: String,
    base_url: String,
    client: reqwest::blocking::Client,
}

impl RemoteRepository {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            name: name.into(),
            base_url,
            client: reqwest::blocking::Client::new(),
        }
    }

    /// The well-known central repository
    pub fn central() -> Self {
        Self::new("central", CENTRAL_URL)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(
        &self,
        coordinate: &ArtifactCoordinate,
        extension: &str,
    ) -> RepositoryResult<String> {
        coordinate
            .relative_path(extension)
            .map(|rel| format!("{}/{}", self.base_url, rel))
            .ok_or_else(|| RepositoryError::Unversioned(coordinate.clone()))
    }
}

impl fmt::Debug for RemoteRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteRepository")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Repository for RemoteRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve_manifest(
        &self,
        coordinate: &ArtifactCoordinate,
    ) -> RepositoryResult<Option<Manifest>> {
        let url = self.url_for(coordinate, "pom")?;
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|source| RepositoryError::Http {
                url: url.clone(),
                source,
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|source| RepositoryError::Http {
                url: url.clone(),
                source,
            })?;

        let bytes = response
            .bytes()
            .map_err(|source| RepositoryError::Http {
                url: url.clone(),
                source,
            })?;

        let manifest = ManifestReader::parse(&bytes, coordinate, &url)?;
        Ok(Some(manifest))
    }

    fn resolve_file(
        &self,
        coordinate: &ArtifactCoordinate,
        extension: &str,
    ) -> RepositoryResult<Option<FileLocation>> {
        // Existence is discovered by the downloader when it fetches; the
        // remote repository only derives the conventional location.
        let url = self.url_for(coordinate, extension)?;
        Ok(Some(FileLocation::Remote(url)))
    }

    fn install(
        &self,
        _coordinate: &ArtifactCoordinate,
        _extension: &str,
        _bytes: &[u8],
    ) -> RepositoryResult<PathBuf> {
        Err(RepositoryError::InstallUnsupported(self.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn coord() -> ArtifactCoordinate {
        ArtifactCoordinate::versioned("org.example", "demo", "1.0")
    }

    #[test]
    fn test_local_repository_miss() {
        let dir = TempDir::new().unwrap();
        let repo = LocalRepository::new("local", dir.path());

        assert!(repo.resolve_manifest(&coord()).unwrap().is_none());
        assert!(repo.resolve_file(&coord(), "jar").unwrap().is_none());
    }

    #[test]
    fn test_local_install_then_resolve() {
        let dir = TempDir::new().unwrap();
        let repo = LocalRepository::new("local", dir.path());

        let installed = repo.install(&coord(), "jar", b"artifact-bytes").unwrap();
        assert!(installed.ends_with("org/example/demo/1.0/demo-1.0.jar"));
        assert_eq!(fs::read(&installed).unwrap(), b"artifact-bytes");

        match repo.resolve_file(&coord(), "jar").unwrap() {
            Some(FileLocation::Local(path)) => assert_eq!(path, installed),
            other => panic!("expected local location, got {:?}", other),
        }
    }

    #[test]
    fn test_local_install_leaves_no_staging_file() {
        let dir = TempDir::new().unwrap();
        let repo = LocalRepository::new("local", dir.path());
        let installed = repo.install(&coord(), "jar", b"bytes").unwrap();

        let staging = installed.with_extension("jar.part");
        assert!(!staging.exists());
    }

    #[test]
    fn test_local_manifest_roundtrip() {
        let dir = TempDir::new().unwrap();
        let repo = LocalRepository::new("local", dir.path());
        let pom = r#"
            <project>
              <groupId>org.example</groupId>
              <artifactId>demo</artifactId>
              <version>1.0</version>
            </project>
        "#;
        repo.install(&coord(), "pom", pom.as_bytes()).unwrap();

        let manifest = repo.resolve_manifest(&coord()).unwrap().unwrap();
        assert_eq!(manifest.coordinate, coord());
    }

    #[test]
    fn test_unversioned_coordinate_is_rejected() {
        let dir = TempDir::new().unwrap();
        let repo = LocalRepository::new("local", dir.path());
        let unversioned = ArtifactCoordinate::new("org.example", "demo");

        assert!(matches!(
            repo.resolve_file(&unversioned, "jar"),
            Err(RepositoryError::Unversioned(_))
        ));
    }

    #[test]
    fn test_remote_repository_derives_urls() {
        let repo = RemoteRepository::new("mirror", "https://mirror.example.com/repo/");
        assert_eq!(repo.base_url(), "https://mirror.example.com/repo");

        match repo.resolve_file(&coord(), "jar").unwrap() {
            Some(FileLocation::Remote(url)) => assert_eq!(
                url,
                "https://mirror.example.com/repo/org/example/demo/1.0/demo-1.0.jar"
            ),
            other => panic!("expected remote location, got {:?}", other),
        }
    }

    #[test]
    fn test_remote_install_unsupported() {
        let repo = RemoteRepository::central();
        assert!(matches!(
            repo.install(&coord(), "jar", b""),
            Err(RepositoryError::InstallUnsupported(_))
        ));
    }

    #[test]
    fn test_cache_layout_paths() {
        let layout = CacheLayout::at("/tmp/mason-test/0.1.0");
        assert!(layout.downloads().ends_with("downloads"));
        assert!(layout.target().ends_with("target"));
        assert_eq!(layout.downloads_repository().name(), "local");
    }
}
