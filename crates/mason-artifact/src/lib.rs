//! Mason artifact handling
//!
//! Dependency resolution and artifact acquisition for the Mason build tool:
//! artifact coordinates, manifest (POM) parsing with property interpolation,
//! repository abstractions over local caches and remote endpoints, a
//! concurrent downloader with at-most-one-fetch semantics, and the
//! breadth-first dependency graph builder.

pub mod coordinate;
pub mod downloader;
pub mod graph;
pub mod manifest;
pub mod repository;
pub mod resolver;

pub use coordinate::{ArtifactCoordinate, ArtifactKey};
pub use downloader::{
    DownloadError, DownloadHandle, DownloadOutcome, DownloadRequest, Downloader, OverwritePolicy,
};
pub use graph::{DependencyGraph, GraphEdge, GraphNode};
pub use manifest::{
    Dependency, DependencyScope, ExclusionPattern, Manifest, ManifestError, ManifestReader,
};
pub use repository::{
    CacheLayout, FileLocation, LocalRepository, RemoteRepository, Repository, RepositoryError,
};
pub use resolver::{GraphBuilder, Resolution, ResolutionFailure, ResolveError, ResolveResult};
