//! Dependency graph resolution
//!
//! [`GraphBuilder`] turns a root coordinate plus an ordered repository list
//! into a conflict-resolved [`DependencyGraph`]. Resolution is a breadth-first
//! traversal: manifests for one frontier level may be fetched in parallel, but
//! the graph itself is assembled serially in enqueue order, so the outcome is
//! deterministic regardless of fetch concurrency.
//!
//! Conflict policy is nearest-requested-wins: for a (group, identifier) pair
//! the version at the shallowest depth is kept, ties broken by first-seen
//! order (declaration order within a manifest, then repository priority).

use crate::coordinate::{ArtifactCoordinate, ArtifactKey};
use crate::graph::DependencyGraph;
use crate::manifest::{interpolate, Dependency, ExclusionPattern, Manifest, ManifestError};
use crate::repository::{Repository, RepositoryError};
use rayon::prelude::*;
use std::collections::HashSet;
use thiserror::Error;

pub type ResolveResult<T> = Result<T, ResolveError>;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("root coordinate {0} has no version")]
    UnversionedRoot(ArtifactCoordinate),

    #[error("no repository provided a manifest for {0}")]
    ManifestNotFound(ArtifactCoordinate),

    #[error("cycle in manifest parent chain: {chain}")]
    ParentCycle { chain: String },

    #[error("dependency {dependency} declared by {declared_in} has no version and no managed version matches")]
    UnresolvedVersion {
        dependency: ArtifactKey,
        declared_in: ArtifactCoordinate,
    },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A subtree that dropped out of the graph, kept for the final report.
#[derive(Debug)]
pub struct ResolutionFailure {
    /// The coordinate whose subtree was pruned
    pub coordinate: ArtifactCoordinate,
    pub error: ResolveError,
}

/// Outcome of a resolution: the graph plus any pruned subtrees.
#[derive(Debug)]
pub struct Resolution {
    pub graph: DependencyGraph,
    pub failures: Vec<ResolutionFailure>,
}

impl Resolution {
    /// A build with any subtree failure must report an unsuccessful outcome
    /// even though the rest of the graph resolved.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A frontier entry awaiting manifest fetch and finalization.
#[derive(Debug, Clone)]
struct Pending {
    coordinate: ArtifactCoordinate,
    depth: usize,
    /// Exclusions active on the edge that introduced this entry
    exclusions: Vec<ExclusionPattern>,
    /// Ancestor keys on the current resolution path, root first
    path: Vec<ArtifactKey>,
    parent: Option<ArtifactKey>,
}

/// A manifest together with its fetched parent chain, nearest parent first.
#[derive(Debug)]
struct Expanded {
    manifest: Manifest,
    parents: Vec<Manifest>,
}

impl Expanded {
    fn chain(&self) -> Vec<&Manifest> {
        std::iter::once(&self.manifest)
            .chain(self.parents.iter())
            .collect()
    }
}

/// Builds dependency graphs from repository metadata.
pub struct GraphBuilder {
    repositories: Vec<Box<dyn Repository>>,
    parallel_fetch: bool,
}

impl GraphBuilder {
    /// Repositories are queried in the given priority order.
    pub fn new(repositories: Vec<Box<dyn Repository>>) -> Self {
        Self {
            repositories,
            parallel_fetch: true,
        }
    }

    /// Disable level-parallel manifest fetching (fetch serially instead).
    /// The resulting graph is identical either way.
    pub fn with_parallel_fetch(mut self, parallel_fetch: bool) -> Self {
        self.parallel_fetch = parallel_fetch;
        self
    }

    /// Resolve the graph rooted at `root`, applying `root_exclusions` to
    /// every edge out of the root.
    pub fn resolve(
        &self,
        root: &ArtifactCoordinate,
        root_exclusions: &[ExclusionPattern],
    ) -> ResolveResult<Resolution> {
        if !root.is_versioned() {
            return Err(ResolveError::UnversionedRoot(root.clone()));
        }

        let mut graph = DependencyGraph::new();
        let mut failures = Vec::new();

        let mut level = vec![Pending {
            coordinate: root.clone(),
            depth: 0,
            exclusions: root_exclusions.to_vec(),
            path: Vec::new(),
            parent: None,
        }];

        while !level.is_empty() {
            // Parallel I/O feeding a serialized merge: fetch every manifest
            // for this level first, then finalize nodes in enqueue order.
            let fetched: Vec<ResolveResult<Expanded>> = if self.parallel_fetch {
                level
                    .par_iter()
                    .map(|pending| self.fetch_expanded(&pending.coordinate))
                    .collect()
            } else {
                level
                    .iter()
                    .map(|pending| self.fetch_expanded(&pending.coordinate))
                    .collect()
            };

            let mut next = Vec::new();
            for (pending, fetch) in level.into_iter().zip(fetched) {
                self.finalize(pending, fetch, &mut graph, &mut next, &mut failures)?;
            }
            level = next;
        }

        Ok(Resolution { graph, failures })
    }

    /// Finalize one frontier entry: conflict-resolve, record the node and
    /// edge, and enqueue its dependencies.
    fn finalize(
        &self,
        pending: Pending,
        fetch: ResolveResult<Expanded>,
        graph: &mut DependencyGraph,
        next: &mut Vec<Pending>,
        failures: &mut Vec<ResolutionFailure>,
    ) -> ResolveResult<()> {
        let key = pending.coordinate.key();

        // Revisiting a coordinate already on the resolution path would loop;
        // the edge is dropped, not fatal.
        if pending.path.contains(&key) {
            tracing::warn!(artifact = %pending.coordinate, "dependency cycle detected, dropping edge");
            return Ok(());
        }

        // Nearest-requested-wins: BFS order guarantees any existing node sits
        // at the same or a shallower depth, so the newcomer loses.
        if graph.contains(&key) {
            if let Some(parent) = pending.parent {
                graph.insert_edge(parent, key, pending.exclusions);
            }
            return Ok(());
        }

        let expanded = match fetch {
            Ok(expanded) => expanded,
            // A parent-chain cycle poisons the whole resolution
            Err(error @ ResolveError::ParentCycle { .. }) => return Err(error),
            Err(error) => {
                tracing::warn!(artifact = %pending.coordinate, error = %error, "pruning unresolvable subtree");
                failures.push(ResolutionFailure {
                    coordinate: pending.coordinate,
                    error,
                });
                return Ok(());
            }
        };

        graph.insert_node(pending.coordinate.clone(), pending.depth);
        if let Some(parent) = pending.parent.clone() {
            graph.insert_edge(parent, key.clone(), pending.exclusions.clone());
        }

        let chain = expanded.chain();
        for dependency in &expanded.manifest.dependencies {
            match self.expand_dependency(dependency, &chain, &pending.exclusions) {
                Ok(Some(coordinate)) => {
                    let mut exclusions = pending.exclusions.clone();
                    exclusions.extend(dependency.exclusions.iter().cloned());

                    let mut path = pending.path.clone();
                    path.push(key.clone());

                    next.push(Pending {
                        coordinate,
                        depth: pending.depth + 1,
                        exclusions,
                        path,
                        parent: Some(key.clone()),
                    });
                }
                Ok(None) => {} // excluded
                Err(error) => {
                    tracing::warn!(
                        dependency = %dependency.coordinate,
                        declared_in = %pending.coordinate,
                        error = %error,
                        "pruning dependency subtree"
                    );
                    failures.push(ResolutionFailure {
                        coordinate: dependency.coordinate.clone(),
                        error,
                    });
                }
            }
        }

        Ok(())
    }

    /// Interpolate and version-resolve one declared dependency.
    ///
    /// Returns `None` when the dependency matches the active exclusion set.
    fn expand_dependency(
        &self,
        dependency: &Dependency,
        chain: &[&Manifest],
        active_exclusions: &[ExclusionPattern],
    ) -> ResolveResult<Option<ArtifactCoordinate>> {
        let group = interpolate(&dependency.coordinate.group, chain)?;
        let identifier = interpolate(&dependency.coordinate.identifier, chain)?;
        let key = ArtifactKey::new(group.as_str(), identifier.as_str());

        if active_exclusions.iter().any(|pattern| pattern.matches(&key)) {
            tracing::debug!(artifact = %key, "dependency matches exclusion, skipping");
            return Ok(None);
        }

        // Explicit version first; otherwise the nearest managed version, own
        // manifest before the parent chain.
        let version = match &dependency.coordinate.version {
            Some(version) => interpolate(version, chain)?,
            None => {
                let managed = chain
                    .iter()
                    .find_map(|manifest| manifest.managed_version(&key))
                    .ok_or_else(|| ResolveError::UnresolvedVersion {
                        dependency: key.clone(),
                        declared_in: chain[0].coordinate.clone(),
                    })?;
                interpolate(managed, chain)?
            }
        };

        Ok(Some(ArtifactCoordinate::versioned(group, identifier, version)))
    }

    /// Fetch the manifest for `coordinate` and, lazily, its parent chain.
    fn fetch_expanded(&self, coordinate: &ArtifactCoordinate) -> ResolveResult<Expanded> {
        let manifest = self
            .fetch_manifest(coordinate)?
            .ok_or_else(|| ResolveError::ManifestNotFound(coordinate.clone()))?;

        let mut visited: HashSet<ArtifactKey> = HashSet::new();
        visited.insert(manifest.coordinate.key());
        let mut chain_names = vec![manifest.coordinate.to_string()];

        let mut parents = Vec::new();
        let mut current_parent = manifest.parent.clone();
        while let Some(parent_coordinate) = current_parent {
            if !visited.insert(parent_coordinate.key()) {
                chain_names.push(parent_coordinate.to_string());
                return Err(ResolveError::ParentCycle {
                    chain: chain_names.join(" -> "),
                });
            }
            chain_names.push(parent_coordinate.to_string());

            let parent = self
                .fetch_manifest(&parent_coordinate)?
                .ok_or_else(|| ResolveError::ManifestNotFound(parent_coordinate.clone()))?;
            current_parent = parent.parent.clone();
            parents.push(parent);
        }

        Ok(Expanded { manifest, parents })
    }

    /// Query repositories in priority order; first responder wins. A
    /// repository that errors is logged and skipped so a flaky mirror cannot
    /// hide an artifact available further down the list.
    fn fetch_manifest(
        &self,
        coordinate: &ArtifactCoordinate,
    ) -> ResolveResult<Option<Manifest>> {
        for repository in &self.repositories {
            match repository.resolve_manifest(coordinate) {
                Ok(Some(manifest)) => {
                    tracing::debug!(
                        artifact = %coordinate,
                        repository = repository.name(),
                        "manifest resolved"
                    );
                    return Ok(Some(manifest));
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(
                        artifact = %coordinate,
                        repository = repository.name(),
                        error = %error,
                        "repository query failed, trying next"
                    );
                }
            }
        }
        Ok(None)
    }
}
