//! Units of build work and their results

use crate::error::Result;
use mason_artifact::{ArtifactCoordinate, DependencyGraph};
use std::fmt;
use std::sync::{Arc, Mutex};

/// One independently executable unit of build work.
///
/// Buildables within a group must not share mutable state; the builders rely
/// on that caller invariant when running them concurrently.
pub trait Buildable: Send + Sync {
    fn id(&self) -> &str;
    fn execute(&self) -> Result<()>;
}

/// A set of independent work items executed together by a builder.
#[derive(Default)]
pub struct BuildableGroup {
    items: Vec<Box<dyn Buildable>>,
}

impl BuildableGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, buildable: Box<dyn Buildable>) {
        self.items.push(buildable);
    }

    pub fn with(mut self, buildable: Box<dyn Buildable>) -> Self {
        self.add(buildable);
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Box<dyn Buildable>> {
        self.items.iter()
    }

    /// One buildable per resolved artifact in the graph, each running the
    /// supplied action for its coordinate.
    pub fn from_graph<F>(graph: &DependencyGraph, action: F) -> Self
    where
        F: Fn(&ArtifactCoordinate) -> Result<()> + Send + Sync + 'static,
    {
        let action: Arc<dyn Fn(&ArtifactCoordinate) -> Result<()> + Send + Sync> =
            Arc::new(action);
        let mut group = Self::new();
        for node in graph.nodes() {
            group.add(Box::new(ArtifactBuildable {
                id: node.coordinate.to_string(),
                coordinate: node.coordinate.clone(),
                action: action.clone(),
            }));
        }
        group
    }
}

impl fmt::Debug for BuildableGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildableGroup")
            .field("len", &self.items.len())
            .finish()
    }
}

impl FromIterator<Box<dyn Buildable>> for BuildableGroup {
    fn from_iter<I: IntoIterator<Item = Box<dyn Buildable>>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// Buildable wrapping one resolved artifact coordinate.
struct ArtifactBuildable {
    id: String,
    coordinate: ArtifactCoordinate,
    action: Arc<dyn Fn(&ArtifactCoordinate) -> Result<()> + Send + Sync>,
}

impl Buildable for ArtifactBuildable {
    fn id(&self) -> &str {
        &self.id
    }

    fn execute(&self) -> Result<()> {
        (self.action)(&self.coordinate)
    }
}

/// Success or failure of one buildable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Produced exactly once per buildable.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildResult {
    pub id: String,
    pub outcome: Outcome,
    pub diagnostic: Option<String>,
}

impl BuildResult {
    pub fn success(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            outcome: Outcome::Success,
            diagnostic: None,
        }
    }

    pub fn failure(id: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            outcome: Outcome::Failure,
            diagnostic: Some(diagnostic.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

/// Receives each buildable's result as it completes.
///
/// Delivery order within a group is unspecified; listeners must only rely on
/// receiving exactly one result per buildable.
pub trait BuildListener: Send + Sync {
    fn on_build_result(&self, result: &BuildResult);
}

/// Listener that accumulates every delivered result.
#[derive(Debug, Default)]
pub struct CollectingListener {
    results: Mutex<Vec<BuildResult>>,
}

impl CollectingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<BuildResult> {
        self.results.lock().expect("listener poisoned").clone()
    }

    pub fn failure_count(&self) -> usize {
        self.results
            .lock()
            .expect("listener poisoned")
            .iter()
            .filter(|result| !result.is_success())
            .count()
    }
}

impl BuildListener for CollectingListener {
    fn on_build_result(&self, result: &BuildResult) {
        self.results
            .lock()
            .expect("listener poisoned")
            .push(result.clone());
    }
}
