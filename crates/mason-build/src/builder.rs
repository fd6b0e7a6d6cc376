//! Builders: execute a group of buildables and report results
//!
//! [`ParallelBuilder`] runs every buildable of a group on a worker pool and
//! delivers each result to the listener the moment it completes, so a slow
//! buildable never delays the results of faster ones. One failing buildable
//! never aborts the rest of its group.

use crate::buildable::{BuildListener, BuildResult, Buildable, BuildableGroup};
use crate::error::{BuildError, Result};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;

/// Executes a [`BuildableGroup`], reporting one result per buildable.
pub trait Builder {
    /// Invoke the listener exactly once per buildable before returning.
    /// Delivery order is unspecified.
    fn build(&self, group: &BuildableGroup, listener: &dyn BuildListener) -> Result<()>;
}

fn execute_one(buildable: &dyn Buildable) -> BuildResult {
    let outcome = catch_unwind(AssertUnwindSafe(|| buildable.execute()));
    match outcome {
        Ok(Ok(())) => BuildResult::success(buildable.id()),
        Ok(Err(error)) => BuildResult::failure(buildable.id(), error.to_string()),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "buildable panicked".to_string());
            BuildResult::failure(buildable.id(), message)
        }
    }
}

/// Runs buildables on a dedicated worker pool, draining results in
/// completion order.
pub struct ParallelBuilder {
    pool: rayon::ThreadPool,
}

impl ParallelBuilder {
    /// Pool sized to the available processing units
    pub fn new() -> Result<Self> {
        Self::with_workers(0)
    }

    /// Pool with an explicit worker count (`0` = available processing units)
    pub fn with_workers(workers: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|error| BuildError::BuildFailed(error.to_string()))?;
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl Builder for ParallelBuilder {
    fn build(&self, group: &BuildableGroup, listener: &dyn BuildListener) -> Result<()> {
        let (sender, receiver) = mpsc::channel::<BuildResult>();

        // in_place_scope keeps the drain below on the caller's thread while
        // the workers execute buildables, so a single-worker pool cannot
        // deadlock against the receive loop.
        self.pool.in_place_scope(|scope| {
            for buildable in group.iter() {
                let sender = sender.clone();
                scope.spawn(move |_| {
                    let result = execute_one(buildable.as_ref());
                    // The receiver outlives the scope; send cannot fail here
                    let _ = sender.send(result);
                });
            }
            drop(sender);

            // Completion-order drain: deliver each result as its worker
            // finishes, while the remaining buildables are still running.
            for result in receiver.iter() {
                tracing::debug!(
                    buildable = %result.id,
                    success = result.is_success(),
                    "buildable finished"
                );
                listener.on_build_result(&result);
            }
        });

        Ok(())
    }
}

/// Delegates execution to a remote compute resource.
///
/// No remote backend is integrated; every buildable fails fast with an
/// explicit unsupported-operation diagnostic, and the listener still receives
/// exactly one result per buildable.
pub struct RemoteBuilder {
    endpoint: String,
}

impl RemoteBuilder {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Builder for RemoteBuilder {
    fn build(&self, group: &BuildableGroup, listener: &dyn BuildListener) -> Result<()> {
        let diagnostic =
            BuildError::unsupported(format!("remote execution via '{}'", self.endpoint));
        for buildable in group.iter() {
            listener.on_build_result(&BuildResult::failure(
                buildable.id(),
                diagnostic.to_string(),
            ));
        }
        Ok(())
    }
}
