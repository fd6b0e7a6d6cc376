//! Build plans: ordered stages of grouped work
//!
//! A [`BuildPlan`] is a sequence of (group, builder) stages executed strictly
//! in order: stage N+1 does not start until stage N's `build` call returns.
//! Parallelism happens only inside a stage, via whichever builder it uses.

use crate::buildable::{BuildListener, BuildResult, BuildableGroup};
use crate::builder::Builder;
use crate::error::Result;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Stage {
    group: BuildableGroup,
    builder: Box<dyn Builder>,
}

/// Overall result of executing a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOutcome {
    /// Results delivered across all stages
    pub total: usize,
    /// Failed results across all stages
    pub failures: usize,
}

impl PlanOutcome {
    /// Any failed buildable makes the whole plan unsuccessful
    pub fn is_success(&self) -> bool {
        self.failures == 0
    }
}

/// An ordered list of buildable groups, each with its chosen builder.
#[derive(Default)]
pub struct BuildPlan {
    stages: Vec<Stage>,
}

impl BuildPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stage(&mut self, group: BuildableGroup, builder: Box<dyn Builder>) {
        self.stages.push(Stage { group, builder });
    }

    pub fn with_stage(mut self, group: BuildableGroup, builder: Box<dyn Builder>) -> Self {
        self.add_stage(group, builder);
        self
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Execute every stage in order, forwarding each result to `listener`.
    pub fn execute(&self, listener: &dyn BuildListener) -> Result<PlanOutcome> {
        let tally = TallyListener {
            inner: listener,
            total: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        };

        for (index, stage) in self.stages.iter().enumerate() {
            tracing::info!(
                stage = index + 1,
                stages = self.stages.len(),
                buildables = stage.group.len(),
                "executing build stage"
            );
            stage.builder.build(&stage.group, &tally)?;
        }

        Ok(PlanOutcome {
            total: tally.total.into_inner(),
            failures: tally.failures.into_inner(),
        })
    }
}

/// Forwards results while counting them for the plan outcome.
struct TallyListener<'a> {
    inner: &'a dyn BuildListener,
    total: AtomicUsize,
    failures: AtomicUsize,
}

impl BuildListener for TallyListener<'_> {
    fn on_build_result(&self, result: &BuildResult) {
        self.total.fetch_add(1, Ordering::SeqCst);
        if !result.is_success() {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.on_build_result(result);
    }
}
