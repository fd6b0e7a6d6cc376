//! Mason build orchestration
//!
//! The lifecycle half of the Mason build tool: projects advance a single
//! forward-only step cursor through packaging, testing and installation
//! phases, while builders execute groups of independent buildables in
//! parallel and deliver per-unit results as they complete. Sequencing across
//! groups is expressed as a [`BuildPlan`] of ordered stages.

pub mod buildable;
pub mod builder;
pub mod error;
pub mod phase;
pub mod plan;
pub mod project;

pub use buildable::{
    BuildListener, BuildResult, Buildable, BuildableGroup, CollectingListener, Outcome,
};
pub use builder::{Builder, ParallelBuilder, RemoteBuilder};
pub use error::{BuildError, Result};
pub use phase::{
    InstallationHooks, InstallationStep, PackagingHooks, PackagingStep, Phase, StepCursor,
    StepHooks, StepSequence, TestingHooks, TestingStep,
};
pub use plan::{BuildPlan, PlanOutcome};
pub use project::{
    BuildDefinition, BuildDefinitionLoader, LifecyclePhase, Project, TOTAL_STEPS,
};
