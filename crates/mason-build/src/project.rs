//! Project: the owner of the build lifecycle
//!
//! A [`Project`] holds the single [`StepCursor`] for a build and the three
//! lifecycle phases laid out over it: packaging, then testing, then
//! installation. Phases never own the cursor; they borrow it from the project
//! for the duration of a run call, which is what keeps the whole build on one
//! forward-only position.

use crate::error::{BuildError, Result};
use crate::phase::{
    InstallationHooks, InstallationStep, PackagingHooks, PackagingStep, Phase, StepCursor,
    StepSequence, TestingHooks, TestingStep,
};
use std::path::Path;

/// Total step count across all three phases.
pub const TOTAL_STEPS: usize = PackagingStep::COUNT + TestingStep::COUNT + InstallationStep::COUNT;

/// The hook surface a project drives: one implementor covers all three phases.
///
/// Blanket-implemented for anything providing the per-phase hook traits, each
/// of which defaults every hook to a no-op.
pub trait BuildDefinition: PackagingHooks + TestingHooks + InstallationHooks {}

impl<T: PackagingHooks + TestingHooks + InstallationHooks> BuildDefinition for T {}

/// Produces a build definition from a project directory.
pub trait BuildDefinitionLoader {
    type Definition: BuildDefinition;

    fn load(&self, directory: &Path) -> Result<Self::Definition>;
}

/// Which lifecycle phase the cursor currently sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Packaging,
    Testing,
    Installation,
    Complete,
}

/// A named build with its definition and lifecycle state.
pub struct Project<D: BuildDefinition> {
    name: String,
    definition: D,
    cursor: StepCursor,
    packaging: Phase<PackagingStep>,
    testing: Phase<TestingStep>,
    installation: Phase<InstallationStep>,
}

impl<D: BuildDefinition> Project<D> {
    pub fn new(name: impl Into<String>, definition: D) -> Self {
        Self {
            name: name.into(),
            definition,
            cursor: StepCursor::new(),
            packaging: Phase::new(0),
            testing: Phase::new(PackagingStep::COUNT),
            installation: Phase::new(PackagingStep::COUNT + TestingStep::COUNT),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &D {
        &self.definition
    }

    pub fn definition_mut(&mut self) -> &mut D {
        &mut self.definition
    }

    /// Ordinal of the next step to run, across all phases
    pub fn position(&self) -> usize {
        self.cursor.current()
    }

    /// The phase the next step belongs to
    pub fn current_phase(&self) -> LifecyclePhase {
        if !self.packaging.is_complete(&self.cursor) {
            LifecyclePhase::Packaging
        } else if !self.testing.is_complete(&self.cursor) {
            LifecyclePhase::Testing
        } else if !self.installation.is_complete(&self.cursor) {
            LifecyclePhase::Installation
        } else {
            LifecyclePhase::Complete
        }
    }

    pub fn is_complete(&self) -> bool {
        self.cursor.current() >= TOTAL_STEPS
    }

    /// Run the next step, whichever phase it belongs to.
    ///
    /// The cursor advances exactly once per call until the build is complete;
    /// a step failure is returned but never stalls the position.
    pub fn run_step(&mut self) -> Result<()> {
        match self.current_phase() {
            LifecyclePhase::Packaging => self
                .packaging
                .run_step(&mut self.cursor, &mut self.definition),
            LifecyclePhase::Testing => {
                self.testing.run_step(&mut self.cursor, &mut self.definition)
            }
            LifecyclePhase::Installation => self
                .installation
                .run_step(&mut self.cursor, &mut self.definition),
            LifecyclePhase::Complete => Ok(()),
        }
    }

    /// Drive the remaining packaging steps, collecting step failures.
    pub fn run_packaging(&mut self) -> Vec<BuildError> {
        self.packaging
            .run_to_completion(&mut self.cursor, &mut self.definition)
    }

    /// Drive the remaining testing steps, collecting step failures.
    ///
    /// A no-op while the cursor is still inside the packaging phase.
    pub fn run_testing(&mut self) -> Vec<BuildError> {
        self.testing
            .run_to_completion(&mut self.cursor, &mut self.definition)
    }

    /// Drive the remaining installation steps, collecting step failures.
    pub fn run_installation(&mut self) -> Vec<BuildError> {
        self.installation
            .run_to_completion(&mut self.cursor, &mut self.definition)
    }

    /// Run every remaining step of the build, phase by phase.
    pub fn run_to_completion(&mut self) -> Vec<BuildError> {
        tracing::info!(project = %self.name, "running build lifecycle");
        let mut failures = self.run_packaging();
        failures.extend(self.run_testing());
        failures.extend(self.run_installation());
        failures
    }

    /// Rewind the build to its first step. The one sanctioned rewind path.
    pub fn reset(&mut self) {
        tracing::debug!(project = %self.name, "resetting build lifecycle");
        self.cursor.reset();
    }
}
