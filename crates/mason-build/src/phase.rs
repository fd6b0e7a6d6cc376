//! Phase and step state machine
//!
//! A build advances through named phases, each an ordered sequence of steps.
//! One forward-only [`StepCursor`] is owned by the project and handed to
//! whichever phase is active. Every step runs through a run-then-advance
//! wrapper: the cursor moves to the next step exactly once, whether the
//! step's hook succeeds or errors.

use crate::error::{BuildError, Result};
use std::fmt;
use std::marker::PhantomData;

/// An ordered sequence of build steps.
pub trait StepSequence: Copy + Eq + fmt::Debug + 'static {
    const COUNT: usize;

    fn from_ordinal(ordinal: usize) -> Option<Self>;
    fn ordinal(self) -> usize;
    fn label(self) -> &'static str;
}

/// Packaging lifecycle steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackagingStep {
    Initialize,
    Preprocess,
    Compile,
    Postprocess,
    Verify,
}

impl StepSequence for PackagingStep {
    const COUNT: usize = 5;

    fn from_ordinal(ordinal: usize) -> Option<Self> {
        match ordinal {
            0 => Some(Self::Initialize),
            1 => Some(Self::Preprocess),
            2 => Some(Self::Compile),
            3 => Some(Self::Postprocess),
            4 => Some(Self::Verify),
            _ => None,
        }
    }

    fn ordinal(self) -> usize {
        self as usize
    }

    fn label(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Preprocess => "preprocess",
            Self::Compile => "compile",
            Self::Postprocess => "postprocess",
            Self::Verify => "verify",
        }
    }
}

/// Testing lifecycle steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestingStep {
    TestInitialize,
    TestCompile,
    TestPreprocess,
    TestVerify,
}

impl StepSequence for TestingStep {
    const COUNT: usize = 4;

    fn from_ordinal(ordinal: usize) -> Option<Self> {
        match ordinal {
            0 => Some(Self::TestInitialize),
            1 => Some(Self::TestCompile),
            2 => Some(Self::TestPreprocess),
            3 => Some(Self::TestVerify),
            _ => None,
        }
    }

    fn ordinal(self) -> usize {
        self as usize
    }

    fn label(self) -> &'static str {
        match self {
            Self::TestInitialize => "test-initialize",
            Self::TestCompile => "test-compile",
            Self::TestPreprocess => "test-preprocess",
            Self::TestVerify => "test-verify",
        }
    }
}

/// Installation lifecycle steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallationStep {
    PackageInstall,
    PackageDeploy,
}

impl StepSequence for InstallationStep {
    const COUNT: usize = 2;

    fn from_ordinal(ordinal: usize) -> Option<Self> {
        match ordinal {
            0 => Some(Self::PackageInstall),
            1 => Some(Self::PackageDeploy),
            _ => None,
        }
    }

    fn ordinal(self) -> usize {
        self as usize
    }

    fn label(self) -> &'static str {
        match self {
            Self::PackageInstall => "package-install",
            Self::PackageDeploy => "package-deploy",
        }
    }
}

/// Forward-only ordinal cursor over the build's steps.
///
/// Owned by the project; phases read and advance it but never rewind it.
/// [`StepCursor::reset`] is the one explicit rewind path, reserved for the
/// owning project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepCursor {
    position: usize,
}

impl StepCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> usize {
        self.position
    }

    pub fn advance(&mut self) {
        self.position += 1;
        tracing::trace!(position = self.position, "step cursor advanced");
    }

    /// Explicit rewind to the first step; only the owning project calls this.
    pub fn reset(&mut self) {
        self.position = 0;
    }
}

/// Run-then-advance: advancing the cursor is the guaranteed release action,
/// performed on drop so an erroring hook cannot skip it.
struct AdvanceGuard<'a> {
    cursor: &'a mut StepCursor,
}

impl Drop for AdvanceGuard<'_> {
    fn drop(&mut self) {
        self.cursor.advance();
    }
}

/// Step execution capability for one step sequence.
///
/// Implemented via the per-phase hook traits ([`PackagingHooks`],
/// [`TestingHooks`], [`InstallationHooks`]); every hook defaults to a no-op
/// so a build customizes only the steps it cares about.
pub trait StepHooks<S: StepSequence> {
    fn run(&mut self, step: S) -> Result<()>;
}

pub trait PackagingHooks {
    fn on_initialize(&mut self) -> Result<()> {
        Ok(())
    }
    fn on_preprocess(&mut self) -> Result<()> {
        Ok(())
    }
    fn on_compile(&mut self) -> Result<()> {
        Ok(())
    }
    fn on_postprocess(&mut self) -> Result<()> {
        Ok(())
    }
    fn on_verify(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: PackagingHooks> StepHooks<PackagingStep> for T {
    fn run(&mut self, step: PackagingStep) -> Result<()> {
        match step {
            PackagingStep::Initialize => self.on_initialize(),
            PackagingStep::Preprocess => self.on_preprocess(),
            PackagingStep::Compile => self.on_compile(),
            PackagingStep::Postprocess => self.on_postprocess(),
            PackagingStep::Verify => self.on_verify(),
        }
    }
}

pub trait TestingHooks {
    fn on_test_initialize(&mut self) -> Result<()> {
        Ok(())
    }
    fn on_test_compile(&mut self) -> Result<()> {
        Ok(())
    }
    fn on_test_preprocess(&mut self) -> Result<()> {
        Ok(())
    }
    fn on_test_verify(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: TestingHooks> StepHooks<TestingStep> for T {
    fn run(&mut self, step: TestingStep) -> Result<()> {
        match step {
            TestingStep::TestInitialize => self.on_test_initialize(),
            TestingStep::TestCompile => self.on_test_compile(),
            TestingStep::TestPreprocess => self.on_test_preprocess(),
            TestingStep::TestVerify => self.on_test_verify(),
        }
    }
}

pub trait InstallationHooks {
    fn on_package_install(&mut self) -> Result<()> {
        Ok(())
    }
    fn on_package_deploy(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: InstallationHooks> StepHooks<InstallationStep> for T {
    fn run(&mut self, step: InstallationStep) -> Result<()> {
        match step {
            InstallationStep::PackageInstall => self.on_package_install(),
            InstallationStep::PackageDeploy => self.on_package_deploy(),
        }
    }
}

/// One lifecycle phase, occupying a contiguous ordinal range of the build's
/// shared cursor starting at `base`.
#[derive(Debug, Clone)]
pub struct Phase<S: StepSequence> {
    base: usize,
    _steps: PhantomData<S>,
}

impl<S: StepSequence> Phase<S> {
    pub fn new(base: usize) -> Self {
        Self {
            base,
            _steps: PhantomData,
        }
    }

    /// The step the cursor currently points at, if it is inside this phase
    pub fn current_step(&self, cursor: &StepCursor) -> Option<S> {
        cursor
            .current()
            .checked_sub(self.base)
            .and_then(S::from_ordinal)
    }

    /// Whether the cursor has moved past this phase's last step
    pub fn is_complete(&self, cursor: &StepCursor) -> bool {
        cursor.current() >= self.base + S::COUNT
    }

    /// Execute the current step's hook and advance the cursor.
    ///
    /// The cursor advances exactly once even when the hook errors; the error
    /// is surfaced as a [`BuildError::StepFailure`]. A cursor outside this
    /// phase's range is left untouched.
    pub fn run_step(&self, cursor: &mut StepCursor, hooks: &mut dyn StepHooks<S>) -> Result<()> {
        let Some(step) = self.current_step(cursor) else {
            return Ok(());
        };

        tracing::debug!(step = step.label(), "running build step");
        let _guard = AdvanceGuard { cursor };
        hooks
            .run(step)
            .map_err(|error| BuildError::step_failure(step.label(), error))
    }

    /// Drive every remaining step of this phase, collecting step failures.
    ///
    /// A failing step never prevents the following steps from running.
    pub fn run_to_completion(
        &self,
        cursor: &mut StepCursor,
        hooks: &mut dyn StepHooks<S>,
    ) -> Vec<BuildError> {
        let mut failures = Vec::new();
        while self.current_step(cursor).is_some() {
            if let Err(error) = self.run_step(cursor, hooks) {
                tracing::warn!(error = %error, "build step failed");
                failures.push(error);
            }
        }
        failures
    }
}
