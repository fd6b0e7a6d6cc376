//! Full build lifecycle integration: projects, phases and the shared cursor.

use mason_build::*;
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};

/// Definition that journals every hook it runs into a shared log.
#[derive(Clone, Default)]
struct Journaling {
    log: Arc<Mutex<Vec<&'static str>>>,
    fail_on: Option<&'static str>,
}

impl Journaling {
    fn record(&mut self, label: &'static str) -> Result<()> {
        self.log.lock().unwrap().push(label);
        if self.fail_on == Some(label) {
            return Err(BuildError::BuildFailed(format!("{label} broke")));
        }
        Ok(())
    }

    fn entries(&self) -> Vec<&'static str> {
        self.log.lock().unwrap().clone()
    }
}

impl PackagingHooks for Journaling {
    fn on_initialize(&mut self) -> Result<()> {
        self.record("initialize")
    }
    fn on_preprocess(&mut self) -> Result<()> {
        self.record("preprocess")
    }
    fn on_compile(&mut self) -> Result<()> {
        self.record("compile")
    }
    fn on_postprocess(&mut self) -> Result<()> {
        self.record("postprocess")
    }
    fn on_verify(&mut self) -> Result<()> {
        self.record("verify")
    }
}

impl TestingHooks for Journaling {
    fn on_test_initialize(&mut self) -> Result<()> {
        self.record("test-initialize")
    }
    fn on_test_compile(&mut self) -> Result<()> {
        self.record("test-compile")
    }
    fn on_test_preprocess(&mut self) -> Result<()> {
        self.record("test-preprocess")
    }
    fn on_test_verify(&mut self) -> Result<()> {
        self.record("test-verify")
    }
}

impl InstallationHooks for Journaling {
    fn on_package_install(&mut self) -> Result<()> {
        self.record("package-install")
    }
    fn on_package_deploy(&mut self) -> Result<()> {
        self.record("package-deploy")
    }
}

const FULL_ORDER: [&str; 11] = [
    "initialize",
    "preprocess",
    "compile",
    "postprocess",
    "verify",
    "test-initialize",
    "test-compile",
    "test-preprocess",
    "test-verify",
    "package-install",
    "package-deploy",
];

#[test]
fn test_every_step_runs_exactly_once_in_lifecycle_order() {
    let definition = Journaling::default();
    let log = definition.clone();
    let mut project = Project::new("app", definition);

    let failures = project.run_to_completion();
    assert!(failures.is_empty());
    assert!(project.is_complete());
    assert_eq!(log.entries(), FULL_ORDER);
}

#[test]
fn test_single_stepping_crosses_phase_boundaries() {
    let definition = Journaling::default();
    let log = definition.clone();
    let mut project = Project::new("app", definition);

    // Step through packaging one call at a time
    for _ in 0..PackagingStep::COUNT {
        assert_eq!(project.current_phase(), LifecyclePhase::Packaging);
        project.run_step().unwrap();
    }
    assert_eq!(project.current_phase(), LifecyclePhase::Testing);

    // Remaining steps in one go
    while !project.is_complete() {
        project.run_step().unwrap();
    }
    assert_eq!(log.entries(), FULL_ORDER);
}

#[test]
fn test_failures_are_collected_without_stalling() {
    let definition = Journaling {
        fail_on: Some("test-compile"),
        ..Default::default()
    };
    let log = definition.clone();
    let mut project = Project::new("app", definition);

    let failures = project.run_to_completion();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].to_string().contains("test-compile"));
    assert!(project.is_complete());
    // Every step after the failure still ran
    assert_eq!(log.entries(), FULL_ORDER);
}

#[test]
fn test_reset_reruns_the_whole_lifecycle() {
    let definition = Journaling::default();
    let log = definition.clone();
    let mut project = Project::new("app", definition);

    project.run_to_completion();
    project.reset();
    project.run_to_completion();

    assert_eq!(log.entries().len(), FULL_ORDER.len() * 2);
    assert_eq!(&log.entries()[FULL_ORDER.len()..], FULL_ORDER);
}

#[test]
fn test_total_steps_covers_all_phases() {
    assert_eq!(
        TOTAL_STEPS,
        PackagingStep::COUNT + TestingStep::COUNT + InstallationStep::COUNT
    );
    assert_eq!(TOTAL_STEPS, FULL_ORDER.len());
}
