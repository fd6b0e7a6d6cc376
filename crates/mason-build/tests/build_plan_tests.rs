//! Resolving a dependency graph and building its artifacts through a plan.

use mason_artifact::{
    ArtifactCoordinate, ArtifactKey, GraphBuilder, LocalRepository, Repository,
};
use mason_build::*;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn install_pom(root: &Path, group: &str, id: &str, version: &str, body: &str) {
    let dir = root.join(group.replace('.', "/")).join(id).join(version);
    fs::create_dir_all(&dir).unwrap();
    let xml = format!(
        "<project>\n  <groupId>{group}</groupId>\n  <artifactId>{id}</artifactId>\n  <version>{version}</version>\n{body}\n</project>"
    );
    fs::write(dir.join(format!("{id}-{version}.pom")), xml).unwrap();
}

fn dep(group: &str, id: &str, version: &str) -> String {
    format!(
        "<dependency><groupId>{group}</groupId><artifactId>{id}</artifactId><version>{version}</version></dependency>"
    )
}

fn seed(root: &Path) {
    install_pom(
        root,
        "com.example",
        "app",
        "1.0",
        &format!(
            "<dependencies>{}{}</dependencies>",
            dep("com.example", "core", "1.0"),
            dep("com.example", "extras", "1.0")
        ),
    );
    install_pom(root, "com.example", "core", "1.0", "");
    install_pom(root, "com.example", "extras", "1.0", "");
}

#[test]
fn test_group_from_resolved_graph_builds_every_artifact() {
    let repo_dir = TempDir::new().unwrap();
    seed(repo_dir.path());
    let cache_dir = TempDir::new().unwrap();

    let builder = GraphBuilder::new(vec![Box::new(LocalRepository::new(
        "fixture",
        repo_dir.path(),
    ))]);
    let resolution = builder
        .resolve(
            &ArtifactCoordinate::versioned("com.example", "app", "1.0"),
            &[],
        )
        .unwrap();
    assert!(resolution.is_success());

    // The build action installs a placeholder artifact into the cache
    let cache = Arc::new(LocalRepository::new("cache", cache_dir.path()));
    let group = BuildableGroup::from_graph(&resolution.graph, {
        let cache = cache.clone();
        move |coordinate| {
            cache
                .install(coordinate, "jar", coordinate.to_string().as_bytes())
                .map(|_| ())
                .map_err(|error| BuildError::BuildFailed(error.to_string()))
        }
    });
    assert_eq!(group.len(), 3);

    let listener = CollectingListener::new();
    let parallel = ParallelBuilder::with_workers(2).unwrap();
    parallel.build(&group, &listener).unwrap();

    assert_eq!(listener.results().len(), 3);
    assert_eq!(listener.failure_count(), 0);

    for key in [
        ArtifactKey::new("com.example", "app"),
        ArtifactKey::new("com.example", "core"),
        ArtifactKey::new("com.example", "extras"),
    ] {
        let coordinate = resolution.graph.get(&key).unwrap().coordinate.clone();
        assert!(cache.resolve_file(&coordinate, "jar").unwrap().is_some());
    }
}

#[test]
fn test_plan_runs_dependency_stage_before_packaging_stage() {
    let repo_dir = TempDir::new().unwrap();
    seed(repo_dir.path());
    let output_dir = TempDir::new().unwrap();

    let builder = GraphBuilder::new(vec![Box::new(LocalRepository::new(
        "fixture",
        repo_dir.path(),
    ))]);
    let resolution = builder
        .resolve(
            &ArtifactCoordinate::versioned("com.example", "app", "1.0"),
            &[],
        )
        .unwrap();

    // Stage 1 materializes dependencies; stage 2 packages against them
    let materialized = output_dir.path().join("deps");
    let deps_stage = BuildableGroup::from_graph(&resolution.graph, {
        let materialized = materialized.clone();
        move |coordinate| {
            fs::create_dir_all(&materialized)
                .map_err(|error| BuildError::io(&materialized, error))?;
            let jar = materialized.join(format!("{}.jar", coordinate.identifier));
            fs::write(&jar, coordinate.to_string()).map_err(|error| BuildError::io(&jar, error))
        }
    });

    struct Package {
        deps: std::path::PathBuf,
        out: std::path::PathBuf,
    }
    impl Buildable for Package {
        fn id(&self) -> &str {
            "package"
        }
        fn execute(&self) -> Result<()> {
            // All three dependency jars must already exist
            let count = fs::read_dir(&self.deps)
                .map_err(|error| BuildError::io(&self.deps, error))?
                .count();
            if count != 3 {
                return Err(BuildError::BuildFailed(format!(
                    "expected 3 dependencies, found {count}"
                )));
            }
            fs::write(&self.out, b"packaged").map_err(|error| BuildError::io(&self.out, error))
        }
    }

    let out = output_dir.path().join("app.jar");
    let package_stage = BuildableGroup::new().with(Box::new(Package {
        deps: materialized,
        out: out.clone(),
    }));

    let plan = BuildPlan::new()
        .with_stage(deps_stage, Box::new(ParallelBuilder::with_workers(3).unwrap()))
        .with_stage(package_stage, Box::new(ParallelBuilder::new().unwrap()));

    let listener = CollectingListener::new();
    let outcome = plan.execute(&listener).unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.total, 4);
    assert_eq!(fs::read(&out).unwrap(), b"packaged");
}

#[test]
fn test_remote_stage_failures_surface_in_plan_outcome() {
    let group = BuildableGroup::new().with(Box::new(Trivial("only")));

    let plan = BuildPlan::new().with_stage(group, Box::new(RemoteBuilder::new("farm:7777")));
    let listener = CollectingListener::new();
    let outcome = plan.execute(&listener).unwrap();

    assert!(!outcome.is_success());
    assert_eq!(outcome.failures, 1);
}

struct Trivial(&'static str);

impl Buildable for Trivial {
    fn id(&self) -> &str {
        self.0
    }
    fn execute(&self) -> Result<()> {
        Ok(())
    }
}
