//! Lifecycle manager tests against an in-memory container runtime and
//! scripted HTTP client. The project fixture lives in a temp directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stackprobe_core::StackprobeConfig;
use stackprobe_core::config::ServiceEndpoint;
use stackprobe_deploy::{
    ContainerRecord, ContainerRuntime, DeployError, DeploymentManager, DeploymentStage,
    EnvFileSource,
};
use stackprobe_readiness::{HttpClient, HttpResponse, ProbeError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Mocks
// =============================================================================

#[derive(Default)]
struct MockRuntime {
    existing_volumes: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    hang_on_up: bool,
    up_started: Notify,
}

impl MockRuntime {
    fn with_existing(names: &[&str]) -> Self {
        let runtime = Self::default();
        runtime
            .existing_volumes
            .lock()
            .unwrap()
            .extend(names.iter().map(|n| (*n).to_owned()));
        runtime
    }

    fn hanging() -> Self {
        Self {
            hang_on_up: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn called(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ContainerRuntime for MockRuntime {
    async fn ping(&self) -> Result<(), DeployError> {
        self.record("ping".to_owned());
        Ok(())
    }

    async fn create_volume(&self, name: &str) -> Result<(), DeployError> {
        self.record(format!("create_volume {name}"));
        let mut existing = self.existing_volumes.lock().unwrap();
        if !existing.insert(name.to_owned()) {
            return Err(DeployError::Volume {
                name: name.to_owned(),
                reason: "already exists".to_owned(),
            });
        }
        Ok(())
    }

    async fn remove_volume(&self, name: &str) -> Result<(), DeployError> {
        self.record(format!("remove_volume {name}"));
        self.existing_volumes.lock().unwrap().remove(name);
        Ok(())
    }

    async fn compose_up(&self, project_dir: &Path, _timeout: Duration) -> Result<(), DeployError> {
        assert!(project_dir.join(".env").is_file());
        self.record("compose_up".to_owned());
        self.up_started.notify_one();
        if self.hang_on_up {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn compose_ps(&self, _project_dir: &Path) -> Result<Vec<ContainerRecord>, DeployError> {
        self.record("compose_ps".to_owned());
        Ok(["synapse", "postgres", "element", "coturn"]
            .iter()
            .map(|s| ContainerRecord {
                name: format!("voice-stack-{s}-1"),
                service: (*s).to_owned(),
                state: "running".to_owned(),
            })
            .collect())
    }

    async fn compose_down(&self, _project_dir: &Path, _timeout: Duration) -> Result<(), DeployError> {
        self.record("compose_down".to_owned());
        Ok(())
    }
}

/// Healthy stack unless a URL is listed in `failing`.
#[derive(Default)]
struct StackHttp {
    failing: HashSet<String>,
}

impl HttpClient for StackHttp {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<HttpResponse, ProbeError> {
        if self.failing.contains(url) {
            return Ok(HttpResponse::new(503, "unavailable"));
        }
        if url.ends_with("/_matrix/client/versions") {
            return Ok(HttpResponse::new(200, r#"{"versions":["v1.1","v1.2"]}"#));
        }
        Ok(HttpResponse::new(200, "<html><title>Element</title></html>"))
    }
}

// =============================================================================
// Fixtures
// =============================================================================

const VOLUMES: [&str; 5] = [
    "voice-stack_postgres_data",
    "voice-stack_synapse_data",
    "voice-stack_media_store",
    "voice-stack_element_data",
    "voice-stack_coturn_data",
];

fn manifest(with_volumes: bool) -> String {
    let mut raw = String::from(
        "services:\n  synapse: {image: \"matrixdotorg/synapse:v1.98.0\"}\n  postgres: {image: \"postgres:15\"}\n  element: {image: \"vectorim/element-web:v1.11.50\"}\n  coturn: {image: \"coturn/coturn:4.6\"}\nnetworks:\n  matrix: {}\n",
    );
    if with_volumes {
        raw.push_str("volumes:\n");
        for (i, name) in VOLUMES.iter().enumerate() {
            raw.push_str(&format!("  v{i}:\n    external: true\n    name: {name}\n"));
        }
    }
    raw
}

fn project(with_volumes: bool) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::write(root.join("docker-compose.yml"), manifest(with_volumes)).unwrap();
    std::fs::write(root.join("deploy.sh"), "#!/bin/sh\n").unwrap();
    std::fs::write(root.join(".env.clean"), "SYNAPSE_SERVER_NAME=test.local\n").unwrap();
    std::fs::write(root.join(".env"), "POSTGRES_PASSWORD=real-secret\n").unwrap();
    std::fs::create_dir_all(root.join("tests")).unwrap();
    std::fs::write(root.join("tests/test_synapse_api.py"), "").unwrap();
    dir
}

fn config(project: &Path) -> StackprobeConfig {
    let mut config = StackprobeConfig::default();
    config.deploy.project_root = project.display().to_string();
    config.deploy.workspace_prefix = "stackprobe-lifecycle-test".to_owned();
    config
}

fn manager(
    runtime: Arc<MockRuntime>,
    http: StackHttp,
    config: &StackprobeConfig,
) -> DeploymentManager<MockRuntime, StackHttp> {
    DeploymentManager::new(runtime, Arc::new(http), config)
}

// =============================================================================
// Full cycle
// =============================================================================

#[tokio::test]
async fn full_cycle_reaches_functional_checks_and_cleans_up() {
    let project = project(true);
    let runtime = Arc::new(MockRuntime::default());
    let mut manager = manager(Arc::clone(&runtime), StackHttp::default(), &config(project.path()));

    let record = manager
        .run_cycle(DeploymentStage::FunctionalChecked, &CancellationToken::new())
        .await;

    assert!(record.succeeded(), "{:?}", record.error);
    assert_eq!(record.reached, DeploymentStage::FunctionalChecked);
    assert_eq!(record.final_stage, DeploymentStage::TornDown);
    assert_eq!(manager.stage(), DeploymentStage::TornDown);

    let configure = record.configure.as_ref().unwrap();
    assert_eq!(configure.env_source, EnvFileSource::Template);
    assert!(configure.missing_artifacts.is_empty());
    assert!(configure.copy.skipped_top_level.contains(&"tests".to_owned()));
    assert!(configure.copy.skipped_top_level.contains(&".env".to_owned()));

    assert_eq!(record.volumes.as_ref().unwrap().created.len(), 5);
    assert_eq!(record.containers.len(), 4);
    assert_eq!(record.readiness.len(), 4);
    assert!(record.readiness.iter().all(|r| r.ready));
    assert_eq!(record.smoke.as_ref().unwrap().passed_count(), 3);

    let teardown = record.teardown.as_ref().unwrap();
    assert!(teardown.stack_stopped);
    assert!(teardown.workspace_removed);
    assert_eq!(teardown.volumes_removed.len(), 5);
    assert!(teardown.errors.is_empty());
    assert!(!record.workspace.as_ref().unwrap().exists());
    assert_eq!(runtime.called("compose_up"), 1);
    assert_eq!(runtime.called("compose_down"), 1);
}

#[tokio::test]
async fn steps_can_be_driven_individually() {
    let project = project(true);
    let runtime = Arc::new(MockRuntime::default());
    let mut manager = manager(Arc::clone(&runtime), StackHttp::default(), &config(project.path()));

    let path = manager.provision().await.unwrap();
    assert!(path.is_dir());
    assert_eq!(manager.stage(), DeploymentStage::Provisioned);

    let report = manager.configure().await.unwrap();
    assert_eq!(report.manifest.external_volumes.len(), 5);
    assert!(path.join(".env").is_file());
    assert!(path.join("docker-compose.yml").is_file());
    assert!(!path.join("tests").exists());
    // the project's own .env is excluded; the template replaces it
    let env = std::fs::read_to_string(path.join(".env")).unwrap();
    assert_eq!(env, "SYNAPSE_SERVER_NAME=test.local\n");

    let teardown = manager.teardown().await;
    assert!(teardown.workspace_removed);
    assert!(!teardown.stack_stopped);
    assert!(!path.exists());
    assert_eq!(runtime.called("compose_down"), 0);

    let again = manager.teardown().await;
    assert_eq!(again, teardown);
    assert_eq!(manager.stage(), DeploymentStage::TornDown);
}

// =============================================================================
// Failure paths
// =============================================================================

#[tokio::test]
async fn missing_volumes_section_fails_configure_and_still_tears_down() {
    let project = project(false);
    let runtime = Arc::new(MockRuntime::default());
    let mut manager = manager(Arc::clone(&runtime), StackHttp::default(), &config(project.path()));

    let record = manager
        .run_cycle(DeploymentStage::FunctionalChecked, &CancellationToken::new())
        .await;

    assert!(!record.succeeded());
    assert_eq!(record.missing, vec!["volumes".to_owned()]);
    assert_eq!(record.reached, DeploymentStage::Provisioned);
    assert_eq!(record.final_stage, DeploymentStage::TornDown);
    assert!(record.configure.is_none());
    assert!(!record.workspace.as_ref().unwrap().exists());
    assert_eq!(runtime.called("compose_up"), 0);
    assert_eq!(runtime.called("compose_down"), 0);
}

#[tokio::test]
async fn existing_volumes_are_reported_without_aborting() {
    let project = project(true);
    let runtime = Arc::new(MockRuntime::with_existing(&VOLUMES[..3]));
    let mut manager = manager(Arc::clone(&runtime), StackHttp::default(), &config(project.path()));

    manager.advance_to(DeploymentStage::Configured).await.unwrap();
    let report = manager.create_volumes().await.unwrap();

    assert_eq!(manager.stage(), DeploymentStage::VolumesReady);
    assert_eq!(report.failed_names(), VOLUMES[..3].to_vec());
    assert!(report.failed.iter().all(|f| f.reason == "already exists"));
    assert_eq!(report.created, VOLUMES[3..].to_vec());

    // provisioning continues past the partial failure
    manager.start().await.unwrap();
    assert_eq!(manager.stage(), DeploymentStage::Started);

    let teardown = manager.teardown().await;
    assert_eq!(teardown.volumes_removed, VOLUMES[3..].to_vec());
    assert_eq!(runtime.called("remove_volume"), 2);
}

#[tokio::test]
async fn configured_volume_list_overrides_manifest() {
    let project = project(true);
    let mut config = config(project.path());
    config.deploy.volumes = vec!["only_this".to_owned()];
    let runtime = Arc::new(MockRuntime::default());
    let mut manager = manager(Arc::clone(&runtime), StackHttp::default(), &config);

    manager.advance_to(DeploymentStage::VolumesReady).await.unwrap();

    assert_eq!(manager.volume_names(), vec!["only_this".to_owned()]);
    assert_eq!(runtime.called("create_volume"), 1);
    manager.teardown().await;
}

#[tokio::test]
async fn steps_out_of_order_are_rejected() {
    let project = project(true);
    let runtime = Arc::new(MockRuntime::default());
    let mut manager = manager(Arc::clone(&runtime), StackHttp::default(), &config(project.path()));

    let err = manager.start().await.unwrap_err();
    assert!(matches!(
        err,
        DeployError::OutOfOrder {
            current: DeploymentStage::Uninitialized,
            target: DeploymentStage::Started,
        }
    ));
    assert_eq!(manager.stage(), DeploymentStage::Uninitialized);

    manager.provision().await.unwrap();
    assert!(manager.provision().await.is_err());
    manager.teardown().await;
    assert!(manager.configure().await.is_err());
}

#[tokio::test]
async fn core_smoke_failure_fails_the_cycle() {
    let project = project(true);
    let mut config = config(project.path());
    // keep readiness away from the failing endpoint
    config.readiness.services = vec![ServiceEndpoint::new("element", "http://localhost:8080")];
    let http = StackHttp {
        failing: HashSet::from(["http://localhost:8008/health".to_owned()]),
    };
    let runtime = Arc::new(MockRuntime::default());
    let mut manager = manager(Arc::clone(&runtime), http, &config);

    let record = manager
        .run_cycle(DeploymentStage::FunctionalChecked, &CancellationToken::new())
        .await;

    assert!(!record.succeeded());
    assert_eq!(record.reached, DeploymentStage::ReadyChecked);
    assert!(record.error.as_deref().unwrap().contains("synapse_health"));
    let smoke = record.smoke.as_ref().unwrap();
    assert_eq!(smoke.core_failures().len(), 1);
    assert_eq!(runtime.called("compose_down"), 1);
}

#[tokio::test]
async fn cancellation_during_start_tears_the_stack_down() {
    let project = project(true);
    let runtime = Arc::new(MockRuntime::hanging());
    let mut manager = manager(Arc::clone(&runtime), StackHttp::default(), &config(project.path()));
    let token = CancellationToken::new();

    let (record, ()) = tokio::join!(
        manager.run_cycle(DeploymentStage::FunctionalChecked, &token),
        async {
            runtime.up_started.notified().await;
            token.cancel();
        }
    );

    assert!(record.cancelled);
    assert!(!record.succeeded());
    assert_eq!(record.reached, DeploymentStage::VolumesReady);
    assert_eq!(record.final_stage, DeploymentStage::TornDown);
    let teardown = record.teardown.as_ref().unwrap();
    assert!(teardown.stack_stopped);
    assert!(teardown.workspace_removed);
    assert_eq!(runtime.called("compose_down"), 1);
}

#[tokio::test]
async fn keep_workspace_preserves_everything() {
    let project = project(true);
    let mut config = config(project.path());
    config.deploy.keep_workspace = true;
    let runtime = Arc::new(MockRuntime::default());
    let mut manager = manager(Arc::clone(&runtime), StackHttp::default(), &config);

    let record = manager
        .run_cycle(DeploymentStage::Started, &CancellationToken::new())
        .await;

    assert!(record.succeeded());
    let teardown = record.teardown.as_ref().unwrap();
    assert!(teardown.preserved);
    assert!(!teardown.workspace_removed);
    let path: PathBuf = record.workspace.clone().unwrap();
    assert!(path.is_dir());
    assert_eq!(runtime.called("compose_down"), 0);
    std::fs::remove_dir_all(path).unwrap();
}
