//! 배포 라이프사이클 상태 머신
//!
//! [`DeploymentManager`]는 [`Workspace`] 하나를 소유하고
//! [`DeploymentStage`]를 엄격한 순서로 진행합니다:
//!
//! ```text
//! uninitialized -> provisioned -> configured -> volumes-ready -> started
//!               -> ready-checked -> functional-checked -> torn-down
//! ```
//!
//! 실패한 단계는 현재 단계를 바꾸지 않으므로 호출자가 재시도할 수 있습니다.
//! [`DeploymentManager::teardown`]은 모든 단계에서 호출할 수 있고 멱등입니다.
//! [`DeploymentManager::run_cycle`]은 성공, 실패, 취소와 상관없이 항상
//! teardown으로 끝납니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use stackprobe_core::config::{DeployConfig, ReadinessConfig, TargetsConfig};
use stackprobe_core::{ServiceHealth, StackprobeConfig};
use stackprobe_readiness::{HttpClient, ProbePolicy, ReadinessProber, unready_services};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::DeployError;
use crate::manifest::{ManifestSummary, validate_manifest};
use crate::runtime::{ContainerRecord, ContainerRuntime};
use crate::smoke::{SmokeReport, run_smoke_checks};
use crate::workspace::{CopySummary, EnvFileSource, ExclusionSet, Workspace};

/// 배포 워크스페이스의 라이프사이클 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentStage {
    Uninitialized,
    Provisioned,
    Configured,
    VolumesReady,
    Started,
    ReadyChecked,
    FunctionalChecked,
    TornDown,
}

impl DeploymentStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Provisioned => "provisioned",
            Self::Configured => "configured",
            Self::VolumesReady => "volumes-ready",
            Self::Started => "started",
            Self::ReadyChecked => "ready-checked",
            Self::FunctionalChecked => "functional-checked",
            Self::TornDown => "torn-down",
        }
    }

    /// 단계가 성공하면 이동하는 다음 단계. `TornDown`이면 `None`
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Uninitialized => Some(Self::Provisioned),
            Self::Provisioned => Some(Self::Configured),
            Self::Configured => Some(Self::VolumesReady),
            Self::VolumesReady => Some(Self::Started),
            Self::Started => Some(Self::ReadyChecked),
            Self::ReadyChecked => Some(Self::FunctionalChecked),
            Self::FunctionalChecked => Some(Self::TornDown),
            Self::TornDown => None,
        }
    }
}

impl std::fmt::Display for DeploymentStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `configured` 단계 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigureReport {
    pub copy: CopySummary,
    pub env_source: EnvFileSource,
    pub manifest: ManifestSummary,
    /// 복사된 프로젝트에 없는 배포 아티팩트
    pub missing_artifacts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeFailure {
    pub name: String,
    pub reason: String,
}

/// `volumes-ready` 단계 결과. 부분 실패는 에러가 아닙니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VolumeReport {
    pub created: Vec<String>,
    pub failed: Vec<VolumeFailure>,
}

impl VolumeReport {
    pub fn failed_names(&self) -> Vec<String> {
        self.failed.iter().map(|f| f.name.clone()).collect()
    }
}

/// 정리 작업 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    /// 요청에 따라 워크스페이스 보존. 중지하거나 삭제한 것이 없습니다.
    pub preserved: bool,
    pub stack_stopped: bool,
    pub volumes_removed: Vec<String>,
    pub workspace_removed: bool,
    /// 정리 중 발생한 실패. 첫 실패에서 멈추지 않습니다.
    pub errors: Vec<String>,
}

/// 라이프사이클 한 번의 전체 기록
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentRecord {
    pub target: DeploymentStage,
    /// teardown 전에 도달한 마지막 단계
    pub reached: DeploymentStage,
    pub final_stage: DeploymentStage,
    pub workspace: Option<PathBuf>,
    pub configure: Option<ConfigureReport>,
    pub volumes: Option<VolumeReport>,
    pub containers: Vec<ContainerRecord>,
    pub readiness: Vec<ServiceHealth>,
    pub smoke: Option<SmokeReport>,
    pub teardown: Option<TeardownReport>,
    pub error: Option<String>,
    /// 검증 실패 시 누락된 매니페스트 섹션과 서비스
    pub missing: Vec<String>,
    pub cancelled: bool,
}

impl DeploymentRecord {
    fn new() -> Self {
        Self {
            target: DeploymentStage::Uninitialized,
            reached: DeploymentStage::Uninitialized,
            final_stage: DeploymentStage::Uninitialized,
            workspace: None,
            configure: None,
            volumes: None,
            containers: Vec::new(),
            readiness: Vec::new(),
            smoke: None,
            teardown: None,
            error: None,
            missing: Vec::new(),
            cancelled: false,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.reached >= self.target
    }
}

/// 배포 워크스페이스 하나의 라이프사이클을 진행합니다.
pub struct DeploymentManager<R: ContainerRuntime, H: HttpClient> {
    runtime: Arc<R>,
    http: Arc<H>,
    deploy: DeployConfig,
    targets: TargetsConfig,
    readiness: ReadinessConfig,
    stage: DeploymentStage,
    workspace: Option<Workspace>,
    manifest: Option<ManifestSummary>,
    created_volumes: Vec<String>,
    start_attempted: bool,
    record: DeploymentRecord,
}

impl<R: ContainerRuntime, H: HttpClient> DeploymentManager<R, H> {
    pub fn new(runtime: Arc<R>, http: Arc<H>, config: &StackprobeConfig) -> Self {
        Self {
            runtime,
            http,
            deploy: config.deploy.clone(),
            targets: config.targets.clone(),
            readiness: config.readiness.clone(),
            stage: DeploymentStage::Uninitialized,
            workspace: None,
            manifest: None,
            created_volumes: Vec::new(),
            start_attempted: false,
            record: DeploymentRecord::new(),
        }
    }

    pub fn stage(&self) -> DeploymentStage {
        self.stage
    }

    pub fn workspace_path(&self) -> Option<&Path> {
        self.workspace.as_ref().map(Workspace::path)
    }

    pub fn record(&self) -> &DeploymentRecord {
        &self.record
    }

    fn enter(&self, target: DeploymentStage) -> Result<(), DeployError> {
        if self.stage.next() == Some(target) {
            Ok(())
        } else {
            Err(DeployError::OutOfOrder {
                current: self.stage,
                target,
            })
        }
    }

    fn workspace(&self) -> Result<&Workspace, DeployError> {
        self.workspace
            .as_ref()
            .ok_or_else(|| DeployError::Workspace("workspace not provisioned".to_owned()))
    }

    fn reach(&mut self, stage: DeploymentStage) {
        info!(stage = %stage, "deployment stage reached");
        self.stage = stage;
        self.record.reached = stage;
    }

    /// `uninitialized -> provisioned`: 빈 워크스페이스 디렉토리를 만듭니다.
    pub async fn provision(&mut self) -> Result<PathBuf, DeployError> {
        self.enter(DeploymentStage::Provisioned)?;
        let workspace = Workspace::provision(&self.deploy.workspace_prefix).await?;
        let path = workspace.path().to_path_buf();
        self.workspace = Some(workspace);
        self.record.workspace = Some(path.clone());
        self.reach(DeploymentStage::Provisioned);
        Ok(path)
    }

    /// `provisioned -> configured`: 필터링 복사, 환경 파일, 매니페스트 검증
    ///
    /// 매니페스트가 없거나 유효하지 않으면 단계가 실패합니다. 제어 스크립트나
    /// 환경 템플릿이 없으면 보고만 합니다.
    pub async fn configure(&mut self) -> Result<ConfigureReport, DeployError> {
        self.enter(DeploymentStage::Configured)?;
        let exclusions = ExclusionSet::new(&self.deploy.exclude_patterns)?;
        let workspace = self.workspace()?;

        let copy = workspace
            .copy_project(Path::new(&self.deploy.project_root), &exclusions)
            .await?;

        let mut missing_artifacts = Vec::new();
        for artifact in [
            &self.deploy.manifest_file,
            &self.deploy.control_script,
            &self.deploy.env_template,
        ] {
            if !tokio::fs::try_exists(workspace.path().join(artifact))
                .await
                .unwrap_or(false)
            {
                warn!(artifact = %artifact, "required deployment artifact missing");
                missing_artifacts.push(artifact.clone());
            }
        }

        let env_source = workspace
            .materialize_env(&self.deploy.env_template, &self.deploy.env_file)
            .await?;

        let manifest_path = workspace.path().join(&self.deploy.manifest_file);
        let raw = tokio::fs::read_to_string(&manifest_path)
            .await
            .map_err(|e| {
                DeployError::Manifest(format!("cannot read {}: {e}", self.deploy.manifest_file))
            })?;
        let manifest = validate_manifest(
            &raw,
            &self.deploy.required_sections,
            &self.deploy.required_services,
        )?;
        info!(
            services = ?manifest.services,
            external_volumes = ?manifest.external_volumes,
            "manifest validated"
        );
        if !manifest.unpinned_images.is_empty() {
            warn!(services = ?manifest.unpinned_images, "services without pinned image versions");
        }

        let report = ConfigureReport {
            copy,
            env_source,
            manifest: manifest.clone(),
            missing_artifacts,
        };
        self.manifest = Some(manifest);
        self.record.configure = Some(report.clone());
        self.reach(DeploymentStage::Configured);
        Ok(report)
    }

    /// 생성할 볼륨. 설정 목록이 우선이고, 없으면 매니페스트의 external 볼륨
    pub fn volume_names(&self) -> Vec<String> {
        if !self.deploy.volumes.is_empty() {
            return self.deploy.volumes.clone();
        }
        self.manifest
            .as_ref()
            .map(|m| m.external_volumes.clone())
            .unwrap_or_default()
    }

    /// `configured -> volumes-ready`: external 볼륨을 모두 생성합니다.
    ///
    /// 개별 실패는 결과에 모읍니다. 런타임에 연결할 수 없을 때만 단계가 실패합니다.
    pub async fn create_volumes(&mut self) -> Result<VolumeReport, DeployError> {
        self.enter(DeploymentStage::VolumesReady)?;
        self.runtime.ping().await?;

        let mut report = VolumeReport::default();
        for name in self.volume_names() {
            match self.runtime.create_volume(&name).await {
                Ok(()) => {
                    info!(volume = %name, "volume created");
                    self.created_volumes.push(name.clone());
                    report.created.push(name);
                }
                Err(e) => {
                    let reason = match e {
                        DeployError::Volume { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    warn!(volume = %name, reason = %reason, "volume creation failed");
                    report.failed.push(VolumeFailure { name, reason });
                }
            }
        }

        self.record.volumes = Some(report.clone());
        self.reach(DeploymentStage::VolumesReady);
        Ok(report)
    }

    /// `volumes-ready -> started`: 스택을 올리고 컨테이너 목록을 기록합니다.
    pub async fn start(&mut self) -> Result<Vec<ContainerRecord>, DeployError> {
        self.enter(DeploymentStage::Started)?;
        let dir = self.workspace()?.path().to_path_buf();

        // 중단된 시작도 내려가도록 await 전에 설정
        self.start_attempted = true;
        self.runtime
            .compose_up(&dir, self.deploy.start_timeout())
            .await?;

        let containers = match self.runtime.compose_ps(&dir).await {
            Ok(containers) => containers,
            Err(e) => {
                warn!(error = %e, "could not list started containers");
                Vec::new()
            }
        };
        info!(count = containers.len(), "stack started");
        self.record.containers = containers.clone();
        self.reach(DeploymentStage::Started);
        Ok(containers)
    }

    /// `started -> ready-checked`: 스택의 헬스 엔드포인트를 점검합니다.
    ///
    /// 권고성 단계. 준비되지 않은 서비스는 에러가 아니라 결과로 반환됩니다.
    pub async fn wait_ready(&mut self) -> Result<Vec<ServiceHealth>, DeployError> {
        self.enter(DeploymentStage::ReadyChecked)?;
        let prober = ReadinessProber::new(
            Arc::clone(&self.http),
            ProbePolicy::from_config(&self.readiness),
        );
        let records = prober
            .probe_all(&self.readiness.endpoints(&self.targets))
            .await;
        let unready = unready_services(&records);
        if !unready.is_empty() {
            warn!(services = ?unready, "some services not ready, continuing");
        }
        self.record.readiness = records.clone();
        self.reach(DeploymentStage::ReadyChecked);
        Ok(records)
    }

    /// `ready-checked -> functional-checked`: 스모크 검사를 실행합니다.
    ///
    /// 핵심 검사가 실패하면 단계가 실패합니다. 결과는 어느 경우든 기록에 남습니다.
    pub async fn functional_check(&mut self) -> Result<SmokeReport, DeployError> {
        self.enter(DeploymentStage::FunctionalChecked)?;
        let report = run_smoke_checks(
            self.http.as_ref(),
            &self.targets,
            &self.deploy.web_marker,
            self.readiness.request_timeout(),
        )
        .await;
        info!(
            passed = report.passed_count(),
            total = report.checks.len(),
            "smoke checks finished"
        );
        self.record.smoke = Some(report.clone());
        report.ensure_core_passed()?;
        self.reach(DeploymentStage::FunctionalChecked);
        Ok(report)
    }

    /// 스택 중지, 생성한 볼륨 삭제, 워크스페이스 삭제
    ///
    /// 모든 단계에서 호출할 수 있습니다. 반복 호출은 첫 결과를 반환합니다.
    pub async fn teardown(&mut self) -> TeardownReport {
        if self.stage == DeploymentStage::TornDown {
            return self.record.teardown.clone().unwrap_or_default();
        }

        let mut report = TeardownReport::default();
        if let Some(workspace) = self.workspace.as_mut() {
            if self.deploy.keep_workspace {
                workspace.preserve();
                report.preserved = true;
            } else {
                if self.start_attempted {
                    match self
                        .runtime
                        .compose_down(workspace.path(), self.deploy.stop_timeout())
                        .await
                    {
                        Ok(()) => report.stack_stopped = true,
                        Err(e) => {
                            warn!(error = %e, "failed to stop stack");
                            report.errors.push(e.to_string());
                        }
                    }
                }
                for name in std::mem::take(&mut self.created_volumes) {
                    match self.runtime.remove_volume(&name).await {
                        Ok(()) => report.volumes_removed.push(name),
                        Err(e) => {
                            warn!(volume = %name, error = %e, "failed to remove volume");
                            report.errors.push(e.to_string());
                        }
                    }
                }
                match workspace.destroy().await {
                    Ok(()) => report.workspace_removed = true,
                    Err(e) => {
                        error!(error = %e, "failed to remove workspace");
                        report.errors.push(e.to_string());
                    }
                }
            }
        }

        self.stage = DeploymentStage::TornDown;
        self.record.final_stage = DeploymentStage::TornDown;
        self.record.teardown = Some(report.clone());
        info!(preserved = report.preserved, "deployment torn down");
        report
    }

    /// `target`에 도달하거나 단계가 실패할 때까지 순서대로 실행합니다.
    pub async fn advance_to(&mut self, target: DeploymentStage) -> Result<(), DeployError> {
        while self.stage < target {
            let Some(next) = self.stage.next() else {
                break;
            };
            match next {
                DeploymentStage::Provisioned => {
                    self.provision().await?;
                }
                DeploymentStage::Configured => {
                    self.configure().await?;
                }
                DeploymentStage::VolumesReady => {
                    self.create_volumes().await?;
                }
                DeploymentStage::Started => {
                    self.start().await?;
                }
                DeploymentStage::ReadyChecked => {
                    self.wait_ready().await?;
                }
                DeploymentStage::FunctionalChecked => {
                    self.functional_check().await?;
                }
                DeploymentStage::TornDown | DeploymentStage::Uninitialized => {
                    self.teardown().await;
                }
            }
        }
        Ok(())
    }

    /// `target`까지 진행하고 실패를 기록합니다. 스택은 내려가지 않습니다.
    ///
    /// `cancel`이 취소되면 진행 중인 단계를 drop하여 자식 프로세스를 종료합니다.
    /// 이후의 [`teardown`](Self::teardown)은 호출자 책임입니다.
    pub async fn deploy(
        &mut self,
        target: DeploymentStage,
        cancel: &CancellationToken,
    ) -> Result<(), DeployError> {
        self.record.target = target;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DeployError::Cancelled),
            result = self.advance_to(target) => result,
        };

        if let Err(e) = &result {
            error!(stage = %self.stage, error = %e, "deployment failed");
            self.record.cancelled = matches!(e, DeployError::Cancelled);
            self.record.missing = e.missing();
            self.record.error = Some(e.to_string());
        }
        result
    }

    /// `target`까지 진행한 뒤 항상 teardown합니다.
    pub async fn run_cycle(
        &mut self,
        target: DeploymentStage,
        cancel: &CancellationToken,
    ) -> DeploymentRecord {
        // 실패는 이미 기록에 있음
        let _ = self.deploy(target, cancel).await;
        self.teardown().await;
        self.record.clone()
    }
}
