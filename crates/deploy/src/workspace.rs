//! 임시 배포 워크스페이스
//!
//! [`Workspace`]는 시스템 임시 디렉토리 아래의 고유한 이름의 디렉토리입니다.
//! [`Workspace::provision`]으로 생성하고, [`Workspace::copy_project`]와
//! [`Workspace::materialize_env`]로 채우며, [`Workspace::destroy`]로 삭제합니다.
//! 라이프사이클 관리자는 워크스페이스 하나만 소유하고 항상 `destroy`(또는
//! 명시적 보존)를 거칩니다.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::DeployError;

/// 템플릿이 없을 때 작성하는 최소 환경 변수
pub const DEFAULT_ENV: &[(&str, &str)] = &[
    ("SYNAPSE_SERVER_NAME", "test.local"),
    ("POSTGRES_PASSWORD", "TestPassword123!"),
    ("REGISTRATION_SHARED_SECRET", "TestRegistrationSecret123"),
    ("COTURN_STATIC_AUTH_SECRET", "TestTurnSecret123"),
    ("SYNAPSE_PORT", "8008"),
    ("ELEMENT_PORT", "8080"),
    ("SYNAPSE_ADMIN_PORT", "8082"),
    ("WELL_KNOWN_PORT", "8090"),
    ("COTURN_PORT", "3478"),
    ("COTURN_EXTERNAL_IP", "127.0.0.1"),
    ("LOG_LEVEL", "INFO"),
];

/// 필터링된 프로젝트 복사 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CopySummary {
    /// 깊이와 상관없이 복사된 파일(및 심볼릭 링크) 수
    pub copied_entries: usize,
    /// 복사된 최상위 이름 (디렉토리는 `/`로 끝남)
    pub copied_top_level: Vec<String>,
    /// 제외된 최상위 이름
    pub skipped_top_level: Vec<String>,
}

/// 환경 파일 생성 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvFileSource {
    /// 저장소의 템플릿에서 복사
    Template,
    /// [`DEFAULT_ENV`]로 합성
    Synthesized,
}

/// 컴파일된 제외 패턴
///
/// 모든 깊이에서 항목의 basename과 매칭합니다. 끝의 `/`는 디렉토리에만
/// 적용합니다 (`tests/`는 이름이 `tests`인 모든 디렉토리를 제외).
#[derive(Debug, Clone)]
pub struct ExclusionSet {
    any: Vec<Pattern>,
    dirs_only: Vec<Pattern>,
}

impl ExclusionSet {
    pub fn new(patterns: &[String]) -> Result<Self, DeployError> {
        let mut any = Vec::new();
        let mut dirs_only = Vec::new();
        for raw in patterns {
            let (target, body) = match raw.strip_suffix('/') {
                Some(body) => (&mut dirs_only, body),
                None => (&mut any, raw.as_str()),
            };
            let pattern = Pattern::new(body).map_err(|e| {
                DeployError::Workspace(format!("invalid exclusion pattern '{raw}': {e}"))
            })?;
            target.push(pattern);
        }
        Ok(Self { any, dirs_only })
    }

    pub fn is_excluded(&self, name: &str, is_dir: bool) -> bool {
        self.any.iter().any(|p| p.matches(name))
            || (is_dir && self.dirs_only.iter().any(|p| p.matches(name)))
    }
}

/// 라이프사이클 관리자 하나가 소유하는 격리된 디렉토리
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    removed: bool,
    preserved: bool,
}

impl Workspace {
    /// 새 빈 디렉토리 `<tmp>/<prefix>-<uuid>`를 만듭니다.
    pub async fn provision(prefix: &str) -> Result<Self, DeployError> {
        let path = std::env::temp_dir().join(format!("{prefix}-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&path).await.map_err(|e| {
            DeployError::Workspace(format!("failed to create {}: {e}", path.display()))
        })?;
        info!(path = %path.display(), "workspace provisioned");
        Ok(Self {
            path,
            removed: false,
            preserved: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// 사후 조사를 위해 디렉토리를 디스크에 남깁니다.
    pub fn preserve(&mut self) {
        self.preserved = true;
        info!(path = %self.path.display(), "workspace preserved");
    }

    pub fn is_preserved(&self) -> bool {
        self.preserved
    }

    /// 제외 항목을 건너뛰며 `source`를 워크스페이스로 복사합니다.
    pub async fn copy_project(
        &self,
        source: &Path,
        exclusions: &ExclusionSet,
    ) -> Result<CopySummary, DeployError> {
        let source = source.to_path_buf();
        let dest = self.path.clone();
        let exclusions = exclusions.clone();
        let summary = tokio::task::spawn_blocking(move || copy_filtered(&source, &dest, &exclusions))
            .await
            .map_err(|e| DeployError::Workspace(format!("copy task failed: {e}")))??;
        info!(
            copied_entries = summary.copied_entries,
            skipped = ?summary.skipped_top_level,
            "project copied into workspace"
        );
        Ok(summary)
    }

    /// `env_file`을 작성합니다. `template`이 있으면 복사를 우선합니다.
    pub async fn materialize_env(
        &self,
        template: &str,
        env_file: &str,
    ) -> Result<EnvFileSource, DeployError> {
        let template_path = self.path.join(template);
        let env_path = self.path.join(env_file);

        if tokio::fs::try_exists(&template_path).await.unwrap_or(false) {
            tokio::fs::copy(&template_path, &env_path).await?;
            debug!(template, env_file, "environment file copied from template");
            return Ok(EnvFileSource::Template);
        }

        let content = DEFAULT_ENV
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("\n");
        tokio::fs::write(&env_path, content).await?;
        debug!(env_file, "environment file synthesized from defaults");
        Ok(EnvFileSource::Synthesized)
    }

    /// 디렉토리를 재귀적으로 삭제합니다. 여러 번 호출해도 안전합니다.
    pub async fn destroy(&mut self) -> Result<(), DeployError> {
        if self.removed {
            return Ok(());
        }
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(DeployError::Workspace(format!(
                    "failed to remove {}: {e}",
                    self.path.display()
                )));
            }
        }
        self.removed = true;
        info!(path = %self.path.display(), "workspace removed");
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.removed && !self.preserved && self.path.exists() {
            warn!(
                path = %self.path.display(),
                "workspace dropped without teardown, leaving directory in place"
            );
        }
    }
}

fn copy_filtered(
    source: &Path,
    dest: &Path,
    exclusions: &ExclusionSet,
) -> Result<CopySummary, DeployError> {
    let mut summary = CopySummary::default();
    let mut copied_top = BTreeSet::new();
    let mut skipped_top = BTreeSet::new();

    let walker = WalkDir::new(source)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            let excluded = exclusions.is_excluded(&name, entry.file_type().is_dir());
            if excluded && entry.depth() == 1 {
                skipped_top.insert(name.into_owned());
            }
            !excluded
        });

    for entry in walker {
        let entry = entry.map_err(|e| DeployError::Workspace(format!("walk failed: {e}")))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| DeployError::Workspace(e.to_string()))?;
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if entry.depth() == 1 {
            let name = entry.file_name().to_string_lossy().into_owned();
            copied_top.insert(if file_type.is_dir() {
                format!("{name}/")
            } else {
                name
            });
        }

        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
            summary.copied_entries += 1;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
            summary.copied_entries += 1;
        }
    }

    summary.copied_top_level = copied_top.into_iter().collect();
    summary.skipped_top_level = skipped_top.into_iter().collect();
    Ok(summary)
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> Result<(), DeployError> {
    let link = std::fs::read_link(source)?;
    std::os::unix::fs::symlink(link, target)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, target: &Path) -> Result<(), DeployError> {
    std::fs::copy(source, target)?;
    Ok(())
}
