//! 배포 수명주기 에러 타입
//!
//! [`DeployError`]는 작업 공간, 매니페스트, 볼륨, 스택, 스모크 체크 단계의
//! 모든 에러를 표현합니다. `From<DeployError> for StackprobeError` 변환으로
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use stackprobe_core::error::{DeploymentError, StackprobeError};

use crate::lifecycle::DeploymentStage;

/// 배포 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// 작업 공간 생성/복사/삭제 실패
    #[error("workspace error: {0}")]
    Workspace(String),

    /// 매니페스트를 읽거나 파싱할 수 없음
    #[error("manifest error: {0}")]
    Manifest(String),

    /// 필수 섹션 또는 서비스 누락
    #[error(
        "manifest is missing required entries: {}",
        missing_sections
            .iter()
            .chain(missing_services.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    )]
    ManifestInvalid {
        /// 누락된 최상위 섹션
        missing_sections: Vec<String>,
        /// 누락된 서비스
        missing_services: Vec<String>,
    },

    /// 볼륨 생성/삭제 실패
    #[error("volume '{name}': {reason}")]
    Volume {
        /// 볼륨 이름
        name: String,
        /// 실패 사유
        reason: String,
    },

    /// 컨테이너 런타임 연결 또는 API 실패
    #[error("container runtime error: {0}")]
    Runtime(String),

    /// compose 명령이 0이 아닌 코드로 종료
    #[error("'{command}' exited with status {status}: {stderr}")]
    ComposeFailed {
        /// 실행한 명령
        command: String,
        /// 종료 코드 (`signal`이면 시그널 종료)
        status: String,
        /// 표준 출력
        stdout: String,
        /// 표준 에러
        stderr: String,
    },

    /// 외부 명령 타임아웃
    #[error("{operation} timed out after {secs}s")]
    Timeout {
        /// 작업 이름
        operation: String,
        /// 제한 시간 (초)
        secs: u64,
    },

    /// 핵심 스모크 체크 실패
    #[error("smoke check '{check}' failed: {reason}")]
    SmokeCheck {
        /// 체크 이름
        check: String,
        /// 실패 사유
        reason: String,
    },

    /// 수명주기 단계 순서 위반
    #[error("cannot enter {target} from {current}")]
    OutOfOrder {
        /// 현재 단계
        current: DeploymentStage,
        /// 진입하려던 단계
        target: DeploymentStage,
    },

    /// 외부 인터럽트로 중단
    #[error("deployment cancelled")]
    Cancelled,

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeployError {
    /// 매니페스트 검증 에러의 누락 항목 (섹션 다음 서비스 순)
    pub fn missing(&self) -> Vec<String> {
        match self {
            Self::ManifestInvalid {
                missing_sections,
                missing_services,
            } => missing_sections
                .iter()
                .chain(missing_services.iter())
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<DeployError> for StackprobeError {
    fn from(err: DeployError) -> Self {
        let missing = err.missing();
        match err {
            DeployError::ManifestInvalid { .. } => {
                StackprobeError::Deployment(DeploymentError::ConfigValidationFailure {
                    reason: format!("missing required entries: {}", missing.join(", ")),
                    missing,
                })
            }
            DeployError::Manifest(reason) => {
                StackprobeError::Deployment(DeploymentError::ConfigValidationFailure {
                    reason,
                    missing: Vec::new(),
                })
            }
            DeployError::Volume { name, .. } => {
                StackprobeError::Deployment(DeploymentError::VolumeCreationFailure {
                    volumes: vec![name],
                })
            }
            DeployError::SmokeCheck { check, reason } => {
                StackprobeError::Deployment(DeploymentError::SmokeCheckFailure { check, reason })
            }
            DeployError::Io(e) => StackprobeError::Io(e),
            other => StackprobeError::Deployment(DeploymentError::Stack(other.to_string())),
        }
    }
}
