//! 에러 타입 -- 도메인별 에러 정의
//!
//! 각 라이브러리 크레이트는 자체 에러 타입을 가지며,
//! `From` 변환을 통해 [`StackprobeError`]로 전파됩니다.

/// stackprobe 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum StackprobeError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 스위트 실행 에러
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// 서비스 준비 상태 에러
    #[error("readiness error: {0}")]
    Readiness(#[from] ReadinessError),

    /// 배포 수명주기 에러
    #[error("deployment error: {0}")]
    Deployment(#[from] DeploymentError),

    /// 리포트 직렬화/기록 에러
    #[error("report error: {0}")]
    Report(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 스위트 프로세스 실행 에러
///
/// 스위트 실행기 경계 밖으로는 전파되지 않고, 항상 합성된
/// `error` 테스트 결과로 변환됩니다.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// 프로세스가 제한 시간 내에 끝나지 않음
    #[error("suite '{suite}' timed out after {timeout_secs}s")]
    ProcessTimeout { suite: String, timeout_secs: f64 },

    /// 프로세스 생성 실패 (실행 파일 없음, I/O 에러 등)
    #[error("failed to spawn suite '{suite}': {reason}")]
    ProcessSpawnFailure { suite: String, reason: String },

    /// 결과 파싱 실패 -- 치명적이지 않으며 best-effort로 강등됨
    #[error("failed to parse results of suite '{suite}': {reason}")]
    ResultParseFailure { suite: String, reason: String },
}

/// 서비스 준비 상태 에러 (경고 수준)
#[derive(Debug, thiserror::Error)]
pub enum ReadinessError {
    /// 예산 내에 준비되지 않은 서비스 목록
    #[error("services not ready: {}", services.join(", "))]
    ServiceUnready { services: Vec<String> },

    /// 헬스 요청 자체의 실패 (연결 거부, 타임아웃 등)
    #[error("health probe failed for {url}: {reason}")]
    Probe { url: String, reason: String },
}

/// 배포 수명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum DeploymentError {
    /// 오케스트레이션 매니페스트 검증 실패
    #[error("config validation failed: {reason}")]
    ConfigValidationFailure { reason: String, missing: Vec<String> },

    /// 외부 볼륨 생성 실패 (부분 실패)
    #[error("volume creation failed: {}", volumes.join(", "))]
    VolumeCreationFailure { volumes: Vec<String> },

    /// 스모크 체크 실패
    #[error("smoke check '{check}' failed: {reason}")]
    SmokeCheckFailure { check: String, reason: String },

    /// 스택 시작/정지 실패
    #[error("stack operation failed: {0}")]
    Stack(String),
}
