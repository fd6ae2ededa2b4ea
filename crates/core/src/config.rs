//! 설정 관리 -- stackprobe.toml 파싱 및 런타임 설정
//!
//! [`StackprobeConfig`]는 모든 컴포넌트의 설정을 담는 최상위 구조체입니다.
//! 시작 시 한 번 만들어져 참조로 각 컴포넌트에 전달되며, 이후 변경되지 않습니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`SYNAPSE_URL`, `TEST_TIMEOUT`, `STACKPROBE_GENERAL_LOG_LEVEL` 등)
//! 3. 설정 파일 (`stackprobe.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), stackprobe_core::error::StackprobeError> {
//! use stackprobe_core::config::StackprobeConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = StackprobeConfig::load("stackprobe.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = StackprobeConfig::parse("[runner]\ntimeout_secs = 60")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, StackprobeError};

/// 민감 값 대신 출력되는 문자열
pub const REDACTED: &str = "***";

/// 유효한 로그 레벨
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
/// 유효한 로그 형식
const VALID_LOG_FORMATS: [&str; 2] = ["json", "pretty"];
/// 유효한 리포트 형식
const VALID_REPORT_FORMATS: [&str; 3] = ["json", "html", "both"];

/// stackprobe 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackprobeConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 대상 서비스 설정
    #[serde(default)]
    pub targets: TargetsConfig,
    /// 스위트 실행기 설정
    #[serde(default)]
    pub runner: RunnerConfig,
    /// 준비 상태 프로버 설정
    #[serde(default)]
    pub readiness: ReadinessConfig,
    /// 배포 수명주기 설정
    #[serde(default)]
    pub deploy: DeployConfig,
    /// 리포트 설정
    #[serde(default)]
    pub report: ReportConfig,
}

impl StackprobeConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StackprobeError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 파일이 없으면 기본값에서 시작합니다. 파일 이외의 에러는 그대로 전파됩니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, StackprobeError> {
        let mut config = match Self::from_file(path.as_ref()).await {
            Ok(config) => config,
            Err(StackprobeError::Config(ConfigError::FileNotFound { path })) => {
                tracing::debug!(path = %path, "config file not found, using defaults");
                Self::default()
            }
            Err(e) => return Err(e),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, StackprobeError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StackprobeError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                StackprobeError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, StackprobeError> {
        toml::from_str(toml_str).map_err(|e| {
            StackprobeError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 프로세스 환경변수로 설정값을 오버라이드합니다.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// 주어진 조회 함수로 설정값을 오버라이드합니다.
    ///
    /// 프로세스 환경을 직접 읽는 곳은 [`apply_env_overrides`](Self::apply_env_overrides)
    /// 하나뿐이며, 테스트는 이 함수에 맵 조회를 넘깁니다.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // 대상 서비스
        override_string(&lookup, &mut self.targets.synapse_url, "SYNAPSE_URL");
        override_string(&lookup, &mut self.targets.element_url, "ELEMENT_URL");
        override_string(&lookup, &mut self.targets.server_name, "SYNAPSE_SERVER_NAME");
        override_string(
            &lookup,
            &mut self.targets.test_user_password,
            "TEST_USER_PASSWORD",
        );
        override_bool(&lookup, &mut self.targets.headless, "HEADLESS");

        // 실행기
        override_parsed(&lookup, &mut self.runner.timeout_secs, "TEST_TIMEOUT");
        override_parsed(&lookup, &mut self.runner.parallel_workers, "PARALLEL_WORKERS");

        // 배포
        override_bool(&lookup, &mut self.deploy.keep_workspace, "KEEP_TEST_ENV");
        override_string(&lookup, &mut self.deploy.workspace_prefix, "TEST_PREFIX");

        // General / Report
        override_string(
            &lookup,
            &mut self.general.log_level,
            "STACKPROBE_GENERAL_LOG_LEVEL",
        );
        override_string(
            &lookup,
            &mut self.general.log_format,
            "STACKPROBE_GENERAL_LOG_FORMAT",
        );
        override_string(
            &lookup,
            &mut self.report.output_dir,
            "STACKPROBE_REPORT_OUTPUT_DIR",
        );
        override_string(&lookup, &mut self.report.format, "STACKPROBE_REPORT_FORMAT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), StackprobeError> {
        check_one_of("general.log_level", &self.general.log_level, &VALID_LOG_LEVELS)?;
        check_one_of(
            "general.log_format",
            &self.general.log_format,
            &VALID_LOG_FORMATS,
        )?;
        check_one_of("report.format", &self.report.format, &VALID_REPORT_FORMATS)?;

        if self.runner.program.trim().is_empty() {
            return Err(invalid("runner.program", "program must not be empty"));
        }
        if self.runner.timeout_secs == 0 {
            return Err(invalid("runner.timeout_secs", "must be greater than 0"));
        }
        if self.runner.parallel_workers == 0 {
            return Err(invalid("runner.parallel_workers", "must be at least 1"));
        }
        if self.runner.suites.iter().any(|s| s.file.trim().is_empty()) {
            return Err(invalid("runner.suites", "suite file must not be empty"));
        }

        let r = &self.readiness;
        if r.global_timeout_secs == 0 {
            return Err(invalid("readiness.global_timeout_secs", "must be greater than 0"));
        }
        if r.per_service_timeout_secs == 0 {
            return Err(invalid(
                "readiness.per_service_timeout_secs",
                "must be greater than 0",
            ));
        }
        if r.poll_interval_secs == 0 || r.poll_interval_secs > r.per_service_timeout_secs {
            return Err(invalid(
                "readiness.poll_interval_secs",
                "must be between 1 and per_service_timeout_secs",
            ));
        }
        if r.request_timeout_secs == 0 {
            return Err(invalid("readiness.request_timeout_secs", "must be greater than 0"));
        }

        if self.deploy.start_timeout_secs == 0 {
            return Err(invalid("deploy.start_timeout_secs", "must be greater than 0"));
        }
        if self.deploy.stop_timeout_secs == 0 {
            return Err(invalid("deploy.stop_timeout_secs", "must be greater than 0"));
        }
        if self.deploy.workspace_prefix.trim().is_empty() {
            return Err(invalid("deploy.workspace_prefix", "prefix must not be empty"));
        }

        Ok(())
    }

    /// 비밀번호를 마스킹한 사본을 반환합니다. 리포트 스냅샷에 사용됩니다.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.targets.test_user_password.is_empty() {
            copy.targets.test_user_password = REDACTED.to_owned();
        }
        copy
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 테스트 대상 서비스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetsConfig {
    /// 홈서버 base URL
    pub synapse_url: String,
    /// 웹 클라이언트 URL
    pub element_url: String,
    /// 관리 UI URL
    pub admin_url: String,
    /// well-known 위임 엔드포인트 URL
    pub well_known_url: String,
    /// 서버 이름
    pub server_name: String,
    /// 테스트 사용자 기본 비밀번호
    pub test_user_password: String,
    /// 브라우저 테스트 headless 모드
    pub headless: bool,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            synapse_url: "http://localhost:8008".to_owned(),
            element_url: "http://localhost:8080".to_owned(),
            admin_url: "http://localhost:8082".to_owned(),
            well_known_url: "http://localhost:8090/.well-known/matrix/server".to_owned(),
            server_name: "matrix.byte-box.org".to_owned(),
            test_user_password: "TestPassword123!".to_owned(),
            headless: true,
        }
    }
}

/// 스위트 하나의 정의
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteSpec {
    /// 테스트 디렉토리 기준 스위트 파일
    pub file: String,
    /// 필터 태그 (`-m` 마커)
    #[serde(default)]
    pub markers: Vec<String>,
}

impl SuiteSpec {
    /// 마커 없는 스위트
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            markers: Vec::new(),
        }
    }

    /// 마커를 추가합니다.
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.push(marker.into());
        self
    }

    /// 확장자를 뗀 스위트 이름
    pub fn name(&self) -> &str {
        let base = self.file.rsplit('/').next().unwrap_or(&self.file);
        base.strip_suffix(".py").unwrap_or(base)
    }
}

/// 스위트 실행기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// 실행 프로그램
    pub program: String,
    /// 인자 템플릿 (`{suite}`, `{report_file}` 토큰 치환)
    pub args: Vec<String>,
    /// 테스트 디렉토리
    pub test_dir: String,
    /// 프로젝트 루트 (하위 프로세스 작업 디렉토리)
    pub project_root: String,
    /// 스위트당 제한 시간 (초)
    pub timeout_secs: u64,
    /// 스위트 내부 병렬 worker 수
    pub parallel_workers: u32,
    /// 구조화 결과 파일 사용 여부
    pub structured_report: bool,
    /// 실행할 스위트 목록 (순서대로 실행)
    pub suites: Vec<SuiteSpec>,
}

impl RunnerConfig {
    /// 스위트당 제한 시간
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: "python3".to_owned(),
            args: [
                "-m",
                "pytest",
                "{suite}",
                "--json-report",
                "--json-report-file={report_file}",
                "--tb=short",
                "-v",
            ]
            .iter()
            .map(|s| (*s).to_owned())
            .collect(),
            test_dir: "tests".to_owned(),
            project_root: ".".to_owned(),
            timeout_secs: 300,
            parallel_workers: 2,
            structured_report: true,
            suites: vec![
                SuiteSpec::new("test_synapse_api.py"),
                SuiteSpec::new("test_element_web.py"),
                SuiteSpec::new("test_element_call.py"),
                SuiteSpec::new("test_network_security.py"),
                SuiteSpec::new("test_deployment_portability.py").with_marker("not slow"),
            ],
        }
    }
}

/// 헬스 체크 대상
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    /// 서비스 이름
    pub name: String,
    /// 헬스 체크 URL
    pub url: String,
}

impl ServiceEndpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// 준비 상태 프로버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// 전체 대기 예산 (초)
    pub global_timeout_secs: u64,
    /// 서비스별 대기 예산 (초)
    pub per_service_timeout_secs: u64,
    /// 재시도 간격 (초)
    pub poll_interval_secs: u64,
    /// 요청당 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 명시적 헬스 체크 대상. 비어 있으면 `targets`에서 유도합니다.
    pub services: Vec<ServiceEndpoint>,
}

impl ReadinessConfig {
    /// 헬스 체크 대상 목록
    ///
    /// 명시적 목록이 없으면 홈서버(`/health`), 웹 클라이언트, 관리 UI,
    /// well-known 엔드포인트 순서로 구성합니다.
    pub fn endpoints(&self, targets: &TargetsConfig) -> Vec<ServiceEndpoint> {
        if !self.services.is_empty() {
            return self.services.clone();
        }
        vec![
            ServiceEndpoint::new(
                "synapse",
                format!("{}/health", targets.synapse_url.trim_end_matches('/')),
            ),
            ServiceEndpoint::new("element", targets.element_url.clone()),
            ServiceEndpoint::new("admin", targets.admin_url.clone()),
            ServiceEndpoint::new("well_known", targets.well_known_url.clone()),
        ]
    }

    pub fn global_timeout(&self) -> Duration {
        Duration::from_secs(self.global_timeout_secs)
    }

    pub fn per_service_timeout(&self) -> Duration {
        Duration::from_secs(self.per_service_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            global_timeout_secs: 180,
            per_service_timeout_secs: 60,
            poll_interval_secs: 5,
            request_timeout_secs: 10,
            services: Vec::new(),
        }
    }
}

/// 배포 수명주기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// 복사 원본 프로젝트 루트
    pub project_root: String,
    /// 임시 작업 공간 디렉토리 접두사
    pub workspace_prefix: String,
    /// 종료 후 작업 공간 보존 여부
    pub keep_workspace: bool,
    /// 복사 제외 glob 패턴
    pub exclude_patterns: Vec<String>,
    /// 오케스트레이션 매니페스트 파일명
    pub manifest_file: String,
    /// 배포 제어 스크립트 파일명
    pub control_script: String,
    /// 환경 템플릿 파일명
    pub env_template: String,
    /// 생성할 환경 파일명
    pub env_file: String,
    /// 매니페스트 필수 최상위 섹션
    pub required_sections: Vec<String>,
    /// 매니페스트 필수 서비스
    pub required_services: Vec<String>,
    /// 생성할 외부 볼륨. 비어 있으면 매니페스트의 `external: true` 볼륨을 사용합니다.
    pub volumes: Vec<String>,
    /// compose 명령 (예: `["docker", "compose"]`). 비어 있으면 자동 감지합니다.
    pub compose_command: Vec<String>,
    /// 스택 시작 제한 시간 (초)
    pub start_timeout_secs: u64,
    /// 스택 정지 제한 시간 (초)
    pub stop_timeout_secs: u64,
    /// 웹 클라이언트 루트 페이지에 있어야 할 문자열
    pub web_marker: String,
}

impl DeployConfig {
    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| (*s).to_owned()).collect();
        Self {
            project_root: ".".to_owned(),
            workspace_prefix: "portability-test".to_owned(),
            keep_workspace: false,
            exclude_patterns: owned(&[
                ".git*",
                "__pycache__*",
                "*.pyc",
                "tests/",
                ".env",
                "docker-volumes/",
                "*.log",
            ]),
            manifest_file: "docker-compose.yml".to_owned(),
            control_script: "deploy.sh".to_owned(),
            env_template: ".env.clean".to_owned(),
            env_file: ".env".to_owned(),
            required_sections: owned(&["services", "volumes", "networks"]),
            required_services: owned(&["synapse", "postgres", "element", "coturn"]),
            volumes: Vec::new(),
            compose_command: Vec::new(),
            start_timeout_secs: 300,
            stop_timeout_secs: 60,
            web_marker: "element".to_owned(),
        }
    }
}

/// 리포트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// 리포트 출력 디렉토리
    pub output_dir: String,
    /// 리포트 형식 (json, html, both)
    pub format: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: "test-reports".to_owned(),
            format: "both".to_owned(),
        }
    }
}

// --- 검증 헬퍼 ---

fn invalid(field: &str, reason: &str) -> StackprobeError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
    .into()
}

fn check_one_of(field: &str, value: &str, allowed: &[&str]) -> Result<(), StackprobeError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(invalid(
            field,
            &format!("must be one of: {}", allowed.join(", ")),
        ))
    }
}

// --- 오버라이드 헬퍼 ---

fn override_string(lookup: &impl Fn(&str) -> Option<String>, target: &mut String, key: &str) {
    if let Some(val) = lookup(key) {
        *target = val;
    }
}

fn override_bool(lookup: &impl Fn(&str) -> Option<String>, target: &mut bool, key: &str) {
    if let Some(val) = lookup(key) {
        match parse_bool(&val) {
            Some(parsed) => *target = parsed,
            None => warn!(
                env_key = key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    target: &mut T,
    key: &str,
) {
    if let Some(val) = lookup(key) {
        match val.trim().parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key = key,
                value = val.as_str(),
                "failed to parse number from env var, ignoring"
            ),
        }
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
