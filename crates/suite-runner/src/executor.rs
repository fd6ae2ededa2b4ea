//! 스위트 실행기 -- 스위트 하나당 격리된 자식 프로세스 하나, [`SuiteResult`] 하나
//!
//! # 실패 정책
//!
//! [`SuiteExecutor::run`]은 에러를 반환하지 않습니다. 모든 실패는
//! 형식이 갖춰진 스위트 결과로 변환됩니다:
//!
//! | 실패                       | 합성 케이스 이름    | 카운터              |
//! |----------------------------|---------------------|---------------------|
//! | 타임아웃                   | `timeout`           | total=1, errors=1   |
//! | 실행 / I/O / 파일 없음     | `error`             | total=1, errors=1   |
//! | 파싱 가능한 결과 없음      | `error`             | total=1, errors=1   |
//!
//! # 취소
//!
//! 자식 프로세스는 `kill_on_drop`으로 생성됩니다. [`SuiteExecutor::run`]이
//! 반환한 future를 drop하면 (예: `tokio::select!` 분기) 실행 중인 스위트
//! 프로세스가 종료되고 임시 결과 파일도 삭제됩니다.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, info, warn};

use stackprobe_core::config::{StackprobeConfig, SuiteSpec};
use stackprobe_core::types::{OutcomeCounts, SuiteResult};

use crate::error::SuiteRunnerError;
use crate::structured::StructuredReport;
use crate::summary;

/// 인자 템플릿에서 스위트 경로로 치환되는 토큰
pub const SUITE_TOKEN: &str = "{suite}";
/// 구조화 결과 파일 경로로 치환되는 토큰
pub const REPORT_FILE_TOKEN: &str = "{report_file}";

/// 스위트 결과의 출처. 실행마다 한 번 결정됩니다.
#[derive(Debug, Clone)]
pub enum ResultSource {
    /// 파싱된 구조화 결과 파일
    Structured(StructuredReport),
    /// 사람이 읽는 요약 라인에서 추출한 카운터
    TextFallback(OutcomeCounts),
}

impl ResultSource {
    /// 로그용 짧은 레이블
    pub fn label(&self) -> &'static str {
        match self {
            Self::Structured(_) => "structured",
            Self::TextFallback(_) => "text_fallback",
        }
    }
}

/// 테스트 스위트를 자식 프로세스로 실행합니다.
#[derive(Debug, Clone)]
pub struct SuiteExecutor {
    program: String,
    args: Vec<String>,
    test_dir: PathBuf,
    working_dir: PathBuf,
    timeout: Duration,
    parallel_workers: u32,
    structured_report: bool,
    env: BTreeMap<String, String>,
}

impl SuiteExecutor {
    /// 주어진 프로그램과 인자 템플릿으로 실행기를 생성합니다.
    /// 현재 디렉토리, 300초 타임아웃, 주입 변수 없음이 기본값입니다.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            test_dir: PathBuf::from("."),
            working_dir: PathBuf::from("."),
            timeout: Duration::from_secs(300),
            parallel_workers: 1,
            structured_report: true,
            env: BTreeMap::new(),
        }
    }

    /// 확정된 설정으로부터 실행기를 생성합니다.
    pub fn from_config(config: &StackprobeConfig) -> Self {
        let runner = &config.runner;
        let working_dir = PathBuf::from(&runner.project_root);
        Self {
            program: runner.program.clone(),
            args: runner.args.clone(),
            test_dir: working_dir.join(&runner.test_dir),
            working_dir,
            timeout: runner.timeout(),
            parallel_workers: runner.parallel_workers,
            structured_report: runner.structured_report,
            env: child_environment(config),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_parallel_workers(mut self, workers: u32) -> Self {
        self.parallel_workers = workers;
        self
    }

    pub fn with_test_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.test_dir = dir.into();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_structured_report(mut self, enabled: bool) -> Self {
        self.structured_report = enabled;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 모든 스위트 프로세스에 주입되는 환경변수
    pub fn injected_env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// 스위트 파일의 경로 (절대 경로 또는 작업 디렉토리 기준)
    pub fn suite_path(&self, suite: &SuiteSpec) -> PathBuf {
        self.test_dir.join(&suite.file)
    }

    /// 한 번의 실행을 위해 인자 템플릿을 전개합니다.
    ///
    /// 구조화 리포트가 비활성화되면 결과 파일을 참조하는 인자는 제외됩니다.
    pub fn build_args(&self, suite: &SuiteSpec, suite_path: &Path, report_file: &Path) -> Vec<String> {
        let suite_str = suite_path.display().to_string();
        let report_str = report_file.display().to_string();

        let mut args: Vec<String> = self
            .args
            .iter()
            .filter(|arg| self.structured_report || !arg.contains(REPORT_FILE_TOKEN))
            .map(|arg| {
                arg.replace(SUITE_TOKEN, &suite_str)
                    .replace(REPORT_FILE_TOKEN, &report_str)
            })
            .collect();

        for marker in &suite.markers {
            args.push("-m".to_owned());
            args.push(marker.clone());
        }
        if self.parallel_workers > 1 {
            args.push("-n".to_owned());
            args.push(self.parallel_workers.to_string());
        }
        args
    }

    /// 스위트 하나를 끝까지 실행하고 결과를 반환합니다.
    pub async fn run(&self, suite: &SuiteSpec) -> SuiteResult {
        let name = suite.name().to_owned();
        let started = Instant::now();
        info!(suite = %name, timeout_secs = self.timeout.as_secs_f64(), "running suite");

        match self.try_run(suite, &name, started).await {
            Ok(result) => {
                info!(
                    suite = %name,
                    total = result.total,
                    passed = result.passed,
                    failed = result.failed,
                    errors = result.errors,
                    duration_secs = result.duration,
                    "suite finished"
                );
                result
            }
            Err(err) => {
                let elapsed = started.elapsed().as_secs_f64();
                warn!(suite = %name, error = %err, "suite execution failed");
                let message = match &err {
                    SuiteRunnerError::Timeout { timeout, .. } => {
                        format!("Test suite timed out after {}s", timeout.as_secs_f64())
                    }
                    other => other.to_string(),
                };
                SuiteResult::synthetic_error(name, err.synthetic_test_name(), message, elapsed)
            }
        }
    }

    async fn try_run(
        &self,
        suite: &SuiteSpec,
        name: &str,
        started: Instant,
    ) -> Result<SuiteResult, SuiteRunnerError> {
        let suite_path = self.suite_path(suite);
        let resolved = if suite_path.is_absolute() {
            suite_path.clone()
        } else {
            self.working_dir.join(&suite_path)
        };
        if !tokio::fs::try_exists(&resolved).await.unwrap_or(false) {
            return Err(SuiteRunnerError::SuiteNotFound {
                suite: name.to_owned(),
                path: resolved.display().to_string(),
            });
        }

        // 실행마다 새로 만들고 drop 시 삭제
        let report_file = tempfile::Builder::new()
            .prefix("stackprobe-")
            .suffix(".json")
            .tempfile()?;
        let args = self.build_args(suite, &resolved, report_file.path());
        debug!(suite = %name, program = %self.program, ?args, "spawning suite process");

        let child = Command::new(&self.program)
            .args(&args)
            .current_dir(&self.working_dir)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SuiteRunnerError::Spawn {
                suite: name.to_owned(),
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(SuiteRunnerError::Spawn {
                    suite: name.to_owned(),
                    program: self.program.clone(),
                    reason: format!("failed while waiting for process: {e}"),
                });
            }
            Err(_) => {
                return Err(SuiteRunnerError::Timeout {
                    suite: name.to_owned(),
                    timeout: self.timeout,
                });
            }
        };

        let elapsed = started.elapsed().as_secs_f64();
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let status = output.status;
        debug!(suite = %name, exit = ?status.code(), stderr_len = stderr.len(), "suite process exited");

        let source = self
            .resolve_source(name, report_file.path(), &stdout, &stderr)
            .await;

        let result = match source {
            Some(source) => {
                debug!(suite = %name, source = source.label(), "results resolved");
                match source {
                    ResultSource::Structured(report) => report.into_suite_result(name, elapsed),
                    ResultSource::TextFallback(counts) => {
                        SuiteResult::from_counts(name, counts, elapsed, Vec::new())
                    }
                }
            }
            None => {
                return Ok(SuiteResult::synthetic_error(
                    name,
                    "error",
                    format!(
                        "no test results could be parsed (exit status {})",
                        exit_label(status.code())
                    ),
                    elapsed,
                ));
            }
        };

        if result.total == 0 && !status.success() {
            return Ok(SuiteResult::synthetic_error(
                name,
                "error",
                format!(
                    "suite exited with status {} without reporting any tests",
                    exit_label(status.code())
                ),
                elapsed,
            ));
        }
        Ok(result)
    }

    /// 구조화 결과 → stdout 요약 라인 → stderr 순서로 사용합니다.
    async fn resolve_source(
        &self,
        name: &str,
        report_path: &Path,
        stdout: &str,
        stderr: &str,
    ) -> Option<ResultSource> {
        if self.structured_report {
            match tokio::fs::read_to_string(report_path).await {
                Ok(raw) if !raw.trim().is_empty() => match StructuredReport::from_json(&raw) {
                    Ok(report) => return Some(ResultSource::Structured(report)),
                    Err(e) => {
                        let err = SuiteRunnerError::ReportParse {
                            suite: name.to_owned(),
                            reason: e.to_string(),
                        };
                        warn!(suite = %name, error = %err, "falling back to text summary");
                    }
                },
                Ok(_) => debug!(suite = %name, "structured report is empty"),
                Err(e) => debug!(suite = %name, error = %e, "structured report unavailable"),
            }
        }

        summary::parse_summary(stdout)
            .filter(|c| c.total() > 0)
            .or_else(|| summary::parse_summary(stderr).filter(|c| c.total() > 0))
            .map(ResultSource::TextFallback)
    }
}

/// 설정에서 유도한, 스위트 프로세스에 주입할 환경변수
pub fn child_environment(config: &StackprobeConfig) -> BTreeMap<String, String> {
    let t = &config.targets;
    let test_dir = Path::new(&config.runner.project_root).join(&config.runner.test_dir);
    BTreeMap::from([
        ("SYNAPSE_URL".to_owned(), t.synapse_url.clone()),
        ("ELEMENT_URL".to_owned(), t.element_url.clone()),
        ("SYNAPSE_SERVER_NAME".to_owned(), t.server_name.clone()),
        ("TEST_USER_PASSWORD".to_owned(), t.test_user_password.clone()),
        ("HEADLESS".to_owned(), t.headless.to_string()),
        (
            "TEST_TIMEOUT".to_owned(),
            config.runner.timeout_secs.to_string(),
        ),
        ("PYTHONPATH".to_owned(), test_dir.display().to_string()),
    ])
}

fn exit_label(code: Option<i32>) -> String {
    code.map_or_else(|| "signal".to_owned(), |c| c.to_string())
}
