//! 스위트 실행기 에러 타입
//!
//! [`SuiteRunnerError`]는 실행기 내부에서만 쓰입니다. [`SuiteExecutor::run`]은
//! 이 에러를 밖으로 던지지 않고 합성된 `error` 테스트 결과로 변환합니다.
//! 다른 경로로 전파가 필요할 때를 위해 `From<SuiteRunnerError> for StackprobeError`
//! 변환이 구현되어 있습니다.
//!
//! [`SuiteExecutor::run`]: crate::SuiteExecutor::run

use std::time::Duration;

use stackprobe_core::error::{ExecutionError, StackprobeError};

/// 스위트 실행기 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum SuiteRunnerError {
    /// 제한 시간 초과
    #[error("suite '{suite}' timed out after {}s", timeout.as_secs_f64())]
    Timeout {
        /// 스위트 이름
        suite: String,
        /// 적용된 제한 시간
        timeout: Duration,
    },

    /// 프로세스 생성 실패
    #[error("failed to spawn '{program}' for suite '{suite}': {reason}")]
    Spawn {
        /// 스위트 이름
        suite: String,
        /// 실행하려던 프로그램
        program: String,
        /// 실패 사유
        reason: String,
    },

    /// 스위트 파일 없음
    #[error("suite file not found: {path}")]
    SuiteNotFound {
        /// 스위트 이름
        suite: String,
        /// 확인한 경로
        path: String,
    },

    /// 구조화 결과 파싱 실패
    #[error("failed to parse structured report of suite '{suite}': {reason}")]
    ReportParse {
        /// 스위트 이름
        suite: String,
        /// 실패 사유
        reason: String,
    },

    /// 결과 파일 준비 실패
    #[error("result file error: {0}")]
    ResultFile(#[from] std::io::Error),
}

impl SuiteRunnerError {
    /// 합성 결과에 쓰일 테스트 이름 (`timeout` 또는 `error`)
    pub fn synthetic_test_name(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            _ => "error",
        }
    }
}

impl From<SuiteRunnerError> for StackprobeError {
    fn from(err: SuiteRunnerError) -> Self {
        match err {
            SuiteRunnerError::Timeout { suite, timeout } => {
                StackprobeError::Execution(ExecutionError::ProcessTimeout {
                    suite,
                    timeout_secs: timeout.as_secs_f64(),
                })
            }
            SuiteRunnerError::Spawn { suite, reason, .. } => {
                StackprobeError::Execution(ExecutionError::ProcessSpawnFailure { suite, reason })
            }
            SuiteRunnerError::SuiteNotFound { suite, path } => {
                StackprobeError::Execution(ExecutionError::ProcessSpawnFailure {
                    suite,
                    reason: format!("suite file not found: {path}"),
                })
            }
            SuiteRunnerError::ReportParse { suite, reason } => {
                StackprobeError::Execution(ExecutionError::ResultParseFailure { suite, reason })
            }
            SuiteRunnerError::ResultFile(e) => StackprobeError::Io(e),
        }
    }
}
