//! 도메인 타입 -- 실행 결과 리포트 모델
//!
//! 스위트 실행기, 집계기, 렌더러가 공유하는 데이터 구조를 정의합니다.
//! 모든 타입은 `Serialize`/`Deserialize`를 구현하여 구조화 리포트로
//! 손실 없이 왕복할 수 있습니다.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::RunSummary;

/// 개별 테스트 결과 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    Error,
}

impl TestStatus {
    /// 테스트 도구가 보고한 outcome 문자열을 상태로 변환합니다.
    ///
    /// `xfailed`는 skipped, `xpassed`는 passed로 취급하며,
    /// 알 수 없는 값은 `Error`가 됩니다.
    pub fn from_outcome(outcome: &str) -> Self {
        match outcome.trim().to_ascii_lowercase().as_str() {
            "passed" | "xpassed" => Self::Passed,
            "failed" => Self::Failed,
            "skipped" | "xfailed" | "deselected" => Self::Skipped,
            _ => Self::Error,
        }
    }

    /// 소문자 상태 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 단일 테스트 케이스 결과
///
/// 생성 후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseResult {
    /// 소속 스위트 이름
    pub suite: String,
    /// 테스트 이름
    pub name: String,
    /// 결과 상태
    pub status: TestStatus,
    /// 실행 시간 (초, 0 이상)
    pub duration: f64,
    /// 요약 메시지
    pub message: Option<String>,
    /// 상세 출력 (traceback 등)
    pub details: Option<String>,
}

impl TestCaseResult {
    /// 메시지 없이 새 결과를 생성합니다. 음수 실행 시간은 0으로 고정됩니다.
    pub fn new(
        suite: impl Into<String>,
        name: impl Into<String>,
        status: TestStatus,
        duration: f64,
    ) -> Self {
        Self {
            suite: suite.into(),
            name: name.into(),
            status,
            duration: clamp_duration(duration),
            message: None,
            details: None,
        }
    }

    /// 메시지를 설정합니다.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// 상세 출력을 설정합니다.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// 상태별 카운터
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub errors: u32,
}

impl OutcomeCounts {
    /// 네 카운터의 합. 자식 프로세스 출력에서 온 값이므로 `u32::MAX`에서 포화됩니다.
    pub fn total(&self) -> u32 {
        self.passed
            .saturating_add(self.failed)
            .saturating_add(self.skipped)
            .saturating_add(self.errors)
    }

    /// 상태 하나를 카운트합니다.
    pub fn record(&mut self, status: TestStatus) {
        match status {
            TestStatus::Passed => self.passed = self.passed.saturating_add(1),
            TestStatus::Failed => self.failed = self.failed.saturating_add(1),
            TestStatus::Skipped => self.skipped = self.skipped.saturating_add(1),
            TestStatus::Error => self.errors = self.errors.saturating_add(1),
        }
    }

    /// 테스트 결과 목록에서 카운터를 계산합니다.
    pub fn tally<'a>(tests: impl IntoIterator<Item = &'a TestCaseResult>) -> Self {
        let mut counts = Self::default();
        for test in tests {
            counts.record(test.status);
        }
        counts
    }
}

/// 스위트 실행 결과
///
/// 불변식: `total == passed + failed + skipped + errors`.
/// 모든 생성자가 카운터 합으로 `total`을 계산합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteResult {
    /// 스위트 이름
    pub name: String,
    /// 전체 테스트 수
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub errors: u32,
    /// 스위트 실행 시간 (초)
    pub duration: f64,
    /// 실행 순서대로의 테스트 결과
    pub tests: Vec<TestCaseResult>,
}

impl SuiteResult {
    /// 카운터와 테스트 목록으로 결과를 생성합니다.
    pub fn from_counts(
        name: impl Into<String>,
        counts: OutcomeCounts,
        duration: f64,
        tests: Vec<TestCaseResult>,
    ) -> Self {
        Self {
            name: name.into(),
            total: counts.total(),
            passed: counts.passed,
            failed: counts.failed,
            skipped: counts.skipped,
            errors: counts.errors,
            duration: clamp_duration(duration),
            tests,
        }
    }

    /// 테스트 목록에서 카운터를 계산하여 결과를 생성합니다.
    pub fn from_tests(name: impl Into<String>, duration: f64, tests: Vec<TestCaseResult>) -> Self {
        let counts = OutcomeCounts::tally(&tests);
        Self::from_counts(name, counts, duration, tests)
    }

    /// 실행 실패를 나타내는 단일 `error` 결과를 합성합니다.
    ///
    /// `total = 1`, `errors = 1`, 나머지 카운터는 0입니다.
    pub fn synthetic_error(
        name: impl Into<String>,
        test_name: &str,
        message: impl Into<String>,
        duration: f64,
    ) -> Self {
        let name = name.into();
        let test = TestCaseResult::new(name.clone(), test_name, TestStatus::Error, duration)
            .with_message(message);
        Self::from_tests(name, duration, vec![test])
    }

    /// 카운터 묶음
    pub fn counts(&self) -> OutcomeCounts {
        OutcomeCounts {
            passed: self.passed,
            failed: self.failed,
            skipped: self.skipped,
            errors: self.errors,
        }
    }

    /// 실패와 에러가 모두 0이면 성공
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}

/// 실행 환경 스냅샷
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    /// 운영체제 (예: "linux")
    pub platform: String,
    /// CPU 아키텍처
    pub arch: String,
    /// stackprobe 버전
    pub tool_version: String,
    /// 프로젝트 작업 디렉토리
    pub working_directory: String,
    /// 테스트 디렉토리
    pub test_directory: String,
    /// 해석된 설정 (민감 정보 마스킹됨)
    pub config: serde_json::Value,
    /// 스위트 프로세스에 주입된 환경변수
    pub environment_variables: BTreeMap<String, String>,
}

/// 서비스 준비 상태 기록
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealth {
    /// 서비스 이름
    pub name: String,
    /// 헬스 체크 URL
    pub url: String,
    /// 준비 여부
    pub ready: bool,
    /// 준비까지 (또는 포기까지) 걸린 시간 (초)
    pub elapsed_secs: f64,
    /// 시도 횟수
    pub attempts: u32,
    /// 마지막 HTTP 상태 코드
    pub last_status: Option<u16>,
    /// 마지막 실패 사유
    pub last_error: Option<String>,
}

/// 전체 실행 리포트
///
/// 호출당 한 번 [`RunReport::assemble`]로 만들어지며 이후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// 리포트 생성 시각
    pub timestamp: DateTime<Utc>,
    /// 실행 환경
    pub environment: EnvironmentSnapshot,
    /// 실행 완료 순서대로의 스위트 결과
    pub suites: Vec<SuiteResult>,
    /// 전체 실행 시간 (초)
    pub total_duration: f64,
    /// 집계 카운터
    pub summary: RunSummary,
}

impl RunReport {
    /// 스위트 결과로 리포트를 조립합니다. 요약은 스위트 목록에서 계산됩니다.
    pub fn assemble(
        timestamp: DateTime<Utc>,
        environment: EnvironmentSnapshot,
        suites: Vec<SuiteResult>,
        total_duration: f64,
    ) -> Self {
        let summary = RunSummary::from_suites(&suites);
        Self {
            timestamp,
            environment,
            suites,
            total_duration: clamp_duration(total_duration),
            summary,
        }
    }

    /// 전체 통과 여부 (실패 0, 에러 0)
    pub fn overall_passed(&self) -> bool {
        self.summary.overall_passed()
    }
}

fn clamp_duration(duration: f64) -> f64 {
    if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        0.0
    }
}
