//! 구조화 결과 파일 (pytest-json-report 스키마)
//!
//! 실행기가 사용하는 필드만 모델링하며 나머지는 무시합니다.

use serde::Deserialize;

use stackprobe_core::types::{OutcomeCounts, SuiteResult, TestCaseResult, TestStatus};

/// 구조화 리포트 최상위
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StructuredReport {
    /// 도구가 보고한 집계 카운터
    #[serde(default)]
    pub summary: StructuredSummary,
    /// 실행 순서대로의 테스트 레코드
    #[serde(default)]
    pub tests: Vec<StructuredTest>,
}

/// 구조화 리포트의 카운터 블록
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StructuredSummary {
    #[serde(default)]
    pub passed: u32,
    #[serde(default)]
    pub failed: u32,
    #[serde(default)]
    pub skipped: u32,
    #[serde(default, alias = "errors")]
    pub error: u32,
    #[serde(default)]
    pub xfailed: u32,
    #[serde(default)]
    pub xpassed: u32,
}

/// 테스트 레코드 하나
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StructuredTest {
    pub nodeid: String,
    pub outcome: String,
    #[serde(default)]
    pub setup: Option<Phase>,
    #[serde(default)]
    pub call: Option<Phase>,
    #[serde(default)]
    pub teardown: Option<Phase>,
}

/// setup / call / teardown 단계
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Phase {
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub crash: Option<Crash>,
    #[serde(default)]
    pub longrepr: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Crash {
    #[serde(default)]
    pub message: Option<String>,
}

impl StructuredReport {
    /// JSON 문서를 파싱합니다.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// 요약 블록에서 카운터를 계산합니다.
    ///
    /// `xfailed`는 skipped로, `xpassed`는 passed로 셉니다. 합산은 포화 연산입니다.
    pub fn summary_counts(&self) -> OutcomeCounts {
        let s = &self.summary;
        OutcomeCounts {
            passed: s.passed.saturating_add(s.xpassed),
            failed: s.failed,
            skipped: s.skipped.saturating_add(s.xfailed),
            errors: s.error,
        }
    }

    /// 스위트 결과로 변환합니다.
    ///
    /// 테스트 레코드가 있으면 카운터를 레코드에서 직접 세므로 항상 케이스 목록과
    /// 일치합니다. 없으면 요약 블록을 사용하고 케이스 목록은 비어 있습니다.
    pub fn into_suite_result(self, suite: &str, duration: f64) -> SuiteResult {
        if self.tests.is_empty() {
            return SuiteResult::from_counts(suite, self.summary_counts(), duration, Vec::new());
        }
        let tests = self
            .tests
            .iter()
            .map(|t| t.to_case(suite))
            .collect::<Vec<_>>();
        SuiteResult::from_tests(suite, duration, tests)
    }
}

impl StructuredTest {
    /// 짧은 테스트 이름 (node id의 마지막 `::` 세그먼트)
    pub fn short_name(&self) -> &str {
        self.nodeid.rsplit("::").next().unwrap_or(&self.nodeid)
    }

    fn phases(&self) -> impl Iterator<Item = &Phase> {
        [&self.setup, &self.call, &self.teardown]
            .into_iter()
            .filter_map(Option::as_ref)
    }

    /// 단계별 소요 시간의 합
    pub fn duration(&self) -> f64 {
        self.phases().map(|p| p.duration).sum()
    }

    /// 실패 정보를 가진 첫 단계
    fn failing_phase(&self) -> Option<&Phase> {
        self.phases()
            .find(|p| p.crash.is_some() || p.longrepr.as_deref().is_some_and(|l| !l.is_empty()))
    }

    fn to_case(&self, suite: &str) -> TestCaseResult {
        let status = TestStatus::from_outcome(&self.outcome);
        let mut case = TestCaseResult::new(suite, self.short_name(), status, self.duration());

        if let Some(phase) = self.failing_phase() {
            let crash_message = phase.crash.as_ref().and_then(|c| c.message.clone());
            if let Some(message) = crash_message.or_else(|| phase.longrepr.clone()) {
                case = case.with_message(message);
            }
            if let Some(longrepr) = phase.longrepr.clone() {
                case = case.with_details(longrepr);
            }
        }
        case
    }
}
