//! 결과 집계 -- 스위트 결과 목록에서 실행 요약을 계산
//!
//! 순수 함수이며 I/O가 없습니다. 빈 스위트 목록도 모든 카운터가 0인
//! 요약을 만듭니다.

use serde::{Deserialize, Serialize};

use crate::types::SuiteResult;

/// 실행 전체 요약 카운터
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_suites: u32,
    pub total_tests: u32,
    pub total_passed: u32,
    pub total_failed: u32,
    pub total_skipped: u32,
    pub total_errors: u32,
}

impl RunSummary {
    /// 스위트별 카운터를 단순 합산합니다.
    pub fn from_suites(suites: &[SuiteResult]) -> Self {
        suites.iter().fold(
            Self {
                total_suites: u32::try_from(suites.len()).unwrap_or(u32::MAX),
                ..Self::default()
            },
            |acc, suite| Self {
                total_suites: acc.total_suites,
                total_tests: acc.total_tests.saturating_add(suite.total),
                total_passed: acc.total_passed.saturating_add(suite.passed),
                total_failed: acc.total_failed.saturating_add(suite.failed),
                total_skipped: acc.total_skipped.saturating_add(suite.skipped),
                total_errors: acc.total_errors.saturating_add(suite.errors),
            },
        )
    }

    /// 실패 0, 에러 0이면 통과
    pub fn overall_passed(&self) -> bool {
        self.total_failed == 0 && self.total_errors == 0
    }

    /// 통과율 (%). 테스트가 없으면 `None`
    pub fn success_rate(&self) -> Option<f64> {
        if self.total_tests == 0 {
            return None;
        }
        Some(f64::from(self.total_passed) / f64::from(self.total_tests) * 100.0)
    }
}
