//! stackprobe 공통 크레이트
//!
//! 모든 컴포넌트가 공유하는 설정, 에러 분류, 리포트 데이터 모델,
//! 결과 집계기를 제공합니다.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, DeploymentError, ExecutionError, ReadinessError, StackprobeError};

// 설정
pub use config::{ServiceEndpoint, StackprobeConfig, SuiteSpec};

// 집계
pub use aggregate::RunSummary;

// 도메인 타입
pub use types::{
    EnvironmentSnapshot, OutcomeCounts, RunReport, ServiceHealth, SuiteResult, TestCaseResult,
    TestStatus,
};
