//! 준비 상태 프로버 에러 타입
//!
//! 프로버 자체는 실패하지 않습니다. 이 에러는 HTTP 클라이언트 한 번의
//! 요청 실패를 표현하며, 프로버는 이를 [`ServiceHealth::last_error`]에 기록합니다.
//!
//! [`ServiceHealth::last_error`]: stackprobe_core::types::ServiceHealth::last_error

use stackprobe_core::error::{ReadinessError, StackprobeError};

/// HTTP 요청 에러
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProbeError {
    /// 요청 타임아웃
    #[error("request to {url} timed out")]
    Timeout {
        /// 요청 URL
        url: String,
    },

    /// 연결 실패 등 요청 에러
    #[error("request to {url} failed: {reason}")]
    Request {
        /// 요청 URL
        url: String,
        /// 실패 사유
        reason: String,
    },

    /// HTTP 클라이언트 생성 실패
    #[error("http client error: {0}")]
    Client(String),
}

impl From<ProbeError> for StackprobeError {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::Timeout { url } => StackprobeError::Readiness(ReadinessError::Probe {
                url,
                reason: "timed out".to_owned(),
            }),
            ProbeError::Request { url, reason } => {
                StackprobeError::Readiness(ReadinessError::Probe { url, reason })
            }
            ProbeError::Client(reason) => StackprobeError::Readiness(ReadinessError::Probe {
                url: String::new(),
                reason,
            }),
        }
    }
}
