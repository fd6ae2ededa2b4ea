//! 리포트 렌더러 에러 타입
//!
//! [`ReportError`]는 리포트 직렬화, 파일 쓰기, 다시 읽기 단계의 에러를 표현합니다.
//! `From<ReportError> for StackprobeError`로 상위 레이어에 전파됩니다.

use stackprobe_core::error::StackprobeError;

/// 리포트 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// 직렬화 실패
    #[error("report serialization failed: {0}")]
    Serialize(String),

    /// 리포트 문서를 데이터 모델로 복원할 수 없음
    #[error("report parse error: {path}: {reason}")]
    Parse {
        /// 읽은 파일 경로 (메모리 입력이면 `<memory>`)
        path: String,
        /// 파싱 실패 사유
        reason: String,
    },

    /// 알 수 없는 출력 형식
    #[error("unknown report format '{0}' (expected json, html or both)")]
    UnknownFormat(String),

    /// 파일 I/O 에러
    #[error("io error: {path}: {source}")]
    Io {
        /// 관련 경로
        path: String,
        /// 원인 에러
        source: std::io::Error,
    },
}

impl From<ReportError> for StackprobeError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::Io { source, .. } => StackprobeError::Io(source),
            other => StackprobeError::Report(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_format_display() {
        let err = ReportError::UnknownFormat("xml".to_owned());
        assert_eq!(
            err.to_string(),
            "unknown report format 'xml' (expected json, html or both)"
        );
    }

    #[test]
    fn converts_to_report_variant() {
        let err: StackprobeError = ReportError::Serialize("boom".to_owned()).into();
        assert!(matches!(err, StackprobeError::Report(ref msg) if msg.contains("boom")));
    }
}
