//! 구조화 (JSON) 리포트 문서
//!
//! [`RunReport`]를 필드 그대로 직렬화합니다. 렌더링은 결정적이므로 같은
//! 리포트는 항상 같은 바이트를 만듭니다.

use std::path::Path;

use stackprobe_core::RunReport;

use crate::error::ReportError;

/// `report`의 pretty-print JSON 문서
pub fn render_json(report: &RunReport) -> Result<String, ReportError> {
    serde_json::to_string_pretty(report).map_err(|e| ReportError::Serialize(e.to_string()))
}

/// JSON 문서에서 리포트를 복원합니다.
pub fn parse_json(raw: &str) -> Result<RunReport, ReportError> {
    serde_json::from_str(raw).map_err(|e| ReportError::Parse {
        path: "<memory>".to_owned(),
        reason: e.to_string(),
    })
}

/// [`write_reports`](crate::write_reports)가 기록한 JSON 리포트를 읽습니다.
pub async fn read_json_report(path: impl AsRef<Path>) -> Result<RunReport, ReportError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ReportError::Io {
            path: path.display().to_string(),
            source,
        })?;
    serde_json::from_str(&raw).map_err(|e| ReportError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}
