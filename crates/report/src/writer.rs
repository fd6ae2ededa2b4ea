//! 리포트 파일 출력
//!
//! 출력 디렉토리(중간 디렉토리 포함)를 만들고
//! `test_report_<YYYYmmdd_HHMMSS>.{json,html}` 파일을 씁니다.
//! 파일 이름의 시각은 리포트 자체의 타임스탬프에서 가져오므로
//! 같은 리포트는 항상 같은 경로에 기록됩니다.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use stackprobe_core::RunReport;
use tracing::info;

use crate::error::ReportError;
use crate::html::render_html;
use crate::json::render_json;

/// 출력 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Json,
    Html,
    Both,
}

impl ReportFormat {
    pub fn includes_json(self) -> bool {
        matches!(self, Self::Json | Self::Both)
    }

    pub fn includes_html(self) -> bool {
        matches!(self, Self::Html | Self::Both)
    }
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "html" => Ok(Self::Html),
            "both" => Ok(Self::Both),
            other => Err(ReportError::UnknownFormat(other.to_owned())),
        }
    }
}

/// 기록된 파일 경로
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WrittenReports {
    pub json: Option<PathBuf>,
    pub html: Option<PathBuf>,
}

/// 리포트 파일 이름 (확장자 제외)
pub fn report_stem(report: &RunReport) -> String {
    format!("test_report_{}", report.timestamp.format("%Y%m%d_%H%M%S"))
}

/// JSON 리포트를 `output_dir`에 씁니다.
pub async fn write_json_report(
    report: &RunReport,
    output_dir: &Path,
) -> Result<PathBuf, ReportError> {
    let content = render_json(report)?;
    let path = output_dir.join(format!("{}.json", report_stem(report)));
    write_file(&path, content).await?;
    Ok(path)
}

/// HTML 리포트를 `output_dir`에 씁니다.
pub async fn write_html_report(
    report: &RunReport,
    output_dir: &Path,
) -> Result<PathBuf, ReportError> {
    let content = render_html(report);
    let path = output_dir.join(format!("{}.html", report_stem(report)));
    write_file(&path, content).await?;
    Ok(path)
}

/// 선택한 형식의 리포트를 모두 씁니다.
pub async fn write_reports(
    report: &RunReport,
    output_dir: impl AsRef<Path>,
    format: ReportFormat,
) -> Result<WrittenReports, ReportError> {
    let output_dir = output_dir.as_ref();
    let mut written = WrittenReports::default();
    if format.includes_json() {
        written.json = Some(write_json_report(report, output_dir).await?);
    }
    if format.includes_html() {
        written.html = Some(write_html_report(report, output_dir).await?);
    }
    Ok(written)
}

async fn write_file(path: &Path, content: String) -> Result<(), ReportError> {
    let io_err = |source| ReportError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    tokio::fs::write(path, content).await.map_err(io_err)?;
    info!(path = %path.display(), "report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parsing() {
        assert_eq!("json".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert_eq!("HTML".parse::<ReportFormat>().unwrap(), ReportFormat::Html);
        assert_eq!("both".parse::<ReportFormat>().unwrap(), ReportFormat::Both);
        assert!("pdf".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn format_inclusion() {
        assert!(ReportFormat::Both.includes_json() && ReportFormat::Both.includes_html());
        assert!(!ReportFormat::Json.includes_html());
        assert!(!ReportFormat::Html.includes_json());
    }
}
