//! stackprobe 리포트 렌더러
//!
//! 완성된 [`RunReport`](stackprobe_core::RunReport)를 두 가지 독립 문서로 렌더링합니다.
//!
//! # 모듈 구성
//!
//! - [`json`]: 구조화 문서 (직렬화/역직렬화 왕복 가능)
//! - [`html`]: 사람이 읽는 문서
//! - [`writer`]: 출력 디렉토리와 타임스탬프 파일 이름 처리
//! - [`error`]: `ReportError`

pub mod error;
pub mod html;
pub mod json;
pub mod writer;

pub use error::ReportError;
pub use html::{escape_html, render_html};
pub use json::{parse_json, read_json_report, render_json};
pub use writer::{
    ReportFormat, WrittenReports, report_stem, write_html_report, write_json_report,
    write_reports,
};
