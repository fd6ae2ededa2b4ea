//! 사람이 읽는 (HTML) 리포트 문서
//!
//! 구성: 헤더, 집계 카운터 타일, 스위트별 개요 표, 스위트별로 묶은 테스트
//! 상세, 그리고 전체 판정 하나. 리포트에서 온 텍스트는 모두 이스케이프합니다.

use stackprobe_core::{RunReport, SuiteResult};

const STYLE: &str = "body{font-family:sans-serif;margin:2em;color:#222}\
.tiles{display:flex;gap:1em;margin:1em 0}\
.tile{border:1px solid #ccc;border-radius:6px;padding:.6em 1.2em;text-align:center}\
.tile .value{font-size:1.6em;font-weight:bold}\
table{border-collapse:collapse;width:100%;margin-bottom:1.5em}\
th,td{border:1px solid #ddd;padding:.35em .6em;text-align:left}\
.passed{color:#1a7f37}.failed{color:#cf222e}.skipped{color:#9a6700}.error{color:#8250df}\
.verdict{font-size:1.4em;font-weight:bold;padding:.5em;border-radius:6px}\
.verdict.pass{background:#dafbe1}.verdict.fail{background:#ffebe9}\
pre{white-space:pre-wrap;margin:0;font-size:.85em}";

/// `&`, `<`, `>`, `"`, `'`를 이스케이프합니다.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// `report`를 독립 실행형 HTML 페이지로 렌더링합니다.
pub fn render_html(report: &RunReport) -> String {
    let summary = &report.summary;
    let passed = report.overall_passed();
    let mut html = String::with_capacity(4096);

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>stackprobe test report</title>\n");
    html.push_str(&format!("<style>{STYLE}</style>\n</head>\n<body>\n"));

    html.push_str("<h1>Test Report</h1>\n");
    html.push_str(&format!(
        "<p>Generated {} &middot; duration {:.2}s &middot; platform {} ({})</p>\n",
        escape_html(&report.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        report.total_duration,
        escape_html(&report.environment.platform),
        escape_html(&report.environment.arch),
    ));

    html.push_str("<div class=\"tiles\">\n");
    for (label, value, class) in [
        ("Suites", summary.total_suites, ""),
        ("Tests", summary.total_tests, ""),
        ("Passed", summary.total_passed, "passed"),
        ("Failed", summary.total_failed, "failed"),
        ("Skipped", summary.total_skipped, "skipped"),
        ("Errors", summary.total_errors, "error"),
    ] {
        html.push_str(&format!(
            "<div class=\"tile {class}\"><div class=\"value\">{value}</div><div>{label}</div></div>\n"
        ));
    }
    let rate = summary
        .success_rate()
        .map_or_else(|| "n/a".to_owned(), |r| format!("{r:.1}%"));
    html.push_str(&format!(
        "<div class=\"tile\"><div class=\"value\">{rate}</div><div>Success rate</div></div>\n</div>\n"
    ));

    html.push_str("<h2>Suites</h2>\n<table>\n<tr><th>Suite</th><th>Passed</th><th>Duration</th></tr>\n");
    for suite in &report.suites {
        let class = if suite.is_success() { "passed" } else { "failed" };
        html.push_str(&format!(
            "<tr><td>{}</td><td class=\"{class}\">{}/{}</td><td>{:.2}s</td></tr>\n",
            escape_html(&suite.name),
            suite.passed,
            suite.total,
            suite.duration,
        ));
    }
    html.push_str("</table>\n");

    for suite in &report.suites {
        render_suite(&mut html, suite);
    }

    let (class, label) = if passed {
        ("pass", "PASS")
    } else {
        ("fail", "FAIL")
    };
    html.push_str(&format!(
        "<div class=\"verdict {class}\">Overall Result: {label}</div>\n</body>\n</html>\n"
    ));
    html
}

fn render_suite(html: &mut String, suite: &SuiteResult) {
    html.push_str(&format!("<h3>{}</h3>\n", escape_html(&suite.name)));
    if suite.tests.is_empty() {
        html.push_str("<p>No individual test results recorded.</p>\n");
        return;
    }
    html.push_str("<table>\n<tr><th>Test</th><th>Status</th><th>Duration</th><th>Message</th></tr>\n");
    for test in &suite.tests {
        let message = test
            .message
            .as_deref()
            .map(|m| format!("<pre>{}</pre>", escape_html(m)))
            .unwrap_or_default();
        html.push_str(&format!(
            "<tr><td>{}</td><td class=\"{}\">{}</td><td>{:.3}s</td><td>{message}</td></tr>\n",
            escape_html(&test.name),
            test.status.as_str(),
            test.status,
            test.duration,
        ));
    }
    html.push_str("</table>\n");
}
