//! 사람이 읽는 요약 라인용 대체 파서
//!
//! 구조화 결과 파일이 없을 때만 사용합니다. 결과 키워드를 포함한 마지막
//! 출력 라인을 찾아 각 키워드 바로 앞의 정수 토큰을 읽습니다.
//! `"12 passed, 3 failed in 4.21s"` → `passed = 12, failed = 3`.
//!
//! 최선 노력(best-effort) 결과입니다. 키워드 바로 앞의 무관한 숫자는 잘못
//! 읽히므로 구조화 결과가 있으면 항상 그쪽이 우선합니다.

use stackprobe_core::types::OutcomeCounts;

const KEYWORDS: [&str; 4] = ["passed", "failed", "skipped", "error"];

/// 결과 키워드를 포함한 마지막 라인을 반환합니다.
pub fn find_summary_line(output: &str) -> Option<&str> {
    output
        .lines()
        .rev()
        .find(|line| KEYWORDS.iter().any(|kw| line.contains(kw)))
}

/// 요약 라인 하나에서 카운터를 추출합니다.
///
/// 없거나 파싱할 수 없는 값은 0입니다. 키워드마다 첫 번째 등장만 사용합니다.
pub fn parse_summary_line(line: &str) -> OutcomeCounts {
    let mut counts = OutcomeCounts::default();
    let mut seen = [false; 4];
    let mut previous: Option<&str> = None;

    for token in line
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let slot = match token {
            "passed" => Some(0),
            "failed" => Some(1),
            "skipped" => Some(2),
            "error" | "errors" => Some(3),
            _ => None,
        };

        let number = previous.and_then(|p| p.parse::<u32>().ok());
        if let (Some(idx), Some(n)) = (slot, number) {
            if !seen[idx] {
                seen[idx] = true;
                match idx {
                    0 => counts.passed = n,
                    1 => counts.failed = n,
                    2 => counts.skipped = n,
                    _ => counts.errors = n,
                }
            }
        }
        previous = Some(token);
    }

    counts
}

/// `output`에서 요약 라인을 찾아 파싱합니다.
///
/// 결과 키워드를 포함한 라인이 없으면 `None`
pub fn parse_summary(output: &str) -> Option<OutcomeCounts> {
    find_summary_line(output).map(parse_summary_line)
}
