//! 시작 후 기능 스모크 검사
//!
//! 실행 중인 스택에 고정된 세 가지 요청을 보냅니다. 홈서버 헬스 검사만
//! 필수 단언이고 나머지는 권고성입니다.

use std::time::Duration;

use serde::Serialize;
use stackprobe_core::config::TargetsConfig;
use stackprobe_readiness::HttpClient;
use tracing::{info, warn};

use crate::error::DeployError;

pub const SYNAPSE_HEALTH: &str = "synapse_health";
pub const ELEMENT_WEB: &str = "element_web";
pub const MATRIX_API: &str = "matrix_api";

/// 스모크 요청 하나의 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmokeCheckResult {
    pub name: String,
    pub url: String,
    pub passed: bool,
    /// 핵심 검사가 실패하면 배포가 실패합니다.
    pub core: bool,
    pub status: Option<u16>,
    pub detail: Option<String>,
}

/// 실행 순서대로의 스모크 검사 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SmokeReport {
    pub checks: Vec<SmokeCheckResult>,
}

impl SmokeReport {
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    pub fn core_failures(&self) -> Vec<&SmokeCheckResult> {
        self.checks.iter().filter(|c| c.core && !c.passed).collect()
    }

    /// 처음 실패한 핵심 검사에 대해 `Err(SmokeCheck)`
    pub fn ensure_core_passed(&self) -> Result<(), DeployError> {
        match self.core_failures().first() {
            None => Ok(()),
            Some(check) => Err(DeployError::SmokeCheck {
                check: check.name.clone(),
                reason: check
                    .detail
                    .clone()
                    .unwrap_or_else(|| "check failed".to_owned()),
            }),
        }
    }
}

/// `targets`에 대해 스모크 검사를 실행합니다.
///
/// 웹 클라이언트 루트 페이지에 `web_marker`가 (대소문자 무시) 포함되어야 합니다.
pub async fn run_smoke_checks<H: HttpClient>(
    client: &H,
    targets: &TargetsConfig,
    web_marker: &str,
    request_timeout: Duration,
) -> SmokeReport {
    let synapse = targets.synapse_url.trim_end_matches('/');
    let mut checks = Vec::with_capacity(3);

    let url = format!("{synapse}/health");
    checks.push(
        check(client, SYNAPSE_HEALTH, &url, true, request_timeout, |_| Ok(())).await,
    );

    let marker = web_marker.to_lowercase();
    checks.push(
        check(
            client,
            ELEMENT_WEB,
            &targets.element_url,
            false,
            request_timeout,
            |body| {
                if body.to_lowercase().contains(&marker) {
                    Ok(())
                } else {
                    Err(format!("page does not mention '{marker}'"))
                }
            },
        )
        .await,
    );

    let url = format!("{synapse}/_matrix/client/versions");
    checks.push(check(client, MATRIX_API, &url, false, request_timeout, has_versions).await);

    for c in &checks {
        if c.passed {
            info!(check = %c.name, status = ?c.status, "smoke check passed");
        } else {
            warn!(
                check = %c.name,
                core = c.core,
                detail = c.detail.as_deref().unwrap_or(""),
                "smoke check failed"
            );
        }
    }
    SmokeReport { checks }
}

async fn check<H, F>(
    client: &H,
    name: &str,
    url: &str,
    core: bool,
    timeout: Duration,
    inspect: F,
) -> SmokeCheckResult
where
    H: HttpClient,
    F: FnOnce(&str) -> Result<(), String>,
{
    let (passed, status, detail) = match client.get(url, timeout).await {
        Ok(response) if response.status == 200 => match inspect(&response.body) {
            Ok(()) => (true, Some(200), None),
            Err(reason) => (false, Some(200), Some(reason)),
        },
        Ok(response) => (
            false,
            Some(response.status),
            Some(format!("unexpected status {}", response.status)),
        ),
        Err(e) => (false, None, Some(e.to_string())),
    };
    SmokeCheckResult {
        name: name.to_owned(),
        url: url.to_owned(),
        passed,
        core,
        status,
        detail,
    }
}

fn has_versions(body: &str) -> Result<(), String> {
    let doc: serde_json::Value =
        serde_json::from_str(body).map_err(|e| format!("invalid JSON: {e}"))?;
    match doc.get("versions") {
        Some(serde_json::Value::Array(_)) => Ok(()),
        _ => Err("response has no 'versions' list".to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_body_must_carry_a_list() {
        assert!(has_versions(r#"{"versions":["v1.1","v1.2"]}"#).is_ok());
        assert!(has_versions(r#"{"versions":"v1.1"}"#).is_err());
        assert!(has_versions(r#"{"unstable_features":{}}"#).is_err());
        assert!(has_versions("<html>").is_err());
    }

    #[test]
    fn only_core_failures_are_fatal() {
        let report = SmokeReport {
            checks: vec![
                SmokeCheckResult {
                    name: SYNAPSE_HEALTH.to_owned(),
                    url: "http://localhost:8008/health".to_owned(),
                    passed: true,
                    core: true,
                    status: Some(200),
                    detail: None,
                },
                SmokeCheckResult {
                    name: ELEMENT_WEB.to_owned(),
                    url: "http://localhost:8080".to_owned(),
                    passed: false,
                    core: false,
                    status: Some(502),
                    detail: Some("unexpected status 502".to_owned()),
                },
            ],
        };
        assert_eq!(report.passed_count(), 1);
        assert!(report.core_failures().is_empty());
        assert!(report.ensure_core_passed().is_ok());
    }

    #[test]
    fn core_failure_surfaces_check_name() {
        let report = SmokeReport {
            checks: vec![SmokeCheckResult {
                name: SYNAPSE_HEALTH.to_owned(),
                url: "http://localhost:8008/health".to_owned(),
                passed: false,
                core: true,
                status: None,
                detail: Some("connection refused".to_owned()),
            }],
        };
        let err = report.ensure_core_passed().unwrap_err();
        assert_eq!(
            err.to_string(),
            "smoke check 'synapse_health' failed: connection refused"
        );
    }
}
