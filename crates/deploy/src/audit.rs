//! 프로젝트 배포 아티팩트 정적 감사
//!
//! 아무것도 복사하지 않고 컨테이너 런타임도 건드리지 않은 채 프로젝트 루트를
//! 검사합니다. 항목마다 심각도가 있으며 `Fail` 항목만 감사를 실패시킵니다.

use std::path::Path;

use serde::Serialize;
use stackprobe_core::config::DeployConfig;

use crate::manifest::validate_manifest;

/// 환경 템플릿이 반드시 정의해야 하는 변수
pub const REQUIRED_ENV_VARS: &[&str] = &[
    "SYNAPSE_SERVER_NAME",
    "POSTGRES_PASSWORD",
    "REGISTRATION_SHARED_SECRET",
    "COTURN_STATIC_AUTH_SECRET",
];

/// 제어 스크립트가 지원해야 하는 명령
pub const SCRIPT_COMMANDS: &[&str] = &["start", "stop", "health"];

const PLACEHOLDER_MARKERS: &[&str] = &["changeme", "change_me", "your_", "<", "xxx", "todo"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Pass,
    Warn,
    Fail,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Warn => "warn",
            Self::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditFinding {
    pub check: String,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub findings: Vec<AuditFinding>,
}

impl AuditReport {
    fn push(&mut self, check: &str, severity: Severity, message: impl Into<String>) {
        self.findings.push(AuditFinding {
            check: check.to_owned(),
            severity,
            message: message.into(),
        });
    }

    pub fn passed(&self) -> bool {
        self.findings.iter().all(|f| f.severity != Severity::Fail)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }

    pub fn find(&self, check: &str) -> Option<&AuditFinding> {
        self.findings.iter().find(|f| f.check == check)
    }
}

/// `config`의 아티팩트 이름을 기준으로 `root`를 감사합니다.
pub fn audit_project(root: &Path, config: &DeployConfig) -> AuditReport {
    let mut report = AuditReport::default();

    for artifact in [
        &config.manifest_file,
        &config.control_script,
        &config.env_template,
    ] {
        let check = format!("artifact:{artifact}");
        if root.join(artifact).is_file() {
            report.push(&check, Severity::Pass, "present");
        } else {
            report.push(&check, Severity::Fail, "missing");
        }
    }

    audit_env_template(&root.join(&config.env_template), &mut report);
    audit_control_script(&root.join(&config.control_script), &mut report);
    audit_manifest(&root.join(&config.manifest_file), config, &mut report);
    report
}

fn audit_env_template(path: &Path, report: &mut AuditReport) {
    let Ok(content) = std::fs::read_to_string(path) else {
        return;
    };
    let values = parse_env(&content);

    let missing: Vec<&str> = REQUIRED_ENV_VARS
        .iter()
        .copied()
        .filter(|var| !values.iter().any(|(k, _)| k == var))
        .collect();
    if missing.is_empty() {
        report.push("env:required", Severity::Pass, "all required variables defined");
    } else {
        report.push(
            "env:required",
            Severity::Fail,
            format!("missing variables: {}", missing.join(", ")),
        );
    }

    let placeholders: Vec<&str> = values
        .iter()
        .filter(|(_, v)| is_placeholder(v))
        .map(|(k, _)| k.as_str())
        .collect();
    if !placeholders.is_empty() {
        report.push(
            "env:placeholders",
            Severity::Warn,
            format!("placeholder values: {}", placeholders.join(", ")),
        );
    }
}

fn parse_env(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| {
            let k = k.trim().trim_start_matches("export ").trim();
            let v = v.trim().trim_matches('"').trim_matches('\'');
            (k.to_owned(), v.to_owned())
        })
        .collect()
}

fn is_placeholder(value: &str) -> bool {
    if value.is_empty() {
        return true;
    }
    let lower = value.to_lowercase();
    PLACEHOLDER_MARKERS.iter().any(|m| lower.contains(m))
}

fn audit_control_script(path: &Path, report: &mut AuditReport) {
    let Ok(content) = std::fs::read_to_string(path) else {
        return;
    };

    if is_executable(path) {
        report.push("script:executable", Severity::Pass, "executable");
    } else {
        report.push("script:executable", Severity::Fail, "not executable");
    }

    let unsupported: Vec<&str> = SCRIPT_COMMANDS
        .iter()
        .copied()
        .filter(|cmd| !content.contains(cmd))
        .collect();
    if unsupported.is_empty() {
        report.push("script:commands", Severity::Pass, "start, stop and health supported");
    } else {
        report.push(
            "script:commands",
            Severity::Warn,
            format!("may not support: {}", unsupported.join(", ")),
        );
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn audit_manifest(path: &Path, config: &DeployConfig, report: &mut AuditReport) {
    let Ok(raw) = std::fs::read_to_string(path) else {
        return;
    };
    match validate_manifest(&raw, &config.required_sections, &config.required_services) {
        Ok(summary) => {
            report.push(
                "manifest:valid",
                Severity::Pass,
                format!("services: {}", summary.services.join(", ")),
            );
            if summary.unpinned_images.is_empty() {
                report.push("manifest:images", Severity::Pass, "all images pinned");
            } else {
                report.push(
                    "manifest:images",
                    Severity::Warn,
                    format!(
                        "services without explicit versions: {}",
                        summary.unpinned_images.join(", ")
                    ),
                );
            }
            if !summary.external_volumes.is_empty() {
                report.push(
                    "manifest:external-volumes",
                    Severity::Pass,
                    format!("external volumes: {}", summary.external_volumes.join(", ")),
                );
            }
        }
        Err(e) => report.push("manifest:valid", Severity::Fail, e.to_string()),
    }
}
