//! `stackprobe deploy` command handler

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;
use serde::Serialize;
use tracing::info;

use stackprobe_core::StackprobeConfig;
use stackprobe_deploy::{
    AuditReport, DeploymentManager, DeploymentRecord, DeploymentStage, DockerRuntime,
    EnvFileSource, Severity, audit_project,
};
use stackprobe_readiness::ReqwestHttpClient;

use crate::cli::{DeployAction, DeployArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render, mark};

/// Execute the `deploy` command.
pub async fn execute(
    args: DeployArgs,
    config: StackprobeConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        DeployAction::Audit { path } => execute_audit(path, &config, writer),
        DeployAction::Validate { full, keep } => execute_validate(full, keep, config, writer).await,
    }
}

fn execute_audit(
    path: Option<PathBuf>,
    config: &StackprobeConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let root = path.unwrap_or_else(|| PathBuf::from(&config.deploy.project_root));
    info!(root = %root.display(), "auditing deployment artifacts");

    let report = AuditView::new(&root, audit_project(&root, &config.deploy));
    writer.render(&report)?;

    if report.audit.passed() {
        Ok(())
    } else {
        Err(CliError::Command(format!(
            "audit found {} failing checks",
            report.audit.count(Severity::Fail)
        )))
    }
}

async fn execute_validate(
    full: bool,
    keep: bool,
    mut config: StackprobeConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    if keep {
        config.deploy.keep_workspace = true;
    }
    let target = if full {
        DeploymentStage::FunctionalChecked
    } else {
        DeploymentStage::Configured
    };
    info!(target = %target, keep = config.deploy.keep_workspace, "validating deployment");

    let runtime = Arc::new(DockerRuntime::connect(&config.deploy.compose_command).await?);
    let http = Arc::new(ReqwestHttpClient::new()?);
    let mut manager = DeploymentManager::new(runtime, http, &config);
    let cancel = super::interrupt_token();

    let record = manager.run_cycle(target, &cancel).await;
    writer.render(&DeploymentView(record.clone()))?;

    if record.cancelled {
        Err(CliError::Interrupted)
    } else if let Some(error) = record.error {
        Err(CliError::Deployment(error))
    } else {
        Ok(())
    }
}

/// Audit findings of one project root.
#[derive(Debug, Serialize)]
pub struct AuditView {
    pub root: String,
    pub passed: bool,
    #[serde(flatten)]
    pub audit: AuditReport,
}

impl AuditView {
    pub fn new(root: &Path, audit: AuditReport) -> Self {
        Self {
            root: root.display().to_string(),
            passed: audit.passed(),
            audit,
        }
    }
}

impl Render for AuditView {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "Deployment audit: {}", self.root.bold())?;
        for finding in &self.audit.findings {
            let marker = match finding.severity {
                Severity::Pass => mark(true).green(),
                Severity::Warn => "⚠".yellow(),
                Severity::Fail => mark(false).red(),
            };
            writeln!(w, "  {marker} {:<28} {}", finding.check, finding.message)?;
        }
        writeln!(
            w,
            "\n{} passed, {} warnings, {} failed",
            self.audit.count(Severity::Pass),
            self.audit.count(Severity::Warn),
            self.audit.count(Severity::Fail)
        )?;
        let verdict = if self.passed {
            "PASS".green().bold()
        } else {
            "FAIL".red().bold()
        };
        writeln!(w, "Audit Result: {verdict}")
    }
}

/// Lifecycle record for display.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct DeploymentView(pub DeploymentRecord);

impl Render for DeploymentView {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let record = &self.0;
        writeln!(w, "{}", "Deployment validation".bold())?;
        if let Some(path) = &record.workspace {
            writeln!(w, "  workspace:   {}", path.display())?;
        }
        writeln!(w, "  target:      {}", record.target)?;
        writeln!(w, "  reached:     {}", record.reached)?;
        writeln!(w, "  final stage: {}", record.final_stage)?;

        if let Some(configure) = &record.configure {
            let env_source = match configure.env_source {
                EnvFileSource::Template => "copied from template",
                EnvFileSource::Synthesized => "synthesized",
            };
            writeln!(
                w,
                "\n{} configured: {} entries copied, env file {env_source}",
                mark(true),
                configure.copy.copied_entries,
            )?;
            for artifact in &configure.missing_artifacts {
                writeln!(w, "  ⚠ missing artifact: {artifact}")?;
            }
        }
        if let Some(volumes) = &record.volumes {
            writeln!(
                w,
                "{} volumes created: {}",
                mark(volumes.failed.is_empty()),
                volumes.created.join(", ")
            )?;
            for failure in &volumes.failed {
                writeln!(w, "  {} {}: {}", mark(false), failure.name, failure.reason)?;
            }
        }
        for container in &record.containers {
            writeln!(w, "  container {} ({})", container.name, container.state)?;
        }
        for service in &record.readiness {
            writeln!(w, "  {} {}", mark(service.ready), service.name)?;
        }
        if let Some(smoke) = &record.smoke {
            for check in &smoke.checks {
                let kind = if check.core { "core" } else { "advisory" };
                writeln!(w, "  {} smoke {} ({kind})", mark(check.passed), check.name)?;
            }
        }
        if !record.missing.is_empty() {
            writeln!(w, "\n  missing from manifest: {}", record.missing.join(", "))?;
        }
        if let Some(teardown) = &record.teardown {
            if teardown.preserved {
                writeln!(w, "\n  workspace kept for inspection")?;
            } else {
                writeln!(
                    w,
                    "\n  teardown: stack stopped={}, volumes removed={}, workspace removed={}",
                    teardown.stack_stopped,
                    teardown.volumes_removed.len(),
                    teardown.workspace_removed
                )?;
            }
            for problem in &teardown.errors {
                writeln!(w, "  {} {problem}", mark(false))?;
            }
        }

        match &record.error {
            None => writeln!(w, "\nDeployment Result: {}", "PASS".green().bold()),
            Some(error) => {
                writeln!(w, "\n{} {error}", mark(false).red())?;
                writeln!(w, "Deployment Result: {}", "FAIL".red().bold())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackprobe_deploy::AuditFinding;

    fn finding(check: &str, severity: Severity) -> AuditFinding {
        AuditFinding {
            check: check.to_owned(),
            severity,
            message: format!("{check} message"),
        }
    }

    #[test]
    fn audit_view_counts_and_verdict() {
        colored::control::set_override(false);
        let audit = AuditReport {
            findings: vec![
                finding("artifact:docker-compose.yml", Severity::Pass),
                finding("manifest:images", Severity::Warn),
                finding("env:required", Severity::Fail),
            ],
        };
        let view = AuditView::new(Path::new("/srv/matrix"), audit);
        let mut buf = Vec::new();
        view.render_text(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(!view.passed);
        assert!(text.contains("✓ artifact:docker-compose.yml"));
        assert!(text.contains("⚠ manifest:images"));
        assert!(text.contains("✗ env:required"));
        assert!(text.contains("1 passed, 1 warnings, 1 failed"));
        assert!(text.contains("Audit Result: FAIL"));
    }

    #[test]
    fn audit_view_json_flattens_findings() {
        let audit = AuditReport {
            findings: vec![finding("env:placeholders", Severity::Warn)],
        };
        let value = serde_json::to_value(AuditView::new(Path::new("."), audit)).unwrap();
        assert_eq!(value["passed"].as_bool(), Some(true));
        assert_eq!(value["findings"][0]["check"].as_str(), Some("env:placeholders"));
    }
}
