//! Run orchestrator.
//!
//! One invocation: optional deployment, pre-flight availability check,
//! serial suite execution, report assembly, report files. Suites run in the
//! order given and a failing suite never stops the ones after it.
//!
//! Progress lines go to the `out` writer passed in by the caller; the final
//! summary is the returned [`RunOutcome`], rendered through [`Render`].

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use stackprobe_core::config::REDACTED;
use stackprobe_core::{
    EnvironmentSnapshot, RunReport, ServiceHealth, StackprobeConfig, SuiteResult, SuiteSpec,
};
use stackprobe_deploy::{
    ContainerRuntime, DeployError, DeploymentManager, DeploymentRecord, DeploymentStage,
};
use stackprobe_readiness::{HttpClient, ProbePolicy, ReadinessProber, unready_services};
use stackprobe_report::{ReportFormat, WrittenReports, write_reports};
use stackprobe_suite_runner::SuiteExecutor;

use crate::error::CliError;
use crate::output::{Render, mark};

/// Progress sink shared by the orchestration steps.
pub type Console<'a> = &'a mut (dyn Write + Send);

/// Everything one run produced.
#[derive(Debug, Serialize)]
pub struct RunOutcome {
    pub report: RunReport,
    pub preflight: Vec<ServiceHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeploymentRecord>,
    pub reports: WrittenReports,
    pub interrupted: bool,
}

impl RunOutcome {
    /// `Ok` only when every test passed and the run was not interrupted.
    pub fn verdict(&self) -> Result<(), CliError> {
        if self.interrupted {
            return Err(CliError::Interrupted);
        }
        let summary = &self.report.summary;
        if summary.overall_passed() {
            Ok(())
        } else {
            Err(CliError::TestsFailed {
                failed: summary.total_failed,
                errors: summary.total_errors,
            })
        }
    }
}

impl Render for RunOutcome {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let summary = &self.report.summary;
        let rule = "=".repeat(50);

        writeln!(w, "\n{rule}")?;
        writeln!(w, "{}", "TEST SUMMARY".bold())?;
        writeln!(w, "{rule}")?;
        writeln!(w, "Test Suites: {}", summary.total_suites)?;
        writeln!(w, "Total Tests: {}", summary.total_tests)?;
        writeln!(w, "Passed:      {}", summary.total_passed)?;
        writeln!(w, "Failed:      {}", summary.total_failed)?;
        writeln!(w, "Skipped:     {}", summary.total_skipped)?;
        writeln!(w, "Errors:      {}", summary.total_errors)?;
        writeln!(w, "Duration:    {:.1}s", self.report.total_duration)?;
        if let Some(rate) = summary.success_rate() {
            writeln!(w, "Success Rate: {rate:.1}%")?;
        }

        if !self.report.suites.is_empty() {
            writeln!(w, "\nPer Suite Results:")?;
            for suite in &self.report.suites {
                let marker = if suite.is_success() {
                    mark(true).green()
                } else {
                    mark(false).red()
                };
                writeln!(
                    w,
                    "  {marker} {}: {}/{} ({:.1}s)",
                    suite.name, suite.passed, suite.total, suite.duration
                )?;
            }
        }

        if let Some(record) = &self.deployment {
            let state = if record.succeeded() {
                "deployed".green()
            } else {
                "failed".red()
            };
            writeln!(
                w,
                "\nDeployment: {state} (reached {}, final {})",
                record.reached, record.final_stage
            )?;
        }

        if let Some(path) = &self.reports.json {
            writeln!(w, "\nJSON report: {}", path.display())?;
        }
        if let Some(path) = &self.reports.html {
            writeln!(w, "HTML report: {}", path.display())?;
        }

        if self.interrupted {
            writeln!(w, "\n{}", "Run interrupted before all suites finished.".yellow())?;
        }

        let passed = self.report.overall_passed();
        let verdict = if passed {
            "PASS".green().bold()
        } else {
            "FAIL".red().bold()
        };
        writeln!(w, "\nOverall Result: {verdict}")?;
        if !passed {
            writeln!(
                w,
                "\n⚠ Some tests failed. Check the detailed report for more information."
            )?;
            writeln!(
                w,
                "Consider running 'stackprobe check' to check service health."
            )?;
        }
        Ok(())
    }
}

/// Drives one test run.
pub struct Orchestrator<H: HttpClient> {
    config: StackprobeConfig,
    executor: SuiteExecutor,
    http: Arc<H>,
    check_services: bool,
}

impl<H: HttpClient> Orchestrator<H> {
    /// `config` is final: file, environment and flag overrides already applied.
    pub fn new(config: StackprobeConfig, http: Arc<H>) -> Self {
        let executor = SuiteExecutor::from_config(&config);
        Self {
            config,
            executor,
            http,
            check_services: true,
        }
    }

    pub fn with_services_check(mut self, enabled: bool) -> Self {
        self.check_services = enabled;
        self
    }

    pub fn config(&self) -> &StackprobeConfig {
        &self.config
    }

    /// Suites for this run.
    ///
    /// Empty `requested` selects every configured suite. A requested name
    /// matches a configured suite by file or by name and inherits its
    /// markers; anything else is run as given.
    pub fn select_suites(&self, requested: &[String]) -> Vec<SuiteSpec> {
        if requested.is_empty() {
            return self.config.runner.suites.clone();
        }
        requested
            .iter()
            .map(|wanted| {
                self.config
                    .runner
                    .suites
                    .iter()
                    .find(|s| s.file == *wanted || s.name() == wanted)
                    .cloned()
                    .unwrap_or_else(|| SuiteSpec::new(wanted.clone()))
            })
            .collect()
    }

    /// Single request per service. Unavailable services are a warning only.
    pub async fn preflight(&self, out: Console<'_>) -> Result<Vec<ServiceHealth>, CliError> {
        writeln!(out, "\nChecking service availability...")?;
        let prober = ReadinessProber::new(
            Arc::clone(&self.http),
            ProbePolicy::single_attempt(self.config.readiness.request_timeout()),
        );
        let endpoints = self.config.readiness.endpoints(&self.config.targets);
        let records = prober.probe_all(&endpoints).await;

        for record in &records {
            writeln!(out, "  {} {}", mark(record.ready), record.name)?;
        }
        let unavailable = unready_services(&records);
        if !unavailable.is_empty() {
            warn!(services = ?unavailable, "services unavailable before run");
            writeln!(
                out,
                "\n⚠ Warning: Some services unavailable: {}",
                unavailable.join(", ")
            )?;
            writeln!(out, "Some tests may fail or be skipped.")?;
        }
        Ok(records)
    }

    /// Runs `suites` one after another.
    ///
    /// Returns the finished results and whether `cancel` fired. Cancelling
    /// drops the running suite, which kills its process.
    pub async fn run_suites(
        &self,
        suites: &[SuiteSpec],
        cancel: &CancellationToken,
        out: Console<'_>,
    ) -> Result<(Vec<SuiteResult>, bool), CliError> {
        writeln!(out, "\nRunning {} test suites...", suites.len())?;
        writeln!(out, "{}", "-".repeat(30))?;

        let mut results = Vec::with_capacity(suites.len());
        for suite in suites {
            writeln!(out, "Running {} tests...", suite.name())?;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(suite = %suite.name(), "run interrupted, suite process stopped");
                    writeln!(out, "\n⚠ Test run interrupted by user")?;
                    return Ok((results, true));
                }
                result = self.executor.run(suite) => result,
            };
            writeln!(
                out,
                "{} {}: {}/{} passed ({:.1}s)",
                mark(result.is_success()),
                result.name,
                result.passed,
                result.total,
                result.duration
            )?;
            results.push(result);
        }
        Ok((results, false))
    }

    /// Runs against an already running stack.
    pub async fn run(
        &self,
        requested: &[String],
        cancel: &CancellationToken,
        out: Console<'_>,
    ) -> Result<RunOutcome, CliError> {
        let started = Instant::now();
        let timestamp = Utc::now();
        banner(out, timestamp)?;

        let preflight = if self.check_services {
            self.preflight(out).await?
        } else {
            Vec::new()
        };
        let suites = self.select_suites(requested);
        let (results, interrupted) = self.run_suites(&suites, cancel, out).await?;

        self.finish(timestamp, started, results, preflight, None, interrupted)
            .await
    }

    /// Deploys through `manager`, runs the suites against the deployed stack,
    /// then tears it down. Teardown also runs after a failed deployment and
    /// after an interrupt.
    ///
    /// A failed deployment skips the suites and is recorded as an error
    /// result named `deployment`.
    pub async fn run_with_deployment<R: ContainerRuntime>(
        &self,
        manager: &mut DeploymentManager<R, H>,
        requested: &[String],
        cancel: &CancellationToken,
        out: Console<'_>,
    ) -> Result<RunOutcome, CliError> {
        let started = Instant::now();
        let timestamp = Utc::now();
        banner(out, timestamp)?;

        writeln!(out, "\nDeploying stack...")?;
        let phase = self
            .deployed_phase(manager, requested, cancel, started, &mut *out)
            .await;

        // teardown runs before any console error propagates
        let teardown = manager.teardown().await;
        let (results, preflight, interrupted) = phase?;

        writeln!(out, "\nStack torn down")?;
        if teardown.preserved {
            writeln!(out, "  workspace kept for inspection")?;
        }
        for problem in &teardown.errors {
            writeln!(out, "  {} {problem}", mark(false))?;
        }

        let record = manager.record().clone();
        self.finish(
            timestamp,
            started,
            results,
            preflight,
            Some(record),
            interrupted,
        )
        .await
    }

    /// Deployment plus suites, without teardown.
    async fn deployed_phase<R: ContainerRuntime>(
        &self,
        manager: &mut DeploymentManager<R, H>,
        requested: &[String],
        cancel: &CancellationToken,
        started: Instant,
        out: Console<'_>,
    ) -> Result<(Vec<SuiteResult>, Vec<ServiceHealth>, bool), CliError> {
        match manager
            .deploy(DeploymentStage::FunctionalChecked, cancel)
            .await
        {
            Ok(()) => {
                let location = manager
                    .workspace_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                writeln!(out, "{} stack deployed in {location}", mark(true))?;
                let preflight = if self.check_services {
                    self.preflight(&mut *out).await?
                } else {
                    Vec::new()
                };
                let suites = self.select_suites(requested);
                let (results, interrupted) = self.run_suites(&suites, cancel, out).await?;
                Ok((results, preflight, interrupted))
            }
            Err(DeployError::Cancelled) => {
                writeln!(out, "\n⚠ Deployment interrupted by user")?;
                Ok((Vec::new(), Vec::new(), true))
            }
            Err(e) => {
                error!(error = %e, "deployment failed, suites skipped");
                let result = SuiteResult::synthetic_error(
                    "deployment",
                    "error",
                    e.to_string(),
                    started.elapsed().as_secs_f64(),
                );
                writeln!(out, "{} deployment failed: {e}", mark(false))?;
                Ok((vec![result], Vec::new(), false))
            }
        }
    }

    /// Snapshot of the execution environment with the password redacted.
    pub fn environment_snapshot(&self) -> EnvironmentSnapshot {
        let runner = &self.config.runner;
        let config = serde_json::to_value(self.config.redacted()).unwrap_or_else(|e| {
            warn!(error = %e, "failed to capture configuration snapshot");
            serde_json::Value::Null
        });

        let mut environment_variables: BTreeMap<String, String> =
            self.executor.injected_env().clone();
        environment_variables
            .entry("TEST_USER_PASSWORD".to_owned())
            .and_modify(|password| {
                if !password.is_empty() {
                    *password = REDACTED.to_owned();
                }
            });

        EnvironmentSnapshot {
            platform: std::env::consts::OS.to_owned(),
            arch: std::env::consts::ARCH.to_owned(),
            tool_version: format!("stackprobe {}", env!("CARGO_PKG_VERSION")),
            working_directory: std::env::current_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            test_directory: Path::new(&runner.project_root)
                .join(&runner.test_dir)
                .display()
                .to_string(),
            config,
            environment_variables,
        }
    }

    async fn finish(
        &self,
        timestamp: DateTime<Utc>,
        started: Instant,
        results: Vec<SuiteResult>,
        preflight: Vec<ServiceHealth>,
        deployment: Option<DeploymentRecord>,
        interrupted: bool,
    ) -> Result<RunOutcome, CliError> {
        let report = RunReport::assemble(
            timestamp,
            self.environment_snapshot(),
            results,
            started.elapsed().as_secs_f64(),
        );
        let format: ReportFormat = self.config.report.format.parse()?;
        let reports = write_reports(&report, &self.config.report.output_dir, format).await?;

        info!(
            suites = report.summary.total_suites,
            tests = report.summary.total_tests,
            failed = report.summary.total_failed,
            errors = report.summary.total_errors,
            interrupted,
            "run finished"
        );
        Ok(RunOutcome {
            report,
            preflight,
            deployment,
            reports,
            interrupted,
        })
    }
}

fn banner(out: Console<'_>, timestamp: DateTime<Utc>) -> std::io::Result<()> {
    writeln!(out, "Matrix Stack Test Runner")?;
    writeln!(out, "{}", "=".repeat(50))?;
    writeln!(
        out,
        "Test environment: {}",
        timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use stackprobe_core::{TestCaseResult, TestStatus};
    use stackprobe_readiness::{HttpResponse, ProbeError};
    use std::time::Duration;

    struct NoHttp;

    impl HttpClient for NoHttp {
        async fn get(&self, url: &str, _timeout: Duration) -> Result<HttpResponse, ProbeError> {
            Err(ProbeError::Request {
                url: url.to_owned(),
                reason: "connection refused".to_owned(),
            })
        }
    }

    fn orchestrator(config: StackprobeConfig) -> Orchestrator<NoHttp> {
        Orchestrator::new(config, Arc::new(NoHttp))
    }

    fn outcome(suites: Vec<SuiteResult>, interrupted: bool) -> RunOutcome {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        RunOutcome {
            report: RunReport::assemble(ts, EnvironmentSnapshot::default(), suites, 1.0),
            preflight: Vec::new(),
            deployment: None,
            reports: WrittenReports::default(),
            interrupted,
        }
    }

    #[test]
    fn select_all_configured_suites_by_default() {
        let orch = orchestrator(StackprobeConfig::default());
        let suites = orch.select_suites(&[]);
        assert_eq!(suites, StackprobeConfig::default().runner.suites);
    }

    #[test]
    fn selected_suite_keeps_configured_markers() {
        let orch = orchestrator(StackprobeConfig::default());
        let suites = orch.select_suites(&[
            "test_deployment_portability".to_owned(),
            "test_synapse_api.py".to_owned(),
            "test_custom.py".to_owned(),
        ]);
        assert_eq!(suites.len(), 3);
        assert_eq!(suites[0].markers, vec!["not slow"]);
        assert_eq!(suites[1].file, "test_synapse_api.py");
        assert_eq!(suites[2], SuiteSpec::new("test_custom.py"));
    }

    #[test]
    fn snapshot_redacts_password() {
        let mut config = StackprobeConfig::default();
        config.targets.test_user_password = "hunter2".to_owned();
        let snapshot = orchestrator(config).environment_snapshot();

        assert_eq!(
            snapshot.environment_variables.get("TEST_USER_PASSWORD").map(String::as_str),
            Some(REDACTED)
        );
        assert_eq!(
            snapshot.config["targets"]["test_user_password"].as_str(),
            Some(REDACTED)
        );
        assert!(!snapshot.config.to_string().contains("hunter2"));
        assert!(snapshot.tool_version.starts_with("stackprobe "));
    }

    #[tokio::test]
    async fn preflight_marks_unreachable_services() {
        let orch = orchestrator(StackprobeConfig::default());
        let mut out = Vec::new();
        let records = orch.preflight(&mut out).await.unwrap();

        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| !r.ready));
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("  ✗ synapse"));
        assert!(text.contains("Some services unavailable: synapse, element, admin, well_known"));
    }

    #[tokio::test]
    async fn cancelled_run_stops_before_first_suite() {
        let orch = orchestrator(StackprobeConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut out = Vec::new();

        let (results, interrupted) = orch
            .run_suites(&orch.select_suites(&[]), &cancel, &mut out)
            .await
            .unwrap();

        assert!(results.is_empty());
        assert!(interrupted);
    }

    #[test]
    fn verdict_maps_outcomes() {
        let passed = SuiteResult::from_tests(
            "a",
            1.0,
            vec![TestCaseResult::new("a", "t", TestStatus::Passed, 1.0)],
        );
        assert!(outcome(vec![passed.clone()], false).verdict().is_ok());
        assert!(matches!(
            outcome(vec![passed], true).verdict(),
            Err(CliError::Interrupted)
        ));

        let errored = SuiteResult::synthetic_error("b", "timeout", "timed out", 5.0);
        assert!(matches!(
            outcome(vec![errored], false).verdict(),
            Err(CliError::TestsFailed {
                failed: 0,
                errors: 1
            })
        ));
    }

    #[test]
    fn summary_text_lists_suites_and_verdict() {
        colored::control::set_override(false);
        let failed = SuiteResult::from_tests(
            "test_element_web",
            2.0,
            vec![
                TestCaseResult::new("test_element_web", "a", TestStatus::Passed, 1.0),
                TestCaseResult::new("test_element_web", "b", TestStatus::Failed, 1.0),
            ],
        );
        let mut buf = Vec::new();
        outcome(vec![failed], false).render_text(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("Total Tests: 2"));
        assert!(text.contains("Success Rate: 50.0%"));
        assert!(text.contains("✗ test_element_web: 1/2 (2.0s)"));
        assert!(text.contains("Overall Result: FAIL"));
        assert!(text.contains("stackprobe check"));
    }

    #[test]
    fn empty_summary_has_no_success_rate() {
        colored::control::set_override(false);
        let mut buf = Vec::new();
        outcome(Vec::new(), false).render_text(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(!text.contains("Success Rate"));
        assert!(text.contains("Overall Result: PASS"));
    }
}
