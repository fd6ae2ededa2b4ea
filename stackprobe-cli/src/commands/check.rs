//! `stackprobe check` command handler

use std::io::Write;
use std::sync::Arc;

use colored::Colorize;
use serde::Serialize;
use tracing::info;

use stackprobe_core::{ServiceHealth, StackprobeConfig};
use stackprobe_readiness::{
    HttpClient, ProbePolicy, ReadinessProber, ReqwestHttpClient, unready_services,
};

use crate::cli::CheckArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, mark};

/// Execute the `check` command.
pub async fn execute(
    args: CheckArgs,
    config: StackprobeConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let http = Arc::new(ReqwestHttpClient::new()?);
    let report = probe(&config, http, args.wait).await;
    writer.render(&report)?;

    if report.all_ready {
        Ok(())
    } else {
        Err(CliError::ServicesUnavailable(unready_services(
            &report.services,
        )))
    }
}

/// Probes every configured endpoint. `wait` polls within the readiness budgets.
pub async fn probe<H: HttpClient>(
    config: &StackprobeConfig,
    http: Arc<H>,
    wait: bool,
) -> HealthReport {
    let policy = if wait {
        ProbePolicy::from_config(&config.readiness)
    } else {
        ProbePolicy::single_attempt(config.readiness.request_timeout())
    };
    info!(wait, "checking service health");

    let endpoints = config.readiness.endpoints(&config.targets);
    let services = ReadinessProber::new(http, policy)
        .probe_all(&endpoints)
        .await;
    let all_ready = services.iter().all(|s| s.ready);
    HealthReport {
        services,
        all_ready,
    }
}

/// Health of every probed service.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub services: Vec<ServiceHealth>,
    pub all_ready: bool,
}

impl Render for HealthReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "{}", "Service Health".bold())?;
        writeln!(w, "{}", "-".repeat(40))?;
        for service in &self.services {
            let marker = if service.ready {
                mark(true).green()
            } else {
                mark(false).red()
            };
            let detail = match (&service.last_status, &service.last_error) {
                (Some(status), _) => format!("HTTP {status}"),
                (None, Some(error)) => error.clone(),
                (None, None) => "no response".to_owned(),
            };
            writeln!(
                w,
                "  {marker} {:<12} {:<50} {detail} ({} attempts, {:.1}s)",
                service.name, service.url, service.attempts, service.elapsed_secs
            )?;
        }
        let verdict = if self.all_ready {
            "all services ready".green()
        } else {
            "some services unavailable".red()
        };
        writeln!(w, "\n{verdict}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackprobe_core::config::ServiceEndpoint;
    use stackprobe_readiness::{HttpResponse, ProbeError};
    use std::time::Duration;

    /// 200 for synapse, 404 for element, refused for everything else.
    struct PartialStack;

    impl HttpClient for PartialStack {
        async fn get(&self, url: &str, _timeout: Duration) -> Result<HttpResponse, ProbeError> {
            if url.contains("synapse") {
                Ok(HttpResponse::new(200, "OK"))
            } else if url.contains("element") {
                Ok(HttpResponse::new(404, "not found"))
            } else {
                Err(ProbeError::Request {
                    url: url.to_owned(),
                    reason: "connection refused".to_owned(),
                })
            }
        }
    }

    fn config() -> StackprobeConfig {
        let mut config = StackprobeConfig::default();
        config.readiness.services = vec![
            ServiceEndpoint::new("synapse", "http://synapse/health"),
            ServiceEndpoint::new("element", "http://element/"),
            ServiceEndpoint::new("coturn", "http://coturn/"),
        ];
        config
    }

    #[tokio::test]
    async fn single_probe_reports_each_service() {
        let report = probe(&config(), Arc::new(PartialStack), false).await;

        assert!(!report.all_ready);
        let ready: Vec<bool> = report.services.iter().map(|s| s.ready).collect();
        assert_eq!(ready, vec![true, true, false]);
        assert_eq!(report.services[1].last_status, Some(404));
        assert_eq!(report.services[2].attempts, 1);
    }

    #[tokio::test]
    async fn text_lists_services_with_markers() {
        colored::control::set_override(false);
        let report = probe(&config(), Arc::new(PartialStack), false).await;
        let mut buf = Vec::new();
        report.render_text(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("✓ synapse"));
        assert!(text.contains("✗ coturn"));
        assert!(text.contains("connection refused"));
        assert!(text.contains("some services unavailable"));
    }
}
