//! `stackprobe run` command handler

use std::sync::Arc;

use tracing::info;

use stackprobe_core::StackprobeConfig;
use stackprobe_deploy::{DeploymentManager, DockerRuntime};
use stackprobe_readiness::ReqwestHttpClient;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::orchestrator::Orchestrator;
use crate::output::OutputWriter;

/// Execute the `run` command.
///
/// Flag overrides are applied on top of the loaded configuration and the
/// result is validated again. Exit status follows [`RunOutcome::verdict`].
///
/// [`RunOutcome::verdict`]: crate::orchestrator::RunOutcome::verdict
pub async fn execute(
    args: RunArgs,
    mut config: StackprobeConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    args.apply_to(&mut config);
    config
        .validate()
        .map_err(|e| CliError::Config(e.to_string()))?;

    info!(
        suites = ?args.suites,
        output_dir = %config.report.output_dir,
        format = %config.report.format,
        deploy = args.deploy,
        "starting test run"
    );

    let http = Arc::new(ReqwestHttpClient::new()?);
    let orchestrator =
        Orchestrator::new(config, Arc::clone(&http)).with_services_check(!args.no_services_check);
    let cancel = super::interrupt_token();
    let mut progress = writer.progress();

    let outcome = if args.deploy {
        let runtime =
            Arc::new(DockerRuntime::connect(&orchestrator.config().deploy.compose_command).await?);
        let mut manager = DeploymentManager::new(runtime, http, orchestrator.config());
        orchestrator
            .run_with_deployment(&mut manager, &args.suites, &cancel, &mut *progress)
            .await?
    } else {
        orchestrator
            .run(&args.suites, &cancel, &mut *progress)
            .await?
    };

    writer.render(&outcome)?;
    outcome.verdict()
}
