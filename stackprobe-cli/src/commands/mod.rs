//! Command handlers -- one module per subcommand

pub mod check;
pub mod config;
pub mod deploy;
pub mod run;

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::warn;

use stackprobe_core::StackprobeConfig;

use crate::cli::{Cli, Commands, DEFAULT_CONFIG_FILE};
use crate::error::CliError;
use crate::output::OutputWriter;

/// Configuration file actually used: `--config` or the default name.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf)
}

/// Loads the configuration with environment overrides applied.
///
/// A missing default file falls back to defaults; a missing explicit file is an error.
pub async fn load_config(explicit: Option<&Path>) -> Result<StackprobeConfig, CliError> {
    let path = config_path(explicit);
    let config = match explicit {
        Some(_) => StackprobeConfig::load(&path).await?,
        None => StackprobeConfig::load_or_default(&path).await?,
    };
    Ok(config)
}

/// Runs the parsed command. `loaded` is the result of [`load_config`].
pub async fn execute(
    cli: Cli,
    loaded: Result<StackprobeConfig, CliError>,
) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);
    let path = config_path(cli.config.as_deref());
    match cli.command {
        Commands::Config(args) => config::execute(args, &path, loaded, &writer),
        Commands::Run(args) => run::execute(args, loaded?, &writer).await,
        Commands::Check(args) => check::execute(args, loaded?, &writer).await,
        Commands::Deploy(args) => deploy::execute(args, loaded?, &writer).await,
    }
}

/// Token cancelled on the first Ctrl-C.
pub fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("interrupt received, stopping");
                trigger.cancel();
            }
            Err(e) => warn!(error = %e, "failed to listen for interrupt"),
        }
    });
    token
}
