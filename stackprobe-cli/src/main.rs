use clap::Parser;
use colored::Colorize;

use stackprobe_cli::cli::Cli;
use stackprobe_cli::{commands, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = commands::load_config(cli.config.as_deref()).await;
    let mut general = loaded
        .as_ref()
        .map(|config| config.general.clone())
        .unwrap_or_default();
    if let Some(level) = cli.log_level_override() {
        general.log_level = level;
    }
    logging::init_tracing(&general)?;

    tracing::debug!(command = ?cli.command, "stackprobe starting");

    if let Err(err) = commands::execute(cli, loaded).await {
        if err.needs_message() {
            eprintln!("{} {err}", "error:".red().bold());
        }
        std::process::exit(err.exit_code());
    }
    Ok(())
}
