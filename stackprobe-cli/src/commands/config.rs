//! `stackprobe config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use stackprobe_core::StackprobeConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Section names accepted by `config show --section`.
pub const SECTIONS: [&str; 6] = ["general", "targets", "runner", "readiness", "deploy", "report"];

/// Execute the `config` command.
///
/// `loaded` is the outcome of loading `config_path`, so validation reports
/// the same error the other commands would fail with.
pub fn execute(
    args: ConfigArgs,
    config_path: &Path,
    loaded: Result<StackprobeConfig, CliError>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, loaded, writer),
        ConfigAction::Show { section } => {
            let report = build_show_report(config_path, &loaded?, section.as_deref())?;
            writer.render(&report)
        }
    }
}

fn execute_validate(
    config_path: &Path,
    loaded: Result<StackprobeConfig, CliError>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = validation_report(config_path, &loaded);
    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }
    Ok(())
}

/// Validation result for a load attempt.
pub fn validation_report(
    config_path: &Path,
    loaded: &Result<StackprobeConfig, CliError>,
) -> ConfigValidationReport {
    ConfigValidationReport {
        source: config_path.display().to_string(),
        valid: loaded.is_ok(),
        errors: loaded
            .as_ref()
            .err()
            .map(|e| vec![e.to_string()])
            .unwrap_or_default(),
    }
}

/// Effective configuration, password redacted, optionally one section only.
///
/// # Errors
///
/// `CliError::Command` for an unknown section name.
pub fn build_show_report(
    config_path: &Path,
    config: &StackprobeConfig,
    section: Option<&str>,
) -> Result<ConfigReport, CliError> {
    let config = config.redacted();
    let (config_toml, value) = match section {
        None => (to_toml(&config)?, serde_json::to_value(&config)?),
        Some("general") => (to_toml(&config.general)?, serde_json::to_value(&config.general)?),
        Some("targets") => (to_toml(&config.targets)?, serde_json::to_value(&config.targets)?),
        Some("runner") => (to_toml(&config.runner)?, serde_json::to_value(&config.runner)?),
        Some("readiness") => (
            to_toml(&config.readiness)?,
            serde_json::to_value(&config.readiness)?,
        ),
        Some("deploy") => (to_toml(&config.deploy)?, serde_json::to_value(&config.deploy)?),
        Some("report") => (to_toml(&config.report)?, serde_json::to_value(&config.report)?),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {other} (expected: {})",
                SECTIONS.join(", ")
            )));
        }
    };

    Ok(ConfigReport {
        source: config_path.display().to_string(),
        section: section.map(str::to_owned),
        config: value,
        config_toml,
    })
}

fn to_toml<T: Serialize>(value: &T) -> Result<String, CliError> {
    toml::to_string_pretty(value)
        .map_err(|e| CliError::Command(format!("failed to serialize configuration: {e}")))
}

/// Configuration display report.
///
/// Text mode prints the TOML form; JSON mode carries the same data as a value.
#[derive(Serialize)]
pub struct ConfigReport {
    /// Configuration file path
    pub source: String,
    /// Optional section name (None = full config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub config: serde_json::Value,
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{}]", section);
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;

        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    /// Configuration file path
    pub source: String,
    pub valid: bool,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }

        Ok(())
    }
}
