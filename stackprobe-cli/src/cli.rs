//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no side effects, no I/O. Flag values are folded into
//! the loaded configuration by [`RunArgs::apply_to`] after environment
//! overrides, so flags always win.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use stackprobe_core::StackprobeConfig;

/// Default configuration file, used when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "stackprobe.toml";

/// stackprobe -- test orchestrator for a self-hosted Matrix deployment stack.
///
/// Use `stackprobe <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "stackprobe", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file (default: stackprobe.toml, optional).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Effective log level: `--log-level`, then `--verbose`, then the configured one.
    pub fn log_level_override(&self) -> Option<String> {
        if let Some(level) = &self.log_level {
            return Some(level.clone());
        }
        match &self.command {
            Commands::Run(args) if args.verbose => Some("debug".to_owned()),
            _ => None,
        }
    }
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the test suites and write reports.
    Run(RunArgs),

    /// Check that the target services answer their health endpoints.
    Check(CheckArgs),

    /// Deployment validation and artifact audit.
    Deploy(DeployArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- run ----

/// Report formats selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormatArg {
    Json,
    Html,
    Both,
}

impl ReportFormatArg {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Html => "html",
            Self::Both => "both",
        }
    }
}

/// Run test suites against the target stack.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Suites to run, by file or name (comma separated). Default: all configured.
    #[arg(short, long, value_delimiter = ',')]
    pub suites: Vec<String>,

    /// Directory for report files.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Report format.
    #[arg(short, long)]
    pub format: Option<ReportFormatArg>,

    /// Skip the pre-flight service availability check.
    #[arg(long)]
    pub no_services_check: bool,

    /// Parallel workers inside each suite.
    #[arg(short = 'p', long)]
    pub parallel: Option<u32>,

    /// Per-suite timeout in seconds.
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Debug logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Deploy the stack into a temporary workspace first and tear it down afterwards.
    #[arg(long)]
    pub deploy: bool,
}

impl RunArgs {
    /// Folds flag overrides into `config`. The caller re-validates.
    pub fn apply_to(&self, config: &mut StackprobeConfig) {
        if let Some(dir) = &self.output_dir {
            config.report.output_dir = dir.display().to_string();
        }
        if let Some(format) = self.format {
            config.report.format = format.as_str().to_owned();
        }
        if let Some(workers) = self.parallel {
            config.runner.parallel_workers = workers;
        }
        if let Some(timeout) = self.timeout {
            config.runner.timeout_secs = timeout;
        }
    }
}

// ---- check ----

/// Probe every configured service once, or poll until ready.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Poll within the configured readiness budgets instead of a single request.
    #[arg(short, long)]
    pub wait: bool,
}

// ---- deploy ----

#[derive(Args, Debug)]
pub struct DeployArgs {
    #[command(subcommand)]
    pub action: DeployAction,
}

#[derive(Subcommand, Debug)]
pub enum DeployAction {
    /// Statically audit the deployment artifacts of a project.
    Audit {
        /// Project root (default: deploy.project_root).
        path: Option<PathBuf>,
    },
    /// Deploy into a clean temporary workspace and tear it down again.
    Validate {
        /// Go all the way to functional checks (needs Docker).
        #[arg(long)]
        full: bool,
        /// Keep the workspace and the stack for inspection.
        #[arg(long)]
        keep: bool,
    },
}

// ---- config ----

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (defaults + file + env overrides).
    Show {
        /// Show only one section (general, targets, runner, readiness, deploy, report).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_run_defaults() {
        let cli = Cli::try_parse_from(["stackprobe", "run"]).expect("parse succeeded");
        assert!(cli.config.is_none());
        assert_eq!(cli.output, OutputFormat::Text);
        match cli.command {
            Commands::Run(args) => {
                assert!(args.suites.is_empty());
                assert!(args.output_dir.is_none());
                assert!(args.format.is_none());
                assert!(!args.no_services_check);
                assert!(!args.deploy);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn test_cli_parse_run_suite_list() {
        let cli = Cli::try_parse_from([
            "stackprobe",
            "run",
            "--suites",
            "test_synapse_api.py,test_element_web",
        ])
        .expect("parse succeeded");
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.suites, vec!["test_synapse_api.py", "test_element_web"]);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn test_cli_parse_run_overrides() {
        let cli = Cli::try_parse_from([
            "stackprobe",
            "run",
            "-o",
            "out/reports",
            "--format",
            "html",
            "-p",
            "4",
            "-t",
            "60",
            "--no-services-check",
            "-v",
        ])
        .expect("parse succeeded");
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.output_dir, Some(PathBuf::from("out/reports")));
                assert_eq!(args.format, Some(ReportFormatArg::Html));
                assert_eq!(args.parallel, Some(4));
                assert_eq!(args.timeout, Some(60));
                assert!(args.no_services_check);
                assert!(args.verbose);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_report_format() {
        let result = Cli::try_parse_from(["stackprobe", "run", "--format", "pdf"]);
        assert!(result.is_err(), "pdf is not a report format");
    }

    #[test]
    fn test_run_args_override_config() {
        let mut config = StackprobeConfig::default();
        let args = RunArgs {
            output_dir: Some(PathBuf::from("/tmp/r")),
            format: Some(ReportFormatArg::Json),
            parallel: Some(1),
            timeout: Some(30),
            ..RunArgs::default()
        };

        args.apply_to(&mut config);

        assert_eq!(config.report.output_dir, "/tmp/r");
        assert_eq!(config.report.format, "json");
        assert_eq!(config.runner.parallel_workers, 1);
        assert_eq!(config.runner.timeout_secs, 30);
    }

    #[test]
    fn test_run_args_without_flags_keep_config() {
        let mut config = StackprobeConfig::default();
        let before = config.runner.timeout_secs;
        RunArgs::default().apply_to(&mut config);
        assert_eq!(config.runner.timeout_secs, before);
    }

    #[test]
    fn test_cli_parse_check_wait() {
        let cli = Cli::try_parse_from(["stackprobe", "check", "--wait"]).expect("parse succeeded");
        match cli.command {
            Commands::Check(args) => assert!(args.wait),
            _ => panic!("expected Check command"),
        }
    }

    #[test]
    fn test_cli_parse_deploy_audit_path() {
        let cli = Cli::try_parse_from(["stackprobe", "deploy", "audit", "/srv/matrix"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Deploy(args) => match args.action {
                DeployAction::Audit { path } => {
                    assert_eq!(path, Some(PathBuf::from("/srv/matrix")));
                }
                _ => panic!("expected Audit action"),
            },
            _ => panic!("expected Deploy command"),
        }
    }

    #[test]
    fn test_cli_parse_deploy_validate_full() {
        let cli = Cli::try_parse_from(["stackprobe", "deploy", "validate", "--full", "--keep"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Deploy(args) => match args.action {
                DeployAction::Validate { full, keep } => {
                    assert!(full);
                    assert!(keep);
                }
                _ => panic!("expected Validate action"),
            },
            _ => panic!("expected Deploy command"),
        }
    }

    #[test]
    fn test_cli_parse_config_show_section() {
        let cli = Cli::try_parse_from(["stackprobe", "config", "show", "--section", "runner"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Config(args) => match args.action {
                ConfigAction::Show { section } => {
                    assert_eq!(section, Some("runner".to_owned()));
                }
                _ => panic!("expected Show action"),
            },
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "stackprobe",
            "config",
            "validate",
            "--config",
            "/etc/stackprobe.toml",
            "--output",
            "json",
        ])
        .expect("parse succeeded");
        assert_eq!(cli.config, Some(PathBuf::from("/etc/stackprobe.toml")));
        assert_eq!(cli.output, OutputFormat::Json);
    }

    #[test]
    fn test_log_level_precedence() {
        let cli = Cli::try_parse_from(["stackprobe", "run", "-v"]).expect("parse succeeded");
        assert_eq!(cli.log_level_override().as_deref(), Some("debug"));

        let cli = Cli::try_parse_from(["stackprobe", "--log-level", "warn", "run", "-v"])
            .expect("parse succeeded");
        assert_eq!(cli.log_level_override().as_deref(), Some("warn"));

        let cli = Cli::try_parse_from(["stackprobe", "check"]).expect("parse succeeded");
        assert!(cli.log_level_override().is_none());
    }

    #[test]
    fn test_cli_missing_subcommand_fails() {
        assert!(Cli::try_parse_from(["stackprobe"]).is_err());
    }

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }
}
