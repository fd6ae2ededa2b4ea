//! CLI-specific error types and exit code mapping

use stackprobe_core::error::StackprobeError;
use stackprobe_deploy::DeployError;
use stackprobe_readiness::ProbeError;
use stackprobe_report::ReportError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The run finished but not every test passed.
    #[error("{failed} failed, {errors} errors")]
    TestsFailed { failed: u32, errors: u32 },

    /// Some target services did not answer.
    #[error("services unavailable: {}", .0.join(", "))]
    ServicesUnavailable(Vec<String>),

    /// A deployment lifecycle step failed.
    #[error("deployment failed: {0}")]
    Deployment(String),

    /// Stopped by the user (Ctrl-C).
    #[error("interrupted")]
    Interrupted,

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from stackprobe-core.
    #[error("{0}")]
    Core(#[from] StackprobeError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                  |
    /// |------|------------------------------------------|
    /// | 0    | Success, every test passed               |
    /// | 1    | Test failure, test error, any other error |
    /// | 130  | Interrupted by the user                  |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Interrupted => 130,
            _ => 1,
        }
    }

    /// Whether `main` still has to print the error.
    ///
    /// Test failures and interrupts were already reported on the console.
    pub fn needs_message(&self) -> bool {
        !matches!(self, Self::TestsFailed { .. } | Self::Interrupted)
    }
}

impl From<DeployError> for CliError {
    fn from(e: DeployError) -> Self {
        Self::Deployment(e.to_string())
    }
}

impl From<ReportError> for CliError {
    fn from(e: ReportError) -> Self {
        Self::Core(e.into())
    }
}

impl From<ProbeError> for CliError {
    fn from(e: ProbeError) -> Self {
        Self::Command(format!("http client: {e}"))
    }
}
