//! Container runtime abstraction for testability.
//!
//! The [`ContainerRuntime`] trait covers everything the lifecycle manager
//! needs from the container platform: daemon reachability, named volumes,
//! and bringing a compose project up and down. Production code uses
//! [`DockerRuntime`](crate::docker::DockerRuntime); tests use scripted mocks.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DeployError;

/// One container of a running compose project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Service", default)]
    pub service: String,
    #[serde(rename = "State", default)]
    pub state: String,
}

/// Trait abstracting container platform operations.
///
/// # Error Handling
///
/// - Unreachable daemon: `DeployError::Runtime`
/// - Volume API failures (including "already exists"): `DeployError::Volume`
/// - Non-zero compose exit: `DeployError::ComposeFailed` with captured output
/// - Compose exceeding its budget: `DeployError::Timeout`
pub trait ContainerRuntime: Send + Sync + 'static {
    /// Checks that the daemon answers.
    fn ping(&self) -> impl Future<Output = Result<(), DeployError>> + Send;

    /// Creates a named volume. Fails if the volume already exists.
    fn create_volume(&self, name: &str) -> impl Future<Output = Result<(), DeployError>> + Send;

    /// Removes a named volume.
    fn remove_volume(&self, name: &str) -> impl Future<Output = Result<(), DeployError>> + Send;

    /// Brings the project in `project_dir` up in detached mode.
    fn compose_up(
        &self,
        project_dir: &Path,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), DeployError>> + Send;

    /// Lists the project's containers.
    fn compose_ps(
        &self,
        project_dir: &Path,
    ) -> impl Future<Output = Result<Vec<ContainerRecord>, DeployError>> + Send;

    /// Stops and removes the project's containers and volumes.
    fn compose_down(
        &self,
        project_dir: &Path,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), DeployError>> + Send;
}

/// Parses `compose ps --format json` output.
///
/// Compose v2 prints one JSON object per line; some versions print a single
/// JSON array. Lines that are not JSON objects are skipped.
pub fn parse_ps_output(stdout: &str) -> Vec<ContainerRecord> {
    let trimmed = stdout.trim();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).unwrap_or_default();
    }
    trimmed
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ndjson() {
        let out = r#"{"Name":"voice-stack-synapse-1","Service":"synapse","State":"running","Image":"x"}
{"Name":"voice-stack-postgres-1","Service":"postgres","State":"running"}
"#;
        let records = parse_ps_output(out);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "voice-stack-synapse-1");
        assert_eq!(records[1].service, "postgres");
        assert_eq!(records[1].state, "running");
    }

    #[test]
    fn parses_json_array() {
        let out = r#"[{"Name":"a","Service":"synapse","State":"running"},{"Name":"b","Service":"element","State":"exited"}]"#;
        let records = parse_ps_output(out);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].state, "exited");
    }

    #[test]
    fn garbage_lines_are_skipped() {
        let out = "WARN[0000] some warning\n{\"Name\":\"a\"}\nnot json\n";
        let records = parse_ps_output(out);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].service, "");
    }

    #[test]
    fn empty_output_yields_nothing() {
        assert!(parse_ps_output("").is_empty());
        assert!(parse_ps_output("[]").is_empty());
    }
}
