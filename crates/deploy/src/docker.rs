//! Production [`ContainerRuntime`]: Docker API for volumes, compose CLI for the stack.
//!
//! Volumes and reachability go through `bollard`. The stack itself is driven
//! through the compose CLI because compose projects have no daemon-side API.
//! The CLI is detected once at connect time: `docker compose` (v2) first,
//! then `docker-compose` (v1), unless a command is configured explicitly.

use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use bollard::Docker;
use bollard::volume::{CreateVolumeOptions, RemoveVolumeOptions};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::DeployError;
use crate::runtime::{ContainerRecord, ContainerRuntime, parse_ps_output};

const DETECT_TIMEOUT: Duration = Duration::from_secs(10);
const PS_TIMEOUT: Duration = Duration::from_secs(30);

/// A compose CLI invocation prefix, e.g. `docker compose` or `docker-compose`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeCommand {
    program: String,
    base_args: Vec<String>,
}

impl ComposeCommand {
    /// Builds a command from configured parts. Returns `None` for an empty list.
    pub fn from_parts(parts: &[String]) -> Option<Self> {
        let (program, rest) = parts.split_first()?;
        Some(Self {
            program: program.clone(),
            base_args: rest.to_vec(),
        })
    }

    /// Compose v2 plugin.
    pub fn v2() -> Self {
        Self {
            program: "docker".to_owned(),
            base_args: vec!["compose".to_owned()],
        }
    }

    /// Standalone compose v1.
    pub fn v1() -> Self {
        Self {
            program: "docker-compose".to_owned(),
            base_args: Vec::new(),
        }
    }

    /// Picks the first candidate whose `version` subcommand succeeds.
    pub async fn detect() -> Result<Self, DeployError> {
        for candidate in [Self::v2(), Self::v1()] {
            let probe = candidate
                .run(Path::new("."), &["version"], DETECT_TIMEOUT, "compose detection")
                .await;
            match probe {
                Ok(_) => {
                    info!(command = %candidate, "compose command detected");
                    return Ok(candidate);
                }
                Err(e) => debug!(command = %candidate, error = %e, "compose candidate unavailable"),
            }
        }
        Err(DeployError::Runtime(
            "neither 'docker compose' nor 'docker-compose' is available".to_owned(),
        ))
    }

    /// Runs `<program> <base_args> <args>` in `dir`; non-zero exit is an error.
    pub async fn run(
        &self,
        dir: &Path,
        args: &[&str],
        timeout: Duration,
        operation: &str,
    ) -> Result<Output, DeployError> {
        let child = Command::new(&self.program)
            .args(&self.base_args)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DeployError::Runtime(format!("failed to spawn '{self}': {e}")))?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| DeployError::Timeout {
                operation: operation.to_owned(),
                secs: timeout.as_secs(),
            })??;

        if output.status.success() {
            Ok(output)
        } else {
            Err(DeployError::ComposeFailed {
                command: format!("{self} {}", args.join(" ")),
                status: output
                    .status
                    .code()
                    .map_or_else(|| "signal".to_owned(), |c| c.to_string()),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

impl std::fmt::Display for ComposeCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.base_args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Docker daemon plus compose CLI.
pub struct DockerRuntime {
    docker: Docker,
    compose: ComposeCommand,
}

impl DockerRuntime {
    /// Connects to the local Docker daemon and resolves the compose command.
    ///
    /// An empty `compose_override` triggers detection.
    pub async fn connect(compose_override: &[String]) -> Result<Self, DeployError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| DeployError::Runtime(format!("failed to connect to docker: {e}")))?;
        let compose = match ComposeCommand::from_parts(compose_override) {
            Some(command) => command,
            None => ComposeCommand::detect().await?,
        };
        Ok(Self { docker, compose })
    }

    pub fn compose(&self) -> &ComposeCommand {
        &self.compose
    }
}

impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> Result<(), DeployError> {
        self.docker
            .ping()
            .await
            .map_err(|e| DeployError::Runtime(format!("ping failed: {e}")))?;
        Ok(())
    }

    async fn create_volume(&self, name: &str) -> Result<(), DeployError> {
        if self.docker.inspect_volume(name).await.is_ok() {
            return Err(DeployError::Volume {
                name: name.to_owned(),
                reason: "already exists".to_owned(),
            });
        }
        self.docker
            .create_volume(CreateVolumeOptions {
                name: name.to_owned(),
                ..Default::default()
            })
            .await
            .map_err(|e| DeployError::Volume {
                name: name.to_owned(),
                reason: format!("create failed: {e}"),
            })?;
        Ok(())
    }

    async fn remove_volume(&self, name: &str) -> Result<(), DeployError> {
        self.docker
            .remove_volume(name, Some(RemoveVolumeOptions { force: true }))
            .await
            .map_err(|e| DeployError::Volume {
                name: name.to_owned(),
                reason: format!("remove failed: {e}"),
            })
    }

    async fn compose_up(&self, project_dir: &Path, timeout: Duration) -> Result<(), DeployError> {
        self.compose
            .run(project_dir, &["up", "-d"], timeout, "stack start")
            .await?;
        Ok(())
    }

    async fn compose_ps(&self, project_dir: &Path) -> Result<Vec<ContainerRecord>, DeployError> {
        let output = self
            .compose
            .run(
                project_dir,
                &["ps", "--format", "json"],
                PS_TIMEOUT,
                "container listing",
            )
            .await?;
        Ok(parse_ps_output(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn compose_down(&self, project_dir: &Path, timeout: Duration) -> Result<(), DeployError> {
        self.compose
            .run(project_dir, &["down", "--volumes"], timeout, "stack stop")
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_command_from_parts() {
        let parts = vec!["/tmp/docker-compose".to_owned()];
        let cmd = ComposeCommand::from_parts(&parts).unwrap();
        assert_eq!(cmd, ComposeCommand {
            program: "/tmp/docker-compose".to_owned(),
            base_args: vec![],
        });
        assert!(ComposeCommand::from_parts(&[]).is_none());
    }

    #[test]
    fn compose_command_display() {
        assert_eq!(ComposeCommand::v2().to_string(), "docker compose");
        assert_eq!(ComposeCommand::v1().to_string(), "docker-compose");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_reports_non_zero_exit_with_output() {
        let cmd = ComposeCommand::from_parts(&["sh".to_owned(), "-c".to_owned()]).unwrap();
        let err = cmd
            .run(
                Path::new("."),
                &["echo out; echo bad >&2; exit 2"],
                Duration::from_secs(5),
                "test",
            )
            .await
            .unwrap_err();
        match err {
            DeployError::ComposeFailed {
                status, stdout, stderr, ..
            } => {
                assert_eq!(status, "2");
                assert_eq!(stdout.trim(), "out");
                assert_eq!(stderr.trim(), "bad");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_times_out() {
        let cmd = ComposeCommand::from_parts(&["sleep".to_owned()]).unwrap();
        let err = cmd
            .run(Path::new("."), &["5"], Duration::from_millis(100), "stack start")
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::Timeout { ref operation, .. } if operation == "stack start"));
    }
}
