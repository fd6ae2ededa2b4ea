//! Deployment lifecycle manager for stackprobe.
//!
//! Provisions an isolated copy of a compose project, validates it, creates
//! its external volumes, starts the stack, checks it, and always tears it
//! down again.
//!
//! # Module Structure
//!
//! - [`lifecycle`]: stage machine and `DeploymentManager`
//! - [`workspace`]: ephemeral directory, filtered copy, environment file
//! - [`manifest`]: compose file validation
//! - [`runtime`]: `ContainerRuntime` trait and `compose ps` parsing
//! - [`docker`]: bollard + compose CLI implementation
//! - [`smoke`]: post-start functional checks
//! - [`audit`]: static artifact audit of a project root
//! - [`error`]: `DeployError`

pub mod audit;
pub mod docker;
pub mod error;
pub mod lifecycle;
pub mod manifest;
pub mod runtime;
pub mod smoke;
pub mod workspace;

pub use audit::{AuditFinding, AuditReport, Severity, audit_project};
pub use docker::{ComposeCommand, DockerRuntime};
pub use error::DeployError;
pub use lifecycle::{
    ConfigureReport, DeploymentManager, DeploymentRecord, DeploymentStage, TeardownReport,
    VolumeFailure, VolumeReport,
};
pub use manifest::{ManifestSummary, validate_manifest};
pub use runtime::{ContainerRecord, ContainerRuntime, parse_ps_output};
pub use smoke::{SmokeCheckResult, SmokeReport, run_smoke_checks};
pub use workspace::{CopySummary, EnvFileSource, ExclusionSet, Workspace};
