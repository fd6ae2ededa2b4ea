//! Service readiness prober for stackprobe.
//!
//! # Module Structure
//!
//! - [`client`]: HTTP abstraction (`HttpClient` trait, `ReqwestHttpClient`)
//! - [`prober`]: budgeted health polling (`ReadinessProber`, `ProbePolicy`)
//! - [`error`]: request error type (`ProbeError`)

pub mod client;
pub mod error;
pub mod prober;

pub use client::{HttpClient, HttpResponse, ReqwestHttpClient};
pub use error::ProbeError;
pub use prober::{ProbePolicy, ReadinessProber, ensure_all_ready, is_ready_status, unready_services};
