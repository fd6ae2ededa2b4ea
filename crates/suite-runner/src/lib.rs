//! Suite executor for stackprobe.
//!
//! Runs one test suite per isolated subprocess under a timeout and turns
//! whatever the process leaves behind into a [`SuiteResult`].
//!
//! # Module Structure
//!
//! - [`executor`]: process spawning, timeout, result-source resolution (`SuiteExecutor`)
//! - [`structured`]: structured result artifact model (`StructuredReport`)
//! - [`summary`]: fallback summary-line parser
//! - [`error`]: domain error types (`SuiteRunnerError`)
//!
//! [`SuiteResult`]: stackprobe_core::types::SuiteResult

pub mod error;
pub mod executor;
pub mod structured;
pub mod summary;

pub use error::SuiteRunnerError;
pub use executor::{ResultSource, SuiteExecutor, child_environment};
pub use structured::StructuredReport;
pub use summary::{parse_summary, parse_summary_line};
