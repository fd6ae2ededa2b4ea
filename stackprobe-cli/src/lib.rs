//! stackprobe CLI library.
//!
//! Exposes the command surface and the run orchestrator for integration
//! testing. In production, `stackprobe` is used as a binary (main.rs).

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod output;
