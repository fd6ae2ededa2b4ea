//! Diagnostic logging for the `stackprobe` binary.
//!
//! Console output (✓/✗ progress, summaries, JSON documents) owns stdout, so
//! every tracing layer writes to stderr. `RUST_LOG` replaces the configured
//! filter entirely; otherwise `general.log_level` applies, with the HTTP and
//! Docker client crates held at `warn`.

use std::io;

use anyhow::{Context, Result, bail};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use stackprobe_core::config::GeneralConfig;

/// Dependencies capped at `warn` unless `RUST_LOG` says otherwise.
const QUIET_DEPENDENCIES: [&str; 4] = [
    "hyper=warn",
    "hyper_util=warn",
    "reqwest=warn",
    "bollard=warn",
];

/// Installs the global subscriber. Call once, before the first event.
///
/// `log_format` is `"json"` (one object per line) or `"pretty"`.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let filter = build_filter(&config.log_level)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.log_format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init(),
        "pretty" => registry
            .with(fmt::layer().pretty().with_writer(io::stderr))
            .try_init(),
        other => bail!("unknown log format '{other}', expected 'json' or 'pretty'"),
    };
    installed.with_context(|| format!("failed to install {} log subscriber", config.log_format))
}

/// Filter for `level`, or the `RUST_LOG` filter when that is set.
pub fn build_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let mut filter =
        EnvFilter::try_new(level).with_context(|| format!("invalid log level '{level}'"))?;
    for directive in QUIET_DEPENDENCIES {
        filter = filter.add_directive(directive.parse()?);
    }
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_configured_level_builds_a_filter() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(build_filter(level).is_ok(), "level {level}");
        }
    }

    #[test]
    fn unknown_format_is_rejected_before_installing() {
        let config = GeneralConfig {
            log_format: "xml".to_owned(),
            ..GeneralConfig::default()
        };
        let err = init_tracing(&config).unwrap_err();
        assert!(err.to_string().contains("unknown log format 'xml'"));
    }
}
