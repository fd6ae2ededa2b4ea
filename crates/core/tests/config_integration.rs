//! stackprobe.toml 통합 설정 테스트
//!
//! - stackprobe.toml.example 파싱 테스트
//! - 부분 설정 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 파일 로딩 에러 테스트

use stackprobe_core::config::StackprobeConfig;
use stackprobe_core::error::{ConfigError, StackprobeError};

const EXAMPLE: &str = include_str!("../../../stackprobe.toml.example");

/// 환경변수를 설정한 채로 `f`를 실행하고 원래 값으로 복원합니다.
fn with_env<R>(key: &str, value: &str, f: impl FnOnce() -> R) -> R {
    let original = std::env::var(key).ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var(key, value);
    }

    let result = f();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var(key, val),
            None => std::env::remove_var(key),
        }
    }
    result
}

// =============================================================================
// stackprobe.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_and_validates() {
    let config = StackprobeConfig::parse(EXAMPLE).expect("example config should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults() {
    let example = StackprobeConfig::parse(EXAMPLE).expect("should parse");
    let defaults = StackprobeConfig::default();

    assert_eq!(example.general.log_level, defaults.general.log_level);
    assert_eq!(example.general.log_format, defaults.general.log_format);
    assert_eq!(example.targets.synapse_url, defaults.targets.synapse_url);
    assert_eq!(example.targets.well_known_url, defaults.targets.well_known_url);
    assert_eq!(example.runner.args, defaults.runner.args);
    assert_eq!(example.runner.suites, defaults.runner.suites);
    assert_eq!(example.runner.timeout_secs, defaults.runner.timeout_secs);
    assert_eq!(
        example.readiness.global_timeout_secs,
        defaults.readiness.global_timeout_secs
    );
    assert_eq!(
        example.deploy.exclude_patterns,
        defaults.deploy.exclude_patterns
    );
    assert_eq!(
        example.deploy.required_services,
        defaults.deploy.required_services
    );
    assert_eq!(example.report.format, defaults.report.format);
}

// =============================================================================
// 부분 설정
// =============================================================================

#[test]
fn partial_config_report_only() {
    let toml = r#"
[report]
output_dir = "/tmp/reports"
format = "json"
"#;
    let config = StackprobeConfig::parse(toml).expect("should parse");
    assert_eq!(config.report.output_dir, "/tmp/reports");
    assert_eq!(config.report.format, "json");
    assert_eq!(config.runner.timeout_secs, 300);
}

#[test]
fn partial_config_explicit_readiness_services() {
    let toml = r#"
[[readiness.services]]
name = "synapse"
url = "http://10.0.0.5:8008/health"
"#;
    let config = StackprobeConfig::parse(toml).expect("should parse");
    let endpoints = config.readiness.endpoints(&config.targets);
    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints[0].url, "http://10.0.0.5:8008/health");
}

#[test]
fn wrong_type_for_numeric_field() {
    let toml = r#"
[runner]
timeout_secs = "five minutes"
"#;
    let err = StackprobeConfig::parse(toml).unwrap_err();
    assert!(matches!(
        err,
        StackprobeError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn unknown_section_is_ignored() {
    let toml = r#"
[unknown]
key = "value"
"#;
    assert!(StackprobeConfig::parse(toml).is_ok());
}

// =============================================================================
// 환경변수 우선순위
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[targets]
synapse_url = "http://from-file:8008"
"#;
    let result = with_env("SYNAPSE_URL", "http://from-env:8008", || {
        let mut config = StackprobeConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config.targets.synapse_url
    });
    assert_eq!(result, "http://from-env:8008");
}

#[test]
#[serial_test::serial]
fn env_override_numeric_field() {
    let result = with_env("TEST_TIMEOUT", "45", || {
        let mut config = StackprobeConfig::parse("").expect("should parse");
        config.apply_env_overrides();
        config.runner.timeout_secs
    });
    assert_eq!(result, 45);
}

#[test]
#[serial_test::serial]
fn env_override_invalid_number_keeps_toml_value() {
    let toml = r#"
[runner]
parallel_workers = 3
"#;
    let result = with_env("PARALLEL_WORKERS", "many", || {
        let mut config = StackprobeConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config.runner.parallel_workers
    });
    assert_eq!(result, 3);
}

// =============================================================================
// 파일 로딩
// =============================================================================

#[tokio::test]
async fn from_file_reads_written_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("stackprobe.toml");
    std::fs::write(&path, "[runner]\ntimeout_secs = 12\n").expect("write");

    let config = StackprobeConfig::from_file(&path).await.expect("should load");
    assert_eq!(config.runner.timeout_secs, 12);
}

#[tokio::test]
async fn from_file_rejects_invalid_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("stackprobe.toml");
    std::fs::write(&path, "[general]\nlog_format = \"xml\"\n").expect("write");

    let err = StackprobeConfig::from_file(&path).await.unwrap_err();
    assert!(matches!(
        err,
        StackprobeError::Config(ConfigError::InvalidValue { .. })
    ));
}

#[tokio::test]
async fn from_file_nonexistent_returns_file_not_found() {
    let err = StackprobeConfig::from_file("/nonexistent/stackprobe.toml")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StackprobeError::Config(ConfigError::FileNotFound { .. })
    ));
}
