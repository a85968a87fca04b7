//! Tests for the DocDrift configuration system.

use std::sync::Mutex;

use docdrift_core::config::{CliOverrides, DocDriftConfig};
use docdrift_core::errors::ConfigError;
use docdrift_core::models::Severity;

/// Serializes tests that modify environment variables.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn tempdir() -> tempfile::TempDir {
    tempfile::TempDir::new().unwrap()
}

/// Clear all DOCDRIFT_ env vars and point HOME at an empty directory.
fn isolate_env(home: &std::path::Path) {
    for key in [
        "DOCDRIFT_AGENT_CONCURRENCY",
        "DOCDRIFT_AGENT_TIMEOUT_SECONDS",
        "DOCDRIFT_AGENT_ENABLED",
        "DOCDRIFT_AGENT_ENDPOINT",
        "DOCDRIFT_MAPPING_SEMANTIC_THRESHOLD",
        "DOCDRIFT_URL_CHECK_ENABLED",
        "DOCDRIFT_URL_CHECK_TIMEOUT_MS",
    ] {
        std::env::remove_var(key);
    }
    std::env::set_var("HOME", home);
}

#[test]
fn test_layered_resolution() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let home = tempdir();
    isolate_env(home.path());

    std::fs::create_dir_all(home.path().join(".docdrift")).unwrap();
    std::fs::write(
        home.path().join(".docdrift").join("config.toml"),
        "[agent]\nmax_agent_files_per_claim = 8\nconcurrency = 2\n",
    )
    .unwrap();

    let dir = tempdir();
    std::fs::write(
        dir.path().join("docdrift.toml"),
        r#"
[agent]
concurrency = 3
timeout_seconds = 200

[mapping]
semantic_threshold = 0.6
"#,
    )
    .unwrap();

    std::env::set_var("DOCDRIFT_AGENT_TIMEOUT_SECONDS", "300");

    let cli = CliOverrides {
        semantic_threshold: Some(0.9),
        ..Default::default()
    };
    let config = DocDriftConfig::load(dir.path(), Some(&cli)).unwrap();

    // User layer survives where nothing overrides it.
    assert_eq!(config.agent.max_agent_files_per_claim, Some(8));
    // Project overrides user.
    assert_eq!(config.agent.concurrency, Some(3));
    // Env overrides project.
    assert_eq!(config.agent.timeout_seconds, Some(300));
    // CLI overrides project.
    assert_eq!(config.mapping.semantic_threshold, Some(0.9));

    std::env::remove_var("DOCDRIFT_AGENT_TIMEOUT_SECONDS");
}

#[test]
fn test_missing_files_fall_back_to_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let home = tempdir();
    isolate_env(home.path());

    let dir = tempdir();
    let config = DocDriftConfig::load(dir.path(), None).unwrap();

    assert!(config.agent.effective_enabled());
    assert_eq!(config.agent.effective_concurrency(), 5);
    assert_eq!(config.agent.effective_timeout_seconds(), 120);
    assert_eq!(config.agent.effective_max_agent_files_per_claim(), 15);
    assert_eq!(config.agent.effective_path1_max_evidence_tokens(), 4000);
    assert_eq!(config.agent.effective_retry_per_call_max(), 2);
    assert_eq!(config.agent.effective_retry_per_job_max(), 3);
    assert_eq!(config.mapping.effective_semantic_threshold(), 0.7);
    assert_eq!(config.verification.effective_semantic_verify_threshold(), 0.85);
    assert_eq!(config.verification.effective_min_severity(), Severity::Low);
    assert_eq!(config.suppression.effective_claim_dismissal_threshold(), 2);
    assert_eq!(config.suppression.effective_claim_type_dismissal_threshold(), 5);
    assert_eq!(config.suppression.effective_count_based_expiry_days(), 90);
}

#[test]
fn test_concurrency_out_of_range_rejected() {
    let err = DocDriftConfig::from_toml("[agent]\nconcurrency = 21\n").unwrap_err();
    assert!(matches!(
        err,
        ConfigError::ValidationFailed { ref field, .. } if field == "agent.concurrency"
    ));
    assert!(DocDriftConfig::from_toml("[agent]\nconcurrency = 0\n").is_err());
    assert!(DocDriftConfig::from_toml("[agent]\nconcurrency = 20\n").is_ok());
}

#[test]
fn test_timeout_out_of_range_rejected() {
    assert!(DocDriftConfig::from_toml("[agent]\ntimeout_seconds = 29\n").is_err());
    assert!(DocDriftConfig::from_toml("[agent]\ntimeout_seconds = 601\n").is_err());
    assert!(DocDriftConfig::from_toml("[agent]\ntimeout_seconds = 600\n").is_ok());
}

#[test]
fn test_fraction_fields_validated() {
    let err = DocDriftConfig::from_toml("[mapping]\nsemantic_threshold = 1.5\n").unwrap_err();
    assert!(matches!(err, ConfigError::ValidationFailed { .. }));
    assert!(DocDriftConfig::from_toml("[mapping]\nco_change_saturation = 0.0\n").is_err());
    assert!(DocDriftConfig::from_toml("[mapping]\nco_change_weight = -1.0\n").is_err());
}

#[test]
fn test_invalid_toml_is_parse_error() {
    let err = DocDriftConfig::from_toml("[agent\nconcurrency = 2").unwrap_err();
    assert!(matches!(err, ConfigError::ParseError { .. }));
}

#[test]
fn test_unknown_keys_ignored() {
    let config = DocDriftConfig::from_toml("[agent]\nconcurrency = 4\nfuture_knob = true\n").unwrap();
    assert_eq!(config.agent.effective_concurrency(), 4);
}

#[test]
fn test_min_severity_parses_lowercase() {
    let config = DocDriftConfig::from_toml("[verification]\nmin_severity = \"medium\"\n").unwrap();
    assert_eq!(config.verification.effective_min_severity(), Severity::Medium);
}

#[test]
fn test_toml_roundtrip_preserves_overrides() {
    let config = DocDriftConfig::from_toml("[agent]\nconcurrency = 7\n").unwrap();
    let text = config.to_toml().unwrap();
    let back = DocDriftConfig::from_toml(&text).unwrap();
    assert_eq!(back.agent.concurrency, Some(7));
}
