//! Top-level DocDrift configuration with layered resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{AgentConfig, MappingConfig, SuppressionConfig, UrlCheckConfig, VerificationConfig};
use crate::constants::{
    MAX_AGENT_CONCURRENCY, MAX_AGENT_TIMEOUT_SECS, MIN_AGENT_CONCURRENCY, MIN_AGENT_TIMEOUT_SECS,
};
use crate::errors::ConfigError;

/// Top-level configuration aggregating all sub-configs.
///
/// Resolution order (highest priority first):
/// 1. CLI flags (applied via `apply_cli_overrides`)
/// 2. Environment variables (`DOCDRIFT_*`)
/// 3. Project config (`docdrift.toml` in project root)
/// 4. User config (`~/.docdrift/config.toml`)
/// 5. Compiled defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DocDriftConfig {
    pub agent: AgentConfig,
    pub mapping: MappingConfig,
    pub verification: VerificationConfig,
    pub url_check: UrlCheckConfig,
    pub suppression: SuppressionConfig,
    /// Default log level when `DOCDRIFT_LOG` is unset. Default: "info".
    pub log_level: Option<String>,
}

/// CLI override arguments that can be applied to a config.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub agent_concurrency: Option<usize>,
    pub agent_timeout_seconds: Option<u64>,
    pub agent_enabled: Option<bool>,
    pub semantic_threshold: Option<f64>,
    pub url_check_enabled: Option<bool>,
}

impl DocDriftConfig {
    /// Load configuration with layered resolution rooted at `root`.
    pub fn load(root: &Path, cli_overrides: Option<&CliOverrides>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Lowest file layer: user config. Only parse failures are fatal here.
        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                match Self::merge_toml_file(&mut config, &user_config_path) {
                    Ok(()) => {}
                    Err(err @ ConfigError::ParseError { .. }) => return Err(err),
                    Err(e) => {
                        tracing::warn!(error = %e, "ignoring unreadable user config");
                    }
                }
            }
        }

        let project_config_path = root.join("docdrift.toml");
        if project_config_path.exists() {
            Self::merge_toml_file(&mut config, &project_config_path)?;
        }

        Self::apply_env_overrides(&mut config);

        if let Some(cli) = cli_overrides {
            Self::apply_cli_overrides(&mut config, cli);
        }

        Self::validate(&config)?;

        Ok(config)
    }

    /// Load configuration from a TOML string (for testing).
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate the configuration values.
    pub fn validate(config: &DocDriftConfig) -> Result<(), ConfigError> {
        if let Some(c) = config.agent.concurrency {
            if !(MIN_AGENT_CONCURRENCY..=MAX_AGENT_CONCURRENCY).contains(&c) {
                return Err(invalid(
                    "agent.concurrency",
                    format!("must be between {MIN_AGENT_CONCURRENCY} and {MAX_AGENT_CONCURRENCY}"),
                ));
            }
        }
        if let Some(t) = config.agent.timeout_seconds {
            if !(MIN_AGENT_TIMEOUT_SECS..=MAX_AGENT_TIMEOUT_SECS).contains(&t) {
                return Err(invalid(
                    "agent.timeout_seconds",
                    format!(
                        "must be between {MIN_AGENT_TIMEOUT_SECS} and {MAX_AGENT_TIMEOUT_SECS}"
                    ),
                ));
            }
        }
        if config.agent.max_agent_files_per_claim == Some(0) {
            return Err(invalid("agent.max_agent_files_per_claim", "must be greater than 0"));
        }
        for (field, value) in [
            ("mapping.semantic_threshold", config.mapping.semantic_threshold),
            ("mapping.co_change_max_boost", config.mapping.co_change_max_boost),
            (
                "verification.semantic_verify_threshold",
                config.verification.semantic_verify_threshold,
            ),
            ("verification.signature_tolerance", config.verification.signature_tolerance),
            (
                "verification.uncertain_terminal_confidence",
                config.verification.uncertain_terminal_confidence,
            ),
        ] {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(invalid(field, "must be between 0.0 and 1.0"));
                }
            }
        }
        if let Some(s) = config.mapping.co_change_saturation {
            if s <= 0.0 {
                return Err(invalid("mapping.co_change_saturation", "must be greater than 0"));
            }
        }
        for (field, value) in [
            ("mapping.confidence_weight", config.mapping.confidence_weight),
            ("mapping.co_change_weight", config.mapping.co_change_weight),
        ] {
            if let Some(v) = value {
                if v < 0.0 {
                    return Err(invalid(field, "must not be negative"));
                }
            }
        }
        if config.url_check.timeout_ms == Some(0) {
            return Err(invalid("url_check.timeout_ms", "must be greater than 0"));
        }
        Ok(())
    }

    fn user_config_path() -> Option<PathBuf> {
        home_dir().map(|h| h.join(".docdrift").join("config.toml"))
    }

    /// Merge a TOML file into the existing config.
    /// Unknown keys are silently ignored (forward-compatible).
    fn merge_toml_file(config: &mut DocDriftConfig, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let file_config: DocDriftConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Self::merge(config, &file_config);
        Ok(())
    }

    /// Merge `other` into `base`; `Some` values in `other` win.
    fn merge(base: &mut DocDriftConfig, other: &DocDriftConfig) {
        macro_rules! take {
            ($($section:ident . $field:ident),+ $(,)?) => {
                $(
                    if other.$section.$field.is_some() {
                        base.$section.$field = other.$section.$field.clone();
                    }
                )+
            };
        }

        take!(
            agent.enabled,
            agent.concurrency,
            agent.timeout_seconds,
            agent.max_agent_files_per_claim,
            agent.path1_max_evidence_tokens,
            agent.retry_per_call_max,
            agent.retry_per_job_max,
            agent.task_ttl_seconds,
            agent.endpoint,
            mapping.semantic_threshold,
            mapping.semantic_top_k,
            mapping.co_change_max_boost,
            mapping.co_change_saturation,
            mapping.confidence_weight,
            mapping.co_change_weight,
            verification.semantic_verify_threshold,
            verification.signature_tolerance,
            verification.uncertain_terminal_confidence,
            verification.min_severity,
            url_check.enabled,
            url_check.timeout_ms,
            url_check.max_per_domain,
            suppression.claim_dismissal_threshold,
            suppression.claim_type_dismissal_threshold,
            suppression.count_based_expiry_days,
        );

        if other.log_level.is_some() {
            base.log_level = other.log_level.clone();
        }
    }

    /// Apply environment variable overrides.
    /// Pattern: `DOCDRIFT_AGENT_CONCURRENCY`, `DOCDRIFT_MAPPING_SEMANTIC_THRESHOLD`, etc.
    fn apply_env_overrides(config: &mut DocDriftConfig) {
        if let Some(v) = env_parse::<usize>("DOCDRIFT_AGENT_CONCURRENCY") {
            config.agent.concurrency = Some(v);
        }
        if let Some(v) = env_parse::<u64>("DOCDRIFT_AGENT_TIMEOUT_SECONDS") {
            config.agent.timeout_seconds = Some(v);
        }
        if let Some(v) = env_parse::<bool>("DOCDRIFT_AGENT_ENABLED") {
            config.agent.enabled = Some(v);
        }
        if let Ok(v) = std::env::var("DOCDRIFT_AGENT_ENDPOINT") {
            config.agent.endpoint = Some(v);
        }
        if let Some(v) = env_parse::<f64>("DOCDRIFT_MAPPING_SEMANTIC_THRESHOLD") {
            config.mapping.semantic_threshold = Some(v);
        }
        if let Some(v) = env_parse::<bool>("DOCDRIFT_URL_CHECK_ENABLED") {
            config.url_check.enabled = Some(v);
        }
        if let Some(v) = env_parse::<u64>("DOCDRIFT_URL_CHECK_TIMEOUT_MS") {
            config.url_check.timeout_ms = Some(v);
        }
    }

    /// Apply CLI overrides (highest priority).
    fn apply_cli_overrides(config: &mut DocDriftConfig, cli: &CliOverrides) {
        if let Some(v) = cli.agent_concurrency {
            config.agent.concurrency = Some(v);
        }
        if let Some(v) = cli.agent_timeout_seconds {
            config.agent.timeout_seconds = Some(v);
        }
        if let Some(v) = cli.agent_enabled {
            config.agent.enabled = Some(v);
        }
        if let Some(v) = cli.semantic_threshold {
            config.mapping.semantic_threshold = Some(v);
        }
        if let Some(v) = cli.url_check_enabled {
            config.url_check.enabled = Some(v);
        }
    }

    /// Serialize the config back to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            path: "<serialization>".to_string(),
            message: e.to_string(),
        })
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationFailed {
        field: field.to_string(),
        message: message.into(),
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
