// SPDX-License-Identifier: MIT OR Apache-2.0
//! Process-environment configuration for Titan-AAS.
//!
//! [`TitanConfig`] names every key recognized by the core, with the
//! defaults documented for each. [`load_config`] reads an optional TOML
//! file and applies `TITAN_*` environment overrides on top; [`validate_config`]
//! catches out-of-range values and returns advisory [`ConfigWarning`]s for
//! missing connection strings.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while loading or validating a [`TitanConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

/// Advisory-level issues that do not prevent startup but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A connection string the core reads at startup was left unset.
    MissingConnection {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// A TTL or timeout is unusually large.
    LargeTimeout {
        /// Field name.
        field: String,
        /// Value in the field's native unit (seconds or milliseconds).
        value: u64,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::MissingConnection { field, hint } => {
                write!(f, "missing connection string '{field}': {hint}")
            }
            ConfigWarning::LargeTimeout { field, value } => {
                write!(f, "'{field}' is unusually large ({value})")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Process-environment configuration recognized by the core.
///
/// Every field mirrors a key from the external configuration table:
/// connection strings for the three backing components, cache TTLs,
/// pagination and validation caps, leader-election timing, and Event Log
/// retry/DLQ thresholds.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TitanConfig {
    /// Store connection string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_url: Option<String>,

    /// Cache connection string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_url: Option<String>,

    /// Event Log connection string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_log_url: Option<String>,

    /// Partition count used to order events per entity.
    #[serde(default = "default_event_log_partitions")]
    pub event_log_partitions: u32,

    /// Default TTL, in seconds, for a single cached entity.
    #[serde(default = "default_cache_entity_ttl_s")]
    pub cache_entity_ttl_s: u64,

    /// Default TTL, in seconds, for a cached list page.
    #[serde(default = "default_cache_list_ttl_s")]
    pub cache_list_ttl_s: u64,

    /// Upper bound accepted for the `limit` query parameter.
    #[serde(default = "default_max_page_limit")]
    pub max_page_limit: u32,

    /// Leader-election lease lifetime, in seconds.
    #[serde(default = "default_lease_ttl_s")]
    pub lease_ttl_s: u64,

    /// Interval, in seconds, at which the current leader renews its lease.
    #[serde(default = "default_lease_renew_s")]
    pub lease_renew_s: u64,

    /// Maximum Single-Writer retries before an event moves to the DLQ.
    #[serde(default = "default_event_max_retries")]
    pub event_max_retries: u32,

    /// Claim timeout, in milliseconds, before an in-flight event is
    /// considered abandoned and reclaimed by another consumer.
    #[serde(default = "default_event_claim_timeout_ms")]
    pub event_claim_timeout_ms: u64,

    /// Event payload size, in bytes, above which it is stored by reference
    /// rather than inline.
    #[serde(default = "default_inline_payload_threshold_bytes")]
    pub inline_payload_threshold_bytes: u64,

    /// Maximum element-tree recursion depth accepted by validation.
    #[serde(default = "default_recursion_depth_limit")]
    pub recursion_depth_limit: usize,

    /// Number of events the Single-Writer pipelines at once across
    /// partitions. Not in the source's named configuration table, which it
    /// describes as non-exhaustive; carried here for the same reason the
    /// DLQ thresholds are.
    #[serde(default = "default_writer_batch_size")]
    pub writer_batch_size: u32,
}

impl Default for TitanConfig {
    fn default() -> Self {
        Self {
            store_url: None,
            cache_url: None,
            event_log_url: None,
            event_log_partitions: default_event_log_partitions(),
            cache_entity_ttl_s: default_cache_entity_ttl_s(),
            cache_list_ttl_s: default_cache_list_ttl_s(),
            max_page_limit: default_max_page_limit(),
            lease_ttl_s: default_lease_ttl_s(),
            lease_renew_s: default_lease_renew_s(),
            event_max_retries: default_event_max_retries(),
            event_claim_timeout_ms: default_event_claim_timeout_ms(),
            inline_payload_threshold_bytes: default_inline_payload_threshold_bytes(),
            recursion_depth_limit: default_recursion_depth_limit(),
            writer_batch_size: default_writer_batch_size(),
        }
    }
}

fn default_event_log_partitions() -> u32 {
    8
}
fn default_cache_entity_ttl_s() -> u64 {
    600
}
fn default_cache_list_ttl_s() -> u64 {
    60
}
fn default_max_page_limit() -> u32 {
    1_000
}
fn default_lease_ttl_s() -> u64 {
    30
}
fn default_lease_renew_s() -> u64 {
    10
}
fn default_event_max_retries() -> u32 {
    5
}
fn default_event_claim_timeout_ms() -> u64 {
    30_000
}
fn default_inline_payload_threshold_bytes() -> u64 {
    64 * 1024
}
fn default_recursion_depth_limit() -> usize {
    64
}
fn default_writer_batch_size() -> u32 {
    64
}

/// Default value accepted for the `limit` query parameter when the caller
/// omits it, per the external interface table.
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

const LARGE_TIMEOUT_THRESHOLD_S: u64 = 3_600;

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`TitanConfig`] from an optional TOML file path, then apply
/// `TITAN_*` environment overrides on top.
pub fn load_config(path: Option<&Path>) -> Result<TitanConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => TitanConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into a [`TitanConfig`].
pub fn parse_toml(content: &str) -> Result<TitanConfig, ConfigError> {
    toml::from_str::<TitanConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

/// Apply `TITAN_*` environment variable overrides in place.
///
/// Recognized variables mirror the field names: `TITAN_STORE_URL`,
/// `TITAN_CACHE_URL`, `TITAN_EVENT_LOG_URL`, `TITAN_EVENT_LOG_PARTITIONS`,
/// `TITAN_CACHE_ENTITY_TTL_S`, `TITAN_CACHE_LIST_TTL_S`,
/// `TITAN_MAX_PAGE_LIMIT`, `TITAN_LEASE_TTL_S`, `TITAN_LEASE_RENEW_S`,
/// `TITAN_EVENT_MAX_RETRIES`, `TITAN_EVENT_CLAIM_TIMEOUT_MS`,
/// `TITAN_INLINE_PAYLOAD_THRESHOLD_BYTES`, `TITAN_RECURSION_DEPTH_LIMIT`,
/// `TITAN_WRITER_BATCH_SIZE`.
/// Numeric overrides that fail to parse are silently ignored, leaving the
/// existing value in place.
pub fn apply_env_overrides(config: &mut TitanConfig) {
    if let Ok(val) = std::env::var("TITAN_STORE_URL") {
        config.store_url = Some(val);
    }
    if let Ok(val) = std::env::var("TITAN_CACHE_URL") {
        config.cache_url = Some(val);
    }
    if let Ok(val) = std::env::var("TITAN_EVENT_LOG_URL") {
        config.event_log_url = Some(val);
    }
    set_from_env("TITAN_EVENT_LOG_PARTITIONS", &mut config.event_log_partitions);
    set_from_env("TITAN_CACHE_ENTITY_TTL_S", &mut config.cache_entity_ttl_s);
    set_from_env("TITAN_CACHE_LIST_TTL_S", &mut config.cache_list_ttl_s);
    set_from_env("TITAN_MAX_PAGE_LIMIT", &mut config.max_page_limit);
    set_from_env("TITAN_LEASE_TTL_S", &mut config.lease_ttl_s);
    set_from_env("TITAN_LEASE_RENEW_S", &mut config.lease_renew_s);
    set_from_env("TITAN_EVENT_MAX_RETRIES", &mut config.event_max_retries);
    set_from_env(
        "TITAN_EVENT_CLAIM_TIMEOUT_MS",
        &mut config.event_claim_timeout_ms,
    );
    set_from_env(
        "TITAN_INLINE_PAYLOAD_THRESHOLD_BYTES",
        &mut config.inline_payload_threshold_bytes,
    );
    set_from_env(
        "TITAN_RECURSION_DEPTH_LIMIT",
        &mut config.recursion_depth_limit,
    );
    set_from_env("TITAN_WRITER_BATCH_SIZE", &mut config.writer_batch_size);
}

fn set_from_env<T: std::str::FromStr>(var: &str, slot: &mut T) {
    if let Ok(val) = std::env::var(var)
        && let Ok(parsed) = val.parse::<T>()
    {
        *slot = parsed;
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a loaded configuration, returning advisory warnings.
///
/// Hard errors (zero-valued caps, a renew interval that does not leave the
/// leader room to retry before its lease expires) come back as
/// [`ConfigError::ValidationError`]; missing connection strings and unusually
/// large timeouts are advisory [`ConfigWarning`]s.
pub fn validate_config(config: &TitanConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if config.event_log_partitions == 0 {
        errors.push("event_log_partitions must be at least 1".into());
    }
    if config.max_page_limit == 0 {
        errors.push("max_page_limit must be at least 1".into());
    }
    if config.recursion_depth_limit == 0 {
        errors.push("recursion_depth_limit must be at least 1".into());
    }
    if config.event_claim_timeout_ms == 0 {
        errors.push("event_claim_timeout_ms must be at least 1".into());
    }
    if config.lease_ttl_s == 0 {
        errors.push("lease_ttl_s must be at least 1".into());
    }
    if config.lease_renew_s == 0 {
        errors.push("lease_renew_s must be at least 1".into());
    }
    if config.lease_renew_s >= config.lease_ttl_s {
        errors.push(format!(
            "lease_renew_s ({}) must be smaller than lease_ttl_s ({}), or a live leader can never renew in time",
            config.lease_renew_s, config.lease_ttl_s
        ));
    }

    if config.store_url.is_none() {
        warnings.push(ConfigWarning::MissingConnection {
            field: "store_url".into(),
            hint: "the Store cannot be reached; reads and writes will fail at startup".into(),
        });
    }
    if config.cache_url.is_none() {
        warnings.push(ConfigWarning::MissingConnection {
            field: "cache_url".into(),
            hint: "requests will run cache-less against the Store (fail-open, just slower)"
                .into(),
        });
    }
    if config.event_log_url.is_none() {
        warnings.push(ConfigWarning::MissingConnection {
            field: "event_log_url".into(),
            hint: "writes will be rejected with EventLogUnavailable".into(),
        });
    }

    if config.cache_entity_ttl_s > LARGE_TIMEOUT_THRESHOLD_S {
        warnings.push(ConfigWarning::LargeTimeout {
            field: "cache_entity_ttl_s".into(),
            value: config.cache_entity_ttl_s,
        });
    }
    if config.cache_list_ttl_s > LARGE_TIMEOUT_THRESHOLD_S {
        warnings.push(ConfigWarning::LargeTimeout {
            field: "cache_list_ttl_s".into(),
            value: config.cache_list_ttl_s,
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_has_documented_defaults() {
        let cfg = TitanConfig::default();
        assert_eq!(cfg.cache_entity_ttl_s, 600);
        assert_eq!(cfg.cache_list_ttl_s, 60);
        assert_eq!(cfg.max_page_limit, 1_000);
        assert_eq!(cfg.recursion_depth_limit, 64);
        assert_eq!(cfg.event_max_retries, 5);
        assert_eq!(cfg.event_claim_timeout_ms, 30_000);
        assert_eq!(cfg.inline_payload_threshold_bytes, 64 * 1024);
        assert_eq!(cfg.lease_ttl_s, 30);
        assert_eq!(cfg.lease_renew_s, 10);
        assert_eq!(cfg.writer_batch_size, 64);
    }

    #[test]
    fn default_config_warns_on_missing_connections() {
        let cfg = TitanConfig::default();
        let warnings = validate_config(&cfg).expect("defaults are structurally valid");
        assert!(
            warnings
                .iter()
                .filter(|w| matches!(w, ConfigWarning::MissingConnection { .. }))
                .count()
                == 3
        );
    }

    #[test]
    fn parse_valid_toml_overrides_selected_fields() {
        let toml_str = r#"
            store_url = "postgres://localhost/titan"
            cache_entity_ttl_s = 120
        "#;
        let cfg = parse_toml(toml_str).unwrap();
        assert_eq!(cfg.store_url.as_deref(), Some("postgres://localhost/titan"));
        assert_eq!(cfg.cache_entity_ttl_s, 120);
        assert_eq!(cfg.cache_list_ttl_s, 60, "unspecified fields keep their default");
    }

    #[test]
    fn parse_invalid_toml_gives_parse_error() {
        let err = parse_toml("this is [not valid toml =").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn validation_rejects_zero_recursion_depth() {
        let cfg = TitanConfig {
            recursion_depth_limit: 0,
            ..TitanConfig::default()
        };
        let err = validate_config(&cfg).unwrap_err();
        match err {
            ConfigError::ValidationError { reasons } => {
                assert!(reasons.iter().any(|r| r.contains("recursion_depth_limit")));
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn validation_rejects_renew_not_smaller_than_ttl() {
        let cfg = TitanConfig {
            lease_ttl_s: 10,
            lease_renew_s: 10,
            ..TitanConfig::default()
        };
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn validation_warns_on_large_ttl() {
        let cfg = TitanConfig {
            cache_entity_ttl_s: 10_000,
            store_url: Some("x".into()),
            cache_url: Some("x".into()),
            event_log_url: Some("x".into()),
            ..TitanConfig::default()
        };
        let warnings = validate_config(&cfg).unwrap();
        assert!(
            warnings
                .iter()
                .any(|w| matches!(w, ConfigWarning::LargeTimeout { field, .. } if field == "cache_entity_ttl_s"))
        );
    }

    #[test]
    fn env_overrides_apply_on_top_of_file() {
        // SAFETY-equivalent: tests run single-threaded per process for env
        // vars would be ideal, but this only reads back what it set.
        unsafe {
            std::env::set_var("TITAN_MAX_PAGE_LIMIT", "50");
        }
        let mut cfg = TitanConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.max_page_limit, 50);
        unsafe {
            std::env::remove_var("TITAN_MAX_PAGE_LIMIT");
        }
    }

    #[test]
    fn writer_batch_size_env_override_applies() {
        unsafe {
            std::env::set_var("TITAN_WRITER_BATCH_SIZE", "128");
        }
        let mut cfg = TitanConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.writer_batch_size, 128);
        unsafe {
            std::env::remove_var("TITAN_WRITER_BATCH_SIZE");
        }
    }

    #[test]
    fn malformed_env_override_is_ignored() {
        unsafe {
            std::env::set_var("TITAN_MAX_PAGE_LIMIT", "not-a-number");
        }
        let mut cfg = TitanConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.max_page_limit, default_max_page_limit());
        unsafe {
            std::env::remove_var("TITAN_MAX_PAGE_LIMIT");
        }
    }

    #[test]
    fn load_config_from_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("titan.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "store_url = \"mem://\"\nmax_page_limit = 250").unwrap();
        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.store_url.as_deref(), Some("mem://"));
        assert_eq!(cfg.max_page_limit, 250);
    }

    #[test]
    fn load_missing_file_gives_file_not_found() {
        let err = load_config(Some(Path::new("/nonexistent/titan.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn load_none_returns_defaults() {
        let cfg = load_config(None).unwrap();
        assert_eq!(cfg, TitanConfig::default());
    }

    #[test]
    fn toml_roundtrip() {
        let cfg = TitanConfig {
            store_url: Some("mem://".into()),
            ..TitanConfig::default()
        };
        let serialized = toml::to_string(&cfg).unwrap();
        let deserialized: TitanConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(cfg, deserialized);
    }
}
