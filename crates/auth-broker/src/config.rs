//! Broker configuration, loadable from JSON or YAML with humantime TTLs.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bounded retry applied to backend tuple writes and deletes. Check-path
/// backend calls are never retried; those fail closed immediately.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 50,
        }
    }
}

/// Resolved broker configuration.
#[derive(Clone, Debug)]
pub struct BrokerConfig {
    /// TTL applied to delegations created without an explicit one.
    pub default_ttl: Duration,
    /// Lifetime of a cached `Allow`.
    pub allow_cache_ttl: Duration,
    /// Lifetime of a cached `Deny`; must be strictly shorter than the
    /// allow TTL so transient denials recover quickly.
    pub deny_cache_ttl: Duration,
    /// Cadence of the background expiry sweep.
    pub sweep_interval: Duration,
    pub write_retry: RetryPolicy,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(30 * 60),
            allow_cache_ttl: Duration::from_secs(60),
            deny_cache_ttl: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(60),
            write_retry: RetryPolicy::default(),
        }
    }
}

/// Errors surfaced while loading broker configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to deserialize config: {0}")]
    Deserialize(String),
    #[error("invalid duration for {field}: {value}")]
    InvalidDuration { field: &'static str, value: String },
    #[error("deny cache ttl ({deny:?}) must be shorter than allow cache ttl ({allow:?})")]
    CacheTtlOrder { allow: Duration, deny: Duration },
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    default_ttl: Option<String>,
    allow_cache_ttl: Option<String>,
    deny_cache_ttl: Option<String>,
    sweep_interval: Option<String>,
    write_retry: Option<RetryPolicy>,
}

pub fn load_config_from_reader<R: Read>(mut reader: R) -> Result<BrokerConfig, ConfigError> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;
    parse_config_str(&buf)
}

pub fn load_config_from_path(path: impl AsRef<Path>) -> Result<BrokerConfig, ConfigError> {
    let file = File::open(path.as_ref())?;
    load_config_from_reader(file)
}

pub fn parse_config_str(raw: &str) -> Result<BrokerConfig, ConfigError> {
    let file: ConfigFile = match serde_json::from_str(raw) {
        Ok(file) => file,
        Err(json_err) => serde_yaml::from_str(raw).map_err(|yaml_err| {
            ConfigError::Deserialize(format!(
                "json error: {}; yaml error: {}",
                json_err, yaml_err
            ))
        })?,
    };

    let defaults = BrokerConfig::default();
    let config = BrokerConfig {
        default_ttl: parse_ttl("default_ttl", file.default_ttl, defaults.default_ttl)?,
        allow_cache_ttl: parse_ttl(
            "allow_cache_ttl",
            file.allow_cache_ttl,
            defaults.allow_cache_ttl,
        )?,
        deny_cache_ttl: parse_ttl(
            "deny_cache_ttl",
            file.deny_cache_ttl,
            defaults.deny_cache_ttl,
        )?,
        sweep_interval: parse_ttl("sweep_interval", file.sweep_interval, defaults.sweep_interval)?,
        write_retry: file.write_retry.unwrap_or_default(),
    };
    validate(config)
}

fn validate(config: BrokerConfig) -> Result<BrokerConfig, ConfigError> {
    if config.deny_cache_ttl >= config.allow_cache_ttl {
        return Err(ConfigError::CacheTtlOrder {
            allow: config.allow_cache_ttl,
            deny: config.deny_cache_ttl,
        });
    }
    Ok(config)
}

fn parse_ttl(
    field: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(value) = raw else {
        return Ok(default);
    };
    humantime::parse_duration(&value).map_err(|_| ConfigError::InvalidDuration { field, value })
}
