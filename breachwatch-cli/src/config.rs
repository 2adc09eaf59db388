//! CLI Configuration Module
//!
//! Loads [`BreachConfig`] and the log format from environment variables,
//! falling back to defaults for anything unset. A variable that is set but
//! unparsable is a configuration error.

use std::path::PathBuf;
use std::str::FromStr;

use breachwatch_core::{BreachConfig, BreachResult, ConfigError};

use crate::telemetry::LogFormat;

pub const ENV_CACHE_SIZE_MB: &str = "BREACHWATCH_CACHE_SIZE_MB";
pub const ENV_CACHE_ENTRY_BYTES: &str = "BREACHWATCH_CACHE_ENTRY_BYTES";
pub const ENV_BATCH_SIZE: &str = "BREACHWATCH_BATCH_SIZE";
pub const ENV_STORE_PATH: &str = "BREACHWATCH_STORE_PATH";
pub const ENV_STORE_MAP_SIZE_MB: &str = "BREACHWATCH_STORE_MAP_SIZE_MB";
pub const ENV_LOG_FORMAT: &str = "BREACHWATCH_LOG_FORMAT";

#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    pub breach: BreachConfig,
    pub log_format: LogFormat,
}

impl CliConfig {
    /// Create CliConfig from environment variables.
    ///
    /// Environment variables:
    /// - `BREACHWATCH_CACHE_SIZE_MB`: cache byte budget (default: 100)
    /// - `BREACHWATCH_CACHE_ENTRY_BYTES`: assumed bytes per entry (default: 1024)
    /// - `BREACHWATCH_BATCH_SIZE`: upserts per bulk request (default: 950)
    /// - `BREACHWATCH_STORE_PATH`: LMDB directory (default: ./data/breaches)
    /// - `BREACHWATCH_STORE_MAP_SIZE_MB`: LMDB map size (default: 10240)
    /// - `BREACHWATCH_LOG_FORMAT`: "plain" or "json" (default: plain)
    pub fn from_env() -> BreachResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> BreachResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = BreachConfig::default();

        let breach = BreachConfig {
            cache_size_mb: parse_var(&lookup, ENV_CACHE_SIZE_MB, defaults.cache_size_mb)?,
            cache_entry_bytes: parse_var(
                &lookup,
                ENV_CACHE_ENTRY_BYTES,
                defaults.cache_entry_bytes,
            )?,
            batch_size: parse_var(&lookup, ENV_BATCH_SIZE, defaults.batch_size)?,
            store_path: lookup(ENV_STORE_PATH)
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            store_map_size_mb: parse_var(
                &lookup,
                ENV_STORE_MAP_SIZE_MB,
                defaults.store_map_size_mb,
            )?,
        };

        let log_format = match lookup(ENV_LOG_FORMAT) {
            Some(raw) => raw.parse::<LogFormat>()?,
            None => LogFormat::default(),
        };

        Ok(Self { breach, log_format })
    }

    /// Apply command-line overrides, then validate.
    pub fn with_overrides(
        mut self,
        store_path: Option<PathBuf>,
        batch_size: Option<usize>,
    ) -> BreachResult<Self> {
        if let Some(path) = store_path {
            self.breach.store_path = path;
        }
        if let Some(size) = batch_size {
            self.breach.batch_size = size;
        }
        self.breach.validate()?;
        Ok(self)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            field: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use breachwatch_core::BreachError;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = CliConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.breach, BreachConfig::default());
        assert_eq!(config.log_format, LogFormat::Plain);
    }

    #[test]
    fn test_reads_every_variable() {
        let config = CliConfig::from_lookup(lookup_from(&[
            (ENV_CACHE_SIZE_MB, "8"),
            (ENV_CACHE_ENTRY_BYTES, "2048"),
            (ENV_BATCH_SIZE, " 500 "),
            (ENV_STORE_PATH, "/var/lib/breachwatch"),
            (ENV_STORE_MAP_SIZE_MB, "64"),
            (ENV_LOG_FORMAT, "json"),
        ]))
        .unwrap();

        assert_eq!(config.breach.cache_size_mb, 8);
        assert_eq!(config.breach.cache_capacity(), 4096);
        assert_eq!(config.breach.batch_size, 500);
        assert_eq!(config.breach.store_path, PathBuf::from("/var/lib/breachwatch"));
        assert_eq!(config.breach.store_map_size_mb, 64);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_unparsable_value_is_config_error() {
        let err = CliConfig::from_lookup(lookup_from(&[(ENV_BATCH_SIZE, "lots")])).unwrap_err();
        match err {
            BreachError::Config(ConfigError::InvalidValue { field, value, .. }) => {
                assert_eq!(field, ENV_BATCH_SIZE);
                assert_eq!(value, "lots");
            }
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    #[test]
    fn test_overrides_then_validate() {
        let config = CliConfig::from_lookup(|_| None)
            .unwrap()
            .with_overrides(Some(PathBuf::from("/tmp/bw")), Some(10))
            .unwrap();
        assert_eq!(config.breach.batch_size, 10);
        assert_eq!(config.breach.store_path, PathBuf::from("/tmp/bw"));

        let err = CliConfig::from_lookup(|_| None)
            .unwrap()
            .with_overrides(None, Some(0))
            .unwrap_err();
        assert!(matches!(err, BreachError::Config(_)));
    }
}
