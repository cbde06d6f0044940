//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: '{value}'")]
    Env { key: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: optional TOML file, then environment overrides, then validation.
pub fn load_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ProxyConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay `PROXY_*` variables on top of `config`.
///
/// `lookup` abstracts the environment so overrides can be tested without
/// mutating process state.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("PROXY_BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Some(v) = lookup("PROXY_UPSTREAM_BASE_URL") {
        config.upstream.base_url = v;
    }
    if let Some(v) = lookup("PROXY_ALLOWED_ORIGINS") {
        config.cors.allowed_origins = v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(v) = lookup("PROXY_LOG_LEVEL") {
        config.observability.log_level = v;
    }

    parse_into(&lookup, "PROXY_UPSTREAM_TIMEOUT_SECS", &mut config.upstream.timeout_secs)?;
    parse_into(&lookup, "PROXY_UPSTREAM_ATTEMPTS", &mut config.upstream.attempts)?;
    parse_into(&lookup, "PROXY_MAX_CONCURRENT", &mut config.scheduler.max_concurrent)?;
    parse_into(&lookup, "PROXY_SPACING_MS", &mut config.scheduler.spacing_ms)?;
    parse_into(&lookup, "PROXY_MAX_QUEUE", &mut config.scheduler.max_queue)?;
    parse_into(&lookup, "PROXY_CACHE_MAX_ENTRIES", &mut config.cache.max_entries)?;
    parse_into(&lookup, "PROXY_TTL_STATIC_SECS", &mut config.cache.ttl_static_secs)?;
    parse_into(&lookup, "PROXY_TTL_HISTORICAL_SECS", &mut config.cache.ttl_historical_secs)?;
    parse_into(&lookup, "PROXY_TTL_LIVE_SECS", &mut config.cache.ttl_live_secs)?;
    parse_into(&lookup, "PROXY_TTL_DEFAULT_SECS", &mut config.cache.ttl_default_secs)?;
    parse_into(&lookup, "PROXY_STALE_HORIZON_SECS", &mut config.cache.stale_horizon_secs)?;
    parse_into(&lookup, "PROXY_RATE_LIMIT_ENABLED", &mut config.rate_limit.enabled)?;
    parse_into(&lookup, "PROXY_RATE_LIMIT_PER_MINUTE", &mut config.rate_limit.requests_per_minute)?;
    parse_into(&lookup, "PROXY_METRICS_ENABLED", &mut config.observability.metrics_enabled)?;

    Ok(())
}

fn parse_into<F, T>(lookup: &F, key: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(value) = lookup(key) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Env { key, value })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ProxyConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("PROXY_MAX_CONCURRENT", "8"),
                ("PROXY_SPACING_MS", "0"),
                ("PROXY_ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
                ("PROXY_RATE_LIMIT_ENABLED", "false"),
            ]),
        )
        .unwrap();

        assert_eq!(config.scheduler.max_concurrent, 8);
        assert_eq!(config.scheduler.spacing_ms, 0);
        assert_eq!(
            config.cors.allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert!(!config.rate_limit.enabled);
    }

    #[test]
    fn test_unparsable_env_value() {
        let mut config = ProxyConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("PROXY_MAX_QUEUE", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { key: "PROXY_MAX_QUEUE", .. }));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("stats-proxy-{}.toml", std::process::id()));
        std::fs::write(&path, "[scheduler]\nmax_concurrent = 2\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.scheduler.max_concurrent, 2);

        std::fs::remove_file(&path).unwrap_or_default();
    }
}
