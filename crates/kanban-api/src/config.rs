//! Server configuration read from the environment.

use std::time::Duration;

use kanban_board::application::command_handlers::MutatorConfig;
use kanban_fanout::hub::DEFAULT_CHANNEL_CAPACITY;

use crate::error::AppError;

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// PostgreSQL URL; the in-memory store is used when absent.
    pub database_url: Option<String>,
    /// Mutator tunables.
    pub mutator: MutatorConfig,
    /// Buffered messages per subscriber channel.
    pub channel_capacity: usize,
}

impl ServerConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is present but malformed.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is present but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = MutatorConfig::default();
        let storage_timeout = parsed(&lookup, "STORAGE_TIMEOUT_MS")?
            .map_or(defaults.storage_timeout, Duration::from_millis);
        let max_attempts = parsed(&lookup, "MAX_COMMIT_ATTEMPTS")?.unwrap_or(defaults.max_attempts);
        if max_attempts == 0 {
            return Err(AppError::Config(
                "MAX_COMMIT_ATTEMPTS must be at least 1".into(),
            ));
        }

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed(&lookup, "PORT")?.unwrap_or(3000),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            mutator: MutatorConfig {
                default_wip_limit: parsed(&lookup, "DEFAULT_WIP_LIMIT")?
                    .unwrap_or(defaults.default_wip_limit),
                max_attempts,
                storage_timeout,
            },
            channel_capacity: parsed(&lookup, "CHANNEL_CAPACITY")?
                .unwrap_or(DEFAULT_CHANNEL_CAPACITY),
        })
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| AppError::Config(format!("{key} is invalid: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<ServerConfig, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
        assert_eq!(config.mutator.default_wip_limit, 5);
        assert_eq!(config.mutator.max_attempts, 5);
        assert_eq!(config.mutator.storage_timeout, Duration::from_secs(5));
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    }

    #[test]
    fn test_values_are_read_from_environment() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/kanban"),
            ("DEFAULT_WIP_LIMIT", "0"),
            ("STORAGE_TIMEOUT_MS", "250"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/kanban")
        );
        assert_eq!(config.mutator.default_wip_limit, 0);
        assert_eq!(config.mutator.storage_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_malformed_values_fail_startup() {
        assert!(matches!(
            config_from(&[("PORT", "eighty")]),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            config_from(&[("DEFAULT_WIP_LIMIT", "-1")]),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            config_from(&[("MAX_COMMIT_ATTEMPTS", "0")]),
            Err(AppError::Config(_))
        ));
    }
}
