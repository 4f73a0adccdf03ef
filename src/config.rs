use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub busy_timeout: Duration,
    pub token_secret: String,
    pub production: bool,
    pub cors_origin: Option<String>,
    pub client_url: String,
}

impl Config {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Config, ConfigError> {
        dotenv::dotenv().ok();
        Config::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token_secret = lookup("TOKEN_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("TOKEN_SECRET"))?;

        let port = parse_or(&lookup, "PORT", 8080u16)?;
        let busy_timeout_ms = parse_or(&lookup, "DB_BUSY_TIMEOUT_MS", 5000u64)?;

        Ok(Config {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            database_path: lookup("DATABASE_PATH").unwrap_or_else(|| "tuition.db".to_string()),
            busy_timeout: Duration::from_millis(busy_timeout_ms),
            token_secret,
            production: lookup("APP_ENV")
                .map(|v| v.eq_ignore_ascii_case("production"))
                .unwrap_or(false),
            cors_origin: lookup("CORS_ORIGIN").filter(|s| !s.is_empty()),
            client_url: lookup("CLIENT_URL")
                .unwrap_or_else(|| "http://localhost:5173".to_string()),
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn applies_defaults() {
        let config = config_from(&[("TOKEN_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_path, "tuition.db");
        assert_eq!(config.busy_timeout, Duration::from_millis(5000));
        assert!(!config.production);
        assert!(config.cors_origin.is_none());
    }

    #[test]
    fn requires_token_secret() {
        assert!(matches!(
            config_from(&[]),
            Err(ConfigError::Missing("TOKEN_SECRET"))
        ));
    }

    #[test]
    fn rejects_bad_port() {
        let err = config_from(&[("TOKEN_SECRET", "s"), ("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }

    #[test]
    fn reads_production_flag() {
        let config = config_from(&[("TOKEN_SECRET", "s"), ("APP_ENV", "Production")]).unwrap();
        assert!(config.production);
    }
}
