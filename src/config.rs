use std::{env, fmt::Display, str::FromStr};

use derive_more::{Display, Error};
use log::info;

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[display(fmt = "environment variable '{}' must be set", key)]
    Missing { key: &'static str },

    #[display(fmt = "invalid value '{}' for '{}': {}", value, key, reason)]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub access_token_ttl_secs: u64,
    pub reset_token_ttl_secs: u64,
    pub anon_cookie_name: String,
    pub splash_password_hash: Option<String>,
}

impl Config {
    /// Reads `.env` and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            database_url: required(&lookup, "DATABASE_URL")?,
            jwt_secret: required(&lookup, "JWT_SECRET")?,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: try_load(&lookup, "PORT", 8080)?,
            db_max_connections: try_load(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            access_token_ttl_secs: try_load(&lookup, "ACCESS_TOKEN_TTL_SECS", 60 * 60)?,
            reset_token_ttl_secs: try_load(&lookup, "RESET_TOKEN_TTL_SECS", 15 * 60)?,
            anon_cookie_name: lookup("ANON_COOKIE_NAME").unwrap_or_else(|| "anon_id".to_string()),
            splash_password_hash: lookup("SPLASH_PASSWORD_HASH").filter(|v| !v.trim().is_empty()),
        })
    }
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing { key })
}

fn try_load<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => {
            info!("{} not set, using default: {}", key, default);
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_fill_optional_values() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/yup"),
            ("JWT_SECRET", "secret"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.access_token_ttl_secs, 3600);
        assert_eq!(config.anon_cookie_name, "anon_id");
        assert!(config.splash_password_hash.is_none());
    }

    #[test]
    fn missing_secret_is_reported() {
        let err = Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://localhost/yup")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing { key: "JWT_SECRET" });
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/yup"),
            ("JWT_SECRET", "secret"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }
}
