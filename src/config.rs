use std::env;

use thiserror::Error;

use crate::deadline::EscalationMode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Upper bound for `SESSION_TTL_HOURS`: one year.
const MAX_SESSION_TTL_HOURS: i64 = 24 * 366;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub mongo_uri: Option<String>,
    pub database_name: String,
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    pub bind_address: String,
    pub frontend_origin: String,
    pub escalation: EscalationMode,
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let store_backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "mongo".to_string())
            .as_str()
        {
            "mongo" => StoreBackend::Mongo,
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    key: "STORE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let mongo_uri = env::var("MONGO_URI").ok();
        if store_backend == StoreBackend::Mongo && mongo_uri.is_none() {
            return Err(ConfigError::Missing("MONGO_URI"));
        }

        let escalation = match env::var("PRIORITY_ESCALATION") {
            Ok(raw) => EscalationMode::parse(&raw).ok_or(ConfigError::Invalid {
                key: "PRIORITY_ESCALATION",
                value: raw,
            })?,
            Err(_) => EscalationMode::default(),
        };

        Ok(Self {
            store_backend,
            mongo_uri,
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "deadline_tracker".to_string()),
            jwt_secret: env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?,
            session_ttl_hours: check_ttl_hours(parse_var("SESSION_TTL_HOURS", 24)?)?,
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            frontend_origin: env::var("FRONTEND_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            escalation,
            bcrypt_cost: parse_var("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

fn check_ttl_hours(hours: i64) -> Result<i64, ConfigError> {
    if (1..=MAX_SESSION_TTL_HOURS).contains(&hours) {
        Ok(hours)
    } else {
        Err(ConfigError::Invalid {
            key: "SESSION_TTL_HOURS",
            value: hours.to_string(),
        })
    }
}

#[cfg(test)]
impl Config {
    /// In-memory configuration with a cheap bcrypt cost.
    pub fn for_tests() -> Self {
        Self {
            store_backend: StoreBackend::Memory,
            mongo_uri: None,
            database_name: "deadline_tracker_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            session_ttl_hours: 1,
            bind_address: "127.0.0.1:0".to_string(),
            frontend_origin: "http://localhost:3000".to_string(),
            escalation: EscalationMode::Overwrite,
            bcrypt_cost: 4,
        }
    }
}
