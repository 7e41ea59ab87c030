use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost:5432/urlshortener";
const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 20;
const DEFAULT_DATABASE_TIMEOUT_MS: u64 = 1000;
const DEFAULT_PUBLIC_DIR: &str = "public";

#[derive(Debug, Error)]
#[error("Environment variable {name} has invalid value '{value}': {reason}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Data is lost on restart.
    Memory,
}

/// Settings read once at startup from the process environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_address: String,
    pub store_backend: StoreBackend,
    pub database_max_connections: u32,
    pub database_timeout_ms: u64,
    pub require_resolvable_host: bool,
    pub scheme_case_sensitive: bool,
    /// Hex encoded SHA3-256 of the key guarding `/api/all`.
    pub encrypted_api_key: Option<String>,
    pub public_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let host = get("SERVER_HOST").unwrap_or_else(|| DEFAULT_SERVER_HOST.into());
        let port = match get("PORT") {
            Some(value) => parse_number::<u16>("PORT", &value)?,
            None => DEFAULT_PORT,
        };
        let store_backend = match get("STORE_BACKEND") {
            Some(value) => parse_backend(&value)?,
            None => StoreBackend::Postgres,
        };

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            server_address: format!("{host}:{port}"),
            store_backend,
            database_max_connections: get("DATABASE_MAX_CONNECTIONS")
                .map(|value| parse_number("DATABASE_MAX_CONNECTIONS", &value))
                .transpose()?
                .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
            database_timeout_ms: get("DATABASE_TIMEOUT_MS")
                .map(|value| parse_number("DATABASE_TIMEOUT_MS", &value))
                .transpose()?
                .unwrap_or(DEFAULT_DATABASE_TIMEOUT_MS),
            require_resolvable_host: get("REQUIRE_RESOLVABLE_HOST")
                .map(|value| parse_bool("REQUIRE_RESOLVABLE_HOST", &value))
                .transpose()?
                .unwrap_or(false),
            scheme_case_sensitive: get("SCHEME_CASE_SENSITIVE")
                .map(|value| parse_bool("SCHEME_CASE_SENSITIVE", &value))
                .transpose()?
                .unwrap_or(false),
            encrypted_api_key: get("ENCRYPTED_API_KEY").map(|value| value.trim().to_ascii_lowercase()),
            public_dir: get("PUBLIC_DIR")
                .unwrap_or_else(|| DEFAULT_PUBLIC_DIR.into())
                .into(),
        })
    }
}

fn parse_number<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse().map_err(|err: T::Err| ConfigError {
        name,
        value: value.into(),
        reason: err.to_string(),
    })
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError {
            name,
            value: value.into(),
            reason: "expected true or false".into(),
        }),
    }
}

fn parse_backend(value: &str) -> Result<StoreBackend, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
        "memory" => Ok(StoreBackend::Memory),
        _ => Err(ConfigError {
            name: "STORE_BACKEND",
            value: value.into(),
            reason: "expected postgres or memory".into(),
        }),
    }
}
