use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::fetch::{FetchConfig, DEFAULT_SOURCE_URL};

const DEFAULT_DB_PATH: &str = "instance/nike_sites.db";
const DEFAULT_KV_PREFIX: &str = "nike_site";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown deployment mode {0:?} (expected ephemeral, local or hosted-kv)")]
    UnknownMode(String),
    #[error("{0} must be set for the hosted-kv deployment mode")]
    MissingCredential(&'static str),
    #[error("{key} is not a valid number: {value:?}")]
    InvalidNumber { key: &'static str, value: String },
}

/// Which storage backend serves the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    /// Process-lifetime, in-memory.
    Ephemeral,
    /// SQLite file on local disk.
    Local,
    /// Remote key-value store over REST.
    HostedKv,
}

impl FromStr for DeploymentMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ephemeral" | "memory" => Ok(Self::Ephemeral),
            "local" | "sqlite" => Ok(Self::Local),
            "hosted-kv" | "kv" => Ok(Self::HostedKv),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

/// Remote KV connection settings. Either field may be missing until the
/// store is actually constructed.
#[derive(Debug, Clone, Default)]
pub struct KvSettings {
    pub url: Option<String>,
    pub token: Option<String>,
    pub prefix: String,
}

impl KvSettings {
    /// Both credentials, or the name of the first missing variable.
    pub fn credentials(&self) -> Result<(&str, &str), ConfigError> {
        let url = self
            .url
            .as_deref()
            .ok_or(ConfigError::MissingCredential("KV_REST_API_URL"))?;
        let token = self
            .token
            .as_deref()
            .ok_or(ConfigError::MissingCredential("KV_REST_API_TOKEN"))?;
        Ok((url, token))
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: DeploymentMode,
    pub db_path: PathBuf,
    pub kv: KvSettings,
    pub fetch: FetchConfig,
}

impl Settings {
    /// Read settings from the process environment (after loading `.env`, if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mode = match get("DEPLOYMENT_MODE") {
            Some(m) => m.parse()?,
            // Serverless hosts have a read-only filesystem.
            None if get("VERCEL_ENV").is_some() => DeploymentMode::Ephemeral,
            None => DeploymentMode::Local,
        };

        let mut fetch = FetchConfig {
            url: get("SOURCE_URL").unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            ..FetchConfig::default()
        };
        if let Some(v) = get("FETCH_TIMEOUT_SECS") {
            fetch.timeout = Duration::from_secs(parse_number("FETCH_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = get("FETCH_MAX_RETRIES") {
            fetch.max_retries = parse_number("FETCH_MAX_RETRIES", &v)?;
        }

        Ok(Self {
            mode,
            db_path: get("SITES_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            kv: KvSettings {
                url: get("KV_REST_API_URL"),
                token: get("KV_REST_API_TOKEN"),
                prefix: get("KV_KEY_PREFIX").unwrap_or_else(|| DEFAULT_KV_PREFIX.to_string()),
            },
            fetch,
        })
    }
}

fn parse_number<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        key,
        value: value.to_string(),
    })
}
