use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Runtime configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Base URL of the decision backend (without the `/ai/...` path)
    pub ai_url: String,
    pub db_path: PathBuf,
    /// Per-attempt timeout for backend calls
    pub ai_timeout: Duration,
    pub ai_connect_timeout: Duration,
    /// Whole-request timeout for inbound HTTP requests
    pub server_timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a valid {expected}, got: '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("AI_URL is not a valid http(s) URL: '{0}'")]
    InvalidUrl(String),
    #[error(
        "SERVER_TIMEOUT_SECS ({server_timeout:?}) must exceed the worst-case backend time \
         ({worst_case:?}: every retry attempt at AI_TIMEOUT_MS plus backoff)"
    )]
    TimeoutBudget {
        worst_case: Duration,
        server_timeout: Duration,
    },
}

const DEFAULT_PORT: u16 = 52123;
const DEFAULT_AI_URL: &str = "http://127.0.0.1:8788";
const DEFAULT_DB_PATH: &str = "./data/luma.db";
const DEFAULT_AI_TIMEOUT_MS: u64 = 8_000;
const DEFAULT_AI_CONNECT_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_SERVER_TIMEOUT_SECS: u64 = 30;

impl Config {
    /// Load configuration from environment variables.
    ///
    /// - `CORE_PORT` (default: 52123)
    /// - `AI_URL` (default: `http://127.0.0.1:8788`)
    /// - `DB_PATH` (default: `./data/luma.db`)
    /// - `AI_TIMEOUT_MS` (default: 8000)
    /// - `AI_CONNECT_TIMEOUT_MS` (default: 3000)
    /// - `SERVER_TIMEOUT_SECS` (default: 30)
    ///
    /// The server timeout has to outlast a fully retried backend call, so a
    /// failing backend still produces a 502 rather than a timeout.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] but reads values through `lookup`.
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let port = parse_or(get("CORE_PORT"), "CORE_PORT", "port number", DEFAULT_PORT)?;

        let ai_url = get("AI_URL").unwrap_or_else(|| DEFAULT_AI_URL.to_string());
        match url::Url::parse(&ai_url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => return Err(ConfigError::InvalidUrl(ai_url)),
        }
        let ai_url = ai_url.trim_end_matches('/').to_string();

        let db_path = PathBuf::from(get("DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()));

        let ai_timeout_ms = parse_or(
            get("AI_TIMEOUT_MS"),
            "AI_TIMEOUT_MS",
            "integer (milliseconds)",
            DEFAULT_AI_TIMEOUT_MS,
        )?;
        let ai_connect_timeout_ms = parse_or(
            get("AI_CONNECT_TIMEOUT_MS"),
            "AI_CONNECT_TIMEOUT_MS",
            "integer (milliseconds)",
            DEFAULT_AI_CONNECT_TIMEOUT_MS,
        )?;
        let server_timeout_secs = parse_or(
            get("SERVER_TIMEOUT_SECS"),
            "SERVER_TIMEOUT_SECS",
            "integer (seconds)",
            DEFAULT_SERVER_TIMEOUT_SECS,
        )?;

        let ai_timeout = Duration::from_millis(ai_timeout_ms);
        let server_timeout = Duration::from_secs(server_timeout_secs);
        let worst_case = RetryPolicy::default().worst_case(ai_timeout);
        if worst_case >= server_timeout {
            return Err(ConfigError::TimeoutBudget {
                worst_case,
                server_timeout,
            });
        }

        Ok(Self {
            port,
            ai_url,
            db_path,
            ai_timeout,
            ai_connect_timeout: Duration::from_millis(ai_connect_timeout_ms),
            server_timeout,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    var: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            var,
            expected,
            value: raw,
        }),
        None => Ok(default),
    }
}
