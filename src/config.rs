//! Configuration parsed from environment variables.

use thiserror::Error;

use crate::api::{auth::AuthUser, model::UserId};

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

pub const DEFAULT_APP_URL: &str = "http://localhost:3000";
pub const DEFAULT_CHAT_URL: &str = "https://chat.stream-io-api.com";
pub const DEFAULT_VIDEO_URL: &str = "https://video.stream-io-api.com";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Public key of the chat/video app.
    pub api_key: String,
    /// Identity handed over by the auth provider.
    pub user: AuthUser,
    pub app_url: String,
    pub chat_url: String,
    pub video_url: String,
    pub timeouts: Timeouts,
}

impl Config {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `HOSCORD_API_KEY`
    /// - `HOSCORD_USER_ID`
    ///
    /// Optional:
    /// - `HOSCORD_USER_EMAIL`
    /// - `HOSCORD_REGISTERED`: `true` or `false` (default)
    /// - `HOSCORD_APP_URL`, `HOSCORD_CHAT_URL`, `HOSCORD_VIDEO_URL`
    /// - `HOSCORD_REQUEST_TIMEOUT_SECS`: default 30
    /// - `HOSCORD_CONNECT_TIMEOUT_SECS`: default 10
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |var: &'static str| {
            lookup(var)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::Missing(var))
        };
        let url = |var: &str, default: &str| {
            lookup(var)
                .unwrap_or_else(|| default.to_string())
                .trim_end_matches('/')
                .to_string()
        };
        let secs = |var: &str, default: u64| {
            lookup(var)
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(default)
        };

        let api_key = required("HOSCORD_API_KEY")?;
        let user = AuthUser {
            id: UserId(required("HOSCORD_USER_ID")?),
            email: lookup("HOSCORD_USER_EMAIL").filter(|value| !value.is_empty()),
            registered: parse_bool("HOSCORD_REGISTERED", lookup("HOSCORD_REGISTERED"))?,
        };

        Ok(Self {
            api_key,
            user,
            app_url: url("HOSCORD_APP_URL", DEFAULT_APP_URL),
            chat_url: url("HOSCORD_CHAT_URL", DEFAULT_CHAT_URL),
            video_url: url("HOSCORD_VIDEO_URL", DEFAULT_VIDEO_URL),
            timeouts: Timeouts {
                request_secs: secs("HOSCORD_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
                connect_secs: secs("HOSCORD_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            },
        })
    }
}

fn parse_bool(var: &'static str, raw: Option<String>) -> Result<bool, ConfigError> {
    match raw.as_deref().unwrap_or("false") {
        "true" | "1" => Ok(true),
        "false" | "0" | "" => Ok(false),
        other => Err(ConfigError::Invalid {
            var,
            value: other.to_string(),
        }),
    }
}
