//! Client configuration parsed from environment variables.

use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "https://college-admission-five.vercel.app";
pub const API_URL_VAR: &str = "COLLEGEHUB_API_URL";
pub const SESSION_FILE_VAR: &str = "COLLEGEHUB_SESSION_FILE";

const SESSION_DIR: &str = "collegehub";
const SESSION_FILE: &str = "session.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must not be empty")]
    Empty { var: &'static str },

    #[error("{var} must be an http(s) URL, got '{value}'")]
    InvalidUrl { var: &'static str, value: String },

    #[error("no data directory available; set {SESSION_FILE_VAR}")]
    NoDataDir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend origin, without a trailing slash.
    pub api_url: String,
    /// Where the session document is persisted.
    pub session_file: PathBuf,
}

impl ClientConfig {
    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `COLLEGEHUB_API_URL`: backend origin (default: the hosted backend)
    /// - `COLLEGEHUB_SESSION_FILE`: session document path (default:
    ///   `<data dir>/collegehub/session.json`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_or(None, None)
    }

    /// Like [`Self::from_env`], but explicit values (e.g. CLI flags) win over
    /// the environment.
    pub fn from_env_or(api_url: Option<String>, session_file: Option<String>) -> Result<Self, ConfigError> {
        let api_url = api_url.or_else(|| std::env::var(API_URL_VAR).ok());
        let session_file = session_file.or_else(|| std::env::var(SESSION_FILE_VAR).ok());
        Self::resolve(api_url.as_deref(), session_file.as_deref())
    }

    /// Build config from explicit values, falling back to defaults for `None`.
    pub fn resolve(api_url: Option<&str>, session_file: Option<&str>) -> Result<Self, ConfigError> {
        let api_url = parse_api_url(api_url.unwrap_or(DEFAULT_API_URL))?;
        let session_file = match session_file {
            Some(raw) if raw.trim().is_empty() => return Err(ConfigError::Empty { var: SESSION_FILE_VAR }),
            Some(raw) => PathBuf::from(raw),
            None => default_session_file()?,
        };
        Ok(Self { api_url, session_file })
    }
}

fn parse_api_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::Empty { var: API_URL_VAR });
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidUrl { var: API_URL_VAR, value: raw.to_owned() });
    }
    Ok(trimmed.to_owned())
}

fn default_session_file() -> Result<PathBuf, ConfigError> {
    dirs::data_dir()
        .map(|dir| dir.join(SESSION_DIR).join(SESSION_FILE))
        .ok_or(ConfigError::NoDataDir)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
