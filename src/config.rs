//! Application-level configuration resolved once from the environment.

use std::{env, path::PathBuf};

/// Default base URL for the collaborator REST endpoints.
const DEFAULT_API_URL: &str = "http://localhost:8000";
/// Default base URL for the realtime WebSocket endpoint.
const DEFAULT_WS_URL: &str = "ws://localhost:8000";
/// Default location on disk for the persisted player identity.
const DEFAULT_IDENTITY_PATH: &str = ".quiz-party/identity.json";

/// Environment variable that overrides [`DEFAULT_API_URL`].
const API_URL_ENV: &str = "QUIZ_PARTY_API_URL";
/// Environment variable that overrides [`DEFAULT_WS_URL`].
const WS_URL_ENV: &str = "QUIZ_PARTY_WS_URL";
/// Environment variable that overrides [`DEFAULT_IDENTITY_PATH`].
const IDENTITY_PATH_ENV: &str = "QUIZ_PARTY_IDENTITY_PATH";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the client.
pub struct AppConfig {
    api_base: String,
    ws_base: String,
    identity_path: PathBuf,
}

impl AppConfig {
    /// Build a configuration from explicit values.
    pub fn new(
        api_base: impl Into<String>,
        ws_base: impl Into<String>,
        identity_path: PathBuf,
    ) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            ws_base: ws_base.into().trim_end_matches('/').to_string(),
            identity_path,
        }
    }

    /// Build the configuration from environment variables, falling back to
    /// the localhost defaults the development server uses.
    pub fn from_env() -> Self {
        Self {
            api_base: env_or(API_URL_ENV, DEFAULT_API_URL),
            ws_base: env_or(WS_URL_ENV, DEFAULT_WS_URL),
            identity_path: env::var_os(IDENTITY_PATH_ENV)
                .map(PathBuf::from)
                .filter(|path| !path.as_os_str().is_empty())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_IDENTITY_PATH)),
        }
    }

    /// Base URL of the collaborator REST endpoints, without a trailing slash.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Location of the persisted player identity file.
    pub fn identity_path(&self) -> &PathBuf {
        &self.identity_path
    }

    /// Address of a party's realtime channel. The party id selects the
    /// channel; the local user id rides along as a query parameter when the
    /// client is authenticated.
    pub fn ws_party_url(&self, party_id: &str, user_id: Option<&str>) -> String {
        match user_id {
            Some(user_id) => format!("{}/ws/{party_id}?user_id={user_id}", self.ws_base),
            None => format!("{}/ws/{party_id}", self.ws_base),
        }
    }
}

/// Read an environment variable, trimming any trailing slash, with a default.
fn env_or(var: &str, default: &str) -> String {
    env::var(var)
        .ok()
        .filter(|value| !value.is_empty())
        .map(|value| value.trim_end_matches('/').to_string())
        .unwrap_or_else(|| default.to_string())
}
