use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use drm_core::ProtectionSystemId;

use crate::error::ConfigError;

/**
    Loopback endpoint of the local auth service that hands out session tokens.
*/
pub const DEFAULT_ACCESS_TOKEN_URL: &str = "http://localhost:50050/authService/getSessionToken";

pub const DEFAULT_LICENSE_RETRY_WAIT_MS: u64 = 500;
pub const DEFAULT_MAX_LICENSE_ATTEMPTS: u32 = 2;
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/**
    Session manager settings.

    Every field has a default, so a JSON file only needs the keys it
    overrides:

    ```json
    { "playready_license_url": "https://license.example.com/pr", "license_retry_wait_ms": 200 }
    ```
*/
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /**
        License server used for every DRM system without its own override.
    */
    pub license_server_url: Option<String>,
    pub playready_license_url: Option<String>,
    pub widevine_license_url: Option<String>,
    pub clearkey_license_url: Option<String>,
    /**
        Sleep between attempts after a 5xx response.
    */
    pub license_retry_wait_ms: u64,
    /**
        Total license request attempts, including the first.
    */
    pub max_license_attempts: u32,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub access_token_url: String,
    /**
        Never fetch or attach an access token.
    */
    pub anonymous_license_request: bool,
    pub user_agent: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            license_server_url: None,
            playready_license_url: None,
            widevine_license_url: None,
            clearkey_license_url: None,
            license_retry_wait_ms: DEFAULT_LICENSE_RETRY_WAIT_MS,
            max_license_attempts: DEFAULT_MAX_LICENSE_ATTEMPTS,
            connect_timeout_ms: DEFAULT_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_TIMEOUT_MS,
            access_token_url: DEFAULT_ACCESS_TOKEN_URL.to_owned(),
            anonymous_license_request: false,
            user_agent: concat!("drm-session/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl SessionConfig {
    /**
        Load and validate a config from a JSON file.
    */
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /**
        Parse and validate a config from JSON text.
    */
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_license_attempts == 0 {
            return Err(invalid("max_license_attempts", "must be at least 1"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(invalid("connect_timeout_ms", "must be non-zero"));
        }
        if self.request_timeout_ms == 0 {
            return Err(invalid("request_timeout_ms", "must be non-zero"));
        }
        if self.access_token_url.trim().is_empty() {
            return Err(invalid("access_token_url", "must not be empty"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        let overrides = [
            ("license_server_url", &self.license_server_url),
            ("playready_license_url", &self.playready_license_url),
            ("widevine_license_url", &self.widevine_license_url),
            ("clearkey_license_url", &self.clearkey_license_url),
        ];
        for (field, url) in overrides {
            if url.as_deref().is_some_and(|url| url.trim().is_empty()) {
                return Err(invalid(field, "must not be empty when set"));
            }
        }

        Ok(())
    }

    /**
        Configured license server for `system`: the per-system URL if set,
        otherwise the generic one.
    */
    pub fn license_url_override(&self, system: ProtectionSystemId) -> Option<&str> {
        let specific = match system {
            ProtectionSystemId::PlayReady => &self.playready_license_url,
            ProtectionSystemId::Widevine => &self.widevine_license_url,
            ProtectionSystemId::ClearKey => &self.clearkey_license_url,
        };
        specific
            .as_deref()
            .or(self.license_server_url.as_deref())
    }

    pub fn retry_wait(&self) -> Duration {
        Duration::from_millis(self.license_retry_wait_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_owned(),
    }
}
