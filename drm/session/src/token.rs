use core::fmt;

use parking_lot::Mutex;
use tracing::{info, warn};

use drm_core::utils::between;

use crate::error::TokenError;
use crate::transport::HttpTransport;

const STATUS_FIELD: &[u8] = b"status\":";
const TOKEN_FIELD: &[u8] = b"token\":\"";

/**
    Bearer token attached to vendor-scheme license requests.

    `Debug` never prints the token.
*/
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken({} bytes)", self.0.len())
    }
}

/**
    Lazily fetched, process-wide access token.

    The lock is held across the fetch, so concurrent first callers wait for
    a single request instead of issuing their own. A fetched token is kept
    until [`clear`](Self::clear); failures are not cached.
*/
pub struct AccessTokenCache {
    url: String,
    token: Mutex<Option<AccessToken>>,
}

impl AccessTokenCache {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /**
        The cached token, fetching it from the auth service first if needed.
    */
    pub fn get_or_fetch(&self, transport: &dyn HttpTransport) -> Result<AccessToken, TokenError> {
        let mut cached = self.token.lock();
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let token = fetch(transport, &self.url).inspect_err(|e| {
            warn!(url = %self.url, error = %e, "failed to get session token");
        })?;
        info!(url = %self.url, "received session token from auth service");
        *cached = Some(token.clone());
        Ok(token)
    }

    pub fn is_cached(&self) -> bool {
        self.token.lock().is_some()
    }

    pub fn clear(&self) {
        self.token.lock().take();
    }
}

fn fetch(transport: &dyn HttpTransport, url: &str) -> Result<AccessToken, TokenError> {
    let response = transport.get(url)?;
    if response.status != 200 && response.status != 206 {
        return Err(TokenError::Http {
            status: response.status,
        });
    }
    parse_token_reply(&response.body)
}

/**
    Extract the token from an auth-service reply.

    The reply is read by substring search rather than as JSON so that
    truncated or loosely formatted payloads still yield a token:
    `status` is taken up to the next `,"` (or `}` when it is the last field)
    and must be `0`; `token` is the quoted string that follows.
*/
pub fn parse_token_reply(body: &[u8]) -> Result<AccessToken, TokenError> {
    let status = between(body, STATUS_FIELD, b",\"")
        .or_else(|| between(body, STATUS_FIELD, b"}"))
        .map(|status| String::from_utf8_lossy(status).trim().to_owned())
        .unwrap_or_default();
    if status != "0" {
        return Err(TokenError::InvalidStatus(status));
    }

    let token = between(body, TOKEN_FIELD, b"\"")
        .filter(|token| !token.is_empty())
        .ok_or(TokenError::MissingToken)?;
    Ok(AccessToken::new(String::from_utf8_lossy(token)))
}
