use core::fmt;
use std::path::PathBuf;

use thiserror::Error;

/**
    Structured failure reported to the playback engine when no session
    could be produced.

    Every code maps onto an entry of the player's tune-error table: a
    numeric error class (see [`FailureCode::code`]) and a fixed description.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCode {
    // ── Parse ─────────────────────────────────────────────────────────
    KeyIdExtractionFailed,

    // ── Platform session ──────────────────────────────────────────────
    DrmInitFailed,
    DataBindFailed,
    ChallengeFailed,
    KeyUpdateFailed,
    InvalidDrmKey,

    // ── Network ───────────────────────────────────────────────────────
    AccessTokenFailed,
    LicenceTimeout,
    LicenceRequestFailed,
    AuthorisationFailure,
    DeviceNotProvisioned,

    // ── Policy ────────────────────────────────────────────────────────
    UnsupportedStreamType,
    SessionManagerInactive,
}

impl FailureCode {
    /**
        Numeric tune-error class.

        `SessionManagerInactive` is a teardown condition rather than a tune
        error and reports 0.
    */
    pub const fn code(self) -> u16 {
        match self {
            Self::AuthorisationFailure => 40,
            Self::DeviceNotProvisioned => 52,
            Self::SessionManagerInactive => 0,
            _ => 50,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::KeyIdExtractionFailed => "Failed to parse key id from PSSH",
            Self::DrmInitFailed => "DRM Initialization Failed",
            Self::DataBindFailed => "InitData-DRM Binding Failed",
            Self::ChallengeFailed => "DRM License Challenge Generation Failed",
            Self::KeyUpdateFailed => "Failed to process DRM key",
            Self::InvalidDrmKey => "Invalid Key Error, from DRM",
            Self::AccessTokenFailed => "Failed to get access token from Auth Service",
            Self::LicenceTimeout => "DRM License Request Timed out",
            Self::LicenceRequestFailed => "DRM License Request Failed",
            Self::AuthorisationFailure => "Authorization failure",
            Self::DeviceNotProvisioned => "Device not provisioned",
            Self::UnsupportedStreamType => "Unsupported Stream Type",
            Self::SessionManagerInactive => "DRM session manager is inactive",
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}

impl std::error::Error for FailureCode {}

/**
    Errors from the HTTP transport underneath license and token requests.
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    /// Raised by platform transports that sit on the device's secure
    /// channel. [`ReqwestTransport`](crate::ReqwestTransport) never reports it.
    #[error("device not provisioned: {0}")]
    NotProvisioned(String),

    #[error("transport error: {0}")]
    Other(String),
}

/**
    Errors from a license exchange.
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LicenseError {
    #[error("license server returned HTTP {status}")]
    Http { status: u16 },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("license server returned an empty license")]
    EmptyResponse,

    #[error("invalid license payload: {0}")]
    InvalidLicense(String),

    #[error("no license server URL")]
    MissingUrl,
}

impl LicenseError {
    /**
        HTTP status of the final attempt, if the server answered at all.
    */
    pub const fn http_status(&self) -> Option<u16> {
        match self {
            Self::Http { status } => Some(*status),
            _ => None,
        }
    }

    /**
        Failure code for this outcome.

        A 412 is an authorisation failure unless the access token could not
        be fetched beforehand, in which case the missing token is reported.
    */
    pub const fn failure_code(&self, token_failed: bool) -> FailureCode {
        match self {
            Self::Http { status: 412 } if token_failed => FailureCode::AccessTokenFailed,
            Self::Http { status: 412 } => FailureCode::AuthorisationFailure,
            Self::Transport(TransportError::Timeout(_)) => FailureCode::LicenceTimeout,
            Self::Transport(TransportError::NotProvisioned(_)) => FailureCode::DeviceNotProvisioned,
            _ => FailureCode::LicenceRequestFailed,
        }
    }
}

/**
    Errors from fetching the access token.
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("auth service returned HTTP {status}")]
    Http { status: u16 },

    #[error("missing or invalid status in token reply: {0:?}")]
    InvalidStatus(String),

    #[error("no token in token reply")]
    MissingToken,
}

/**
    Errors from loading or validating a [`SessionConfig`](crate::SessionConfig).
*/
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}
