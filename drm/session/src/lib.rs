#![allow(clippy::doc_overindented_list_items)]

mod clock;
mod config;
mod error;
mod license;
mod manager;
mod platform;
mod profiler;
mod slot;
mod token;
mod transport;

#[cfg(test)]
mod testing;

// Re-export shared DRM types from drm-core
pub use drm_core::{KeyId, ProtectionSystemId};

pub use self::clock::{Clock, SystemClock};
pub use self::config::{
    DEFAULT_ACCESS_TOKEN_URL, DEFAULT_LICENSE_RETRY_WAIT_MS, DEFAULT_MAX_LICENSE_ATTEMPTS,
    DEFAULT_TIMEOUT_MS, SessionConfig,
};
pub use self::error::{ConfigError, FailureCode, LicenseError, TokenError, TransportError};
pub use self::license::{
    GENERIC_CONTENT_TYPE, LicenseClient, LicenseScheme, VENDOR_ACCEPT, VENDOR_CONTENT_TYPE,
    vendor_license_url,
};
pub use self::manager::{DrmSessionManager, SessionManagerState};
pub use self::platform::{KeyRequest, KeyState, PlatformSession, PlatformSessionFactory, SessionHandle};
pub use self::profiler::{LicenseProfiler, NoopProfiler, ProfileBucket};
pub use self::slot::{SlotRole, SlotSnapshot, TrackType};
pub use self::token::{AccessToken, AccessTokenCache, parse_token_reply};
pub use self::transport::{HttpResponse, HttpTransport, ReqwestTransport};
