/*!
    Contract with the platform DRM implementation.

    The platform session performs the actual key unwrap; this crate only
    drives it through its key-state machine:

    ```text
    Closed ──initialize──▶ Init ──bind_init_data──▶ Init ──generate_key_request──▶ Pending
                                                                                   │
                                                          process_key ◀────────────┘
                                                               │
                                                        Ready  or  Error
    ```

    `clear_decrypt_context` returns a session to `Closed` from any state.
*/

use core::fmt;
use std::sync::Arc;

use drm_core::ProtectionSystemId;

/**
    Key state of a platform session.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyState {
    #[default]
    Closed,
    Init,
    Pending,
    Ready,
    Error,
}

impl KeyState {
    pub const fn to_name(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Init => "init",
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_name())
    }
}

/**
    License challenge produced by a platform session.
*/
#[derive(Clone, PartialEq, Eq)]
pub struct KeyRequest {
    pub challenge: Vec<u8>,
    /**
        License server the platform derived from the init data (for
        PlayReady the header's LA_URL). May be empty.
    */
    pub destination_url: String,
}

impl fmt::Debug for KeyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRequest")
            .field("challenge_len", &self.challenge.len())
            .field("destination_url", &self.destination_url)
            .finish()
    }
}

/**
    A platform DRM session.

    Implementations use interior mutability: one handle is shared between the
    slot that owns it and every caller it was handed to.
*/
pub trait PlatformSession: Send + Sync {
    /**
        DRM system this session was created for.
    */
    fn key_system(&self) -> ProtectionSystemId;

    fn state(&self) -> KeyState;

    /**
        Prepare the session for new init data. `Closed → Init`.
    */
    fn initialize(&self);

    /**
        Hand the protection header to the platform. Only valid in `Init`.
    */
    fn bind_init_data(&self, init_data: &[u8]);

    /**
        Produce a license challenge. Moves to `Pending` on success.
    */
    fn generate_key_request(&self) -> Option<KeyRequest>;

    /**
        Feed the license response. Only valid in `Pending`; moves to `Ready`
        or `Error`.
    */
    fn process_key(&self, license: &[u8]);

    /**
        Drop any bound key material and return to `Closed`.
    */
    fn clear_decrypt_context(&self);
}

/**
    Shared handle to a platform session.
*/
pub type SessionHandle = Arc<dyn PlatformSession>;

/**
    Creates platform sessions on demand.
*/
pub trait PlatformSessionFactory: Send + Sync {
    /**
        New session for `system`, or `None` if the platform cannot provide one.
    */
    fn create_session(&self, system: ProtectionSystemId) -> Option<SessionHandle>;
}
