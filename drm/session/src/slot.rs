use core::fmt;
use core::str::FromStr;

use drm_core::utils::{eq_ignore_ascii_case, trim_ascii};
use drm_core::{KeyId, ParseError, ProtectionSystemId};

use crate::error::FailureCode;
use crate::platform::{KeyState, SessionHandle};

/**
    One of the two session slots. Each playback pipeline has a home slot,
    but either role may end up using the other's slot when they share a key.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SlotRole {
    Video,
    Audio,
}

impl SlotRole {
    pub const ALL: [Self; 2] = [Self::Video, Self::Audio];

    pub const fn index(self) -> usize {
        match self {
            Self::Video => 0,
            Self::Audio => 1,
        }
    }

    pub const fn other(self) -> Self {
        match self {
            Self::Video => Self::Audio,
            Self::Audio => Self::Video,
        }
    }

    pub const fn from_name(name: &[u8]) -> Option<Self> {
        let name = trim_ascii(name);
        match name.len() {
            5 if eq_ignore_ascii_case(name, b"video") => Some(Self::Video),
            5 if eq_ignore_ascii_case(name, b"audio") => Some(Self::Audio),
            _ => None,
        }
    }

    pub const fn to_name(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for SlotRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_name())
    }
}

impl FromStr for SlotRole {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s.as_bytes()).ok_or_else(|| ParseError {
            kind: "slot role",
            value: s.to_owned(),
        })
    }
}

/**
    Media type of the track asking for a session.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackType {
    Video,
    Audio,
    Subtitle,
}

impl TrackType {
    /**
        Home slot for this track type. Only audio and video tracks are
        encrypted with their own session.
    */
    pub const fn role(self) -> Option<SlotRole> {
        match self {
            Self::Video => Some(SlotRole::Video),
            Self::Audio => Some(SlotRole::Audio),
            Self::Subtitle => None,
        }
    }

    pub const fn from_name(name: &[u8]) -> Option<Self> {
        let name = trim_ascii(name);
        match name.len() {
            5 if eq_ignore_ascii_case(name, b"video") => Some(Self::Video),
            5 if eq_ignore_ascii_case(name, b"audio") => Some(Self::Audio),
            8 if eq_ignore_ascii_case(name, b"subtitle") => Some(Self::Subtitle),
            _ => None,
        }
    }

    pub const fn to_name(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Subtitle => "subtitle",
        }
    }
}

impl From<SlotRole> for TrackType {
    fn from(role: SlotRole) -> Self {
        match role {
            SlotRole::Video => Self::Video,
            SlotRole::Audio => Self::Audio,
        }
    }
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_name())
    }
}

impl FromStr for TrackType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s.as_bytes()).ok_or_else(|| ParseError {
            kind: "track type",
            value: s.to_owned(),
        })
    }
}

/**
    Key a slot is reserved for.

    Written at selection time, before the slot's platform session exists,
    so later callers for the same key find the reservation.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CachedKeyId {
    pub key_id: KeyId,
    pub created_at_ms: u64,
    /// Set when the last acquisition for this key failed.
    pub failure: Option<FailureCode>,
}

/**
    Slot reservations. Guarded by the manager's selection lock.
*/
#[derive(Debug, Default)]
pub(crate) struct SlotTable {
    entries: [Option<CachedKeyId>; 2],
}

impl SlotTable {
    pub fn entry(&self, role: SlotRole) -> Option<&CachedKeyId> {
        self.entries[role.index()].as_ref()
    }

    pub fn holds(&self, role: SlotRole, key_id: &KeyId) -> bool {
        self.entry(role).is_some_and(|entry| entry.key_id == *key_id)
    }

    /**
        Creation time of the reservation; an empty slot counts as oldest.
    */
    pub fn created_at(&self, role: SlotRole) -> u64 {
        self.entry(role).map_or(0, |entry| entry.created_at_ms)
    }

    /**
        Slot to evict for a new key requested by `role`: the other slot if
        its reservation is strictly older, otherwise the caller's own.
    */
    pub fn eviction_victim(&self, role: SlotRole) -> SlotRole {
        let other = role.other();
        if self.created_at(other) < self.created_at(role) {
            other
        } else {
            role
        }
    }

    pub fn reserve(&mut self, role: SlotRole, key_id: KeyId, now_ms: u64) -> Option<CachedKeyId> {
        self.entries[role.index()].replace(CachedKeyId {
            key_id,
            created_at_ms: now_ms,
            failure: None,
        })
    }

    /**
        Record the outcome of an acquisition, if `role` is still reserved for
        `key_id`.
    */
    pub fn record(&mut self, role: SlotRole, key_id: &KeyId, failure: Option<FailureCode>) {
        if let Some(entry) = self.entries[role.index()].as_mut()
            && entry.key_id == *key_id
        {
            entry.failure = failure;
        }
    }

    pub fn clear(&mut self, role: SlotRole) {
        self.entries[role.index()] = None;
    }

    /**
        Drop every reservation whose last acquisition failed.
        Returns how many were dropped.
    */
    pub fn clear_failed(&mut self) -> usize {
        let mut cleared = 0;
        for entry in &mut self.entries {
            if entry.as_ref().is_some_and(|e| e.failure.is_some()) {
                *entry = None;
                cleared += 1;
            }
        }
        cleared
    }
}

/**
    Platform session owned by a slot and the key it was last made ready for.
    Guarded by the slot's own lock.
*/
#[derive(Default)]
pub(crate) struct SessionSlot {
    pub handle: Option<SessionHandle>,
    pub bound_key_id: Option<KeyId>,
}

impl SessionSlot {
    /**
        Session usable as-is for `key_id`.
    */
    pub fn ready_for(&self, key_id: &KeyId) -> Option<&SessionHandle> {
        self.handle.as_ref().filter(|handle| {
            self.bound_key_id.as_ref() == Some(key_id) && handle.state() == KeyState::Ready
        })
    }

    /**
        Tear down the platform session.
    */
    pub fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.clear_decrypt_context();
        }
        self.bound_key_id = None;
    }
}

/**
    Point-in-time view of a slot.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub role: SlotRole,
    /**
        Key the slot is reserved for.
    */
    pub key_id: Option<KeyId>,
    pub created_at_ms: u64,
    pub failed: bool,
    pub last_failure: Option<FailureCode>,
    /**
        Key the platform session was last made ready for.
    */
    pub bound_key_id: Option<KeyId>,
    pub has_session: bool,
    pub state: KeyState,
    pub key_system: Option<ProtectionSystemId>,
}

impl SlotSnapshot {
    pub(crate) fn new(role: SlotRole, slot: &SessionSlot, entry: Option<&CachedKeyId>) -> Self {
        Self {
            role,
            key_id: entry.map(|e| e.key_id.clone()),
            created_at_ms: entry.map_or(0, |e| e.created_at_ms),
            failed: entry.is_some_and(|e| e.failure.is_some()),
            last_failure: entry.and_then(|e| e.failure),
            bound_key_id: slot.bound_key_id.clone(),
            has_session: slot.handle.is_some(),
            state: slot.handle.as_ref().map_or(KeyState::Closed, |h| h.state()),
            key_system: slot.handle.as_ref().map(|h| h.key_system()),
        }
    }
}
