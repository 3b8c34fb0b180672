/*!
    Two-slot DRM session cache and the key acquisition driver.

    A call to [`DrmSessionManager::create_drm_session`] runs in two phases:

    1. **Selection**, under the short selection lock: pick the slot for the
       requested key id. A slot already reserved for the key (the other
       role's first, then the caller's own) is shared; otherwise the slot
       with the older reservation is evicted and reserved for the new key
       right away, so concurrent callers for the same key find it.
    2. **Acquisition**, under the chosen slot's lock: reuse a ready session
       or drive the platform session through init, challenge, license
       exchange and key processing. Network I/O happens here, never under
       the selection lock.

    Locks are always taken slot first, selection second. After the slot
    lock is held the reservation is checked again, since another caller may
    have evicted it in between; selection then starts over.
*/

use std::borrow::Cow;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use drm_core::{KeyId, ProtectionSystemId, parser_for};

use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::error::{ConfigError, FailureCode};
use crate::license::{LicenseClient, LicenseScheme, vendor_license_url};
use crate::platform::{KeyRequest, KeyState, PlatformSessionFactory, SessionHandle};
use crate::profiler::{LicenseProfiler, NoopProfiler, ProfileBucket};
use crate::slot::{SessionSlot, SlotRole, SlotSnapshot, SlotTable, TrackType};
use crate::token::AccessTokenCache;
use crate::transport::{HttpTransport, ReqwestTransport};

/**
    Selection rounds before a request gives up. Each extra round means the
    reservation was stolen by a concurrent eviction while waiting.
*/
const MAX_SELECTION_ROUNDS: usize = 8;

/**
    Process-wide switch consulted at the start of every session request.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionManagerState {
    #[default]
    Active,
    /// Player teardown: new requests fail fast.
    Inactive,
}

struct Selection {
    state: SessionManagerState,
    table: SlotTable,
}

#[derive(Debug, Clone, Copy)]
struct SlotChoice {
    slot: SlotRole,
    /// The slot was already reserved for the key.
    found: bool,
}

struct SessionRequest<'a> {
    role: SlotRole,
    system: ProtectionSystemId,
    key_id: &'a KeyId,
    init_data: &'a [u8],
    content_metadata: Option<&'a [u8]>,
}

/**
    Acquires, caches and shares platform DRM sessions for the audio and
    video tracks of one playback session.
*/
pub struct DrmSessionManager {
    config: SessionConfig,
    selection: Mutex<Selection>,
    slots: [Mutex<SessionSlot>; 2],
    factory: Arc<dyn PlatformSessionFactory>,
    transport: Arc<dyn HttpTransport>,
    license: LicenseClient,
    token: AccessTokenCache,
    profiler: Arc<dyn LicenseProfiler>,
    clock: Arc<dyn Clock>,
}

impl DrmSessionManager {
    /**
        Manager talking to license servers over HTTP.
    */
    pub fn new(
        config: SessionConfig,
        factory: Arc<dyn PlatformSessionFactory>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Self::with_transport(config, factory, transport)
    }

    /**
        Manager using a caller-provided transport for license and token
        requests.
    */
    pub fn with_transport(
        config: SessionConfig,
        factory: Arc<dyn PlatformSessionFactory>,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let license = LicenseClient::new(transport.clone(), &config);
        let token = AccessTokenCache::new(config.access_token_url.clone());
        Ok(Self {
            config,
            selection: Mutex::new(Selection {
                state: SessionManagerState::Active,
                table: SlotTable::default(),
            }),
            slots: [Mutex::default(), Mutex::default()],
            factory,
            transport,
            license,
            token,
            profiler: Arc::new(NoopProfiler),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_profiler(mut self, profiler: Arc<dyn LicenseProfiler>) -> Self {
        self.profiler = profiler;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /**
        Return a ready platform session for the key in `init_data`.

        `system_id` is a protection system UUID or key-system string.
        `content_metadata` overrides whatever the header carries and also
        lifts the short-circuit on a key whose last acquisition failed.

        Blocks the calling thread for the whole license exchange, retries
        included.
    */
    pub fn create_drm_session(
        &self,
        system_id: &str,
        init_data: &[u8],
        track: TrackType,
        content_metadata: Option<&[u8]>,
    ) -> Result<SessionHandle, FailureCode> {
        if self.session_manager_state() == SessionManagerState::Inactive {
            info!(%track, "session manager inactive, not creating DRM session");
            return Err(FailureCode::SessionManagerInactive);
        }

        let Some(role) = track.role() else {
            warn!(%track, "no DRM session for this track type");
            return Err(FailureCode::UnsupportedStreamType);
        };

        let system = system_id.parse::<ProtectionSystemId>().map_err(|e| {
            warn!(%role, error = %e, "unsupported protection system");
            FailureCode::KeyIdExtractionFailed
        })?;
        let key_id = extract_key_id(system, init_data, role)?;
        debug!(%role, %system, %key_id, init_data_len = init_data.len(), "DRM session requested");

        let request = SessionRequest {
            role,
            system,
            key_id: &key_id,
            init_data,
            content_metadata,
        };

        for round in 1..=MAX_SELECTION_ROUNDS {
            let choice = self.select_slot(role, &key_id)?;
            let mut slot = self.slots[choice.slot.index()].lock();

            let previous_failure = {
                let selection = self.selection.lock();
                match selection.table.entry(choice.slot) {
                    Some(entry) if entry.key_id == key_id => entry.failure,
                    _ => {
                        debug!(%role, slot = %choice.slot, %key_id, round, "slot reservation lost, selecting again");
                        continue;
                    }
                }
            };

            let result = self.acquire(&mut slot, choice, previous_failure, &request);
            self.selection
                .lock()
                .table
                .record(choice.slot, &key_id, result.as_ref().err().copied());
            return result;
        }

        warn!(%role, %key_id, "gave up selecting a slot under contention");
        Err(FailureCode::DrmInitFailed)
    }

    fn select_slot(&self, role: SlotRole, key_id: &KeyId) -> Result<SlotChoice, FailureCode> {
        let mut selection = self.selection.lock();
        if selection.state == SessionManagerState::Inactive {
            return Err(FailureCode::SessionManagerInactive);
        }

        let other = role.other();
        if selection.table.holds(other, key_id) {
            debug!(%role, slot = %other, %key_id, "key already reserved by the other slot");
            return Ok(SlotChoice {
                slot: other,
                found: true,
            });
        }
        if selection.table.holds(role, key_id) {
            debug!(%role, %key_id, "key already reserved by own slot");
            return Ok(SlotChoice {
                slot: role,
                found: true,
            });
        }

        let victim = selection.table.eviction_victim(role);
        let now_ms = self.clock.now_ms();
        match selection.table.reserve(victim, key_id.clone(), now_ms) {
            Some(evicted) => info!(
                %role,
                slot = %victim,
                evicted = %evicted.key_id,
                %key_id,
                "evicting slot for new key"
            ),
            None => debug!(%role, slot = %victim, %key_id, "reserving empty slot"),
        }
        Ok(SlotChoice {
            slot: victim,
            found: false,
        })
    }

    fn acquire(
        &self,
        slot: &mut SessionSlot,
        choice: SlotChoice,
        previous_failure: Option<FailureCode>,
        request: &SessionRequest<'_>,
    ) -> Result<SessionHandle, FailureCode> {
        let SessionRequest {
            role,
            system,
            key_id,
            ..
        } = *request;

        let handle = match slot.handle.clone() {
            Some(handle) if handle.key_system() == system => {
                if let Some(ready) = slot.ready_for(key_id) {
                    info!(%role, slot = %choice.slot, %key_id, "reusing ready DRM session");
                    return Ok(ready.clone());
                }
                if choice.found
                    && request.content_metadata.is_none()
                    && let Some(code) = previous_failure
                {
                    info!(%role, %key_id, %code, "key failed before, not retrying without new content metadata");
                    return Err(code);
                }
                handle.clear_decrypt_context();
                slot.bound_key_id = None;
                handle
            }
            existing => {
                if let Some(old) = existing {
                    warn!(
                        %role,
                        slot = %choice.slot,
                        from = old.key_system().to_name(),
                        to = system.to_name(),
                        "DRM system changed, replacing session"
                    );
                    slot.release();
                }
                let handle = self.factory.create_session(system).ok_or_else(|| {
                    error!(%role, %system, "platform could not create a DRM session");
                    FailureCode::DrmInitFailed
                })?;
                slot.handle = Some(handle.clone());
                handle
            }
        };

        self.profiler.begin(ProfileBucket::LicensePreprocess);
        let key_request = prepare(&handle, request).inspect_err(|_| {
            self.profiler.error(ProfileBucket::LicensePreprocess);
        })?;
        self.profiler.end(ProfileBucket::LicensePreprocess);
        debug!(%role, challenge_len = key_request.challenge.len(), "license challenge generated");

        let network_failure = self.exchange_license(&handle, &key_request, request).err();

        match handle.state() {
            KeyState::Ready => {
                slot.bound_key_id = Some(key_id.clone());
                info!(%role, slot = %choice.slot, %key_id, "DRM session ready");
                Ok(handle)
            }
            KeyState::Pending => {
                let code = network_failure.unwrap_or(FailureCode::InvalidDrmKey);
                error!(%role, %key_id, %code, "DRM session still waiting for a key");
                Err(code)
            }
            state => {
                let code = network_failure.unwrap_or(FailureCode::KeyUpdateFailed);
                error!(%role, %key_id, %state, %code, "DRM session failed to process key");
                Err(code)
            }
        }
    }

    /**
        Fetch the license for `key_request` and hand it to the session.
        Returns the network failure, if any; the caller derives the final
        outcome from the session state.
    */
    fn exchange_license(
        &self,
        handle: &SessionHandle,
        key_request: &KeyRequest,
        request: &SessionRequest<'_>,
    ) -> Result<(), FailureCode> {
        let content_metadata: Option<Cow<'_, [u8]>> = match request.content_metadata {
            Some(metadata) => Some(Cow::Borrowed(metadata)),
            None => parser_for(request.system)
                .extract_content_metadata(request.init_data)
                .map(Cow::Owned),
        };
        let vendor = content_metadata.is_some();
        let url = self.license_url(request.system, &key_request.destination_url, vendor);

        let mut token_failed = false;
        let access_token = if vendor && !self.config.anonymous_license_request {
            match self.token.get_or_fetch(self.transport.as_ref()) {
                Ok(token) => Some(token),
                Err(_) => {
                    token_failed = true;
                    warn!(role = %request.role, "sending license request without access token");
                    None
                }
            }
        } else {
            None
        };

        let scheme = match &content_metadata {
            Some(metadata) => LicenseScheme::Vendor {
                content_metadata: metadata,
                access_token: access_token.as_ref(),
            },
            None => LicenseScheme::Generic,
        };

        self.profiler.begin(ProfileBucket::LicenseNetwork);
        let license = match self.license.acquire(&key_request.challenge, &url, scheme) {
            Ok(license) => license,
            Err(e) => {
                self.profiler.error(ProfileBucket::LicenseNetwork);
                let code = e.failure_code(token_failed);
                error!(role = %request.role, url = %url, error = %e, %code, "license acquisition failed");
                return Err(code);
            }
        };
        self.profiler.end(ProfileBucket::LicenseNetwork);

        self.profiler.begin(ProfileBucket::LicensePostprocess);
        handle.process_key(&license);
        if handle.state() == KeyState::Ready {
            self.profiler.end(ProfileBucket::LicensePostprocess);
        } else {
            self.profiler.error(ProfileBucket::LicensePostprocess);
        }
        Ok(())
    }

    /**
        Configured override, then the vendor endpoint for a known
        destination host (vendor scheme only), then the platform's
        destination as-is.
    */
    fn license_url(&self, system: ProtectionSystemId, destination: &str, vendor: bool) -> String {
        if let Some(url) = self.config.license_url_override(system) {
            return url.to_owned();
        }
        if vendor && let Some(url) = vendor_license_url(destination) {
            return url.to_owned();
        }
        destination.to_owned()
    }

    pub fn set_session_manager_state(&self, state: SessionManagerState) {
        let mut selection = self.selection.lock();
        if selection.state != state {
            info!(?state, "session manager state changed");
            selection.state = state;
        }
    }

    pub fn session_manager_state(&self) -> SessionManagerState {
        self.selection.lock().state
    }

    /**
        Release both platform sessions and forget every reservation.
        Waits for in-flight acquisitions to finish.
    */
    pub fn clear_session_data(&self) {
        for role in SlotRole::ALL {
            let mut slot = self.slots[role.index()].lock();
            slot.release();
            self.selection.lock().table.clear(role);
        }
        info!("DRM session data cleared");
    }

    /**
        Forget reservations whose last acquisition failed, so the next
        request for those keys goes to the license server again.
    */
    pub fn clear_failed_key_ids(&self) {
        let cleared = self.selection.lock().table.clear_failed();
        if cleared > 0 {
            debug!(cleared, "cleared failed key ids");
        }
    }

    pub fn clear_access_token(&self) {
        self.token.clear();
    }

    /**
        Current reservation and session state of one slot. Waits for an
        in-flight acquisition on that slot.
    */
    pub fn slot_snapshot(&self, role: SlotRole) -> SlotSnapshot {
        let slot = self.slots[role.index()].lock();
        let selection = self.selection.lock();
        SlotSnapshot::new(role, &slot, selection.table.entry(role))
    }
}

fn extract_key_id(
    system: ProtectionSystemId,
    init_data: &[u8],
    role: SlotRole,
) -> Result<KeyId, FailureCode> {
    let key_ids = parser_for(system).extract_key_ids(init_data).map_err(|e| {
        warn!(%role, %system, error = %e, "failed to parse key id from init data");
        FailureCode::KeyIdExtractionFailed
    })?;
    key_ids.into_iter().next().ok_or_else(|| {
        warn!(%role, %system, "no key id in init data");
        FailureCode::KeyIdExtractionFailed
    })
}

/**
    Init, bind and challenge. Each step is verified against the session's
    key state.
*/
fn prepare(handle: &SessionHandle, request: &SessionRequest<'_>) -> Result<KeyRequest, FailureCode> {
    handle.initialize();
    if handle.state() != KeyState::Init {
        error!(role = %request.role, state = %handle.state(), "DRM session initialization failed");
        return Err(FailureCode::DrmInitFailed);
    }

    handle.bind_init_data(request.init_data);
    if handle.state() != KeyState::Init {
        error!(role = %request.role, state = %handle.state(), "binding init data failed");
        return Err(FailureCode::DataBindFailed);
    }

    match handle.generate_key_request() {
        Some(key_request) if handle.state() == KeyState::Pending => Ok(key_request),
        _ => {
            error!(role = %request.role, state = %handle.state(), "license challenge generation failed");
            Err(FailureCode::ChallengeFailed)
        }
    }
}
