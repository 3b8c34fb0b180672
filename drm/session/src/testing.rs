/*!
    Deterministic stand-ins for the platform, the network and the clock.
*/

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use parking_lot::Mutex;

use drm_core::ProtectionSystemId;

use crate::clock::Clock;
use crate::error::TransportError;
use crate::platform::{KeyRequest, KeyState, PlatformSession, PlatformSessionFactory, SessionHandle};
use crate::profiler::{LicenseProfiler, ProfileBucket};
use crate::transport::{HttpResponse, HttpTransport};

pub const FAKE_CHALLENGE: &[u8] = b"fake-challenge";

// ── Transport ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

type Scripted = Result<HttpResponse, TransportError>;

/**
    Holds one POST inside the transport until released.
*/
pub struct PostGate {
    entered: Receiver<()>,
    release: Sender<()>,
}

impl PostGate {
    /// Blocks until the gated POST has been sent.
    pub fn wait_entered(&self) {
        self.entered.recv().unwrap();
    }

    pub fn release(self) {
        self.release.send(()).unwrap();
    }
}

/**
    Replays queued responses in order and records every request.
    When the POST queue is empty the fallback response (if any) is returned.
*/
#[derive(Default)]
pub struct ScriptedTransport {
    posts: Mutex<VecDeque<Scripted>>,
    gets: Mutex<VecDeque<Scripted>>,
    fallback_post: Mutex<Option<HttpResponse>>,
    post_log: Mutex<Vec<RecordedRequest>>,
    get_log: Mutex<Vec<String>>,
    post_delay: Mutex<Duration>,
    get_delay: Mutex<Duration>,
    post_gate: Mutex<Option<(Sender<()>, Receiver<()>)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback_post(response: HttpResponse) -> Self {
        let transport = Self::new();
        *transport.fallback_post.lock() = Some(response);
        transport
    }

    pub fn push_post(&self, response: Scripted) {
        self.posts.lock().push_back(response);
    }

    pub fn push_get(&self, response: Scripted) {
        self.gets.lock().push_back(response);
    }

    pub fn set_post_delay(&self, delay: Duration) {
        *self.post_delay.lock() = delay;
    }

    pub fn set_get_delay(&self, delay: Duration) {
        *self.get_delay.lock() = delay;
    }

    /**
        Park the next POST after it is recorded. The caller keeps whatever
        locks it holds until [`PostGate::release`].
    */
    pub fn gate_next_post(&self) -> PostGate {
        let (entered_tx, entered) = mpsc::channel();
        let (release, release_rx) = mpsc::channel();
        *self.post_gate.lock() = Some((entered_tx, release_rx));
        PostGate { entered, release }
    }

    pub fn posts(&self) -> Vec<RecordedRequest> {
        self.post_log.lock().clone()
    }

    pub fn post_count(&self) -> usize {
        self.post_log.lock().len()
    }

    pub fn get_count(&self) -> usize {
        self.get_log.lock().len()
    }
}

impl HttpTransport for ScriptedTransport {
    fn post(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<HttpResponse, TransportError> {
        self.post_log.lock().push(RecordedRequest {
            url: url.to_owned(),
            headers: headers
                .iter()
                .map(|&(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
            body: body.to_vec(),
        });
        let gate = self.post_gate.lock().take();
        if let Some((entered, release)) = gate {
            let _ = entered.send(());
            let _ = release.recv();
        }
        let delay = *self.post_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let scripted = self.posts.lock().pop_front();
        match scripted {
            Some(response) => response,
            None => self
                .fallback_post
                .lock()
                .clone()
                .ok_or_else(|| TransportError::Other("no scripted POST response".into())),
        }
    }

    fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        self.get_log.lock().push(url.to_owned());
        let delay = *self.get_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let scripted = self.gets.lock().pop_front();
        scripted.unwrap_or_else(|| Err(TransportError::Other("no scripted GET response".into())))
    }
}

// ── Platform session ──────────────────────────────────────────────────

/**
    Failure points of a [`FakeSession`].
*/
#[derive(Debug, Clone, Default)]
pub struct FakeBehavior {
    pub refuse_create: bool,
    pub fail_init: bool,
    pub fail_bind: bool,
    pub fail_challenge: bool,
    /// `process_key` moves to `Error`.
    pub reject_key: bool,
    /// `process_key` leaves the session `Pending`.
    pub ignore_key: bool,
    pub destination_url: String,
}

#[derive(Default)]
struct FakeSessionState {
    state: KeyState,
    init_data: Option<Vec<u8>>,
    licenses: Vec<Vec<u8>>,
    key_requests: usize,
    clears: usize,
}

pub struct FakeSession {
    system: ProtectionSystemId,
    behavior: FakeBehavior,
    inner: Mutex<FakeSessionState>,
}

impl FakeSession {
    pub fn new(system: ProtectionSystemId, behavior: FakeBehavior) -> Self {
        Self {
            system,
            behavior,
            inner: Mutex::new(FakeSessionState::default()),
        }
    }

    pub fn key_request_count(&self) -> usize {
        self.inner.lock().key_requests
    }

    pub fn clear_count(&self) -> usize {
        self.inner.lock().clears
    }

    pub fn licenses(&self) -> Vec<Vec<u8>> {
        self.inner.lock().licenses.clone()
    }
}

impl PlatformSession for FakeSession {
    fn key_system(&self) -> ProtectionSystemId {
        self.system
    }

    fn state(&self) -> KeyState {
        self.inner.lock().state
    }

    fn initialize(&self) {
        let mut inner = self.inner.lock();
        inner.state = if self.behavior.fail_init {
            KeyState::Error
        } else {
            KeyState::Init
        };
    }

    fn bind_init_data(&self, init_data: &[u8]) {
        let mut inner = self.inner.lock();
        if inner.state != KeyState::Init {
            return;
        }
        if self.behavior.fail_bind {
            inner.state = KeyState::Error;
        } else {
            inner.init_data = Some(init_data.to_vec());
        }
    }

    fn generate_key_request(&self) -> Option<KeyRequest> {
        let mut inner = self.inner.lock();
        if inner.state != KeyState::Init || inner.init_data.is_none() {
            return None;
        }
        if self.behavior.fail_challenge {
            inner.state = KeyState::Error;
            return None;
        }
        inner.key_requests += 1;
        inner.state = KeyState::Pending;
        Some(KeyRequest {
            challenge: FAKE_CHALLENGE.to_vec(),
            destination_url: self.behavior.destination_url.clone(),
        })
    }

    fn process_key(&self, license: &[u8]) {
        let mut inner = self.inner.lock();
        if inner.state != KeyState::Pending {
            return;
        }
        inner.licenses.push(license.to_vec());
        if self.behavior.reject_key {
            inner.state = KeyState::Error;
        } else if !self.behavior.ignore_key {
            inner.state = KeyState::Ready;
        }
    }

    fn clear_decrypt_context(&self) {
        let mut inner = self.inner.lock();
        inner.clears += 1;
        inner.state = KeyState::Closed;
        inner.init_data = None;
    }
}

/**
    Hands out [`FakeSession`]s with the current behavior and keeps them for
    inspection.
*/
#[derive(Default)]
pub struct FakeFactory {
    behavior: Mutex<FakeBehavior>,
    sessions: Mutex<Vec<Arc<FakeSession>>>,
}

impl FakeFactory {
    pub fn new(behavior: FakeBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            sessions: Mutex::new(Vec::new()),
        }
    }

    pub fn created(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn session(&self, index: usize) -> Arc<FakeSession> {
        self.sessions.lock()[index].clone()
    }
}

impl PlatformSessionFactory for FakeFactory {
    fn create_session(&self, system: ProtectionSystemId) -> Option<SessionHandle> {
        let behavior = self.behavior.lock().clone();
        if behavior.refuse_create {
            return None;
        }
        let session = Arc::new(FakeSession::new(system, behavior));
        self.sessions.lock().push(session.clone());
        Some(session)
    }
}

// ── Clock and profiler ────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self(AtomicU64::new(now_ms))
    }

    pub fn set(&self, now_ms: u64) {
        self.0.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileEvent {
    Begin(ProfileBucket),
    End(ProfileBucket),
    Error(ProfileBucket),
}

#[derive(Default)]
pub struct RecordingProfiler {
    events: Mutex<Vec<ProfileEvent>>,
}

impl RecordingProfiler {
    pub fn events(&self) -> Vec<ProfileEvent> {
        self.events.lock().clone()
    }
}

impl LicenseProfiler for RecordingProfiler {
    fn begin(&self, bucket: ProfileBucket) {
        self.events.lock().push(ProfileEvent::Begin(bucket));
    }

    fn end(&self, bucket: ProfileBucket) {
        self.events.lock().push(ProfileEvent::End(bucket));
    }

    fn error(&self, bucket: ProfileBucket) {
        self.events.lock().push(ProfileEvent::Error(bucket));
    }
}
