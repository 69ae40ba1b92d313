// Shared fakes for the platform traits, used by the end-to-end cycle tests.

#![allow(dead_code)]

use ota_agent::platform::{
    Clock, FetchResponse, FlashError, ImageBank, Reboot, Transport, TransportError,
};
use ota_agent::status::{StatusSignal, StatusSink};
use ota_agent::trust::TrustEntry;
use ota_agent::version::VersionToken;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// One scripted reply for a URL. Replies are consumed in order per URL.
pub enum Script {
    Fail(TransportError),
    Respond {
        status: u16,
        body: Vec<u8>,
        /// Deliver the body, then break the stream with this error.
        mid_fail: Option<TransportError>,
    },
}

impl Script {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Script::Respond {
            status: 200,
            body: body.into(),
            mid_fail: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Script::Respond {
            status,
            body: Vec::new(),
            mid_fail: None,
        }
    }
}

#[derive(Default)]
pub struct FakeTransport {
    scripts: Mutex<HashMap<String, Vec<Script>>>,
    /// Every fetch as (url, trust label), in order.
    pub attempts: Arc<Mutex<Vec<(String, &'static str)>>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, url: &str, reply: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push(reply);
        self
    }

    pub fn attempts_for(&self, url: &str) -> Vec<&'static str> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, label)| *label)
            .collect()
    }
}

struct FakeResponse {
    status: u16,
    body: std::vec::IntoIter<u8>,
    mid_fail: Option<TransportError>,
}

impl FetchResponse for FakeResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn content_length(&self) -> Option<u64> {
        None
    }

    fn next_chunk(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut n = 0;
        while n < buf.len() {
            match self.body.next() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        if n == 0 {
            if let Some(e) = self.mid_fail.take() {
                return Err(e);
            }
        }
        Ok(n)
    }
}

impl Transport for FakeTransport {
    fn fetch(
        &self,
        url: &str,
        trust: &TrustEntry,
    ) -> Result<Box<dyn FetchResponse>, TransportError> {
        self.attempts
            .lock()
            .unwrap()
            .push((url.to_string(), trust.label()));

        let mut scripts = self.scripts.lock().unwrap();
        let replies = scripts
            .get_mut(url)
            .unwrap_or_else(|| panic!("unscripted URL fetched: {}", url));
        assert!(!replies.is_empty(), "URL fetched too often: {}", url);

        match replies.remove(0) {
            Script::Fail(e) => Err(e),
            Script::Respond { status, body, mid_fail } => Ok(Box::new(FakeResponse {
                status,
                body: body.into_iter(),
                mid_fail,
            })),
        }
    }
}

/// In-memory image bank with shared state the test keeps a handle on.
#[derive(Default)]
pub struct BankState {
    pub staged: Option<Vec<u8>>,
    pub committed: Option<Vec<u8>>,
    pub boot_flips: u32,
    pub cancels: u32,
    pub reject_on_finish: bool,
}

pub struct MemoryBank {
    running: VersionToken,
    pub state: Arc<Mutex<BankState>>,
}

impl MemoryBank {
    pub fn new(running: &str) -> Self {
        Self {
            running: VersionToken::from(running),
            state: Arc::new(Mutex::new(BankState::default())),
        }
    }

    pub fn state_handle(&self) -> Arc<Mutex<BankState>> {
        Arc::clone(&self.state)
    }
}

impl ImageBank for MemoryBank {
    fn running_version(&self) -> VersionToken {
        self.running.clone()
    }

    fn begin_update(&mut self, _size_hint: Option<u64>) -> Result<(), FlashError> {
        let mut s = self.state.lock().unwrap();
        if s.staged.is_some() {
            return Err(FlashError::Busy);
        }
        s.staged = Some(Vec::new());
        Ok(())
    }

    fn write_chunk(&mut self, data: &[u8]) -> Result<(), FlashError> {
        let mut s = self.state.lock().unwrap();
        s.staged
            .as_mut()
            .ok_or(FlashError::WriteFailed)?
            .extend_from_slice(data);
        Ok(())
    }

    fn finish_update(&mut self) -> Result<(), FlashError> {
        let mut s = self.state.lock().unwrap();
        if s.reject_on_finish {
            s.staged = None;
            return Err(FlashError::ValidationFailed);
        }
        s.committed = s.staged.take();
        s.boot_flips += 1;
        Ok(())
    }

    fn cancel_update(&mut self) {
        let mut s = self.state.lock().unwrap();
        s.staged = None;
        s.cancels += 1;
    }
}

pub struct FakeClock {
    pub synced: bool,
}

impl Default for FakeClock {
    fn default() -> Self {
        Self { synced: true }
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, _duration: Duration) {}

    fn wall_clock_synced(&self) -> bool {
        self.synced
    }
}

#[derive(Default)]
pub struct FakeReboot {
    pub requested: Arc<AtomicBool>,
}

impl FakeReboot {
    pub fn handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.requested)
    }
}

impl Reboot for FakeReboot {
    fn request_warm_reboot(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub signals: Arc<Mutex<Vec<StatusSignal>>>,
}

impl RecordingSink {
    pub fn handle(&self) -> Arc<Mutex<Vec<StatusSignal>>> {
        Arc::clone(&self.signals)
    }
}

impl StatusSink for RecordingSink {
    fn signal(&mut self, status: StatusSignal) {
        self.signals.lock().unwrap().push(status);
    }
}
