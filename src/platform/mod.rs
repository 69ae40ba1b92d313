// Narrow interfaces to the platform services the update core depends on:
// secure transport, the A/B image bank, time, connectivity, and reboot.
// The core only ever talks to these traits; concrete providers live in the
// submodules (reqwest transport, file-backed image bank) and in test fakes.

pub mod filebank;
pub mod http;

use crate::trust::TrustEntry;
use crate::version::VersionToken;
use std::time::{Duration, Instant};

/// Transport-layer failure. These advance the trust ladder; they never abort
/// the whole operation on their own.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("TLS handshake failed: {0}")]
    Tls(String),
    #[error("request timed out")]
    Timeout,
    #[error("I/O error mid-stream: {0}")]
    Io(String),
}

/// A response being streamed back. Synchronous pull-based reads: the caller
/// drains chunks in a loop instead of registering event callbacks.
pub trait FetchResponse {
    fn status(&self) -> u16;
    fn content_length(&self) -> Option<u64>;
    /// Read the next chunk into `buf`. Returns 0 at end of stream.
    fn next_chunk(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
}

/// Secure transport provider. One GET per call, configured by a single trust
/// entry; the provider owns timeouts and TLS setup, the core treats the
/// result as an opaque status + byte stream.
pub trait Transport {
    fn fetch(&self, url: &str, trust: &TrustEntry) -> Result<Box<dyn FetchResponse>, TransportError>;
}

/// Flash-side failure while staging an image.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FlashError {
    #[error("no update slot available")]
    NoUpdateSlot,
    #[error("could not open update session")]
    BeginFailed,
    #[error("write to inactive slot failed")]
    WriteFailed,
    #[error("image failed validation")]
    ValidationFailed,
    #[error("could not set boot target")]
    BootTargetFailed,
    #[error("update already in progress")]
    Busy,
}

/// The A/B firmware image bank. Writes go to the inactive slot; the slot is
/// promoted to boot target only by a successful `finish_update`. Exclusively
/// owned by one transfer for the duration of a session.
pub trait ImageBank {
    fn running_version(&self) -> VersionToken;
    fn begin_update(&mut self, size_hint: Option<u64>) -> Result<(), FlashError>;
    fn write_chunk(&mut self, data: &[u8]) -> Result<(), FlashError>;
    /// Validate the staged image and mark it as the next boot target.
    fn finish_update(&mut self) -> Result<(), FlashError>;
    /// Drop a partially staged image. Boot target is left unchanged.
    fn cancel_update(&mut self);
}

/// Monotonic time for scheduling plus a wall-clock-synced flag; certificate
/// validation is meaningless before SNTP (or equivalent) has run.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
    fn wall_clock_synced(&self) -> bool;
}

/// Link-state signal from the connectivity provider. While disconnected the
/// provider guarantees network calls fail fast rather than hang.
pub trait Connectivity {
    fn is_connected(&self) -> bool;
}

/// Warm-reboot handle. `request_warm_reboot` is not expected to return on
/// real hardware.
pub trait Reboot {
    fn request_warm_reboot(&self);
}

/// Standard library clock for host builds.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn wall_clock_synced(&self) -> bool {
        // Hosts boot with RTC-backed time; an embedded port would check its
        // SNTP state here.
        true
    }
}

/// Connectivity stub for hosts, where the OS owns the link.
pub struct AssumeOnline;

impl Connectivity for AssumeOnline {
    fn is_connected(&self) -> bool {
        true
    }
}

/// Host stand-in for the platform restart call: exits the process with a
/// distinctive status so a supervisor can re-exec the new image.
pub struct HostReboot;

/// Exit status signalling "restart me into the new image".
pub const REBOOT_EXIT_CODE: i32 = 42;

impl Reboot for HostReboot {
    fn request_warm_reboot(&self) {
        log::info!("Warm reboot requested, exiting with status {}", REBOOT_EXIT_CODE);
        std::process::exit(REBOOT_EXIT_CODE);
    }
}
