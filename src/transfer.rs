// Transfer executor: streams a firmware asset into the inactive slot and
// promotes it on success. Transport trust degrades down an explicit ladder;
// the whole operation gets a small bounded retry on top.

use crate::platform::{Clock, FlashError, ImageBank, Transport, TransportError};
use crate::trust::TrustEntry;
use std::time::Duration;

const CHUNK_BUF: usize = 4096;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransferError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("asset server returned HTTP {0}")]
    BadStatus(u16),
    #[error("image rejected by flash validation")]
    ImageRejected,
    #[error("transfer timed out")]
    Timeout,
}

/// Lifecycle of one download-and-program operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Negotiating,
    Streaming,
    Finalizing,
    Committed,
    Aborted,
}

/// One in-flight (or finished) download-and-program session. Owned by the
/// executor for its lifetime; never shared across concurrent operations.
#[derive(Debug, Clone)]
pub struct TransferSession {
    state: SessionState,
    bytes_written: u64,
    trust_used: Option<&'static str>,
}

impl TransferSession {
    fn new() -> Self {
        Self {
            state: SessionState::NotStarted,
            bytes_written: 0,
            trust_used: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Label of the trust entry the committed transfer went through.
    pub fn trust_used(&self) -> Option<&'static str> {
        self.trust_used
    }
}

/// How often a whole `apply` (the entire trust ladder) may be retried, and
/// the pause between attempts. Absorbs transient network drops, not trust
/// failures - those are the ladder's job.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            backoff: Duration::from_secs(5),
        }
    }
}

pub struct TransferExecutor<'a> {
    transport: &'a dyn Transport,
    clock: &'a dyn Clock,
}

impl<'a> TransferExecutor<'a> {
    pub fn new(transport: &'a dyn Transport, clock: &'a dyn Clock) -> Self {
        Self { transport, clock }
    }

    /// Fetch `url` and program it into the inactive slot. On success the
    /// next-boot target points at the new image; a warm reboot is still the
    /// caller's move. On any failure the boot target is untouched.
    pub fn apply(
        &self,
        bank: &mut dyn ImageBank,
        url: &str,
        trust: &[TrustEntry],
        retry: &RetryPolicy,
    ) -> Result<TransferSession, TransferError> {
        let mut last_err = TransferError::Network("no usable trust entry".into());

        for attempt in 1..=retry.attempts.max(1) {
            if attempt > 1 {
                log::info!(
                    "Retrying transfer in {:?} (attempt {}/{})",
                    retry.backoff,
                    attempt,
                    retry.attempts
                );
                self.clock.sleep(retry.backoff);
            }

            match self.run_ladder(bank, url, trust) {
                Ok(session) => return Ok(session),
                // A rejected image is not transient; retrying the download
                // would just burn the flash erase budget.
                Err(TransferError::ImageRejected) => return Err(TransferError::ImageRejected),
                Err(e) => {
                    log::warn!("Transfer attempt {}/{} failed: {}", attempt, retry.attempts, e);
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }

    /// One pass down the trust ladder: each entry gets exactly one shot, a
    /// transport-layer failure moves to the next (weaker) entry, the first
    /// entry that carries the stream through finalize wins.
    fn run_ladder(
        &self,
        bank: &mut dyn ImageBank,
        url: &str,
        trust: &[TrustEntry],
    ) -> Result<TransferSession, TransferError> {
        let mut last_err = TransferError::Network("no usable trust entry".into());

        for (rung, entry) in trust.iter().enumerate() {
            if entry.requires_wall_clock() && !self.clock.wall_clock_synced() {
                log::warn!("Skipping trust entry {} (wall clock unsynced)", entry);
                continue;
            }
            if rung > 0 {
                log::warn!("Downgrading transport trust to {} for {}", entry, url);
            }

            match self.stream_once(bank, url, entry) {
                Ok(session) => return Ok(session),
                // Transport-layer trouble: move down the ladder.
                Err(LadderStep::Transport(e)) => {
                    log::warn!("Transfer via {} failed: {}", entry, e);
                    last_err = match e {
                        TransportError::Timeout => TransferError::Timeout,
                        other => TransferError::Network(other.to_string()),
                    };
                }
                // The server answered or the flash said no; weaker transport
                // trust cannot change either. Stop the ladder here.
                Err(LadderStep::Fatal(e)) => return Err(e),
            }
        }

        Err(last_err)
    }

    fn stream_once(
        &self,
        bank: &mut dyn ImageBank,
        url: &str,
        entry: &TrustEntry,
    ) -> Result<TransferSession, LadderStep> {
        let mut session = TransferSession::new();
        session.state = SessionState::Negotiating;

        let mut response = self
            .transport
            .fetch(url, entry)
            .map_err(LadderStep::Transport)?;

        let status = response.status();
        if !(200..300).contains(&status) {
            session.state = SessionState::Aborted;
            return Err(LadderStep::Fatal(TransferError::BadStatus(status)));
        }

        let size_hint = response.content_length();
        bank.begin_update(size_hint)
            .map_err(|e| LadderStep::Fatal(flash_to_transfer(e)))?;
        session.state = SessionState::Streaming;

        let mut buf = [0u8; CHUNK_BUF];
        let mut last_logged_pct = 0u64;
        loop {
            let n = match response.next_chunk(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    // Partial image stays uncommitted; boot target unchanged.
                    bank.cancel_update();
                    session.state = SessionState::Aborted;
                    log::warn!(
                        "Stream interrupted after {} bytes: {}",
                        session.bytes_written,
                        e
                    );
                    return Err(LadderStep::Transport(e));
                }
            };

            if let Err(e) = bank.write_chunk(&buf[..n]) {
                bank.cancel_update();
                session.state = SessionState::Aborted;
                return Err(LadderStep::Fatal(flash_to_transfer(e)));
            }
            session.bytes_written += n as u64;

            if let Some(total) = size_hint {
                let pct = session.bytes_written * 100 / total.max(1);
                if pct >= last_logged_pct + 10 {
                    log::info!("Transfer progress: {}% ({}/{})", pct, session.bytes_written, total);
                    last_logged_pct = pct;
                }
            }
        }

        session.state = SessionState::Finalizing;
        if let Err(e) = bank.finish_update() {
            session.state = SessionState::Aborted;
            return Err(LadderStep::Fatal(flash_to_transfer(e)));
        }

        session.state = SessionState::Committed;
        session.trust_used = Some(entry.label());
        log::info!(
            "Transfer committed: {} bytes via {}",
            session.bytes_written,
            entry
        );
        Ok(session)
    }
}

/// Internal outcome of one ladder rung: transport errors fall through to the
/// next rung, fatal errors end the pass.
enum LadderStep {
    Transport(TransportError),
    Fatal(TransferError),
}

fn flash_to_transfer(e: FlashError) -> TransferError {
    log::error!("Image bank error: {}", e);
    TransferError::ImageRejected
}
