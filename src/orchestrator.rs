// Update orchestrator: one decision -> act cycle per invocation. Owns the
// cycle state and the post-success reboot handshake; never runs two applies
// at once (the scheduler guarantees single entry).

use crate::platform::{Clock, ImageBank, Reboot, Transport};
use crate::source::{SourceError, VersionSource};
use crate::status::{StatusSignal, StatusSink};
use crate::transfer::{RetryPolicy, TransferError, TransferExecutor};
use crate::trust::TrustEntry;
use crate::version;
use std::time::Duration;

/// Where the orchestrator currently is within a cycle. Process-wide; only
/// the scheduler-loop task mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    FetchingVersion,
    Deciding,
    Applying,
    Rebooting,
    ReportFailure,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UpdateError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
}

/// Result of one cycle, consumed by the scheduler for logging. Not persisted.
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    NoUpdateAvailable,
    Updated,
    Failed(UpdateError),
}

pub struct Orchestrator {
    source: VersionSource,
    /// Statically configured asset URL, used when the descriptor names none.
    firmware_url: String,
    trust: Vec<TrustEntry>,
    retry: RetryPolicy,
    /// How long the success signal stays visible before the reboot request.
    success_window: Duration,

    transport: Box<dyn Transport>,
    bank: Box<dyn ImageBank>,
    clock: Box<dyn Clock>,
    reboot: Box<dyn Reboot>,
    status: Box<dyn StatusSink>,

    state: CycleState,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: VersionSource,
        firmware_url: String,
        trust: Vec<TrustEntry>,
        retry: RetryPolicy,
        success_window: Duration,
        transport: Box<dyn Transport>,
        bank: Box<dyn ImageBank>,
        clock: Box<dyn Clock>,
        reboot: Box<dyn Reboot>,
        status: Box<dyn StatusSink>,
    ) -> Self {
        Self {
            source,
            firmware_url,
            trust,
            retry,
            success_window,
            transport,
            bank,
            clock,
            reboot,
            status,
            state: CycleState::Idle,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Run one full update cycle: fetch the descriptor, decide, and if newer
    /// firmware exists, download + program it and hand over to reboot. Every
    /// exit path returns to `Idle` with exactly one terminal status signal.
    pub fn run_cycle(&mut self) -> UpdateOutcome {
        self.state = CycleState::FetchingVersion;
        self.status.signal(StatusSignal::CheckingOrApplying);
        log::info!("Checking {} for updates", self.source.url());

        let descriptor = match self
            .source
            .fetch_latest(self.transport.as_ref(), &self.trust, self.clock.as_ref())
        {
            Ok(d) => d,
            Err(e) => return self.report_failure(e.into()),
        };

        self.state = CycleState::Deciding;
        let running = self.bank.running_version();
        if !version::is_newer(&running, &descriptor.version) {
            log::info!("Already running latest version: {}", running);
            self.status.signal(StatusSignal::Idle);
            self.state = CycleState::Idle;
            return UpdateOutcome::NoUpdateAvailable;
        }

        log::info!(
            "New version available: {} (current: {})",
            descriptor.version,
            running
        );

        self.state = CycleState::Applying;
        let url = descriptor
            .asset_url
            .as_deref()
            .unwrap_or(&self.firmware_url)
            .to_string();

        let applied = TransferExecutor::new(self.transport.as_ref(), self.clock.as_ref())
            .apply(self.bank.as_mut(), &url, &self.trust, &self.retry);
        if let Err(e) = applied {
            return self.report_failure(e.into());
        }

        // Point of no return: the new image is the boot target. Show the
        // success pattern for the confirmation window, then restart into it.
        self.state = CycleState::Rebooting;
        self.status.signal(StatusSignal::Success);
        log::info!(
            "Update to {} staged, rebooting in {:?}",
            descriptor.version,
            self.success_window
        );
        self.clock.sleep(self.success_window);
        self.reboot.request_warm_reboot();

        self.state = CycleState::Idle;
        UpdateOutcome::Updated
    }

    fn report_failure(&mut self, cause: UpdateError) -> UpdateOutcome {
        self.state = CycleState::ReportFailure;
        log::error!("Update cycle failed: {}", cause);
        self.status.signal(StatusSignal::Failure);
        self.state = CycleState::Idle;
        UpdateOutcome::Failed(cause)
    }
}
