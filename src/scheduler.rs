// Polling scheduler: one unconditional check after boot, then a fixed
// interval measured from cycle completion. A trigger landing while a cycle
// is in flight is coalesced, never queued - two concurrent transfers writing
// the same slot must be impossible by construction.

use crate::orchestrator::{Orchestrator, UpdateOutcome};
use crate::platform::{Clock, Connectivity};
use std::time::{Duration, Instant};

/// How long the loop naps between due-ness checks.
const POLL_TICK: Duration = Duration::from_millis(500);

pub struct Scheduler {
    interval: Duration,
    /// None means "never run": the boot trigger is immediately due.
    next_due: Option<Instant>,
    in_flight: bool,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
            in_flight: false,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        !self.in_flight && self.next_due.map_or(true, |due| now >= due)
    }

    /// Claim the next cycle. Returns false if one is already in flight or
    /// the interval has not elapsed - the trigger is dropped, not queued.
    pub fn begin_cycle(&mut self, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.in_flight = true;
        true
    }

    /// Mark the cycle done. The next trigger is computed from completion
    /// time, so a transfer that overruns the interval never causes overlap
    /// or a burst of catch-up cycles.
    pub fn complete_cycle(&mut self, now: Instant) {
        self.in_flight = false;
        self.next_due = Some(now + self.interval);
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }
}

/// Drive the orchestrator forever (or for `max_cycles`, for bench runs).
/// Single task: the orchestrator state is only ever touched from here.
pub fn run_loop(
    orchestrator: &mut Orchestrator,
    scheduler: &mut Scheduler,
    connectivity: &dyn Connectivity,
    clock: &dyn Clock,
    max_cycles: Option<u64>,
) {
    let mut completed: u64 = 0;

    loop {
        if !connectivity.is_connected() {
            log::debug!("Network down, holding update checks");
            clock.sleep(POLL_TICK);
            continue;
        }

        if scheduler.begin_cycle(clock.now()) {
            let outcome = orchestrator.run_cycle();
            scheduler.complete_cycle(clock.now());

            match &outcome {
                UpdateOutcome::NoUpdateAvailable => {
                    log::debug!("No update available")
                }
                UpdateOutcome::Updated => log::info!("Update applied"),
                UpdateOutcome::Failed(e) => {
                    log::warn!("Update cycle failed, retrying next interval: {}", e)
                }
            }
            log::info!("Next update check in {:?}", scheduler.interval);

            completed += 1;
            if let Some(max) = max_cycles {
                if completed >= max {
                    return;
                }
            }
        } else {
            clock.sleep(POLL_TICK);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_trigger_is_immediately_due() {
        let mut sched = Scheduler::new(Duration::from_secs(120));
        let now = Instant::now();
        assert!(sched.is_due(now));
        assert!(sched.begin_cycle(now));
    }

    #[test]
    fn back_to_back_triggers_coalesce_to_one_cycle() {
        let mut sched = Scheduler::new(Duration::from_secs(120));
        let now = Instant::now();

        assert!(sched.begin_cycle(now));
        // Second trigger while the first cycle is applying: dropped.
        assert!(!sched.begin_cycle(now));
        assert!(!sched.begin_cycle(now + Duration::from_secs(600)));
        assert!(sched.in_flight());

        sched.complete_cycle(now + Duration::from_secs(1));
        assert!(!sched.in_flight());
    }

    #[test]
    fn next_trigger_measured_from_completion() {
        let interval = Duration::from_secs(120);
        let mut sched = Scheduler::new(interval);
        let start = Instant::now();

        assert!(sched.begin_cycle(start));
        // A transfer that ran way past the nominal interval.
        let finished = start + Duration::from_secs(300);
        sched.complete_cycle(finished);

        // Not due on the wall-clock grid the cycle overran...
        assert!(!sched.is_due(finished + Duration::from_secs(119)));
        // ...due one full interval after completion.
        assert!(sched.is_due(finished + interval));
        assert!(sched.begin_cycle(finished + interval));
    }

    #[test]
    fn not_due_before_interval_elapses() {
        let mut sched = Scheduler::new(Duration::from_secs(120));
        let now = Instant::now();
        assert!(sched.begin_cycle(now));
        sched.complete_cycle(now);
        assert!(!sched.is_due(now + Duration::from_secs(119)));
        assert!(!sched.begin_cycle(now + Duration::from_secs(1)));
    }
}
