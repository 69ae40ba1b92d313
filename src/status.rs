// Device status signaling. Four logical states, each with a distinguishable
// blink pattern; how the pattern is rendered (LED, display, log line) is the
// sink's business.

/// Logical device status, one terminal signal per orchestrator cycle plus an
/// in-progress signal while a cycle runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSignal {
    Idle,
    CheckingOrApplying,
    Success,
    Failure,
}

/// A blink pattern: `pulses` flashes of `on_ms`, separated by `off_ms`, then
/// repeat. Chosen so the four signals are tellable apart at a glance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedPattern {
    pub pulses: u8,
    pub on_ms: u32,
    pub off_ms: u32,
}

impl StatusSignal {
    pub fn led_pattern(self) -> LedPattern {
        match self {
            // slow heartbeat
            StatusSignal::Idle => LedPattern { pulses: 1, on_ms: 100, off_ms: 2900 },
            // fast pulse
            StatusSignal::CheckingOrApplying => LedPattern { pulses: 1, on_ms: 100, off_ms: 150 },
            // rapid burst before reboot
            StatusSignal::Success => LedPattern { pulses: 10, on_ms: 50, off_ms: 50 },
            // slow double pulse
            StatusSignal::Failure => LedPattern { pulses: 2, on_ms: 300, off_ms: 1400 },
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StatusSignal::Idle => "idle",
            StatusSignal::CheckingOrApplying => "checking",
            StatusSignal::Success => "success",
            StatusSignal::Failure => "failure",
        }
    }
}

/// Where status signals go. The orchestrator pushes signals here; the sink
/// renders them however the device presents status.
pub trait StatusSink {
    fn signal(&mut self, status: StatusSignal);
}

/// Host sink: one log line per signal, pattern included so a bench run shows
/// what the device LED would do.
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn signal(&mut self, status: StatusSignal) {
        let p = status.led_pattern();
        log::info!(
            "Status: {} (blink {}x {}ms/{}ms)",
            status.label(),
            p.pulses,
            p.on_ms,
            p.off_ms
        );
    }
}
