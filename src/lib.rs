// ota-agent: firmware self-update orchestration.
//
// Update flow:
// 1. Scheduler fires (once at boot, then on an interval from completion)
// 2. Version source returns the latest descriptor
// 3. Comparator decides whether it supersedes the running version
// 4. Transfer executor streams the asset into the inactive slot, walking
//    the trust ladder and a bounded retry
// 5. On success: status burst, then warm reboot into the new image
// 6. On failure: status + log, keep running, retry next cycle

pub mod config;
pub mod logging;
pub mod orchestrator;
pub mod platform;
pub mod scheduler;
pub mod source;
pub mod status;
pub mod transfer;
pub mod trust;
pub mod version;

pub use orchestrator::{CycleState, Orchestrator, UpdateError, UpdateOutcome};
pub use scheduler::Scheduler;
pub use source::{SourceError, SourceShape, UpdateDescriptor, VersionSource};
pub use status::{StatusSignal, StatusSink};
pub use transfer::{RetryPolicy, SessionState, TransferError, TransferExecutor, TransferSession};
pub use trust::TrustEntry;
pub use version::{is_newer, VersionToken};
