//! linkpulse-health: recurring liveness checks for a fixed set of endpoints.
//!
//! Every endpoint is checked in rounds. A round probes the endpoint and,
//! on failure, retries after a fixed interval up to a limit. However the
//! round ends, the endpoint is queued for a fresh round after a cool-down.
//! A shared limiter bounds how many probes are in flight at once.
//!
//! # Architecture
//!
//! ```text
//! CheckCoordinator
//!   ├── TaskTracker (outstanding rounds + pending recurrences)
//!   ├── CancellationToken (one-shot shutdown, see ShutdownHandle)
//!   ├── RecurrenceScheduler
//!   │   ├── handoff channel ← finished rounds
//!   │   └── cool-down → new round
//!   └── RoundRunner (per round)
//!       ├── ConcurrencyLimiter::acquire() → AdmissionToken
//!       ├── Probe::check() → status code | ProbeError
//!       └── fixed retry interval, bounded attempts
//! ```
//!
//! # Shutdown
//!
//! Shutdown never aborts a probe already in flight. Rounds stop before
//! their next attempt, waits for admission, retries, and cool-downs end
//! early, and no new round starts. [`CheckCoordinator::run`] returns once
//! the outstanding count reaches zero.

pub mod coordinator;
pub mod event;
pub mod limiter;
pub mod probe;
mod recurrence;
mod round;

pub use coordinator::{CheckCoordinator, ShutdownHandle};
pub use event::{CheckEvent, EventCallback};
pub use limiter::{AdmissionToken, ConcurrencyLimiter};
pub use probe::{http_probe, HttpProbe, Probe, ProbeError, ProbeResult};
