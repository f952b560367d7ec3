//! Check coordinator. Owns the checker's lifecycle.
//!
//! Seeds one round per endpoint, runs the recurrence scheduler, and waits
//! until every outstanding unit of work is gone. Shutdown is cooperative:
//! it sets the cancellation token and lets rounds and the scheduler wind
//! down on their own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use linkpulse_core::{CheckSettings, ConfigError, Endpoint};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::event::{CheckEvent, EventCallback, EventSink};
use crate::limiter::ConcurrencyLimiter;
use crate::probe::Probe;
use crate::recurrence::RecurrenceScheduler;
use crate::round::RoundRunner;

/// Requests shutdown of a running checker. Cheap to clone.
#[derive(Clone)]
pub struct ShutdownHandle {
    cancel: CancellationToken,
    fired: Arc<AtomicBool>,
    events: EventSink,
}

impl ShutdownHandle {
    /// Set the cancellation signal. Only the first call has any effect.
    pub fn shutdown(&self) {
        if self.fired.swap(true, Ordering::AcqRel) {
            return;
        }
        self.events.emit(CheckEvent::CancellationReceived);
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Runs recurring liveness checks over a fixed set of endpoints.
pub struct CheckCoordinator<P> {
    endpoints: Vec<Endpoint>,
    settings: CheckSettings,
    probe: Arc<P>,
    limiter: ConcurrencyLimiter,
    tracker: TaskTracker,
    shutdown: ShutdownHandle,
}

impl<P: Probe + 'static> CheckCoordinator<P> {
    /// Create a coordinator. Fails if `settings` are unusable.
    pub fn new(
        endpoints: Vec<Endpoint>,
        settings: CheckSettings,
        probe: P,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        let limiter = ConcurrencyLimiter::new(settings.max_concurrency);
        Ok(Self {
            endpoints,
            settings,
            probe: Arc::new(probe),
            limiter,
            tracker: TaskTracker::new(),
            shutdown: ShutdownHandle {
                cancel: CancellationToken::new(),
                fired: Arc::new(AtomicBool::new(false)),
                events: EventSink::default(),
            },
        })
    }

    /// Receive every event in addition to the log.
    ///
    /// Applies to shutdown handles taken before this call as well.
    pub fn with_callback(self, callback: EventCallback) -> Self {
        self.shutdown.events.set_callback(callback);
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// Rounds in flight plus recurrences waiting out their cool-down.
    pub fn outstanding(&self) -> usize {
        self.tracker.len()
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    pub fn settings(&self) -> &CheckSettings {
        &self.settings
    }

    /// Run until shutdown has been requested and all work has drained.
    ///
    /// Without a shutdown request this only returns if there are no
    /// endpoints. Call once per coordinator.
    pub async fn run(&self) {
        let events = self.shutdown.events.clone();
        let cancel = self.shutdown.cancel.clone();

        info!(
            endpoints = self.endpoints.len(),
            max_concurrency = self.settings.max_concurrency,
            max_retries = self.settings.max_retries,
            retry_interval_ms = self.settings.retry_interval.as_millis() as u64,
            cooldown_ms = self.settings.cooldown.as_millis() as u64,
            "link checker starting"
        );

        let runner = Arc::new(RoundRunner::new(
            self.probe.clone(),
            self.limiter.clone(),
            self.settings.max_retries,
            self.settings.retry_interval,
            cancel.clone(),
            events.clone(),
        ));
        let (scheduler, rx) = RecurrenceScheduler::new(
            runner,
            self.tracker.clone(),
            self.settings.cooldown,
            cancel.clone(),
            events.clone(),
        );

        for endpoint in &self.endpoints {
            scheduler.launch(endpoint.clone());
        }
        self.tracker.close();

        let stop = cancel.child_token();
        let scheduler_handle = tokio::spawn(scheduler.run(rx, stop.clone()));

        self.tracker.wait().await;

        stop.cancel();
        if let Err(e) = scheduler_handle.await {
            warn!(error = %e, "recurrence scheduler task failed");
        }

        events.emit(CheckEvent::Drained);
    }
}
