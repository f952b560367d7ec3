//! Observability events emitted by the checker.
//!
//! Every event is logged through `tracing`. Embedders (and tests) can
//! additionally register an [`EventCallback`] to receive the structured
//! form.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use http::StatusCode;
use linkpulse_core::Endpoint;
use tracing::{debug, info, warn};

/// Something observable happened inside the checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckEvent {
    /// A probe got a response.
    ProbeSucceeded {
        endpoint: Endpoint,
        attempt: u32,
        status: StatusCode,
    },
    /// A probe could not complete.
    ProbeFailed {
        endpoint: Endpoint,
        attempt: u32,
        error: String,
    },
    /// A failed attempt will be retried after `delay`.
    RetryScheduled {
        endpoint: Endpoint,
        attempt: u32,
        max_retries: u32,
        delay: Duration,
    },
    /// Every attempt of the round failed.
    RetriesExhausted { endpoint: Endpoint, attempts: u32 },
    /// The round stopped early because shutdown was requested.
    RoundAborted { endpoint: Endpoint, attempts: u32 },
    /// A finished round was not rescheduled because shutdown was requested.
    RecurrenceDeclined { endpoint: Endpoint },
    /// Shutdown was requested.
    CancellationReceived,
    /// No rounds are in flight or pending.
    Drained,
}

/// Callback invoked for every emitted event.
pub type EventCallback = Arc<dyn Fn(&CheckEvent) + Send + Sync>;

/// Fans an event out to the log and the optional callback.
///
/// Clones share one callback slot.
#[derive(Clone, Default)]
pub(crate) struct EventSink {
    callback: Arc<RwLock<Option<EventCallback>>>,
}

impl EventSink {
    #[cfg(test)]
    pub(crate) fn new(callback: Option<EventCallback>) -> Self {
        Self {
            callback: Arc::new(RwLock::new(callback)),
        }
    }

    /// Install `callback` on this sink and every clone of it.
    pub(crate) fn set_callback(&self, callback: EventCallback) {
        *self.callback.write().unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    pub(crate) fn emit(&self, event: CheckEvent) {
        log_event(&event);
        // Not called under the lock, so a callback may emit or re-register.
        let callback = self
            .callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(cb) = callback {
            cb(&event);
        }
    }
}

fn log_event(event: &CheckEvent) {
    match event {
        CheckEvent::ProbeSucceeded {
            endpoint,
            attempt,
            status,
        } => {
            info!(%endpoint, status = status.as_u16(), attempt, "{endpoint} is up, status code: {}", status.as_u16());
        }
        CheckEvent::ProbeFailed {
            endpoint,
            attempt,
            error,
        } => {
            warn!(%endpoint, attempt, %error, "error checking {endpoint}");
        }
        CheckEvent::RetryScheduled {
            endpoint,
            attempt,
            max_retries,
            delay,
        } => {
            info!(
                %endpoint,
                attempt,
                max_retries,
                delay_ms = delay.as_millis() as u64,
                "retrying {endpoint} in {delay:?} (retry {attempt}/{max_retries})"
            );
        }
        CheckEvent::RetriesExhausted { endpoint, attempts } => {
            warn!(%endpoint, attempts, "max retries reached for {endpoint}, giving up");
        }
        CheckEvent::RoundAborted { endpoint, attempts } => {
            info!(%endpoint, attempts, "shutdown requested, stopping check for {endpoint}");
        }
        CheckEvent::RecurrenceDeclined { endpoint } => {
            debug!(%endpoint, "shutdown requested, not rescheduling {endpoint}");
        }
        CheckEvent::CancellationReceived => {
            info!("received shutdown signal, cancelling outstanding checks");
        }
        CheckEvent::Drained => {
            info!("all links checked, exiting");
        }
    }
}
