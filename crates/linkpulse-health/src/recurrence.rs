//! Recurrence scheduler. Feeds finished endpoints back in for another round.
//!
//! A round that ends naturally hands its endpoint over the handoff channel
//! together with a unit of outstanding work taken *before* the round's own
//! unit is released, so the outstanding count never touches zero while the
//! cycle continues. The scheduler waits out the cool-down, checks for
//! shutdown, and starts a fresh round. Declined recurrences just drop their
//! unit.

use std::sync::Arc;
use std::time::Duration;

use linkpulse_core::Endpoint;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

use crate::event::{CheckEvent, EventSink};
use crate::probe::Probe;
use crate::round::RoundRunner;

/// An endpoint waiting for its next round, plus the work unit that keeps
/// the checker from draining meanwhile.
pub(crate) struct Recurrence {
    endpoint: Endpoint,
    work: TaskTrackerToken,
}

pub(crate) struct RecurrenceScheduler<P> {
    runner: Arc<RoundRunner<P>>,
    tracker: TaskTracker,
    handoff: mpsc::UnboundedSender<Recurrence>,
    cooldown: Duration,
    cancel: CancellationToken,
    events: EventSink,
}

impl<P> Clone for RecurrenceScheduler<P> {
    fn clone(&self) -> Self {
        Self {
            runner: self.runner.clone(),
            tracker: self.tracker.clone(),
            handoff: self.handoff.clone(),
            cooldown: self.cooldown,
            cancel: self.cancel.clone(),
            events: self.events.clone(),
        }
    }
}

impl<P: Probe + 'static> RecurrenceScheduler<P> {
    pub(crate) fn new(
        runner: Arc<RoundRunner<P>>,
        tracker: TaskTracker,
        cooldown: Duration,
        cancel: CancellationToken,
        events: EventSink,
    ) -> (Self, mpsc::UnboundedReceiver<Recurrence>) {
        let (handoff, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            runner,
            tracker,
            handoff,
            cooldown,
            cancel,
            events,
        };
        (scheduler, rx)
    }

    /// Start a first round for `endpoint` right away.
    pub(crate) fn launch(&self, endpoint: Endpoint) {
        let work = self.tracker.token();
        self.spawn_round(endpoint, work, Duration::ZERO);
    }

    /// Consume the handoff channel until `stop` fires.
    ///
    /// Anything still queued when the loop ends is declined.
    pub(crate) async fn run(
        self,
        mut rx: mpsc::UnboundedReceiver<Recurrence>,
        stop: CancellationToken,
    ) {
        debug!(cooldown_ms = self.cooldown.as_millis() as u64, "recurrence scheduler started");

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                next = rx.recv() => match next {
                    Some(Recurrence { endpoint, work }) => {
                        self.spawn_round(endpoint, work, self.cooldown);
                    }
                    None => break,
                },
            }
        }

        rx.close();
        while let Ok(Recurrence { endpoint, work }) = rx.try_recv() {
            self.decline(endpoint, work);
        }
        debug!("recurrence scheduler stopped");
    }

    fn spawn_round(&self, endpoint: Endpoint, work: TaskTrackerToken, delay: Duration) {
        let this = self.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = this.cancel.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
                if this.cancel.is_cancelled() {
                    this.decline(endpoint, work);
                    return;
                }
            }

            let outcome = this.runner.run(&endpoint).await;
            debug!(%endpoint, attempts = outcome.attempts(), ?outcome, "round finished");
            if outcome.recurs() {
                this.forward(endpoint);
            }
            drop(work);
        });
    }

    /// Hand a finished endpoint to the scheduler loop.
    fn forward(&self, endpoint: Endpoint) {
        if self.cancel.is_cancelled() {
            self.events.emit(CheckEvent::RecurrenceDeclined { endpoint });
            return;
        }

        let work = self.tracker.token();
        if let Err(mpsc::error::SendError(rejected)) =
            self.handoff.send(Recurrence { endpoint, work })
        {
            self.decline(rejected.endpoint, rejected.work);
        }
    }

    fn decline(&self, endpoint: Endpoint, work: TaskTrackerToken) {
        self.events.emit(CheckEvent::RecurrenceDeclined { endpoint });
        drop(work);
    }
}
