//! One round of checks for one endpoint: the first attempt plus bounded
//! retries.

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use linkpulse_core::Endpoint;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::event::{CheckEvent, EventSink};
use crate::limiter::ConcurrencyLimiter;
use crate::probe::Probe;

/// How a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RoundOutcome {
    /// A probe got a response.
    Succeeded { status: StatusCode, attempts: u32 },
    /// The first attempt and every retry failed.
    Exhausted { attempts: u32 },
    /// Shutdown was observed before the round could finish.
    Aborted { attempts: u32 },
}

impl RoundOutcome {
    /// Probes issued during the round.
    pub(crate) fn attempts(&self) -> u32 {
        match *self {
            RoundOutcome::Succeeded { attempts, .. }
            | RoundOutcome::Exhausted { attempts }
            | RoundOutcome::Aborted { attempts } => attempts,
        }
    }

    /// Whether the endpoint should be handed on for another round.
    ///
    /// Aborted rounds end their endpoint's line of work.
    pub(crate) fn recurs(&self) -> bool {
        !matches!(self, RoundOutcome::Aborted { .. })
    }
}

/// Runs rounds: probe, and on failure wait and try again up to a limit.
pub(crate) struct RoundRunner<P> {
    probe: Arc<P>,
    limiter: ConcurrencyLimiter,
    max_retries: u32,
    retry_interval: Duration,
    cancel: CancellationToken,
    events: EventSink,
}

impl<P: Probe> RoundRunner<P> {
    pub(crate) fn new(
        probe: Arc<P>,
        limiter: ConcurrencyLimiter,
        max_retries: u32,
        retry_interval: Duration,
        cancel: CancellationToken,
        events: EventSink,
    ) -> Self {
        Self {
            probe,
            limiter,
            max_retries,
            retry_interval,
            cancel,
            events,
        }
    }

    /// Run one round for `endpoint`, starting from attempt 0.
    ///
    /// The admission token is held only while the probe runs. Shutdown is
    /// checked before every attempt and interrupts the wait for a token and
    /// the wait between attempts.
    pub(crate) async fn run(&self, endpoint: &Endpoint) -> RoundOutcome {
        let mut attempt: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return self.abort(endpoint, attempt);
            }

            let token = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.abort(endpoint, attempt),
                token = self.limiter.acquire() => match token {
                    Ok(token) => token,
                    Err(e) => {
                        warn!(%endpoint, error = %e, "concurrency limiter closed");
                        return self.abort(endpoint, attempt);
                    }
                },
            };

            debug!(%endpoint, attempt, "probing");
            let result = self.probe.check(endpoint).await;
            drop(token);

            match result {
                Ok(status) => {
                    self.events.emit(CheckEvent::ProbeSucceeded {
                        endpoint: endpoint.clone(),
                        attempt,
                        status,
                    });
                    return RoundOutcome::Succeeded {
                        status,
                        attempts: attempt + 1,
                    };
                }
                Err(e) => {
                    self.events.emit(CheckEvent::ProbeFailed {
                        endpoint: endpoint.clone(),
                        attempt,
                        error: e.to_string(),
                    });

                    if attempt >= self.max_retries {
                        self.events.emit(CheckEvent::RetriesExhausted {
                            endpoint: endpoint.clone(),
                            attempts: attempt + 1,
                        });
                        return RoundOutcome::Exhausted {
                            attempts: attempt + 1,
                        };
                    }

                    attempt += 1;
                    self.events.emit(CheckEvent::RetryScheduled {
                        endpoint: endpoint.clone(),
                        attempt,
                        max_retries: self.max_retries,
                        delay: self.retry_interval,
                    });

                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return self.abort(endpoint, attempt),
                        _ = tokio::time::sleep(self.retry_interval) => {}
                    }
                }
            }
        }
    }

    fn abort(&self, endpoint: &Endpoint, attempts: u32) -> RoundOutcome {
        self.events.emit(CheckEvent::RoundAborted {
            endpoint: endpoint.clone(),
            attempts,
        });
        RoundOutcome::Aborted { attempts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{ProbeError, ProbeResult};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed script of results, failing once it runs out.
    struct ScriptedProbe {
        script: Mutex<VecDeque<ProbeResult>>,
        calls: Mutex<u32>,
    }

    impl ScriptedProbe {
        fn new(script: Vec<ProbeResult>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    impl Probe for ScriptedProbe {
        async fn check(&self, _endpoint: &Endpoint) -> ProbeResult {
            *self.calls.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProbeError::Connect("refused".to_string())))
        }
    }

    fn refused() -> ProbeResult {
        Err(ProbeError::Connect("refused".to_string()))
    }

    fn runner(
        probe: Arc<ScriptedProbe>,
        max_retries: u32,
        cancel: CancellationToken,
        events: Arc<Mutex<Vec<CheckEvent>>>,
    ) -> RoundRunner<ScriptedProbe> {
        let sink = EventSink::new(Some(Arc::new(move |e: &CheckEvent| {
            events.lock().unwrap().push(e.clone());
        })));
        RoundRunner::new(
            probe,
            ConcurrencyLimiter::new(1),
            max_retries,
            Duration::from_secs(2),
            cancel,
            sink,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_ends_round() {
        let probe = Arc::new(ScriptedProbe::new(vec![Ok(StatusCode::OK)]));
        let events = Arc::new(Mutex::new(Vec::new()));
        let runner = runner(probe.clone(), 3, CancellationToken::new(), events.clone());

        let outcome = runner.run(&Endpoint::new("http://a")).await;
        assert_eq!(
            outcome,
            RoundOutcome::Succeeded {
                status: StatusCode::OK,
                attempts: 1
            }
        );
        assert_eq!(probe.calls(), 1);
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_failures_with_fixed_delay() {
        let probe = Arc::new(ScriptedProbe::new(vec![
            refused(),
            refused(),
            Ok(StatusCode::ACCEPTED),
        ]));
        let events = Arc::new(Mutex::new(Vec::new()));
        let runner = runner(probe.clone(), 3, CancellationToken::new(), events.clone());

        let start = tokio::time::Instant::now();
        let outcome = runner.run(&Endpoint::new("http://a")).await;

        assert_eq!(
            outcome,
            RoundOutcome::Succeeded {
                status: StatusCode::ACCEPTED,
                attempts: 3
            }
        );
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(4) && elapsed < Duration::from_secs(5));

        let attempts: Vec<u32> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                CheckEvent::ProbeFailed { attempt, .. }
                | CheckEvent::ProbeSucceeded { attempt, .. } => Some(*attempt),
                _ => None,
            })
            .collect();
        assert_eq!(attempts, vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let probe = Arc::new(ScriptedProbe::new(Vec::new()));
        let events = Arc::new(Mutex::new(Vec::new()));
        let runner = runner(probe.clone(), 3, CancellationToken::new(), events.clone());

        let outcome = runner.run(&Endpoint::new("http://a")).await;

        assert_eq!(outcome, RoundOutcome::Exhausted { attempts: 4 });
        assert!(outcome.recurs());
        assert_eq!(probe.calls(), 4);

        let events = events.lock().unwrap();
        let retries: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                CheckEvent::RetryScheduled { attempt, .. } => Some(*attempt),
                _ => None,
            })
            .collect();
        assert_eq!(retries, vec![1, 2, 3]);
        assert!(matches!(
            events.last(),
            Some(CheckEvent::RetriesExhausted { attempts: 4, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_means_single_attempt() {
        let probe = Arc::new(ScriptedProbe::new(Vec::new()));
        let events = Arc::new(Mutex::new(Vec::new()));
        let runner = runner(probe.clone(), 0, CancellationToken::new(), events);

        let outcome = runner.run(&Endpoint::new("http://a")).await;
        assert_eq!(outcome, RoundOutcome::Exhausted { attempts: 1 });
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_start_never_probes() {
        let probe = Arc::new(ScriptedProbe::new(vec![Ok(StatusCode::OK)]));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let runner = runner(probe.clone(), 3, cancel, Arc::new(Mutex::new(Vec::new())));

        let outcome = runner.run(&Endpoint::new("http://a")).await;
        assert_eq!(outcome, RoundOutcome::Aborted { attempts: 0 });
        assert!(!outcome.recurs());
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_retry_wait() {
        let probe = Arc::new(ScriptedProbe::new(Vec::new()));
        let cancel = CancellationToken::new();
        let runner = runner(probe.clone(), 3, cancel.clone(), Arc::new(Mutex::new(Vec::new())));

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            cancel.cancel();
        });

        let start = tokio::time::Instant::now();
        let outcome = runner.run(&Endpoint::new("http://a")).await;
        canceller.await.unwrap();

        assert_eq!(outcome, RoundOutcome::Aborted { attempts: 1 });
        assert_eq!(probe.calls(), 1);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_wait_for_admission() {
        let probe = Arc::new(ScriptedProbe::new(vec![Ok(StatusCode::OK)]));
        let cancel = CancellationToken::new();
        let runner = runner(probe.clone(), 3, cancel.clone(), Arc::new(Mutex::new(Vec::new())));

        // Saturate the single slot so the round has to wait.
        let held = runner.limiter.acquire().await.unwrap();
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });

        let outcome = runner.run(&Endpoint::new("http://a")).await;
        canceller.await.unwrap();
        assert_eq!(outcome, RoundOutcome::Aborted { attempts: 0 });
        assert_eq!(probe.calls(), 0);
        drop(held);
    }

    #[tokio::test(start_paused = true)]
    async fn token_released_after_probe() {
        let probe = Arc::new(ScriptedProbe::new(Vec::new()));
        let runner = runner(probe, 0, CancellationToken::new(), Arc::new(Mutex::new(Vec::new())));

        runner.run(&Endpoint::new("http://a")).await;
        assert_eq!(runner.limiter.in_use(), 0);
    }
}
