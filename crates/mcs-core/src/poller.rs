// ── Background state poller ──
//
// A cancellable repeating task. Each tick runs the supplied refresh; the
// first failure halts the poller for good (fail-stop) until it is started
// again explicitly.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::CoreError;

/// Observable poller lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Stopped,
    Polling { interval: Duration },
    Halted { reason: String },
}

/// Owns at most one running poll task, addressed by its cancel token.
pub struct Poller {
    state: watch::Sender<PollState>,
    run: Mutex<Option<CancellationToken>>,
}

impl Poller {
    pub fn new() -> Self {
        let (state, _) = watch::channel(PollState::Stopped);
        Self {
            state,
            run: Mutex::new(None),
        }
    }

    /// Start polling every `interval`, replacing any running poll task.
    ///
    /// The first tick fires one full interval after the call.
    pub fn start<F, Fut>(&self, interval: Duration, tick: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CoreError>> + Send + 'static,
    {
        let mut run = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = run.take() {
            previous.cancel();
        }

        debug!(interval_ms = interval.as_millis(), "starting polling");
        self.state.send_replace(PollState::Polling { interval });

        let cancel = CancellationToken::new();
        tokio::spawn(poll_task(
            interval,
            tick,
            self.state.clone(),
            cancel.clone(),
        ));
        *run = Some(cancel);
    }

    /// Stop polling. Safe to call when nothing is running.
    pub fn stop(&self) {
        let mut run = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = run.take() {
            debug!("stopping polling");
            previous.cancel();
        }
        self.state.send_replace(PollState::Stopped);
    }

    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(run) = self.run.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            run.cancel();
        }
    }
}

async fn poll_task<F, Fut>(
    period: Duration,
    tick: F,
    state: watch::Sender<PollState>,
    cancel: CancellationToken,
) where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<(), CoreError>>,
{
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = tick() => result,
        };

        if let Err(e) = result {
            error!(error = %e, "polling failed; halting");
            if !cancel.is_cancelled() {
                state.send_replace(PollState::Halted {
                    reason: e.to_string(),
                });
            }
            break;
        }
    }
}
