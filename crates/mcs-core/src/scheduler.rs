// ── Command scheduler ──
//
// Serializes every mutating operation against one device. A single worker
// task drains a bounded FIFO queue; each task waits out the minimum gap
// since the previous task finished settling, runs, and on success holds
// the queue for its settle delay before answering its caller.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::time::Duration;

use futures_util::FutureExt as _;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{DEFAULT_MIN_COMMAND_GAP, DEFAULT_SETTLE};
use crate::error::CoreError;

const QUEUE_CAPACITY: usize = 64;

// ── ScheduleOptions ──────────────────────────────────────────────

/// Pacing for one scheduled task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleOptions {
    /// Diagnostic label used in logs.
    pub tag: String,
    /// Minimum time between the previous task settling and this one starting.
    pub min_gap: Duration,
    /// Pause after a successful operation before the next task may start.
    pub settle: Duration,
    /// Abort the operation if it runs longer than this.
    pub timeout: Option<Duration>,
}

impl ScheduleOptions {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            min_gap: DEFAULT_MIN_COMMAND_GAP,
            settle: DEFAULT_SETTLE,
            timeout: None,
        }
    }

    pub fn min_gap(mut self, min_gap: Duration) -> Self {
        self.min_gap = min_gap;
        self
    }

    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

// ── Queue plumbing ───────────────────────────────────────────────

/// Outcome of running one task: whether it succeeded, and the deferred
/// delivery of its result to the caller.
struct Completion {
    succeeded: bool,
    deliver: Box<dyn FnOnce() + Send>,
}

type PendingCompletion = Pin<Box<dyn Future<Output = Completion> + Send>>;
type Job = Box<dyn FnOnce() -> PendingCompletion + Send>;

struct QueuedTask {
    options: ScheduleOptions,
    job: Job,
}

// ── CommandScheduler ─────────────────────────────────────────────

/// FIFO, gap-enforcing executor for device writes.
///
/// At most one operation runs at a time. A task that fails, panics or
/// times out rejects only its own caller; the queue keeps draining.
pub struct CommandScheduler {
    tx: mpsc::Sender<QueuedTask>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CommandScheduler {
    /// Spawn the worker task. Cancelling `cancel` (or calling
    /// [`shutdown`](Self::shutdown)) stops it.
    pub fn spawn(cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let worker = tokio::spawn(worker_task(rx, cancel.clone()));
        Self {
            tx,
            cancel,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Enqueue `operation` and wait for its result.
    ///
    /// Resolves after the operation's settle delay on success, immediately
    /// on failure. Fails with [`CoreError::Disconnected`] once the scheduler
    /// has shut down.
    pub async fn schedule<T, F, Fut>(
        &self,
        options: ScheduleOptions,
        operation: F,
    ) -> Result<T, CoreError>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, CoreError>> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(CoreError::Disconnected);
        }

        let (response_tx, response_rx) = oneshot::channel();
        let tag = options.tag.clone();
        let limit = options.timeout;

        let job: Job = Box::new(move || -> PendingCompletion {
            Box::pin(async move {
                let result = run_guarded(&tag, limit, operation).await;
                Completion {
                    succeeded: result.is_ok(),
                    deliver: Box::new(move || {
                        let _ = response_tx.send(result);
                    }),
                }
            })
        });

        self.tx
            .send(QueuedTask { options, job })
            .await
            .map_err(|_| CoreError::Disconnected)?;

        response_rx.await.map_err(|_| CoreError::Disconnected)?
    }

    /// Stop the worker. Queued and future tasks fail with `Disconnected`.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.worker.lock().await.take() {
            let _ = handle.await;
        }
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

/// Run one operation with panic isolation and an optional time limit.
async fn run_guarded<T, F, Fut>(
    tag: &str,
    limit: Option<Duration>,
    operation: F,
) -> Result<T, CoreError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let guarded = AssertUnwindSafe(async move { operation().await }).catch_unwind();

    let outcome = match limit {
        Some(after) => match tokio::time::timeout(after, guarded).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(tag, ?after, "command timed out");
                return Err(CoreError::Timeout { after });
            }
        },
        None => guarded.await,
    };

    outcome.unwrap_or_else(|payload| {
        let reason = panic_message(payload.as_ref());
        warn!(tag, %reason, "command panicked");
        Err(CoreError::Internal(format!("command '{tag}' panicked: {reason}")))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

// ── Worker ───────────────────────────────────────────────────────

async fn worker_task(mut rx: mpsc::Receiver<QueuedTask>, cancel: CancellationToken) {
    let mut last_completed_at: Option<Instant> = None;

    loop {
        let task = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            task = rx.recv() => match task {
                Some(task) => task,
                None => break,
            },
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            stamp = run_task(task, last_completed_at) => last_completed_at = Some(stamp),
        }
    }

    debug!("command scheduler stopped");
}

/// Gate, run and settle one task. Returns the completion stamp.
async fn run_task(task: QueuedTask, last_completed_at: Option<Instant>) -> Instant {
    let QueuedTask { options, job } = task;

    if let Some(last) = last_completed_at {
        let elapsed = last.elapsed();
        if elapsed < options.min_gap {
            let wait = options.min_gap - elapsed;
            debug!(tag = %options.tag, wait_ms = wait.as_millis(), "command gate: waiting");
            tokio::time::sleep(wait).await;
        }
    }

    let completion = job().await;

    if completion.succeeded && !options.settle.is_zero() {
        debug!(tag = %options.tag, settle_ms = options.settle.as_millis(), "command settle");
        tokio::time::sleep(options.settle).await;
    }

    let stamp = Instant::now();
    (completion.deliver)();
    stamp
}
