//! Process-wide upstream request scheduler.
//!
//! # Responsibilities
//! - Cap concurrently executing upstream tasks at `max_concurrent`
//! - Dispatch strictly in enqueue order
//! - Hold each slot for `spacing` after its task completes, so a slow call
//!   throttles the next dispatch on that slot further
//!
//! # Design Decisions
//! - A single dispatcher task owns the queue; FIFO falls out of the channel
//! - Slots are semaphore permits, so the cap holds on a multi-threaded runtime
//! - Dispatched tasks run on their own Tokio task: a caller dropping its
//!   future never interrupts a dispatch or leaks a slot
//! - At most `max_queue` tasks wait for a slot; overflow fails fast with `QueueFull`

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit, Semaphore};

use crate::config::SchedulerConfig;
use crate::observability::metrics;

/// Why a task never produced a result.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("upstream queue is full ({0} pending)")]
    QueueFull(usize),

    #[error("scheduler is shut down")]
    Closed,

    #[error("scheduled task aborted before completing")]
    TaskAborted,
}

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

#[derive(Debug, Default)]
struct SchedulerStats {
    active: AtomicUsize,
    queued: AtomicUsize,
}

impl SchedulerStats {
    fn publish(&self) {
        metrics::record_scheduler(
            self.active.load(Ordering::SeqCst),
            self.queued.load(Ordering::SeqCst),
        );
    }
}

/// Decrements `active` even if the task panics.
struct ActiveGuard(Arc<SchedulerStats>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
        self.0.publish();
    }
}

/// FIFO, concurrency-capped, spaced executor for upstream calls.
#[derive(Clone)]
pub struct Scheduler {
    tx: mpsc::Sender<Job>,
    stats: Arc<SchedulerStats>,
    max_queue: usize,
}

impl Scheduler {
    /// Create the scheduler and spawn its dispatcher.
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &SchedulerConfig) -> Self {
        let max_queue = config.max_queue.max(1);
        let (tx, rx) = mpsc::channel(max_queue);
        let stats = Arc::new(SchedulerStats::default());
        let slots = Arc::new(Semaphore::new(config.max_concurrent.max(1)));

        tokio::spawn(dispatch_loop(rx, slots, config.spacing(), stats.clone()));

        tracing::info!(
            max_concurrent = config.max_concurrent,
            spacing_ms = config.spacing_ms,
            max_queue,
            "Upstream scheduler started"
        );

        Self { tx, stats, max_queue }
    }

    /// Run `task` once a slot is free and resolve with exactly its output.
    pub async fn schedule<F, Fut, T>(&self, task: F) -> Result<T, SchedulerError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            Box::pin(async move {
                let output = task().await;
                // The caller may have gone away; the result is simply discarded.
                let _ = result_tx.send(output);
            })
        });

        self.stats.queued.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.tx.try_send(job) {
            self.stats.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(match e {
                mpsc::error::TrySendError::Full(_) => {
                    tracing::warn!(max_queue = self.max_queue, "Upstream queue full");
                    SchedulerError::QueueFull(self.max_queue)
                }
                mpsc::error::TrySendError::Closed(_) => SchedulerError::Closed,
            });
        }
        self.stats.publish();

        result_rx.await.map_err(|_| SchedulerError::TaskAborted)
    }

    /// Tasks currently executing.
    pub fn active(&self) -> usize {
        self.stats.active.load(Ordering::SeqCst)
    }

    /// Tasks waiting for a slot.
    pub fn queued(&self) -> usize {
        self.stats.queued.load(Ordering::SeqCst)
    }
}

async fn dispatch_loop(
    mut rx: mpsc::Receiver<Job>,
    slots: Arc<Semaphore>,
    spacing: Duration,
    stats: Arc<SchedulerStats>,
) {
    loop {
        // Take the slot first so waiting jobs stay in the bounded channel.
        let permit = match slots.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let Some(job) = rx.recv().await else {
            break;
        };

        stats.queued.fetch_sub(1, Ordering::SeqCst);
        stats.active.fetch_add(1, Ordering::SeqCst);
        stats.publish();

        tokio::spawn(run_job(job, permit, spacing, stats.clone()));
    }
    tracing::debug!("Scheduler dispatcher stopped");
}

async fn run_job(job: Job, permit: OwnedSemaphorePermit, spacing: Duration, stats: Arc<SchedulerStats>) {
    {
        let _active = ActiveGuard(stats);
        job().await;
    }
    if !spacing.is_zero() {
        tokio::time::sleep(spacing).await;
    }
    drop(permit);
}
