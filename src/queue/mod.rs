//! Asynchronous trace task queue.
//!
//! [`TraceQueueManager::submit`] never blocks: it `try_send`s into a bounded
//! channel and rejects the task when the channel is full or closed. A worker
//! started with [`spawn_trace_worker`] drains the channel and delivers each
//! task on its own tokio task, at most `max_in_flight` at a time. Delivery
//! order is not guaranteed.

mod task;

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::QueueConfig;
use crate::error::{Result, TraceError};
use crate::observability::{
    FIELD_MESSAGE_ID, FIELD_PROVIDER, FIELD_TASK_ID, FIELD_TASK_KIND, SPAN_TRACE_DELIVER,
};

pub use task::{TimerWindow, TraceEvent, TraceTask, TraceTaskKind};

/// Accepts trace tasks for best-effort delivery.
pub trait TraceQueue: Send + Sync {
    /// Enqueue without waiting.
    ///
    /// # Errors
    ///
    /// Returns `TraceError::Queue` if the task was not accepted.
    fn submit(&self, task: TraceTask) -> Result<()>;
}

/// Bounded channel front of the trace worker.
#[derive(Clone)]
pub struct TraceQueueManager {
    tx: mpsc::Sender<TraceTask>,
}

impl TraceQueueManager {
    /// Create a manager and the receiver to hand to [`spawn_trace_worker`].
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TraceTask>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Create a manager sized by `[queue]` and start its worker.
    ///
    /// The worker stops when `cancel` fires or every manager clone is dropped.
    pub fn start(config: &QueueConfig, cancel: CancellationToken) -> (Self, JoinHandle<()>) {
        let (manager, rx) = Self::new(config.capacity);
        let worker = spawn_trace_worker(rx, config.max_in_flight, cancel);
        (manager, worker)
    }
}

impl TraceQueue for TraceQueueManager {
    fn submit(&self, task: TraceTask) -> Result<()> {
        let task_id = task.id;
        self.tx.try_send(task).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                TraceError::Queue(format!("trace queue full, dropped task {task_id}"))
            }
            mpsc::error::TrySendError::Closed(_) => {
                TraceError::Queue(format!("trace queue closed, dropped task {task_id}"))
            }
        })?;
        debug!(task_id = %task_id, "trace task queued");
        Ok(())
    }
}

/// Drain `rx` until it closes or `cancel` fires.
///
/// Tasks already handed to a delivery task finish on their own. Cancellation
/// stops pulling new ones, including one still waiting for a free slot.
pub fn spawn_trace_worker(
    mut rx: mpsc::Receiver<TraceTask>,
    max_in_flight: usize,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let permits = Arc::new(Semaphore::new(max_in_flight.max(1)));
    tokio::spawn(async move {
        info!(max_in_flight, "trace worker started");
        loop {
            let task = tokio::select! {
                _ = cancel.cancelled() => break,
                next = rx.recv() => match next {
                    Some(task) => task,
                    None => break,
                },
            };

            let permit = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(task_id = %task.id, "trace task dropped on shutdown");
                    break;
                }
                acquired = permits.clone().acquire_owned() => match acquired {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };

            let span = info_span!(
                SPAN_TRACE_DELIVER,
                { FIELD_TASK_ID } = %task.id,
                { FIELD_TASK_KIND } = task.kind.as_str(),
                { FIELD_PROVIDER } = %task.client.provider(),
                { FIELD_MESSAGE_ID } = %task.message_id,
            );
            tokio::spawn(
                async move {
                    let _permit = permit;
                    match task.client.send(&task).await {
                        Ok(()) => debug!("trace task delivered"),
                        Err(e) => warn!(error = %e, "trace task delivery failed"),
                    }
                }
                .instrument(span),
            );
        }
        info!("trace worker stopped");
    })
}
