// ControlQueue - Marshals work from foreign threads onto the control thread
//
// The engine emits notifications and the load worker completes on threads the
// shell does not own. Anything that touches window, menu or presentation state
// is posted here as a closure and executed by the control thread's own loop,
// in submission order.
//
// The queue provides:
// - FIFO posting of `FnOnce(&mut T)` tasks from any thread
// - A coalesced refresh request (of several queued refreshes only the newest runs)
// - A check for "am I on the control thread?"

use crate::metrics::Metrics;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::ThreadId;
use thiserror::Error;
use tokio::sync::mpsc;

/// Work scheduled onto the control thread
pub type ControlTask<T> = Box<dyn FnOnce(&mut T) -> anyhow::Result<()> + Send>;

/// Errors that can occur when posting to the control queue
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The control loop has shut down and no longer drains the queue
    #[error("Control queue is closed")]
    QueueClosed,
}

/// Owner of the control thread's state, able to re-derive its menus.
pub trait ControlOwner: 'static {
    fn refresh(&mut self) -> anyhow::Result<()>;
}

/// Receiving end of the control queue, drained by the control thread.
///
/// Must be created on the control thread: the creating thread is recorded
/// and reported by [`ControlHandle::is_control_thread`].
pub struct ControlQueue<T> {
    task_rx: mpsc::UnboundedReceiver<ControlTask<T>>,
    handle: ControlHandle<T>,
}

impl<T: ControlOwner> ControlQueue<T> {
    pub fn new() -> Self {
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        Self {
            task_rx,
            handle: ControlHandle {
                task_tx,
                control_thread: std::thread::current().id(),
                refresh_generation: Arc::new(AtomicU64::new(0)),
            },
        }
    }

    /// Clone a handle for posting from other threads
    pub fn handle(&self) -> ControlHandle<T> {
        self.handle.clone()
    }

    /// Next task if one is ready, without waiting
    pub fn try_next(&mut self) -> Option<ControlTask<T>> {
        self.task_rx.try_recv().ok()
    }

    /// Wait for the next task.
    ///
    /// Never returns `None` while the queue itself holds a sender.
    pub async fn next(&mut self) -> Option<ControlTask<T>> {
        self.task_rx.recv().await
    }

    /// Run one task against `owner`, isolating errors and panics.
    ///
    /// # Returns
    /// `true` if the task completed without error
    pub fn execute(task: ControlTask<T>, owner: &mut T, metrics: &Metrics) -> bool {
        let succeeded = match catch_unwind(AssertUnwindSafe(|| task(owner))) {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::error!("Control task failed: {:#}", e);
                false
            }
            Err(_) => {
                tracing::error!("Control task panicked");
                false
            }
        };
        metrics.record_control_task(succeeded);
        succeeded
    }
}

impl<T: ControlOwner> Default for ControlQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable, thread-safe posting end of a [`ControlQueue`]
pub struct ControlHandle<T> {
    task_tx: mpsc::UnboundedSender<ControlTask<T>>,
    control_thread: ThreadId,
    refresh_generation: Arc<AtomicU64>,
}

// Manual Clone implementation to avoid requiring T: Clone
impl<T> Clone for ControlHandle<T> {
    fn clone(&self) -> Self {
        Self {
            task_tx: self.task_tx.clone(),
            control_thread: self.control_thread,
            refresh_generation: self.refresh_generation.clone(),
        }
    }
}

impl<T: ControlOwner> ControlHandle<T> {
    /// Schedule `task` on the control thread after everything already queued.
    pub fn post<F>(&self, task: F) -> Result<(), BridgeError>
    where
        F: FnOnce(&mut T) -> anyhow::Result<()> + Send + 'static,
    {
        self.task_tx
            .send(Box::new(task))
            .map_err(|_| BridgeError::QueueClosed)
    }

    /// Ask the control thread to refresh.
    ///
    /// Every request queues a refresh behind the tasks already posted, so the
    /// refresh always observes them. A queued refresh that has been superseded
    /// by a newer request skips itself when it runs.
    pub fn request_refresh(&self) -> Result<(), BridgeError> {
        let generation = self.refresh_generation.fetch_add(1, Ordering::AcqRel) + 1;
        let latest = self.refresh_generation.clone();

        self.post(move |owner: &mut T| {
            if latest.load(Ordering::Acquire) != generation {
                tracing::trace!("Refresh {} superseded", generation);
                return Ok(());
            }
            owner.refresh()
        })
    }

    pub fn is_control_thread(&self) -> bool {
        std::thread::current().id() == self.control_thread
    }

    pub fn is_closed(&self) -> bool {
        self.task_tx.is_closed()
    }
}
