//! Worker ownership slots.
//!
//! Each worker the session spawns is identified by a [`Generation`], unique
//! for the lifetime of the session. The session keeps a [`WorkerHandle`] in
//! the worker's slot while the worker is live, and the worker keeps the
//! matching [`Cancellation`]. Emptying the slot, by [`WorkerHandle::cancel`]
//! or simply dropping the handle, resolves the cancellation.
//!
//! A worker only ever acts on shared state after checking that its own
//! generation still owns its slot. A newer worker in the same slot always has
//! a different generation, so a stale worker can never clear or overwrite it.

use std::fmt;
use tokio::sync::oneshot;

/// Identifies one spawned worker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct Generation(u64);

impl Generation {
    /// The generation after this one.
    pub(crate) fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl Default for Generation {
    fn default() -> Self {
        Generation(1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The session's side of a live worker.
#[derive(Debug)]
pub(crate) struct WorkerHandle {
    generation: Generation,
    cancel: oneshot::Sender<()>,
}

impl WorkerHandle {
    /// Create a handle and the cancellation signal to move into the worker.
    pub(crate) fn new(generation: Generation) -> (Self, Cancellation) {
        let (cancel, receiver) = oneshot::channel();
        (
            WorkerHandle { generation, cancel },
            Cancellation {
                receiver,
                cancelled: false,
            },
        )
    }

    pub(crate) fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether this handle belongs to the worker of `generation`.
    pub(crate) fn owns(&self, generation: Generation) -> bool {
        self.generation == generation
    }

    /// Request cancellation. The worker winds down on its own task.
    pub(crate) fn cancel(self) {
        // Worker already finished if the receiver is gone.
        let _ = self.cancel.send(());
    }
}

/// The worker's side of its handle.
#[derive(Debug)]
pub(crate) struct Cancellation {
    receiver: oneshot::Receiver<()>,
    cancelled: bool,
}

impl Cancellation {
    /// Resolves once the handle is cancelled or dropped.
    ///
    /// Safe to call again after it has resolved.
    pub(crate) async fn cancelled(&mut self) {
        if !self.cancelled {
            // Both a cancel and a dropped handle release the worker.
            let _ = (&mut self.receiver).await;
            self.cancelled = true;
        }
    }
}

/// Whether the slot currently holds the worker of `generation`.
pub(crate) fn owns(slot: &Option<WorkerHandle>, generation: Generation) -> bool {
    slot.as_ref().is_some_and(|handle| handle.owns(generation))
}
