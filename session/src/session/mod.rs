//! Single-link session coordination.
//!
//! A [`Session`] manages at most one point-to-point link at a time over a
//! [`Transport`] where either side may initiate. Three kinds of workers run as
//! tasks on the tokio runtime.
//!
//! * **Listener** - Accepts inbound links while the session is not connected.
//! * **Initiator** - Performs a single outbound dial.
//! * **Transfer** - Owns the adopted link, reads from it until it fails or the
//!   session moves on, and carries writes.
//!
//! The session owns one slot per worker kind plus the [`SessionState`], all
//! behind a single lock. Workers never touch each other's slots. Whichever of
//! the listener or initiator produces a link first hands it to the session,
//! which *adopts* it. Adopting cancels every other worker, moves the state to
//! [`SessionState::Connected`] and spawns the transfer worker, all in one
//! critical section. A link arriving from a worker that has already been
//! cancelled is closed instead.
//!
//! Lifecycle calls ([`start`](Session::start), [`stop`](Session::stop),
//! [`connect`](Session::connect)) only hold the lock long enough to swap
//! workers and return right away. Transport I/O never happens under the lock.
//!
//! # Example
//!
//! An echo peer on an in-memory network.
//!
//! ```
//! use peerlink_session::{
//!     MemoryNetwork, MemoryTransport, Peer, Session, SessionConfiguration, SessionEvent,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let network = MemoryNetwork::new();
//! let transport = MemoryTransport::new(&network, Peer::new("alice").with_name("Alice"));
//! let (session, mut events) = Session::new(transport, SessionConfiguration::default());
//!
//! // Wait for a peer to dial in.
//! session.start().await;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SessionEvent::StateChanged { state, peer } => println!("{state}: {peer:?}"),
//!         SessionEvent::DataReceived(bytes) => session.write(&bytes).await?,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod configuration;
mod error;
mod event;
mod handle;
mod initiator;
mod listener;
mod state;
#[cfg(test)]
mod testing;
mod transfer;

pub use configuration::{SessionConfiguration, DEFAULT_READ_BUFFER_SIZE};
pub use error::SessionError;
pub use event::{dispatch, EventSink, SessionEvent};
pub use state::SessionState;

use crate::peer::Peer;
use crate::transport::Transport;
use event::EventSender;
use handle::{Generation, WorkerHandle};
use log::{debug, info};
use std::fmt;
use std::sync::Arc;
use tokio::io::WriteHalf;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

/// Write half of the adopted link, shared by the transfer worker and writers.
type SharedWriter<S> = Arc<Mutex<WriteHalf<S>>>;

/// Slot contents for the live listener.
struct ListenerHandle {
    worker: WorkerHandle,
    task: JoinHandle<()>,
}

/// Slot contents for the live transfer worker.
struct TransferHandle<S> {
    worker: WorkerHandle,
    writer: SharedWriter<S>,
    /// Handed to writers, resolves once this handle is dropped.
    closed: watch::Receiver<()>,
    _closing: watch::Sender<()>,
}

/// The worker a link being adopted came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Listener,
    Initiator,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Listener => write!(f, "listener"),
            Origin::Initiator => write!(f, "initiator"),
        }
    }
}

/// Everything guarded by the session lock.
struct Core<S> {
    state: SessionState,
    /// Peer of the adopted link, only set while connected.
    peer: Option<Peer>,
    next_generation: Generation,
    listener: Option<ListenerHandle>,
    /// Last listener task to leave the slot. The next listener waits for it
    /// before listening, so two listeners never hold the address at once.
    retired_listener: Option<JoinHandle<()>>,
    initiator: Option<WorkerHandle>,
    transfer: Option<TransferHandle<S>>,
}

impl<S> Core<S> {
    fn new() -> Self {
        Core {
            state: SessionState::Idle,
            peer: None,
            next_generation: Generation::default(),
            listener: None,
            retired_listener: None,
            initiator: None,
            transfer: None,
        }
    }

    fn next_generation(&mut self) -> Generation {
        let generation = self.next_generation;
        self.next_generation = generation.next();
        generation
    }

    fn owns_transfer(&self, generation: Generation) -> bool {
        self.transfer
            .as_ref()
            .is_some_and(|transfer| transfer.worker.owns(generation))
    }

    fn owns_listener(&self, generation: Generation) -> bool {
        self.listener
            .as_ref()
            .is_some_and(|listener| listener.worker.owns(generation))
    }

    /// Empty the listener slot, keeping its task for the next listener.
    fn retire_listener(&mut self) -> Option<WorkerHandle> {
        let listener = self.listener.take()?;
        self.retired_listener = Some(listener.task);
        Some(listener.worker)
    }

    fn cancel_listener(&mut self) {
        if let Some(listener) = self.retire_listener() {
            debug!("Cancelling listener {}", listener.generation());
            listener.cancel();
        }
    }

    fn cancel_initiator(&mut self) {
        if let Some(initiator) = self.initiator.take() {
            debug!("Cancelling initiator {}", initiator.generation());
            initiator.cancel();
        }
    }

    fn cancel_transfer(&mut self) {
        if let Some(transfer) = self.transfer.take() {
            debug!("Cancelling transfer {}", transfer.worker.generation());
            transfer.worker.cancel();
        }
    }
}

struct Inner<T: Transport> {
    transport: T,
    configuration: SessionConfiguration,
    events: EventSender,
    core: Mutex<Core<T::Stream>>,
}

/// Coordinates the lifecycle of a single link to a peer.
///
/// Cloning is cheap and every clone drives the same session. Workers hold a
/// clone too, so the session lives until it is stopped and its workers have
/// wound down. Call [`Session::stop`] when done with it.
pub struct Session<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for Session<T> {
    fn clone(&self) -> Self {
        Session {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self
            .inner
            .core
            .try_lock()
            .map(|core| core.state.to_string())
            .unwrap_or_else(|_| "<locked>".to_string());

        f.debug_struct("Session")
            .field("state", &state)
            .field("configuration", &self.inner.configuration)
            .finish()
    }
}

impl<T: Transport> Session<T> {
    /// Create an idle session over `transport`.
    ///
    /// # Returns
    ///
    /// The session and the receiver for its [`SessionEvent`]s. Dropping the
    /// receiver is fine, events are then discarded.
    pub fn new(
        transport: T,
        configuration: SessionConfiguration,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = EventSender::channel();
        let session = Session {
            inner: Arc::new(Inner {
                transport,
                configuration,
                events,
                core: Mutex::new(Core::new()),
            }),
        };
        (session, rx)
    }

    /// Start listening for inbound links.
    ///
    /// Cancels any outbound dial and drops any adopted link, then moves to
    /// [`SessionState::Listening`]. A listener that is already running is
    /// kept, so calling this repeatedly never stacks listeners.
    pub async fn start(&self) {
        let mut core = self.inner.core.lock().await;
        info!("Starting session");
        self.start_locked(&mut core);
    }

    /// Stop every worker and return to [`SessionState::Idle`].
    ///
    /// The state changes first so a worker racing with the stop sees it. Safe
    /// to call any number of times.
    pub async fn stop(&self) {
        let mut core = self.inner.core.lock().await;
        info!("Stopping session");
        self.transition(&mut core, SessionState::Idle, None);
        core.cancel_initiator();
        core.cancel_transfer();
        core.cancel_listener();
    }

    /// Dial `peer`.
    ///
    /// Cancels any earlier dial and drops any adopted link. A running listener
    /// is left alone, so a peer dialing in may still win. A failed dial is
    /// reported as [`SessionEvent::ConnectFailed`] and is not retried.
    pub async fn connect(&self, peer: Peer) {
        let mut core = self.inner.core.lock().await;
        info!("Connecting to {peer}");
        core.cancel_initiator();
        core.cancel_transfer();
        self.spawn_initiator(&mut core, peer);
        self.transition(&mut core, SessionState::Connecting, None);
    }

    /// Write `bytes` to the connected peer.
    ///
    /// Silently does nothing unless the session is connected, or if `bytes`
    /// is empty. The write itself happens outside the session lock, so a slow
    /// link never holds up lifecycle changes. Releasing the link (`stop`,
    /// `start`, `connect`, another adoption or link loss) aborts a write still
    /// in progress. On success a [`SessionEvent::DataSent`] echoes the bytes,
    /// as long as the link they went out on is still the session's link.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The bytes were written, or the write was dropped.
    /// * `Err(SessionError::WriteFailed)` - The link rejected the write or was
    ///   released while writing.
    pub async fn write(&self, bytes: &[u8]) -> Result<(), SessionError> {
        if bytes.is_empty() {
            return Ok(());
        }

        let (generation, writer, closed) = {
            let core = self.inner.core.lock().await;
            match (core.state, core.transfer.as_ref()) {
                (SessionState::Connected, Some(transfer)) => (
                    transfer.worker.generation(),
                    Arc::clone(&transfer.writer),
                    transfer.closed.clone(),
                ),
                _ => {
                    debug!("Dropping {} byte write while {}", bytes.len(), core.state);
                    return Ok(());
                }
            }
        };

        transfer::write(&writer, closed, bytes)
            .await
            .map_err(SessionError::WriteFailed)?;

        let core = self.inner.core.lock().await;
        if core.owns_transfer(generation) {
            self.inner
                .events
                .emit(SessionEvent::DataSent(bytes.to_vec()));
        } else {
            debug!("Write on released transfer {generation} finished, not reported");
        }
        Ok(())
    }

    /// Get a copy of the current state.
    pub async fn state(&self) -> SessionState {
        self.inner.core.lock().await.state
    }

    /// Get a copy of the connected peer, if any.
    pub async fn peer(&self) -> Option<Peer> {
        self.inner.core.lock().await.peer.clone()
    }

    /// The configuration the session was built with.
    pub fn configuration(&self) -> &SessionConfiguration {
        &self.inner.configuration
    }

    /// The transport links are produced with.
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Change state and queue the notification, under the lock.
    fn transition(&self, core: &mut Core<T::Stream>, state: SessionState, peer: Option<Peer>) {
        debug!("Session {} -> {}", core.state, state);
        core.state = state;
        core.peer = peer.clone();
        self.inner
            .events
            .emit(SessionEvent::StateChanged { state, peer });
    }

    fn start_locked(&self, core: &mut Core<T::Stream>) {
        core.cancel_initiator();
        core.cancel_transfer();
        self.transition(core, SessionState::Listening, None);

        match &core.listener {
            Some(listener) => debug!(
                "Listener {} already running",
                listener.worker.generation()
            ),
            None => self.spawn_listener(core),
        }
    }

    fn spawn_listener(&self, core: &mut Core<T::Stream>) {
        let generation = core.next_generation();
        let (worker, cancellation) = WorkerHandle::new(generation);
        let previous = core.retired_listener.take();
        let task = tokio::spawn(listener::run(
            self.clone(),
            generation,
            cancellation,
            previous,
        ));
        core.listener = Some(ListenerHandle { worker, task });
    }

    fn spawn_initiator(&self, core: &mut Core<T::Stream>, peer: Peer) {
        let generation = core.next_generation();
        let (handle, cancellation) = WorkerHandle::new(generation);
        core.initiator = Some(handle);
        tokio::spawn(initiator::run(self.clone(), generation, cancellation, peer));
    }

    fn spawn_transfer(&self, core: &mut Core<T::Stream>, stream: T::Stream) {
        let generation = core.next_generation();
        let (handle, cancellation) = WorkerHandle::new(generation);
        let (reader, writer) = tokio::io::split(stream);
        let writer = Arc::new(Mutex::new(writer));
        let (closing, closed) = watch::channel(());
        core.transfer = Some(TransferHandle {
            worker: handle,
            writer: Arc::clone(&writer),
            closed,
            _closing: closing,
        });
        tokio::spawn(transfer::run(
            self.clone(),
            generation,
            cancellation,
            reader,
            writer,
        ));
    }

    /// Install `stream` as the session's only link.
    ///
    /// The caller holds the lock and has already checked that the originating
    /// worker is still live. The originating slot is only emptied, since its
    /// worker is handing over the link rather than being cancelled. Every
    /// other worker is cancelled. The state is connected and the transfer
    /// worker owns the link before the lock is released.
    fn adopt(&self, core: &mut Core<T::Stream>, origin: Origin, stream: T::Stream, peer: Peer) {
        match origin {
            Origin::Listener => {
                core.retire_listener();
                core.cancel_initiator();
            }
            Origin::Initiator => {
                core.initiator = None;
                core.cancel_listener();
            }
        }
        core.cancel_transfer();

        info!("Adopted link to {peer} from {origin}");
        self.transition(core, SessionState::Connected, Some(peer));
        self.spawn_transfer(core, stream);
    }
}
