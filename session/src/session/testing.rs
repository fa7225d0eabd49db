//! Scripted transport for driving the workers from unit tests.
//!
//! Tests push inbound links and dial outcomes through a [`Remote`], the
//! session's workers pick them up through a [`ScriptedTransport`].

use super::{Session, SessionConfiguration, SessionEvent, SessionState};
use crate::peer::Peer;
use crate::transport::{Listener, Transport};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::timeout;

type Accepted<S> = io::Result<(S, Peer)>;
type Dials<S> = Arc<std::sync::Mutex<HashMap<String, oneshot::Receiver<io::Result<S>>>>>;

pub(crate) struct ScriptedTransport<S> {
    inbound: Arc<Mutex<mpsc::UnboundedReceiver<Accepted<S>>>>,
    dials: Dials<S>,
    listens: Arc<AtomicUsize>,
}

pub(crate) struct ScriptedListener<S> {
    inbound: Arc<Mutex<mpsc::UnboundedReceiver<Accepted<S>>>>,
}

/// The test's end of a [`ScriptedTransport`].
pub(crate) struct Remote<S> {
    inbound: mpsc::UnboundedSender<Accepted<S>>,
    dials: Dials<S>,
    listens: Arc<AtomicUsize>,
}

impl<S> Remote<S> {
    /// Hand an inbound link to whichever listener accepts next.
    pub(crate) fn accept(&self, stream: S, peer: Peer) {
        self.inbound
            .send(Ok((stream, peer)))
            .expect("transport dropped");
    }

    /// Fail the next accept.
    pub(crate) fn fail_accept(&self, kind: io::ErrorKind) {
        self.inbound
            .send(Err(kind.into()))
            .expect("transport dropped");
    }

    /// Script the outcome of dialing `address`.
    ///
    /// The dial stays pending until the returned sender resolves it. Dropping
    /// the sender fails the dial. Dialing an unscripted address is refused.
    pub(crate) fn dial(&self, address: &str) -> oneshot::Sender<io::Result<S>> {
        let (tx, rx) = oneshot::channel();
        self.dials
            .lock()
            .expect("dials poisoned")
            .insert(address.to_string(), rx);
        tx
    }

    /// Number of times the transport has been asked to listen.
    pub(crate) fn listens(&self) -> usize {
        self.listens.load(Ordering::SeqCst)
    }
}

impl<S> Transport for ScriptedTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Stream = S;
    type Listener = ScriptedListener<S>;

    async fn listen(&self) -> io::Result<ScriptedListener<S>> {
        self.listens.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedListener {
            inbound: Arc::clone(&self.inbound),
        })
    }

    async fn connect(&self, peer: &Peer) -> io::Result<S> {
        let dial = self
            .dials
            .lock()
            .expect("dials poisoned")
            .remove(&peer.address);
        match dial {
            Some(outcome) => outcome
                .await
                .unwrap_or_else(|_| Err(io::ErrorKind::ConnectionAborted.into())),
            None => Err(io::ErrorKind::ConnectionRefused.into()),
        }
    }
}

impl<S> Listener for ScriptedListener<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Stream = S;

    async fn accept(&mut self) -> Accepted<S> {
        self.inbound
            .lock()
            .await
            .recv()
            .await
            .unwrap_or_else(|| Err(io::ErrorKind::ConnectionAborted.into()))
    }
}

pub(crate) type Scripted<S> = (
    Session<ScriptedTransport<S>>,
    mpsc::UnboundedReceiver<SessionEvent>,
    Remote<S>,
);

/// A session over duplex pipes with the default configuration.
pub(crate) fn scripted_session() -> Scripted<DuplexStream> {
    scripted_session_with(SessionConfiguration::default())
}

pub(crate) fn scripted_session_with<S>(configuration: SessionConfiguration) -> Scripted<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let dials = Dials::default();
    let listens = Arc::new(AtomicUsize::new(0));
    let transport = ScriptedTransport {
        inbound: Arc::new(Mutex::new(rx)),
        dials: Arc::clone(&dials),
        listens: Arc::clone(&listens),
    };
    let remote = Remote {
        inbound: tx,
        dials,
        listens,
    };
    let (session, events) = Session::new(transport, configuration);
    (session, events, remote)
}

pub(crate) fn state_changed(state: SessionState, peer: Option<Peer>) -> SessionEvent {
    SessionEvent::StateChanged { state, peer }
}

pub(crate) async fn next_event(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("event channel closed")
}

/// Let every spawned worker run until it blocks.
pub(crate) async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

pub(crate) fn assert_quiet(events: &mut mpsc::UnboundedReceiver<SessionEvent>) {
    if let Ok(event) = events.try_recv() {
        panic!("Unexpected event {event:?}");
    }
}

/// Which of the listener, initiator and transfer slots are occupied.
pub(crate) async fn slots<T: Transport>(session: &Session<T>) -> (bool, bool, bool) {
    let core = session.inner.core.lock().await;
    (
        core.listener.is_some(),
        core.initiator.is_some(),
        core.transfer.is_some(),
    )
}

/// Connected exactly when a transfer worker owns a link, and a peer is only
/// known while connected.
pub(crate) async fn assert_consistent<T: Transport>(session: &Session<T>) {
    let core = session.inner.core.lock().await;
    assert_eq!(core.state.is_connected(), core.transfer.is_some());
    assert_eq!(core.state.is_connected(), core.peer.is_some());
}
