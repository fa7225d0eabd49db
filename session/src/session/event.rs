//! Notifications from a session to its owner.
//!
//! Events are queued on an unbounded channel. Queuing never waits on the
//! consumer, so the session can queue state changes from inside its critical
//! section and the consumer still never runs under the session's lock. State
//! changes arrive in the order they took effect. Data events arrive in the
//! order their worker produced them, with no ordering promise across workers.

use super::state::SessionState;
use crate::peer::Peer;
use log::trace;
use std::fmt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Messages sent from a [`Session`](super::Session) to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session entered a new state.
    ///
    /// `peer` is only set for [`SessionState::Connected`].
    StateChanged {
        state: SessionState,
        peer: Option<Peer>,
    },
    /// An outbound dial failed, the session went back to idle.
    ConnectFailed,
    /// The adopted link dropped without the session being stopped.
    ConnectionLost,
    /// Bytes read from the link, exactly as received.
    DataReceived(Vec<u8>),
    /// Bytes successfully written to the link.
    DataSent(Vec<u8>),
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEvent::StateChanged {
                state: SessionState::Connected,
                peer: Some(peer),
            } => write!(f, "connected to {}", peer.display_name()),
            SessionEvent::StateChanged { state, .. } => match state {
                SessionState::Idle => write!(f, "not connected"),
                SessionState::Listening => write!(f, "listening"),
                SessionState::Connecting => write!(f, "connecting..."),
                SessionState::Connected => write!(f, "connected"),
            },
            SessionEvent::ConnectFailed => write!(f, "unable to connect to peer"),
            SessionEvent::ConnectionLost => write!(f, "peer connection was lost"),
            SessionEvent::DataReceived(bytes) => write!(f, "received {} bytes", bytes.len()),
            SessionEvent::DataSent(bytes) => write!(f, "sent {} bytes", bytes.len()),
        }
    }
}

/// Queue side of the event channel, owned by the session.
#[derive(Debug, Clone)]
pub(crate) struct EventSender(mpsc::UnboundedSender<SessionEvent>);

impl EventSender {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventSender(tx), rx)
    }

    /// Queue an event without waiting.
    pub(crate) fn emit(&self, event: SessionEvent) {
        if let Err(mpsc::error::SendError(event)) = self.0.send(event) {
            trace!("Event receiver dropped, discarding: {event}");
        }
    }
}

/// Callback interface for session events.
///
/// Every method has an empty default, implement the ones of interest. See
/// [`dispatch`] for how callbacks are driven.
pub trait EventSink: Send + 'static {
    /// The session entered `state`, `peer` is set when connected.
    fn on_state_changed(&mut self, _state: SessionState, _peer: Option<&Peer>) {}

    /// An outbound dial failed.
    fn on_connect_failed(&mut self) {}

    /// The adopted link dropped unexpectedly.
    fn on_connection_lost(&mut self) {}

    /// Bytes arrived from the peer.
    fn on_data_received(&mut self, _bytes: &[u8]) {}

    /// Bytes were written to the peer.
    fn on_data_sent(&mut self, _bytes: &[u8]) {}
}

/// Drive an [`EventSink`] from a session's event receiver.
///
/// The sink runs on its own task, never on a worker and never under the
/// session's lock. The task ends once the session and all of its workers are
/// gone, handing the sink back.
pub fn dispatch<S>(mut events: mpsc::UnboundedReceiver<SessionEvent>, mut sink: S) -> JoinHandle<S>
where
    S: EventSink,
{
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::StateChanged { state, peer } => {
                    sink.on_state_changed(state, peer.as_ref())
                }
                SessionEvent::ConnectFailed => sink.on_connect_failed(),
                SessionEvent::ConnectionLost => sink.on_connection_lost(),
                SessionEvent::DataReceived(bytes) => sink.on_data_received(&bytes),
                SessionEvent::DataSent(bytes) => sink.on_data_sent(&bytes),
            }
        }
        sink
    })
}
