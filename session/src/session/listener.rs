//! Inbound link worker.

use super::handle::{Cancellation, Generation};
use super::{Origin, Session, SessionError, SessionState};
use crate::peer::Peer;
use crate::transport::{close, Listener, Transport};
use log::{debug, warn};
use tokio::task::JoinHandle;

/// What the session made of an accepted link.
enum Inbound<S> {
    Adopted,
    /// Not wanted in the current state, keep listening.
    Rejected(S),
    /// This listener was cancelled while accepting.
    Stale(S),
}

/// Accept inbound links until one is adopted or the listener is cancelled.
///
/// `previous` is the task of the listener that last left the slot. It may
/// still hold the listening address, so it is waited on before listening.
pub(super) async fn run<T: Transport>(
    session: Session<T>,
    generation: Generation,
    mut cancellation: Cancellation,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        if let Err(e) = previous.await {
            debug!("Previous listener task failed: {e}");
        }
    }

    let mut listener = tokio::select! {
        _ = cancellation.cancelled() => {
            debug!("Listener {generation} cancelled before listening");
            return;
        }
        result = session.transport().listen() => match result {
            Ok(listener) => listener,
            Err(e) => {
                session.give_up_listening(generation, SessionError::AcceptFailed(e)).await;
                return;
            }
        },
    };
    debug!("Listener {generation} accepting inbound links");

    while session.state().await != SessionState::Connected {
        let accepted = tokio::select! {
            _ = cancellation.cancelled() => {
                debug!("Listener {generation} cancelled");
                return;
            }
            result = listener.accept() => result,
        };

        let (stream, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                session.give_up_listening(generation, SessionError::AcceptFailed(e)).await;
                return;
            }
        };

        match session.offer_inbound(generation, stream, peer).await {
            Inbound::Adopted => return,
            Inbound::Rejected(stream) => close(stream).await,
            Inbound::Stale(stream) => {
                debug!("Listener {generation} accepted after cancellation, closing link");
                close(stream).await;
                return;
            }
        }
    }

    session.release_listener(generation).await;
}

impl<T: Transport> Session<T> {
    /// Adopt or turn away an accepted link in one critical section.
    async fn offer_inbound(
        &self,
        generation: Generation,
        stream: T::Stream,
        peer: Peer,
    ) -> Inbound<T::Stream> {
        let mut core = self.inner.core.lock().await;
        if !core.owns_listener(generation) {
            return Inbound::Stale(stream);
        }

        match core.state {
            SessionState::Listening | SessionState::Connecting => {
                self.adopt(&mut core, Origin::Listener, stream, peer);
                Inbound::Adopted
            }
            SessionState::Idle | SessionState::Connected => {
                debug!("Rejecting inbound link from {peer} while {}", core.state);
                Inbound::Rejected(stream)
            }
        }
    }

    /// Empty the listener slot if this worker still owns it.
    async fn release_listener(&self, generation: Generation) {
        let mut core = self.inner.core.lock().await;
        if core.owns_listener(generation) {
            core.retire_listener();
        }
    }

    /// Release the slot after a listen or accept failure.
    ///
    /// A session that was only listening has nothing left to wait on and
    /// goes idle. A pending dial keeps the session connecting.
    async fn give_up_listening(&self, generation: Generation, error: SessionError) {
        let mut core = self.inner.core.lock().await;
        if !core.owns_listener(generation) {
            debug!("Listener {generation} closed after cancellation: {error}");
            return;
        }

        core.retire_listener();
        warn!("Listener {generation} stopped while {}: {error}", core.state);
        if core.state == SessionState::Listening {
            self.transition(&mut core, SessionState::Idle, None);
        }
    }
}
