//! Outbound link worker.

use super::handle::{self, Cancellation, Generation};
use super::{Origin, Session, SessionError, SessionEvent, SessionState};
use crate::peer::Peer;
use crate::transport::{close, Transport};
use log::{debug, warn};

/// Dial `peer` once and hand the link to the session.
pub(super) async fn run<T: Transport>(
    session: Session<T>,
    generation: Generation,
    mut cancellation: Cancellation,
    peer: Peer,
) {
    debug!("Initiator {generation} dialing {peer}");
    let dialed = tokio::select! {
        _ = cancellation.cancelled() => {
            debug!("Initiator {generation} cancelled");
            return;
        }
        result = session.transport().connect(&peer) => result,
    };

    match dialed {
        Ok(stream) => {
            if let Some(stream) = session.offer_outbound(generation, stream, peer).await {
                debug!("Initiator {generation} connected after cancellation, closing link");
                close(stream).await;
            }
        }
        Err(e) => {
            session
                .fail_connect(generation, &peer, SessionError::ConnectFailed(e))
                .await
        }
    }
}

impl<T: Transport> Session<T> {
    /// Adopt a dialed link, or give it back if this initiator is stale.
    async fn offer_outbound(
        &self,
        generation: Generation,
        stream: T::Stream,
        peer: Peer,
    ) -> Option<T::Stream> {
        let mut core = self.inner.core.lock().await;
        if !handle::owns(&core.initiator, generation) {
            return Some(stream);
        }

        self.adopt(&mut core, Origin::Initiator, stream, peer);
        None
    }

    async fn fail_connect(&self, generation: Generation, peer: &Peer, error: SessionError) {
        let mut core = self.inner.core.lock().await;
        if !handle::owns(&core.initiator, generation) {
            debug!("Initiator {generation} failed after cancellation: {error}");
            return;
        }

        core.initiator = None;
        warn!("Connecting to {peer} failed: {error}");
        self.inner.events.emit(SessionEvent::ConnectFailed);
        self.transition(&mut core, SessionState::Idle, None);
    }
}
