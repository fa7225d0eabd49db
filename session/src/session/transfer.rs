//! Adopted link worker.
//!
//! The link is split once on adoption. The read half belongs to the transfer
//! task. The write half is shared with [`Session::write`] so writes never wait
//! on a pending read. Releasing the transfer slot aborts any write in flight,
//! which frees the write half for the worker to close the link.

use super::handle::{Cancellation, Generation};
use super::{Session, SessionError, SessionEvent, SessionState, SharedWriter};
use crate::transport::Transport;
use log::{debug, warn};
use std::io;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf};
use tokio::sync::watch;

/// Read from the link until it fails or the worker is cancelled.
pub(super) async fn run<T: Transport>(
    session: Session<T>,
    generation: Generation,
    mut cancellation: Cancellation,
    mut reader: ReadHalf<T::Stream>,
    writer: SharedWriter<T::Stream>,
) {
    let mut buffer = vec![0u8; session.configuration().read_buffer_size];

    let failure = loop {
        let read = tokio::select! {
            _ = cancellation.cancelled() => break None,
            result = reader.read(&mut buffer) => result,
        };

        match read {
            Ok(0) => {
                break Some(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed the link",
                ))
            }
            Ok(n) => {
                if !session.deliver(generation, &buffer[..n]).await {
                    break None;
                }
            }
            Err(e) => break Some(e),
        }
    };

    drop(reader);

    // The slot must be empty before taking the write half, a blocked write
    // only lets go of it once the slot is released.
    match failure {
        Some(e) => session.lose_link(generation, SessionError::LinkLost(e)).await,
        None => debug!("Transfer {generation} cancelled, closing link"),
    }

    if let Err(e) = writer.lock().await.shutdown().await {
        debug!("Transfer {generation} error closing link: {e}");
    }
}

/// Write all of `bytes` and flush, unless the link is released first.
pub(super) async fn write<S: AsyncWrite>(
    writer: &SharedWriter<S>,
    mut closed: watch::Receiver<()>,
    bytes: &[u8],
) -> io::Result<()> {
    tokio::select! {
        _ = closed.changed() => Err(io::Error::new(
            io::ErrorKind::ConnectionAborted,
            "link released during write",
        )),
        result = async {
            let mut writer = writer.lock().await;
            writer.write_all(bytes).await?;
            writer.flush().await
        } => result,
    }
}

impl<T: Transport> Session<T> {
    /// Report received bytes if this worker still owns the link.
    async fn deliver(&self, generation: Generation, bytes: &[u8]) -> bool {
        let core = self.inner.core.lock().await;
        if !core.owns_transfer(generation) || core.state != SessionState::Connected {
            return false;
        }

        self.inner
            .events
            .emit(SessionEvent::DataReceived(bytes.to_vec()));
        true
    }

    /// Tear down after the link failed underneath a live transfer worker.
    ///
    /// A session that was connected goes back to listening.
    async fn lose_link(&self, generation: Generation, error: SessionError) {
        let mut core = self.inner.core.lock().await;
        if !core.owns_transfer(generation) {
            debug!("Transfer {generation} closed after cancellation: {error}");
            return;
        }

        core.transfer = None;
        let resume = core.state == SessionState::Connected;
        warn!("{error}");
        self.inner.events.emit(SessionEvent::ConnectionLost);
        self.transition(&mut core, SessionState::Idle, None);

        if resume {
            self.start_locked(&mut core);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{next_event, scripted_session_with, settle, state_changed};
    use super::*;
    use crate::peer::Peer;
    use crate::session::SessionConfiguration;
    use tokio_test::io::Builder as MockIoBuilder;

    #[tokio::test]
    async fn test_reads_until_link_closes() {
        let (session, mut events, remote) = scripted_session_with(SessionConfiguration::default());
        session.start().await;
        let mock = MockIoBuilder::new().read(b"ping").read(b"pong").build();
        remote.accept(mock, Peer::new("x"));
        next_event(&mut events).await;
        next_event(&mut events).await;

        let mut received = Vec::new();
        loop {
            match next_event(&mut events).await {
                SessionEvent::DataReceived(bytes) => received.extend(bytes),
                SessionEvent::ConnectionLost => break,
                other => panic!("Unexpected event {other:?}"),
            }
        }
        assert_eq!(received, b"pingpong");
        assert_eq!(next_event(&mut events).await, state_changed(SessionState::Idle, None));
        assert_eq!(next_event(&mut events).await, state_changed(SessionState::Listening, None));
    }

    #[tokio::test]
    async fn test_read_error_loses_link() {
        let (session, mut events, remote) = scripted_session_with(SessionConfiguration::default());
        session.start().await;
        let mock = MockIoBuilder::new()
            .read(b"x")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        remote.accept(mock, Peer::new("x"));
        next_event(&mut events).await;
        next_event(&mut events).await;

        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::DataReceived(b"x".to_vec())
        );
        assert_eq!(next_event(&mut events).await, SessionEvent::ConnectionLost);
        assert_eq!(next_event(&mut events).await, state_changed(SessionState::Idle, None));
        assert_eq!(next_event(&mut events).await, state_changed(SessionState::Listening, None));
    }

    #[tokio::test]
    async fn test_small_read_buffer_splits_delivery() {
        let (session, mut events, remote) =
            scripted_session_with(SessionConfiguration::new().with_read_buffer_size(2));
        session.start().await;
        let mock = MockIoBuilder::new().read(b"abcde").build();
        remote.accept(mock, Peer::new("x"));
        next_event(&mut events).await;
        next_event(&mut events).await;

        assert_eq!(next_event(&mut events).await, SessionEvent::DataReceived(b"ab".to_vec()));
        assert_eq!(next_event(&mut events).await, SessionEvent::DataReceived(b"cd".to_vec()));
        assert_eq!(next_event(&mut events).await, SessionEvent::DataReceived(b"e".to_vec()));
        assert_eq!(next_event(&mut events).await, SessionEvent::ConnectionLost);
    }

    #[tokio::test]
    async fn test_write_failure_is_returned_to_the_caller() {
        let (session, mut events, remote) = scripted_session_with(SessionConfiguration::default());
        session.start().await;
        let mock = MockIoBuilder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "broken"))
            .build();
        remote.accept(mock, Peer::new("x"));
        next_event(&mut events).await;
        next_event(&mut events).await;

        let result = session.write(b"late").await;
        assert!(matches!(result, Err(SessionError::WriteFailed(_))));

        settle().await;
        while let Ok(event) = events.try_recv() {
            assert!(
                !matches!(event, SessionEvent::DataSent(_)),
                "failed write was reported as sent"
            );
        }
    }
}
