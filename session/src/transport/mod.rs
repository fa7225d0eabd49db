//! Link transports.
//!
//! A transport knows how to produce links, bidirectional byte streams to a
//! single remote peer, either by waiting for a peer to dial in ([`Listener`])
//! or by dialing out ([`Transport::connect`]). The session never looks inside
//! the bytes. It only needs the stream to be [`AsyncRead`] + [`AsyncWrite`].
//!
//! Two implementations ship with the crate.
//!
//! * [`TcpTransport`] - Links over TCP, one server socket per listener.
//! * [`MemoryTransport`] - In-process links over [`tokio::io::duplex`] pipes.
//!
//! # Cancellation
//!
//! Accept, connect and read are plain futures. The session cancels a pending
//! call by dropping its future, which also drops any half-open socket it owns.
//! Implementations therefore must not rely on being polled to completion.

mod memory;
mod tcp;

pub use memory::{MemoryListener, MemoryNetwork, MemoryTransport, DEFAULT_MEMORY_BUFFER_SIZE};
pub use tcp::{TcpListener, TcpTransport, DEFAULT_CONNECT_TIMEOUT};

use crate::peer::Peer;
use log::debug;
use std::future::Future;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// Produces links to remote peers.
pub trait Transport: Send + Sync + 'static {
    /// The link type produced by both accepting and dialing.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;
    /// Server side handle which accepts inbound links.
    type Listener: Listener<Stream = Self::Stream>;

    /// Open a new listener for inbound links.
    ///
    /// The listener lives until it is dropped, which must release the
    /// underlying server resource so that a later call can listen again.
    fn listen(&self) -> impl Future<Output = io::Result<Self::Listener>> + Send;

    /// Dial the peer and wait until the link is established.
    fn connect(&self, peer: &Peer) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Accepts inbound links.
pub trait Listener: Send + 'static {
    /// The link type handed out for each accepted peer.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Wait for the next inbound link along with the identity of the peer.
    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Stream, Peer)>> + Send;
}

/// Close a link that will not be used.
///
/// Shutting down first lets the remote end see a clean end-of-stream before
/// the stream is dropped.
pub(crate) async fn close<S>(mut stream: S)
where
    S: AsyncWrite + Unpin,
{
    if let Err(e) = stream.shutdown().await {
        debug!("Error while closing link: {e}");
    }
}
