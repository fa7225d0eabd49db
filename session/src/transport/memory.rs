//! In-process links.
//!
//! A [`MemoryNetwork`] is a registry of listening endpoints keyed by address.
//! Every [`MemoryTransport`] attached to the same network can dial every other
//! one. Dialing behaves like a short range radio link rather than TCP: the
//! dial only completes once the remote listener accepts it, and there is no
//! backlog for endpoints that are not listening.

use super::{Listener, Transport};
use crate::peer::Peer;
use log::debug;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use tokio::io::DuplexStream;
use tokio::sync::{mpsc, oneshot, Mutex};

/// Default capacity of each direction of an in-memory link.
pub const DEFAULT_MEMORY_BUFFER_SIZE: usize = 1024;

/// A pending dial waiting for the remote listener.
#[derive(Debug)]
struct ConnectionRequest {
    /// Identity of the dialing endpoint.
    from: Peer,
    /// Receives the dialer's half of the link once accepted.
    reply: oneshot::Sender<DuplexStream>,
}

/// Registry of in-process endpoints.
///
/// Cloning is cheap, clones share the same registry.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    endpoints: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<ConnectionRequest>>>>,
}

impl MemoryNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listening endpoint, replacing any older one on the address.
    async fn register(&self, address: &str) -> mpsc::UnboundedReceiver<ConnectionRequest> {
        let (tx, rx) = mpsc::unbounded_channel();
        if self
            .endpoints
            .lock()
            .await
            .insert(address.to_string(), tx)
            .is_some()
        {
            debug!("Replaced memory endpoint {address}");
        }
        rx
    }

    async fn endpoint(&self, address: &str) -> Option<mpsc::UnboundedSender<ConnectionRequest>> {
        self.endpoints.lock().await.get(address).cloned()
    }
}

/// Transport producing in-process links on a [`MemoryNetwork`].
///
/// # Example
///
/// ```
/// use peerlink_session::{Listener, MemoryNetwork, MemoryTransport, Peer, Transport};
///
/// # async fn example() -> std::io::Result<()> {
/// let network = MemoryNetwork::new();
/// let alice = MemoryTransport::new(&network, Peer::new("alice"));
/// let bob = MemoryTransport::new(&network, Peer::new("bob"));
///
/// let mut listener = alice.listen().await?;
/// let target = Peer::new("alice");
/// let (dialed, accepted) = tokio::join!(bob.connect(&target), listener.accept());
/// let (_link, from) = accepted?;
/// assert_eq!(from.address, "bob");
/// # let _ = dialed?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    network: MemoryNetwork,
    /// Identity advertised to peers, its address is the listening endpoint.
    local: Peer,
    /// Capacity of each direction of a link.
    buffer_size: usize,
}

impl MemoryTransport {
    /// Attach a transport for `local` to the network.
    pub fn new(network: &MemoryNetwork, local: Peer) -> Self {
        MemoryTransport {
            network: network.clone(),
            local,
            buffer_size: DEFAULT_MEMORY_BUFFER_SIZE,
        }
    }

    /// Set the capacity of each direction of the links this transport accepts.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    /// Identity this transport advertises to peers.
    pub fn local(&self) -> &Peer {
        &self.local
    }
}

/// Accepts dials addressed to a [`MemoryTransport`]'s endpoint.
#[derive(Debug)]
pub struct MemoryListener {
    requests: mpsc::UnboundedReceiver<ConnectionRequest>,
    buffer_size: usize,
}

fn refused(peer: &Peer) -> io::Error {
    io::Error::new(
        io::ErrorKind::ConnectionRefused,
        format!("no listener at {}", peer.address),
    )
}

impl Transport for MemoryTransport {
    type Stream = DuplexStream;
    type Listener = MemoryListener;

    async fn listen(&self) -> io::Result<MemoryListener> {
        let requests = self.network.register(&self.local.address).await;
        Ok(MemoryListener {
            requests,
            buffer_size: self.buffer_size,
        })
    }

    async fn connect(&self, peer: &Peer) -> io::Result<DuplexStream> {
        let endpoint = self
            .network
            .endpoint(&peer.address)
            .await
            .ok_or_else(|| refused(peer))?;

        let (reply, accepted) = oneshot::channel();
        endpoint
            .send(ConnectionRequest {
                from: self.local.clone(),
                reply,
            })
            .map_err(|_| refused(peer))?;

        // Listener dropped with the request still queued.
        accepted.await.map_err(|_| refused(peer))
    }
}

impl Listener for MemoryListener {
    type Stream = DuplexStream;

    async fn accept(&mut self) -> io::Result<(DuplexStream, Peer)> {
        loop {
            let request = self.requests.recv().await.ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::ConnectionAborted,
                    "endpoint taken over by a newer listener",
                )
            })?;

            let (local, remote) = tokio::io::duplex(self.buffer_size);
            if request.reply.send(remote).is_ok() {
                return Ok((local, request.from));
            }
            debug!("Dialer {} gave up before being accepted", request.from);
        }
    }
}
