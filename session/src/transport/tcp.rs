//! TCP links.

use super::{Listener, Transport};
use crate::peer::Peer;
use log::debug;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;

/// Default timeout for a single outbound connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport producing links over TCP.
///
/// Every call to [`Transport::listen`] binds a fresh server socket on the
/// configured address, so the socket is only open while a listener exists.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    /// Local address server sockets are bound to.
    listen_address: SocketAddr,
    /// Timeout applied to each outbound connection attempt.
    connect_timeout: Duration,
}

impl TcpTransport {
    /// Create a TCP transport which listens on `listen_address`.
    pub fn new(listen_address: SocketAddr) -> Self {
        TcpTransport {
            listen_address,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Set the timeout for outbound connection attempts.
    ///
    /// # Example
    ///
    /// ```
    /// use peerlink_session::TcpTransport;
    /// use std::time::Duration;
    ///
    /// let transport = TcpTransport::new("127.0.0.1:7878".parse().unwrap())
    ///     .with_connect_timeout(Duration::from_secs(3));
    /// assert_eq!(transport.connect_timeout(), Duration::from_secs(3));
    /// ```
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Local address server sockets are bound to.
    pub fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Timeout applied to each outbound connection attempt.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

/// A bound TCP server socket.
#[derive(Debug)]
pub struct TcpListener {
    inner: tokio::net::TcpListener,
}

impl TcpListener {
    /// The address the server socket is actually bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

impl Transport for TcpTransport {
    type Stream = TcpStream;
    type Listener = TcpListener;

    async fn listen(&self) -> io::Result<TcpListener> {
        let inner = tokio::net::TcpListener::bind(self.listen_address).await?;
        debug!("Listening for TCP links on {}", inner.local_addr()?);
        Ok(TcpListener { inner })
    }

    async fn connect(&self, peer: &Peer) -> io::Result<TcpStream> {
        match tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect(peer.address.as_str()),
        )
        .await
        {
            Ok(Ok(stream)) => {
                // Chat style traffic is many small writes.
                stream.set_nodelay(true)?;
                Ok(stream)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "Connection attempt timed out",
            )),
        }
    }
}

impl Listener for TcpListener {
    type Stream = TcpStream;

    async fn accept(&mut self) -> io::Result<(TcpStream, Peer)> {
        let (stream, address) = self.inner.accept().await?;
        stream.set_nodelay(true)?;
        Ok((stream, Peer::new(address.to_string())))
    }
}
