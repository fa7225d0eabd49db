//! Remote peer identity.

use std::fmt;

/// Represents the remote end of a link.
///
/// The address is whatever the transport uses to reach the peer, a socket
/// address for TCP or an endpoint key for the in-memory transport. The name is
/// an optional human readable label. When it is missing the address doubles
/// as the display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Peer {
    /// Transport specific address of the peer.
    pub address: String,
    /// Human readable name of the peer, if known.
    pub name: Option<String>,
}

impl Peer {
    /// Create a new peer with an unknown name.
    pub fn new<S: Into<String>>(address: S) -> Self {
        Peer {
            address: address.into(),
            name: None,
        }
    }

    /// Returns the peer with a known display name.
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name to show for this peer, falling back to the address.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} ({})", self.address),
            None => write!(f, "{}", self.address),
        }
    }
}
