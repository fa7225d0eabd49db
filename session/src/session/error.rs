//! Error types for session handling.

use std::error::Error;
use std::fmt;
use std::io;

/// Errors that can occur over the lifetime of a session.
///
/// Only [`SessionError::WriteFailed`] is ever returned to a caller. The other
/// kinds happen on a worker and are reported through
/// [`SessionEvent`](super::SessionEvent)s and the log.
#[derive(Debug)]
pub enum SessionError {
    /// The listener could not be opened or stopped accepting.
    AcceptFailed(io::Error),
    /// An outbound dial failed.
    ConnectFailed(io::Error),
    /// The adopted link failed or the peer closed it.
    LinkLost(io::Error),
    /// Writing to the adopted link failed.
    WriteFailed(io::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::AcceptFailed(err) => write!(f, "Accepting inbound links failed: {err}"),
            SessionError::ConnectFailed(err) => write!(f, "Unable to connect to peer: {err}"),
            SessionError::LinkLost(err) => write!(f, "Peer connection was lost: {err}"),
            SessionError::WriteFailed(err) => write!(f, "Write to peer failed: {err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SessionError::AcceptFailed(err) => Some(err),
            SessionError::ConnectFailed(err) => Some(err),
            SessionError::LinkLost(err) => Some(err),
            SessionError::WriteFailed(err) => Some(err),
        }
    }
}
