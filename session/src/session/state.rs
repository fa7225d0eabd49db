//! Session lifecycle state.
//!
//! The session moves between four states.
//!
//! 1. **Idle**: Nothing is running. The initial state, and the state after
//!    [`stop`](super::Session::stop), a failed dial, or a lost link.
//! 2. **Listening**: A listener is waiting for a peer to dial in.
//! 3. **Connecting**: A dial to a peer is in flight. A listener may still be
//!    running, and an inbound peer may win the race.
//! 4. **Connected**: Exactly one link is adopted and its transfer worker is
//!    reading from it.

use std::fmt;

/// Lifecycle state of a [`Session`](super::Session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Not listening and not connected.
    #[default]
    Idle,
    /// Waiting for an inbound link.
    Listening,
    /// An outbound dial is in flight.
    Connecting,
    /// A link is adopted and transferring data.
    Connected,
}

impl SessionState {
    /// Whether a link is currently adopted.
    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Listening => write!(f, "listening"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Connected => write!(f, "connected"),
        }
    }
}
