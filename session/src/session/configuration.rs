//! Session configuration types and constants.

use std::fmt;

/// Default size of the transfer worker's read buffer.
///
/// Each read delivers at most this many bytes in one
/// [`SessionEvent::DataReceived`](super::SessionEvent::DataReceived).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Configuration used to build a session.
#[derive(Debug, Clone)]
pub struct SessionConfiguration {
    /// Size of the buffer used for each read from an adopted link.
    pub read_buffer_size: usize,
}

impl SessionConfiguration {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    /// Set the size of the read buffer.
    ///
    /// The size is clamped to at least one byte, since a read into an empty
    /// buffer is indistinguishable from the peer closing the link.
    ///
    /// # Example
    ///
    /// ```
    /// use peerlink_session::SessionConfiguration;
    ///
    /// let config = SessionConfiguration::new().with_read_buffer_size(4096);
    /// assert_eq!(config.read_buffer_size, 4096);
    /// ```
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }
}

impl Default for SessionConfiguration {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SessionConfiguration {{ read_buffer_size: {} }}",
            self.read_buffer_size
        )
    }
}
