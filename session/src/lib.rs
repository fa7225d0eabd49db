mod peer;
mod session;
mod transport;

pub use peer::Peer;
pub use session::{
    dispatch, EventSink, Session, SessionConfiguration, SessionError, SessionEvent, SessionState,
    DEFAULT_READ_BUFFER_SIZE,
};
pub use transport::{
    Listener, MemoryListener, MemoryNetwork, MemoryTransport, TcpListener, TcpTransport,
    Transport, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MEMORY_BUFFER_SIZE,
};
