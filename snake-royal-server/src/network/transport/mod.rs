//! Transport Abstraction
//!
//! Byte-stream endpoints the orchestrator polls once per cycle. Nothing in
//! here blocks: a read with no data reports `WouldBlock`, a connect in
//! progress reports `Resolving` or `Connecting` until it settles.

pub mod memory;
pub mod tcp;

pub use memory::{MemoryConnector, MemoryListener, MemoryTransport};
pub use tcp::{TcpListenerTransport, TcpTransport};

/// Transport lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportStatus {
    /// Not connected (never was, or no longer).
    Closed,
    /// Looking up the host.
    Resolving,
    /// Connect in flight.
    Connecting,
    /// Ready to exchange bytes.
    Connected,
    /// Accepting connections.
    Listening,
}

impl std::fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransportStatus::Closed => "closed",
            TransportStatus::Resolving => "resolving",
            TransportStatus::Connecting => "connecting",
            TransportStatus::Connected => "connected",
            TransportStatus::Listening => "listening",
        };
        f.write_str(name)
    }
}

/// Result of one non-blocking read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// This many bytes were written to the front of the buffer.
    Data(usize),
    /// Nothing available right now.
    WouldBlock,
    /// The peer closed the stream.
    Disconnected,
}

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connect did not finish in time.
    #[error("connect timed out after {0} ms")]
    Timeout(u64),

    /// Host lookup failed or returned nothing.
    #[error("could not resolve {0}")]
    Resolve(String),

    /// Operation needs a connected transport.
    #[error("not connected")]
    NotConnected,

    /// Transport was closed locally or by the peer.
    #[error("transport closed")]
    Closed,
}

/// A non-blocking byte stream.
pub trait Transport {
    /// Current status. Also advances a pending connect.
    fn status(&mut self) -> TransportStatus;

    /// Send as much of `bytes` as the transport takes right now.
    ///
    /// Returns the number of bytes accepted; `Ok(0)` means try again later.
    fn send(&mut self, bytes: &[u8]) -> Result<usize, TransportError>;

    /// Read into `buf` without blocking.
    fn receive(&mut self, buf: &mut [u8]) -> Result<ReceiveOutcome, TransportError>;

    /// Shut the stream down gracefully.
    fn disconnect(&mut self);

    /// Release everything. Safe to call more than once.
    fn close(&mut self);

    /// Peer address or name for logs.
    fn peer_name(&self) -> String;

    /// Reason for the last failure, if any.
    fn last_error(&self) -> Option<&str>;
}

/// Accepts inbound transports.
pub trait Listener {
    /// Current status.
    fn status(&mut self) -> TransportStatus;

    /// Next pending connection, if any.
    fn accept(&mut self) -> Option<Box<dyn Transport>>;

    /// Stop listening.
    fn close(&mut self);
}
