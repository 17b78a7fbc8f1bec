//! In-Memory Transport
//!
//! Loopback byte pipes for driving authority and follower in one process.
//! Reads can be capped to force frames to arrive in pieces, and sends to
//! stand in for a peer that stops reading.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::{Listener, ReceiveOutcome, Transport, TransportError, TransportStatus};

#[derive(Debug, Default)]
struct Pipe {
    bytes: VecDeque<u8>,
    closed: bool,
}

type SharedPipe = Rc<RefCell<Pipe>>;

/// One end of an in-process byte stream.
#[derive(Debug)]
pub struct MemoryTransport {
    inbound: SharedPipe,
    outbound: SharedPipe,
    open: bool,
    max_read: Option<usize>,
    max_send: Option<usize>,
    name: String,
}

impl MemoryTransport {
    /// Two connected ends.
    pub fn pair() -> (MemoryTransport, MemoryTransport) {
        Self::named_pair("memory-a", "memory-b")
    }

    fn named_pair(a: &str, b: &str) -> (MemoryTransport, MemoryTransport) {
        let ab = SharedPipe::default();
        let ba = SharedPipe::default();
        (
            MemoryTransport {
                inbound: ba.clone(),
                outbound: ab.clone(),
                open: true,
                max_read: None,
                max_send: None,
                name: b.to_string(),
            },
            MemoryTransport {
                inbound: ab,
                outbound: ba,
                open: true,
                max_read: None,
                max_send: None,
                name: a.to_string(),
            },
        )
    }

    /// Cap every `receive` at `limit` bytes (`None` for no cap).
    pub fn set_max_read(&mut self, limit: Option<usize>) {
        self.max_read = limit;
    }

    /// Cap every `send` at `limit` bytes. `Some(0)` acts like a peer that
    /// stopped reading.
    pub fn set_max_send(&mut self, limit: Option<usize>) {
        self.max_send = limit;
    }

    /// Bytes waiting to be read on this end.
    pub fn pending(&self) -> usize {
        self.inbound.borrow().bytes.len()
    }
}

impl Transport for MemoryTransport {
    fn status(&mut self) -> TransportStatus {
        if self.open {
            TransportStatus::Connected
        } else {
            TransportStatus::Closed
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        if !self.open {
            return Err(TransportError::NotConnected);
        }
        let mut pipe = self.outbound.borrow_mut();
        if pipe.closed {
            return Err(TransportError::Closed);
        }
        let n = bytes.len().min(self.max_send.unwrap_or(usize::MAX));
        pipe.bytes.extend(&bytes[..n]);
        Ok(n)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<ReceiveOutcome, TransportError> {
        if !self.open {
            return Err(TransportError::NotConnected);
        }
        let mut pipe = self.inbound.borrow_mut();
        if pipe.bytes.is_empty() {
            return Ok(if pipe.closed {
                ReceiveOutcome::Disconnected
            } else {
                ReceiveOutcome::WouldBlock
            });
        }
        let limit = self.max_read.unwrap_or(usize::MAX);
        let n = buf.len().min(limit).min(pipe.bytes.len());
        for (slot, byte) in buf.iter_mut().zip(pipe.bytes.drain(..n)) {
            *slot = byte;
        }
        Ok(ReceiveOutcome::Data(n))
    }

    fn disconnect(&mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.open = false;
        self.outbound.borrow_mut().closed = true;
        self.inbound.borrow_mut().closed = true;
    }

    fn peer_name(&self) -> String {
        self.name.clone()
    }

    fn last_error(&self) -> Option<&str> {
        None
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.close();
    }
}

type Backlog = Rc<RefCell<VecDeque<MemoryTransport>>>;

/// Accepts transports created through its [`MemoryConnector`].
#[derive(Debug)]
pub struct MemoryListener {
    backlog: Backlog,
    open: bool,
}

/// Dials a [`MemoryListener`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    backlog: Backlog,
    next: Rc<RefCell<u32>>,
}

impl MemoryListener {
    /// A listener and the connector that feeds it.
    pub fn open() -> (MemoryListener, MemoryConnector) {
        let backlog = Backlog::default();
        (
            MemoryListener {
                backlog: backlog.clone(),
                open: true,
            },
            MemoryConnector {
                backlog,
                next: Rc::new(RefCell::new(0)),
            },
        )
    }
}

impl MemoryConnector {
    /// Queue a new connection on the listener and return the dialing end.
    pub fn connect(&self) -> MemoryTransport {
        let mut next = self.next.borrow_mut();
        *next += 1;
        let (client, server) = MemoryTransport::named_pair(
            &format!("memory-client-{}", *next),
            "memory-listener",
        );
        self.backlog.borrow_mut().push_back(server);
        client
    }
}

impl Listener for MemoryListener {
    fn status(&mut self) -> TransportStatus {
        if self.open {
            TransportStatus::Listening
        } else {
            TransportStatus::Closed
        }
    }

    fn accept(&mut self) -> Option<Box<dyn Transport>> {
        if !self.open {
            return None;
        }
        let transport = self.backlog.borrow_mut().pop_front()?;
        Some(Box::new(transport))
    }

    fn close(&mut self) {
        self.open = false;
        for mut pending in self.backlog.borrow_mut().drain(..) {
            pending.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_delivers_in_order() {
        let (mut a, mut b) = MemoryTransport::pair();
        assert_eq!(a.send(b"abc").unwrap(), 3);
        assert_eq!(a.send(b"de").unwrap(), 2);

        let mut buf = [0u8; 8];
        assert_eq!(b.receive(&mut buf).unwrap(), ReceiveOutcome::Data(5));
        assert_eq!(&buf[..5], b"abcde");
        assert_eq!(b.receive(&mut buf).unwrap(), ReceiveOutcome::WouldBlock);
    }

    #[test]
    fn test_capped_reads() {
        let (mut a, mut b) = MemoryTransport::pair();
        b.set_max_read(Some(2));
        a.send(b"abcde").unwrap();

        let mut buf = [0u8; 8];
        let mut sizes = Vec::new();
        while let ReceiveOutcome::Data(n) = b.receive(&mut buf).unwrap() {
            sizes.push(n);
        }
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_capped_sends() {
        let (mut a, b) = MemoryTransport::pair();
        a.set_max_send(Some(3));
        assert_eq!(a.send(b"abcde").unwrap(), 3);
        assert_eq!(b.pending(), 3);

        a.set_max_send(Some(0));
        assert_eq!(a.send(b"de").unwrap(), 0);
        assert_eq!(b.pending(), 3);
    }

    #[test]
    fn test_close_drains_then_disconnects() {
        let (mut a, mut b) = MemoryTransport::pair();
        a.send(b"xy").unwrap();
        a.close();
        assert_eq!(a.status(), TransportStatus::Closed);

        let mut buf = [0u8; 8];
        assert_eq!(b.receive(&mut buf).unwrap(), ReceiveOutcome::Data(2));
        assert_eq!(b.receive(&mut buf).unwrap(), ReceiveOutcome::Disconnected);
        assert!(matches!(b.send(b"z"), Err(TransportError::Closed)));
    }

    #[test]
    fn test_listener_accepts_in_dial_order() {
        let (mut listener, connector) = MemoryListener::open();
        assert!(listener.accept().is_none());

        let mut first = connector.connect();
        let _second = connector.connect();
        assert_eq!(first.peer_name(), "memory-listener");

        let mut accepted = listener.accept().unwrap();
        assert_eq!(accepted.peer_name(), "memory-client-1");
        first.send(b"hi").unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(accepted.receive(&mut buf).unwrap(), ReceiveOutcome::Data(2));

        assert_eq!(listener.accept().unwrap().peer_name(), "memory-client-2");
        assert!(listener.accept().is_none());
    }
}
