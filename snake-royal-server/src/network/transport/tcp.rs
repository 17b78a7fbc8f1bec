//! TCP Transport
//!
//! Plain non-blocking `std::net` sockets for the data path. The only async
//! piece is the outbound connect, which runs as a tokio task so host lookup
//! and the handshake never stall the game loop.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{Listener, ReceiveOutcome, Transport, TransportError, TransportStatus};

type ConnectResult = Result<TcpStream, TransportError>;

enum Link {
    Pending {
        worker: JoinHandle<ConnectResult>,
        progress: watch::Receiver<TransportStatus>,
    },
    Open(TcpStream),
    Closed,
}

/// A TCP byte stream.
pub struct TcpTransport {
    link: Link,
    peer: String,
    last_error: Option<String>,
}

impl TcpTransport {
    /// Start connecting to `host:port` in the background.
    ///
    /// Must be called from inside a tokio runtime. Poll [`Transport::status`]
    /// until it reports `Connected` or `Closed`.
    pub fn connect_async(host: &str, port: u16, timeout: Duration) -> Self {
        let (tx, rx) = watch::channel(TransportStatus::Resolving);
        let worker = tokio::spawn(connect_worker(host.to_string(), port, timeout, tx));
        Self {
            link: Link::Pending { worker, progress: rx },
            peer: format!("{}:{}", host, port),
            last_error: None,
        }
    }

    /// Wrap an accepted stream.
    pub fn from_stream(stream: TcpStream, peer: SocketAddr) -> Result<Self, TransportError> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            link: Link::Open(stream),
            peer: peer.to_string(),
            last_error: None,
        })
    }

    fn fail(&mut self, err: &TransportError) {
        self.last_error = Some(err.to_string());
        self.close();
    }

    /// Pick up the worker's result once it is done.
    fn settle(&mut self) {
        let Link::Pending { worker, .. } = &mut self.link else {
            return;
        };
        if !worker.is_finished() {
            return;
        }
        match worker.now_or_never() {
            Some(Ok(Ok(stream))) => {
                debug!("Connected to {}", self.peer);
                self.link = Link::Open(stream);
            }
            Some(Ok(Err(err))) => {
                warn!("Connect to {} failed: {}", self.peer, err);
                self.fail(&err);
            }
            Some(Err(join_err)) => {
                let err = TransportError::Io(std::io::Error::other(join_err.to_string()));
                self.fail(&err);
            }
            None => {}
        }
    }
}

async fn connect_worker(
    host: String,
    port: u16,
    timeout: Duration,
    progress: watch::Sender<TransportStatus>,
) -> ConnectResult {
    let attempt = async {
        let addr = tokio::net::lookup_host((host.as_str(), port))
            .await
            .map_err(|_| TransportError::Resolve(host.clone()))?
            .next()
            .ok_or_else(|| TransportError::Resolve(host.clone()))?;

        // Receiver may already be gone if the transport was dropped.
        let _ = progress.send(TransportStatus::Connecting);
        let stream = tokio::net::TcpStream::connect(addr).await?;
        let stream = stream.into_std()?;
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok::<_, TransportError>(stream)
    };

    tokio::time::timeout(timeout, attempt)
        .await
        .map_err(|_| TransportError::Timeout(timeout.as_millis() as u64))?
}

impl Transport for TcpTransport {
    fn status(&mut self) -> TransportStatus {
        self.settle();
        match &self.link {
            Link::Pending { progress, .. } => *progress.borrow(),
            Link::Open(_) => TransportStatus::Connected,
            Link::Closed => TransportStatus::Closed,
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        let Link::Open(stream) = &mut self.link else {
            return Err(TransportError::NotConnected);
        };
        match stream.write(bytes) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(e) => {
                let err = TransportError::Io(e);
                self.fail(&err);
                Err(err)
            }
        }
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<ReceiveOutcome, TransportError> {
        let Link::Open(stream) = &mut self.link else {
            return Err(TransportError::NotConnected);
        };
        match stream.read(buf) {
            Ok(0) if !buf.is_empty() => {
                self.close();
                Ok(ReceiveOutcome::Disconnected)
            }
            Ok(n) => Ok(ReceiveOutcome::Data(n)),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                Ok(ReceiveOutcome::WouldBlock)
            }
            Err(e) if e.kind() == ErrorKind::ConnectionReset => {
                self.close();
                Ok(ReceiveOutcome::Disconnected)
            }
            Err(e) => {
                let err = TransportError::Io(e);
                self.fail(&err);
                Err(err)
            }
        }
    }

    fn disconnect(&mut self) {
        if let Link::Open(stream) = &self.link {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.close();
    }

    fn close(&mut self) {
        if let Link::Pending { worker, .. } = &self.link {
            worker.abort();
        }
        self.link = Link::Closed;
    }

    fn peer_name(&self) -> String {
        self.peer.clone()
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Non-blocking TCP listener.
pub struct TcpListenerTransport {
    listener: Option<TcpListener>,
    local: SocketAddr,
}

impl TcpListenerTransport {
    /// Bind `address:port`. Port 0 picks a free port.
    pub fn listen(address: &str, port: u16) -> Result<Self, TransportError> {
        let listener = TcpListener::bind((address, port))?;
        listener.set_nonblocking(true)?;
        let local = listener.local_addr()?;
        Ok(Self {
            listener: Some(listener),
            local,
        })
    }

    /// Bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }
}

impl Listener for TcpListenerTransport {
    fn status(&mut self) -> TransportStatus {
        if self.listener.is_some() {
            TransportStatus::Listening
        } else {
            TransportStatus::Closed
        }
    }

    fn accept(&mut self) -> Option<Box<dyn Transport>> {
        let listener = self.listener.as_ref()?;
        match listener.accept() {
            Ok((stream, peer)) => match TcpTransport::from_stream(stream, peer) {
                Ok(transport) => Some(Box::new(transport)),
                Err(e) => {
                    warn!("Dropping connection from {}: {}", peer, e);
                    None
                }
            },
            Err(e) if e.kind() == ErrorKind::WouldBlock => None,
            Err(e) => {
                warn!("Accept error: {}", e);
                None
            }
        }
    }

    fn close(&mut self) {
        self.listener = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn wait_for(transport: &mut TcpTransport, want: TransportStatus) -> TransportStatus {
        for _ in 0..200 {
            let status = transport.status();
            if status == want || status == TransportStatus::Closed {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        transport.status()
    }

    #[tokio::test]
    async fn test_connect_and_exchange() {
        let mut listener = TcpListenerTransport::listen("127.0.0.1", 0).unwrap();
        let port = listener.local_addr().port();

        let mut client = TcpTransport::connect_async("127.0.0.1", port, Duration::from_secs(2));
        assert_eq!(wait_for(&mut client, TransportStatus::Connected).await, TransportStatus::Connected);

        let mut server = None;
        for _ in 0..200 {
            server = listener.accept();
            if server.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let mut server = server.unwrap();

        assert_eq!(client.send(b"hello").unwrap(), 5);
        let mut buf = [0u8; 16];
        let mut got = Vec::new();
        for _ in 0..200 {
            if let ReceiveOutcome::Data(n) = server.receive(&mut buf).unwrap() {
                got.extend_from_slice(&buf[..n]);
            }
            if got.len() == 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(got, b"hello");
        assert_eq!(server.receive(&mut buf).unwrap(), ReceiveOutcome::WouldBlock);

        client.disconnect();
        let mut outcome = ReceiveOutcome::WouldBlock;
        for _ in 0..200 {
            outcome = server.receive(&mut buf).unwrap();
            if outcome != ReceiveOutcome::WouldBlock {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(outcome, ReceiveOutcome::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_refused_closes() {
        // Grab a free port, then stop listening on it.
        let port = {
            let listener = TcpListenerTransport::listen("127.0.0.1", 0).unwrap();
            listener.local_addr().port()
        };
        let mut client = TcpTransport::connect_async("127.0.0.1", port, Duration::from_secs(2));
        assert_eq!(wait_for(&mut client, TransportStatus::Connected).await, TransportStatus::Closed);
        assert!(client.last_error().is_some());
    }

    #[tokio::test]
    async fn test_close_aborts_pending_connect() {
        let mut client = TcpTransport::connect_async("127.0.0.1", 9, Duration::from_secs(5));
        client.close();
        assert_eq!(client.status(), TransportStatus::Closed);
        assert!(matches!(client.send(b"x"), Err(TransportError::NotConnected)));
    }

    #[test]
    fn test_listener_without_pending_connection() {
        let mut listener = TcpListenerTransport::listen("127.0.0.1", 0).unwrap();
        assert_eq!(listener.status(), TransportStatus::Listening);
        assert!(listener.accept().is_none());
        listener.close();
        assert_eq!(listener.status(), TransportStatus::Closed);
    }
}
