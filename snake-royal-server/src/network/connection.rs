//! Connection
//!
//! One peer: its transport plus the inbound bytes not yet framed and the
//! outbound bytes not yet sent.

use std::fmt;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::buffer::{ByteBuffer, OwnedBuffer, Seek};
use crate::game::players::ParticipantId;
use crate::network::frame::{FrameError, FrameScanner};
use crate::network::protocol::{Message, MessageKind};
use crate::network::transport::{ReceiveOutcome, Transport, TransportError, TransportStatus};

/// Connection id used in logs.
pub type ConnectionId = Uuid;

/// A frame pulled off the wire: decoded, or skipped because its tag is
/// unknown to this build.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Decoded message.
    Message(Message),
    /// Unknown tag; payload was skipped.
    Unknown(u16),
}

/// A transport with its buffers.
pub struct Connection {
    id: ConnectionId,
    transport: Box<dyn Transport>,
    last_status: TransportStatus,
    participant: Option<ParticipantId>,
    inbound: OwnedBuffer,
    outbound: OwnedBuffer,
    fault: Option<String>,
    recv_chunk: usize,
    max_pending: usize,
}

impl Connection {
    /// Wrap a transport. `last_status` starts at `initial`.
    pub fn new(transport: Box<dyn Transport>, initial: TransportStatus, recv_chunk: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            transport,
            last_status: initial,
            participant: None,
            inbound: ByteBuffer::new(),
            outbound: ByteBuffer::new(),
            fault: None,
            recv_chunk: recv_chunk.max(1),
            max_pending: usize::MAX,
        }
    }

    /// Fault the connection once more than `limit` bytes wait to be sent.
    pub fn with_output_limit(mut self, limit: usize) -> Self {
        self.max_pending = limit;
        self
    }

    /// Log id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Peer address or name.
    pub fn peer_name(&self) -> String {
        self.transport.peer_name()
    }

    /// Participant bound by the handshake.
    pub fn participant(&self) -> Option<ParticipantId> {
        self.participant
    }

    /// Bind the handshake's participant.
    pub fn set_participant(&mut self, id: ParticipantId) {
        self.participant = Some(id);
    }

    /// Poll the transport. Returns the new status when it changed.
    pub fn poll_status(&mut self) -> Option<TransportStatus> {
        let status = self.transport.status();
        if status == self.last_status {
            return None;
        }
        self.last_status = status;
        Some(status)
    }

    /// Status seen by the last [`poll_status`](Self::poll_status).
    pub fn last_status(&self) -> TransportStatus {
        self.last_status
    }

    /// Why the connection must be dropped, if it must.
    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    /// Mark the connection for removal. The first reason wins.
    pub fn set_fault(&mut self, reason: impl Into<String>) {
        if self.fault.is_none() {
            self.fault = Some(reason.into());
        }
    }

    /// Transport's own error text.
    pub fn transport_error(&self) -> Option<&str> {
        self.transport.last_error()
    }

    /// Pull whatever the transport has into the inbound buffer.
    ///
    /// Reads straight into reserved room at the end of the buffer and trims
    /// the part that was not filled. Keeps reading while full chunks come
    /// back. Returns `Disconnected` if the peer went away, even when bytes
    /// arrived first.
    pub fn receive(&mut self) -> Result<ReceiveOutcome, TransportError> {
        let mut total = 0;
        loop {
            self.inbound.seek(Seek::End(0));
            let at = self.inbound.reserve_room(self.recv_chunk);
            let slot = &mut self.inbound.as_mut_slice()[at..at + self.recv_chunk];
            let outcome = self.transport.receive(slot);

            let used = match outcome {
                Ok(ReceiveOutcome::Data(n)) => n,
                _ => 0,
            };
            self.inbound.seek(Seek::Start(at + used));
            self.inbound.erase(self.recv_chunk - used);

            match outcome? {
                ReceiveOutcome::Data(n) => {
                    total += n;
                    if n < self.recv_chunk {
                        break;
                    }
                }
                ReceiveOutcome::WouldBlock => break,
                ReceiveOutcome::Disconnected => return Ok(ReceiveOutcome::Disconnected),
            }
        }
        Ok(if total > 0 {
            ReceiveOutcome::Data(total)
        } else {
            ReceiveOutcome::WouldBlock
        })
    }

    /// Frame and decode everything complete in the inbound buffer.
    pub fn drain_inbound(&mut self, scanner: &FrameScanner) -> Result<Vec<Inbound>, FrameError> {
        let mut out = Vec::new();
        scanner.scan(&mut self.inbound, |header, payload| {
            match MessageKind::from_u16(header.message_type) {
                Some(kind) => out.push(Inbound::Message(Message::decode(kind, payload)?)),
                None => out.push(Inbound::Unknown(header.message_type)),
            }
            Ok(())
        })?;
        Ok(out)
    }

    /// Append one message to the outbound buffer.
    pub fn queue(&mut self, message: &Message) {
        if self.fault.is_some() {
            return;
        }
        self.outbound.seek(Seek::End(0));
        message.encode_frame(&mut self.outbound);
        self.check_backlog();
    }

    /// Append already framed bytes.
    pub fn queue_bytes(&mut self, bytes: &[u8]) {
        if self.fault.is_some() {
            return;
        }
        self.outbound.seek(Seek::End(0));
        self.outbound.write(bytes);
        self.check_backlog();
    }

    fn check_backlog(&mut self) {
        let pending = self.outbound.len();
        if pending > self.max_pending {
            warn!("{} has {} unsent bytes, dropping it", self.id, pending);
            self.set_fault(format!("peer not reading ({} bytes pending)", pending));
            self.outbound.clear();
        }
    }

    /// Bytes waiting to be sent.
    pub fn pending_output(&self) -> usize {
        self.outbound.len()
    }

    /// Send what the transport takes; the rest waits for the next flush.
    pub fn flush(&mut self) -> Result<usize, TransportError> {
        let mut sent = 0;
        while !self.outbound.is_empty() {
            let n = self.transport.send(self.outbound.as_slice())?;
            if n == 0 {
                break;
            }
            self.outbound.seek(Seek::Start(0));
            self.outbound.erase(n);
            sent += n;
        }
        if sent > 0 {
            debug!("Flushed {} bytes to {}", sent, self.id);
        }
        Ok(sent)
    }

    /// Close the transport.
    pub fn close(&mut self) {
        self.transport.close();
        self.last_status = TransportStatus::Closed;
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.transport.peer_name())
            .field("participant", &self.participant)
            .field("inbound", &self.inbound.len())
            .field("outbound", &self.outbound.len())
            .field("fault", &self.fault)
            .finish()
    }
}
