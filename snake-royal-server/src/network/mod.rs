//! Network Layer
//!
//! Tick-synchronized authority/follower replication over framed byte
//! streams. The simulation is only reached through [`Simulation`]; all
//! network work runs on the game loop thread.

pub mod connection;
pub mod frame;
pub mod orchestrator;
pub mod protocol;
pub mod replay;
pub mod session;
pub mod simulation;
pub mod transport;
pub mod wire;

pub use connection::{Connection, ConnectionId, Inbound};
pub use frame::{FrameError, FrameScanner};
pub use orchestrator::{Clock, Dispatch, Network, NetworkError, Role, SystemClock};
pub use protocol::{Message, MessageKind, WireMessage};
pub use replay::{ReplayEffect, TickReplayQueue};
pub use session::{Session, SessionError};
pub use simulation::Simulation;
pub use transport::{Listener, ReceiveOutcome, Transport, TransportError, TransportStatus};
pub use wire::{CodecError, FrameHeader};
