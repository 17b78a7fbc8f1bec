//! Network Orchestrator
//!
//! Per-cycle network work for one process. The role is fixed when the
//! `Network` is built:
//!
//! - **Authority** accepts followers, owns the simulation and broadcasts
//!   every change stamped with the tick it was applied at.
//! - **Follower** dials one authority, applies baseline messages right away
//!   and queues everything else for replay at its tick.
//! - **Inactive** does no networking; the session runs the simulation
//!   locally with authority rules.
//!
//! Everything here runs on the game loop thread.

use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use crate::config::NetworkConfig;
use crate::core::buffer::{ByteBuffer, OwnedBuffer};
use crate::core::vec2::GridVec2;
use crate::game::events::SimEventData;
use crate::game::players::ParticipantId;
use crate::game::state::RoundState;
use crate::network::connection::{Connection, Inbound};
use crate::network::frame::{FrameError, FrameScanner};
use crate::network::protocol::{
    ActorDirection, ActorRosterUpdate, DirectionRequest, Hello, LocalIdentity, Message,
    MessageKind, ParticipantLeft, ParticipantRosterUpdate, Ping, Pong, RoundRestart, RoundStart,
    RoundStateChange, TickHeartbeat,
};
use crate::network::replay::{ReplayEffect, TickReplayQueue};
use crate::network::simulation::Simulation;
use crate::network::transport::{
    Listener, ReceiveOutcome, TcpListenerTransport, TcpTransport, Transport, TransportError,
    TransportStatus,
};
use crate::{DEFAULT_RESTART_DELAY_TICKS, NETWORK_VERSION};

/// Which side of the session this process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// No networking.
    Inactive,
    /// Owns the simulation.
    Authority,
    /// Mirrors an authority.
    Follower,
}

/// Outcome of handing a message to the role's handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Message was meant for this role.
    Handled,
    /// Message is only valid for the other role; ignored.
    Unhandled(MessageKind),
}

/// Network errors. Authority-side connection faults never surface here;
/// they only drop the offending connection.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Could not listen.
    #[error("failed to listen on {address}: {source}")]
    Bind {
        /// Requested address.
        address: String,
        /// Underlying failure.
        #[source]
        source: TransportError,
    },

    /// Never reached the authority.
    #[error("could not connect to authority: {0}")]
    ConnectFailed(String),

    /// Link to the authority went away.
    #[error("disconnected from authority: {0}")]
    Disconnected(String),

    /// Authority sent a malformed stream.
    #[error("protocol fault from authority: {0}")]
    Protocol(#[from] FrameError),
}

/// Seconds on a monotonic clock. Ping timestamps and RTT use it.
pub trait Clock {
    /// Current time in seconds.
    fn now(&self) -> f64;
}

/// Seconds since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Network orchestrator.
pub struct Network {
    role: Role,
    config: NetworkConfig,
    scanner: FrameScanner,
    listener: Option<Box<dyn Listener>>,
    connections: Vec<Connection>,
    scratch: OwnedBuffer,
    replay: TickReplayQueue<ReplayEffect>,
    restart_delay: u32,
    last_known_tick: u32,
    synced: bool,
    connected_once: bool,
    local_participant: Option<ParticipantId>,
    last_ping: Option<f64>,
    rtt_ms: Option<f64>,
    clock: Box<dyn Clock>,
}

impl Network {
    fn with_role(role: Role, config: NetworkConfig) -> Self {
        Self {
            role,
            scanner: FrameScanner::new(config.max_payload_size),
            config,
            listener: None,
            connections: Vec::new(),
            scratch: ByteBuffer::new(),
            replay: TickReplayQueue::new(),
            restart_delay: DEFAULT_RESTART_DELAY_TICKS,
            last_known_tick: 0,
            synced: false,
            connected_once: false,
            local_participant: None,
            last_ping: None,
            rtt_ms: None,
            clock: Box::new(SystemClock::default()),
        }
    }

    /// Local-only session.
    pub fn inactive(config: NetworkConfig) -> Self {
        Self::with_role(Role::Inactive, config)
    }

    /// Authority accepting on `listener`.
    pub fn authority(listener: Box<dyn Listener>, config: NetworkConfig) -> Self {
        let mut network = Self::with_role(Role::Authority, config);
        network.listener = Some(listener);
        network
    }

    /// Follower talking to the authority over `transport`.
    pub fn follower(transport: Box<dyn Transport>, config: NetworkConfig) -> Self {
        let mut network = Self::with_role(Role::Follower, config);
        let conn = Connection::new(transport, TransportStatus::Closed, network.config.recv_chunk_size)
            .with_output_limit(network.config.max_pending_output);
        network.connections.push(conn);
        network
    }

    /// Authority listening on `config.host:config.port` over TCP.
    pub fn host(config: NetworkConfig) -> Result<Self, NetworkError> {
        let listener = TcpListenerTransport::listen(&config.host, config.port).map_err(|source| {
            NetworkError::Bind {
                address: format!("{}:{}", config.host, config.port),
                source,
            }
        })?;
        info!("Authority listening on {}", listener.local_addr());
        Ok(Self::authority(Box::new(listener), config))
    }

    /// Follower dialing `host:port` over TCP. Needs a tokio runtime.
    #[instrument(skip(config))]
    pub fn join(host: &str, port: u16, config: NetworkConfig) -> Self {
        info!("Connecting to {}:{}", host, port);
        let transport = TcpTransport::connect_async(host, port, config.connect_timeout());
        Self::follower(Box::new(transport), config)
    }

    /// Replace the clock used for pings.
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Delay used when a join or an empty-to-occupied transition restarts
    /// the round.
    pub fn set_restart_delay(&mut self, delay: u32) {
        self.restart_delay = delay;
    }

    /// Role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether this side decides round transitions.
    pub fn is_authoritative(&self) -> bool {
        self.role != Role::Follower
    }

    /// Latest authority tick seen (follower).
    pub fn last_known_tick(&self) -> u32 {
        self.last_known_tick
    }

    /// Whether a snapshot has been applied (follower).
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Participant this follower controls.
    pub fn local_participant(&self) -> Option<ParticipantId> {
        self.local_participant
    }

    /// Last measured round trip in milliseconds (follower).
    pub fn rtt_ms(&self) -> Option<f64> {
        self.rtt_ms
    }

    /// Open connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Events waiting for their tick (follower).
    pub fn pending_replay(&self) -> usize {
        self.replay.len()
    }

    /// Ticks the follower may simulate before catching up with the
    /// authority. Zero until the first snapshot.
    pub fn catch_up_gap(&self, tick: u32) -> u32 {
        if self.role != Role::Follower || !self.synced {
            return 0;
        }
        self.last_known_tick.saturating_sub(tick)
    }

    /// One network cycle.
    pub fn poll<S: Simulation>(&mut self, sim: &mut S) -> Result<(), NetworkError> {
        match self.role {
            Role::Inactive => Ok(()),
            Role::Authority => {
                self.poll_authority(sim);
                Ok(())
            }
            Role::Follower => self.poll_follower(sim),
        }
    }

    /// Send queued output on every connection.
    pub fn flush(&mut self) {
        for conn in &mut self.connections {
            if conn.fault().is_some() {
                continue;
            }
            if let Err(e) = conn.flush() {
                warn!("Send to {} failed: {}", conn.id(), e);
                conn.set_fault(format!("send failed: {}", e));
            }
        }
    }

    /// Broadcast events the simulation recorded (authority) or drop them.
    pub fn publish_events<S: Simulation>(&mut self, sim: &mut S) {
        let events = sim.take_events();
        if self.role != Role::Authority {
            return;
        }
        for event in events {
            let message = match event.data {
                SimEventData::RoundStateChanged { state, delay } => {
                    Message::RoundStateChange(RoundStateChange { tick: event.tick, state, delay })
                }
                SimEventData::RoundRestarted { delay } => {
                    Message::RoundRestart(RoundRestart { tick: event.tick, delay })
                }
                SimEventData::RoundStarted => Message::RoundStart(RoundStart { tick: event.tick }),
            };
            self.broadcast(&message);
        }
    }

    /// Ask the authority to turn this follower's snake.
    ///
    /// Returns false when there is nobody to ask yet.
    pub fn request_direction(&mut self, direction: GridVec2) -> bool {
        if self.role != Role::Follower || !self.synced {
            return false;
        }
        let Some(conn) = self.connections.first_mut() else {
            return false;
        };
        conn.queue(&Message::DirectionRequest(DirectionRequest { direction }));
        true
    }

    /// Close every connection and the listener.
    pub fn shutdown(&mut self) {
        for conn in &mut self.connections {
            conn.close();
        }
        self.connections.clear();
        if let Some(listener) = self.listener.as_mut() {
            listener.close();
        }
        self.listener = None;
    }

    // =========================================================================
    // AUTHORITY
    // =========================================================================

    fn poll_authority<S: Simulation>(&mut self, sim: &mut S) {
        self.reap(sim);
        self.accept(sim);

        self.broadcast(&Message::TickHeartbeat(TickHeartbeat { tick: sim.tick() }));

        for index in 0..self.connections.len() {
            let conn = &mut self.connections[index];
            if conn.fault().is_some() {
                continue;
            }

            let disconnected = match conn.receive() {
                Ok(outcome) => outcome == ReceiveOutcome::Disconnected,
                Err(e) => {
                    conn.set_fault(format!("receive failed: {}", e));
                    continue;
                }
            };

            match conn.drain_inbound(&self.scanner) {
                Ok(frames) => {
                    for frame in frames {
                        match frame {
                            Inbound::Message(message) => {
                                let kind = message.kind();
                                if let Dispatch::Unhandled(kind) = self.handle_authority(index, message, sim) {
                                    debug!("Authority ignoring {:?} from {}", kind, self.connections[index].id());
                                }
                                self.publish_events(sim);
                                if let Some(reason) = self.connections[index].fault() {
                                    debug!("Stopped handling {:?} stream: {}", kind, reason);
                                    break;
                                }
                            }
                            Inbound::Unknown(tag) => {
                                warn!("Skipping unknown message type {} from {}", tag, self.connections[index].id());
                            }
                        }
                    }
                }
                Err(e) => {
                    let conn = &mut self.connections[index];
                    warn!("Protocol fault from {} ({}): {}", conn.id(), conn.peer_name(), e);
                    conn.set_fault(e.to_string());
                }
            }

            if disconnected {
                self.connections[index].set_fault("peer disconnected");
            }
        }

        self.reap(sim);
    }

    /// Accept at most one pending connection.
    fn accept<S: Simulation>(&mut self, sim: &mut S) {
        let Some(listener) = self.listener.as_mut() else {
            return;
        };
        let Some(mut transport) = listener.accept() else {
            return;
        };
        if self.connections.len() >= self.config.max_connections {
            warn!(
                "Connection limit {} reached, rejecting {}",
                self.config.max_connections,
                transport.peer_name()
            );
            transport.close();
            return;
        }
        let conn = Connection::new(transport, TransportStatus::Connected, self.config.recv_chunk_size)
            .with_output_limit(self.config.max_pending_output);
        info!("Connection {} from {} accepted", conn.id(), conn.peer_name());
        sim.connection_joined(&conn.peer_name());
        self.connections.push(conn);
    }

    /// Drop faulted connections and release what they held.
    fn reap<S: Simulation>(&mut self, sim: &mut S) {
        let mut index = 0;
        while index < self.connections.len() {
            if self.connections[index].fault().is_none() {
                index += 1;
                continue;
            }
            let mut conn = self.connections.remove(index);
            info!(
                "Connection {} ({}) closed: {}",
                conn.id(),
                conn.peer_name(),
                conn.fault().unwrap_or_default()
            );
            conn.close();
            if let Some(participant) = conn.participant() {
                self.participant_left(participant, sim);
            }
        }
    }

    #[instrument(skip(self, sim))]
    fn participant_left<S: Simulation>(&mut self, participant: ParticipantId, sim: &mut S) {
        if let Some(actor) = sim.participant_actor(participant) {
            sim.remove_actor(actor);
        }
        sim.remove_participant(participant);
        info!("Participant {} left", participant);

        self.broadcast(&Message::ParticipantLeft(ParticipantLeft {
            tick: sim.tick(),
            participant,
        }));
        if sim.participant_count() == 0 {
            sim.set_round_state(RoundState::Idle, 0);
        }
        self.publish_events(sim);
    }

    fn broadcast(&mut self, message: &Message) {
        if self.connections.is_empty() {
            return;
        }
        self.scratch.clear();
        message.encode_frame(&mut self.scratch);
        for conn in self.connections.iter_mut().filter(|c| c.fault().is_none()) {
            conn.queue_bytes(self.scratch.as_slice());
        }
    }

    fn handle_authority<S: Simulation>(&mut self, index: usize, message: Message, sim: &mut S) -> Dispatch {
        match message {
            Message::Hello(hello) => self.on_hello(index, hello, sim),
            Message::DirectionRequest(request) => self.on_direction(index, request, sim),
            Message::Ping(ping) => {
                self.connections[index].queue(&Message::Pong(Pong { timestamp: ping.timestamp }));
            }
            other => return Dispatch::Unhandled(other.kind()),
        }
        Dispatch::Handled
    }

    fn on_hello<S: Simulation>(&mut self, index: usize, hello: Hello, sim: &mut S) {
        let conn = &mut self.connections[index];
        if hello.version != NETWORK_VERSION {
            warn!(
                "Rejecting {}: protocol version {} (expected {})",
                conn.peer_name(),
                hello.version,
                NETWORK_VERSION
            );
            conn.set_fault(format!("protocol version {} not supported", hello.version));
            return;
        }
        if conn.participant().is_some() {
            debug!("Ignoring repeated hello on {}", conn.id());
            return;
        }

        let first = sim.participant_count() == 0;
        let Some(participant) = sim.add_participant(&hello.name) else {
            warn!("Roster full, rejecting {} ({})", hello.name, conn.peer_name());
            conn.set_fault("roster full");
            return;
        };
        conn.set_participant(participant);
        info!("Participant {} '{}' joined on {}", participant, hello.name, conn.id());

        if !first && sim.round_state() == RoundState::Running {
            if let Some(actor) = sim.create_actor(participant, GridVec2::ZERO) {
                sim.set_participant_actor(participant, Some(actor));
            }
        }

        // The snapshot goes first: the joiner drops everything queued before
        // it, and the rosters are not part of it.
        let tick = sim.tick();
        let conn = &mut self.connections[index];
        conn.queue(&Message::LocalIdentity(LocalIdentity { participant }));
        conn.queue(&Message::StateSnapshot(sim.snapshot()));
        self.broadcast(&Message::ParticipantRoster(ParticipantRosterUpdate {
            tick,
            roster: sim.participant_roster(),
        }));
        self.broadcast(&Message::ActorRoster(ActorRosterUpdate {
            tick,
            actors: sim.actor_roster(),
        }));

        if first || sim.round_state() == RoundState::Restarting {
            sim.restart_round(self.restart_delay);
        }
    }

    fn on_direction<S: Simulation>(&mut self, index: usize, request: DirectionRequest, sim: &mut S) {
        let Some(participant) = self.connections[index].participant() else {
            return;
        };
        let Some(actor) = sim.participant_actor(participant) else {
            return;
        };
        if !sim.can_turn(actor, request.direction) {
            debug!("Participant {} cannot turn to {}", participant, request.direction);
            return;
        }
        sim.set_direction(actor, request.direction);
        self.broadcast(&Message::ActorDirection(ActorDirection {
            tick: sim.tick(),
            actor,
            direction: request.direction,
        }));
    }

    // =========================================================================
    // FOLLOWER
    // =========================================================================

    fn poll_follower<S: Simulation>(&mut self, sim: &mut S) -> Result<(), NetworkError> {
        let Some(conn) = self.connections.first_mut() else {
            return Err(NetworkError::Disconnected("no connection".to_string()));
        };

        if let Some(status) = conn.poll_status() {
            info!("Authority link {} is {}", conn.peer_name(), status);
            if status == TransportStatus::Connected {
                self.connected_once = true;
                conn.queue(&Message::Hello(Hello {
                    version: NETWORK_VERSION,
                    name: self.config.player_name.clone(),
                }));
            }
        }

        match conn.last_status() {
            TransportStatus::Connected => {}
            TransportStatus::Closed => {
                let reason = conn.transport_error().unwrap_or("connection closed").to_string();
                return Err(if self.connected_once {
                    NetworkError::Disconnected(reason)
                } else {
                    NetworkError::ConnectFailed(reason)
                });
            }
            _ => return Ok(()),
        }
        if let Some(fault) = conn.fault() {
            return Err(NetworkError::Disconnected(fault.to_string()));
        }

        let outcome = conn
            .receive()
            .map_err(|e| NetworkError::Disconnected(e.to_string()))?;
        let frames = conn.drain_inbound(&self.scanner)?;

        for frame in frames {
            match frame {
                Inbound::Message(message) => {
                    if let Dispatch::Unhandled(kind) = self.handle_follower(message, sim) {
                        debug!("Follower ignoring {:?}", kind);
                    }
                }
                Inbound::Unknown(tag) => warn!("Skipping unknown message type {} from authority", tag),
            }
        }

        if outcome == ReceiveOutcome::Disconnected {
            return Err(NetworkError::Disconnected("authority closed the connection".to_string()));
        }

        self.maybe_ping();
        self.replay_due(sim);
        Ok(())
    }

    fn handle_follower<S: Simulation>(&mut self, message: Message, sim: &mut S) -> Dispatch {
        match message {
            // Baseline: applied on arrival.
            Message::TickHeartbeat(m) => {
                self.last_known_tick = self.last_known_tick.max(m.tick);
            }
            Message::LocalIdentity(m) => {
                info!("Playing as participant {}", m.participant);
                self.local_participant = Some(m.participant);
                sim.set_local_participant(Some(m.participant));
            }
            Message::StateSnapshot(snapshot) => {
                // Anything that arrived earlier is already part of the snapshot.
                let dropped = self.replay.len();
                self.replay.clear();
                sim.apply_snapshot(&snapshot);
                self.last_known_tick = self.last_known_tick.max(snapshot.tick);
                self.synced = true;
                info!("Snapshot applied at tick {} ({} stale events dropped)", snapshot.tick, dropped);
            }
            Message::Pong(m) => {
                let rtt = (self.clock.now() - m.timestamp) * 1000.0;
                debug!("RTT {:.1} ms", rtt);
                self.rtt_ms = Some(rtt);
            }

            // Events: replayed at their tick.
            Message::ActorDirection(m) => self.replay.push(
                m.tick,
                ReplayEffect::SetDirection { actor: m.actor, direction: m.direction },
            ),
            Message::RoundStateChange(m) => self.replay.push(
                m.tick,
                ReplayEffect::RoundState { state: m.state, delay: m.delay },
            ),
            Message::RoundRestart(m) => {
                self.replay.push(m.tick, ReplayEffect::RoundRestart { delay: m.delay })
            }
            Message::RoundStart(m) => self.replay.push(m.tick, ReplayEffect::RoundStart),
            Message::ActorRoster(m) => self.replay.push(m.tick, ReplayEffect::ActorRoster(m.actors)),
            Message::ParticipantRoster(m) => {
                self.replay.push(m.tick, ReplayEffect::ParticipantRoster(m.roster))
            }
            Message::ParticipantLeft(m) => {
                self.replay.push(m.tick, ReplayEffect::ParticipantLeft(m.participant))
            }

            other => return Dispatch::Unhandled(other.kind()),
        }
        Dispatch::Handled
    }

    fn maybe_ping(&mut self) {
        let now = self.clock.now();
        let interval = self.config.ping_interval_secs;
        if self.last_ping.is_some_and(|at| now - at < interval) {
            return;
        }
        self.last_ping = Some(now);
        if let Some(conn) = self.connections.first_mut() {
            conn.queue(&Message::Ping(Ping { timestamp: now }));
        }
    }

    /// Apply queued events due at the tick about to run.
    fn replay_due<S: Simulation>(&mut self, sim: &mut S) {
        if !self.synced {
            return;
        }
        for effect in self.replay.drain_through(sim.tick()) {
            effect.apply(sim);
        }
    }
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("role", &self.role)
            .field("connections", &self.connections)
            .field("last_known_tick", &self.last_known_tick)
            .field("synced", &self.synced)
            .field("pending_replay", &self.replay.len())
            .finish()
    }
}
