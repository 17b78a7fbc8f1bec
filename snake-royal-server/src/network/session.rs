//! Session Driver
//!
//! Couples a [`Network`] with the simulation it synchronizes and runs the
//! per-frame loop. The authority advances one tick per update. A follower
//! advances toward the last tick the authority announced, but never more
//! than `catch_up_steps` ticks per update so a long stall does not freeze
//! the frame.

use tracing::{debug, error};

use crate::config::SessionConfig;
use crate::network::orchestrator::{Network, NetworkError, Role};
use crate::network::simulation::Simulation;

/// Session errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Network failure (follower side).
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Follower simulated past the authority. State can no longer match.
    #[error("follower tick {tick} ran past authority tick {authority}")]
    TickOverrun {
        /// Follower tick after the step.
        tick: u32,
        /// Last tick announced by the authority.
        authority: u32,
    },
}

/// A simulation and the network keeping it in sync.
#[derive(Debug)]
pub struct Session<S: Simulation> {
    network: Network,
    sim: S,
    config: SessionConfig,
}

impl<S: Simulation> Session<S> {
    /// Create a session. The network uses the session's restart delay.
    pub fn new(mut network: Network, sim: S, config: SessionConfig) -> Self {
        network.set_restart_delay(config.restart_delay_ticks);
        Self { network, sim, config }
    }

    /// One frame: run as many ticks as the role allows, with one network
    /// cycle before each.
    ///
    /// A follower also polls once up front to learn how far behind it is.
    /// Returns the number of ticks simulated.
    pub fn update(&mut self) -> Result<u32, SessionError> {
        let follower = self.network.role() == Role::Follower;
        let steps = if follower {
            self.network.poll(&mut self.sim)?;
            self.network
                .catch_up_gap(self.sim.tick())
                .min(self.config.catch_up_steps)
        } else {
            1
        };

        let mut ran = 0;
        for _ in 0..steps {
            self.network.poll(&mut self.sim)?;

            let authority_tick = self.network.last_known_tick();
            if follower && self.sim.tick() >= authority_tick {
                break;
            }

            self.sim.step(!follower);
            self.network.publish_events(&mut self.sim);
            ran += 1;

            if follower && self.sim.tick() > authority_tick {
                error!(
                    "Follower tick {} ran past authority tick {}",
                    self.sim.tick(),
                    authority_tick
                );
                return Err(SessionError::TickOverrun {
                    tick: self.sim.tick(),
                    authority: authority_tick,
                });
            }

            self.network.flush();
        }

        if ran > 1 {
            debug!("Caught up {} ticks to {}", ran, self.sim.tick());
        }
        Ok(ran)
    }

    /// Poll without stepping.
    pub fn poll(&mut self) -> Result<(), SessionError> {
        self.network.poll(&mut self.sim)?;
        Ok(())
    }

    /// Send queued output.
    pub fn flush(&mut self) {
        self.network.flush();
    }

    /// Close the network.
    pub fn shutdown(&mut self) {
        self.network.shutdown();
    }

    /// Simulation.
    pub fn sim(&self) -> &S {
        &self.sim
    }

    /// Simulation, mutably.
    pub fn sim_mut(&mut self) -> &mut S {
        &mut self.sim
    }

    /// Network.
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Network, mutably.
    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    /// Loop settings.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::config::NetworkConfig;
    use crate::core::buffer::ByteBuffer;
    use crate::core::vec2::GridVec2;
    use crate::game::state::{GameState, RoundState};
    use crate::network::frame::FrameScanner;
    use crate::network::protocol::{Message, MessageKind, TickHeartbeat};
    use crate::network::transport::{MemoryListener, MemoryTransport, ReceiveOutcome, Transport};

    fn session_config(restart_delay: u32) -> SessionConfig {
        SessionConfig {
            restart_delay_ticks: restart_delay,
            ..SessionConfig::default()
        }
    }

    #[test]
    fn test_inactive_steps_once_per_update() {
        let network = Network::inactive(NetworkConfig::default());
        let mut session = Session::new(network, GameState::new(1, 60), SessionConfig::default());
        for expected in 1..=3 {
            assert_eq!(session.update().unwrap(), 1);
            assert_eq!(session.sim().tick(), expected);
        }
    }

    #[test]
    fn test_authority_sends_one_heartbeat_per_tick() {
        let (listener, connector) = MemoryListener::open();
        let mut session = Session::new(
            Network::authority(Box::new(listener), NetworkConfig::default()),
            GameState::new(1, 60),
            SessionConfig::default(),
        );
        let mut peer = connector.connect();

        for _ in 0..3 {
            assert_eq!(session.update().unwrap(), 1);
        }
        session.flush();

        let mut inbound = ByteBuffer::new();
        let mut buf = vec![0u8; 4096];
        while let Ok(ReceiveOutcome::Data(n)) = peer.receive(&mut buf) {
            inbound.write(&buf[..n]);
        }
        let mut heartbeats = Vec::new();
        FrameScanner::default()
            .scan(&mut inbound, |header, payload| {
                if header.message_type == MessageKind::TickHeartbeat.tag() {
                    if let Message::TickHeartbeat(m) = Message::decode(MessageKind::TickHeartbeat, payload)? {
                        heartbeats.push(m.tick);
                    }
                }
                Ok(())
            })
            .unwrap();
        assert_eq!(heartbeats, vec![0, 1, 2]);
        assert_eq!(session.sim().connections_seen(), 1);
    }

    #[test]
    fn test_follower_waits_for_snapshot() {
        let (local, _remote) = MemoryTransport::pair();
        let network = Network::follower(Box::new(local), NetworkConfig::default());
        let mut session = Session::new(network, GameState::new(1, 60), SessionConfig::default());
        assert_eq!(session.update().unwrap(), 0);
        assert_eq!(session.sim().tick(), 0);
    }

    #[test]
    fn test_follower_catch_up_is_bounded() {
        let (local, mut remote) = MemoryTransport::pair();
        let network = Network::follower(Box::new(local), NetworkConfig::default());
        let mut session = Session::new(network, GameState::new(1, 60), SessionConfig::default());

        let source = GameState::new(5, 60);
        let mut out = ByteBuffer::new();
        Message::StateSnapshot(source.snapshot()).encode_frame(&mut out);
        Message::TickHeartbeat(TickHeartbeat { tick: 10 }).encode_frame(&mut out);
        remote.send(out.as_slice()).unwrap();

        let mut ticks = Vec::new();
        let mut steps = Vec::new();
        for _ in 0..4 {
            steps.push(session.update().unwrap());
            ticks.push(session.sim().tick());
        }
        assert_eq!(steps, vec![4, 4, 2, 0]);
        assert_eq!(ticks, vec![4, 8, 10, 10]);
    }

    #[test]
    fn test_follower_reports_lost_authority() {
        let (local, remote) = MemoryTransport::pair();
        let network = Network::follower(Box::new(local), NetworkConfig::default());
        let mut session = Session::new(network, GameState::new(1, 60), SessionConfig::default());
        session.update().unwrap();

        drop(remote);
        assert!(matches!(
            session.update(),
            Err(SessionError::Network(NetworkError::Disconnected(_)))
        ));
    }

    #[test]
    fn test_authority_and_follower_stay_in_sync() {
        let (listener, connector) = MemoryListener::open();
        let mut authority = Session::new(
            Network::authority(Box::new(listener), NetworkConfig::default()),
            GameState::new(42, 5),
            session_config(5),
        );
        // Let the authority run alone for a while first.
        for _ in 0..7 {
            authority.update().unwrap();
        }

        let mut follower = Session::new(
            Network::follower(Box::new(connector.connect()), NetworkConfig::default()),
            GameState::new(7, 5),
            session_config(5),
        );

        let mut recorded: BTreeMap<u32, [u8; 32]> = BTreeMap::new();
        let mut compared = 0;
        let mut turned = false;

        for _ in 0..120 {
            authority.poll().unwrap();
            recorded.insert(authority.sim().tick(), authority.sim().state_hash());
            authority.update().unwrap();
            authority.flush();

            follower.update().unwrap();
            follower.flush();
            follower.poll().unwrap();

            if !follower.network().is_synced() {
                continue;
            }
            let tick = follower.sim().tick();
            if let Some(expected) = recorded.get(&tick) {
                assert_eq!(
                    &follower.sim().state_hash(),
                    expected,
                    "state diverged at tick {}",
                    tick
                );
                compared += 1;
            }

            if !turned && follower.sim().round_state() == RoundState::Running {
                turned = follower.network_mut().request_direction(GridVec2::RIGHT);
                follower.flush();
            }
        }

        assert!(turned);
        assert!(compared > 100);
        assert_eq!(authority.sim().participant_count(), 1);
        assert_eq!(follower.network().local_participant(), Some(0));
        let actor = authority.sim().participant_actor(0).unwrap();
        assert_eq!(
            authority.sim().snakes().get(actor).unwrap().head.direction,
            GridVec2::RIGHT
        );
    }
}
