//! Game State
//!
//! Everything a session simulates: tick counter, shared RNG, round state
//! machine, tile grid, participants and snakes. `GameState` is the concrete
//! [`Simulation`] the network layer drives.

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::hash::{compute_state_hash, StateHash};
use crate::core::rng::ParkMiller;
use crate::core::vec2::GridVec2;
use crate::game::events::{SimEvent, SimEventData};
use crate::game::map::{Color, Tile, TileKind, TileMap, ROUND_FOOD_COUNT};
use crate::game::players::{ActorId, ParticipantId, ParticipantRecord, ParticipantRoster, Players};
use crate::game::snakes::{ActorRecord, ActorState, Snakes};
use crate::game::tick;
use crate::network::simulation::Simulation;
use crate::{DEFAULT_RESTART_DELAY_TICKS, TILE_MAP_HEIGHT, TILE_MAP_WIDTH};

// =============================================================================
// ROUND
// =============================================================================

/// Round lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RoundState {
    /// Nobody playing.
    #[default]
    Idle = 1,
    /// Snakes moving.
    Running = 2,
    /// Waiting for the deadline to start the next round.
    Restarting = 3,
}

impl RoundState {
    /// Decode from the wire value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(RoundState::Idle),
            2 => Some(RoundState::Running),
            3 => Some(RoundState::Restarting),
            _ => None,
        }
    }
}

/// Round state plus its deadline tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoundData {
    /// Current state.
    pub state: RoundState,
    /// Tick at which a restart turns into a new round.
    pub deadline: u32,
}

/// Full state handed to a joining follower.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    /// Tick about to run.
    pub tick: u32,
    /// Shared generator state.
    pub rng_state: u64,
    /// Round state and deadline.
    pub round: RoundData,
    /// Whole grid, row-major.
    pub tiles: Vec<Tile>,
}

// =============================================================================
// GAME STATE
// =============================================================================

/// Simulation state for one session.
#[derive(Clone, Debug)]
pub struct GameState {
    tick: u32,
    rng: ParkMiller,
    round: RoundData,
    map: TileMap,
    players: Players,
    snakes: Snakes,
    restart_delay: u32,
    events: Vec<SimEvent>,
    connections_seen: u32,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(1, DEFAULT_RESTART_DELAY_TICKS)
    }
}

impl GameState {
    /// Fresh state at tick 0 with an idle round.
    ///
    /// `restart_delay` is used when the authority restarts a round on its own
    /// (all snakes dead).
    pub fn new(seed: u64, restart_delay: u32) -> Self {
        Self {
            tick: 0,
            rng: ParkMiller::new(seed),
            round: RoundData::default(),
            map: TileMap::new(),
            players: Players::new(),
            snakes: Snakes::new(),
            restart_delay,
            events: Vec::new(),
            connections_seen: 0,
        }
    }

    /// Round state and deadline.
    pub fn round(&self) -> RoundData {
        self.round
    }

    /// Connections the authority accepted for this state. Not part of the
    /// shared state.
    pub fn connections_seen(&self) -> u32 {
        self.connections_seen
    }

    /// Configured restart delay.
    pub fn restart_delay(&self) -> u32 {
        self.restart_delay
    }

    /// Tile grid.
    pub fn map(&self) -> &TileMap {
        &self.map
    }

    /// Participants.
    pub fn players(&self) -> &Players {
        &self.players
    }

    /// Snakes.
    pub fn snakes(&self) -> &Snakes {
        &self.snakes
    }

    /// Score of a participant: square of its snake's length.
    pub fn score(&self, id: ParticipantId) -> u32 {
        self.players
            .get(id)
            .and_then(|p| p.actor)
            .and_then(|actor| self.snakes.get(actor))
            .map(|snake| (snake.len() as u32).pow(2))
            .unwrap_or(0)
    }

    /// Advance the snakes one cell (only while a round is running).
    pub(crate) fn update_snakes(&mut self) {
        if self.round.state == RoundState::Running {
            self.snakes.update(&mut self.map, &self.players, &mut self.rng);
        }
    }

    pub(crate) fn advance_tick(&mut self) {
        self.tick += 1;
    }

    fn push_event(&mut self, data: SimEventData) {
        self.events.push(SimEvent::new(self.tick, data));
    }

    /// Paint an actor received from the authority onto the grid.
    fn paint_actor(&mut self, actor: &ActorRecord) {
        let color = match actor.head.state {
            ActorState::Dead => Color::GREY,
            _ => self.players.color(actor.head.owner),
        };
        for (index, piece) in actor.path.iter().enumerate() {
            let kind = match (actor.head.state, index) {
                (ActorState::Dead, _) => TileKind::SnakeDead,
                (_, 0) => TileKind::SnakeHead,
                _ => TileKind::SnakeTail,
            };
            self.map.set(*piece, kind, color);
        }
    }

    /// SHA-256 over everything that must match between authority and followers.
    pub fn state_hash(&self) -> StateHash {
        compute_state_hash(self.tick, self.rng.state(), |hasher| {
            hasher.u8(self.round.state as u8).u32(self.round.deadline);
            for tile in self.map.tiles() {
                hasher.u8(tile.kind as u8).bytes(&[tile.color.r, tile.color.g, tile.color.b]);
            }
            for snake in self.snakes.iter() {
                hasher
                    .u8(snake.head.id)
                    .u8(snake.head.state as u8)
                    .u8(snake.head.owner)
                    .vec2(snake.head.direction)
                    .u32(snake.path.len() as u32);
                for piece in &snake.path {
                    hasher.vec2(*piece);
                }
            }
            for player in self.players.iter() {
                hasher
                    .u8(player.id)
                    .u8(player.actor.unwrap_or(u8::MAX))
                    .bytes(player.name.as_bytes());
            }
        })
    }
}

impl Simulation for GameState {
    fn tick(&self) -> u32 {
        self.tick
    }

    fn step(&mut self, authoritative: bool) {
        tick::tick(self, authoritative);
    }

    fn connection_joined(&mut self, peer: &str) {
        self.connections_seen += 1;
        debug!(tick = self.tick, peer, "Connection joined");
    }

    fn add_participant(&mut self, name: &str) -> Option<ParticipantId> {
        self.players.add(name)
    }

    fn remove_participant(&mut self, id: ParticipantId) {
        if let Some(actor) = self.participant_actor(id) {
            self.snakes.remove(actor, &mut self.map);
        }
        self.players.remove(id);
    }

    fn participant_count(&self) -> usize {
        self.players.count()
    }

    fn participant_actor(&self, id: ParticipantId) -> Option<ActorId> {
        self.players.get(id).and_then(|p| p.actor)
    }

    fn set_participant_actor(&mut self, id: ParticipantId, actor: Option<ActorId>) {
        self.players.set_actor(id, actor);
    }

    fn set_local_participant(&mut self, id: Option<ParticipantId>) {
        self.players.set_local(id);
    }

    fn participant_roster(&self) -> ParticipantRoster {
        self.players.roster()
    }

    fn apply_participant_roster(&mut self, roster: &[Option<ParticipantRecord>]) {
        self.players.apply_roster(roster);
    }

    fn create_actor(&mut self, owner: ParticipantId, spawn: GridVec2) -> Option<ActorId> {
        let color = self.players.color(owner);
        self.snakes.create(owner, spawn, color, &mut self.map)
    }

    fn remove_actor(&mut self, id: ActorId) {
        self.snakes.remove(id, &mut self.map);
    }

    fn can_turn(&self, actor: ActorId, direction: GridVec2) -> bool {
        self.snakes.can_turn(actor, direction)
    }

    fn set_direction(&mut self, actor: ActorId, direction: GridVec2) {
        self.snakes.set_direction(actor, direction);
    }

    fn actor_roster(&self) -> Vec<ActorRecord> {
        self.snakes.roster()
    }

    fn apply_actor_roster(&mut self, actors: &[ActorRecord]) {
        // Actors that vanished are cleared from the grid, new ones painted on.
        let stale: Vec<ActorId> = self
            .snakes
            .iter()
            .map(|s| s.head.id)
            .filter(|id| !actors.iter().any(|a| a.head.id == *id))
            .collect();
        for id in stale {
            self.snakes.remove(id, &mut self.map);
        }
        let fresh: Vec<&ActorRecord> = actors
            .iter()
            .filter(|a| self.snakes.get(a.head.id).is_none())
            .collect();
        for actor in fresh {
            self.paint_actor(actor);
        }
        self.snakes.apply_roster(actors);
    }

    fn round_state(&self) -> RoundState {
        self.round.state
    }

    fn set_round_state(&mut self, state: RoundState, delay: u32) {
        self.round = RoundData {
            state,
            deadline: self.tick + delay,
        };
        self.push_event(SimEventData::RoundStateChanged { state, delay });
    }

    fn restart_round(&mut self, delay: u32) {
        debug!(tick = self.tick, delay, "Round restart scheduled");
        self.set_round_state(RoundState::Restarting, delay);
        self.push_event(SimEventData::RoundRestarted { delay });
    }

    fn start_round(&mut self) {
        debug!(tick = self.tick, players = self.players.count(), "Round start");
        self.map.reset();

        let spawn_y = TILE_MAP_HEIGHT / 2;
        let spacing = TILE_MAP_WIDTH / (self.players.count() as i32 + 1);
        let mut spawn_x = spacing;

        let ids: Vec<ParticipantId> = self.players.iter().map(|p| p.id).collect();
        for id in ids {
            if let Some(old) = self.participant_actor(id) {
                self.snakes.remove(old, &mut self.map);
            }
            let actor = self.create_actor(id, GridVec2::new(spawn_x, spawn_y));
            self.players.set_actor(id, actor);
            spawn_x += spacing;
        }

        for _ in 0..ROUND_FOOD_COUNT {
            self.map.spawn_food(&mut self.rng);
        }

        self.set_round_state(RoundState::Running, 0);
        self.push_event(SimEventData::RoundStarted);
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.tick,
            rng_state: self.rng.state(),
            round: self.round,
            tiles: self.map.tiles().to_vec(),
        }
    }

    fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        self.tick = snapshot.tick;
        self.rng.set_state(snapshot.rng_state);
        self.round = snapshot.round;
        self.map.set_tiles(&snapshot.tiles);
    }

    fn take_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restart_records_events_in_order() {
        let mut game = GameState::new(5, 60);
        game.restart_round(60);

        assert_eq!(game.round(), RoundData { state: RoundState::Restarting, deadline: 60 });
        let events = game.take_events();
        assert_eq!(
            events,
            vec![
                SimEvent::new(0, SimEventData::RoundStateChanged { state: RoundState::Restarting, delay: 60 }),
                SimEvent::new(0, SimEventData::RoundRestarted { delay: 60 }),
            ]
        );
        assert!(game.take_events().is_empty());
    }

    #[test]
    fn test_start_round_spawns_evenly() {
        let mut game = GameState::new(5, 60);
        game.add_participant("ada");
        game.add_participant("bob");
        game.add_participant("cy");
        game.start_round();

        assert_eq!(game.round_state(), RoundState::Running);
        assert_eq!(game.snakes().count(), 3);
        let heads: Vec<GridVec2> = game.snakes().iter().map(|s| s.path[0]).collect();
        assert_eq!(
            heads,
            vec![GridVec2::new(12, 16), GridVec2::new(24, 16), GridVec2::new(36, 16)]
        );
        assert_eq!(game.map().count(TileKind::Food), ROUND_FOOD_COUNT);
        for id in 0..3 {
            assert!(game.participant_actor(id).is_some());
            assert_eq!(game.score(id), 1);
        }
    }

    #[test]
    fn test_remove_participant_removes_actor() {
        let mut game = GameState::new(5, 60);
        let id = game.add_participant("ada").unwrap();
        game.start_round();
        let actor = game.participant_actor(id).unwrap();
        let head = game.snakes().get(actor).unwrap().path[0];

        game.remove_participant(id);
        assert_eq!(game.participant_count(), 0);
        assert_eq!(game.snakes().count(), 0);
        assert_eq!(game.map().get(head).kind, TileKind::Empty);
    }

    #[test]
    fn test_snapshot_roundtrip_matches_hash() {
        let mut authority = GameState::new(99, 60);
        let id = authority.add_participant("ada").unwrap();
        authority.start_round();

        let mut follower = GameState::new(1, 60);
        follower.apply_snapshot(&authority.snapshot());
        follower.apply_participant_roster(&authority.participant_roster());
        follower.apply_actor_roster(&authority.actor_roster());

        assert_eq!(follower.state_hash(), authority.state_hash());
        assert_eq!(follower.participant_actor(id), authority.participant_actor(id));
    }

    #[test]
    fn test_apply_actor_roster_paints_new_and_clears_stale() {
        let mut authority = GameState::new(3, 60);
        let ada = authority.add_participant("ada").unwrap();
        let actor = authority.create_actor(ada, GridVec2::new(4, 4)).unwrap();
        authority.set_participant_actor(ada, Some(actor));

        let mut follower = GameState::new(3, 60);
        follower.apply_participant_roster(&authority.participant_roster());
        follower.apply_actor_roster(&authority.actor_roster());
        assert_eq!(follower.map().get(GridVec2::new(4, 4)).kind, TileKind::SnakeHead);

        follower.apply_actor_roster(&[]);
        assert_eq!(follower.map().get(GridVec2::new(4, 4)).kind, TileKind::Empty);
    }

    #[test]
    fn test_state_hash_changes_with_tick() {
        let mut game = GameState::new(5, 60);
        let before = game.state_hash();
        game.step(true);
        assert_ne!(before, game.state_hash());
    }
}
