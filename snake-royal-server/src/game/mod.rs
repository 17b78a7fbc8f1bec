//! Game Logic Module
//!
//! Headless snake simulation driven by the network layer. Deterministic:
//! the authority and every follower produce the same grid from the same
//! snapshot and events.
//!
//! ## Module Structure
//!
//! - `map`: Tile grid and food placement
//! - `players`: Participant roster
//! - `snakes`: Snake movement and collision
//! - `state`: Session state, round state machine, snapshots
//! - `tick`: One simulation step
//! - `events`: Round transitions for broadcast

pub mod map;
pub mod players;
pub mod snakes;
pub mod state;
pub mod tick;
pub mod events;

// Re-export key types
pub use map::{Color, Tile, TileKind, TileMap, TILE_COUNT};
pub use players::{ActorId, ParticipantId, ParticipantRecord, ParticipantRoster, Players};
pub use snakes::{ActorHead, ActorRecord, ActorState, Snakes};
pub use state::{GameState, RoundData, RoundState, Snapshot};
pub use tick::TickResult;
pub use events::{SimEvent, SimEventData};
