//! # Snake Royal Server
//!
//! Tick-synchronized multiplayer snake: one authority owns the simulation,
//! followers mirror it by replaying the authority's events at the tick they
//! were applied.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SNAKE ROYAL SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/             - Primitives                              │
//! │  ├── buffer.rs     - Growable / borrowed byte buffer         │
//! │  ├── vec2.rs       - Integer grid vector                     │
//! │  ├── rng.rs        - Park-Miller generator                   │
//! │  └── hash.rs       - State hashing for desync checks         │
//! │                                                              │
//! │  game/             - Simulation (deterministic)              │
//! │  ├── map.rs        - Tile grid                               │
//! │  ├── players.rs    - Participant roster                      │
//! │  ├── snakes.rs     - Snake movement and collision            │
//! │  ├── state.rs      - Round state machine, snapshots          │
//! │  ├── tick.rs       - One simulation step                     │
//! │  └── events.rs     - Round transitions                       │
//! │                                                              │
//! │  network/          - Replication                             │
//! │  ├── wire.rs       - Field codec and frame header            │
//! │  ├── protocol.rs   - Message catalogue                       │
//! │  ├── frame.rs      - Frame scanner                           │
//! │  ├── transport/    - TCP and in-memory transports            │
//! │  ├── connection.rs - Per-peer buffers                        │
//! │  ├── replay.rs     - Tick-ordered replay queue               │
//! │  ├── orchestrator.rs - Authority / follower cycles           │
//! │  └── session.rs    - Bounded catch-up driver                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Tick Ordering
//!
//! Every authority broadcast carries the tick it took effect at. The
//! authority sends `TickHeartbeat(H)` at the start of each cycle, before
//! anything stamped `H`, so once a follower has seen heartbeat `H + 1` it
//! holds every event up to `H` and may simulate through tick `H`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use config::{Config, ConfigError, NetworkConfig, SessionConfig};
pub use core::buffer::{ByteBuffer, OwnedBuffer};
pub use core::vec2::GridVec2;
pub use game::state::{GameState, RoundState};
pub use network::{Network, NetworkError, Role, Session, SessionError, Simulation};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol version exchanged in the handshake
pub const NETWORK_VERSION: u32 = 1;

/// Default TCP port
pub const DEFAULT_PORT: u16 = 11754;

/// Default bind address
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 20;

/// Roster slots
pub const MAX_PLAYERS: usize = 24;

/// Grid width in tiles
pub const TILE_MAP_WIDTH: i32 = 48;

/// Grid height in tiles
pub const TILE_MAP_HEIGHT: i32 = 32;

/// Bytes reserved per receive call
pub const DEFAULT_RECV_CHUNK_SIZE: usize = 64 * 1024;

/// Largest frame payload accepted by default
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 1 << 20;

/// Unsent bytes a connection may hold before it is dropped
pub const DEFAULT_MAX_PENDING_OUTPUT: usize = 8 * DEFAULT_MAX_PAYLOAD_SIZE;

/// Most ticks a follower simulates per update
pub const DEFAULT_CATCH_UP_STEPS: u32 = 4;

/// Ticks between a round ending and the next one starting
pub const DEFAULT_RESTART_DELAY_TICKS: u32 = 60;
