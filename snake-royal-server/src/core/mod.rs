//! Core primitives.
//!
//! Byte buffers for the network layer plus the small deterministic building
//! blocks (grid vectors, shared RNG, state hashing) the simulation relies on.

pub mod buffer;
pub mod vec2;
pub mod rng;
pub mod hash;

// Re-export core types
pub use buffer::{ByteBuffer, OwnedBuffer, Seek};
pub use vec2::GridVec2;
pub use rng::ParkMiller;
pub use hash::{compute_state_hash, short_hex, StateHash, StateHasher};
