//! Shared Random Number Generator
//!
//! Park-Miller minimal standard generator. The authority seeds it and ships
//! the state inside every snapshot, so followers draw the exact same sequence
//! while replaying rounds (food placement).

use serde::{Serialize, Deserialize};

/// Park-Miller modulus (2^31 - 1).
pub const PARK_MILLER_MODULUS: u64 = 0x7fff_ffff;

/// Park-Miller multiplier.
pub const PARK_MILLER_MULTIPLIER: u64 = 48_271;

/// Deterministic PRNG shared between authority and followers.
///
/// # Example
///
/// ```
/// use snake_royal::core::rng::ParkMiller;
///
/// let mut rng = ParkMiller::new(1);
/// assert_eq!(rng.next_u32(), 48_271);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkMiller {
    state: u64,
}

impl Default for ParkMiller {
    fn default() -> Self {
        Self::new(1)
    }
}

impl ParkMiller {
    /// Create a generator from a seed. Zero (a fixed point) is mapped to 1.
    pub fn new(seed: u64) -> Self {
        let state = seed % PARK_MILLER_MODULUS;
        Self {
            state: if state == 0 { 1 } else { state },
        }
    }

    /// Seed from the wall clock, for a freshly started authority.
    pub fn from_time() -> Self {
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(1);
        Self::new(seed)
    }

    /// Advance and return the next value in `[1, 2^31 - 1)`.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.state = (self.state * PARK_MILLER_MULTIPLIER) % PARK_MILLER_MODULUS;
        self.state as u32
    }

    /// Random integer in `[0, max)`. Returns 0 when `max` is 0.
    #[inline]
    pub fn next_below(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        self.next_u32() % max
    }

    /// Current state (shipped in snapshots).
    pub fn state(&self) -> u64 {
        self.state
    }

    /// Restore a state received from the authority.
    pub fn set_state(&mut self, state: u64) {
        *self = Self::new(state);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_determinism() {
        let mut rng1 = ParkMiller::new(12345);
        let mut rng2 = ParkMiller::new(12345);

        for _ in 0..1000 {
            assert_eq!(rng1.next_u32(), rng2.next_u32());
        }
    }

    #[test]
    fn test_rng_known_values() {
        // Minimal standard sequence from seed 1. Must never change,
        // followers rely on drawing the same numbers.
        let mut rng = ParkMiller::new(1);
        assert_eq!(rng.next_u32(), 48_271);
        assert_eq!(rng.next_u32(), 182_605_794);
        assert_eq!(rng.next_u32(), 1_291_394_886);
    }

    #[test]
    fn test_zero_seed_does_not_stall() {
        let mut rng = ParkMiller::new(0);
        assert_ne!(rng.next_u32(), 0);
    }

    #[test]
    fn test_state_roundtrip() {
        let mut rng = ParkMiller::new(777);
        rng.next_u32();
        let mut copy = ParkMiller::default();
        copy.set_state(rng.state());
        assert_eq!(copy.next_u32(), rng.next_u32());
    }

    #[test]
    fn test_next_below_range() {
        let mut rng = ParkMiller::new(99);
        for _ in 0..500 {
            assert!(rng.next_below(48) < 48);
        }
        assert_eq!(rng.next_below(0), 0);
    }
}
