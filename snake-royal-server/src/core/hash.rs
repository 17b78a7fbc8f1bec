//! State Hashing
//!
//! SHA-256 digest of the simulation state. Authority and followers that
//! applied the same events at the same ticks produce the same digest, so
//! tests compare digests and the binary logs a short hex prefix.

use sha2::{Digest, Sha256};

use super::vec2::GridVec2;

/// 32-byte digest.
pub type StateHash = [u8; 32];

const DOMAIN: &[u8] = b"SNAKE_ROYAL_STATE_V1";

/// Incremental state digest. Field order is part of the hash.
pub struct StateHasher {
    digest: Sha256,
}

impl Default for StateHasher {
    fn default() -> Self {
        let mut digest = Sha256::new();
        digest.update(DOMAIN);
        Self { digest }
    }
}

impl StateHasher {
    /// Raw bytes.
    pub fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.digest.update(bytes);
        self
    }

    /// One byte.
    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.bytes(&[value])
    }

    /// Little-endian u32.
    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    /// Little-endian u64.
    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    /// Grid vector as two little-endian i32.
    pub fn vec2(&mut self, value: GridVec2) -> &mut Self {
        self.bytes(&value.x.to_le_bytes()).bytes(&value.y.to_le_bytes())
    }

    /// Finish the digest.
    pub fn finish(self) -> StateHash {
        self.digest.finalize().into()
    }
}

/// Digest of `tick`, `rng_state`, then whatever `add_state` feeds in.
pub fn compute_state_hash<F>(tick: u32, rng_state: u64, add_state: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::default();
    hasher.u32(tick).u64(rng_state);
    add_state(&mut hasher);
    hasher.finish()
}

/// First eight bytes as hex, for logs.
pub fn short_hex(hash: &StateHash) -> String {
    hex::encode(&hash[..8])
}
