//! Game Events
//!
//! Round transitions recorded by the simulation. The authority's network
//! layer turns each one into a broadcast so followers can replay it at the
//! same tick.

use serde::{Serialize, Deserialize};

use crate::game::state::RoundState;

/// Event payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimEventData {
    /// Round state changed; the deadline is `tick + delay`.
    RoundStateChanged {
        /// New state.
        state: RoundState,
        /// Ticks until the deadline.
        delay: u32,
    },

    /// Round restart scheduled.
    RoundRestarted {
        /// Ticks until the next round starts.
        delay: u32,
    },

    /// New round started: grid cleared, snakes spawned, food placed.
    RoundStarted,
}

/// An event stamped with the tick it happened at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimEvent {
    /// Tick the event was produced at.
    pub tick: u32,
    /// What happened.
    pub data: SimEventData,
}

impl SimEvent {
    /// Create an event.
    pub fn new(tick: u32, data: SimEventData) -> Self {
        Self { tick, data }
    }
}
