//! Simulation Tick
//!
//! One step of the game loop. Authority and followers run the same movement
//! code; only the authority decides round transitions, which followers then
//! receive as events stamped with the tick they take effect at.

use crate::game::state::{GameState, RoundState};
use crate::network::simulation::Simulation;

/// Result of a tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickResult {
    /// Tick that just ran.
    pub tick: u32,
    /// Snakes still moving afterwards.
    pub alive: usize,
    /// Round state after the tick (including any transition).
    pub round_state: RoundState,
}

/// Run one simulation tick and advance the tick counter.
///
/// Round transitions are evaluated after the counter moves on, so their
/// events carry the tick of the next step. A follower replays them right
/// before running that step, which is exactly the point where the authority
/// applied them.
pub fn tick(state: &mut GameState, authoritative: bool) -> TickResult {
    let ran = state.tick();

    state.update_snakes();
    state.advance_tick();

    if authoritative {
        let round = state.round();
        match round.state {
            RoundState::Restarting if state.tick() >= round.deadline => state.start_round(),
            RoundState::Running => {
                let snakes = state.snakes();
                if snakes.count() > 0 && snakes.alive() == 0 {
                    let delay = state.restart_delay();
                    state.restart_round(delay);
                }
            }
            _ => {}
        }
    }

    TickResult {
        tick: ran,
        alive: state.snakes().alive(),
        round_state: state.round_state(),
    }
}
