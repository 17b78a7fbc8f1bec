//! Tick Replay Queue
//!
//! Follower side buffering of authority events. Each event is keyed by the
//! tick it must be applied at and replayed just before that tick runs, so
//! the follower applies it at the same point in the simulation as the
//! authority did.

use std::collections::BTreeMap;

use crate::core::vec2::GridVec2;
use crate::game::players::{ActorId, ParticipantId, ParticipantRoster};
use crate::game::snakes::ActorRecord;
use crate::game::state::RoundState;
use crate::network::simulation::Simulation;

/// Deferred simulation mutation received from the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayEffect {
    /// An actor turned.
    SetDirection {
        /// Actor.
        actor: ActorId,
        /// New direction.
        direction: GridVec2,
    },
    /// Round state changed.
    RoundState {
        /// New state.
        state: RoundState,
        /// Deadline offset.
        delay: u32,
    },
    /// Round restart scheduled.
    RoundRestart {
        /// Ticks until the next round.
        delay: u32,
    },
    /// Round started.
    RoundStart,
    /// Full actor list.
    ActorRoster(Vec<ActorRecord>),
    /// Full participant list.
    ParticipantRoster(ParticipantRoster),
    /// A participant left.
    ParticipantLeft(ParticipantId),
}

impl ReplayEffect {
    /// Apply to the simulation.
    pub fn apply<S: Simulation + ?Sized>(self, sim: &mut S) {
        match self {
            ReplayEffect::SetDirection { actor, direction } => sim.set_direction(actor, direction),
            ReplayEffect::RoundState { state, delay } => sim.set_round_state(state, delay),
            ReplayEffect::RoundRestart { delay } => sim.restart_round(delay),
            ReplayEffect::RoundStart => sim.start_round(),
            ReplayEffect::ActorRoster(actors) => sim.apply_actor_roster(&actors),
            ReplayEffect::ParticipantRoster(roster) => sim.apply_participant_roster(&roster),
            ReplayEffect::ParticipantLeft(id) => sim.remove_participant(id),
        }
    }
}

/// Entries ordered by tick, then by arrival.
#[derive(Debug, Clone)]
pub struct TickReplayQueue<E> {
    entries: BTreeMap<u32, Vec<E>>,
    len: usize,
}

impl<E> Default for TickReplayQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> TickReplayQueue<E> {
    /// Empty queue.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            len: 0,
        }
    }

    /// Queue `entry` for `tick`, after anything already queued for it.
    pub fn push(&mut self, tick: u32, entry: E) {
        self.entries.entry(tick).or_default().push(entry);
        self.len += 1;
    }

    /// Remove and return every entry due at or before `tick`, oldest tick
    /// first, arrival order within a tick.
    pub fn drain_through(&mut self, tick: u32) -> impl Iterator<Item = E> {
        let later = match tick.checked_add(1) {
            Some(next) => self.entries.split_off(&next),
            None => BTreeMap::new(),
        };
        let due = std::mem::replace(&mut self.entries, later);
        self.len -= due.values().map(Vec::len).sum::<usize>();
        due.into_values().flatten()
    }

    /// Earliest queued tick.
    pub fn next_tick(&self) -> Option<u32> {
        self.entries.keys().next().copied()
    }

    /// Queued entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::GameState;

    #[test]
    fn test_tick_then_arrival_order() {
        let mut queue = TickReplayQueue::new();
        queue.push(5, "A");
        queue.push(3, "C");
        queue.push(5, "B");
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.drain_through(2).count(), 0);
        assert_eq!(queue.drain_through(5).collect::<Vec<_>>(), vec!["C", "A", "B"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_entries_drained_once() {
        let mut queue = TickReplayQueue::new();
        queue.push(1, 10);
        queue.push(2, 20);

        assert_eq!(queue.drain_through(1).collect::<Vec<_>>(), vec![10]);
        assert_eq!(queue.drain_through(1).count(), 0);
        assert_eq!(queue.next_tick(), Some(2));
        assert_eq!(queue.drain_through(2).collect::<Vec<_>>(), vec![20]);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_clear_drops_every_tick() {
        let mut queue = TickReplayQueue::new();
        queue.push(3, 'a');
        queue.push(4, 'b');
        queue.push(9, 'c');

        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.next_tick(), None);
        assert_eq!(queue.drain_through(u32::MAX).count(), 0);

        queue.push(4, 'd');
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_effects_apply_in_order() {
        let mut game = GameState::new(3, 60);
        let mut queue = TickReplayQueue::new();
        queue.push(0, ReplayEffect::RoundRestart { delay: 8 });
        queue.push(0, ReplayEffect::RoundState { state: RoundState::Idle, delay: 0 });

        for effect in queue.drain_through(game.tick()) {
            effect.apply(&mut game);
        }
        assert_eq!(game.round_state(), RoundState::Idle);
    }

    #[test]
    fn test_participant_effects() {
        let mut authority = GameState::new(3, 60);
        authority.add_participant("ada");
        authority.add_participant("bob");

        let mut follower = GameState::new(3, 60);
        ReplayEffect::ParticipantRoster(authority.participant_roster()).apply(&mut follower);
        assert_eq!(follower.participant_count(), 2);
        ReplayEffect::ParticipantLeft(0).apply(&mut follower);
        assert_eq!(follower.participant_count(), 1);
        assert!(follower.players().get(1).is_some());
    }
}
