//! Simulation Collaborator
//!
//! Everything the network layer needs from the simulation, as one trait.
//! The orchestrator calls these from its handlers (authority) or from
//! replayed effects (follower); the session driver calls `step`.

use crate::core::vec2::GridVec2;
use crate::game::events::SimEvent;
use crate::game::players::{ActorId, ParticipantId, ParticipantRecord, ParticipantRoster};
use crate::game::snakes::ActorRecord;
use crate::game::state::{RoundState, Snapshot};

/// Callbacks the network layer invokes on the simulation.
pub trait Simulation {
    /// Tick about to run.
    fn tick(&self) -> u32;

    /// Run one simulation step and advance the tick by one.
    ///
    /// `authoritative` enables round transitions (start/restart); followers
    /// receive those as replayed events instead.
    fn step(&mut self, authoritative: bool);

    // --- participants ---

    /// The authority accepted a transport. It has no participant until its
    /// hello arrives.
    fn connection_joined(&mut self, _peer: &str) {}

    /// Assign a roster slot to a new participant.
    fn add_participant(&mut self, name: &str) -> Option<ParticipantId>;

    /// Free a participant's slot and remove its actor.
    fn remove_participant(&mut self, id: ParticipantId);

    /// Number of participants.
    fn participant_count(&self) -> usize;

    /// Actor controlled by a participant.
    fn participant_actor(&self, id: ParticipantId) -> Option<ActorId>;

    /// Attach an actor to a participant.
    fn set_participant_actor(&mut self, id: ParticipantId, actor: Option<ActorId>);

    /// Participant controlled by this process.
    fn set_local_participant(&mut self, id: Option<ParticipantId>);

    /// Every roster slot.
    fn participant_roster(&self) -> ParticipantRoster;

    /// Overwrite the roster.
    fn apply_participant_roster(&mut self, roster: &[Option<ParticipantRecord>]);

    // --- actors ---

    /// Spawn an actor for `owner`.
    fn create_actor(&mut self, owner: ParticipantId, spawn: GridVec2) -> Option<ActorId>;

    /// Remove an actor.
    fn remove_actor(&mut self, id: ActorId);

    /// Whether `direction` is a legal turn for the actor right now.
    fn can_turn(&self, actor: ActorId, direction: GridVec2) -> bool;

    /// Set an actor's direction.
    fn set_direction(&mut self, actor: ActorId, direction: GridVec2);

    /// Every actor.
    fn actor_roster(&self) -> Vec<ActorRecord>;

    /// Replace every actor.
    fn apply_actor_roster(&mut self, actors: &[ActorRecord]);

    // --- round ---

    /// Current round state.
    fn round_state(&self) -> RoundState;

    /// Change the round state with a deadline `delay` ticks away.
    fn set_round_state(&mut self, state: RoundState, delay: u32);

    /// Schedule a new round `delay` ticks from now.
    fn restart_round(&mut self, delay: u32);

    /// Start a round immediately.
    fn start_round(&mut self);

    // --- snapshot ---

    /// Full state for a joining follower.
    fn snapshot(&self) -> Snapshot;

    /// Replace local state with the authority's snapshot (sets the tick).
    fn apply_snapshot(&mut self, snapshot: &Snapshot);

    /// Drain events recorded since the last call.
    fn take_events(&mut self) -> Vec<SimEvent>;
}
