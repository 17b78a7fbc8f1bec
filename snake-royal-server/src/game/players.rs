//! Participant Roster
//!
//! Fixed table of `MAX_PLAYERS` slots. Slot index doubles as the
//! participant id, which is what goes over the wire.

use serde::{Serialize, Deserialize};

use crate::game::map::Color;
use crate::MAX_PLAYERS;

/// Participant identifier (roster slot).
pub type ParticipantId = u8;

/// Actor identifier (snake slot).
pub type ActorId = u8;

/// Slot colors, indexed by participant id.
pub const PLAYER_PALETTE: [Color; MAX_PLAYERS] = [
    Color::new(230, 25, 75),
    Color::new(60, 180, 75),
    Color::new(255, 225, 25),
    Color::new(0, 130, 200),
    Color::new(245, 130, 48),
    Color::new(145, 30, 180),
    Color::new(70, 240, 240),
    Color::new(240, 50, 230),
    Color::new(210, 245, 60),
    Color::new(250, 190, 212),
    Color::new(0, 128, 128),
    Color::new(220, 190, 255),
    Color::new(170, 110, 40),
    Color::new(255, 250, 200),
    Color::new(128, 0, 0),
    Color::new(170, 255, 195),
    Color::new(128, 128, 0),
    Color::new(255, 215, 180),
    Color::new(0, 0, 128),
    Color::new(255, 255, 255),
    Color::new(100, 149, 237),
    Color::new(255, 99, 71),
    Color::new(154, 205, 50),
    Color::new(186, 85, 211),
];

/// One occupied roster slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    /// Slot index.
    pub id: ParticipantId,
    /// Snake controlled by this participant, if any.
    pub actor: Option<ActorId>,
    /// Paint color.
    pub color: Color,
    /// Display name.
    pub name: String,
}

/// Every roster slot in id order; `None` marks a free slot.
pub type ParticipantRoster = Vec<Option<ParticipantRecord>>;

/// The participant table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Players {
    slots: ParticipantRoster,
    local: Option<ParticipantId>,
}

impl Default for Players {
    fn default() -> Self {
        Self::new()
    }
}

impl Players {
    /// Empty roster.
    pub fn new() -> Self {
        Self {
            slots: vec![None; MAX_PLAYERS],
            local: None,
        }
    }

    /// Take the first free slot. `None` when the roster is full.
    pub fn add(&mut self, name: &str) -> Option<ParticipantId> {
        let index = self.slots.iter().position(Option::is_none)?;
        let id = index as ParticipantId;
        self.slots[index] = Some(ParticipantRecord {
            id,
            actor: None,
            color: PLAYER_PALETTE[index],
            name: name.to_string(),
        });
        Some(id)
    }

    /// Free a slot. Returns false if it was already free.
    pub fn remove(&mut self, id: ParticipantId) -> bool {
        let Some(slot) = self.slots.get_mut(id as usize) else {
            return false;
        };
        if slot.take().is_none() {
            return false;
        }
        if self.local == Some(id) {
            self.local = None;
        }
        true
    }

    /// Look up a participant.
    pub fn get(&self, id: ParticipantId) -> Option<&ParticipantRecord> {
        self.slots.get(id as usize)?.as_ref()
    }

    /// Attach or detach a snake.
    pub fn set_actor(&mut self, id: ParticipantId, actor: Option<ActorId>) {
        if let Some(Some(record)) = self.slots.get_mut(id as usize) {
            record.actor = actor;
        }
    }

    /// Paint color for a participant (black for unknown ids).
    pub fn color(&self, id: ParticipantId) -> Color {
        self.get(id).map(|p| p.color).unwrap_or(Color::BLACK)
    }

    /// Number of occupied slots.
    pub fn count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Occupied slots in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ParticipantRecord> {
        self.slots.iter().flatten()
    }

    /// Participant controlled by this process.
    pub fn local(&self) -> Option<ParticipantId> {
        self.local
    }

    /// Set the participant controlled by this process.
    pub fn set_local(&mut self, id: Option<ParticipantId>) {
        self.local = id;
    }

    /// Copy of every slot, for roster broadcasts.
    pub fn roster(&self) -> ParticipantRoster {
        self.slots.clone()
    }

    /// Overwrite the table with a roster from the authority.
    pub fn apply_roster(&mut self, roster: &[Option<ParticipantRecord>]) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            *slot = roster.get(index).cloned().flatten();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_fills_first_free_slot() {
        let mut players = Players::new();
        assert_eq!(players.add("ada"), Some(0));
        assert_eq!(players.add("bob"), Some(1));
        assert!(players.remove(0));
        assert_eq!(players.add("cy"), Some(0));
        assert_eq!(players.get(0).map(|p| p.name.as_str()), Some("cy"));
        assert_eq!(players.count(), 2);
    }

    #[test]
    fn test_roster_full() {
        let mut players = Players::new();
        for i in 0..MAX_PLAYERS {
            assert_eq!(players.add("p"), Some(i as ParticipantId));
        }
        assert_eq!(players.add("late"), None);
    }

    #[test]
    fn test_remove_clears_local() {
        let mut players = Players::new();
        let id = players.add("me").unwrap();
        players.set_local(Some(id));
        assert!(players.remove(id));
        assert_eq!(players.local(), None);
        assert!(!players.remove(id));
    }

    #[test]
    fn test_apply_roster() {
        let mut authority = Players::new();
        authority.add("ada");
        authority.add("bob");
        authority.set_actor(1, Some(4));

        let mut follower = Players::new();
        follower.add("stale");
        follower.apply_roster(&authority.roster());
        assert_eq!(follower.roster(), authority.roster());
        assert_eq!(follower.get(1).and_then(|p| p.actor), Some(4));
    }
}
