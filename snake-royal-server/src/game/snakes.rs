//! Snakes (actors)
//!
//! Movement, growth and collision for every snake on the grid. Snakes are
//! stored in `MAX_PLAYERS` slots; the slot index is the actor id.
//!
//! An actor is split into a fixed-size [`ActorHead`] and its variable-length
//! path so the head can be encoded and decoded on its own.

use serde::{Serialize, Deserialize};

use crate::core::rng::ParkMiller;
use crate::core::vec2::GridVec2;
use crate::game::map::{Color, TileKind, TileMap};
use crate::game::players::{ActorId, ParticipantId, Players};
use crate::{MAX_PLAYERS, TILE_MAP_HEIGHT, TILE_MAP_WIDTH};

/// Snake lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ActorState {
    /// Created but not playing.
    #[default]
    Idle = 0,
    /// Moving.
    Alive = 1,
    /// Crashed; stays on the grid until the round restarts.
    Dead = 2,
}

impl ActorState {
    /// Decode from the wire value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ActorState::Idle),
            1 => Some(ActorState::Alive),
            2 => Some(ActorState::Dead),
            _ => None,
        }
    }
}

/// Fixed-size part of an actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorHead {
    /// Lifecycle state.
    pub state: ActorState,
    /// Slot index.
    pub id: ActorId,
    /// Current movement direction, zero when not yet moving.
    pub direction: GridVec2,
    /// Controlling participant.
    pub owner: ParticipantId,
}

/// An actor: head plus the grid cells it occupies, head first.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorRecord {
    /// Fixed part.
    pub head: ActorHead,
    /// Occupied cells, `path[0]` is the head.
    pub path: Vec<GridVec2>,
}

impl ActorRecord {
    /// Length in cells.
    pub fn len(&self) -> usize {
        self.path.len()
    }

    /// True once every piece is gone.
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// True while the snake is moving.
    pub fn is_alive(&self) -> bool {
        self.head.state == ActorState::Alive
    }
}

/// All snakes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snakes {
    slots: Vec<Option<ActorRecord>>,
}

impl Default for Snakes {
    fn default() -> Self {
        Self::new()
    }
}

impl Snakes {
    /// No snakes.
    pub fn new() -> Self {
        Self {
            slots: vec![None; MAX_PLAYERS],
        }
    }

    /// Spawn a one-cell snake for `owner` at `pos`.
    pub fn create(
        &mut self,
        owner: ParticipantId,
        pos: GridVec2,
        color: Color,
        map: &mut TileMap,
    ) -> Option<ActorId> {
        let index = self.slots.iter().position(Option::is_none)?;
        let id = index as ActorId;
        let pos = pos.wrap(TILE_MAP_WIDTH, TILE_MAP_HEIGHT);
        self.slots[index] = Some(ActorRecord {
            head: ActorHead {
                state: ActorState::Alive,
                id,
                direction: GridVec2::ZERO,
                owner,
            },
            path: vec![pos],
        });
        map.set(pos, TileKind::SnakeHead, color);
        Some(id)
    }

    /// Remove a snake and clear its cells.
    pub fn remove(&mut self, id: ActorId, map: &mut TileMap) {
        if let Some(record) = self.slots.get_mut(id as usize).and_then(Option::take) {
            for piece in record.path {
                map.set(piece, TileKind::Empty, Color::BLACK);
            }
        }
    }

    /// Look up a snake.
    pub fn get(&self, id: ActorId) -> Option<&ActorRecord> {
        self.slots.get(id as usize)?.as_ref()
    }

    /// Set the movement direction.
    pub fn set_direction(&mut self, id: ActorId, direction: GridVec2) {
        if let Some(Some(record)) = self.slots.get_mut(id as usize) {
            record.head.direction = direction;
        }
    }

    /// Whether `direction` is an allowed turn: any unit direction while
    /// standing still, otherwise only a perpendicular one.
    pub fn can_turn(&self, id: ActorId, direction: GridVec2) -> bool {
        let Some(record) = self.get(id) else {
            return false;
        };
        if !record.is_alive() || !direction.is_direction() {
            return false;
        }
        let current = record.head.direction;
        current == GridVec2::ZERO || (direction != current && direction != -current)
    }

    /// Number of snakes.
    pub fn count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Number of snakes still moving.
    pub fn alive(&self) -> usize {
        self.slots.iter().flatten().filter(|s| s.is_alive()).count()
    }

    /// Occupied slots in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ActorRecord> {
        self.slots.iter().flatten()
    }

    /// Copy of every snake, for roster broadcasts.
    pub fn roster(&self) -> Vec<ActorRecord> {
        self.iter().cloned().collect()
    }

    /// Replace every snake with the authority's list. Grid is not touched;
    /// the snapshot carries it.
    pub fn apply_roster(&mut self, actors: &[ActorRecord]) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        for actor in actors {
            if let Some(slot) = self.slots.get_mut(actor.head.id as usize) {
                *slot = Some(actor.clone());
            }
        }
    }

    /// Advance every live snake one cell, in slot order.
    pub fn update(&mut self, map: &mut TileMap, players: &Players, rng: &mut ParkMiller) {
        for snake in self.slots.iter_mut().flatten() {
            if !snake.is_alive() {
                continue;
            }
            let color = players.color(snake.head.owner);
            update_snake(snake, color, map, rng);
        }
    }
}

fn kill(snake: &mut ActorRecord, map: &mut TileMap) {
    snake.head.state = ActorState::Dead;
    for piece in &snake.path {
        map.set(*piece, TileKind::SnakeDead, Color::GREY);
    }
}

fn move_piece(
    snake: &mut ActorRecord,
    index: usize,
    to: GridVec2,
    kind: TileKind,
    color: Color,
    map: &mut TileMap,
) {
    map.set(snake.path[index], TileKind::Empty, Color::BLACK);
    snake.path[index] = to;
    map.set(to, kind, color);
}

fn update_snake(snake: &mut ActorRecord, color: Color, map: &mut TileMap, rng: &mut ParkMiller) {
    let direction = snake.head.direction;
    if direction == GridVec2::ZERO || snake.path.is_empty() {
        return;
    }

    let target = (snake.path[0] + direction).wrap(TILE_MAP_WIDTH, TILE_MAP_HEIGHT);
    let mut ate = false;

    match map.get(target).kind {
        TileKind::Food => {
            snake.path.insert(0, target);
            ate = true;
        }
        TileKind::SnakeHead | TileKind::SnakeTail => {
            kill(snake, map);
            return;
        }
        TileKind::SnakeDead => {
            // Running over remains costs the last piece.
            if let Some(tail) = snake.path.pop() {
                map.set(tail, TileKind::SnakeDead, color);
            }
            if snake.path.is_empty() {
                kill(snake, map);
                return;
            }
            rotate_tail_to_front(snake);
        }
        TileKind::Empty => rotate_tail_to_front(snake),
    }

    move_piece(snake, 0, target, TileKind::SnakeHead, color, map);
    for index in 1..snake.path.len() {
        let pos = snake.path[index];
        move_piece(snake, index, pos, TileKind::SnakeTail, color, map);
    }

    if ate {
        map.spawn_food(rng);
    }
}

fn rotate_tail_to_front(snake: &mut ActorRecord) {
    if snake.path.len() > 1 {
        snake.path.rotate_right(1);
    }
}
