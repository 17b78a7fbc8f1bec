//! Protocol Messages
//!
//! The message catalog and its binary payload layouts. Plain messages are
//! fixed-size records; complex messages carry count-prefixed sequences
//! (the actor roster nests a path sequence inside every actor).
//!
//! Tags are stable. A peer that receives a tag it does not know skips the
//! payload, so new kinds can be appended without breaking older builds.

use crate::core::buffer::{ByteBuffer, OwnedBuffer};
use crate::core::vec2::GridVec2;
use crate::game::map::{Color, Tile, TileKind, TILE_COUNT};
use crate::game::players::{ActorId, ParticipantId, ParticipantRecord, ParticipantRoster};
use crate::game::snakes::{ActorHead, ActorRecord, ActorState};
use crate::game::state::{RoundData, RoundState, Snapshot};
use crate::network::wire::{
    get_count, get_id, get_name, put_count, put_id, put_name, write_frame, CodecError,
    WireField, NAME_LEN,
};
use crate::MAX_PLAYERS;

// =============================================================================
// MESSAGE KINDS
// =============================================================================

/// Message type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum MessageKind {
    /// Follower handshake.
    Hello = 1,
    /// Follower asks to turn its snake.
    DirectionRequest = 2,
    /// Follower latency check.
    Ping = 3,
    /// Authority echo of a ping.
    Pong = 4,
    /// Every participant slot.
    ParticipantRoster = 5,
    /// A participant disconnected.
    ParticipantLeft = 6,
    /// The receiver's own participant id.
    LocalIdentity = 7,
    /// Full state for a joining follower.
    StateSnapshot = 8,
    /// Authority's current tick.
    TickHeartbeat = 9,
    /// Every actor with its path.
    ActorRoster = 10,
    /// An actor turned.
    ActorDirection = 11,
    /// Round state changed.
    RoundStateChange = 12,
    /// Round restart scheduled.
    RoundRestart = 13,
    /// Round started.
    RoundStart = 14,
}

impl MessageKind {
    /// Map a wire tag to a kind; `None` for tags this build does not know.
    pub fn from_u16(tag: u16) -> Option<Self> {
        use MessageKind::*;
        Some(match tag {
            1 => Hello,
            2 => DirectionRequest,
            3 => Ping,
            4 => Pong,
            5 => ParticipantRoster,
            6 => ParticipantLeft,
            7 => LocalIdentity,
            8 => StateSnapshot,
            9 => TickHeartbeat,
            10 => ActorRoster,
            11 => ActorDirection,
            12 => RoundStateChange,
            13 => RoundRestart,
            14 => RoundStart,
            _ => return None,
        })
    }

    /// Wire tag.
    #[inline]
    pub fn tag(self) -> u16 {
        self as u16
    }
}

// =============================================================================
// MESSAGE TRAITS
// =============================================================================

/// A message with a catalog tag and a payload codec.
pub trait WireMessage: Sized {
    /// Catalog tag.
    const KIND: MessageKind;

    /// Write the payload at the cursor.
    fn encode(&self, buf: &mut ByteBuffer<'_>);

    /// Read the payload from the cursor.
    fn decode(buf: &mut ByteBuffer<'_>) -> Result<Self, CodecError>;
}

/// A fixed-layout message: its payload is always `WIRE_SIZE` bytes.
pub trait PlainMessage: WireMessage {
    /// Encoded payload size.
    const WIRE_SIZE: usize;
}

// =============================================================================
// RECORD CODECS
// =============================================================================

/// Encoded size of one participant slot.
pub const PARTICIPANT_RECORD_SIZE: usize = 1 + 1 + 3 + NAME_LEN;

/// Encoded size of one tile.
pub const TILE_SIZE: usize = 1 + 3;

/// Encoded size of an actor head.
pub const ACTOR_HEAD_SIZE: usize = 1 + 1 + GridVec2::SIZE + 1;

impl WireField for Color {
    const SIZE: usize = 3;

    fn put(&self, buf: &mut ByteBuffer<'_>) {
        buf.write(&[self.r, self.g, self.b]);
    }

    fn get(buf: &mut ByteBuffer<'_>) -> Result<Self, CodecError> {
        Ok(Color::new(u8::get(buf)?, u8::get(buf)?, u8::get(buf)?))
    }
}

impl WireField for Tile {
    const SIZE: usize = TILE_SIZE;

    fn put(&self, buf: &mut ByteBuffer<'_>) {
        (self.kind as u8).put(buf);
        self.color.put(buf);
    }

    fn get(buf: &mut ByteBuffer<'_>) -> Result<Self, CodecError> {
        let raw = u8::get(buf)?;
        let kind = TileKind::from_u8(raw).ok_or(CodecError::InvalidValue {
            field: "tile kind",
            value: raw as u64,
        })?;
        Ok(Tile { kind, color: Color::get(buf)? })
    }
}

impl WireField for ActorHead {
    const SIZE: usize = ACTOR_HEAD_SIZE;

    fn put(&self, buf: &mut ByteBuffer<'_>) {
        (self.state as u8).put(buf);
        self.id.put(buf);
        self.direction.put(buf);
        self.owner.put(buf);
    }

    fn get(buf: &mut ByteBuffer<'_>) -> Result<Self, CodecError> {
        let raw = u8::get(buf)?;
        let state = ActorState::from_u8(raw).ok_or(CodecError::InvalidValue {
            field: "actor state",
            value: raw as u64,
        })?;
        let id = u8::get(buf)?;
        if id as usize >= MAX_PLAYERS {
            return Err(CodecError::InvalidValue { field: "actor id", value: id as u64 });
        }
        Ok(ActorHead {
            state,
            id,
            direction: GridVec2::get(buf)?,
            owner: u8::get(buf)?,
        })
    }
}

fn put_round_state(buf: &mut ByteBuffer<'_>, state: RoundState) {
    (state as u8).put(buf);
}

fn get_round_state(buf: &mut ByteBuffer<'_>) -> Result<RoundState, CodecError> {
    let raw = u8::get(buf)?;
    RoundState::from_u8(raw).ok_or(CodecError::InvalidValue {
        field: "round state",
        value: raw as u64,
    })
}

fn put_participant_slot(buf: &mut ByteBuffer<'_>, slot: Option<&ParticipantRecord>) {
    match slot {
        Some(record) => {
            record.id.put(buf);
            put_id(buf, record.actor);
            record.color.put(buf);
            put_name(buf, &record.name);
        }
        None => {
            put_id(buf, None);
            put_id(buf, None);
            Color::BLACK.put(buf);
            put_name(buf, "");
        }
    }
}

fn get_participant_slot(
    buf: &mut ByteBuffer<'_>,
    index: usize,
) -> Result<Option<ParticipantRecord>, CodecError> {
    let id = get_id(buf)?;
    let actor = get_id(buf)?;
    let color = Color::get(buf)?;
    let name = get_name(buf)?;
    match id {
        None => Ok(None),
        Some(id) if id as usize == index => Ok(Some(ParticipantRecord { id, actor, color, name })),
        Some(id) => Err(CodecError::InvalidValue { field: "participant id", value: id as u64 }),
    }
}

fn get_participant_id(buf: &mut ByteBuffer<'_>) -> Result<ParticipantId, CodecError> {
    let id = u8::get(buf)?;
    if id as usize >= MAX_PLAYERS {
        return Err(CodecError::InvalidValue { field: "participant id", value: id as u64 });
    }
    Ok(id)
}

fn get_actor_id(buf: &mut ByteBuffer<'_>) -> Result<ActorId, CodecError> {
    let id = u8::get(buf)?;
    if id as usize >= MAX_PLAYERS {
        return Err(CodecError::InvalidValue { field: "actor id", value: id as u64 });
    }
    Ok(id)
}

// =============================================================================
// FOLLOWER -> AUTHORITY
// =============================================================================

/// Handshake sent once the follower's transport connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    /// Protocol version of the sender.
    pub version: u32,
    /// Display name.
    pub name: String,
}

impl WireMessage for Hello {
    const KIND: MessageKind = MessageKind::Hello;

    fn encode(&self, buf: &mut ByteBuffer<'_>) {
        self.version.put(buf);
        put_name(buf, &self.name);
    }

    fn decode(buf: &mut ByteBuffer<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            version: u32::get(buf)?,
            name: get_name(buf)?,
        })
    }
}

impl PlainMessage for Hello {
    const WIRE_SIZE: usize = 4 + NAME_LEN;
}

/// Turn request for the sender's snake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionRequest {
    /// Requested unit direction.
    pub direction: GridVec2,
}

impl WireMessage for DirectionRequest {
    const KIND: MessageKind = MessageKind::DirectionRequest;

    fn encode(&self, buf: &mut ByteBuffer<'_>) {
        self.direction.put(buf);
    }

    fn decode(buf: &mut ByteBuffer<'_>) -> Result<Self, CodecError> {
        Ok(Self { direction: GridVec2::get(buf)? })
    }
}

impl PlainMessage for DirectionRequest {
    const WIRE_SIZE: usize = GridVec2::SIZE;
}

/// Latency check carrying the sender's clock in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ping {
    /// Send time, seconds.
    pub timestamp: f64,
}

impl WireMessage for Ping {
    const KIND: MessageKind = MessageKind::Ping;

    fn encode(&self, buf: &mut ByteBuffer<'_>) {
        self.timestamp.put(buf);
    }

    fn decode(buf: &mut ByteBuffer<'_>) -> Result<Self, CodecError> {
        Ok(Self { timestamp: f64::get(buf)? })
    }
}

impl PlainMessage for Ping {
    const WIRE_SIZE: usize = 8;
}

// =============================================================================
// AUTHORITY -> FOLLOWER
// =============================================================================

/// Echo of a [`Ping`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pong {
    /// Timestamp copied from the ping.
    pub timestamp: f64,
}

impl WireMessage for Pong {
    const KIND: MessageKind = MessageKind::Pong;

    fn encode(&self, buf: &mut ByteBuffer<'_>) {
        self.timestamp.put(buf);
    }

    fn decode(buf: &mut ByteBuffer<'_>) -> Result<Self, CodecError> {
        Ok(Self { timestamp: f64::get(buf)? })
    }
}

impl PlainMessage for Pong {
    const WIRE_SIZE: usize = 8;
}

/// Every participant slot, stamped with the tick it applies at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRosterUpdate {
    /// Tick to apply at.
    pub tick: u32,
    /// `MAX_PLAYERS` slots.
    pub roster: ParticipantRoster,
}

impl WireMessage for ParticipantRosterUpdate {
    const KIND: MessageKind = MessageKind::ParticipantRoster;

    fn encode(&self, buf: &mut ByteBuffer<'_>) {
        self.tick.put(buf);
        for index in 0..MAX_PLAYERS {
            put_participant_slot(buf, self.roster.get(index).and_then(Option::as_ref));
        }
    }

    fn decode(buf: &mut ByteBuffer<'_>) -> Result<Self, CodecError> {
        let tick = u32::get(buf)?;
        let roster = (0..MAX_PLAYERS)
            .map(|index| get_participant_slot(buf, index))
            .collect::<Result<_, _>>()?;
        Ok(Self { tick, roster })
    }
}

impl PlainMessage for ParticipantRosterUpdate {
    const WIRE_SIZE: usize = 4 + MAX_PLAYERS * PARTICIPANT_RECORD_SIZE;
}

/// A participant's connection went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticipantLeft {
    /// Tick to apply at.
    pub tick: u32,
    /// Who left.
    pub participant: ParticipantId,
}

impl WireMessage for ParticipantLeft {
    const KIND: MessageKind = MessageKind::ParticipantLeft;

    fn encode(&self, buf: &mut ByteBuffer<'_>) {
        self.tick.put(buf);
        self.participant.put(buf);
    }

    fn decode(buf: &mut ByteBuffer<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            tick: u32::get(buf)?,
            participant: get_participant_id(buf)?,
        })
    }
}

impl PlainMessage for ParticipantLeft {
    const WIRE_SIZE: usize = 5;
}

/// Tells a follower which participant it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalIdentity {
    /// Assigned participant id.
    pub participant: ParticipantId,
}

impl WireMessage for LocalIdentity {
    const KIND: MessageKind = MessageKind::LocalIdentity;

    fn encode(&self, buf: &mut ByteBuffer<'_>) {
        self.participant.put(buf);
    }

    fn decode(buf: &mut ByteBuffer<'_>) -> Result<Self, CodecError> {
        Ok(Self { participant: get_participant_id(buf)? })
    }
}

impl PlainMessage for LocalIdentity {
    const WIRE_SIZE: usize = 1;
}

impl WireMessage for Snapshot {
    const KIND: MessageKind = MessageKind::StateSnapshot;

    fn encode(&self, buf: &mut ByteBuffer<'_>) {
        self.tick.put(buf);
        self.rng_state.put(buf);
        put_round_state(buf, self.round.state);
        self.round.deadline.put(buf);
        for index in 0..TILE_COUNT {
            self.tiles.get(index).copied().unwrap_or_default().put(buf);
        }
    }

    fn decode(buf: &mut ByteBuffer<'_>) -> Result<Self, CodecError> {
        let tick = u32::get(buf)?;
        let rng_state = u64::get(buf)?;
        let round = RoundData {
            state: get_round_state(buf)?,
            deadline: u32::get(buf)?,
        };
        let tiles = (0..TILE_COUNT)
            .map(|_| Tile::get(buf))
            .collect::<Result<_, _>>()?;
        Ok(Self { tick, rng_state, round, tiles })
    }
}

impl PlainMessage for Snapshot {
    const WIRE_SIZE: usize = 4 + 8 + 1 + 4 + TILE_COUNT * TILE_SIZE;
}

/// The authority's tick at the start of its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickHeartbeat {
    /// Authority tick.
    pub tick: u32,
}

impl WireMessage for TickHeartbeat {
    const KIND: MessageKind = MessageKind::TickHeartbeat;

    fn encode(&self, buf: &mut ByteBuffer<'_>) {
        self.tick.put(buf);
    }

    fn decode(buf: &mut ByteBuffer<'_>) -> Result<Self, CodecError> {
        Ok(Self { tick: u32::get(buf)? })
    }
}

impl PlainMessage for TickHeartbeat {
    const WIRE_SIZE: usize = 4;
}

/// Every actor with its full path.
///
/// Layout: `tick`, `count`, then per actor the fixed [`ActorHead`], the path
/// `count` and the path cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorRosterUpdate {
    /// Tick to apply at.
    pub tick: u32,
    /// Actors in id order.
    pub actors: Vec<ActorRecord>,
}

impl WireMessage for ActorRosterUpdate {
    const KIND: MessageKind = MessageKind::ActorRoster;

    fn encode(&self, buf: &mut ByteBuffer<'_>) {
        self.tick.put(buf);
        put_count(buf, self.actors.len());
        for actor in &self.actors {
            actor.head.put(buf);
            put_count(buf, actor.path.len());
            for cell in &actor.path {
                cell.put(buf);
            }
        }
    }

    fn decode(buf: &mut ByteBuffer<'_>) -> Result<Self, CodecError> {
        let tick = u32::get(buf)?;
        let count = get_count(buf, ACTOR_HEAD_SIZE + 4, MAX_PLAYERS)?;
        let mut actors = Vec::with_capacity(count);
        for _ in 0..count {
            let head = ActorHead::get(buf)?;
            let cells = get_count(buf, GridVec2::SIZE, TILE_COUNT)?;
            let path = (0..cells)
                .map(|_| GridVec2::get(buf))
                .collect::<Result<_, _>>()?;
            actors.push(ActorRecord { head, path });
        }
        Ok(Self { tick, actors })
    }
}

/// An actor turned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorDirection {
    /// Tick to apply at.
    pub tick: u32,
    /// Which actor.
    pub actor: ActorId,
    /// New direction.
    pub direction: GridVec2,
}

impl WireMessage for ActorDirection {
    const KIND: MessageKind = MessageKind::ActorDirection;

    fn encode(&self, buf: &mut ByteBuffer<'_>) {
        self.tick.put(buf);
        self.actor.put(buf);
        self.direction.put(buf);
    }

    fn decode(buf: &mut ByteBuffer<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            tick: u32::get(buf)?,
            actor: get_actor_id(buf)?,
            direction: GridVec2::get(buf)?,
        })
    }
}

impl PlainMessage for ActorDirection {
    const WIRE_SIZE: usize = 4 + 1 + GridVec2::SIZE;
}

/// Round state changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundStateChange {
    /// Tick to apply at.
    pub tick: u32,
    /// New state.
    pub state: RoundState,
    /// Deadline offset in ticks.
    pub delay: u32,
}

impl WireMessage for RoundStateChange {
    const KIND: MessageKind = MessageKind::RoundStateChange;

    fn encode(&self, buf: &mut ByteBuffer<'_>) {
        self.tick.put(buf);
        put_round_state(buf, self.state);
        self.delay.put(buf);
    }

    fn decode(buf: &mut ByteBuffer<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            tick: u32::get(buf)?,
            state: get_round_state(buf)?,
            delay: u32::get(buf)?,
        })
    }
}

impl PlainMessage for RoundStateChange {
    const WIRE_SIZE: usize = 9;
}

/// Round restart scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundRestart {
    /// Tick to apply at.
    pub tick: u32,
    /// Ticks until the new round.
    pub delay: u32,
}

impl WireMessage for RoundRestart {
    const KIND: MessageKind = MessageKind::RoundRestart;

    fn encode(&self, buf: &mut ByteBuffer<'_>) {
        self.tick.put(buf);
        self.delay.put(buf);
    }

    fn decode(buf: &mut ByteBuffer<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            tick: u32::get(buf)?,
            delay: u32::get(buf)?,
        })
    }
}

impl PlainMessage for RoundRestart {
    const WIRE_SIZE: usize = 8;
}

/// Round started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundStart {
    /// Tick to apply at.
    pub tick: u32,
}

impl WireMessage for RoundStart {
    const KIND: MessageKind = MessageKind::RoundStart;

    fn encode(&self, buf: &mut ByteBuffer<'_>) {
        self.tick.put(buf);
    }

    fn decode(buf: &mut ByteBuffer<'_>) -> Result<Self, CodecError> {
        Ok(Self { tick: u32::get(buf)? })
    }
}

impl PlainMessage for RoundStart {
    const WIRE_SIZE: usize = 4;
}

// =============================================================================
// MESSAGE
// =============================================================================

/// Any catalog message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// See [`Hello`].
    Hello(Hello),
    /// See [`DirectionRequest`].
    DirectionRequest(DirectionRequest),
    /// See [`Ping`].
    Ping(Ping),
    /// See [`Pong`].
    Pong(Pong),
    /// See [`ParticipantRosterUpdate`].
    ParticipantRoster(ParticipantRosterUpdate),
    /// See [`ParticipantLeft`].
    ParticipantLeft(ParticipantLeft),
    /// See [`LocalIdentity`].
    LocalIdentity(LocalIdentity),
    /// See [`Snapshot`].
    StateSnapshot(Snapshot),
    /// See [`TickHeartbeat`].
    TickHeartbeat(TickHeartbeat),
    /// See [`ActorRosterUpdate`].
    ActorRoster(ActorRosterUpdate),
    /// See [`ActorDirection`].
    ActorDirection(ActorDirection),
    /// See [`RoundStateChange`].
    RoundStateChange(RoundStateChange),
    /// See [`RoundRestart`].
    RoundRestart(RoundRestart),
    /// See [`RoundStart`].
    RoundStart(RoundStart),
}

impl Message {
    /// Catalog tag of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Hello(_) => Hello::KIND,
            Message::DirectionRequest(_) => DirectionRequest::KIND,
            Message::Ping(_) => Ping::KIND,
            Message::Pong(_) => Pong::KIND,
            Message::ParticipantRoster(_) => ParticipantRosterUpdate::KIND,
            Message::ParticipantLeft(_) => ParticipantLeft::KIND,
            Message::LocalIdentity(_) => LocalIdentity::KIND,
            Message::StateSnapshot(_) => Snapshot::KIND,
            Message::TickHeartbeat(_) => TickHeartbeat::KIND,
            Message::ActorRoster(_) => ActorRosterUpdate::KIND,
            Message::ActorDirection(_) => ActorDirection::KIND,
            Message::RoundStateChange(_) => RoundStateChange::KIND,
            Message::RoundRestart(_) => RoundRestart::KIND,
            Message::RoundStart(_) => RoundStart::KIND,
        }
    }

    /// Write the payload at the cursor.
    pub fn encode(&self, buf: &mut ByteBuffer<'_>) {
        match self {
            Message::Hello(m) => m.encode(buf),
            Message::DirectionRequest(m) => m.encode(buf),
            Message::Ping(m) => m.encode(buf),
            Message::Pong(m) => m.encode(buf),
            Message::ParticipantRoster(m) => m.encode(buf),
            Message::ParticipantLeft(m) => m.encode(buf),
            Message::LocalIdentity(m) => m.encode(buf),
            Message::StateSnapshot(m) => m.encode(buf),
            Message::TickHeartbeat(m) => m.encode(buf),
            Message::ActorRoster(m) => m.encode(buf),
            Message::ActorDirection(m) => m.encode(buf),
            Message::RoundStateChange(m) => m.encode(buf),
            Message::RoundRestart(m) => m.encode(buf),
            Message::RoundStart(m) => m.encode(buf),
        }
    }

    /// Decode a payload of the given kind.
    pub fn decode(kind: MessageKind, buf: &mut ByteBuffer<'_>) -> Result<Self, CodecError> {
        Ok(match kind {
            MessageKind::Hello => Message::Hello(Hello::decode(buf)?),
            MessageKind::DirectionRequest => Message::DirectionRequest(DirectionRequest::decode(buf)?),
            MessageKind::Ping => Message::Ping(Ping::decode(buf)?),
            MessageKind::Pong => Message::Pong(Pong::decode(buf)?),
            MessageKind::ParticipantRoster => {
                Message::ParticipantRoster(ParticipantRosterUpdate::decode(buf)?)
            }
            MessageKind::ParticipantLeft => Message::ParticipantLeft(ParticipantLeft::decode(buf)?),
            MessageKind::LocalIdentity => Message::LocalIdentity(LocalIdentity::decode(buf)?),
            MessageKind::StateSnapshot => Message::StateSnapshot(Snapshot::decode(buf)?),
            MessageKind::TickHeartbeat => Message::TickHeartbeat(TickHeartbeat::decode(buf)?),
            MessageKind::ActorRoster => Message::ActorRoster(ActorRosterUpdate::decode(buf)?),
            MessageKind::ActorDirection => Message::ActorDirection(ActorDirection::decode(buf)?),
            MessageKind::RoundStateChange => {
                Message::RoundStateChange(RoundStateChange::decode(buf)?)
            }
            MessageKind::RoundRestart => Message::RoundRestart(RoundRestart::decode(buf)?),
            MessageKind::RoundStart => Message::RoundStart(RoundStart::decode(buf)?),
        })
    }

    /// Append this message as one frame at the cursor of `out`.
    pub fn encode_frame(&self, out: &mut ByteBuffer<'_>) -> usize {
        write_frame(out, self.kind().tag(), |buf| self.encode(buf))
    }

    /// Encode into a fresh frame buffer.
    pub fn to_frame(&self) -> OwnedBuffer {
        let mut out = ByteBuffer::new();
        self.encode_frame(&mut out);
        out
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::buffer::Seek;
    use crate::network::wire::{FrameHeader, HEADER_SIZE};
    use crate::TILE_MAP_WIDTH;
    use proptest::prelude::*;

    fn roundtrip(message: &Message) -> Message {
        let mut buf = ByteBuffer::new();
        message.encode(&mut buf);
        buf.seek(Seek::Start(0));
        let decoded = Message::decode(message.kind(), &mut buf).unwrap();
        assert_eq!(buf.remaining(), 0, "{:?} left bytes unread", message.kind());
        decoded
    }

    fn encoded_len(message: &Message) -> usize {
        let mut buf = ByteBuffer::new();
        message.encode(&mut buf);
        buf.len()
    }

    fn full_roster() -> ParticipantRoster {
        (0..MAX_PLAYERS)
            .map(|i| {
                Some(ParticipantRecord {
                    id: i as u8,
                    actor: (i % 2 == 0).then_some(i as u8),
                    color: Color::new(i as u8, 2, 3),
                    name: format!("player-{i}"),
                })
            })
            .collect()
    }

    fn sample_snapshot() -> Snapshot {
        let mut tiles = vec![Tile::default(); TILE_COUNT];
        tiles[0] = Tile { kind: TileKind::Food, color: Color::ORANGE };
        tiles[TILE_COUNT - 1] = Tile { kind: TileKind::SnakeDead, color: Color::GREY };
        Snapshot {
            tick: 1234,
            rng_state: 0x7fff_fffe,
            round: RoundData { state: RoundState::Restarting, deadline: 1294 },
            tiles,
        }
    }

    #[test]
    fn test_kind_tags_roundtrip() {
        for tag in 0..=20u16 {
            match MessageKind::from_u16(tag) {
                Some(kind) => assert_eq!(kind.tag(), tag),
                None => assert!(tag == 0 || tag > 14),
            }
        }
    }

    #[test]
    fn test_plain_messages_roundtrip_at_fixed_size() {
        let cases: Vec<(Message, usize)> = vec![
            (
                Message::Hello(Hello { version: 1, name: "ada".into() }),
                Hello::WIRE_SIZE,
            ),
            (
                Message::DirectionRequest(DirectionRequest { direction: GridVec2::LEFT }),
                DirectionRequest::WIRE_SIZE,
            ),
            (Message::Ping(Ping { timestamp: 12.5 }), Ping::WIRE_SIZE),
            (Message::Pong(Pong { timestamp: -0.25 }), Pong::WIRE_SIZE),
            (
                Message::ParticipantRoster(ParticipantRosterUpdate { tick: 9, roster: full_roster() }),
                ParticipantRosterUpdate::WIRE_SIZE,
            ),
            (
                Message::ParticipantLeft(ParticipantLeft { tick: 3, participant: 23 }),
                ParticipantLeft::WIRE_SIZE,
            ),
            (
                Message::LocalIdentity(LocalIdentity { participant: 0 }),
                LocalIdentity::WIRE_SIZE,
            ),
            (Message::StateSnapshot(sample_snapshot()), Snapshot::WIRE_SIZE),
            (
                Message::TickHeartbeat(TickHeartbeat { tick: u32::MAX }),
                TickHeartbeat::WIRE_SIZE,
            ),
            (
                Message::ActorDirection(ActorDirection { tick: 7, actor: 2, direction: GridVec2::UP }),
                ActorDirection::WIRE_SIZE,
            ),
            (
                Message::RoundStateChange(RoundStateChange { tick: 1, state: RoundState::Idle, delay: 0 }),
                RoundStateChange::WIRE_SIZE,
            ),
            (
                Message::RoundRestart(RoundRestart { tick: 5, delay: 60 }),
                RoundRestart::WIRE_SIZE,
            ),
            (Message::RoundStart(RoundStart { tick: 65 }), RoundStart::WIRE_SIZE),
        ];

        for (message, size) in cases {
            assert_eq!(encoded_len(&message), size, "{:?}", message.kind());
            assert_eq!(roundtrip(&message), message);
        }
    }

    #[test]
    fn test_empty_roster_slots_roundtrip() {
        let mut roster: ParticipantRoster = vec![None; MAX_PLAYERS];
        roster[5] = Some(ParticipantRecord {
            id: 5,
            actor: None,
            color: Color::new(1, 2, 3),
            name: String::new(),
        });
        let message = Message::ParticipantRoster(ParticipantRosterUpdate { tick: 0, roster });
        assert_eq!(roundtrip(&message), message);
    }

    #[test]
    fn test_actor_roster_empty_and_full() {
        let empty = Message::ActorRoster(ActorRosterUpdate { tick: 4, actors: vec![] });
        assert_eq!(encoded_len(&empty), 8);
        assert_eq!(roundtrip(&empty), empty);

        let actors = (0..MAX_PLAYERS as u8)
            .map(|id| ActorRecord {
                head: ActorHead {
                    state: ActorState::Alive,
                    id,
                    direction: GridVec2::RIGHT,
                    owner: id,
                },
                path: (0..id as i32).map(|x| GridVec2::new(x, id as i32)).collect(),
            })
            .collect();
        let full = Message::ActorRoster(ActorRosterUpdate { tick: 4, actors });
        assert_eq!(roundtrip(&full), full);
    }

    fn actor_with_path(id: u8, cells: usize) -> ActorRecord {
        let width = TILE_MAP_WIDTH as usize;
        ActorRecord {
            head: ActorHead { state: ActorState::Alive, id, direction: GridVec2::UP, owner: id },
            path: (0..cells)
                .map(|i| GridVec2::new((i % width) as i32, (i / width) as i32))
                .collect(),
        }
    }

    fn decode_actor_roster(message: &Message) -> Result<Message, CodecError> {
        let mut buf = ByteBuffer::new();
        message.encode(&mut buf);
        buf.seek(Seek::Start(0));
        Message::decode(MessageKind::ActorRoster, &mut buf)
    }

    #[test]
    fn test_actor_roster_at_both_limits() {
        let actors = (0..MAX_PLAYERS as u8).map(|id| actor_with_path(id, TILE_COUNT)).collect();
        let message = Message::ActorRoster(ActorRosterUpdate { tick: 9, actors });
        assert!(encoded_len(&message) <= crate::DEFAULT_MAX_PAYLOAD_SIZE);
        assert_eq!(roundtrip(&message), message);
    }

    #[test]
    fn test_path_longer_than_grid_rejected() {
        let message = Message::ActorRoster(ActorRosterUpdate {
            tick: 9,
            actors: vec![actor_with_path(0, TILE_COUNT + 1)],
        });
        assert_eq!(
            decode_actor_roster(&message),
            Err(CodecError::CountTooLarge { count: TILE_COUNT as u32 + 1, limit: TILE_COUNT })
        );
    }

    #[test]
    fn test_too_many_actors_rejected() {
        let actors = (0..=MAX_PLAYERS as u8).map(|id| actor_with_path(id, 0)).collect();
        let message = Message::ActorRoster(ActorRosterUpdate { tick: 9, actors });
        assert_eq!(
            decode_actor_roster(&message),
            Err(CodecError::CountTooLarge { count: MAX_PLAYERS as u32 + 1, limit: MAX_PLAYERS })
        );
    }

    #[test]
    fn test_actor_roster_layout() {
        let message = Message::ActorRoster(ActorRosterUpdate {
            tick: 1,
            actors: vec![ActorRecord {
                head: ActorHead { state: ActorState::Dead, id: 3, direction: GridVec2::DOWN, owner: 4 },
                path: vec![GridVec2::new(1, 2)],
            }],
        });
        let mut buf = ByteBuffer::new();
        message.encode(&mut buf);
        assert_eq!(
            buf.as_slice(),
            &[
                1, 0, 0, 0, // tick
                1, 0, 0, 0, // actor count
                2, 3, 0, 0, 0, 0, 1, 0, 0, 0, 4, // head
                1, 0, 0, 0, // path count
                1, 0, 0, 0, 2, 0, 0, 0, // path
            ]
        );
    }

    #[test]
    fn test_invalid_enum_rejected() {
        let mut bytes = [0u8; RoundStateChange::WIRE_SIZE];
        bytes[4] = 9;
        let mut view = ByteBuffer::from_slice(&mut bytes);
        assert_eq!(
            Message::decode(MessageKind::RoundStateChange, &mut view),
            Err(CodecError::InvalidValue { field: "round state", value: 9 })
        );
    }

    #[test]
    fn test_truncated_plain_payload() {
        let mut bytes = [0u8; 3];
        let mut view = ByteBuffer::from_slice(&mut bytes);
        assert!(matches!(
            Message::decode(MessageKind::TickHeartbeat, &mut view),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_ping_frame_bytes() {
        let frame = Message::Ping(Ping { timestamp: 1.5 }).to_frame();
        assert_eq!(frame.len(), HEADER_SIZE + 8);
        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&frame.as_slice()[..HEADER_SIZE]);
        assert_eq!(FrameHeader::from_bytes(&header), FrameHeader::new(3, 8));
        assert_eq!(&frame.as_slice()[HEADER_SIZE..], &1.5f64.to_le_bytes());
    }

    fn arb_vec2() -> impl Strategy<Value = GridVec2> {
        (any::<i32>(), any::<i32>()).prop_map(|(x, y)| GridVec2::new(x, y))
    }

    fn arb_actor() -> impl Strategy<Value = ActorRecord> {
        (0u8..3, 0u8..MAX_PLAYERS as u8, arb_vec2(), any::<u8>(), prop::collection::vec(arb_vec2(), 0..64))
            .prop_map(|(state, id, direction, owner, path)| ActorRecord {
                head: ActorHead {
                    state: ActorState::from_u8(state).unwrap(),
                    id,
                    direction,
                    owner,
                },
                path,
            })
    }

    proptest! {
        #[test]
        fn prop_actor_roster_roundtrip(tick in any::<u32>(), actors in prop::collection::vec(arb_actor(), 0..=MAX_PLAYERS)) {
            let message = Message::ActorRoster(ActorRosterUpdate { tick, actors });
            prop_assert_eq!(roundtrip(&message), message);
        }

        #[test]
        fn prop_hello_roundtrip(version in any::<u32>(), name in "[a-zA-Z0-9 _-]{0,32}") {
            let message = Message::Hello(Hello { version, name });
            prop_assert_eq!(roundtrip(&message), message);
        }

        #[test]
        fn prop_ping_roundtrip(timestamp in -1.0e12f64..1.0e12) {
            let message = Message::Ping(Ping { timestamp });
            prop_assert_eq!(roundtrip(&message), message);
        }

        #[test]
        fn prop_direction_roundtrip(tick in any::<u32>(), actor in 0u8..MAX_PLAYERS as u8, direction in arb_vec2()) {
            let message = Message::ActorDirection(ActorDirection { tick, actor, direction });
            prop_assert_eq!(roundtrip(&message), message);
        }
    }
}
