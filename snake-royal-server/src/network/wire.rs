//! Wire Encoding
//!
//! Field-by-field little-endian encoding on top of [`ByteBuffer`], plus the
//! frame header every message is wrapped in:
//!
//! ```text
//! +-----------------+-------------------+------------------+-----------------+
//! | signature: u32  | payload_size: u32 | message_type: u16| payload ...     |
//! | 0xDEADBEEF (LE) | bytes after header| catalog tag      | payload_size B  |
//! +-----------------+-------------------+------------------+-----------------+
//! ```
//!
//! Records are never copied as raw memory; each field is written in a fixed
//! order with a fixed width.

use crate::core::buffer::ByteBuffer;
use crate::core::vec2::GridVec2;

/// Magic value opening every frame.
pub const FRAME_SIGNATURE: u32 = 0xDEAD_BEEF;

/// Encoded header size: signature + payload size + message type.
pub const HEADER_SIZE: usize = 4 + 4 + 2;

/// Fixed width of display names on the wire (zero padded UTF-8).
pub const NAME_LEN: usize = 32;

/// Wire value for "no participant" / "no actor".
pub const NO_ID: u8 = u8::MAX;

/// Payload decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Payload ended before the record did.
    #[error("payload truncated: needed {needed} bytes, {available} left")]
    Truncated {
        /// Bytes the next field needs.
        needed: usize,
        /// Bytes left in the payload.
        available: usize,
    },

    /// Sequence count beyond what the payload or the roster limits allow.
    #[error("sequence count {count} exceeds limit {limit}")]
    CountTooLarge {
        /// Count read from the wire.
        count: u32,
        /// Largest acceptable count.
        limit: usize,
    },

    /// Enum or id field outside its valid range.
    #[error("invalid {field} value {value}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// Raw value.
        value: u64,
    },
}

// =============================================================================
// FIELDS
// =============================================================================

/// A fixed-width value with a defined little-endian encoding.
pub trait WireField: Sized {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Append at the cursor.
    fn put(&self, buf: &mut ByteBuffer<'_>);

    /// Read from the cursor.
    fn get(buf: &mut ByteBuffer<'_>) -> Result<Self, CodecError>;
}

/// Read exactly `N` bytes or fail without consuming a partial field.
fn take<const N: usize>(buf: &mut ByteBuffer<'_>) -> Result<[u8; N], CodecError> {
    if buf.remaining() < N {
        return Err(CodecError::Truncated {
            needed: N,
            available: buf.remaining(),
        });
    }
    let mut out = [0u8; N];
    buf.read(&mut out);
    Ok(out)
}

macro_rules! le_field {
    ($($ty:ty),*) => {
        $(
            impl WireField for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn put(&self, buf: &mut ByteBuffer<'_>) {
                    buf.write(&self.to_le_bytes());
                }

                #[inline]
                fn get(buf: &mut ByteBuffer<'_>) -> Result<Self, CodecError> {
                    Ok(<$ty>::from_le_bytes(take(buf)?))
                }
            }
        )*
    };
}

le_field!(u8, u16, u32, u64, i32, f64);

impl WireField for GridVec2 {
    const SIZE: usize = 8;

    fn put(&self, buf: &mut ByteBuffer<'_>) {
        self.x.put(buf);
        self.y.put(buf);
    }

    fn get(buf: &mut ByteBuffer<'_>) -> Result<Self, CodecError> {
        Ok(GridVec2::new(i32::get(buf)?, i32::get(buf)?))
    }
}

/// Write an optional id, `None` as [`NO_ID`].
pub fn put_id(buf: &mut ByteBuffer<'_>, id: Option<u8>) {
    id.unwrap_or(NO_ID).put(buf);
}

/// Read an optional id.
pub fn get_id(buf: &mut ByteBuffer<'_>) -> Result<Option<u8>, CodecError> {
    let raw = u8::get(buf)?;
    Ok((raw != NO_ID).then_some(raw))
}

/// Write a name into a fixed [`NAME_LEN`] field, truncated on a char boundary.
pub fn put_name(buf: &mut ByteBuffer<'_>, name: &str) {
    let mut end = name.len().min(NAME_LEN);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    let mut field = [0u8; NAME_LEN];
    field[..end].copy_from_slice(&name.as_bytes()[..end]);
    buf.write(&field);
}

/// Read a fixed-width name; stops at the first zero byte.
pub fn get_name(buf: &mut ByteBuffer<'_>) -> Result<String, CodecError> {
    let field: [u8; NAME_LEN] = take(buf)?;
    let len = field.iter().position(|b| *b == 0).unwrap_or(NAME_LEN);
    Ok(String::from_utf8_lossy(&field[..len]).into_owned())
}

/// Write a sequence length prefix.
pub fn put_count(buf: &mut ByteBuffer<'_>, count: usize) {
    (count as u32).put(buf);
}

/// Read a sequence length prefix.
///
/// Rejects counts above `limit` and counts whose elements (at least
/// `min_element_size` bytes each) could not fit in what is left.
pub fn get_count(
    buf: &mut ByteBuffer<'_>,
    min_element_size: usize,
    limit: usize,
) -> Result<usize, CodecError> {
    let count = u32::get(buf)?;
    let fits = buf.remaining() / min_element_size.max(1);
    if count as usize > limit || count as usize > fits {
        return Err(CodecError::CountTooLarge {
            count,
            limit: limit.min(fits),
        });
    }
    Ok(count as usize)
}

/// Write a count-prefixed sequence of fixed-width elements.
pub fn put_seq<T: WireField>(buf: &mut ByteBuffer<'_>, items: &[T]) {
    put_count(buf, items.len());
    for item in items {
        item.put(buf);
    }
}

/// Read a count-prefixed sequence of fixed-width elements.
pub fn get_seq<T: WireField>(buf: &mut ByteBuffer<'_>, limit: usize) -> Result<Vec<T>, CodecError> {
    let count = get_count(buf, T::SIZE, limit)?;
    (0..count).map(|_| T::get(buf)).collect()
}

// =============================================================================
// FRAME HEADER
// =============================================================================

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Must equal [`FRAME_SIGNATURE`].
    pub signature: u32,
    /// Payload length, header excluded.
    pub payload_size: u32,
    /// Message type tag.
    pub message_type: u16,
}

impl FrameHeader {
    /// Header for a payload of `payload_size` bytes.
    pub fn new(message_type: u16, payload_size: u32) -> Self {
        Self {
            signature: FRAME_SIGNATURE,
            payload_size,
            message_type,
        }
    }

    /// True when the signature matches.
    pub fn is_valid(&self) -> bool {
        self.signature == FRAME_SIGNATURE
    }

    /// Encode to wire bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.signature.to_le_bytes());
        out[4..8].copy_from_slice(&self.payload_size.to_le_bytes());
        out[8..10].copy_from_slice(&self.message_type.to_le_bytes());
        out
    }

    /// Decode from wire bytes.
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        Self {
            signature: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            payload_size: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            message_type: u16::from_le_bytes([bytes[8], bytes[9]]),
        }
    }
}

/// Append one frame at the cursor of `out`.
///
/// Reserves the header slot first, lets `encode_payload` write the body,
/// then fills the header in once the payload length is known. Returns the
/// total frame length.
pub fn write_frame<F>(out: &mut ByteBuffer<'_>, message_type: u16, encode_payload: F) -> usize
where
    F: FnOnce(&mut ByteBuffer<'_>),
{
    let header_at = out.reserve_room(HEADER_SIZE);
    let payload_at = out.offset();
    encode_payload(out);
    let payload_size = out.offset() - payload_at;

    let header = FrameHeader::new(message_type, payload_size as u32);
    out.as_mut_slice()[header_at..header_at + HEADER_SIZE].copy_from_slice(&header.to_bytes());
    HEADER_SIZE + payload_size
}
