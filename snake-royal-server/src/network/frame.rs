//! Frame Scanner
//!
//! Pulls complete frames out of a connection's inbound buffer. Partial
//! frames stay in the buffer until more bytes arrive; everything consumed
//! during one scan is erased in a single pass at the end.

use crate::core::buffer::{ByteBuffer, OwnedBuffer, Seek};
use crate::network::wire::{CodecError, FrameHeader, HEADER_SIZE};
use crate::DEFAULT_MAX_PAYLOAD_SIZE;

/// Stream-level faults. Any of these poisons the connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Header did not start with the frame signature.
    #[error("bad frame signature {0:#010x}")]
    BadSignature(u32),

    /// Declared payload larger than this side accepts.
    #[error("payload of {size} bytes exceeds limit {limit}")]
    PayloadTooLarge {
        /// Declared size.
        size: u32,
        /// Configured limit.
        limit: usize,
    },

    /// Payload failed to decode.
    #[error("decode failed: {0}")]
    Codec(#[from] CodecError),
}

/// Walks an inbound buffer frame by frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameScanner {
    max_payload: usize,
}

impl Default for FrameScanner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_SIZE)
    }
}

impl FrameScanner {
    /// Scanner rejecting payloads above `max_payload` bytes.
    pub fn new(max_payload: usize) -> Self {
        Self { max_payload }
    }

    /// Largest accepted payload.
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Hand every complete frame in `buf` to `on_frame`, in order.
    ///
    /// `on_frame` gets the header and a borrowed view over exactly the
    /// payload bytes. The callback may read as much or as little of the view
    /// as it likes; the scanner moves on to the next header regardless.
    ///
    /// Consumed bytes are erased from the front of `buf` and the cursor is
    /// reset to 0, leaving any trailing partial frame in place. On error
    /// nothing further is consumed and the error is returned; the caller is
    /// expected to drop the connection.
    ///
    /// Returns the number of frames delivered.
    pub fn scan<F>(&self, buf: &mut OwnedBuffer, mut on_frame: F) -> Result<usize, FrameError>
    where
        F: FnMut(&FrameHeader, &mut ByteBuffer<'_>) -> Result<(), FrameError>,
    {
        buf.seek(Seek::Start(0));
        let mut frames = 0;
        let result = loop {
            if buf.remaining() < HEADER_SIZE {
                break Ok(frames);
            }

            let start = buf.offset();
            let mut raw = [0u8; HEADER_SIZE];
            buf.read(&mut raw);
            let header = FrameHeader::from_bytes(&raw);

            if !header.is_valid() {
                break Err(FrameError::BadSignature(header.signature));
            }
            let size = header.payload_size as usize;
            if size > self.max_payload {
                break Err(FrameError::PayloadTooLarge {
                    size: header.payload_size,
                    limit: self.max_payload,
                });
            }
            if buf.remaining() < size {
                // Partial payload; wait for the rest.
                buf.seek(Seek::Start(start));
                break Ok(frames);
            }

            let payload_start = buf.offset();
            let payload_end = payload_start + size;
            #[cfg(feature = "debug-tracing")]
            tracing::trace!(
                message_type = header.message_type,
                size,
                at = start,
                "frame"
            );
            {
                let mut view = ByteBuffer::from_slice(&mut buf.as_mut_slice()[payload_start..payload_end]);
                if let Err(err) = on_frame(&header, &mut view) {
                    break Err(err);
                }
            }
            buf.seek(Seek::Start(payload_end));
            frames += 1;
        };

        let consumed = buf.offset();
        buf.seek(Seek::Start(0));
        if result.is_ok() && consumed > 0 {
            buf.erase(consumed);
        }
        buf.seek(Seek::Start(0));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::GridVec2;
    use crate::network::protocol::{ActorDirection, Message, MessageKind, Ping, TickHeartbeat};
    use crate::network::wire::write_frame;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn frames(messages: &[Message]) -> Vec<u8> {
        let mut out = ByteBuffer::new();
        for message in messages {
            message.encode_frame(&mut out);
        }
        out.as_slice().to_vec()
    }

    fn collect(scanner: &FrameScanner, buf: &mut OwnedBuffer) -> Result<Vec<Message>, FrameError> {
        let mut out = Vec::new();
        scanner.scan(buf, |header, payload| {
            if let Some(kind) = MessageKind::from_u16(header.message_type) {
                out.push(Message::decode(kind, payload)?);
            }
            Ok(())
        })?;
        Ok(out)
    }

    #[test]
    fn test_scans_back_to_back_frames() {
        let messages = vec![
            Message::Ping(Ping { timestamp: 1.0 }),
            Message::TickHeartbeat(TickHeartbeat { tick: 7 }),
        ];
        let mut buf = ByteBuffer::new();
        buf.write(&frames(&messages));

        let got = collect(&FrameScanner::default(), &mut buf).unwrap();
        assert_eq!(got, messages);
        assert!(buf.is_empty());
        assert_eq!(buf.offset(), 0);
    }

    #[test]
    fn test_partial_frame_left_in_place() {
        let bytes = frames(&[
            Message::TickHeartbeat(TickHeartbeat { tick: 1 }),
            Message::TickHeartbeat(TickHeartbeat { tick: 2 }),
        ]);
        let split = bytes.len() - 2;
        let mut buf = ByteBuffer::new();
        buf.write(&bytes[..split]);

        let scanner = FrameScanner::default();
        let got = collect(&scanner, &mut buf).unwrap();
        assert_eq!(got, vec![Message::TickHeartbeat(TickHeartbeat { tick: 1 })]);
        assert_eq!(buf.len(), split - (HEADER_SIZE + 4));

        buf.seek(Seek::End(0));
        buf.write(&bytes[split..]);
        let got = collect(&scanner, &mut buf).unwrap();
        assert_eq!(got, vec![Message::TickHeartbeat(TickHeartbeat { tick: 2 })]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_byte_at_a_time() {
        let messages = vec![
            Message::Ping(Ping { timestamp: 3.5 }),
            Message::TickHeartbeat(TickHeartbeat { tick: 9 }),
        ];
        let bytes = frames(&messages);
        let scanner = FrameScanner::default();
        let mut buf = ByteBuffer::new();
        let mut got = Vec::new();
        for byte in bytes {
            buf.seek(Seek::End(0));
            buf.write(&[byte]);
            got.extend(collect(&scanner, &mut buf).unwrap());
        }
        assert_eq!(got, messages);
    }

    #[test]
    fn test_bad_signature() {
        let mut bytes = frames(&[Message::TickHeartbeat(TickHeartbeat { tick: 1 })]);
        bytes[0] ^= 0xFF;
        let mut buf = ByteBuffer::new();
        buf.write(&bytes);
        assert!(matches!(
            collect(&FrameScanner::default(), &mut buf),
            Err(FrameError::BadSignature(_))
        ));
    }

    #[test]
    fn test_oversized_payload_rejected_before_arrival() {
        let mut buf = ByteBuffer::new();
        buf.write(&FrameHeader::new(1, 4096).to_bytes());
        let result = collect(&FrameScanner::new(1024), &mut buf);
        assert_eq!(result, Err(FrameError::PayloadTooLarge { size: 4096, limit: 1024 }));
    }

    #[test]
    fn test_unknown_type_skipped() {
        let mut buf = ByteBuffer::new();
        write_frame(&mut buf, 999, |b| {
            b.write(&[1, 2, 3, 4, 5]);
        });
        Message::TickHeartbeat(TickHeartbeat { tick: 4 }).encode_frame(&mut buf);

        let got = collect(&FrameScanner::default(), &mut buf).unwrap();
        assert_eq!(got, vec![Message::TickHeartbeat(TickHeartbeat { tick: 4 })]);
    }

    #[test]
    fn test_callback_need_not_consume_payload() {
        let mut buf = ByteBuffer::new();
        buf.write(&frames(&[
            Message::Ping(Ping { timestamp: 1.0 }),
            Message::Ping(Ping { timestamp: 2.0 }),
        ]));
        let mut seen = 0;
        let count = FrameScanner::default()
            .scan(&mut buf, |header, _payload| {
                assert_eq!(header.payload_size, 8);
                seen += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!((count, seen), (2, 2));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_short_plain_payload_is_codec_error() {
        let mut buf = ByteBuffer::new();
        write_frame(&mut buf, MessageKind::TickHeartbeat.tag(), |b| {
            b.write(&[1, 2]);
        });
        assert!(matches!(
            collect(&FrameScanner::default(), &mut buf),
            Err(FrameError::Codec(CodecError::Truncated { .. }))
        ));
    }

    fn sample_stream() -> Vec<Message> {
        (0..40u32)
            .map(|tick| match tick % 3 {
                0 => Message::TickHeartbeat(TickHeartbeat { tick }),
                1 => Message::Ping(Ping { timestamp: tick as f64 * 0.5 }),
                _ => Message::ActorDirection(ActorDirection {
                    tick,
                    actor: (tick % 24) as u8,
                    direction: GridVec2::LEFT,
                }),
            })
            .collect()
    }

    fn scan_in_chunks(bytes: &[u8], sizes: impl Iterator<Item = usize>) -> Vec<Message> {
        let scanner = FrameScanner::default();
        let mut buf = ByteBuffer::new();
        let mut got = Vec::new();
        let mut rest = bytes;
        for size in sizes {
            if rest.is_empty() {
                break;
            }
            let (piece, tail) = rest.split_at(size.clamp(1, rest.len()));
            rest = tail;
            buf.seek(Seek::End(0));
            buf.write(piece);
            got.extend(collect(&scanner, &mut buf).unwrap());
        }
        assert!(rest.is_empty());
        got
    }

    #[test]
    fn test_seeded_random_chunks() {
        let messages = sample_stream();
        let bytes = frames(&messages);
        for seed in 0..8 {
            let mut rng = StdRng::seed_from_u64(seed);
            let sizes = std::iter::repeat_with(move || rng.gen_range(1..=48));
            assert_eq!(scan_in_chunks(&bytes, sizes), messages, "seed {}", seed);
        }
    }

    proptest! {
        #[test]
        fn prop_any_chunking_yields_same_messages(sizes in prop::collection::vec(1usize..64, 1..32)) {
            let messages = sample_stream();
            let bytes = frames(&messages);
            // Cycle the sizes until the whole stream has been fed.
            let got = scan_in_chunks(&bytes, sizes.into_iter().cycle());
            prop_assert_eq!(got, messages);
        }
    }
}
