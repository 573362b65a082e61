//! Streaming frame decoder.
//!
//! The hand sends frames back to back with no delimiter, so the decoder reads
//! one header byte, works out the payload length from its bit pattern, then
//! collects exactly that many payload bytes before looking at the next header.

use crate::commands::SERVO_COUNT;
use crate::messages::{header, Message, ProtocolError};

/// Something the decoder can pull bytes from.
pub trait ByteSource {
    /// Read up to `n` bytes.
    ///
    /// Returns fewer than `n` bytes (possibly none) only when the read timed
    /// out. Closure and I/O failure are reported as errors.
    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, ProtocolError>;
}

/// Frame kind, determined by the header byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Text { len: usize },
    ServoPosition { servo: u8 },
    AllServoPositions,
    AllServoLimits,
    RawForceReading,
}

impl FrameKind {
    /// Classify a header byte.
    ///
    /// The order matters: the top-bit test must win over the exact codes.
    pub fn classify(byte: u8) -> Option<FrameKind> {
        if byte & 0x80 != 0 {
            Some(FrameKind::Text {
                len: (byte & 0x7F) as usize + 1,
            })
        } else if byte & 0xF8 == 0 {
            Some(FrameKind::ServoPosition { servo: byte })
        } else {
            match byte {
                header::ALL_POSITIONS => Some(FrameKind::AllServoPositions),
                header::ALL_LIMITS => Some(FrameKind::AllServoLimits),
                header::FORCE_RAW => Some(FrameKind::RawForceReading),
                _ => None,
            }
        }
    }

    /// Number of payload bytes following the header
    pub fn payload_len(self) -> usize {
        match self {
            FrameKind::Text { len } => len,
            FrameKind::ServoPosition { .. } => 1,
            FrameKind::AllServoPositions => SERVO_COUNT,
            FrameKind::AllServoLimits => 2 * SERVO_COUNT,
            FrameKind::RawForceReading => 6,
        }
    }

    /// Build the message from a complete payload
    fn build(self, payload: &[u8]) -> Message {
        debug_assert_eq!(payload.len(), self.payload_len());
        match self {
            FrameKind::Text { .. } => Message::Text(String::from_utf8_lossy(payload).into_owned()),
            FrameKind::ServoPosition { servo } => Message::ServoPosition {
                servo,
                position: payload[0],
            },
            FrameKind::AllServoPositions => {
                let mut positions = [0u8; SERVO_COUNT];
                positions.copy_from_slice(&payload[..SERVO_COUNT]);
                Message::AllServoPositions(positions)
            }
            FrameKind::AllServoLimits => {
                let mut limits = [(0u8, 0u8); SERVO_COUNT];
                for (limit, pair) in limits.iter_mut().zip(payload.chunks_exact(2)) {
                    *limit = (pair[0], pair[1]);
                }
                Message::AllServoLimits(limits)
            }
            FrameKind::RawForceReading => Message::RawForceReading {
                timestamp_ms: u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]),
                reading: u16::from_le_bytes([payload[4], payload[5]]),
            },
        }
    }
}

/// Outcome of one decode step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A complete frame
    Message(Message),
    /// The read timed out; any partial frame is kept for the next call
    Timeout,
    /// An unclassified header byte was dropped
    Discarded(u8),
}

#[derive(Debug)]
enum State {
    AwaitingHeader,
    ReadingPayload { kind: FrameKind, buffer: Vec<u8> },
}

/// Frame decoder state machine
#[derive(Debug)]
pub struct FrameDecoder {
    state: State,
    discarded: u64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        FrameDecoder {
            state: State::AwaitingHeader,
            discarded: 0,
        }
    }

    /// Number of header bytes dropped so far
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Whether a frame is partially received
    pub fn in_frame(&self) -> bool {
        matches!(self.state, State::ReadingPayload { .. })
    }

    /// Drop any partial frame
    pub fn reset(&mut self) {
        self.state = State::AwaitingHeader;
    }

    /// Advance the state machine until a frame completes, a read times out,
    /// or a header byte is discarded.
    ///
    /// On error the partial frame is dropped and the decoder is back to
    /// awaiting a header.
    pub fn decode_next<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<Decoded, ProtocolError> {
        let result = self.step(source);
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn step<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> Result<Decoded, ProtocolError> {
        loop {
            match std::mem::replace(&mut self.state, State::AwaitingHeader) {
                State::AwaitingHeader => {
                    let bytes = source.read_exact(1)?;
                    let Some(&byte) = bytes.first() else {
                        return Ok(Decoded::Timeout);
                    };
                    match FrameKind::classify(byte) {
                        Some(kind) => {
                            self.state = State::ReadingPayload {
                                kind,
                                buffer: Vec::with_capacity(kind.payload_len()),
                            };
                        }
                        None => {
                            self.discarded += 1;
                            log::debug!("discarding unclassified header 0x{:02X}", byte);
                            return Ok(Decoded::Discarded(byte));
                        }
                    }
                }
                State::ReadingPayload { kind, mut buffer } => {
                    let remaining = kind.payload_len() - buffer.len();
                    let bytes = source.read_exact(remaining)?;
                    buffer.extend_from_slice(&bytes[..bytes.len().min(remaining)]);

                    if buffer.len() < kind.payload_len() {
                        self.state = State::ReadingPayload { kind, buffer };
                        return Ok(Decoded::Timeout);
                    }

                    let message = kind.build(&buffer);
                    log::trace!("decoded {:?}", message);
                    return Ok(Decoded::Message(message));
                }
            }
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
