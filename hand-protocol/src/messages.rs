//! Decoded hand telemetry and the protocol error type.

use crate::commands::{Servo, SERVO_COUNT};

/// Maximum number of text bytes carried by a single TEXT frame
pub const MAX_TEXT_FRAME_LENGTH: usize = 128;

/// Frame header constants (hand → controller)
pub(crate) mod header {
    pub const TEXT: u8 = 0b1000_0000;
    pub const SERVO_POSITION: u8 = 0b0000_0000;
    pub const ALL_POSITIONS: u8 = 0x08;
    pub const ALL_LIMITS: u8 = 0x09;
    pub const FORCE_RAW: u8 = 0x0A;
}

/// Protocol error types
#[derive(Debug)]
pub enum ProtocolError {
    /// I/O error during read/write
    Io(std::io::Error),
    /// Connection closed, either locally or by the device
    ConnectionClosed,
    /// No connection is open
    NotConnected,
    /// The named port does not exist
    PortUnavailable(String),
    /// The port exists but could not be opened
    OpenFailed { port: String, reason: String },
    /// The listener thread could not be started
    Spawn(std::io::Error),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::Io(e) => write!(f, "I/O error: {}", e),
            ProtocolError::ConnectionClosed => write!(f, "Connection closed"),
            ProtocolError::NotConnected => write!(f, "Not connected"),
            ProtocolError::PortUnavailable(port) => write!(f, "Port unavailable: {}", port),
            ProtocolError::OpenFailed { port, reason } => {
                write!(f, "Failed to open {}: {}", port, reason)
            }
            ProtocolError::Spawn(e) => write!(f, "Failed to start listener: {}", e),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::Io(e) | ProtocolError::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProtocolError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::ConnectionClosed
        } else {
            ProtocolError::Io(e)
        }
    }
}

impl From<serialport::Error> for ProtocolError {
    fn from(e: serialport::Error) -> Self {
        match e.kind() {
            serialport::ErrorKind::Io(kind) => {
                ProtocolError::Io(std::io::Error::new(kind, e.description))
            }
            _ => ProtocolError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                e.description,
            )),
        }
    }
}

/// Messages sent by the hand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Free-text status
    Text(String),

    /// Position of a single servo
    ServoPosition { servo: u8, position: u8 },

    /// Positions of all servos, indexed by servo number
    AllServoPositions([u8; SERVO_COUNT]),

    /// (min, max) limits of all servos, indexed by servo number
    AllServoLimits([(u8, u8); SERVO_COUNT]),

    /// Raw force sensor sample
    RawForceReading { timestamp_ms: u32, reading: u16 },
}

impl Message {
    /// Encode the message the way the hand firmware puts it on the wire.
    ///
    /// Text longer than [`MAX_TEXT_FRAME_LENGTH`] bytes is split over several
    /// TEXT frames, never inside a character; empty text produces no bytes at all.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Message::Text(text) => {
                let mut out = Vec::with_capacity(text.len() + text.len() / MAX_TEXT_FRAME_LENGTH + 1);
                for chunk in text_chunks(text) {
                    out.push(header::TEXT | (chunk.len() - 1) as u8);
                    out.extend_from_slice(chunk.as_bytes());
                }
                out
            }
            Message::ServoPosition { servo, position } => {
                vec![header::SERVO_POSITION | (servo & 0x07), *position]
            }
            Message::AllServoPositions(positions) => {
                let mut out = vec![header::ALL_POSITIONS];
                out.extend_from_slice(positions);
                out
            }
            Message::AllServoLimits(limits) => {
                let mut out = Vec::with_capacity(1 + 2 * SERVO_COUNT);
                out.push(header::ALL_LIMITS);
                for (min, max) in limits {
                    out.push(*min);
                    out.push(*max);
                }
                out
            }
            Message::RawForceReading {
                timestamp_ms,
                reading,
            } => {
                let mut out = Vec::with_capacity(7);
                out.push(header::FORCE_RAW);
                out.extend(&timestamp_ms.to_le_bytes());
                out.extend(&reading.to_le_bytes());
                out
            }
        }
    }
}

/// Split `text` into pieces of at most [`MAX_TEXT_FRAME_LENGTH`] bytes on char boundaries
fn text_chunks(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let mut end = rest.len().min(MAX_TEXT_FRAME_LENGTH);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        let (chunk, tail) = rest.split_at(end);
        chunks.push(chunk);
        rest = tail;
    }
    chunks
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Text(text) => write!(f, "> {}", text.trim_end()),
            Message::ServoPosition { servo, position } => match Servo::from_index(*servo) {
                Some(named) => write!(f, "Servo {} ({}) at {}", servo, named, position),
                None => write!(f, "Servo {} at {}", servo, position),
            },
            Message::AllServoPositions(positions) => {
                write!(f, "Servo positions:")?;
                for p in positions {
                    write!(f, " {}", p)?;
                }
                Ok(())
            }
            Message::AllServoLimits(limits) => {
                write!(f, "Servo limits:")?;
                for (min, max) in limits {
                    write!(f, " {},{}", min, max)?;
                }
                Ok(())
            }
            Message::RawForceReading {
                timestamp_ms,
                reading,
            } => write!(f, "Force reading {} at {} ms", reading, timestamp_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_wire_format() {
        let msg = Message::RawForceReading {
            timestamp_ms: 1000,
            reading: 500,
        };
        assert_eq!(msg.encode(), vec![0x0A, 0xE8, 0x03, 0x00, 0x00, 0xF4, 0x01]);
    }

    #[test]
    fn test_text_header_carries_length_minus_one() {
        let encoded = Message::Text("abcd".to_string()).encode();
        assert_eq!(encoded, vec![0b1000_0011, b'a', b'b', b'c', b'd']);
    }

    #[test]
    fn test_long_text_is_split_into_frames() {
        let text = "x".repeat(MAX_TEXT_FRAME_LENGTH + 2);
        let encoded = Message::Text(text).encode();
        assert_eq!(encoded.len(), 1 + MAX_TEXT_FRAME_LENGTH + 1 + 2);
        assert_eq!(encoded[0], 0xFF);
        assert_eq!(encoded[1 + MAX_TEXT_FRAME_LENGTH], 0b1000_0001);
    }

    #[test]
    fn test_long_text_never_splits_a_character() {
        let text = format!("{}é", "x".repeat(MAX_TEXT_FRAME_LENGTH - 1));
        let encoded = Message::Text(text).encode();
        // 127 bytes fit, the two-byte character moves to the next frame
        assert_eq!(encoded[0], 0b1111_1110);
        assert_eq!(&encoded[MAX_TEXT_FRAME_LENGTH..], &[0b1000_0001, 0xC3, 0xA9]);
    }

    #[test]
    fn test_empty_text_encodes_nothing() {
        assert!(Message::Text(String::new()).encode().is_empty());
    }

    #[test]
    fn test_limits_are_interleaved() {
        let msg = Message::AllServoLimits([(1, 2), (3, 4), (5, 6), (7, 8), (9, 10), (11, 12)]);
        assert_eq!(
            msg.encode(),
            vec![0x09, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]
        );
    }

    #[test]
    fn test_display() {
        let msg = Message::AllServoPositions([10, 20, 30, 40, 50, 60]);
        assert_eq!(msg.to_string(), "Servo positions: 10 20 30 40 50 60");

        let msg = Message::ServoPosition {
            servo: 4,
            position: 90,
        };
        assert_eq!(msg.to_string(), "Servo 4 (Thumb 0) at 90");

        let msg = Message::Text("Servo 0 set to 8\r\n".to_string());
        assert_eq!(msg.to_string(), "> Servo 0 set to 8");
    }

    #[test]
    fn test_eof_maps_to_connection_closed() {
        let e = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(ProtocolError::from(e), ProtocolError::ConnectionClosed));
    }
}
