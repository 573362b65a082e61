//! # Hand Protocol
//!
//! Serial wire protocol between a controller and the six-servo robotic hand.
//!
//! ## Wire Format
//!
//! There is no length prefix and no delimiter: the first byte of every frame
//! (the header) determines the frame kind and how many payload bytes follow.
//!
//! ### Controller → hand
//!
//! | Bytes | Name | Meaning |
//! |-------|------|---------|
//! | `0b00000sss`, value | SET_SERVO | move servo `sss` (0-5) to value |
//! | `0b1ccccccc` | SET_CONFIG | apply configuration preset `c` (0-127) |
//! | `0x08` | QUERY_POSITIONS | request all servo positions |
//! | `0x09` | QUERY_LIMITS | request all servo limits |
//! | `0x0A` | QUERY_FORCE | request one force reading |
//! | `0x0B` | TOGGLE_FORCE_STREAM | start/stop streaming force readings |
//!
//! ### Hand → controller
//!
//! | Header | Name | Payload |
//! |--------|------|---------|
//! | `0b1lllllll` | TEXT | `l + 1` bytes of text |
//! | `0b00000sss` | SERVO_POSITION | position:u8 of servo `sss` |
//! | `0x08` | ALL_POSITIONS | 6 × position:u8 |
//! | `0x09` | ALL_LIMITS | 6 × (min:u8, max:u8) |
//! | `0x0A` | FORCE_RAW | timestamp_ms:u32-LE, reading:u16-LE |
//!
//! Headers are classified in that priority order; any other header byte is
//! discarded and the next byte is treated as a fresh header.

mod commands;
mod connection;
mod decoder;
mod events;
mod listener;
mod messages;
pub mod transport;

pub use commands::{Command, CommandEncoder, Preset, Servo, ServoRange, SERVO_COUNT};
pub use connection::{ConnectionConfig, HandConnection};
pub use decoder::{ByteSource, Decoded, FrameDecoder, FrameKind};
pub use events::{channel, Event, EventReceiver, EventSink};
pub use listener::{ConnectionState, Listener};
pub use messages::{Message, ProtocolError, MAX_TEXT_FRAME_LENGTH};
pub use transport::{available_ports, SerialTransport};
