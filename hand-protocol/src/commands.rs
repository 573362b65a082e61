//! Outbound commands and their byte encoding.

use std::str::FromStr;

/// Number of servos on the hand
pub const SERVO_COUNT: usize = 6;

/// Command byte constants (controller → hand)
mod cmd {
    pub const SET_SERVO: u8 = 0b0000_0000;
    pub const SET_CONFIG: u8 = 0b1000_0000;
    pub const QUERY_POSITIONS: u8 = 0x08;
    pub const QUERY_LIMITS: u8 = 0x09;
    pub const QUERY_FORCE: u8 = 0x0A;
    pub const TOGGLE_FORCE_STREAM: u8 = 0x0B;

    pub const MAX_SERVO: u8 = 5;
    pub const MAX_CONFIG: u8 = 0x7F;
}

/// Upper bound applied to servo values before they are sent.
///
/// Early firmware accepted the whole byte range; later revisions drive the
/// servos in degrees and expect 0-180.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServoRange {
    /// 0-255
    #[default]
    Full,
    /// 0-180
    Degrees,
}

impl ServoRange {
    pub fn max(self) -> u8 {
        match self {
            ServoRange::Full => 255,
            ServoRange::Degrees => 180,
        }
    }
}

impl FromStr for ServoRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "255" | "full" => Ok(ServoRange::Full),
            "180" | "deg" | "degrees" => Ok(ServoRange::Degrees),
            other => Err(format!("unknown servo range '{}' (expected 255 or 180)", other)),
        }
    }
}

/// The six servos, in wire index order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Servo {
    Finger0 = 0,
    Finger1 = 1,
    Finger2 = 2,
    Finger3 = 3,
    Thumb0 = 4,
    Thumb1 = 5,
}

impl Servo {
    pub const ALL: [Servo; SERVO_COUNT] = [
        Servo::Finger0,
        Servo::Finger1,
        Servo::Finger2,
        Servo::Finger3,
        Servo::Thumb0,
        Servo::Thumb1,
    ];

    pub fn from_index(index: u8) -> Option<Servo> {
        Servo::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Servo::Finger0 => "Finger 0",
            Servo::Finger1 => "Finger 1",
            Servo::Finger2 => "Finger 2",
            Servo::Finger3 => "Finger 3",
            Servo::Thumb0 => "Thumb 0",
            Servo::Thumb1 => "Thumb 1",
        }
    }
}

impl std::fmt::Display for Servo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Servo {
    type Err = String;

    /// Accepts an index ("4") or a name ("thumb0", "Thumb 0")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(index) = s.trim().parse::<u8>() {
            return Servo::from_index(index).ok_or_else(|| format!("no servo with index {}", index));
        }
        let wanted: String = s.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase();
        Servo::ALL
            .iter()
            .copied()
            .find(|servo| servo.name().replace(' ', "").to_lowercase() == wanted)
            .ok_or_else(|| format!("unknown servo '{}'", s))
    }
}

/// Configuration presets known to the firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Zeros = 0,
    Ascending = 1,
    Descending = 2,
    Alternating = 3,
    /// Not a real configuration: the firmware rejects it and falls back to Zeros
    Invalid = 4,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::Zeros,
        Preset::Ascending,
        Preset::Descending,
        Preset::Alternating,
        Preset::Invalid,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Preset::Zeros => "Zeros",
            Preset::Ascending => "Ascending",
            Preset::Descending => "Descending",
            Preset::Alternating => "Alternating",
            Preset::Invalid => "Invalid",
        }
    }

    /// Servo positions the firmware applies for this preset
    pub fn positions(self) -> Option<[u8; SERVO_COUNT]> {
        match self {
            Preset::Zeros => Some([0, 0, 0, 0, 0, 0]),
            Preset::Ascending => Some([0, 36, 72, 98, 134, 180]),
            Preset::Descending => Some([180, 134, 98, 72, 36, 0]),
            Preset::Alternating => Some([0, 180, 0, 180, 0, 180]),
            Preset::Invalid => None,
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Preset::ALL
            .iter()
            .copied()
            .find(|p| p.name().to_lowercase() == wanted)
            .ok_or_else(|| format!("unknown preset '{}'", s))
    }
}

/// Commands sent to the hand.
///
/// Use the constructors: they saturate out-of-range input instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Move one servo
    SetServo { servo: u8, value: u8 },
    /// Apply a configuration preset
    SetConfig(u8),
    QueryPositions,
    QueryLimits,
    QueryForce,
    ToggleForceStream,
}

impl Command {
    pub fn set_servo(servo: i64, value: i64) -> Self {
        Command::SetServo {
            servo: servo.clamp(0, cmd::MAX_SERVO as i64) as u8,
            value: value.clamp(0, u8::MAX as i64) as u8,
        }
    }

    pub fn set_config(config: i64) -> Self {
        Command::SetConfig(config.clamp(0, cmd::MAX_CONFIG as i64) as u8)
    }

    pub fn move_servo(servo: Servo, value: i64) -> Self {
        Command::set_servo(servo.index() as i64, value)
    }

    pub fn preset(preset: Preset) -> Self {
        Command::SetConfig(preset.id())
    }

    /// Encode with the full 0-255 servo range
    pub fn encode(&self) -> Vec<u8> {
        CommandEncoder::default().encode(self)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::SetServo { servo, value } => match Servo::from_index(*servo) {
                Some(named) => write!(f, "set servo {} ({}) to {}", servo, named, value),
                None => write!(f, "set servo {} to {}", servo, value),
            },
            Command::SetConfig(id) => match Preset::ALL.get(*id as usize) {
                Some(preset) => write!(f, "set config {} ({})", id, preset),
                None => write!(f, "set config {}", id),
            },
            Command::QueryPositions => write!(f, "query positions"),
            Command::QueryLimits => write!(f, "query limits"),
            Command::QueryForce => write!(f, "query force"),
            Command::ToggleForceStream => write!(f, "toggle force stream"),
        }
    }
}

/// Turns commands into wire bytes for a given servo range
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandEncoder {
    range: ServoRange,
}

impl CommandEncoder {
    pub fn new(range: ServoRange) -> Self {
        CommandEncoder { range }
    }

    pub fn range(&self) -> ServoRange {
        self.range
    }

    pub fn encode(&self, command: &Command) -> Vec<u8> {
        match *command {
            Command::SetServo { servo, value } => vec![
                cmd::SET_SERVO | servo.min(cmd::MAX_SERVO),
                value.min(self.range.max()),
            ],
            Command::SetConfig(id) => vec![cmd::SET_CONFIG | id.min(cmd::MAX_CONFIG)],
            Command::QueryPositions => vec![cmd::QUERY_POSITIONS],
            Command::QueryLimits => vec![cmd::QUERY_LIMITS],
            Command::QueryForce => vec![cmd::QUERY_FORCE],
            Command::ToggleForceStream => vec![cmd::TOGGLE_FORCE_STREAM],
        }
    }
}
