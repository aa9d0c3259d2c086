//! Rotation and reflection flags
//!
//! The bit values are the ones the RandR protocol uses, so backends can pass
//! them through unchanged.

use enumflags2::{bitflags, BitFlags};
use serde::{Deserialize, Serialize};

/// A single rotation or reflection bit
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RotationFlag {
    /// No rotation
    Rotate0 = 0b00_0001,
    /// Quarter turn counter-clockwise ("left")
    Rotate90 = 0b00_0010,
    /// Half turn ("upside_down")
    Rotate180 = 0b00_0100,
    /// Quarter turn clockwise ("right")
    Rotate270 = 0b00_1000,
    /// Mirror along the X axis
    ReflectX = 0b01_0000,
    /// Mirror along the Y axis
    ReflectY = 0b10_0000,
}

const QUARTER_TURNS: [RotationFlag; 4] = [
    RotationFlag::Rotate0,
    RotationFlag::Rotate90,
    RotationFlag::Rotate180,
    RotationFlag::Rotate270,
];

/// Rotation of a CRTC or an output: one quarter turn plus optional reflections
///
/// The type does not enforce the "exactly one quarter turn" invariant, since
/// CRTC capability masks use the same representation with several turns set.
/// Use [`Rotation::is_valid_transform`] where a single transform is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rotation(BitFlags<RotationFlag>);

impl Default for Rotation {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl Rotation {
    /// Unrotated, unreflected
    pub const NORMAL: Rotation = Rotation(enumflags2::make_bitflags!(RotationFlag::{Rotate0}));

    /// Every rotation and reflection (typical capability mask)
    pub const ALL: Rotation = Rotation(BitFlags::ALL);

    /// Build from protocol bits, dropping unknown ones
    pub fn from_bits_truncate(bits: u8) -> Self {
        Self(BitFlags::from_bits_truncate(bits))
    }

    /// Build from a quarter turn and reflection bits
    pub fn new(turn: RotationFlag, reflect_x: bool, reflect_y: bool) -> Self {
        let mut flags = BitFlags::from_flag(turn);
        if reflect_x {
            flags |= RotationFlag::ReflectX;
        }
        if reflect_y {
            flags |= RotationFlag::ReflectY;
        }
        Self(flags)
    }

    /// Protocol bits
    pub fn bits(self) -> u8 {
        self.0.bits()
    }

    /// Whether every bit in `other` is also set here
    pub fn contains(self, other: Rotation) -> bool {
        self.0.contains(other.0)
    }

    /// Whether `flag` is set
    pub fn has(self, flag: RotationFlag) -> bool {
        self.0.contains(flag)
    }

    /// The quarter turn, if exactly one is set
    pub fn quarter_turn(self) -> Option<RotationFlag> {
        let mut turns = QUARTER_TURNS.iter().copied().filter(|turn| self.0.contains(*turn));
        match (turns.next(), turns.next()) {
            (Some(turn), None) => Some(turn),
            _ => None,
        }
    }

    /// Exactly one quarter turn is set
    pub fn is_valid_transform(self) -> bool {
        self.quarter_turn().is_some()
    }

    /// Width and height trade places (90 or 270 degrees)
    pub fn swaps_axes(self) -> bool {
        self.0.intersects(RotationFlag::Rotate90 | RotationFlag::Rotate270)
    }

    /// Mirrored along X
    pub fn reflect_x(self) -> bool {
        self.0.contains(RotationFlag::ReflectX)
    }

    /// Mirrored along Y
    pub fn reflect_y(self) -> bool {
        self.0.contains(RotationFlag::ReflectY)
    }

    /// Name of the quarter turn as written in `monitors.xml`
    pub fn turn_name(self) -> &'static str {
        match self.quarter_turn() {
            Some(RotationFlag::Rotate90) => "left",
            Some(RotationFlag::Rotate180) => "upside_down",
            Some(RotationFlag::Rotate270) => "right",
            _ => "normal",
        }
    }

    /// Parse a quarter-turn name as written in `monitors.xml`
    pub fn turn_from_name(name: &str) -> Option<RotationFlag> {
        match name {
            "normal" => Some(RotationFlag::Rotate0),
            "left" => Some(RotationFlag::Rotate90),
            "upside_down" => Some(RotationFlag::Rotate180),
            "right" => Some(RotationFlag::Rotate270),
            _ => None,
        }
    }
}

impl From<RotationFlag> for Rotation {
    fn from(flag: RotationFlag) -> Self {
        Self(BitFlags::from_flag(flag))
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.turn_name())?;
        if self.reflect_x() {
            f.write_str("+reflect_x")?;
        }
        if self.reflect_y() {
            f.write_str("+reflect_y")?;
        }
        Ok(())
    }
}
