//! Movement modes and their wire encoding.

use serde::{Deserialize, Serialize};

/// How the actor is currently moving. Crosses the wire as a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum MovementMode {
    /// No movement simulation at all.
    None = 0,
    /// Grounded movement constrained to walkable floor.
    #[default]
    Walking = 1,
    /// Airborne under gravity.
    Falling = 2,
    /// Free 3D movement, no gravity.
    Flying = 3,
    /// Buoyant movement. The tracked capsule reports zero immersion depth,
    /// so this mode behaves like flying.
    Swimming = 4,
    /// Scripted movement driven by external root motion.
    Custom = 5,
}

impl MovementMode {
    /// Wire encoding.
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Decodes a wire byte. `None` for undefined values; the server treats
    /// that as a validation failure.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::None),
            1 => Some(Self::Walking),
            2 => Some(Self::Falling),
            3 => Some(Self::Flying),
            4 => Some(Self::Swimming),
            5 => Some(Self::Custom),
            _ => None,
        }
    }

    /// `true` for modes that stand on a floor.
    pub fn is_grounded(self) -> bool {
        matches!(self, Self::Walking)
    }
}
