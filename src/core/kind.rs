//! Shared kind enumeration for vehicles and spaces: `1=Motorcycle, 2=Car, 3=Van`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::LotError;

/// Vehicle or space kind. The same codes apply to both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Kind {
    /// Code 1.
    Motorcycle,
    /// Code 2.
    Car,
    /// Code 3.
    Van,
}

impl Kind {
    /// Every kind in code order.
    pub const ALL: [Self; 3] = [Self::Motorcycle, Self::Car, Self::Van];

    /// Wire code of this kind.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Motorcycle => 1,
            Self::Car => 2,
            Self::Van => 3,
        }
    }

    /// Lowercase label used in logs and human output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Motorcycle => "motorcycle",
            Self::Car => "car",
            Self::Van => "van",
        }
    }

    /// Parse a wire code.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Motorcycle),
            2 => Some(Self::Car),
            3 => Some(Self::Van),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<u8> for Kind {
    type Error = LotError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_code(value).ok_or_else(|| LotError::InvalidKind {
            value: value.to_string(),
        })
    }
}

impl From<Kind> for u8 {
    fn from(kind: Kind) -> Self {
        kind.code()
    }
}

/// Accepts a numeric code (`"2"`) or a case-insensitive label (`"car"`, `"m"`).
impl FromStr for Kind {
    type Err = LotError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if let Ok(code) = trimmed.parse::<u8>() {
            return Self::try_from(code);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "m" | "moto" | "motorcycle" => Ok(Self::Motorcycle),
            "c" | "car" => Ok(Self::Car),
            "v" | "van" => Ok(Self::Van),
            _ => Err(LotError::InvalidKind {
                value: trimmed.to_string(),
            }),
        }
    }
}
