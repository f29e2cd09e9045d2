//! Space and occupant records.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::kind::Kind;

/// Process-unique identity of one parking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub u64);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// What a space records about the vehicle holding it.
///
/// The vehicle kind is carried so lot status can count van-held spaces from a
/// snapshot alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    pub vehicle: VehicleId,
    pub kind: Kind,
}

/// One parking slot as seen in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    /// Zero-based position in creation order.
    pub index: usize,
    pub kind: Kind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupant: Option<Occupant>,
}

impl Space {
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.occupant.is_none()
    }

    /// Index of the space created just before this one.
    #[must_use]
    pub const fn previous_index(&self) -> Option<usize> {
        self.index.checked_sub(1)
    }

    /// Index of the space created just after this one, given the lot size.
    #[must_use]
    pub const fn next_index(&self, lot_len: usize) -> Option<usize> {
        if self.index + 1 < lot_len {
            Some(self.index + 1)
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_held_by(&self, vehicle: VehicleId) -> bool {
        self.occupant.is_some_and(|o| o.vehicle == vehicle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space(index: usize) -> Space {
        Space {
            index,
            kind: Kind::Car,
            occupant: None,
        }
    }

    #[test]
    fn adjacency_is_index_arithmetic() {
        assert_eq!(space(0).previous_index(), None);
        assert_eq!(space(0).next_index(3), Some(1));
        assert_eq!(space(1).previous_index(), Some(0));
        assert_eq!(space(2).next_index(3), None);
        assert_eq!(space(0).next_index(1), None);
    }

    #[test]
    fn held_by_matches_vehicle_id_only() {
        let mut s = space(4);
        assert!(s.is_free());
        s.occupant = Some(Occupant {
            vehicle: VehicleId(7),
            kind: Kind::Van,
        });
        assert!(!s.is_free());
        assert!(s.is_held_by(VehicleId(7)));
        assert!(!s.is_held_by(VehicleId(8)));
    }
}
