//! Allocation policy: a static cascade table evaluated against one lot snapshot.
//!
//! | vehicle    | attempts, in order                          |
//! |------------|---------------------------------------------|
//! | motorcycle | motorcycle spot, car spot, van spot         |
//! | car        | car spot, van spot                          |
//! | van        | van spot, three contiguous free car spots   |
//!
//! Every single-spot attempt takes the lowest-index free space of its kind.

use crate::core::errors::{LotError, Result};
use crate::core::kind::Kind;
use crate::ledger::snapshot::LotSnapshot;

/// One rung of a cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// Lowest-index free space of this kind.
    Single(Kind),
    /// Lowest-index run of three adjacent free Car spaces.
    CarTriplet,
}

const MOTORCYCLE_CASCADE: &[Attempt] = &[
    Attempt::Single(Kind::Motorcycle),
    Attempt::Single(Kind::Car),
    Attempt::Single(Kind::Van),
];

const CAR_CASCADE: &[Attempt] = &[Attempt::Single(Kind::Car), Attempt::Single(Kind::Van)];

const VAN_CASCADE: &[Attempt] = &[Attempt::Single(Kind::Van), Attempt::CarTriplet];

/// Attempts for `kind`, in order.
#[must_use]
pub const fn cascade(kind: Kind) -> &'static [Attempt] {
    match kind {
        Kind::Motorcycle => MOTORCYCLE_CASCADE,
        Kind::Car => CAR_CASCADE,
        Kind::Van => VAN_CASCADE,
    }
}

/// Spaces chosen for one vehicle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub attempt: Attempt,
    /// Ascending space indices; one, or three for a car triplet.
    pub indices: Vec<usize>,
}

impl Attempt {
    /// Try this rung against `snapshot`.
    #[must_use]
    pub fn place(self, snapshot: &LotSnapshot) -> Option<Placement> {
        let indices = match self {
            Self::Single(kind) => vec![snapshot.first_free_of_kind(kind)?.index],
            Self::CarTriplet => snapshot.free_car_triplet()?.indices().to_vec(),
        };
        Some(Placement {
            attempt: self,
            indices,
        })
    }
}

/// Walk the cascade for `kind`; the first rung that fits wins.
pub fn plan(kind: Kind, snapshot: &LotSnapshot) -> Result<Placement> {
    cascade(kind)
        .iter()
        .find_map(|attempt| attempt.place(snapshot))
        .ok_or_else(|| LotError::NoSpotAvailable {
            lot: snapshot.name().to_string(),
            kind,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::space::{Occupant, Space, VehicleId};
    use Kind::{Car as C, Motorcycle as M, Van as V};

    fn snapshot(kinds: &[Kind], taken: &[usize]) -> LotSnapshot {
        let spaces = kinds
            .iter()
            .enumerate()
            .map(|(index, &kind)| Space {
                index,
                kind,
                occupant: taken.contains(&index).then_some(Occupant {
                    vehicle: VehicleId(99),
                    kind,
                }),
            })
            .collect();
        LotSnapshot::new("p".to_string(), spaces)
    }

    const FULL_LOT: [Kind; 9] = [M, M, M, C, C, C, V, V, V];

    #[test]
    fn each_kind_prefers_its_own_spot_first() {
        let snap = snapshot(&FULL_LOT, &[]);
        assert_eq!(plan(M, &snap).unwrap().indices, vec![0]);
        assert_eq!(plan(C, &snap).unwrap().indices, vec![3]);
        assert_eq!(plan(V, &snap).unwrap().indices, vec![6]);
    }

    #[test]
    fn motorcycle_falls_back_to_car_then_van() {
        let snap = snapshot(&FULL_LOT, &[0, 1, 2]);
        let p = plan(M, &snap).unwrap();
        assert_eq!(p.attempt, Attempt::Single(C));
        assert_eq!(p.indices, vec![3]);

        let snap = snapshot(&FULL_LOT, &[0, 1, 2, 3, 4, 5]);
        let p = plan(M, &snap).unwrap();
        assert_eq!(p.attempt, Attempt::Single(V));
        assert_eq!(p.indices, vec![6]);
    }

    #[test]
    fn car_never_takes_a_motorcycle_spot() {
        let snap = snapshot(&FULL_LOT, &[3, 4, 5, 6, 7, 8]);
        assert!(matches!(
            plan(C, &snap),
            Err(LotError::NoSpotAvailable { kind: Kind::Car, .. })
        ));
    }

    #[test]
    fn van_overflows_into_car_triplet() {
        let snap = snapshot(&[M, M, M, C, C, C], &[]);
        let p = plan(V, &snap).unwrap();
        assert_eq!(p.attempt, Attempt::CarTriplet);
        assert_eq!(p.indices, vec![3, 4, 5]);
    }

    #[test]
    fn van_without_triplet_or_van_spot_fails() {
        let snap = snapshot(&[C, C, M, C, C], &[]);
        assert!(matches!(
            plan(V, &snap),
            Err(LotError::NoSpotAvailable { kind: Kind::Van, .. })
        ));
    }

    #[test]
    fn cascade_table_shape() {
        assert_eq!(cascade(M).len(), 3);
        assert_eq!(cascade(C), &[Attempt::Single(C), Attempt::Single(V)]);
        assert_eq!(cascade(V).last(), Some(&Attempt::CarTriplet));
        // Only vans ever get more than one space.
        for kind in [M, C] {
            assert!(!cascade(kind).contains(&Attempt::CarTriplet));
        }
    }

    #[test]
    fn empty_lot_has_no_spot() {
        let snap = snapshot(&[], &[]);
        for kind in Kind::ALL {
            assert!(plan(kind, &snap).is_err());
        }
    }
}
