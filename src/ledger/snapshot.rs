//! Point-in-time lot views and the pure queries the allocation policy runs on.

use serde::{Deserialize, Serialize};

use crate::core::kind::Kind;
use crate::ledger::space::{Space, VehicleId};

/// Consistent copy of every space in a lot, taken under one read of its occupancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotSnapshot {
    name: String,
    spaces: Vec<Space>,
}

/// Three contiguous free Car spaces, identified by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarTriplet {
    pub previous: usize,
    pub mid: usize,
    pub next: usize,
}

impl CarTriplet {
    #[must_use]
    pub const fn indices(&self) -> [usize; 3] {
        [self.previous, self.mid, self.next]
    }
}

/// Aggregate availability of a lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotStatus {
    pub name: String,
    /// No space of any kind is free.
    pub full: bool,
    pub motorcycle_spots_available: usize,
    pub car_spots_available: usize,
    pub van_spots_available: usize,
    /// Spaces of any kind currently held by a Van.
    pub spots_taken_by_vans: usize,
}

impl LotSnapshot {
    pub(crate) fn new(name: String, spaces: Vec<Space>) -> Self {
        debug_assert!(spaces.iter().enumerate().all(|(i, s)| s.index == i));
        Self { name, spaces }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn spaces(&self) -> &[Space] {
        &self.spaces
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    #[must_use]
    pub fn space(&self, index: usize) -> Option<&Space> {
        self.spaces.get(index)
    }

    #[must_use]
    pub fn previous(&self, index: usize) -> Option<&Space> {
        self.space(index)?.previous_index().and_then(|i| self.space(i))
    }

    #[must_use]
    pub fn next(&self, index: usize) -> Option<&Space> {
        self.space(index)?
            .next_index(self.spaces.len())
            .and_then(|i| self.space(i))
    }

    /// Free spaces of `kind` in ascending index order.
    ///
    /// The iterator is `Clone`, so a caller can restart the scan without
    /// taking another snapshot.
    pub fn free_spaces_of_kind(
        &self,
        kind: Kind,
    ) -> impl Iterator<Item = &Space> + Clone + '_ {
        self.spaces
            .iter()
            .filter(move |s| s.kind == kind && s.is_free())
    }

    /// Lowest-index free space of `kind`.
    #[must_use]
    pub fn first_free_of_kind(&self, kind: Kind) -> Option<&Space> {
        self.free_spaces_of_kind(kind).next()
    }

    /// Lowest-index run of three adjacent free Car spaces.
    #[must_use]
    pub fn free_car_triplet(&self) -> Option<CarTriplet> {
        self.spaces
            .windows(3)
            .find(|w| w.iter().all(|s| s.kind == Kind::Car && s.is_free()))
            .map(|w| CarTriplet {
                previous: w[0].index,
                mid: w[1].index,
                next: w[2].index,
            })
    }

    /// Indices held by `vehicle`, ascending.
    #[must_use]
    pub fn held_by(&self, vehicle: VehicleId) -> Vec<usize> {
        self.spaces
            .iter()
            .filter(|s| s.is_held_by(vehicle))
            .map(|s| s.index)
            .collect()
    }

    #[must_use]
    pub fn free_count(&self, kind: Kind) -> usize {
        self.free_spaces_of_kind(kind).count()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.spaces.iter().all(|s| !s.is_free())
    }

    #[must_use]
    pub fn status(&self) -> LotStatus {
        LotStatus {
            name: self.name.clone(),
            full: self.is_full(),
            motorcycle_spots_available: self.free_count(Kind::Motorcycle),
            car_spots_available: self.free_count(Kind::Car),
            van_spots_available: self.free_count(Kind::Van),
            spots_taken_by_vans: self
                .spaces
                .iter()
                .filter(|s| s.occupant.is_some_and(|o| o.kind == Kind::Van))
                .count(),
        }
    }
}
