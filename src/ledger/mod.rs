//! Space Ledger: every lot, its ordered spaces, and their occupancy.
//!
//! Adjacency is not stored. A space's neighbours are the spaces at `index - 1`
//! and `index + 1` of the same lot, which is creation order by construction.

pub mod lot;
pub mod snapshot;
pub mod space;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::errors::{LotError, Result};
use crate::core::kind::Kind;
use crate::ledger::lot::Lot;
use crate::ledger::snapshot::{CarTriplet, LotSnapshot, LotStatus};
use crate::ledger::space::{Occupant, Space, VehicleId};

/// Registry of lots keyed by their unique name.
#[derive(Debug, Default)]
pub struct SpaceLedger {
    lots: RwLock<HashMap<String, Arc<Lot>>>,
}

impl SpaceLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a lot whose spaces take `kinds` in order, indexed `0..kinds.len()`.
    pub fn create_lot(&self, name: &str, kinds: &[Kind]) -> Result<Arc<Lot>> {
        let mut lots = self.lots.write();
        if lots.contains_key(name) {
            return Err(LotError::DuplicateLotName {
                name: name.to_string(),
            });
        }
        let lot = Arc::new(Lot::new(name.to_string(), kinds));
        lots.insert(name.to_string(), Arc::clone(&lot));
        Ok(lot)
    }

    pub fn lot(&self, name: &str) -> Result<Arc<Lot>> {
        self.lots
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| LotError::NoSuchLot {
                name: name.to_string(),
            })
    }

    /// Lot names, sorted.
    #[must_use]
    pub fn lot_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lots.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn snapshot(&self, name: &str) -> Result<LotSnapshot> {
        Ok(self.lot(name)?.snapshot())
    }

    pub fn free_spaces_of_kind(&self, name: &str, kind: Kind) -> Result<Vec<Space>> {
        let snap = self.snapshot(name)?;
        Ok(snap.free_spaces_of_kind(kind).copied().collect())
    }

    pub fn free_car_triplet(&self, name: &str) -> Result<Option<CarTriplet>> {
        Ok(self.snapshot(name)?.free_car_triplet())
    }

    pub fn occupy(&self, name: &str, indices: &[usize], occupant: Occupant) -> Result<()> {
        self.lot(name)?.occupy(indices, occupant)
    }

    pub fn release(&self, name: &str, vehicle: VehicleId) -> Result<Vec<usize>> {
        Ok(self.lot(name)?.release(vehicle))
    }

    pub fn status(&self, name: &str) -> Result<LotStatus> {
        Ok(self.snapshot(name)?.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Kind::{Car as C, Motorcycle as M, Van as V};

    #[test]
    fn create_lot_builds_indexed_chain_in_kind_order() {
        let ledger = SpaceLedger::new();
        let kinds = [M, M, M, C, C, C, V, V, V];
        ledger.create_lot("test lot", &kinds).unwrap();

        let snap = ledger.snapshot("test lot").unwrap();
        assert_eq!(snap.len(), 9);
        for (i, space) in snap.spaces().iter().enumerate() {
            assert_eq!(space.index, i);
            assert_eq!(space.kind, kinds[i]);
            assert_eq!(snap.previous(i).map(|s| s.index), i.checked_sub(1));
            let expected_next = if i + 1 < 9 { Some(i + 1) } else { None };
            assert_eq!(snap.next(i).map(|s| s.index), expected_next);
        }
    }

    #[test]
    fn duplicate_lot_name_rejected() {
        let ledger = SpaceLedger::new();
        ledger.create_lot("a", &[C]).unwrap();
        let err = ledger.create_lot("a", &[V, V]).unwrap_err();
        assert!(matches!(err, LotError::DuplicateLotName { .. }));
        assert_eq!(ledger.snapshot("a").unwrap().len(), 1);
    }

    #[test]
    fn unknown_lot_is_not_found() {
        let ledger = SpaceLedger::new();
        assert!(matches!(
            ledger.status("ghost"),
            Err(LotError::NoSuchLot { .. })
        ));
    }

    #[test]
    fn lot_names_are_sorted() {
        let ledger = SpaceLedger::new();
        ledger.create_lot("west", &[C]).unwrap();
        ledger.create_lot("east", &[C]).unwrap();
        assert_eq!(ledger.lot_names(), vec!["east", "west"]);
    }

    #[test]
    fn ledger_level_queries_delegate_to_lot() {
        let ledger = SpaceLedger::new();
        ledger.create_lot("l", &[C, C, C, V]).unwrap();
        let triplet = ledger.free_car_triplet("l").unwrap().unwrap();
        ledger
            .occupy(
                "l",
                &triplet.indices(),
                Occupant {
                    vehicle: VehicleId(1),
                    kind: V,
                },
            )
            .unwrap();
        assert!(ledger.free_spaces_of_kind("l", C).unwrap().is_empty());
        assert_eq!(ledger.status("l").unwrap().spots_taken_by_vans, 3);
        assert_eq!(ledger.release("l", VehicleId(1)).unwrap(), vec![0, 1, 2]);
        assert_eq!(ledger.free_spaces_of_kind("l", C).unwrap().len(), 3);
    }
}
