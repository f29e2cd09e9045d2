//! A single lot: immutable space kinds, guarded occupancy, and the allocation gate.

use std::time::Duration;

use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::core::errors::{LotError, Result};
use crate::core::kind::Kind;
use crate::ledger::snapshot::LotSnapshot;
use crate::ledger::space::{Occupant, Space, VehicleId};

/// One named lot.
///
/// Space kinds are fixed at construction. Occupancy lives behind one `RwLock`
/// so every multi-space change is a single exclusive write; readers see either
/// none or all of it. The `gate` serializes the snapshot → decide → occupy
/// window of allocation and release.
#[derive(Debug)]
pub struct Lot {
    name: String,
    kinds: Box<[Kind]>,
    occupancy: RwLock<Vec<Option<Occupant>>>,
    gate: Mutex<()>,
}

/// Exclusive allocation access to one lot. Dropping it reopens the gate.
#[must_use = "the gate closes again when the guard is dropped"]
pub struct LotGate<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl Lot {
    pub(crate) fn new(name: String, kinds: &[Kind]) -> Self {
        Self {
            name,
            kinds: kinds.into(),
            occupancy: RwLock::new(vec![None; kinds.len()]),
            gate: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Space kinds in creation order.
    #[must_use]
    pub fn kinds(&self) -> &[Kind] {
        &self.kinds
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Wait up to `timeout` for exclusive allocation access.
    pub fn acquire(&self, timeout: Duration) -> Option<LotGate<'_>> {
        self.gate
            .try_lock_for(timeout)
            .map(|guard| LotGate { _guard: guard })
    }

    /// Consistent copy of all spaces. Does not touch the gate.
    #[must_use]
    pub fn snapshot(&self) -> LotSnapshot {
        let slots = self.occupancy.read();
        let spaces = self
            .kinds
            .iter()
            .zip(slots.iter())
            .enumerate()
            .map(|(index, (&kind, &occupant))| Space {
                index,
                kind,
                occupant,
            })
            .collect();
        LotSnapshot::new(self.name.clone(), spaces)
    }

    /// Mark every space in `indices` as held by `occupant`, all or nothing.
    ///
    /// Fails with `SpaceConflict` naming the first index that is out of range,
    /// repeated, or no longer free; nothing is written in that case.
    pub fn occupy(&self, indices: &[usize], occupant: Occupant) -> Result<()> {
        let mut slots = self.occupancy.write();
        for (pos, &index) in indices.iter().enumerate() {
            let free = matches!(slots.get(index), Some(None));
            if !free || indices[..pos].contains(&index) {
                return Err(LotError::SpaceConflict {
                    lot: self.name.clone(),
                    index,
                });
            }
        }
        for &index in indices {
            slots[index] = Some(occupant);
        }
        Ok(())
    }

    /// Clear every space held by `vehicle`, returning the freed indices.
    pub fn release(&self, vehicle: VehicleId) -> Vec<usize> {
        let mut slots = self.occupancy.write();
        let mut freed = Vec::new();
        for (index, slot) in slots.iter_mut().enumerate() {
            if matches!(slot, Some(o) if o.vehicle == vehicle) {
                *slot = None;
                freed.push(index);
            }
        }
        freed
    }
}
