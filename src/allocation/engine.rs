//! Allocation engine: place one vehicle into one lot.
//!
//! Per request the engine claims the plate, takes the lot's gate (bounded
//! wait), snapshots the lot, plans a placement from the cascade table, and
//! commits it with a single all-or-nothing write. A commit that loses to a
//! concurrent writer is retried from a fresh snapshot up to the configured
//! attempt budget.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use crate::allocation::duration::Clock;
use crate::allocation::policy::{self, Placement};
use crate::allocation::vehicles::{Vehicle, VehicleRegistry};
use crate::core::config::EngineConfig;
use crate::core::errors::{LotError, Result};
use crate::core::kind::Kind;
use crate::ledger::SpaceLedger;
use crate::ledger::snapshot::LotSnapshot;
use crate::ledger::space::Occupant;

pub struct AllocationEngine {
    ledger: Arc<SpaceLedger>,
    vehicles: Arc<VehicleRegistry>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
    lock_timeout: Duration,
}

impl AllocationEngine {
    pub fn new(
        ledger: Arc<SpaceLedger>,
        vehicles: Arc<VehicleRegistry>,
        clock: Arc<dyn Clock>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            ledger,
            vehicles,
            clock,
            max_attempts: config.max_allocation_attempts.max(1),
            lock_timeout: config.lock_timeout(),
        }
    }

    /// Park a `kind` vehicle with `plate` in `lot_name`.
    ///
    /// On any error no space changes and no vehicle record exists.
    pub fn park(&self, lot_name: &str, kind: Kind, plate: &str) -> Result<Vehicle> {
        let reservation = self.vehicles.reserve(plate)?;
        let lot = self.ledger.lot(lot_name)?;

        let Some(_gate) = lot.acquire(self.lock_timeout) else {
            return Err(LotError::AllocationConflict {
                lot: lot_name.to_string(),
                attempts: 0,
            });
        };

        let id = self.vehicles.next_id();
        let occupant = Occupant { vehicle: id, kind };
        let placement = commit_with_retry(
            self.max_attempts,
            kind,
            || lot.snapshot(),
            |placement| lot.occupy(&placement.indices, occupant),
        )?;

        let vehicle = Vehicle {
            id,
            kind,
            license_plate: reservation.plate().to_string(),
            lot: lot.name().to_string(),
            spaces: placement.indices,
            parked_at: self.clock.now(),
        };
        reservation.commit(vehicle.clone());
        Ok(vehicle)
    }
}

/// Plan and commit until one commit lands or the attempt budget runs out.
///
/// `NoSpotAvailable` is final and never retried. A `SpaceConflict` from
/// `occupy` means the snapshot went stale; anything else propagates as is.
fn commit_with_retry<S, O>(
    max_attempts: u32,
    kind: Kind,
    mut snapshot: S,
    mut occupy: O,
) -> Result<Placement>
where
    S: FnMut() -> LotSnapshot,
    O: FnMut(&Placement) -> Result<()>,
{
    let mut lot_name = String::new();
    for _ in 0..max_attempts {
        let snap = snapshot();
        let placement = policy::plan(kind, &snap)?;
        match occupy(&placement) {
            Ok(()) => return Ok(placement),
            Err(LotError::SpaceConflict { .. }) => {
                lot_name = snap.name().to_string();
            }
            Err(other) => return Err(other),
        }
    }
    Err(LotError::AllocationConflict {
        lot: lot_name,
        attempts: max_attempts,
    })
}
