//! Release engine: free every space a vehicle holds and report how long it stayed.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::allocation::duration::{Clock, minutes_parked};
use crate::allocation::vehicles::{Vehicle, VehicleRegistry};
use crate::core::config::EngineConfig;
use crate::core::errors::{LotError, Result};
use crate::ledger::SpaceLedger;

/// Outcome of one exit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseReport {
    pub vehicle: Vehicle,
    /// Space indices returned to the free pool.
    pub freed: Vec<usize>,
    pub minutes_parked: i64,
}

pub struct ReleaseEngine {
    ledger: Arc<SpaceLedger>,
    vehicles: Arc<VehicleRegistry>,
    clock: Arc<dyn Clock>,
    lock_timeout: Duration,
}

impl ReleaseEngine {
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
            lock_timeout: config.lock_timeout(),
        }
    }

    /// Remove the vehicle with `plate` and free its spaces in one write.
    ///
    /// If the lot gate cannot be taken in time the vehicle stays parked.
    pub fn release(&self, plate: &str) -> Result<ReleaseReport> {
        let pending = self.vehicles.begin_release(plate)?;
        let lot_name = pending.vehicle().lot.clone();
        let lot = self.ledger.lot(&lot_name)?;

        let Some(_gate) = lot.acquire(self.lock_timeout) else {
            return Err(LotError::AllocationConflict {
                lot: lot_name,
                attempts: 0,
            });
        };

        let freed = lot.release(pending.vehicle().id);
        let minutes = minutes_parked(pending.vehicle(), self.clock.now());
        let vehicle = pending.finish();
        Ok(ReleaseReport {
            vehicle,
            freed,
            minutes_parked: minutes,
        })
    }

    /// Minutes the parked vehicle with `plate` has been in its lot.
    pub fn minutes_parked(&self, plate: &str) -> Result<i64> {
        let vehicle = self.vehicles.get(plate)?;
        Ok(minutes_parked(&vehicle, self.clock.now()))
    }
}
