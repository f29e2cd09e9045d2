//! Vehicle registry: the plate → occupancy mapping.
//!
//! A plate moves through `Pending` (park in flight), `Parked`, and `Releasing`
//! (exit in flight). Only `Parked` entries are visible to lookups. Both
//! in-flight states still block a second park of the same plate.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{LotError, Result};
use crate::core::kind::Kind;
use crate::ledger::space::VehicleId;

/// A parked vehicle and the spaces it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub kind: Kind,
    pub license_plate: String,
    pub lot: String,
    /// Occupied space indices, ascending.
    pub spaces: Vec<usize>,
    pub parked_at: DateTime<Utc>,
}

#[derive(Debug)]
enum Entry {
    Pending,
    Parked(Vehicle),
    Releasing(Vehicle),
}

#[derive(Debug)]
pub struct VehicleRegistry {
    entries: Mutex<HashMap<String, Entry>>,
    next_id: AtomicU64,
}

impl Default for VehicleRegistry {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl VehicleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `plate` for a park in flight.
    ///
    /// The claim is dropped automatically unless the returned reservation is
    /// committed.
    pub fn reserve(&self, plate: &str) -> Result<Reservation<'_>> {
        let mut entries = self.entries.lock();
        if entries.contains_key(plate) {
            return Err(LotError::DuplicateVehicle {
                plate: plate.to_string(),
            });
        }
        entries.insert(plate.to_string(), Entry::Pending);
        Ok(Reservation {
            registry: self,
            plate: plate.to_string(),
            committed: false,
        })
    }

    /// Fresh session id.
    pub fn next_id(&self) -> VehicleId {
        VehicleId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// The parked vehicle with `plate`.
    pub fn get(&self, plate: &str) -> Result<Vehicle> {
        match self.entries.lock().get(plate) {
            Some(Entry::Parked(vehicle)) => Ok(vehicle.clone()),
            _ => Err(LotError::NoSuchVehicle {
                plate: plate.to_string(),
            }),
        }
    }

    /// Move a parked plate into `Releasing`.
    ///
    /// If the returned guard is dropped without `finish`, the vehicle goes back
    /// to `Parked`.
    pub fn begin_release(&self, plate: &str) -> Result<PendingRelease<'_>> {
        let mut entries = self.entries.lock();
        let vehicle = match entries.get(plate) {
            Some(Entry::Parked(vehicle)) => vehicle.clone(),
            _ => {
                return Err(LotError::NoSuchVehicle {
                    plate: plate.to_string(),
                });
            }
        };
        entries.insert(plate.to_string(), Entry::Releasing(vehicle.clone()));
        Ok(PendingRelease {
            registry: self,
            vehicle,
            finished: false,
        })
    }

    /// All parked vehicles ordered by id.
    #[must_use]
    pub fn parked(&self) -> Vec<Vehicle> {
        let mut out: Vec<Vehicle> = self
            .entries
            .lock()
            .values()
            .filter_map(|entry| match entry {
                Entry::Parked(vehicle) => Some(vehicle.clone()),
                _ => None,
            })
            .collect();
        out.sort_by_key(|v| v.id);
        out
    }

    /// Number of parked vehicles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|entry| matches!(entry, Entry::Parked(_)))
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert an already-placed vehicle, e.g. when loading saved state.
    pub(crate) fn restore(&self, vehicle: Vehicle) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&vehicle.license_plate) {
            return Err(LotError::DuplicateVehicle {
                plate: vehicle.license_plate,
            });
        }
        self.next_id
            .fetch_max(vehicle.id.0.saturating_add(1), Ordering::Relaxed);
        entries.insert(vehicle.license_plate.clone(), Entry::Parked(vehicle));
        Ok(())
    }
}

/// Outstanding claim on a plate for a park in flight.
#[must_use = "an uncommitted reservation is released on drop"]
pub struct Reservation<'a> {
    registry: &'a VehicleRegistry,
    plate: String,
    committed: bool,
}

impl Reservation<'_> {
    #[must_use]
    pub fn plate(&self) -> &str {
        &self.plate
    }

    /// Publish the parked vehicle under the reserved plate.
    pub fn commit(mut self, vehicle: Vehicle) {
        debug_assert_eq!(vehicle.license_plate, self.plate);
        self.registry
            .entries
            .lock()
            .insert(self.plate.clone(), Entry::Parked(vehicle));
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut entries = self.registry.entries.lock();
        if matches!(entries.get(&self.plate), Some(Entry::Pending)) {
            entries.remove(&self.plate);
        }
    }
}

/// Exit in flight for one vehicle.
#[must_use = "an unfinished release restores the vehicle on drop"]
pub struct PendingRelease<'a> {
    registry: &'a VehicleRegistry,
    vehicle: Vehicle,
    finished: bool,
}

impl PendingRelease<'_> {
    #[must_use]
    pub fn vehicle(&self) -> &Vehicle {
        &self.vehicle
    }

    /// Drop the record for good.
    pub fn finish(mut self) -> Vehicle {
        self.registry
            .entries
            .lock()
            .remove(&self.vehicle.license_plate);
        self.finished = true;
        self.vehicle.clone()
    }
}

impl Drop for PendingRelease<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut entries = self.registry.entries.lock();
        if let Some(entry) = entries.get_mut(&self.vehicle.license_plate)
            && matches!(entry, Entry::Releasing(_))
        {
            *entry = Entry::Parked(self.vehicle.clone());
        }
    }
}
