//! Parking service: request validation and activity logging around the engines.
//!
//! This is the seam the CLI (or any other transport) talks to. The engines
//! underneath return typed results only; every accepted or rejected request is
//! reported to the activity logger from here.

#![allow(missing_docs)]

pub mod state;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::allocation::duration::{Clock, SystemClock};
use crate::allocation::engine::AllocationEngine;
use crate::allocation::release::{ReleaseEngine, ReleaseReport};
use crate::allocation::vehicles::{Vehicle, VehicleRegistry};
use crate::core::config::{Config, LimitsConfig};
use crate::core::errors::{ErrorCategory, LotError, Result};
use crate::core::kind::Kind;
use crate::ledger::SpaceLedger;
use crate::ledger::snapshot::{LotSnapshot, LotStatus};
use crate::ledger::space::VehicleId;
use crate::logger::dual::{ActivityEvent, ActivityLoggerHandle};

/// Park request as received from a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkRequest {
    /// Kind code: 1 motorcycle, 2 car, 3 van.
    pub kind: u8,
    pub lot_name: String,
    pub license_plate: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkOutcome {
    pub vehicle_id: VehicleId,
    pub license_plate: String,
    pub occupied_space_indices: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleStatus {
    pub license_plate: String,
    pub minutes_parked: i64,
}

pub struct ParkingService {
    ledger: Arc<SpaceLedger>,
    vehicles: Arc<VehicleRegistry>,
    allocation: AllocationEngine,
    release: ReleaseEngine,
    limits: LimitsConfig,
    logger: Option<ActivityLoggerHandle>,
}

impl ParkingService {
    /// Empty service on the system clock.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Self {
        let ledger = Arc::new(SpaceLedger::new());
        let vehicles = Arc::new(VehicleRegistry::new());
        let allocation = AllocationEngine::new(
            Arc::clone(&ledger),
            Arc::clone(&vehicles),
            Arc::clone(&clock),
            &config.engine,
        );
        let release = ReleaseEngine::new(
            Arc::clone(&ledger),
            Arc::clone(&vehicles),
            clock,
            &config.engine,
        );
        Self {
            ledger,
            vehicles,
            allocation,
            release,
            limits: config.limits.clone(),
            logger: None,
        }
    }

    /// Report every request to `logger` from now on.
    #[must_use]
    pub fn with_logger(mut self, logger: ActivityLoggerHandle) -> Self {
        self.logger = Some(logger);
        self
    }

    #[must_use]
    pub fn ledger(&self) -> &SpaceLedger {
        &self.ledger
    }

    #[must_use]
    pub fn vehicles(&self) -> &VehicleRegistry {
        &self.vehicles
    }

    // ──────────────────── lots ────────────────────

    /// Create a lot from kind codes (1, 2, 3) in space order.
    pub fn create_lot(&self, name: &str, kind_codes: &[u8]) -> Result<LotStatus> {
        let outcome = kind_codes
            .iter()
            .map(|&code| Kind::try_from(code))
            .collect::<Result<Vec<Kind>>>()
            .and_then(|kinds| self.create_lot_inner(name, &kinds));
        self.observe("create_lot", Some(name), None, outcome)
    }

    /// Create a lot whose spaces take `kinds` in order.
    pub fn create_lot_with_kinds(&self, name: &str, kinds: &[Kind]) -> Result<LotStatus> {
        let outcome = self.create_lot_inner(name, kinds);
        self.observe("create_lot", Some(name), None, outcome)
    }

    fn create_lot_inner(&self, name: &str, kinds: &[Kind]) -> Result<LotStatus> {
        let name = validate_text("lot name", name, self.limits.max_lot_name_len)?;
        let lot = self.ledger.create_lot(&name, kinds)?;
        self.emit(ActivityEvent::LotCreated {
            lot: name,
            spaces: lot.len(),
        });
        Ok(lot.snapshot().status())
    }

    pub fn lot_status(&self, name: &str) -> Result<LotStatus> {
        self.ledger.status(name.trim())
    }

    pub fn lot_snapshot(&self, name: &str) -> Result<LotSnapshot> {
        self.ledger.snapshot(name.trim())
    }

    #[must_use]
    pub fn lot_names(&self) -> Vec<String> {
        self.ledger.lot_names()
    }

    // ──────────────────── vehicles ────────────────────

    pub fn park(&self, request: &ParkRequest) -> Result<ParkOutcome> {
        let outcome = self.park_inner(request);
        self.observe(
            "park",
            Some(&request.lot_name),
            Some(&request.license_plate),
            outcome,
        )
    }

    fn park_inner(&self, request: &ParkRequest) -> Result<ParkOutcome> {
        let kind = Kind::try_from(request.kind)?;
        let lot = validate_text("lot name", &request.lot_name, self.limits.max_lot_name_len)?;
        let plate = validate_text(
            "license plate",
            &request.license_plate,
            self.limits.max_license_plate_len,
        )?;

        let vehicle = self.allocation.park(&lot, kind, &plate)?;
        self.emit(ActivityEvent::VehicleParked {
            lot: vehicle.lot.clone(),
            license_plate: vehicle.license_plate.clone(),
            kind: vehicle.kind,
            spaces: vehicle.spaces.clone(),
        });
        Ok(ParkOutcome {
            vehicle_id: vehicle.id,
            license_plate: vehicle.license_plate,
            occupied_space_indices: vehicle.spaces,
        })
    }

    pub fn vehicle_status(&self, plate: &str) -> Result<VehicleStatus> {
        let plate = plate.trim();
        let minutes_parked = self.release.minutes_parked(plate)?;
        Ok(VehicleStatus {
            license_plate: plate.to_string(),
            minutes_parked,
        })
    }

    pub fn vehicle(&self, plate: &str) -> Result<Vehicle> {
        self.vehicles.get(plate.trim())
    }

    /// Remove a vehicle and free its spaces.
    pub fn exit(&self, plate: &str) -> Result<ReleaseReport> {
        let outcome = self.release.release(plate.trim()).inspect(|report| {
            self.emit(ActivityEvent::VehicleExited {
                lot: report.vehicle.lot.clone(),
                license_plate: report.vehicle.license_plate.clone(),
                kind: report.vehicle.kind,
                spaces: report.freed.clone(),
                minutes_parked: report.minutes_parked,
            });
        });
        self.observe("exit", None, Some(plate), outcome)
    }

    /// Every parked vehicle ordered by id.
    #[must_use]
    pub fn parked_vehicles(&self) -> Vec<Vehicle> {
        self.vehicles.parked()
    }

    // ──────────────────── logging ────────────────────

    fn emit(&self, event: ActivityEvent) {
        if let Some(logger) = &self.logger {
            logger.send(event);
        }
    }

    fn observe<T>(
        &self,
        operation: &'static str,
        lot: Option<&str>,
        plate: Option<&str>,
        outcome: Result<T>,
    ) -> Result<T> {
        if let Err(err) = &outcome {
            let event = if err.category() == ErrorCategory::Internal {
                ActivityEvent::Error {
                    code: err.code().to_string(),
                    message: err.to_string(),
                }
            } else {
                ActivityEvent::RequestRejected {
                    operation,
                    lot: lot.map(str::to_string),
                    license_plate: plate.map(str::to_string),
                    code: err.code().to_string(),
                    message: err.to_string(),
                }
            };
            self.emit(event);
        }
        outcome
    }
}

/// Trim `value` and check it is non-blank and at most `max_len` characters.
fn validate_text(field: &'static str, value: &str, max_len: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LotError::InvalidInput {
            field,
            details: "must not be blank".to_string(),
        });
    }
    let len = trimmed.chars().count();
    if len > max_len {
        return Err(LotError::InvalidInput {
            field,
            details: format!("{len} characters exceeds the limit of {max_len}"),
        });
    }
    Ok(trimmed.to_string())
}
