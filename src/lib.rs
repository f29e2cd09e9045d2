#![forbid(unsafe_code)]

//! Parking lot space allocation and release engine.
//!
//! A lot is an ordered chain of typed spaces (motorcycle, car, van). Vehicles
//! are placed by a fixed fallback cascade; a van with no van spot may take
//! three adjacent free car spots, committed as one indivisible write.
//!
//! Layers, bottom up:
//! 1. [`ledger`]: lots, spaces, occupancy, snapshots
//! 2. [`allocation`]: cascade policy, vehicle registry, park and release engines
//! 3. [`service`]: request validation, activity logging, persisted state
//!
//! ```rust,no_run
//! use lot_allocator::prelude::*;
//!
//! let service = ParkingService::new(&Config::default());
//! service.create_lot("north", &[1, 2, 2, 2, 3]).unwrap();
//! let parked = service
//!     .park(&ParkRequest {
//!         kind: 3,
//!         lot_name: "north".to_string(),
//!         license_plate: "VAN-1".to_string(),
//!     })
//!     .unwrap();
//! assert_eq!(parked.occupied_space_indices, vec![4]);
//! ```

pub mod prelude;

pub mod allocation;
pub mod core;
pub mod ledger;
pub mod logger;
pub mod service;
