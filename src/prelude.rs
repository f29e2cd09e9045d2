//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use lot_allocator::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{ErrorCategory, LotError, Result};
pub use crate::core::kind::Kind;

// Ledger
pub use crate::ledger::SpaceLedger;
pub use crate::ledger::snapshot::{LotSnapshot, LotStatus};
pub use crate::ledger::space::{Space, VehicleId};

// Allocation
pub use crate::allocation::duration::{Clock, SystemClock};
pub use crate::allocation::engine::AllocationEngine;
pub use crate::allocation::release::{ReleaseEngine, ReleaseReport};
pub use crate::allocation::vehicles::{Vehicle, VehicleRegistry};

// Service
pub use crate::service::{ParkOutcome, ParkRequest, ParkingService, VehicleStatus};
