//! Allocation and release: cascade policy, vehicle registry, and the two engines.

pub mod duration;
pub mod engine;
pub mod policy;
pub mod release;
pub mod vehicles;
