//! Core types: errors, configuration, the shared kind enumeration.

pub mod config;
pub mod errors;
pub mod kind;
