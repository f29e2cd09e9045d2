//! LOT-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::kind::Kind;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, LotError>;

/// Top-level error type for the lot allocator.
#[derive(Debug, Error)]
pub enum LotError {
    #[error("[LOT-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[LOT-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[LOT-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[LOT-2001] a lot named {name:?} already exists")]
    DuplicateLotName { name: String },

    #[error("[LOT-2002] no lot named {name:?}")]
    NoSuchLot { name: String },

    #[error("[LOT-2003] vehicle {plate:?} is already parked")]
    DuplicateVehicle { plate: String },

    #[error("[LOT-2004] no spot available for a {kind} in lot {lot:?}")]
    NoSpotAvailable { lot: String, kind: Kind },

    #[error("[LOT-2005] allocation conflict in lot {lot:?} after {attempts} attempt(s)")]
    AllocationConflict { lot: String, attempts: u32 },

    #[error("[LOT-2006] no parked vehicle with plate {plate:?}")]
    NoSuchVehicle { plate: String },

    #[error("[LOT-2007] invalid kind code {value} (expected 1=motorcycle, 2=car, 3=van)")]
    InvalidKind { value: String },

    #[error("[LOT-2008] space {index} in lot {lot:?} is not free")]
    SpaceConflict { lot: String, index: usize },

    #[error("[LOT-2009] invalid {field}: {details}")]
    InvalidInput {
        field: &'static str,
        details: String,
    },

    #[error("[LOT-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[LOT-2102] SQL failure in {context}: {details}")]
    Sql {
        context: &'static str,
        details: String,
    },

    #[error("[LOT-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[LOT-3004] state file {path} is locked by another process")]
    StateLocked { path: PathBuf },

    #[error("[LOT-3005] corrupt state document: {details}")]
    CorruptState { details: String },

    #[error("[LOT-3900] runtime failure: {details}")]
    Runtime { details: String },
}

/// Coarse outcome class used by transport layers to pick a user-visible code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The named lot or vehicle does not exist.
    NotFound,
    /// Capacity or contention; the request may succeed later.
    Rejected,
    /// The request collides with an existing record.
    Conflict,
    /// Malformed request.
    Invalid,
    /// Configuration, storage or runtime failure.
    Internal,
}

impl LotError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "LOT-1001",
            Self::MissingConfig { .. } => "LOT-1002",
            Self::ConfigParse { .. } => "LOT-1003",
            Self::DuplicateLotName { .. } => "LOT-2001",
            Self::NoSuchLot { .. } => "LOT-2002",
            Self::DuplicateVehicle { .. } => "LOT-2003",
            Self::NoSpotAvailable { .. } => "LOT-2004",
            Self::AllocationConflict { .. } => "LOT-2005",
            Self::NoSuchVehicle { .. } => "LOT-2006",
            Self::InvalidKind { .. } => "LOT-2007",
            Self::SpaceConflict { .. } => "LOT-2008",
            Self::InvalidInput { .. } => "LOT-2009",
            Self::Serialization { .. } => "LOT-2101",
            Self::Sql { .. } => "LOT-2102",
            Self::Io { .. } => "LOT-3002",
            Self::StateLocked { .. } => "LOT-3004",
            Self::CorruptState { .. } => "LOT-3005",
            Self::Runtime { .. } => "LOT-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    ///
    /// `NoSpotAvailable` is a legitimate capacity outcome and is not retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AllocationConflict { .. }
                | Self::SpaceConflict { .. }
                | Self::StateLocked { .. }
                | Self::Io { .. }
                | Self::Sql { .. }
                | Self::Runtime { .. }
        )
    }

    /// Transport mapping class.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::NoSuchLot { .. } | Self::NoSuchVehicle { .. } => ErrorCategory::NotFound,
            Self::NoSpotAvailable { .. }
            | Self::AllocationConflict { .. }
            | Self::SpaceConflict { .. } => ErrorCategory::Rejected,
            Self::DuplicateLotName { .. } | Self::DuplicateVehicle { .. } => {
                ErrorCategory::Conflict
            }
            Self::InvalidKind { .. } | Self::InvalidInput { .. } => ErrorCategory::Invalid,
            Self::InvalidConfig { .. }
            | Self::MissingConfig { .. }
            | Self::ConfigParse { .. }
            | Self::Serialization { .. }
            | Self::Sql { .. }
            | Self::Io { .. }
            | Self::StateLocked { .. }
            | Self::CorruptState { .. }
            | Self::Runtime { .. } => ErrorCategory::Internal,
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for LotError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql {
            context: "rusqlite",
            details: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for LotError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for LotError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
