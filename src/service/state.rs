//! Persisted service state: lots, space kinds, and parked vehicles as one JSON document.
//!
//! Saves go through a temp file, `fsync`, then `rename`, so a crash leaves
//! either the old or the new document. A sibling `<state>.lock` file keeps two
//! `lota` processes from interleaving load → mutate → save.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::allocation::policy::{Attempt, cascade};
use crate::allocation::vehicles::Vehicle;
use crate::core::errors::{LotError, Result};
use crate::core::kind::Kind;
use crate::ledger::space::Occupant;
use crate::service::ParkingService;

pub const STATE_VERSION: u32 = 1;

/// How long `StateLock::acquire` waits by default.
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(2);

/// A lock file untouched for this long is left over from a crashed process.
const STALE_LOCK_AGE: Duration = Duration::from_secs(30);

const LOCK_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedLot {
    pub name: String,
    /// Space kinds in index order, as codes.
    pub spaces: Vec<Kind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub lots: Vec<PersistedLot>,
    pub vehicles: Vec<Vehicle>,
}

impl PersistedState {
    /// Copy everything `service` holds.
    #[must_use]
    pub fn capture(service: &ParkingService) -> Self {
        let lots = service
            .lot_names()
            .into_iter()
            .filter_map(|name| service.ledger().lot(&name).ok())
            .map(|lot| PersistedLot {
                name: lot.name().to_string(),
                spaces: lot.kinds().to_vec(),
            })
            .collect();
        Self {
            version: STATE_VERSION,
            saved_at: Utc::now(),
            lots,
            vehicles: service.parked_vehicles(),
        }
    }

    /// Replay lots, then vehicles, into an empty `service`.
    ///
    /// Any inconsistency fails with `CorruptState`; the service may then hold
    /// a partial replay and should be discarded.
    pub fn restore(self, service: &ParkingService) -> Result<()> {
        if self.version != STATE_VERSION {
            return Err(corrupt(format!(
                "unsupported state version {} (expected {STATE_VERSION})",
                self.version
            )));
        }
        if !service.lot_names().is_empty() || !service.vehicles().is_empty() {
            return Err(LotError::Runtime {
                details: "state can only be restored into an empty service".to_string(),
            });
        }

        for lot in &self.lots {
            service
                .ledger()
                .create_lot(&lot.name, &lot.spaces)
                .map_err(|e| corrupt(e.to_string()))?;
        }

        let mut ids = HashSet::new();
        for vehicle in self.vehicles {
            if !ids.insert(vehicle.id) {
                return Err(corrupt(format!("vehicle id {} appears twice", vehicle.id)));
            }
            let lot = service
                .ledger()
                .lot(&vehicle.lot)
                .map_err(|e| corrupt(e.to_string()))?;
            check_footprint(&vehicle, lot.kinds())?;
            lot.occupy(
                &vehicle.spaces,
                Occupant {
                    vehicle: vehicle.id,
                    kind: vehicle.kind,
                },
            )
            .map_err(|e| corrupt(e.to_string()))?;
            service
                .vehicles()
                .restore(vehicle)
                .map_err(|e| corrupt(e.to_string()))?;
        }
        Ok(())
    }
}

/// A footprint some cascade rung could have produced: one space of a kind
/// the vehicle may take, or three adjacent Car spaces for a van.
fn check_footprint(vehicle: &Vehicle, kinds: &[Kind]) -> Result<()> {
    let kind_at = |index: usize| kinds.get(index).copied();
    let ok = match vehicle.spaces.as_slice() {
        [index] => kind_at(*index).is_some_and(|space| {
            cascade(vehicle.kind).contains(&Attempt::Single(space))
        }),
        [a, b, c] => {
            cascade(vehicle.kind).contains(&Attempt::CarTriplet)
                && *b == a + 1
                && *c == b + 1
                && [*a, *b, *c]
                    .iter()
                    .all(|&i| kind_at(i) == Some(Kind::Car))
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(corrupt(format!(
            "{} {} cannot hold spaces {:?} in lot {:?}",
            vehicle.kind, vehicle.license_plate, vehicle.spaces, vehicle.lot
        )))
    }
}

fn corrupt(details: String) -> LotError {
    LotError::CorruptState { details }
}

// ──────────────────── load / save ────────────────────

/// Read the document at `path`. A missing file is `Ok(None)`.
pub fn load_state(path: &Path) -> Result<Option<PersistedState>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(LotError::io(path, source)),
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| corrupt(format!("{}: {e}", path.display())))
}

/// Write `state` to `path` atomically.
pub fn save_state(path: &Path, state: &PersistedState) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| LotError::io(parent, source))?;
    }
    let json = serde_json::to_string_pretty(state)?;
    let tmp_path = path.with_extension("json.tmp");

    let result = (|| {
        {
            let mut opts = OpenOptions::new();
            opts.write(true).create(true).truncate(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt as _;
                opts.mode(0o644);
            }
            let mut file = opts.open(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)
    })();

    if let Err(source) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(LotError::io(path, source));
    }
    Ok(())
}

// ──────────────────── lock file ────────────────────

/// Exclusive hold on a state file, released on drop.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
}

impl StateLock {
    /// Take `<state_path>.lock`, waiting up to `wait`.
    pub fn acquire(state_path: &Path, wait: Duration) -> Result<Self> {
        let path = lock_path(state_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| LotError::io(parent, source))?;
        }
        let deadline = Instant::now() + wait;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path) {
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(LotError::StateLocked {
                            path: state_path.to_path_buf(),
                        });
                    }
                    thread::sleep(LOCK_POLL);
                }
                Err(source) => return Err(LotError::io(&path, source)),
            }
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn lock_path(state_path: &Path) -> PathBuf {
    let mut name = state_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

fn is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_LOCK_AGE)
}
