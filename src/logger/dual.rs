//! Dual-write coordinator: every activity event goes to JSONL and SQLite.
//!
//! A dedicated logger thread owns both sinks. Request threads send
//! `ActivityEvent`s over a bounded crossbeam channel with `try_send`, so a
//! slow disk never holds up a park or an exit.

#![allow(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::config::Config;
use crate::core::errors::{LotError, Result};
use crate::core::kind::Kind;
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
#[cfg(feature = "sqlite")]
use crate::logger::sqlite::{ActivityRow, SqliteLogger};

// ──────────────────── public event type ────────────────────

#[derive(Debug, Clone)]
pub enum ActivityEvent {
    SessionStarted {
        version: String,
        config_hash: String,
        command: String,
    },
    LotCreated {
        lot: String,
        spaces: usize,
    },
    VehicleParked {
        lot: String,
        license_plate: String,
        kind: Kind,
        spaces: Vec<usize>,
    },
    VehicleExited {
        lot: String,
        license_plate: String,
        kind: Kind,
        spaces: Vec<usize>,
        minutes_parked: i64,
    },
    /// A request refused for a domain reason (full lot, duplicate plate, ...).
    RequestRejected {
        operation: &'static str,
        lot: Option<String>,
        license_plate: Option<String>,
        code: String,
        message: String,
    },
    /// Storage or runtime failure.
    Error {
        code: String,
        message: String,
    },
    /// Stops the logger thread.
    Shutdown,
}

// ──────────────────── public handle ────────────────────

/// Cloneable sender side of the logger thread.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Queue `event`. Never blocks; a full channel drops the event and bumps
    /// the dropped counter.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and exit.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

impl std::fmt::Debug for ActivityLoggerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityLoggerHandle")
            .field("queued", &self.tx.len())
            .field("dropped_events", &self.dropped_events())
            .finish()
    }
}

// ──────────────────── configuration ────────────────────

pub struct DualLoggerConfig {
    /// `None` disables SQLite.
    pub sqlite_path: Option<PathBuf>,
    /// `None` disables JSONL.
    pub jsonl_config: Option<JsonlConfig>,
    pub channel_capacity: usize,
}

impl DualLoggerConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            sqlite_path: config
                .logging
                .sqlite_enabled
                .then(|| config.paths.sqlite_db.clone()),
            jsonl_config: config
                .logging
                .jsonl_enabled
                .then(|| JsonlConfig::from_config(config)),
            channel_capacity: config.logging.channel_capacity.max(1),
        }
    }
}

// ──────────────────── spawn ────────────────────

/// Spawn the logger thread.
///
/// It runs until `shutdown()` is called or every handle is dropped.
pub fn spawn_logger(
    config: DualLoggerConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(config.channel_capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    let dropped_clone = Arc::clone(&dropped);

    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: dropped,
    };

    let join = thread::Builder::new()
        .name("lota-logger".to_string())
        .spawn(move || {
            logger_thread_main(&rx, config.sqlite_path, config.jsonl_config, &dropped_clone);
        })
        .map_err(|e| LotError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

// ──────────────────── logger thread ────────────────────

fn logger_thread_main(
    rx: &Receiver<ActivityEvent>,
    sqlite_path: Option<PathBuf>,
    jsonl_config: Option<JsonlConfig>,
    dropped: &AtomicU64,
) {
    #[cfg(feature = "sqlite")]
    let mut sqlite = sqlite_path.and_then(|p| match SqliteLogger::open(&p) {
        Ok(db) => Some(db),
        Err(e) => {
            eprintln!("[LOT-DUAL] failed to open SQLite at {}: {e}", p.display());
            None
        }
    });
    #[cfg(not(feature = "sqlite"))]
    let _ = sqlite_path;

    let mut jsonl = jsonl_config.map(JsonlWriter::open);
    #[cfg(feature = "sqlite")]
    let mut sqlite_failures: u32 = 0;

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0
            && let Some(w) = jsonl.as_mut()
        {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{d} log events dropped due to back-pressure"));
            w.write_entry(&warn);
        }

        let Some(entry) = event_to_log_entry(&event) else {
            break;
        };
        if let Some(w) = jsonl.as_mut() {
            w.write_entry(&entry);
        }

        #[cfg(feature = "sqlite")]
        {
            let written = sqlite
                .as_ref()
                .map(|db| db.log_activity(&entry_to_activity_row(&entry)).is_ok());
            match written {
                Some(true) => sqlite_failures = 0,
                Some(false) => {
                    sqlite_failures += 1;
                    if sqlite_failures >= 3 {
                        eprintln!(
                            "[LOT-DUAL] SQLite write failed {sqlite_failures} times, disabling"
                        );
                        sqlite = None;
                    }
                }
                None => {}
            }
        }
    }

    if let Some(w) = jsonl.as_mut() {
        w.flush();
        w.fsync();
    }
}

// ──────────────────── event conversion ────────────────────

/// `None` for the `Shutdown` sentinel, which is never written.
fn event_to_log_entry(event: &ActivityEvent) -> Option<LogEntry> {
    let entry = match event {
        ActivityEvent::SessionStarted {
            version,
            config_hash,
            command,
        } => {
            let mut e = LogEntry::new(EventType::SessionStart, Severity::Info);
            e.details = Some(format!(
                "version={version} config_hash={config_hash} command={command}"
            ));
            e.ok = Some(true);
            e
        }
        ActivityEvent::LotCreated { lot, spaces } => {
            let mut e = LogEntry::new(EventType::LotCreate, Severity::Info);
            e.lot = Some(lot.clone());
            e.details = Some(format!("spaces={spaces}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::VehicleParked {
            lot,
            license_plate,
            kind,
            spaces,
        } => {
            let mut e = LogEntry::new(EventType::VehiclePark, Severity::Info);
            e.lot = Some(lot.clone());
            e.license_plate = Some(license_plate.clone());
            e.vehicle_kind = Some(kind.label().to_string());
            e.spaces = Some(spaces.clone());
            e.ok = Some(true);
            e
        }
        ActivityEvent::VehicleExited {
            lot,
            license_plate,
            kind,
            spaces,
            minutes_parked,
        } => {
            let mut e = LogEntry::new(EventType::VehicleExit, Severity::Info);
            e.lot = Some(lot.clone());
            e.license_plate = Some(license_plate.clone());
            e.vehicle_kind = Some(kind.label().to_string());
            e.spaces = Some(spaces.clone());
            e.minutes_parked = Some(*minutes_parked);
            e.ok = Some(true);
            e
        }
        ActivityEvent::RequestRejected {
            operation,
            lot,
            license_plate,
            code,
            message,
        } => {
            let mut e = LogEntry::new(EventType::RequestReject, Severity::Warning);
            e.lot.clone_from(lot);
            e.license_plate.clone_from(license_plate);
            e.details = Some(format!("operation={operation}"));
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Critical);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::Shutdown => return None,
    };
    Some(entry)
}

#[cfg(feature = "sqlite")]
fn entry_to_activity_row(entry: &LogEntry) -> ActivityRow {
    ActivityRow {
        timestamp: entry.ts.clone(),
        event_type: entry.event.as_str().to_string(),
        severity: entry.severity.as_str().to_string(),
        lot: entry.lot.clone(),
        license_plate: entry.license_plate.clone(),
        vehicle_kind: entry.vehicle_kind.clone(),
        spaces: entry
            .spaces
            .as_ref()
            .and_then(|s| serde_json::to_string(s).ok()),
        minutes_parked: entry.minutes_parked,
        success: i32::from(entry.ok.unwrap_or(true)),
        error_code: entry.error_code.clone(),
        error_message: entry.error_message.clone(),
        details: entry.details.clone(),
    }
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &std::path::Path, capacity: usize) -> DualLoggerConfig {
        DualLoggerConfig {
            sqlite_path: Some(dir.join("test.db")),
            jsonl_config: Some(JsonlConfig {
                path: dir.join("test.jsonl"),
                fallback_path: None,
                max_size_bytes: 10 * 1024 * 1024,
                max_rotated_files: 3,
                fsync_interval_secs: 60,
            }),
            channel_capacity: capacity,
        }
    }

    fn parked(plate: &str) -> ActivityEvent {
        ActivityEvent::VehicleParked {
            lot: "north".to_string(),
            license_plate: plate.to_string(),
            kind: Kind::Van,
            spaces: vec![3, 4, 5],
        }
    }

    #[test]
    fn spawn_and_shutdown_flushes_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, join) = spawn_logger(test_config(dir.path(), 64)).unwrap();
        handle.send(ActivityEvent::SessionStarted {
            version: "0.1.0".to_string(),
            config_hash: "abc".to_string(),
            command: "park".to_string(),
        });
        handle.shutdown();
        join.join().unwrap();

        let contents = std::fs::read_to_string(dir.path().join("test.jsonl")).unwrap();
        assert!(contents.contains("session_start"));
    }

    #[test]
    fn events_reach_both_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, join) = spawn_logger(test_config(dir.path(), 64)).unwrap();
        handle.send(ActivityEvent::LotCreated {
            lot: "north".to_string(),
            spaces: 9,
        });
        handle.send(parked("AB1"));
        handle.send(ActivityEvent::VehicleExited {
            lot: "north".to_string(),
            license_plate: "AB1".to_string(),
            kind: Kind::Van,
            spaces: vec![3, 4, 5],
            minutes_parked: 42,
        });
        handle.send(ActivityEvent::RequestRejected {
            operation: "park",
            lot: Some("north".to_string()),
            license_plate: Some("ZZ9".to_string()),
            code: "LOT-2004".to_string(),
            message: "full".to_string(),
        });
        handle.shutdown();
        join.join().unwrap();

        let contents = std::fs::read_to_string(dir.path().join("test.jsonl")).unwrap();
        assert_eq!(contents.lines().count(), 4);

        #[cfg(feature = "sqlite")]
        {
            let db = SqliteLogger::open(&dir.path().join("test.db")).unwrap();
            let rows = db.activity_for_plate("AB1", 10).unwrap();
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].event_type, "vehicle_exit");
            assert_eq!(rows[0].minutes_parked, Some(42));
            assert_eq!(rows[0].spaces.as_deref(), Some("[3,4,5]"));
            let rejected = db.activity_for_plate("ZZ9", 10).unwrap();
            assert_eq!(rejected[0].success, 0);
            assert_eq!(rejected[0].error_code.as_deref(), Some("LOT-2004"));
        }
    }

    #[test]
    fn both_sinks_disabled_is_harmless() {
        let (handle, join) = spawn_logger(DualLoggerConfig {
            sqlite_path: None,
            jsonl_config: None,
            channel_capacity: 4,
        })
        .unwrap();
        handle.send(parked("AB1"));
        handle.shutdown();
        join.join().unwrap();
    }

    #[test]
    fn from_config_honours_toggles() {
        let mut config = Config::default();
        config.logging.sqlite_enabled = false;
        let dual = DualLoggerConfig::from_config(&config);
        assert!(dual.sqlite_path.is_none());
        assert!(dual.jsonl_config.is_some());
        assert_eq!(dual.channel_capacity, config.logging.channel_capacity);
    }

    #[test]
    fn shutdown_sentinel_has_no_log_entry() {
        assert!(event_to_log_entry(&ActivityEvent::Shutdown).is_none());
        let entry = event_to_log_entry(&parked("AB1")).unwrap();
        assert_eq!(entry.event, EventType::VehiclePark);
        assert_eq!(entry.spaces, Some(vec![3, 4, 5]));
    }

    #[test]
    fn shutdown_writes_no_extra_line() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, join) = spawn_logger(test_config(dir.path(), 16)).unwrap();
        handle.send(parked("AB1"));
        handle.shutdown();
        join.join().unwrap();

        let contents = std::fs::read_to_string(dir.path().join("test.jsonl")).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(!contents.contains("session_start"));
    }

    #[test]
    fn dropped_events_counter_starts_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, join) = spawn_logger(test_config(dir.path(), 2)).unwrap();
        assert_eq!(handle.dropped_events(), 0);
        handle.shutdown();
        join.join().unwrap();
    }
}
