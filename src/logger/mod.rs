//! Activity logging: SQLite (WAL) + JSONL append-only, fed by one logger thread.

pub mod dual;
pub mod jsonl;
#[cfg(feature = "sqlite")]
pub mod sqlite;
