//! Persistent SQLite store for users, notes, food entries and daily totals.

mod catalogue;
mod entries;
mod types;

pub use types::{Entry, EntryKind, Granularity, LlmModel, NewEntry, NoteStats, PeriodTotals, User};

use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

/// Maximum number of live entries of one kind per user.
pub const ENTRY_CAPACITY: usize = 50;

/// Timestamp format used for every `*_at` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date format used for `daily_totals.date`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("entry limit of {limit} reached")]
    CapacityExceeded { limit: usize },
    #[error("entry #{id} not found for this user")]
    NotFound { id: i64 },
    #[error("failed to encode dialogue state: {0}")]
    State(#[from] serde_json::Error),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Single-connection SQLite database.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Create a new in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    warn!("Failed to create database directory {:?}: {e}", parent);
                }
            }
        }
        let db = Self::from_connection(Connection::open(path)?)?;
        let (users, entries) = db.get_counts()?;
        info!("Loaded database from {:?} ({} users, {} entries)", path, users, entries);
        Ok(db)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self { conn: Mutex::new(conn) };
        db.init_schema()?;
        db.seed_models()?;
        Ok(db)
    }

    /// Lock the connection; a poisoned lock still holds a usable connection.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn();

        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                username TEXT,
                display_name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                dialogue_state TEXT NOT NULL DEFAULT '"Idle"'
            );

            CREATE TABLE IF NOT EXISTS entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('note', 'food')),
                body TEXT NOT NULL,
                calories INTEGER,
                protein_g REAL,
                fat_g REAL,
                carbs_g REAL,
                advice TEXT,
                provenance TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT
            );

            CREATE TABLE IF NOT EXISTS daily_totals (
                owner_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                total_calories INTEGER NOT NULL DEFAULT 0,
                total_protein REAL NOT NULL DEFAULT 0,
                total_fat REAL NOT NULL DEFAULT 0,
                total_carbs REAL NOT NULL DEFAULT 0,
                PRIMARY KEY (owner_id, date)
            );

            CREATE TABLE IF NOT EXISTS entry_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                entry_id INTEGER NOT NULL,
                action TEXT NOT NULL,
                at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS llm_models (
                id INTEGER PRIMARY KEY,
                key TEXT NOT NULL UNIQUE,
                label TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_entries_owner ON entries(owner_id, kind, created_at);
            CREATE INDEX IF NOT EXISTS idx_events_owner ON entry_events(owner_id, at);
        "#)?;

        Ok(())
    }

    fn get_counts(&self) -> Result<(usize, usize)> {
        let conn = self.conn();
        let users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        let entries: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok((users as usize, entries as usize))
    }

    // ==================== USER METHODS ====================

    /// Record a user on first contact. Existing rows are left untouched.
    pub fn upsert_user(&self, user: &User, at: &str) -> Result<()> {
        let conn = self.conn();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO users (user_id, username, display_name, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user.id, user.username, user.display_name, at],
        )?;
        if inserted > 0 {
            info!("👤 New user: {} ({})", user.display_name, user.id);
        }
        Ok(())
    }

    /// Look up a user by id.
    pub fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let conn = self.conn();
        let user = conn
            .query_row(
                "SELECT user_id, username, display_name FROM users WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        display_name: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    /// Read the pending conversation state of a user.
    ///
    /// Unknown users and unreadable values both yield the default state.
    pub fn load_state<S: DeserializeOwned + Default>(&self, user_id: i64) -> Result<S> {
        let conn = self.conn();
        let raw: Option<String> = conn
            .query_row(
                "SELECT dialogue_state FROM users WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(match raw {
            Some(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                warn!("Discarding unreadable dialogue state for {user_id}: {e}");
                S::default()
            }),
            None => S::default(),
        })
    }

    /// Overwrite the pending conversation state of a user.
    pub fn save_state<S: Serialize>(&self, user_id: i64, state: &S) -> Result<()> {
        let json = serde_json::to_string(state)?;
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE users SET dialogue_state = ?1 WHERE user_id = ?2",
            params![json, user_id],
        )?;
        if updated == 0 {
            warn!("Dialogue state not saved: user {user_id} is unknown");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    enum Step {
        #[default]
        Idle,
        Waiting { id: i64 },
    }

    fn alice() -> User {
        User { id: 100, username: Some("alice".into()), display_name: "Alice".into() }
    }

    #[test]
    fn test_upsert_user_ignores_second_insert() {
        let db = Database::in_memory().unwrap();
        db.upsert_user(&alice(), "2026-01-01 10:00:00").unwrap();
        let renamed = User { display_name: "Mallory".into(), ..alice() };
        db.upsert_user(&renamed, "2026-01-02 10:00:00").unwrap();

        let user = db.get_user(100).unwrap().unwrap();
        assert_eq!(user.display_name, "Alice");
        assert_eq!(db.get_counts().unwrap().0, 1);
    }

    #[test]
    fn test_first_contact_time_is_kept() {
        let db = Database::in_memory().unwrap();
        db.upsert_user(&alice(), "2026-01-01 10:00:00").unwrap();
        db.upsert_user(&alice(), "2026-03-05 18:30:00").unwrap();

        let created_at: String = db
            .conn()
            .query_row("SELECT created_at FROM users WHERE user_id = 100", [], |row| row.get(0))
            .unwrap();
        assert_eq!(created_at, "2026-01-01 10:00:00");
    }

    #[test]
    fn test_state_round_trip() {
        let db = Database::in_memory().unwrap();
        db.upsert_user(&alice(), "2026-01-01 10:00:00").unwrap();

        assert_eq!(db.load_state::<Step>(100).unwrap(), Step::Idle);
        db.save_state(100, &Step::Waiting { id: 7 }).unwrap();
        assert_eq!(db.load_state::<Step>(100).unwrap(), Step::Waiting { id: 7 });
    }

    #[test]
    fn test_state_of_unknown_user_is_default() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.load_state::<Step>(42).unwrap(), Step::Idle);
        // Saving for an unknown user is a logged no-op.
        db.save_state(42, &Step::Waiting { id: 1 }).unwrap();
        assert_eq!(db.load_state::<Step>(42).unwrap(), Step::Idle);
    }

    #[test]
    fn test_open_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("diary.db");
        {
            let db = Database::open(&path).unwrap();
            db.upsert_user(&alice(), "2026-01-01 10:00:00").unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert!(db.get_user(100).unwrap().is_some());
    }
}
