//! Intake SQLite database.
//!
//! Holds the `applications` and `users` tables behind a single connection.
//! Timestamps are stored as RFC3339 text. Statements are short; the
//! connection mutex is never held across await points (the store API is
//! fully synchronous).

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::models::{Application, NewApplication, User};

/// Intake database — persistent storage for applications and users.
pub struct IntakeDb {
    conn: Mutex<Connection>,
}

impl IntakeDb {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        // WAL improves concurrent read behavior; best-effort on odd filesystems
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .ok();
        let db = Self { conn: Mutex::new(conn) };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (tests).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;").ok();
        let db = Self { conn: Mutex::new(conn) };
        db.migrate()?;
        Ok(db)
    }

    /// Run schema migrations.
    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                kind TEXT NOT NULL,
                status TEXT NOT NULL,
                message TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_applications_status
                ON applications(status);
            ",
        )?;
        tracing::debug!("Schema migrations applied");
        Ok(())
    }

    // ─── Users ──────────────────────────────────────

    /// Create a user; returns the new row id.
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<i64, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;
        conn.execute(
            "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
            params![username, password_hash],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Look up a user by username.
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;
        let mut stmt =
            conn.prepare("SELECT id, username, password_hash FROM users WHERE username = ?1")?;
        let user = stmt
            .query_row(params![username], |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password_hash: row.get(2)?,
                })
            })
            .map(Some)
            .or_else(not_found_to_none)?;
        Ok(user)
    }

    /// Look up a user by id.
    pub fn get_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;
        let mut stmt =
            conn.prepare("SELECT id, username, password_hash FROM users WHERE id = ?1")?;
        let user = stmt
            .query_row(params![id], |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password_hash: row.get(2)?,
                })
            })
            .map(Some)
            .or_else(not_found_to_none)?;
        Ok(user)
    }

    /// Number of registered users.
    pub fn count_users(&self) -> Result<i64, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;
        let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    // ─── Applications ──────────────────────────────────────

    /// Insert a new application and return the stored record.
    pub fn create_application(&self, new: &NewApplication) -> Result<Application, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;
        conn.execute(
            "INSERT INTO applications (date, kind, status, message, user_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                new.date.to_rfc3339(),
                new.kind,
                new.status,
                new.message,
                new.user_id
            ],
        )?;
        Ok(Application {
            id: conn.last_insert_rowid(),
            date: new.date,
            kind: new.kind,
            status: new.status,
            message: new.message.clone(),
            user_id: new.user_id,
        })
    }

    /// Fetch an application by id.
    pub fn get_application(&self, id: i64) -> Result<Option<Application>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;
        let mut stmt = conn.prepare(
            "SELECT id, date, kind, status, message, user_id FROM applications WHERE id = ?1",
        )?;
        let app = stmt
            .query_row(params![id], row_to_application)
            .map(Some)
            .or_else(not_found_to_none)?;
        Ok(app)
    }

    /// List all applications, oldest first.
    pub fn list_applications(&self) -> Result<Vec<Application>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;
        let mut stmt = conn.prepare(
            "SELECT id, date, kind, status, message, user_id FROM applications ORDER BY id",
        )?;
        let apps = stmt
            .query_map([], row_to_application)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(apps)
    }

    /// Persist an updated application. Returns false when the row no longer
    /// exists (deleted concurrently).
    pub fn update_application(&self, app: &Application) -> Result<bool, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;
        let changed = conn.execute(
            "UPDATE applications
             SET date = ?1, kind = ?2, status = ?3, message = ?4, user_id = ?5
             WHERE id = ?6",
            params![
                app.date.to_rfc3339(),
                app.kind,
                app.status,
                app.message,
                app.user_id,
                app.id
            ],
        )?;
        Ok(changed > 0)
    }

    /// Delete an application. Returns false when there was nothing to delete.
    pub fn delete_application(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;
        let changed = conn.execute("DELETE FROM applications WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}

/// Map one row to an `Application`.
fn row_to_application(row: &rusqlite::Row<'_>) -> rusqlite::Result<Application> {
    let date_str: String = row.get(1)?;
    let date = parse_timestamp(1, &date_str)?;
    Ok(Application {
        id: row.get(0)?,
        date,
        kind: row.get(2)?,
        status: row.get(3)?,
        message: row.get(4)?,
        user_id: row.get(5)?,
    })
}

/// Parse a stored RFC3339 timestamp.
fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

/// Convert `QueryReturnedNoRows` to `Ok(None)`, pass other errors through.
fn not_found_to_none<T>(e: rusqlite::Error) -> Result<Option<T>, StoreError> {
    match e {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(StoreError::Sqlite(other)),
    }
}
