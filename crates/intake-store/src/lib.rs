//! # Intake Store
//!
//! SQLite-backed persistence for applications and users.
//! Single-file database, WAL mode, `Mutex<Connection>` — each call acquires
//! the connection for the duration of one statement and releases it on every
//! exit path.

pub mod db;
pub mod error;
pub mod models;

pub use db::IntakeDb;
pub use error::StoreError;
pub use models::{Application, ApplicationKind, ApplicationStatus, NewApplication, User};
