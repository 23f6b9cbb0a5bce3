//! Data model for applications and users.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// A user application (request, offer, or complaint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    /// Submission timestamp.
    pub date: DateTime<Utc>,
    pub kind: ApplicationKind,
    pub status: ApplicationStatus,
    pub message: String,
    /// Owning user.
    pub user_id: i64,
}

/// Fields for inserting a new application (id is assigned by the database).
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub date: DateTime<Utc>,
    pub kind: ApplicationKind,
    pub status: ApplicationStatus,
    pub message: String,
    pub user_id: i64,
}

/// What kind of application was filed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationKind {
    Request,
    Offer,
    Complaint,
}

/// Application lifecycle status.
///
/// `Submitted` entries are picked up by the status scheduler and moved to
/// `Completed` after the configured delay. `Cancelled` is the manual exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Submitted,
    Completed,
    Cancelled,
}

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// bcrypt hash — never serialized into API responses.
    #[serde(skip_serializing)]
    pub password_hash: String,
}

impl ApplicationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationKind::Request => "request",
            ApplicationKind::Offer => "offer",
            ApplicationKind::Complaint => "complaint",
        }
    }
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Completed => "completed",
            ApplicationStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for ApplicationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "request" => Ok(ApplicationKind::Request),
            "offer" => Ok(ApplicationKind::Offer),
            "complaint" => Ok(ApplicationKind::Complaint),
            other => Err(format!("unknown application kind: {other}")),
        }
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(ApplicationStatus::Submitted),
            "completed" => Ok(ApplicationStatus::Completed),
            "cancelled" => Ok(ApplicationStatus::Cancelled),
            other => Err(format!("unknown application status: {other}")),
        }
    }
}

impl std::fmt::Display for ApplicationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for ApplicationKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ApplicationKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

impl ToSql for ApplicationStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ApplicationStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}
