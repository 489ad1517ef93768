//! Database schema definitions for SQLx.
//!
//! This module contains the row types of the `jobs` table.

use crate::application::{Application, ApplicationStatus};
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Processing stage of a job.
///
/// Jobs only ever move forward: `new → pending → done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// The application has not been registered with the bank yet.
    New,
    /// The application is registered and awaits a decision.
    Pending,
    /// The bank produced a decision. Done jobs are never claimed again.
    Done,
}

impl JobStatus {
    /// The value stored in the `status` column.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Pending => "pending",
            Self::Done => "done",
        }
    }

    /// Whether workers may still claim a job in this status.
    pub const fn is_claimable(self) -> bool {
        !matches!(self, Self::Done)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when the `status` column holds an unknown value.
#[derive(Debug, thiserror::Error)]
#[error("unknown job status {0:?}")]
pub struct UnknownJobStatus(String);

impl FromStr for JobStatus {
    type Err = UnknownJobStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "pending" => Ok(Self::Pending),
            "done" => Ok(Self::Done),
            other => Err(UnknownJobStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for JobStatus {
    type Error = UnknownJobStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Represents a job record in the database
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Job {
    /// Unique identifier for the job
    pub id: Uuid,
    /// Snapshot of the application, stored as JSONB
    #[sqlx(json)]
    pub application: Application,
    /// Current processing stage
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    /// Timestamp when the job was created; defines claim order
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last status change
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Builds a fresh job in [`JobStatus::New`] for `application`.
    pub fn new(application: Application) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            application,
            status: JobStatus::New,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the job to `status` and records the bank's `application_status`.
    ///
    /// Both values always change together.
    pub fn advance(&mut self, status: JobStatus, application_status: ApplicationStatus) {
        self.status = status;
        self.application.status = application_status;
    }
}
