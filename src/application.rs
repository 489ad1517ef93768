use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Status of an application as reported by the bank.
///
/// The bank owns this vocabulary, so any string it returns is accepted. The
/// associated constructors cover the values the bank is known to use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationStatus(String);

impl ApplicationStatus {
    /// Wraps a raw status string.
    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    /// The application has been accepted for registration.
    pub fn created() -> Self {
        Self::new("new")
    }

    /// The bank is still processing the application.
    pub fn pending() -> Self {
        Self::new("pending")
    }

    /// The bank approved the application.
    pub fn completed() -> Self {
        Self::new("completed")
    }

    /// The bank rejected the application.
    pub fn rejected() -> Self {
        Self::new("rejected")
    }

    /// The raw status string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether no status has been assigned yet.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ApplicationStatus {
    fn from(status: &str) -> Self {
        Self::new(status)
    }
}

/// A loan application, as embedded in a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    /// Identifier shared with the API service and the bank.
    pub id: Uuid,
    /// Applicant's first name.
    pub first_name: String,
    /// Applicant's last name.
    pub last_name: String,
    /// Last status received from the bank.
    #[serde(default, skip_serializing_if = "ApplicationStatus::is_empty")]
    pub status: ApplicationStatus,
}

/// Event emitted whenever the bank moves an application to a new status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Application identifier.
    pub id: Uuid,
    /// The status the application moved to.
    pub status: ApplicationStatus,
}

impl StatusChange {
    /// Builds the event describing the current status of `application`.
    pub fn of(application: &Application) -> Self {
        Self {
            id: application.id,
            status: application.status.clone(),
        }
    }
}
