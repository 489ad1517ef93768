/// Error returned by a [`BankClient`](crate::BankClient).
#[derive(Debug, thiserror::Error)]
pub enum BankError {
    /// The bank refused the request (a 4xx response).
    #[error("bank rejected the request ({code}): {message}")]
    Rejected {
        /// HTTP status code
        code: u16,
        /// Message from the bank's error body
        message: String,
    },

    /// The bank answered with a status that is neither success nor a rejection.
    #[error("bank request failed with status {code}")]
    Unknown {
        /// HTTP status code
        code: u16,
    },

    /// The request never got an answer.
    #[error("failed to reach the bank: {0}")]
    Transport(#[source] reqwest::Error),

    /// The bank answered with a body we could not read.
    #[error("failed to decode bank response: {0}")]
    Decode(#[source] reqwest::Error),
}

impl BankError {
    /// Whether the bank refused the request rather than failing to process it.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Error returned by a [`JobHandler`](crate::JobHandler).
///
/// Any of these makes the worker roll back, leaving the job to be retried on a
/// later tick.
#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    /// Registering the application with the bank failed.
    #[error("can't create application in bank: {0}")]
    CreateApplication(#[source] BankError),

    /// Polling the bank for the application status failed.
    #[error("can't get application status: {0}")]
    GetApplicationStatus(#[source] BankError),

    /// Persisting the new job state failed.
    #[error("can't update job: {0}")]
    UpdateJob(#[source] sqlx::Error),
}
