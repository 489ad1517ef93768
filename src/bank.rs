//! Access to the bank's application registry.

use crate::application::{Application, ApplicationStatus};
use crate::errors::BankError;
use reqwest::Response;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, instrument};
use uuid::Uuid;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// The bank system that decides on applications.
pub trait BankClient: Send + Sync + 'static {
    /// Registers `application` with the bank and returns its initial status.
    fn create_application(
        &self,
        application: &Application,
    ) -> impl Future<Output = Result<ApplicationStatus, BankError>> + Send;

    /// Returns the current status of the application with the given id.
    fn get_application_status(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<ApplicationStatus, BankError>> + Send;
}

/// [`BankClient`] talking to the bank's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpBankClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct CreateApplicationBody<'a> {
    id: Uuid,
    first_name: &'a str,
    last_name: &'a str,
}

#[derive(Deserialize)]
struct StatusBody {
    status: String,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error: String,
}

impl HttpBankClient {
    /// Creates a client for the bank at `base_url` with the default 3 second timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self, BankError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Creates a client whose requests give up after `timeout`.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BankError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("registry-poller/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(BankError::Transport)?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl BankClient for HttpBankClient {
    #[instrument(name = "bank.create_application", skip_all, fields(application.id = %application.id))]
    async fn create_application(
        &self,
        application: &Application,
    ) -> Result<ApplicationStatus, BankError> {
        let body = CreateApplicationBody {
            id: application.id,
            first_name: &application.first_name,
            last_name: &application.last_name,
        };

        let response = self
            .client
            .post(self.url("/api/applications"))
            .json(&body)
            .send()
            .await
            .map_err(BankError::Transport)?;

        read_status(response).await
    }

    #[instrument(name = "bank.get_application_status", skip(self))]
    async fn get_application_status(&self, id: Uuid) -> Result<ApplicationStatus, BankError> {
        let response = self
            .client
            .get(self.url("/api/jobs"))
            .query(&[("application_id", id.to_string())])
            .send()
            .await
            .map_err(BankError::Transport)?;

        read_status(response).await
    }
}

async fn read_status(response: Response) -> Result<ApplicationStatus, BankError> {
    let code = response.status();
    debug!(%code, "Bank responded");

    if code.is_success() {
        let body: StatusBody = response.json().await.map_err(BankError::Decode)?;
        return Ok(ApplicationStatus::new(body.status));
    }

    if code.is_client_error() {
        // A rejection without a readable body still counts as a rejection.
        let body = response.json::<ErrorBody>().await.unwrap_or_default();
        return Err(BankError::Rejected {
            code: code.as_u16(),
            message: body.error,
        });
    }

    Err(BankError::Unknown {
        code: code.as_u16(),
    })
}
