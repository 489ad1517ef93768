//! Status-specific processing of claimed jobs.

mod new;
mod pending;

pub use self::new::NewJobHandler;
pub use self::pending::PendingJobHandler;

use crate::application::StatusChange;
use crate::bank::BankClient;
use crate::errors::HandleError;
use crate::notifier::Notifier;
use crate::schema::Job;
use crate::storage::JobStore;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, warn};

/// Processes a claimed job of one particular status.
///
/// The handler runs inside the transaction that claimed the job. Returning an
/// error rolls that transaction back.
pub trait JobHandler<S: JobStore>: Send + Sync + 'static {
    /// Performs the bank call for `job` and records its outcome through `tx`.
    fn handle<'a>(&'a self, tx: &'a mut S::Tx, job: Job) -> BoxFuture<'a, Result<(), HandleError>>;
}

/// Collaborators shared by every handler variant.
struct Handler<S, B, N> {
    store: S,
    bank: Arc<B>,
    notifier: Arc<N>,
}

impl<S, B, N> Handler<S, B, N>
where
    S: JobStore,
    B: BankClient,
    N: Notifier,
{
    /// Persists the new state of `job`, then announces it.
    ///
    /// A failed announcement is logged and otherwise ignored: the new state is
    /// already part of the transaction and must not be rolled back because of it.
    async fn transition(&self, tx: &mut S::Tx, job: &Job) -> Result<(), HandleError> {
        self.store
            .update_job(tx, job)
            .await
            .map_err(HandleError::UpdateJob)?;
        debug!(job.status = %job.status, application.status = %job.application.status, "Job updated");

        let change = StatusChange::of(&job.application);
        if let Err(error) = self.notifier.application_status_changed(&change).await {
            warn!("can't send notification: {error:#}");
        }

        Ok(())
    }
}
