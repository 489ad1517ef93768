use super::{Handler, JobHandler};
use crate::bank::BankClient;
use crate::errors::HandleError;
use crate::notifier::Notifier;
use crate::schema::{Job, JobStatus};
use crate::storage::JobStore;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use tracing::debug;

/// Polls the bank for a decision on a registered application.
///
/// Once the bank reports a status different from the stored one, the job
/// moves to `done`. An unchanged status leaves the job untouched so that it is
/// polled again on a later tick.
pub struct PendingJobHandler<S, B, N> {
    inner: Handler<S, B, N>,
}

impl<S, B, N> PendingJobHandler<S, B, N> {
    /// Creates the handler.
    pub fn new(store: S, bank: Arc<B>, notifier: Arc<N>) -> Self {
        Self {
            inner: Handler {
                store,
                bank,
                notifier,
            },
        }
    }
}

impl<S, B, N> JobHandler<S> for PendingJobHandler<S, B, N>
where
    S: JobStore,
    B: BankClient,
    N: Notifier,
{
    fn handle<'a>(
        &'a self,
        tx: &'a mut S::Tx,
        mut job: Job,
    ) -> BoxFuture<'a, Result<(), HandleError>> {
        async move {
            let status = self
                .inner
                .bank
                .get_application_status(job.application.id)
                .await
                .map_err(HandleError::GetApplicationStatus)?;

            if status == job.application.status {
                debug!("not ready yet");
                return Ok(());
            }

            job.advance(JobStatus::Done, status);
            self.inner.transition(tx, &job).await
        }
        .boxed()
    }
}
