use super::{Handler, JobHandler};
use crate::bank::BankClient;
use crate::errors::HandleError;
use crate::notifier::Notifier;
use crate::schema::{Job, JobStatus};
use crate::storage::JobStore;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::sync::Arc;

/// Registers a new application with the bank and moves its job to `pending`.
pub struct NewJobHandler<S, B, N> {
    inner: Handler<S, B, N>,
}

impl<S, B, N> NewJobHandler<S, B, N> {
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

impl<S, B, N> JobHandler<S> for NewJobHandler<S, B, N>
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
                .create_application(&job.application)
                .await
                .map_err(HandleError::CreateApplication)?;

            job.advance(JobStatus::Pending, status);
            self.inner.transition(tx, &job).await
        }
        .boxed()
    }
}
