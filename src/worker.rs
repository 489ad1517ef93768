use crate::handlers::JobHandler;
use crate::schema::JobStatus;
use crate::storage::{JobStore, Transaction};
use crate::ticker::Ticker;
use crate::util::{try_to_extract_panic_info, with_sentry_transaction};
use anyhow::Context;
use futures_util::FutureExt;
use sentry_core::{Hub, SentryFutureExt};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use tokio::sync::watch;
use tracing::{Instrument, debug, error, info_span, trace, warn};
use uuid::Uuid;

/// Why a worker loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Shutdown was requested.
    Cancelled,
    /// The ticker stopped producing pulses.
    TickerStopped,
}

/// Result of a single poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No job was eligible.
    Idle,
    /// The job was handled and the transaction committed.
    Handled(Uuid),
    /// The job was claimed but no handler exists for its status; it was left as is.
    Skipped(Uuid),
}

enum Event {
    Shutdown,
    Tick(bool),
}

/// Polls the job table on every tick and processes at most one job per tick.
pub struct Worker<S: JobStore, T> {
    id: usize,
    dispatcher: Dispatcher<S>,
    ticker: T,
    shutdown: watch::Receiver<bool>,
}

/// The part of a worker that claims jobs and routes them to handlers.
struct Dispatcher<S: JobStore> {
    store: S,
    handlers: HashMap<JobStatus, Box<dyn JobHandler<S>>>,
}

impl<S: JobStore, T: Ticker> Worker<S, T> {
    /// Creates a worker without any handlers.
    ///
    /// The worker stops once `shutdown` turns `true` or its sender is dropped.
    pub fn new(id: usize, store: S, ticker: T, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            id,
            dispatcher: Dispatcher {
                store,
                handlers: HashMap::new(),
            },
            ticker,
            shutdown,
        }
    }

    /// Routes jobs in `status` to `handler`.
    pub fn handler(mut self, status: JobStatus, handler: impl JobHandler<S>) -> Self {
        self.dispatcher.handlers.insert(status, Box::new(handler));
        self
    }

    /// The worker's number within its pool.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Run one poll cycle on every tick until shutdown is requested or the
    /// ticker stops.
    ///
    /// A cycle that is already running always finishes before shutdown is
    /// observed.
    pub async fn run(mut self) -> WorkerExit {
        loop {
            let event = tokio::select! {
                biased;
                () = shutdown_requested(&mut self.shutdown) => Event::Shutdown,
                tick = self.ticker.tick() => Event::Tick(tick.is_some()),
            };

            match event {
                Event::Shutdown => {
                    debug!("Shutdown requested. Stopping the worker…");
                    self.ticker.stop();
                    return WorkerExit::Cancelled;
                }
                Event::Tick(false) => {
                    debug!("Ticker stopped. Stopping the worker…");
                    return WorkerExit::TickerStopped;
                }
                Event::Tick(true) => match self.dispatcher.run_next_job().await {
                    Ok(TickOutcome::Idle) => trace!("No pending jobs found"),
                    Ok(_) => {}
                    Err(error) => error!("Failed to run job: {error:#}"),
                },
            }
        }
    }

    /// Claim the next job, if there is one, and hand it to its handler.
    ///
    /// The claim and every write of the handler share one transaction: it is
    /// committed when the handler succeeds and rolled back otherwise.
    pub async fn run_next_job(&self) -> anyhow::Result<TickOutcome> {
        self.dispatcher.run_next_job().await
    }
}

impl<S: JobStore> Dispatcher<S> {
    async fn run_next_job(&self) -> anyhow::Result<TickOutcome> {
        trace!("Looking for next job…");

        let mut tx = self.store.begin().await.context("can't begin transaction")?;

        let job = match self.store.claim_next(&mut tx).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tx.commit().await.context("can't commit empty transaction")?;
                return Ok(TickOutcome::Idle);
            }
            Err(error) => {
                tx.rollback().await.context("can't rollback transaction")?;
                return Err(anyhow::Error::new(error).context("can't get job"));
            }
        };

        let job_id = job.id;
        let status = job.status;
        let span = info_span!("job", job.id = %job_id, job.status = %status);

        let Some(handler) = self.handlers.get(&status) else {
            span.in_scope(|| error!("no handler for status {status:?}"));
            tx.rollback().await.context("can't rollback transaction")?;
            return Ok(TickOutcome::Skipped(job_id));
        };

        let future = AssertUnwindSafe(handler.handle(&mut tx, job))
            .catch_unwind()
            .map(|result| match result {
                Ok(result) => result.map_err(anyhow::Error::from),
                Err(panic) => Err(try_to_extract_panic_info(&*panic)),
            });

        let result = with_sentry_transaction(transaction_name(status), future)
            .instrument(span.clone())
            .bind_hub(Hub::current())
            .await;

        async move {
            match result {
                Ok(()) => {
                    debug!("Committing job…");
                    tx.commit().await.context("can't commit transaction")?;
                    Ok(TickOutcome::Handled(job_id))
                }
                Err(error) => {
                    warn!("Rolling back failed job…");
                    tx.rollback()
                        .await
                        .with_context(|| format!("can't rollback transaction after: {error:#}"))?;
                    Err(error)
                }
            }
        }
        .instrument(span)
        .await
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender also ends the wait.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

fn transaction_name(status: JobStatus) -> &'static str {
    match status {
        JobStatus::New => "registry.job.new",
        JobStatus::Pending => "registry.job.pending",
        JobStatus::Done => "registry.job.done",
    }
}
