use crate::bank::BankClient;
use crate::handlers::{NewJobHandler, PendingJobHandler};
use crate::notifier::Notifier;
use crate::schema::JobStatus;
use crate::storage::JobStore;
use crate::ticker::{IntervalTickerFactory, TickerFactory};
use crate::worker::{Worker, WorkerExit};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{Instrument, debug, info, info_span, warn};

const DEFAULT_NUM_WORKERS: usize = 2;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Supervises a fixed-size set of workers sharing one job store.
pub struct Poller<S, B, N, F = IntervalTickerFactory> {
    store: S,
    bank: Arc<B>,
    notifier: Arc<N>,
    tickers: F,
    num_workers: usize,
}

impl<S, B, N, F: std::fmt::Debug> std::fmt::Debug for Poller<S, B, N, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("tickers", &self.tickers)
            .field("num_workers", &self.num_workers)
            .finish_non_exhaustive()
    }
}

impl<S, B, N> Poller<S, B, N>
where
    S: JobStore,
    B: BankClient,
    N: Notifier,
{
    /// Create a new poller with two workers polling every ten seconds.
    pub fn new(store: S, bank: Arc<B>, notifier: Arc<N>) -> Self {
        Self {
            store,
            bank,
            notifier,
            tickers: IntervalTickerFactory::new(DEFAULT_POLL_INTERVAL),
            num_workers: DEFAULT_NUM_WORKERS,
        }
    }
}

impl<S, B, N, F> Poller<S, B, N, F>
where
    S: JobStore,
    B: BankClient,
    N: Notifier,
    F: TickerFactory,
{
    /// Set the number of workers.
    pub fn num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// Set how often each worker polls for jobs.
    ///
    /// A zero interval is raised to [`MIN_PERIOD`](crate::ticker::MIN_PERIOD).
    pub fn poll_interval(self, poll_interval: Duration) -> Poller<S, B, N, IntervalTickerFactory> {
        self.tickers(IntervalTickerFactory::new(poll_interval))
    }

    /// Use `tickers` to drive the workers instead of a fixed interval.
    pub fn tickers<G: TickerFactory>(self, tickers: G) -> Poller<S, B, N, G> {
        Poller {
            store: self.store,
            bank: self.bank,
            notifier: self.notifier,
            tickers,
            num_workers: self.num_workers,
        }
    }

    /// Start the workers.
    ///
    /// This returns a [`RunHandle`] which is used to stop the workers and wait
    /// for them to finish.
    pub fn start(&self) -> RunHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);

        let handles = (1..=self.num_workers)
            .map(|id| {
                let worker = self.new_worker(id, shutdown_rx.clone());
                info!(worker.id = worker.id(), "Starting worker…");

                let span = info_span!("worker", worker.id = worker.id());
                tokio::spawn(worker.run().instrument(span))
            })
            .collect();

        RunHandle {
            shutdown: Arc::new(shutdown),
            handles,
            forwarder: None,
        }
    }

    /// Start the workers and stop them once `parent` turns `true` or its
    /// sender is dropped.
    ///
    /// The returned [`RunHandle`] can still close the workers earlier, and
    /// dropping it cancels them as with [`Poller::start`].
    pub fn start_with_shutdown(&self, mut parent: watch::Receiver<bool>) -> RunHandle {
        let handle = self.start();
        let shutdown = Arc::downgrade(&handle.shutdown);

        let forwarder = tokio::spawn(async move {
            let _ = parent.wait_for(|stop| *stop).await;
            if let Some(shutdown) = shutdown.upgrade() {
                debug!("Parent shutdown requested…");
                shutdown.send_replace(true);
            }
        });

        RunHandle {
            forwarder: Some(forwarder.abort_handle()),
            ..handle
        }
    }

    fn new_worker(&self, id: usize, shutdown: watch::Receiver<bool>) -> Worker<S, F::Ticker> {
        Worker::new(id, self.store.clone(), self.tickers.new_ticker(), shutdown)
            .handler(
                JobStatus::New,
                NewJobHandler::new(self.store.clone(), self.bank.clone(), self.notifier.clone()),
            )
            .handler(
                JobStatus::Pending,
                PendingJobHandler::new(self.store.clone(), self.bank.clone(), self.notifier.clone()),
            )
    }
}

/// Handle to a running set of workers.
///
/// Dropping the handle without calling [`RunHandle::close`] also asks the
/// workers to stop, but does not wait for them.
#[derive(Debug)]
pub struct RunHandle {
    shutdown: Arc<watch::Sender<bool>>,
    handles: Vec<JoinHandle<WorkerExit>>,
    forwarder: Option<AbortHandle>,
}

impl RunHandle {
    /// Ask every worker to stop and wait until all of them have.
    ///
    /// Workers in the middle of a job finish its transaction first. No tick
    /// is processed after this returns.
    pub async fn close(self) {
        debug!("Closing poller…");
        self.shutdown.send_replace(true);
        self.wait_for_shutdown().await;
    }

    /// Wait for all workers to stop on their own.
    pub async fn wait_for_shutdown(self) {
        let Self {
            shutdown,
            handles,
            forwarder,
        } = self;

        join_all(handles).await.into_iter().for_each(|result| match result {
            Ok(exit) => debug!(?exit, "Worker stopped"),
            Err(error) => warn!(%error, "Worker task panicked"),
        });

        if let Some(forwarder) = forwarder {
            forwarder.abort();
        }
        drop(shutdown);
    }

    /// The number of workers started.
    pub fn num_workers(&self) -> usize {
        self.handles.len()
    }
}
