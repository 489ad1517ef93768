use crate::application::Application;
use crate::schema::{Job, JobStatus};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use std::future::Future;
use tracing::instrument;
use uuid::Uuid;

/// A unit of work that is either committed or rolled back as a whole.
///
/// Row locks taken through [`JobStore::claim_next`] are held until one of
/// these methods runs, or until the transaction is dropped.
pub trait Transaction: Send + 'static {
    /// Makes every write of this transaction durable and releases its locks.
    fn commit(self) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Discards every write of this transaction and releases its locks.
    fn rollback(self) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

impl Transaction for sqlx::Transaction<'static, Postgres> {
    async fn commit(self) -> Result<(), sqlx::Error> {
        sqlx::Transaction::commit(self).await
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        sqlx::Transaction::rollback(self).await
    }
}

/// The job queue.
///
/// Every claim and update runs inside a transaction handed in by the caller,
/// so a claim and the update that follows it commit or roll back together.
pub trait JobStore: Clone + Send + Sync + 'static {
    /// Transaction type produced by [`JobStore::begin`].
    type Tx: Transaction;

    /// Opens a new transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, sqlx::Error>> + Send;

    /// Locks and returns the oldest job that still needs processing.
    ///
    /// Rows locked by other transactions are skipped rather than waited for.
    /// Returns `Ok(None)` when no job is eligible.
    fn claim_next(
        &self,
        tx: &mut Self::Tx,
    ) -> impl Future<Output = Result<Option<Job>, sqlx::Error>> + Send;

    /// Persists the status and application snapshot of `job`.
    fn update_job(
        &self,
        tx: &mut Self::Tx,
        job: &Job,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

/// [`JobStore`] backed by the `jobs` table in Postgres.
#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    /// Creates a store that takes connections from `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl JobStore for PgJobStore {
    type Tx = sqlx::Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Tx, sqlx::Error> {
        self.pool.begin().await
    }

    async fn claim_next(&self, tx: &mut Self::Tx) -> Result<Option<Job>, sqlx::Error> {
        find_next_unlocked_job_tx(tx).await
    }

    async fn update_job(&self, tx: &mut Self::Tx, job: &Job) -> Result<(), sqlx::Error> {
        update_job_tx(tx, job).await
    }
}

/// Finds the oldest job that is unlocked and not yet done, and locks it.
pub(crate) async fn find_next_unlocked_job_tx(
    tx: &mut sqlx::Transaction<'_, Postgres>,
) -> Result<Option<Job>, sqlx::Error> {
    sqlx::query_as::<_, Job>(
        r"
        SELECT id, application, status, created_at, updated_at
        FROM jobs
        WHERE status IN ('new', 'pending')
        ORDER BY created_at ASC
        LIMIT 1
        FOR UPDATE SKIP LOCKED
        ",
    )
    .fetch_optional(&mut **tx)
    .await
}

/// Writes the status and application snapshot of a claimed job.
pub(crate) async fn update_job_tx(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    job: &Job,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE jobs SET status = $2, application = $3, updated_at = NOW() WHERE id = $1",
    )
    .bind(job.id)
    .bind(job.status.as_str())
    .bind(Json(&job.application))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Set up the database schema required by the poller.
///
/// This runs the embedded migrations and is safe to call on every start.
pub async fn setup_database(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Inserts a new job for `application` and returns its id.
///
/// This is the entry point used when the API service announces a new
/// application.
#[instrument(name = "registry.create_job", skip_all, fields(application.id = %application.id))]
pub async fn create_job(pool: &PgPool, application: &Application) -> Result<Uuid, sqlx::Error> {
    let job = Job::new(application.clone());
    sqlx::query_scalar::<_, Uuid>(
        r"
        INSERT INTO jobs (id, application, status)
        VALUES ($1, $2, $3)
        RETURNING id
        ",
    )
    .bind(job.id)
    .bind(Json(&job.application))
    .bind(JobStatus::New.as_str())
    .fetch_one(pool)
    .await
}

/// Loads a single job without locking it.
pub async fn get_job(pool: &PgPool, id: Uuid) -> Result<Option<Job>, sqlx::Error> {
    sqlx::query_as::<_, Job>(
        "SELECT id, application, status, created_at, updated_at FROM jobs WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// The number of jobs that have not reached `done` yet
pub async fn unfinished_job_count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM jobs WHERE status IN ('new', 'pending')")
        .fetch_one(pool)
        .await
}
