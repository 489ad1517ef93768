#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use anyhow::anyhow;
use chrono::{Duration as ChronoDuration, Utc};
use registry_poller::{
    Application, ApplicationStatus, BankClient, BankError, Job, JobStatus, JobStore, Notifier,
    StatusChange, Transaction,
};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Barrier;
use uuid::Uuid;

pub fn application(status: &str) -> Application {
    let id = Uuid::new_v4();
    Application {
        id,
        first_name: "Ada".to_string(),
        last_name: format!("Lovelace-{}", &id.simple().to_string()[..8]),
        status: ApplicationStatus::new(status),
    }
}

/// A job in `status`, created `age_secs` seconds ago.
pub fn job(status: JobStatus, application_status: &str, age_secs: i64) -> Job {
    let mut job = Job::new(application(application_status));
    job.status = status;
    job.created_at = Utc::now() - ChronoDuration::seconds(age_secs);
    job.updated_at = job.created_at;
    job
}

#[derive(Default)]
struct Table {
    jobs: Vec<Job>,
    locked: HashSet<Uuid>,
    commits_with_writes: usize,
    fail_next_updates: usize,
    fail_next_claims: usize,
    fail_next_rollbacks: usize,
}

/// In-memory job table.
///
/// Claims lock rows for the lifetime of the claiming transaction and skip rows
/// locked by others. Updates are buffered in the transaction and only become
/// visible on commit.
#[derive(Clone, Default)]
pub struct MemoryJobStore {
    table: Arc<Mutex<Table>>,
}

pub struct MemoryTx {
    table: Arc<Mutex<Table>>,
    claimed: Vec<Uuid>,
    writes: Vec<Job>,
    finished: bool,
}

impl MemoryJobStore {
    pub fn with_jobs(jobs: impl IntoIterator<Item = Job>) -> Self {
        let store = Self::default();
        store.lock().jobs.extend(jobs);
        store
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap()
    }

    pub fn insert(&self, job: Job) {
        self.lock().jobs.push(job);
    }

    pub fn job(&self, id: Uuid) -> Job {
        self.lock()
            .jobs
            .iter()
            .find(|job| job.id == id)
            .cloned()
            .unwrap()
    }

    pub fn is_locked(&self, id: Uuid) -> bool {
        self.lock().locked.contains(&id)
    }

    /// Number of committed transactions that changed at least one job.
    pub fn commits_with_writes(&self) -> usize {
        self.lock().commits_with_writes
    }

    pub fn fail_next_updates(&self, count: usize) {
        self.lock().fail_next_updates = count;
    }

    pub fn fail_next_claims(&self, count: usize) {
        self.lock().fail_next_claims = count;
    }

    /// Failed rollbacks still release their locks, like a dropped connection.
    pub fn fail_next_rollbacks(&self, count: usize) {
        self.lock().fail_next_rollbacks = count;
    }
}

impl MemoryTx {
    fn release(&mut self) {
        let mut table = self.table.lock().unwrap();
        for id in self.claimed.drain(..) {
            table.locked.remove(&id);
        }
        self.finished = true;
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if !self.finished {
            self.release();
        }
    }
}

impl Transaction for MemoryTx {
    async fn commit(mut self) -> Result<(), sqlx::Error> {
        let writes = std::mem::take(&mut self.writes);
        {
            let mut table = self.table.lock().unwrap();
            if !writes.is_empty() {
                table.commits_with_writes += 1;
            }
            for write in writes {
                if let Some(job) = table.jobs.iter_mut().find(|job| job.id == write.id) {
                    job.status = write.status;
                    job.application = write.application;
                    job.updated_at = Utc::now();
                }
            }
        }
        self.release();
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), sqlx::Error> {
        self.writes.clear();
        let failed = {
            let mut table = self.table.lock().unwrap();
            let failed = table.fail_next_rollbacks > 0;
            table.fail_next_rollbacks = table.fail_next_rollbacks.saturating_sub(1);
            failed
        };
        self.release();
        if failed {
            return Err(sqlx::Error::Protocol("rollback failed".to_string()));
        }
        Ok(())
    }
}

impl JobStore for MemoryJobStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, sqlx::Error> {
        Ok(MemoryTx {
            table: self.table.clone(),
            claimed: Vec::new(),
            writes: Vec::new(),
            finished: false,
        })
    }

    async fn claim_next(&self, tx: &mut MemoryTx) -> Result<Option<Job>, sqlx::Error> {
        let mut table = self.lock();
        if table.fail_next_claims > 0 {
            table.fail_next_claims -= 1;
            return Err(sqlx::Error::Protocol("claim failed".to_string()));
        }

        let next = table
            .jobs
            .iter()
            .filter(|job| job.status.is_claimable() && !table.locked.contains(&job.id))
            .min_by_key(|job| job.created_at)
            .cloned();

        if let Some(job) = &next {
            table.locked.insert(job.id);
            tx.claimed.push(job.id);
        }
        Ok(next)
    }

    async fn update_job(&self, tx: &mut MemoryTx, job: &Job) -> Result<(), sqlx::Error> {
        let mut table = self.lock();
        if table.fail_next_updates > 0 {
            table.fail_next_updates -= 1;
            return Err(sqlx::Error::Protocol("update failed".to_string()));
        }
        tx.writes.push(job.clone());
        Ok(())
    }
}

/// Scripted bank.
///
/// Each call pops the next scripted answer; an empty script answers with an
/// `Unknown` error.
#[derive(Default)]
pub struct FakeBank {
    create_answers: Mutex<VecDeque<Result<ApplicationStatus, BankError>>>,
    status_answers: Mutex<VecDeque<Result<ApplicationStatus, BankError>>>,
    create_calls: AtomicUsize,
    status_calls: AtomicUsize,
    barriers: Option<(Arc<Barrier>, Arc<Barrier>)>,
}

impl FakeBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `create_application` call waits on `started`, then on `finished`,
    /// before answering.
    pub fn with_barriers(started: Arc<Barrier>, finished: Arc<Barrier>) -> Self {
        Self {
            barriers: Some((started, finished)),
            ..Self::default()
        }
    }

    pub fn on_create(self, answer: Result<ApplicationStatus, BankError>) -> Self {
        self.create_answers.lock().unwrap().push_back(answer);
        self
    }

    pub fn on_status(self, answer: Result<ApplicationStatus, BankError>) -> Self {
        self.status_answers.lock().unwrap().push_back(answer);
        self
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        if let Some((started, finished)) = &self.barriers {
            started.wait().await;
            finished.wait().await;
        }
    }
}

fn next_answer(
    answers: &Mutex<VecDeque<Result<ApplicationStatus, BankError>>>,
) -> Result<ApplicationStatus, BankError> {
    answers
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or(Err(BankError::Unknown { code: 500 }))
}

impl BankClient for FakeBank {
    async fn create_application(
        &self,
        _application: &Application,
    ) -> Result<ApplicationStatus, BankError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.wait().await;
        next_answer(&self.create_answers)
    }

    async fn get_application_status(&self, _id: Uuid) -> Result<ApplicationStatus, BankError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        next_answer(&self.status_answers)
    }
}

pub fn rejected(message: &str) -> BankError {
    BankError::Rejected {
        code: 400,
        message: message.to_string(),
    }
}

/// Notifier remembering every change it was asked to announce.
#[derive(Default)]
pub struct RecordingNotifier {
    changes: Mutex<Vec<StatusChange>>,
    failing: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier that records each change and then reports a failure.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn changes(&self) -> Vec<StatusChange> {
        self.changes.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    async fn application_status_changed(&self, change: &StatusChange) -> anyhow::Result<()> {
        self.changes.lock().unwrap().push(change.clone());
        if self.failing {
            return Err(anyhow!("bus unavailable"));
        }
        Ok(())
    }
}
