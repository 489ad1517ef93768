#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod application;
mod bank;
pub mod config;
mod errors;
mod handlers;
mod notifier;
mod poller;
pub mod schema;
mod storage;
pub mod ticker;
mod util;
mod worker;

pub use self::application::{Application, ApplicationStatus, StatusChange};
pub use self::bank::{BankClient, HttpBankClient};
pub use self::errors::{BankError, HandleError};
pub use self::handlers::{JobHandler, NewJobHandler, PendingJobHandler};
pub use self::notifier::{Notifier, STATUS_CHANGED_SUBJECT, TracingNotifier};
pub use self::poller::{Poller, RunHandle};
pub use self::schema::{Job, JobStatus};
pub use self::storage::{
    JobStore, PgJobStore, Transaction, create_job, get_job, setup_database, unfinished_job_count,
};
pub use self::worker::{TickOutcome, Worker, WorkerExit};
