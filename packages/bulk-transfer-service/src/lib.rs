//! Bulk Credit-Transfer Service
//!
//! Accepts bulk credit-transfer requests against an organization's bank
//! account and executes each contained transfer asynchronously through a
//! message-driven worker pipeline, while guaranteeing idempotent intake,
//! correct fund reservation under concurrency, at-most-once transfer
//! execution, and all-or-nothing bulk settlement.
//!
//! Lock order across the system is bulk row, then account row. Intake
//! only ever locks the account (no bulk row exists yet at that point);
//! the finalizer locks the bulk before the account. Workers lock neither.

pub mod amounts;
pub mod api;
pub mod broker_api;
pub mod config;
pub mod db;
pub mod finalizer;
pub mod gateway;
pub mod intake;
pub mod queue;
pub mod types;
pub mod worker;

use std::sync::Arc;
use thiserror::Error;

pub use config::Config;
pub use types::{
    BankAccount, BulkRequest, FinalizeBulkJob, RequestStatus, Transaction, TransferJob,
};

use db::DatabaseClient;
use gateway::RemoteTransferGateway;
use queue::JobQueue;

/// Shared application state: the database pool, the two job queues, and
/// the remote gateway. Held behind an `Arc` and cloned cheaply into each
/// `actix-web` handler and each worker/finalizer loop.
#[derive(Clone)]
pub struct AppContext {
    pub db: Arc<DatabaseClient>,
    pub transfer_queue: Arc<JobQueue<TransferJob>>,
    pub finalize_queue: Arc<JobQueue<FinalizeBulkJob>>,
    pub gateway: Arc<dyn RemoteTransferGateway>,
}

impl AppContext {
    pub fn new(
        db: Arc<DatabaseClient>,
        transfer_queue: Arc<JobQueue<TransferJob>>,
        finalize_queue: Arc<JobQueue<FinalizeBulkJob>>,
        gateway: Arc<dyn RemoteTransferGateway>,
    ) -> Self {
        Self {
            db,
            transfer_queue,
            finalize_queue,
            gateway,
        }
    }
}

/// Top-level error type for failures that are not part of the intake
/// validation taxonomy (see `intake::IntakeError` for that).
#[derive(Error, Debug)]
pub enum Error {
    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<db::DbError> for Error {
    fn from(e: db::DbError) -> Self {
        Error::Database(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_stable() {
        let e = Error::Config("bad DATABASE_URL".to_string());
        assert_eq!(e.to_string(), "configuration error: bad DATABASE_URL");
    }
}
