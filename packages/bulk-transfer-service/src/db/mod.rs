//! Persistence layer (C2)
//!
//! Wraps a `deadpool_postgres` connection pool and exposes the row-level
//! exclusive-locking operations the intake service, transfer worker, and
//! finalizer need. Every write is expected to run inside a
//! `tokio_postgres::Transaction` owned by the caller — functions here
//! take `&impl GenericClient` so they work identically against a plain
//! pooled connection (for reads with no lock) or a transaction (for the
//! locked read-modify-write paths).

pub mod models;

use chrono::{DateTime, Utc};
use deadpool_postgres::{GenericClient, Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use thiserror::Error;
use tokio_postgres::{error::SqlState, NoTls};
use uuid::Uuid;

use crate::types::{BankAccount, BulkRequest, RequestStatus, Transaction, TransferJob};

refinery::embed_migrations!("src/db/migrations");

#[derive(Error, Debug)]
pub enum DbError {
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("failed to build connection pool: {0}")]
    BuildPool(String),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("a transaction with this transfer_uuid was already processed")]
    AlreadyProcessed,

    #[error("data invariant violated: {0}")]
    Invariant(String),
}

/// Database client: owns the connection pool and runs startup migrations.
/// Individual operations are free functions below, so the same logic runs
/// against either a freshly-pooled connection or an open transaction.
pub struct DatabaseClient {
    pool: Pool,
}

impl DatabaseClient {
    pub async fn connect(database_url: &str, max_connections: usize) -> Result<Self, DbError> {
        tracing::info!("connecting to postgres");

        let pg_config = database_url
            .parse::<tokio_postgres::Config>()
            .map_err(DbError::Postgres)?;

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let manager = Manager::from_config(pg_config, NoTls, mgr_config);

        let pool = Pool::builder(manager)
            .max_size(max_connections)
            .build()
            .map_err(|e| DbError::BuildPool(e.to_string()))?;

        // fail fast if the database is unreachable at startup
        let client = pool.get().await?;
        client.query_one("SELECT 1", &[]).await?;

        tracing::info!("connected to postgres");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub async fn get(&self) -> Result<Object, DbError> {
        Ok(self.pool.get().await?)
    }

    /// Applies all embedded SQL migrations that have not yet run.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        let mut client = self.pool.get().await?;
        let report = migrations::runner()
            .run_async(&mut **client)
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;

        for migration in report.applied_migrations() {
            tracing::info!("applied migration {}", migration.name());
        }
        Ok(())
    }

    pub async fn health_check(&self) -> bool {
        match self.pool.get().await {
            Ok(client) => client.query_one("SELECT 1", &[]).await.is_ok(),
            Err(e) => {
                tracing::error!("database health check failed: {e}");
                false
            }
        }
    }
}

fn is_unique_violation(err: &tokio_postgres::Error) -> bool {
    err.code() == Some(&SqlState::UNIQUE_VIOLATION)
}

/// Locks the matching account row for the duration of the caller's
/// transaction. Returns `None` if no account matches `(bic, iban)`.
pub async fn lookup_account_for_update<C: GenericClient>(
    client: &C,
    bic: &str,
    iban: &str,
) -> Result<Option<BankAccount>, DbError> {
    let row = client
        .query_opt(
            "SELECT id, organization_name, bic, iban, balance_cents, ongoing_transfer_cents
             FROM bank_accounts
             WHERE bic = $1 AND iban = $2
             FOR UPDATE",
            &[&bic.trim(), &iban.trim()],
        )
        .await?;
    row.as_ref().map(BankAccount::from_row).transpose()
}

/// Creates a bank account. Not part of any client-facing pipeline —
/// accounts are provisioned out of band; this exists for fixture setup
/// in tests.
pub async fn create_account<C: GenericClient>(
    client: &C,
    organization_name: &str,
    bic: &str,
    iban: &str,
    balance_cents: i64,
    ongoing_transfer_cents: i64,
) -> Result<BankAccount, DbError> {
    let row = client
        .query_one(
            "INSERT INTO bank_accounts
                (organization_name, bic, iban, balance_cents, ongoing_transfer_cents)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, organization_name, bic, iban, balance_cents, ongoing_transfer_cents",
            &[
                &organization_name,
                &bic,
                &iban,
                &balance_cents,
                &ongoing_transfer_cents,
            ],
        )
        .await?;
    BankAccount::from_row(&row)
}

/// Locks the account row by primary key, used by the finalizer after it
/// has already locked the bulk row (lock order: bulk, then account).
pub async fn lookup_account_for_update_by_id<C: GenericClient>(
    client: &C,
    account_id: i64,
) -> Result<Option<BankAccount>, DbError> {
    let row = client
        .query_opt(
            "SELECT id, organization_name, bic, iban, balance_cents, ongoing_transfer_cents
             FROM bank_accounts WHERE id = $1
             FOR UPDATE",
            &[&account_id],
        )
        .await?;
    row.as_ref().map(BankAccount::from_row).transpose()
}

/// Unlocked lookup by primary key, used by the transfer worker, which
/// never takes the account lock.
pub async fn lookup_account<C: GenericClient>(
    client: &C,
    account_id: i64,
) -> Result<Option<BankAccount>, DbError> {
    let row = client
        .query_opt(
            "SELECT id, organization_name, bic, iban, balance_cents, ongoing_transfer_cents
             FROM bank_accounts WHERE id = $1",
            &[&account_id],
        )
        .await?;
    row.as_ref().map(BankAccount::from_row).transpose()
}

/// Increments `ongoing_transfer_cents` by `delta` (which may be negative
/// to release a reservation).
pub async fn reserve_funds<C: GenericClient>(
    client: &C,
    account_id: i64,
    delta_cents: i64,
) -> Result<(), DbError> {
    client
        .execute(
            "UPDATE bank_accounts SET ongoing_transfer_cents = ongoing_transfer_cents + $1
             WHERE id = $2",
            &[&delta_cents, &account_id],
        )
        .await?;
    Ok(())
}

/// Debits `amount_cents` from both `balance_cents` and
/// `ongoing_transfer_cents` atomically — used when a bulk completes.
pub async fn settle_balance<C: GenericClient>(
    client: &C,
    account_id: i64,
    amount_cents: i64,
) -> Result<(), DbError> {
    client
        .execute(
            "UPDATE bank_accounts
             SET balance_cents = balance_cents - $1,
                 ongoing_transfer_cents = ongoing_transfer_cents - $1
             WHERE id = $2",
            &[&amount_cents, &account_id],
        )
        .await?;
    Ok(())
}

pub async fn lookup_bulk_request<C: GenericClient>(
    client: &C,
    request_uuid: Uuid,
) -> Result<Option<BulkRequest>, DbError> {
    let row = client
        .query_opt(
            "SELECT id, request_uuid, bank_account_id, status, total_amount_cents,
                    processed_amount_cents, created_at, completed_at
             FROM bulk_requests WHERE request_uuid = $1",
            &[&request_uuid],
        )
        .await?;
    row.as_ref().map(BulkRequest::from_row).transpose()
}

pub async fn lookup_bulk_request_for_update<C: GenericClient>(
    client: &C,
    request_uuid: Uuid,
) -> Result<Option<BulkRequest>, DbError> {
    let row = client
        .query_opt(
            "SELECT id, request_uuid, bank_account_id, status, total_amount_cents,
                    processed_amount_cents, created_at, completed_at
             FROM bulk_requests WHERE request_uuid = $1
             FOR UPDATE",
            &[&request_uuid],
        )
        .await?;
    row.as_ref().map(BulkRequest::from_row).transpose()
}

pub async fn create_bulk_request<C: GenericClient>(
    client: &C,
    bank_account_id: i64,
    request_uuid: Uuid,
    total_amount_cents: i64,
) -> Result<BulkRequest, DbError> {
    let row = client
        .query_one(
            "INSERT INTO bulk_requests
                (request_uuid, bank_account_id, status, total_amount_cents, processed_amount_cents)
             VALUES ($1, $2, 'PENDING', $3, 0)
             RETURNING id, request_uuid, bank_account_id, status, total_amount_cents,
                       processed_amount_cents, created_at, completed_at",
            &[&request_uuid, &bank_account_id, &total_amount_cents],
        )
        .await?;
    BulkRequest::from_row(&row)
}

pub async fn lookup_transaction<C: GenericClient>(
    client: &C,
    transfer_uuid: Uuid,
) -> Result<Option<Transaction>, DbError> {
    let row = client
        .query_opt(
            "SELECT id, transfer_uuid, bulk_request_uuid, counterparty_name, counterparty_iban,
                    counterparty_bic, amount_cents, amount_currency, bank_account_id,
                    description, created_at
             FROM transactions WHERE transfer_uuid = $1",
            &[&transfer_uuid],
        )
        .await?;
    row.as_ref().map(Transaction::from_row).transpose()
}

/// Records a transfer attempt. Stores `amount_cents` negated to denote a
/// debit. A unique-violation on `transfer_uuid` (the job was redelivered
/// after the row was already written) surfaces as `DbError::AlreadyProcessed`
/// rather than propagating the raw driver error.
pub async fn create_transaction<C: GenericClient>(
    client: &C,
    job: &TransferJob,
) -> Result<Transaction, DbError> {
    let result = client
        .query_one(
            "INSERT INTO transactions
                (transfer_uuid, bulk_request_uuid, counterparty_name, counterparty_iban,
                 counterparty_bic, amount_cents, amount_currency, bank_account_id, description)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING id, transfer_uuid, bulk_request_uuid, counterparty_name, counterparty_iban,
                       counterparty_bic, amount_cents, amount_currency, bank_account_id,
                       description, created_at",
            &[
                &job.transfer_uuid,
                &job.bulk_request_uuid,
                &job.counterparty_name,
                &job.counterparty_iban,
                &job.counterparty_bic,
                &(-job.amount_cents),
                &job.amount_currency,
                &job.bank_account_id,
                &job.description,
            ],
        )
        .await;

    match result {
        Ok(row) => Transaction::from_row(&row),
        Err(e) if is_unique_violation(&e) => Err(DbError::AlreadyProcessed),
        Err(e) => Err(DbError::Postgres(e)),
    }
}

/// Adds `delta_cents` to `processed_amount_cents` and returns the bulk's
/// new processed total.
pub async fn increment_processed_amount<C: GenericClient>(
    client: &C,
    bulk_id: i64,
    delta_cents: i64,
) -> Result<i64, DbError> {
    let row = client
        .query_one(
            "UPDATE bulk_requests SET processed_amount_cents = processed_amount_cents + $1
             WHERE id = $2
             RETURNING processed_amount_cents",
            &[&delta_cents, &bulk_id],
        )
        .await?;
    Ok(row.try_get("processed_amount_cents")?)
}

pub async fn complete_bulk<C: GenericClient>(
    client: &C,
    bulk_id: i64,
    completed_at: DateTime<Utc>,
) -> Result<(), DbError> {
    client
        .execute(
            "UPDATE bulk_requests SET status = $1, completed_at = $2 WHERE id = $3",
            &[&RequestStatus::Completed.as_db_str(), &completed_at, &bulk_id],
        )
        .await?;
    Ok(())
}

pub async fn fail_bulk<C: GenericClient>(
    client: &C,
    bulk_id: i64,
    completed_at: DateTime<Utc>,
) -> Result<(), DbError> {
    client
        .execute(
            "UPDATE bulk_requests SET status = $1, completed_at = $2 WHERE id = $3",
            &[&RequestStatus::Failed.as_db_str(), &completed_at, &bulk_id],
        )
        .await?;
    Ok(())
}
