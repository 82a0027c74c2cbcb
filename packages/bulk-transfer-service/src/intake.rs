//! Intake service (C4)
//!
//! Validates and admits a bulk credit-transfer request. The entire
//! pipeline runs inside one database transaction with the account row
//! exclusively locked from step 6 onward, so a concurrent admission for
//! the same account observes an up-to-date `ongoing_transfer_cents`.

use thiserror::Error;
use uuid::Uuid;

use crate::amounts;
use crate::db::{self, DbError};
use crate::types::{BulkTransferRequest, BulkTransferSuccessResponse, TransferJob};
use crate::AppContext;

const MAX_TRANSFERS_PER_BULK: usize = 1000;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("invalid-request-id")]
    InvalidRequestId,
    #[error("already-processed")]
    AlreadyProcessed,
    #[error("too-many-transfers")]
    TooManyTransfers,
    #[error("{0}")]
    InvalidAmount(String),
    #[error("negative-or-null-amounts")]
    NegativeOrNullAmounts,
    #[error("unknown-account")]
    UnknownAccount,
    #[error("insufficient-account-balance")]
    InsufficientBalance,
    #[error("schema violation: {0}")]
    SchemaViolation(String),
    #[error("transient storage failure")]
    Transient(#[from] DbError),
}

impl IntakeError {
    /// The stable `reason` tag returned to the caller, independent of
    /// `Display`'s human-readable message.
    pub fn reason(&self) -> &'static str {
        match self {
            IntakeError::InvalidRequestId => "invalid-request-id",
            IntakeError::AlreadyProcessed => "already-processed",
            IntakeError::TooManyTransfers => "too-many-transfers",
            IntakeError::InvalidAmount(_) => "invalid-amount",
            IntakeError::NegativeOrNullAmounts => "negative-or-null-amounts",
            IntakeError::UnknownAccount => "unknown-account",
            IntakeError::InsufficientBalance => "insufficient-account-balance",
            IntakeError::SchemaViolation(_) => "schema-violation",
            IntakeError::Transient(_) => "transient-storage-failure",
        }
    }
}

/// Parses `request_id` as a UUID and rejects anything but the canonical
/// lowercase hyphenated form (no upper-case, no braces, no shorthand).
fn parse_canonical_request_id(request_id: &str) -> Result<Uuid, IntakeError> {
    let uuid = Uuid::parse_str(request_id).map_err(|_| IntakeError::InvalidRequestId)?;
    if uuid.hyphenated().to_string() != request_id {
        return Err(IntakeError::InvalidRequestId);
    }
    Ok(uuid)
}

pub async fn submit_bulk(
    ctx: &AppContext,
    req: BulkTransferRequest,
) -> Result<BulkTransferSuccessResponse, IntakeError> {
    req.validate_shape()
        .map_err(IntakeError::SchemaViolation)?;

    // 1. canonical request id
    let request_uuid = parse_canonical_request_id(&req.request_id)?;

    let mut client = ctx.db.get().await?;
    let txn = client.transaction().await.map_err(DbError::from)?;

    // 2. idempotency gate
    if db::lookup_bulk_request(&txn, request_uuid)
        .await?
        .is_some()
    {
        return Err(IntakeError::AlreadyProcessed);
    }

    // 3. cardinality
    if req.credit_transfers.len() > MAX_TRANSFERS_PER_BULK {
        return Err(IntakeError::TooManyTransfers);
    }

    // 4. every transfer must parse as a valid amount — a full pass over
    //    the whole set before step 5 even looks at the sign, so a
    //    malformed amount anywhere in the bulk always reports
    //    `invalid-amount` regardless of what other transfers contain.
    let mut amounts_cents = Vec::with_capacity(req.credit_transfers.len());
    for transfer in &req.credit_transfers {
        let cents = amounts::to_cents(&transfer.amount)
            .map_err(|e| IntakeError::InvalidAmount(e.0))?;
        amounts_cents.push(cents);
    }

    // 5. only once every amount has parsed do we check that each is
    //    strictly positive.
    for &cents in &amounts_cents {
        if cents <= 0 {
            return Err(IntakeError::NegativeOrNullAmounts);
        }
    }

    // 6. locate and lock the paying account
    let account = db::lookup_account_for_update(
        &txn,
        &req.organization_bic,
        &req.organization_iban,
    )
    .await?
    .ok_or(IntakeError::UnknownAccount)?;

    // 7. admission check: ongoing + new against balance
    let total_cents: i64 = amounts_cents.iter().sum();
    if total_cents + account.ongoing_transfer_cents > account.balance_cents {
        return Err(IntakeError::InsufficientBalance);
    }

    // 8. create bulk row, reserve funds, enqueue one job per transfer
    let bulk = db::create_bulk_request(&txn, account.id, request_uuid, total_cents).await?;
    db::reserve_funds(&txn, account.id, total_cents).await?;

    for (transfer, cents) in req.credit_transfers.iter().zip(amounts_cents.iter()) {
        let job = TransferJob {
            transfer_uuid: Uuid::new_v4(),
            bulk_request_uuid: bulk.request_uuid,
            bank_account_id: account.id,
            counterparty_name: transfer.counterparty_name.clone(),
            counterparty_iban: transfer.counterparty_iban.clone(),
            counterparty_bic: transfer.counterparty_bic.clone(),
            amount_cents: *cents,
            amount_currency: transfer.currency.clone(),
            description: transfer.description.clone(),
        };
        ctx.transfer_queue.enqueue(job).await;
    }

    // 9. commit
    txn.commit().await.map_err(DbError::from)?;

    tracing::info!(
        bulk_id = %bulk.request_uuid,
        total_cents,
        transfer_count = req.credit_transfers.len(),
        "bulk transfer accepted"
    );

    Ok(BulkTransferSuccessResponse {
        bulk_id: bulk.request_uuid.to_string(),
        message: "Bulk transfer accepted".to_string(),
    })
}
