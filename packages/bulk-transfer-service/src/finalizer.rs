//! Finalizer (C6)
//!
//! The single serialized writer of bulk and account settlement state.
//! Workers never mutate a bulk or an account directly — every outcome
//! flows through here as a `FinalizeBulkJob`, so the state machine below
//! is the only place `BulkRequest.status` and `bank_accounts.balance_cents`
//! change after intake.
//!
//! Lock order is always bulk row, then account row, matching intake's
//! (account-only) and the worker's (no locks) call graphs so the system
//! never deadlocks across these three components.

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::db;
use crate::types::FinalizeBulkJob;
use crate::AppContext;

pub async fn run_finalizer_loop(ctx: AppContext, shutdown: CancellationToken) {
    loop {
        let job = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                tracing::info!("finalizer shutting down");
                return;
            }
            job = ctx.finalize_queue.dequeue() => job,
        };

        if let Err(e) = process_finalize_job(&ctx, &job).await {
            tracing::error!(
                bulk_id = %job.bulk_request_uuid,
                error = %e,
                "finalize job failed"
            );
        }
    }
}

/// Runs the finalizer state machine for a single `FinalizeBulkJob`.
/// Exposed so tests can drive one job at a time without a spawned loop.
pub async fn process_finalize_job(ctx: &AppContext, job: &FinalizeBulkJob) -> Result<(), db::DbError> {
    let mut client = ctx.db.get().await?;
    let txn = client.transaction().await?;

    // 1. load and lock the bulk; absent means it's been purged or the
    //    job is malformed — nothing to do.
    let Some(bulk) = db::lookup_bulk_request_for_update(&txn, job.bulk_request_uuid).await?
    else {
        txn.commit().await?;
        tracing::warn!(bulk_id = %job.bulk_request_uuid, "finalize job for unknown bulk, dropping");
        return Ok(());
    };

    // 2. terminal states are sticky: a redelivered or late-arriving job
    //    for an already-settled bulk is a no-op.
    if bulk.status.is_terminal() {
        txn.commit().await?;
        tracing::debug!(bulk_id = %bulk.request_uuid, status = ?bulk.status, "bulk already terminal, dropping");
        return Ok(());
    }

    let account = db::lookup_account_for_update_by_id(&txn, job.bank_account_id)
        .await?
        .ok_or_else(|| {
            db::DbError::Invariant(format!(
                "bulk {} references missing account {}",
                bulk.request_uuid, job.bank_account_id
            ))
        })?;

    if !job.success {
        // 3. cancellation path: unreserve the full bulk amount regardless
        //    of how many child transfers had already succeeded — partial
        //    successes remain as audit rows but the bulk never debits.
        db::reserve_funds(&txn, account.id, -bulk.total_amount_cents).await?;
        db::fail_bulk(&txn, bulk.id, Utc::now()).await?;
        txn.commit().await?;
        tracing::info!(bulk_id = %bulk.request_uuid, "bulk cancelled");
        return Ok(());
    }

    // 4. success path: accumulate and check for completion
    let processed = db::increment_processed_amount(
        &txn,
        bulk.id,
        job.single_transferred_amount_cents,
    )
    .await?;

    if processed < bulk.total_amount_cents {
        txn.commit().await?;
        tracing::debug!(
            bulk_id = %bulk.request_uuid,
            processed,
            total = bulk.total_amount_cents,
            "bulk still in progress"
        );
        return Ok(());
    }

    if processed > bulk.total_amount_cents {
        return Err(db::DbError::Invariant(format!(
            "bulk {} processed_amount_cents {} exceeds total_amount_cents {}",
            bulk.request_uuid, processed, bulk.total_amount_cents
        )));
    }

    db::settle_balance(&txn, account.id, bulk.total_amount_cents).await?;
    db::complete_bulk(&txn, bulk.id, Utc::now()).await?;
    txn.commit().await?;
    tracing::info!(bulk_id = %bulk.request_uuid, "bulk completed");
    Ok(())
}
