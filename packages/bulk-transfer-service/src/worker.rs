//! Transfer worker (C5)
//!
//! Consumes `TransferJob`s and executes each one against the remote
//! gateway inside a single database transaction. Never mutates
//! reservation or bulk state directly — every outcome, success or
//! failure, is reported to the finalizer as a `FinalizeBulkJob` so state
//! transitions stay serialized through one writer.

use tokio_util::sync::CancellationToken;

use crate::db;
use crate::types::{FinalizeBulkJob, TransferJob};
use crate::AppContext;

/// Runs one worker loop until `shutdown` is cancelled. Checked between
/// jobs only — a job in flight always runs to completion.
pub async fn run_worker_loop(ctx: AppContext, shutdown: CancellationToken) {
    loop {
        let job = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                tracing::info!("transfer worker shutting down");
                return;
            }
            job = ctx.transfer_queue.dequeue() => job,
        };

        if let Err(e) = process_transfer_job(&ctx, &job).await {
            tracing::error!(transfer_uuid = %job.transfer_uuid, error = %e, "transfer job failed");
        }
    }
}

/// Runs the 6-step per-job sequence for a single `TransferJob`. Exposed
/// so tests can drive one job at a time without a spawned loop.
pub async fn process_transfer_job(ctx: &AppContext, job: &TransferJob) -> Result<(), db::DbError> {
    let mut client = ctx.db.get().await?;
    let txn = client.transaction().await?;

    // 1. the account may have been removed out from under us; compensate
    if db::lookup_account(&txn, job.bank_account_id).await?.is_none() {
        txn.commit().await?;
        tracing::warn!(
            transfer_uuid = %job.transfer_uuid,
            bank_account_id = job.bank_account_id,
            "account missing for transfer job, cancelling bulk"
        );
        emit_finalize(ctx, job, false).await;
        return Ok(());
    }

    // 2. at-least-once idempotency: a redelivered job is a no-op past here
    if db::lookup_transaction(&txn, job.transfer_uuid).await?.is_some() {
        txn.commit().await?;
        tracing::debug!(transfer_uuid = %job.transfer_uuid, "transfer already recorded, dropping redelivery");
        return Ok(());
    }

    // 3. persist the attempt (amount negated at storage)
    db::create_transaction(&txn, job).await?;

    // 4. the gateway call; the row staged in step 3 lands regardless of
    //    its outcome, once step 6 commits — it is a record of attempt.
    let success = ctx.gateway.send(job).await;

    // 6. commit before handing off to the finalizer
    txn.commit().await?;

    // 5. report the outcome; the finalizer owns every further mutation.
    emit_finalize(ctx, job, success).await;
    Ok(())
}

async fn emit_finalize(ctx: &AppContext, job: &TransferJob, success: bool) {
    ctx.finalize_queue
        .enqueue(FinalizeBulkJob {
            bulk_request_uuid: job.bulk_request_uuid,
            bank_account_id: job.bank_account_id,
            single_transferred_amount_cents: job.amount_cents,
            success,
        })
        .await;
}
