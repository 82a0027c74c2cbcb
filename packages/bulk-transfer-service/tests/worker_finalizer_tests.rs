//! P5 (at-most-once execution), P7 (all-or-nothing settlement), and the
//! gateway-failure / redelivery seed scenarios, driven by calling
//! `process_transfer_job` / `process_finalize_job` directly.

mod common;

use bulk_transfer_service::db;
use bulk_transfer_service::finalizer::process_finalize_job;
use bulk_transfer_service::types::{RequestStatus, TransferJob};
use bulk_transfer_service::worker::process_transfer_job;
use uuid::Uuid;

async fn seed_account(ctx: &bulk_transfer_service::AppContext, balance_cents: i64, ongoing: i64) -> i64 {
    let client = ctx.db.get().await.unwrap();
    let account = db::create_account(
        &client,
        "Acme Org",
        "OIVUSCLQXXX",
        "FR10474608000002006107XXXXX",
        balance_cents,
        ongoing,
    )
    .await
    .unwrap();
    account.id
}

fn sample_job(bulk_request_uuid: Uuid, bank_account_id: i64, amount_cents: i64) -> TransferJob {
    TransferJob {
        transfer_uuid: Uuid::new_v4(),
        bulk_request_uuid,
        bank_account_id,
        counterparty_name: "Acme Corp".to_string(),
        counterparty_iban: "FR1047460800000200610".to_string(),
        counterparty_bic: "OIVUSCLQXXX".to_string(),
        amount_cents,
        amount_currency: "EUR".to_string(),
        description: "invoice settlement".to_string(),
    }
}

#[tokio::test]
async fn full_completion_settles_balance_once() {
    skip_if_no_database!();
    let ctx = common::test_context().await;
    let account_id = seed_account(&ctx, 100_000_00, 0).await;

    let bulk_request_uuid = Uuid::new_v4();
    {
        let client = ctx.db.get().await.unwrap();
        db::create_bulk_request(&client, account_id, bulk_request_uuid, 21449)
            .await
            .unwrap();
        db::reserve_funds(&client, account_id, 21449).await.unwrap();
    }

    let job_a = sample_job(bulk_request_uuid, account_id, 1450);
    let job_b = sample_job(bulk_request_uuid, account_id, 19999);

    process_transfer_job(&ctx, &job_a).await.unwrap();
    process_transfer_job(&ctx, &job_b).await.unwrap();

    // drain the two finalize jobs the worker emitted
    for _ in 0..2 {
        let finalize_job = ctx.finalize_queue.dequeue().await;
        process_finalize_job(&ctx, &finalize_job).await.unwrap();
    }

    let client = ctx.db.get().await.unwrap();
    let bulk = db::lookup_bulk_request(&client, bulk_request_uuid)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bulk.status, RequestStatus::Completed);
    assert_eq!(bulk.processed_amount_cents, 21449);

    let account = db::lookup_account(&client, account_id).await.unwrap().unwrap();
    assert_eq!(account.balance_cents, 100_000_00 - 21449);
    assert_eq!(account.ongoing_transfer_cents, 0);
}

#[tokio::test]
async fn gateway_rejection_cancels_the_whole_bulk_and_unreserves_funds() {
    skip_if_no_database!();
    let ctx = common::test_context().await;
    let account_id = seed_account(&ctx, 100_000_00, 0).await;

    let bulk_request_uuid = Uuid::new_v4();
    {
        let client = ctx.db.get().await.unwrap();
        db::create_bulk_request(&client, account_id, bulk_request_uuid, 3000)
            .await
            .unwrap();
        db::reserve_funds(&client, account_id, 3000).await.unwrap();
    }

    let job_a = sample_job(bulk_request_uuid, account_id, 1000);
    process_transfer_job(&ctx, &job_a).await.unwrap();
    process_finalize_job(&ctx, &ctx.finalize_queue.dequeue().await)
        .await
        .unwrap();

    // the second child fails at the gateway — a success=false finalize
    process_finalize_job(
        &ctx,
        &bulk_transfer_service::types::FinalizeBulkJob {
            bulk_request_uuid,
            bank_account_id: account_id,
            single_transferred_amount_cents: 2000,
            success: false,
        },
    )
    .await
    .unwrap();

    let client = ctx.db.get().await.unwrap();
    let bulk = db::lookup_bulk_request(&client, bulk_request_uuid)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bulk.status, RequestStatus::Failed);
    // the first success was recorded as processed, but balance was never debited
    assert_eq!(bulk.processed_amount_cents, 1000);

    let account = db::lookup_account(&client, account_id).await.unwrap().unwrap();
    assert_eq!(account.balance_cents, 100_000_00);
    assert_eq!(account.ongoing_transfer_cents, 0);
}

#[tokio::test]
async fn redelivered_transfer_job_is_at_most_once() {
    skip_if_no_database!();
    let ctx = common::test_context().await;
    let account_id = seed_account(&ctx, 100_000_00, 1000).await;

    let bulk_request_uuid = Uuid::new_v4();
    {
        let client = ctx.db.get().await.unwrap();
        db::create_bulk_request(&client, account_id, bulk_request_uuid, 1000)
            .await
            .unwrap();
    }

    let job = sample_job(bulk_request_uuid, account_id, 1000);
    process_transfer_job(&ctx, &job).await.unwrap();
    process_transfer_job(&ctx, &job).await.unwrap();

    let client = ctx.db.get().await.unwrap();
    let transfer = db::lookup_transaction(&client, job.transfer_uuid)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transfer.amount_cents, -1000);

    // exactly one finalize job was emitted for the first delivery, the
    // redelivery was dropped silently
    assert_eq!(ctx.finalize_queue.len().await, 1);
}

#[tokio::test]
async fn terminal_bulk_drops_late_finalize_jobs() {
    skip_if_no_database!();
    let ctx = common::test_context().await;
    let account_id = seed_account(&ctx, 100_000_00, 0).await;

    let bulk_request_uuid = Uuid::new_v4();
    {
        let client = ctx.db.get().await.unwrap();
        db::create_bulk_request(&client, account_id, bulk_request_uuid, 1000)
            .await
            .unwrap();
        db::reserve_funds(&client, account_id, 1000).await.unwrap();
    }

    let complete = bulk_transfer_service::types::FinalizeBulkJob {
        bulk_request_uuid,
        bank_account_id: account_id,
        single_transferred_amount_cents: 1000,
        success: true,
    };
    process_finalize_job(&ctx, &complete).await.unwrap();

    let late_duplicate = complete.clone();
    process_finalize_job(&ctx, &late_duplicate).await.unwrap();

    let client = ctx.db.get().await.unwrap();
    let account = db::lookup_account(&client, account_id).await.unwrap().unwrap();
    assert_eq!(account.balance_cents, 100_000_00 - 1000);
}
