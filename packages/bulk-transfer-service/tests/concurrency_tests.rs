//! P4 (conservation) and P6 (no overspend under concurrency): many
//! `submit_bulk` calls racing against the same account must never admit
//! more than the account can afford, and completed bulks must debit
//! exactly their own total.

mod common;

use bulk_transfer_service::db;
use bulk_transfer_service::intake::submit_bulk;
use std::sync::Arc;

#[tokio::test]
async fn concurrent_intakes_never_overspend_the_account() {
    skip_if_no_database!();
    let ctx = Arc::new(common::test_context().await);

    let account_id = {
        let client = ctx.db.get().await.unwrap();
        db::create_account(
            &client,
            "Acme Org",
            "OIVUSCLQXXX",
            "FR10474608000002006107XXXXX",
            1000_00, // 1000.00
            0,
        )
        .await
        .unwrap()
        .id
    };

    // 20 concurrent bulks each requesting 100.00 against a 1000.00
    // balance: at most 10 can be admitted.
    let mut handles = Vec::new();
    for i in 0..20 {
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move {
            let request_id = uuid::Uuid::new_v4().to_string();
            let req = common::sample_bulk_request(&request_id, vec![common::sample_credit_transfer("100.00")]);
            submit_bulk(&ctx, req).await
        }));
    }

    let mut accepted: i64 = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            accepted += 1;
        }
    }

    assert!(accepted <= 10, "admitted {accepted} bulks, expected at most 10");

    let client = ctx.db.get().await.unwrap();
    let account = db::lookup_account(&client, account_id).await.unwrap().unwrap();
    assert_eq!(account.ongoing_transfer_cents, accepted * 100_00);
    assert!(account.ongoing_transfer_cents <= account.balance_cents);
}

#[tokio::test]
async fn balance_conservation_across_concurrent_completions() {
    skip_if_no_database!();
    use bulk_transfer_service::finalizer::process_finalize_job;
    use bulk_transfer_service::worker::process_transfer_job;

    let ctx = Arc::new(common::test_context().await);

    let account_id = {
        let client = ctx.db.get().await.unwrap();
        db::create_account(
            &client,
            "Acme Org",
            "OIVUSCLQXXX",
            "FR10474608000002006107XXXXX",
            1_000_000_00,
            0,
        )
        .await
        .unwrap()
        .id
    };

    let mut handles = Vec::new();
    for _ in 0..8 {
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move {
            let request_id = uuid::Uuid::new_v4().to_string();
            let req = common::sample_bulk_request(&request_id, vec![common::sample_credit_transfer("50.00")]);
            submit_bulk(&ctx, req).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // drain and process every transfer job, then every finalize job, to
    // drive every bulk to completion.
    while !ctx.transfer_queue.is_empty().await {
        let job = ctx.transfer_queue.dequeue().await;
        process_transfer_job(&ctx, &job).await.unwrap();
    }
    while !ctx.finalize_queue.is_empty().await {
        let job = ctx.finalize_queue.dequeue().await;
        process_finalize_job(&ctx, &job).await.unwrap();
    }

    let client = ctx.db.get().await.unwrap();
    let account = db::lookup_account(&client, account_id).await.unwrap().unwrap();
    assert_eq!(account.balance_cents, 1_000_000_00 - 8 * 50_00);
    assert_eq!(account.ongoing_transfer_cents, 0);
}
