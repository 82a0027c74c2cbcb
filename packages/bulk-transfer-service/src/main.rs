//! Bulk Credit-Transfer Service binary

use std::sync::Arc;

use bulk_transfer_service::api::start_api_server;
use bulk_transfer_service::db::DatabaseClient;
use bulk_transfer_service::gateway::AcceptAllGateway;
use bulk_transfer_service::queue::JobQueue;
use bulk_transfer_service::{finalizer, worker, AppContext, Config};
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("failed to set tracing subscriber");

    tracing::info!("starting bulk-transfer-service");

    let config = Config::from_env()?;

    let db = Arc::new(DatabaseClient::connect(&config.database_url, config.max_db_connections).await?);
    db.run_migrations().await?;

    let transfer_queue = JobQueue::new();
    let finalize_queue = JobQueue::new();
    let gateway = Arc::new(AcceptAllGateway);

    let ctx = AppContext::new(db, transfer_queue, finalize_queue, gateway);

    let shutdown = CancellationToken::new();

    let mut worker_handles = Vec::new();
    for _ in 0..config.transfer_worker_count {
        worker_handles.push(tokio::spawn(worker::run_worker_loop(
            ctx.clone(),
            shutdown.clone(),
        )));
    }
    for _ in 0..config.finalizer_worker_count {
        worker_handles.push(tokio::spawn(finalizer::run_finalizer_loop(
            ctx.clone(),
            shutdown.clone(),
        )));
    }

    tracing::info!(
        transfer_workers = config.transfer_worker_count,
        finalizer_workers = config.finalizer_worker_count,
        "spawned worker pool"
    );

    let bind_addr = config.bind_addr.clone();
    let allowed_origin = config.allowed_origin.clone();
    let api_result = tokio::select! {
        result = start_api_server(ctx, &bind_addr, allowed_origin) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            Ok(())
        }
    };

    shutdown.cancel();
    for handle in worker_handles {
        let _ = handle.await;
    }

    api_result?;
    Ok(())
}
