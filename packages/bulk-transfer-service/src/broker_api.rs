//! Broker stub HTTP endpoints
//!
//! Exposes `enqueue`/`dequeue` over HTTP purely to exercise the boundary
//! a real message broker would sit behind. The in-process workers and
//! finalizer talk to the same `JobQueue` instances directly and never go
//! through these routes.

use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::types::{FinalizeBulkJob, TransferJob};
use crate::AppContext;

#[derive(Serialize)]
struct EnqueuedResponse {
    status: &'static str,
}

pub async fn enqueue_transfer(ctx: web::Data<AppContext>, job: web::Json<TransferJob>) -> HttpResponse {
    ctx.transfer_queue.enqueue(job.into_inner()).await;
    HttpResponse::Created().json(EnqueuedResponse { status: "enqueued" })
}

pub async fn dequeue_transfer(ctx: web::Data<AppContext>) -> HttpResponse {
    match ctx.transfer_queue.try_dequeue().await {
        Some(job) => HttpResponse::Ok().json(job),
        None => HttpResponse::NoContent().finish(),
    }
}

pub async fn enqueue_finalize(
    ctx: web::Data<AppContext>,
    job: web::Json<FinalizeBulkJob>,
) -> HttpResponse {
    ctx.finalize_queue.enqueue(job.into_inner()).await;
    HttpResponse::Created().json(EnqueuedResponse { status: "enqueued" })
}

pub async fn dequeue_finalize(ctx: web::Data<AppContext>) -> HttpResponse {
    match ctx.finalize_queue.try_dequeue().await {
        Some(job) => HttpResponse::Ok().json(job),
        None => HttpResponse::NoContent().finish(),
    }
}
