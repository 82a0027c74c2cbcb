//! HTTP surface (C8)
//!
//! Thin `actix-web` layer: deserialize, hand off to `intake::submit_bulk`,
//! map the result to a status code and JSON body. No business logic
//! lives here.

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpResponse, HttpServer};
use serde::Serialize;

use crate::intake::{self, IntakeError};
use crate::types::BulkTransferRequest;
use crate::{AppContext, Result};

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
}

/// POST /transfers/bulk
async fn submit_bulk(
    ctx: web::Data<AppContext>,
    body: web::Bytes,
) -> HttpResponse {
    let req: BulkTransferRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            return HttpResponse::UnprocessableEntity().json(serde_json::json!({
                "bulk_id": "",
                "message": "Bulk transfer denied",
                "error": { "reason": "schema-violation", "details": e.to_string() },
            }))
        }
    };
    let bulk_id = req.request_id.clone();

    match intake::submit_bulk(ctx.get_ref(), req).await {
        Ok(success) => HttpResponse::Created().json(success),
        Err(err) => {
            let (status, details) = status_and_details(&err);
            HttpResponse::build(status).json(serde_json::json!({
                "bulk_id": bulk_id,
                "message": "Bulk transfer denied",
                "error": { "reason": err.reason(), "details": details },
            }))
        }
    }
}

fn status_and_details(err: &IntakeError) -> (actix_web::http::StatusCode, String) {
    use actix_web::http::StatusCode;

    match err {
        IntakeError::TooManyTransfers => (StatusCode::PAYLOAD_TOO_LARGE, err.to_string()),
        IntakeError::UnknownAccount => (StatusCode::NOT_FOUND, err.to_string()),
        IntakeError::Transient(e) => {
            tracing::error!(error = %e, "transient storage failure handling bulk transfer");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error, please retry".to_string(),
            )
        }
        other => (StatusCode::UNPROCESSABLE_ENTITY, other.to_string()),
    }
}

/// GET /health
async fn health_check(ctx: web::Data<AppContext>) -> HttpResponse {
    if ctx.db.health_check().await {
        HttpResponse::Ok().json(HealthResponse {
            status: "healthy",
            database: "up",
        })
    } else {
        HttpResponse::ServiceUnavailable().json(HealthResponse {
            status: "degraded",
            database: "down",
        })
    }
}

fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .service(
            web::scope("/transfers").route("/bulk", web::post().to(submit_bulk)),
        )
        .service(
            web::scope("/internal/jobs")
                .route("/transfer", web::post().to(crate::broker_api::enqueue_transfer))
                .route("/transfer", web::get().to(crate::broker_api::dequeue_transfer))
                .route("/bulk", web::post().to(crate::broker_api::enqueue_finalize))
                .route("/bulk", web::get().to(crate::broker_api::dequeue_finalize)),
        );
}

pub async fn start_api_server(
    ctx: AppContext,
    bind_address: &str,
    allowed_origin: Option<String>,
) -> Result<()> {
    tracing::info!("starting API server on {bind_address}");

    let app_data = web::Data::new(ctx);

    HttpServer::new(move || {
        let allowed_origin = allowed_origin.clone();

        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION])
            .max_age(3600);

        if let Some(origin) = allowed_origin {
            tracing::info!(origin, "restricting CORS to configured origin");
            cors = cors.allowed_origin(&origin);
        } else {
            tracing::warn!("ALLOWED_ORIGIN not set, allowing any origin");
            cors = cors.allow_any_origin();
        }

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(app_data.clone())
            .app_data(web::PayloadConfig::new(10 * 1024 * 1024))
            .configure(configure_routes)
    })
    .bind(bind_address)
    .map_err(crate::Error::Io)?
    .run()
    .await
    .map_err(crate::Error::Io)?;

    Ok(())
}
