//! svcbill server
//!
//! Runs the operator HTTP API, the payment webhook endpoint and the
//! scheduled overdue sweep against PostgreSQL.

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpResponse, HttpServer};
use anyhow::Context;
use std::env;
use std::sync::Arc;
use svcbill_api::{configure, AppServices};
use svcbill_auth::JwtService;
use svcbill_core::AppConfig;
use svcbill_db::{create_pool, run_migrations, PgBillingStore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "svcbill={lvl},svcbill_api={lvl},svcbill_services={lvl},svcbill_db={lvl},svcbill_auth={lvl},actix_web=info,sqlx=warn",
            lvl = log_level
        ))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

fn cors(origins: &str) -> Cors {
    let allowed: Vec<String> = origins
        .split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();

    Cors::default()
        .allowed_origin_fn(move |origin, _req_head| {
            origin
                .to_str()
                .map(|o| allowed.iter().any(|a| a == o))
                .unwrap_or(false)
        })
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting svcbill v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().context("failed to load configuration")?;

    info!("Connecting to database...");
    let pool = create_pool(&config.database)
        .await
        .context("failed to create database pool")?;

    if config.database.run_migrations {
        run_migrations(&pool)
            .await
            .context("failed to apply migrations")?;
    } else {
        warn!("Skipping migrations; schema must already be current");
    }

    let store = Arc::new(PgBillingStore::new(pool));
    let services = AppServices::new(store, &config.suspension);
    let jwt_service = Arc::new(JwtService::from_config(&config.auth));

    info!(
        interval_secs = config.suspension.sweep_interval_secs,
        concurrency = config.suspension.sweep_concurrency,
        "Starting overdue sweep scheduler"
    );
    let shutdown = CancellationToken::new();
    let sweeper = services.scheduler().spawn(shutdown.clone());

    let bind_addr = config.server_addr();
    let cors_origins = config.server.cors_origins.clone();
    info!(
        "Starting HTTP server on {} with {} workers",
        bind_addr, config.server.workers
    );

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(services.clone()))
            .app_data(web::Data::new(jwt_service.clone()))
            .app_data(web::JsonConfig::default().limit(64 * 1024))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                let error_message = err.to_string();
                actix_web::error::InternalError::from_response(
                    err,
                    HttpResponse::BadRequest().json(serde_json::json!({
                        "error": "invalid_query",
                        "message": error_message
                    })),
                )
                .into()
            }))
            .wrap(cors(&cors_origins))
            .wrap(middleware::Logger::new("%a \"%r\" %s %b %Dms"))
            .wrap(middleware::NormalizePath::trim())
            .configure(configure::<PgBillingStore>)
    })
    .workers(config.server.workers)
    .bind(&bind_addr)
    .with_context(|| format!("failed to bind {}", bind_addr))?
    .run()
    .await;

    info!("HTTP server stopped, waiting for the sweep scheduler");
    shutdown.cancel();
    if let Err(e) = sweeper.await {
        warn!(error = %e, "Sweep scheduler task ended abnormally");
    }

    server.context("HTTP server error")
}
