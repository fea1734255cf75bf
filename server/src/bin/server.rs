//! Agent backend server — job processor, outbox delivery worker, cron
//! scheduler, and a minimal health/admin HTTP surface.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::routing::get;
use axum::Json;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use server_core::config::Config;
use server_core::kernel::db;
use server_core::kernel::jobs::handlers::build_registry;
use server_core::kernel::jobs::processor::{JobWorker, JobWorkerConfig};
use server_core::kernel::outbox::OutboxDelivery;
use server_core::kernel::scheduler::CronScheduler;
use server_core::kernel::ServerDeps;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    let config = Config::from_env().context("failed to load configuration")?;
    tracing::info!(bind_addr = %config.bind_addr, "starting agent backend server");

    let pool = db::connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    let registry = build_registry();
    let deps = Arc::new(ServerDeps::new(pool.clone(), config.clone(), registry, None, None));

    let shutdown = CancellationToken::new();

    let mut tasks = tokio::task::JoinSet::new();

    for i in 0..config.scheduler_workers {
        let worker_config =
            JobWorkerConfig::from_config(&deps.config).with_worker_id(format!("worker-{i}"));
        let worker = JobWorker::new(deps.job_deps(), deps.job_registry.clone(), worker_config);
        let shutdown = shutdown.clone();
        tasks.spawn(async move { worker.run(shutdown).await });
    }

    let outbox_delivery = OutboxDelivery::new(deps.outbox_store.clone(), pool.clone(), config.clone())
        .context("failed to build outbox delivery worker")?;
    {
        let shutdown = shutdown.clone();
        tasks.spawn(async move { outbox_delivery.run(shutdown).await });
    }

    let cron_scheduler = CronScheduler::from_config(pool.clone(), &config);
    {
        let shutdown = shutdown.clone();
        tasks.spawn(async move { cron_scheduler.run(shutdown).await });
    }

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(pool.clone());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    let server_shutdown = shutdown.clone();
    tasks.spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await
        {
            tracing::error!(error = %e, "health server exited with error");
        }
    });

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl_c")?;
    tracing::info!("shutdown signal received, draining workers");
    shutdown.cancel();

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            tracing::error!(error = %e, "background task panicked");
        }
    }

    tracing::info!("shutdown complete");
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(pool): State<sqlx::PgPool>) -> Json<serde_json::Value> {
    match sqlx::query("SELECT 1").execute(&pool).await {
        Ok(_) => Json(serde_json::json!({ "status": "ready" })),
        Err(e) => Json(serde_json::json!({ "status": "unready", "error": e.to_string() })),
    }
}
