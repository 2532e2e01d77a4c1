//! Validation engine worker.
//!
//! Deployment entrypoint for the edit validation engine: connects to
//! durable storage, wires the transient store, scheduler, and notification
//! delivery together, and runs until SIGINT/SIGTERM. The presentation
//! layer mounts its routes on top of the same coordinator handle; this
//! process owns the deferred tally and reminder tasks.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lorebase_engine::{
    EditLifecycleCoordinator, EventBusNotifier, PgDurableEditStore, TokioScheduler,
};
use lorebase_events::{EmailConfig, EmailDelivery, EventBus};
use lorebase_store::PendingEditStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lorebase_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Database ---
    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = lorebase_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    lorebase_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    lorebase_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");

    // --- Notifications ---
    let event_bus = Arc::new(EventBus::default());
    let email = EmailConfig::from_env().map(EmailDelivery::new);
    if email.is_none() {
        tracing::info!("SMTP_HOST not set; email notification delivery disabled");
    }
    let notifier = EventBusNotifier::new(Arc::clone(&event_bus), email);

    // --- Engine ---
    let cancel = CancellationToken::new();
    let scheduler = Arc::new(TokioScheduler::new(cancel.clone()));
    let coordinator = EditLifecycleCoordinator::new(
        Arc::new(PendingEditStore::new()),
        PgDurableEditStore::new(pool),
        notifier,
        scheduler,
    );
    tracing::info!("Edit lifecycle coordinator started");

    // --- Shutdown ---
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping scheduled tasks");
    cancel.cancel();
    drop(coordinator);
    tracing::info!("Graceful shutdown complete");

    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the worker shuts
/// down cleanly whether stopped interactively or by a process manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
