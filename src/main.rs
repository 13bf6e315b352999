use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use heyday::app::jobs::{EnqueueJob, JobScheduler, PreCalculateJob, RecoverySweepJob};
use heyday::app::queue::{self, Publisher, WorkerPool};
use heyday::app::resilience::{CircuitBreaker, DeliveryEnvelope, RetryPolicy};
use heyday::app::services::delivery_service::DeliveryService;
use heyday::app::services::metrics;
use heyday::app::strategies::StrategyRegistry;
use heyday::{config, create_app, database, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "heyday=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Bad config is fatal; nothing below runs with a half-read environment.
    let config = config::Config::from_env()?;

    let pool = database::create_pool(&config)?;
    database::run_migrations(&pool)?;

    let prometheus = metrics::install_recorder()?;

    let registry = Arc::new(StrategyRegistry::with_builtins());
    tracing::info!(kinds = ?registry.known_types(), "Strategies registered");

    let connection = queue::connect(&config.broker).await?;
    let ops_channel = connection.create_channel().await?;
    queue::topology::declare(&ops_channel).await?;
    let publisher = Arc::new(Publisher::new(&connection).await?);

    let shutdown = CancellationToken::new();

    let breaker = Arc::new(CircuitBreaker::new(config.circuit_breaker.clone()));
    let delivery = DeliveryService::new(config.delivery.clone())?;
    let envelope = DeliveryEnvelope::new(
        delivery,
        breaker.clone(),
        config.circuit_breaker.call_timeout,
    );
    let policy = RetryPolicy::from_config(&config.queue);

    let workers = WorkerPool::new(
        &connection,
        pool.clone(),
        envelope,
        policy,
        config.queue.concurrency,
        shutdown.clone(),
    )
    .await?;
    let worker_handle = tokio::spawn(async move {
        if let Err(e) = workers.run().await {
            tracing::error!(error = %e, "Worker pool exited with error");
        }
    });

    let mut scheduler = JobScheduler::new(shutdown.clone());
    let last_runs = scheduler.last_runs();
    scheduler.register(
        Arc::new(PreCalculateJob::new(pool.clone(), registry.clone())),
        &config.schedule.daily,
    )?;
    scheduler.register(
        Arc::new(EnqueueJob::new(pool.clone(), publisher.clone())),
        &config.schedule.minute,
    )?;
    scheduler.register(
        Arc::new(RecoverySweepJob::new(
            pool.clone(),
            publisher.clone(),
            config.schedule.recovery_grace,
        )),
        &config.schedule.recovery,
    )?;

    let state = AppState {
        pool,
        prometheus,
        breaker,
        last_runs,
        ops_channel,
    };
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&config.server_addr()).await?;
    tracing::info!("Server running on {}", config.server_addr());

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, draining");
        signal_token.cancel();
    });

    let serve_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { serve_token.cancelled().await })
        .await?;

    // Drain: job loops finish their tick, workers finish in-flight
    // messages, then the broker connection closes. Unacked deliveries
    // redeliver after the close.
    let drain = Duration::from_secs(config.app.shutdown_timeout_seconds);
    scheduler.join(drain).await;
    if tokio::time::timeout(drain, worker_handle).await.is_err() {
        tracing::warn!("Worker pool did not drain before the shutdown deadline");
    }
    connection.close(0, "shutdown").await.ok();

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
