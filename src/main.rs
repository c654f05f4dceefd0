use anyhow::Context;
use sqlx::migrate::Migrator;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use orderflow::cache::OrderCache;
use orderflow::config::Config;
use orderflow::consumer::run_consumer;
use orderflow::services::OrderIngestor;
use orderflow::utils::retry::RetryPolicy;
use orderflow::{create_app, db, startup, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database pool; a failure here is fatal to the process
    let pool = db::create_pool(&config)
        .await
        .context("failed to connect to database")?;

    // Run migrations
    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("database migrations completed");

    let report = startup::validate_environment(&config, &pool).await?;
    report.print();
    if !report.is_valid() {
        anyhow::bail!("startup validation failed");
    }

    let cache = OrderCache::new(config.cache_ttl(), config.cache_max_capacity);
    let retry_policy = RetryPolicy {
        max_attempts: config.insert_max_attempts,
        initial_delay: Duration::from_millis(config.insert_initial_backoff_ms),
        max_delay: Duration::from_secs(10),
    };
    let ingestor = OrderIngestor::new(
        pool.clone(),
        cache.clone(),
        retry_policy,
        config.store_timeout(),
    );

    // Consumer task; the watch channel flips on shutdown so in-flight
    // messages drain before the task returns
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer_config = config.clone();
    let consumer_ingestor = ingestor.clone();
    let consumer_task = tokio::spawn(async move {
        run_consumer(&consumer_config, consumer_ingestor, shutdown_rx).await
    });

    let app = create_app(AppState {
        db: pool.clone(),
        cache,
        ingestor,
        store_timeout: config.store_timeout(),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    match consumer_task.await {
        Ok(Ok(())) => tracing::info!("consumer drained"),
        Ok(Err(e)) => tracing::error!(error = %e, "consumer exited with error"),
        Err(e) => tracing::error!(error = %e, "consumer task panicked"),
    }

    pool.close().await;
    tracing::info!("shut down cleanly");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to install sigterm handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
