use anyhow::Context;
use registry_poller::config::RegistryConfig;
use registry_poller::{HttpBankClient, PgJobStore, Poller, TracingNotifier, setup_database};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,registry_poller=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().compact())
        .init();

    let config = RegistryConfig::load().context("can't load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .context("can't connect to database")?;

    setup_database(&pool)
        .await
        .context("can't run database migrations")?;

    let bank = HttpBankClient::with_timeout(&config.bank.url, config.bank.timeout())
        .context("can't create bank client")?;

    let poller = Poller::new(
        PgJobStore::new(pool.clone()),
        Arc::new(bank),
        Arc::new(TracingNotifier),
    )
    .num_workers(config.poller.num_workers)
    .poll_interval(config.poller.poll_interval());

    let handle = poller.start();
    info!(workers = handle.num_workers(), "Poller started");

    shutdown_signal().await;

    info!("Shutting down…");
    handle.close().await;
    pool.close().await;
    info!("Poller stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
