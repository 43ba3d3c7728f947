//! Command-line entry point. `serve` runs the ingress HTTP server together
//! with the reconciler and outbox worker loops; `reconcile` and `work` run
//! a single stage standalone (useful for scaling them independently);
//! `migrate` just applies pending SQL migrations.

use std::sync::Arc;

use altegio_bot::common::SystemClock;
use altegio_bot::config::WhatsappProvider;
use altegio_bot::planner::AllowAll;
use altegio_bot::provider::{DummyProvider, MetaCloudOptions, MetaCloudProvider, Provider};
use altegio_bot::reconciler::Reconciler;
use altegio_bot::server::build_app;
use altegio_bot::service::Service;
use altegio_bot::worker::OutboxWorker;
use altegio_bot::{Config, Store};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "altegio-bot")]
#[command(about = "Outbound booking-message pipeline for Altegio + WhatsApp")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingress HTTP server, reconciler, and outbox worker together.
    Serve,
    /// Run only the reconciler loop.
    Reconcile,
    /// Run only the outbox worker loop.
    Work,
    /// Apply pending SQL migrations and exit.
    Migrate,
}

fn init_logging(filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn build_provider(config: &Config) -> Arc<dyn Provider> {
    match config.whatsapp_provider {
        WhatsappProvider::Dummy => Arc::new(DummyProvider),
        WhatsappProvider::MetaCloud => Arc::new(MetaCloudProvider::new(MetaCloudOptions {
            access_token: config
                .whatsapp_access_token
                .clone()
                .unwrap_or_default(),
            graph_url: config.whatsapp_graph_url.clone(),
            api_version: config.whatsapp_api_version.clone(),
            allow_real_send: config.allow_real_send,
        })),
    }
}

async fn shutdown_signal() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        child.cancel();
    });
    token
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;
    init_logging(&config.log_filter);

    let store = Store::connect(&config.database_url).await?;

    if matches!(cli.command, Commands::Migrate) {
        tracing::info!("running migrations");
        store.migrate().await?;
        tracing::info!("migrations complete");
        return Ok(());
    }

    store.migrate().await?;

    let config = Arc::new(config);
    let clock = Arc::new(SystemClock);
    let shutdown = shutdown_signal().await;

    match cli.command {
        Commands::Migrate => unreachable!("handled above"),

        Commands::Serve => {
            let reconciler = Reconciler::new(
                store.pool().clone(),
                clock.clone(),
                Arc::new(AllowAll),
                config.reconciler_batch_size,
                config.reconciler_poll_interval_ms,
            );
            let worker = OutboxWorker::new(
                store.pool().clone(),
                clock.clone(),
                build_provider(&config),
                config.outbox_batch_size,
                config.outbox_poll_interval_ms,
                config.stop_worker_on_token_expired,
            );

            let app = build_app(store, config.clone());
            let addr = format!("0.0.0.0:{}", config.port);
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            tracing::info!(%addr, "listening");

            let server_shutdown = shutdown.clone();
            let server = tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
                    .await
                    .context("server error")
            });

            let reconciler_shutdown = shutdown.clone();
            let reconciler_task = tokio::spawn(async move {
                Box::new(reconciler).run(reconciler_shutdown).await
            });

            let worker_shutdown = shutdown.clone();
            let worker_task =
                tokio::spawn(async move { Box::new(worker).run(worker_shutdown).await });

            let (server_res, reconciler_res, worker_res) =
                tokio::join!(server, reconciler_task, worker_task);
            server_res.context("server task panicked")??;
            reconciler_res.context("reconciler task panicked")??;
            worker_res.context("worker task panicked")??;
        }

        Commands::Reconcile => {
            let reconciler = Reconciler::new(
                store.pool().clone(),
                clock,
                Arc::new(AllowAll),
                config.reconciler_batch_size,
                config.reconciler_poll_interval_ms,
            );
            Box::new(reconciler).run(shutdown).await?;
        }

        Commands::Work => {
            let worker = OutboxWorker::new(
                store.pool().clone(),
                clock,
                build_provider(&config),
                config.outbox_batch_size,
                config.outbox_poll_interval_ms,
                config.stop_worker_on_token_expired,
            );
            Box::new(worker).run(shutdown).await?;
        }
    }

    Ok(())
}
