use std::{sync::Arc, time::Duration};

use clap::Parser;
use engine::sync::{
    PlaidEnvironment, PlaidFeed, Reconciler, RetryPolicy, SyncHandler, SyncQueue, SyncWorker,
    TokenCipher,
};
use migration::{Migrator, MigratorTrait};
use settings::Database;
use tokio_util::sync::CancellationToken;

mod settings;

/// Household ledger: HTTP API and bank-feed reconciliation.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Settings file, without extension.
    #[arg(long, env = "HOUSEHOLD_CONFIG", default_value = "settings")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let settings = settings::Settings::new(&cli.config)?;
    let mut tasks = tokio::task::JoinSet::new();
    let shutdown = CancellationToken::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "household={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(settings.database.as_ref().unwrap_or(&Database::Memory)).await?;

    let mut builder = engine::Engine::builder().database(db);
    match settings.encryption_key.as_deref() {
        Some(key) => builder = builder.cipher(TokenCipher::from_config(key)?),
        None => tracing::warn!("no encryption key configured, linked sources are disabled"),
    }
    let engine = Arc::new(builder.build().await?);

    let (queue, receiver) = SyncQueue::channel(settings.sync.queue_capacity);
    if let Some(plaid) = settings.plaid {
        tracing::info!("Found plaid settings...");
        let environment = plaid
            .environment
            .as_deref()
            .map(PlaidEnvironment::from_name)
            .unwrap_or_default();
        let feed = PlaidFeed::new(
            reqwest::Client::new(),
            environment,
            plaid.client_id,
            plaid.secret,
        );
        let reconciler = Reconciler::new(Arc::clone(&engine), Arc::new(feed))
            .max_pages(settings.sync.max_pages);
        let retry = RetryPolicy::new(
            settings.sync.max_attempts,
            settings.sync.base_delay_ms,
            settings.sync.max_delay_ms,
            0.2,
        );
        let worker = SyncWorker::new(SyncHandler::new(Arc::new(reconciler), retry), receiver)
            .concurrency(settings.sync.concurrency);
        tasks.spawn(worker.run(shutdown.clone()));
    } else {
        tracing::warn!("no plaid settings, reconciliation requests will be rejected");
        drop(receiver);
    }

    if let Some(server) = settings.server {
        tracing::info!("Found server settings...");
        let bind = server.bind.unwrap_or_else(|| "127.0.0.1".to_string());
        let addr = format!("{}:{}", bind, server.port);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let state = server::ServerState {
            engine: Arc::clone(&engine),
            queue,
            request_timeout: Duration::from_millis(server.request_timeout_ms),
        };
        let token = shutdown.clone();
        tasks.spawn(async move {
            if let Err(err) = server::run_with_listener(state, listener, token).await {
                tracing::error!("server failed: {err}");
            }
        });
    }

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
        }
        signal.cancel();
    });

    // The first task to stop takes the others down with it.
    if tasks.join_next().await.is_some() {
        shutdown.cancel();
    }
    while tasks.join_next().await.is_some() {}

    Ok(())
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
