// src/main.rs
mod api;
mod auth;
mod config;
mod probe;
mod retention;
mod scheduler;
mod storage;
mod types;

use anyhow::Result;
use std::sync::Arc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings: Arc<config::Settings> = Arc::new(config::Settings::load()?);
    if let Err(e) = settings.validate() {
        anyhow::bail!("Configuração inválida: {e}");
    }

    // Pool dimensionado para os probes simultâneos mais as sessões da API.
    let storage: Arc<storage::Storage> = Arc::new(storage::Storage::connect(
        &settings.database_url,
        settings.concurrency + 4,
    )?);
    storage.init().await?;

    let enabled = storage.list_enabled_targets().await?;
    info!("{} targets habilitados no banco", enabled.len());

    let shutdown = CancellationToken::new();

    let scheduler_handle = task::spawn(scheduler::run_scheduler(
        Arc::clone(&storage),
        Arc::clone(&settings),
        shutdown.clone(),
    ));
    let retention_handle = task::spawn(retention::run_retention(
        Arc::clone(&storage),
        Arc::clone(&settings),
        shutdown.clone(),
    ));

    let state = api::AppState {
        storage: Arc::clone(&storage),
        settings: Arc::clone(&settings),
    };
    let app = api::router(state);

    let addr = format!("{}:{}", settings.app_host, settings.app_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API escutando em {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Encerramento ordenado: cancela os loops, aguarda os probes em voo
    // terminarem e só então fecha o pool.
    shutdown.cancel();
    for handle in [scheduler_handle, retention_handle] {
        if let Err(e) = handle.await {
            error!("loop de background abortou: {e:?}");
        }
    }
    storage.close();

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Sinal de encerramento recebido, finalizando");
}
