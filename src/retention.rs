//! retention.rs — Garbage collector da janela de retenção
//!
//! Loop lento e independente do scheduler: a cada período remove os checks
//! mais antigos que `retention_days`. Falhas são logadas; o próximo tick
//! tenta de novo. Targets nunca são tocados.

use crate::config::Settings;
use crate::storage::Storage;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Período entre passadas de limpeza.
const PERIOD: Duration = Duration::from_secs(6 * 3600);

/// Loop do GC de retenção.
pub async fn run_retention(
    storage: Arc<Storage>,
    settings: Arc<Settings>,
    shutdown: CancellationToken,
) {
    let mut ticker = interval(PERIOD);
    info!(
        "GC de retenção iniciado (janela de {} dias)",
        settings.retention_days
    );

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("GC de retenção encerrando");
                break;
            }
            _ = ticker.tick() => {
                let cutoff = Utc::now() - ChronoDuration::days(settings.retention_days);
                match storage.delete_checks_before(cutoff).await {
                    Ok(0) => {}
                    Ok(deleted) => info!("retenção removeu {deleted} checks anteriores a {cutoff}"),
                    Err(e) => error!("falha na passada de retenção: {e}"),
                }
            }
        }
    }
}
