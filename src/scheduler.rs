// src/scheduler.rs

//! Scheduler de probes — loop de varredura e despacho
//!
//! Orquestra os ciclos de monitoramento: descobre os targets devidos a cada
//! tick, dispara os probes sob o limite global de concorrência e persiste
//! cada Check em sessão própria, para que o rollback de um target não
//! contamine a escrita de outro.
//!
//! - A cada tick, uma única consulta traz os targets habilitados com o
//!   horário do último check; o filtro de "devido" roda em código.
//! - Falha em um target é logada com o target_id e não derruba o ciclo.
//! - O cancelamento só é observado entre ciclos: probes em voo sempre são
//!   aguardados antes do loop encerrar.

use crate::config::Settings;
use crate::probe;
use crate::storage::{Storage, StoreError};
use crate::types::{Check, Target};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Intervalo entre varreduras de targets devidos.
const TICK: Duration = Duration::from_secs(60);

/// Regra de target devido: nunca checado, ou último check há pelo menos
/// `interval_s` segundos. O intervalo é espaçamento mínimo, não período
/// estrito; ciclos longos se recuperam naturalmente na varredura seguinte.
fn filter_due(rows: Vec<(Target, Option<DateTime<Utc>>)>, now: DateTime<Utc>) -> Vec<Target> {
    rows.into_iter()
        .filter(|(target, last_checked)| match last_checked {
            None => true,
            Some(last) => (now - *last).num_seconds() >= i64::from(target.interval_s),
        })
        .map(|(target, _)| target)
        .collect()
}

/// Executa um ciclo: carrega os devidos e dispara os probes sob o semáforo.
///
/// Cada task adquire uma permissão, executa o probe, grava o Check na sua
/// própria sessão e libera a permissão. Todas as tasks são aguardadas antes
/// do retorno.
pub async fn run_checks(storage: &Arc<Storage>, concurrency: usize) -> Result<(), StoreError> {
    let rows = storage.list_targets_with_last_check().await?;
    let due = filter_due(rows, Utc::now());
    if due.is_empty() {
        return Ok(());
    }
    debug!("{} targets devidos neste ciclo", due.len());

    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut handles = Vec::with_capacity(due.len());
    for target in due {
        let storage = Arc::clone(storage);
        let semaphore = Arc::clone(&semaphore);
        handles.push(tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            let result =
                probe::probe_target(&target.url, target.timeout_s, target.verify_tls).await;
            let check = Check::from_probe(target.id, Utc::now(), result);
            if let Err(e) = storage.insert_check(&check).await {
                error!(target_id = %target.id, "falha ao persistir check: {e}");
            }
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            error!("task de probe abortou: {e}");
        }
    }
    Ok(())
}

/// Loop principal do scheduler.
///
/// Roda um ciclo por tick até o token de cancelamento disparar. Erros de
/// consulta são logados e o loop continua no próximo tick.
pub async fn run_scheduler(
    storage: Arc<Storage>,
    settings: Arc<Settings>,
    shutdown: CancellationToken,
) {
    let mut ticker = interval(TICK);
    info!(
        "scheduler iniciado (concorrência máxima: {})",
        settings.concurrency
    );

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("scheduler encerrando");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = run_checks(&storage, settings.concurrency).await {
                    error!("falha na varredura de targets devidos: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn target(interval_s: i32) -> Target {
        let now = Utc::now();
        Target {
            id: Uuid::new_v4(),
            name: "Example".to_string(),
            url: "https://example.com".to_string(),
            enabled: true,
            interval_s,
            timeout_s: 5,
            verify_tls: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn never_checked_target_is_due() {
        let now = Utc::now();
        let due = filter_due(vec![(target(60), None)], now);
        assert_eq!(due.len(), 1);
    }

    #[test]
    fn recently_checked_target_is_not_due() {
        let now = Utc::now();
        let last = now - chrono::Duration::seconds(30);
        let due = filter_due(vec![(target(60), Some(last))], now);
        assert!(due.is_empty());
    }

    #[test]
    fn stale_target_is_due() {
        let now = Utc::now();
        let last = now - chrono::Duration::seconds(61);
        let due = filter_due(vec![(target(60), Some(last))], now);
        assert_eq!(due.len(), 1);
    }

    #[test]
    fn interval_is_inclusive_at_the_boundary() {
        let now = Utc::now();
        let last = now - chrono::Duration::seconds(60);
        let due = filter_due(vec![(target(60), Some(last))], now);
        assert_eq!(due.len(), 1);
    }
}
