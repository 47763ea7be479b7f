//! types.rs — Modelos de dados do monitor de disponibilidade
//!
//! Representação fiel e idiomática do schema PostgreSQL (targets e checks).
//! Inclui o enum `ErrorKind` para a taxonomia estável de falhas de probe,
//! além das structs prontas para persistência e serialização JSON.
//!
//! # Exemplo de uso
//! ```rust
//! use crate::types::ErrorKind;
//! assert_eq!(ErrorKind::from("timeout"), ErrorKind::Timeout);
//! assert_eq!(ErrorKind::Timeout.as_str(), "timeout");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_postgres::Row;
use uuid::Uuid;

/// Taxonomia de falhas de probe (coluna `checks.error_kind`).
///
/// Persistido como texto, exatamente como serializado no JSON da API.
/// `Unknown` é o valor neutro usado em probes bem-sucedidos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Dns,
    Connect,
    Tls,
    Timeout,
    Http,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Dns => "dns",
            ErrorKind::Connect => "connect",
            ErrorKind::Tls => "tls",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Http => "http",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ErrorKind {
    /// Conversão tolerante: valores fora da taxonomia viram `Unknown`.
    fn from(s: &str) -> Self {
        match s {
            "dns" => ErrorKind::Dns,
            "connect" => ErrorKind::Connect,
            "tls" => ErrorKind::Tls,
            "timeout" => ErrorKind::Timeout,
            "http" => ErrorKind::Http,
            _ => ErrorKind::Unknown,
        }
    }
}

/// Struct de alvo monitorado (tabela `targets`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub enabled: bool,
    /// Espaçamento mínimo entre probes, em segundos (10..=3600).
    pub interval_s: i32,
    /// Deadline total de cada probe, em segundos (1..=30).
    pub timeout_s: i32,
    pub verify_tls: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Row> for Target {
    fn from(row: Row) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            url: row.get("url"),
            enabled: row.get("enabled"),
            interval_s: row.get("interval_s"),
            timeout_s: row.get("timeout_s"),
            verify_tls: row.get("verify_tls"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

/// Struct de resultado registrado de um probe (tabela `checks`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Check {
    pub id: Uuid,
    pub target_id: Uuid,
    pub checked_at: DateTime<Utc>,
    pub up: bool,
    pub latency_ms: Option<i32>,
    pub http_status: Option<i32>,
    pub error_kind: ErrorKind,
    pub error_message: Option<String>,
}

impl Check {
    /// Monta um `Check` pronto para persistência a partir de um `ProbeResult`.
    pub fn from_probe(target_id: Uuid, checked_at: DateTime<Utc>, result: ProbeResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_id,
            checked_at,
            up: result.up,
            latency_ms: result.latency_ms,
            http_status: result.http_status,
            error_kind: result.error_kind,
            error_message: result.error_message,
        }
    }
}

impl From<Row> for Check {
    fn from(row: Row) -> Self {
        let kind: String = row.get("error_kind");
        Self {
            id: row.get("id"),
            target_id: row.get("target_id"),
            checked_at: row.get("checked_at"),
            up: row.get("up"),
            latency_ms: row.get("latency_ms"),
            http_status: row.get("http_status"),
            error_kind: ErrorKind::from(kind.as_str()),
            error_message: row.get("error_message"),
        }
    }
}

/// Campos necessários para criar um target.
#[derive(Debug, Clone)]
pub struct NewTarget {
    pub name: String,
    pub url: String,
    pub enabled: bool,
    pub interval_s: i32,
    pub timeout_s: i32,
    pub verify_tls: bool,
}

/// Atualização parcial de um target: `None` preserva o valor atual.
#[derive(Debug, Clone, Default)]
pub struct TargetPatch {
    pub name: Option<String>,
    pub url: Option<String>,
    pub enabled: Option<bool>,
    pub interval_s: Option<i32>,
    pub timeout_s: Option<i32>,
    pub verify_tls: Option<bool>,
}

/// Resultado observável de um único probe HTTP (ainda não persistido).
///
/// Invariantes espelhadas em `checks`:
/// - `up == true` implica `http_status` em 200..=299, `error_kind == Unknown`
///   e `error_message == None`;
/// - `up == false` implica `error_kind != Unknown` ou `error_message` presente.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub up: bool,
    pub latency_ms: Option<i32>,
    pub http_status: Option<i32>,
    pub error_kind: ErrorKind,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_round_trips_through_text() {
        for kind in [
            ErrorKind::Dns,
            ErrorKind::Connect,
            ErrorKind::Tls,
            ErrorKind::Timeout,
            ErrorKind::Http,
            ErrorKind::Unknown,
        ] {
            assert_eq!(ErrorKind::from(kind.as_str()), kind);
        }
    }

    #[test]
    fn error_kind_unrecognized_text_falls_back_to_unknown() {
        assert_eq!(ErrorKind::from("ssl"), ErrorKind::Unknown);
        assert_eq!(ErrorKind::from(""), ErrorKind::Unknown);
    }

    #[test]
    fn check_from_probe_copies_observable_fields() {
        let target_id = Uuid::new_v4();
        let now = Utc::now();
        let check = Check::from_probe(
            target_id,
            now,
            ProbeResult {
                up: false,
                latency_ms: Some(120),
                http_status: Some(503),
                error_kind: ErrorKind::Http,
                error_message: Some("HTTP 503".to_string()),
            },
        );

        assert_eq!(check.target_id, target_id);
        assert_eq!(check.checked_at, now);
        assert!(!check.up);
        assert_eq!(check.latency_ms, Some(120));
        assert_eq!(check.http_status, Some(503));
        assert_eq!(check.error_kind, ErrorKind::Http);
        assert_eq!(check.error_message.as_deref(), Some("HTTP 503"));
    }
}
