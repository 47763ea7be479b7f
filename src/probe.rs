//! probe.rs — Execução de um probe HTTP e classificação de falhas
//!
//! Um único GET com redirects seguidos e deadline total de parede cobrindo
//! DNS, conexão, handshake TLS, envio e leitura da resposta. Latência medida
//! com relógio monotônico, em milissegundos inteiros.
//!
//! O módulo é puro em relação ao Storage: não persiste nada e não guarda
//! estado mutável compartilhado, o que o torna trivialmente paralelizável.

use crate::types::{ErrorKind, ProbeResult};
use std::time::{Duration, Instant};

/// Limite de tamanho persistível de `error_message`.
const MAX_ERROR_MESSAGE_CHARS: usize = 500;

/// Executa um probe HTTP contra `url` e classifica o desfecho.
///
/// - Resposta com status 200..=299: `up = true`, `error_kind = unknown`.
/// - Resposta com qualquer outro status: `up = false`, `error_kind = http`,
///   mensagem `"HTTP <status>"`.
/// - Falha de transporte: `up = false` e a taxonomia
///   tls/timeout/dns/connect/http/unknown, primeira regra que casar.
///
/// # Parâmetros
/// - `url`: URL absoluta http(s)
/// - `timeout_s`: deadline total do probe, em segundos
/// - `verify_tls`: se false, pula a validação do certificado do servidor
pub async fn probe_target(url: &str, timeout_s: i32, verify_tls: bool) -> ProbeResult {
    let start = Instant::now();

    // Pré-validação: a URL precisa ser absoluta e ter host.
    let has_host = url::Url::parse(url)
        .map(|parsed| parsed.host_str().is_some())
        .unwrap_or(false);
    if !has_host {
        return failure(
            start,
            None,
            ErrorKind::Unknown,
            "Invalid URL: no hostname".to_string(),
        );
    }

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_s.max(0) as u64))
        .danger_accept_invalid_certs(!verify_tls)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            let (kind, message) = classify_error(&e);
            return failure(start, None, kind, message);
        }
    };

    match client.get(url).send().await {
        Ok(response) => {
            let status = response.status();
            // O deadline cobre também a leitura do corpo; uma falha aqui
            // significa que não houve troca HTTP completa.
            if let Err(e) = response.bytes().await {
                let (kind, message) = classify_error(&e);
                return failure(start, None, kind, message);
            }

            let latency_ms = Some(elapsed_ms(start));
            let http_status = Some(i32::from(status.as_u16()));
            if status.is_success() {
                ProbeResult {
                    up: true,
                    latency_ms,
                    http_status,
                    error_kind: ErrorKind::Unknown,
                    error_message: None,
                }
            } else {
                ProbeResult {
                    up: false,
                    latency_ms,
                    http_status,
                    error_kind: ErrorKind::Http,
                    error_message: Some(format!("HTTP {}", status.as_u16())),
                }
            }
        }
        Err(e) => {
            let (kind, message) = classify_error(&e);
            failure(start, None, kind, message)
        }
    }
}

fn failure(
    start: Instant,
    http_status: Option<i32>,
    error_kind: ErrorKind,
    error_message: String,
) -> ProbeResult {
    ProbeResult {
        up: false,
        latency_ms: Some(elapsed_ms(start)),
        http_status,
        error_kind,
        error_message: Some(truncate_message(error_message)),
    }
}

fn elapsed_ms(start: Instant) -> i32 {
    start.elapsed().as_millis().min(i32::MAX as u128) as i32
}

fn truncate_message(message: String) -> String {
    if message.chars().count() <= MAX_ERROR_MESSAGE_CHARS {
        message
    } else {
        message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect()
    }
}

/// Classifica um erro do reqwest na taxonomia estável, primeira regra vence.
///
/// O reqwest embrulha a causa real numa cadeia de sources; a inspeção é
/// textual porque a causa não é exposta de forma estruturada. Falhas de
/// resolução aparecem dentro de erros de conexão, mas a cadeia as nomeia
/// ("dns error"), então `dns` é reportado em separado de `connect`.
fn classify_error(error: &reqwest::Error) -> (ErrorKind, String) {
    let chain = error_chain(error);
    // Só as causas: o Display do erro de topo inclui a URL da requisição,
    // que poderia casar com as palavras-chave (ex.: host "tls.example.com").
    let lower = cause_chain(error).to_lowercase();

    let kind = if lower.contains("certificate") || lower.contains("handshake") || lower.contains("tls") || lower.contains("ssl") {
        ErrorKind::Tls
    } else if error.is_timeout() || lower.contains("timed out") {
        ErrorKind::Timeout
    } else if lower.contains("dns error") || lower.contains("failed to lookup address") {
        ErrorKind::Dns
    } else if error.is_connect() {
        ErrorKind::Connect
    } else if error.is_redirect() || error.is_body() || error.is_decode() || error.is_status() {
        ErrorKind::Http
    } else {
        ErrorKind::Unknown
    };
    (kind, chain)
}

/// Concatena apenas as causas (sources), sem o erro de topo.
fn cause_chain(error: &dyn std::error::Error) -> String {
    let mut parts = Vec::new();
    let mut source = error.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    if parts.is_empty() {
        error.to_string()
    } else {
        parts.join(": ")
    }
}

/// Concatena a cadeia de sources num texto único para log e persistência.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Sobe um servidor de uma resposta só em loopback e devolve o endereço.
    async fn spawn_stub(response: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        addr
    }

    #[tokio::test]
    async fn probe_marks_2xx_as_up() {
        let addr = spawn_stub(
            "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
        )
        .await;

        let result = probe_target(&format!("http://{addr}/"), 5, true).await;

        assert!(result.up);
        assert_eq!(result.http_status, Some(200));
        assert_eq!(result.error_kind, ErrorKind::Unknown);
        assert_eq!(result.error_message, None);
        assert!(result.latency_ms.is_some());
    }

    #[tokio::test]
    async fn probe_marks_http_error_as_down() {
        let addr = spawn_stub(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;

        let result = probe_target(&format!("http://{addr}/"), 5, true).await;

        assert!(!result.up);
        assert_eq!(result.http_status, Some(500));
        assert_eq!(result.error_kind, ErrorKind::Http);
        assert_eq!(result.error_message.as_deref(), Some("HTTP 500"));
        assert!(result.latency_ms.is_some());
    }

    #[tokio::test]
    async fn probe_classifies_refused_connection_as_connect() {
        // Reserva uma porta livre e a libera antes do probe.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = probe_target(&format!("http://{addr}/"), 5, true).await;

        assert!(!result.up);
        assert_eq!(result.http_status, None);
        assert_eq!(result.error_kind, ErrorKind::Connect);
        assert!(result.error_message.is_some());
    }

    #[tokio::test]
    async fn probe_classifies_unresponsive_server_as_timeout() {
        // Aceita a conexão mas nunca responde.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((socket, _)) = listener.accept().await {
                tokio::time::sleep(Duration::from_secs(30)).await;
                drop(socket);
            }
        });

        let result = probe_target(&format!("http://{addr}/"), 1, true).await;

        assert!(!result.up);
        assert_eq!(result.http_status, None);
        assert_eq!(result.error_kind, ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn probe_rejects_url_without_hostname() {
        let result = probe_target("http://", 5, true).await;

        assert!(!result.up);
        assert_eq!(result.http_status, None);
        assert_eq!(result.error_kind, ErrorKind::Unknown);
        assert_eq!(result.error_message.as_deref(), Some("Invalid URL: no hostname"));
        assert!(result.latency_ms.is_some());
    }

    #[test]
    fn long_messages_are_truncated_for_persistence() {
        let truncated = truncate_message("x".repeat(800));
        assert_eq!(truncated.chars().count(), MAX_ERROR_MESSAGE_CHARS);
    }
}
