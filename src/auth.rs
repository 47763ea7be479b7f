//! auth.rs — Autenticação de usuário único e mascaramento de URL
//!
//! A sessão é um cookie assinado com HMAC-SHA256 no formato
//! `<expiração unix>.<mac em hex>`; não existe estado de sessão no servidor.
//! Credenciais são comparadas em tempo constante sobre digests de tamanho
//! fixo, para não vazar nem o conteúdo nem o comprimento configurado.

use crate::config::Settings;
use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Nome do cookie de sessão.
pub const SESSION_COOKIE: &str = "uptime_session";

/// Compara usuário e senha com os valores configurados, em tempo constante.
pub fn verify_credentials(username: &str, password: &str, settings: &Settings) -> bool {
    let username_ok = Sha256::digest(username.as_bytes())
        .as_slice()
        .ct_eq(Sha256::digest(settings.auth_username.as_bytes()).as_slice());
    let password_ok = Sha256::digest(password.as_bytes())
        .as_slice()
        .ct_eq(Sha256::digest(settings.auth_password.as_bytes()).as_slice());
    bool::from(username_ok & password_ok)
}

/// Assina o instante de expiração com o segredo da sessão.
fn sign(secret: &str, expires_unix: i64) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC aceita chave de qualquer tamanho");
    mac.update(b"authenticated:");
    mac.update(expires_unix.to_string().as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Valor de sessão recém-emitido: `<expiração>.<mac>`.
fn session_value(settings: &Settings) -> String {
    let expires = Utc::now().timestamp() + settings.session_max_age;
    let mac = sign(&settings.session_secret_key, expires);
    format!("{expires}.{mac}")
}

/// Verifica assinatura e validade de um valor de sessão.
fn session_value_is_valid(value: &str, secret: &str) -> bool {
    let Some((expires_text, mac)) = value.split_once('.') else {
        return false;
    };
    let Ok(expires) = expires_text.parse::<i64>() else {
        return false;
    };
    let expected = sign(secret, expires);
    let signature_ok = bool::from(mac.as_bytes().ct_eq(expected.as_bytes()));
    signature_ok && expires > Utc::now().timestamp()
}

/// Header `Set-Cookie` de login.
pub fn issue_session_cookie(settings: &Settings) -> String {
    format!(
        "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session_value(settings),
        settings.session_max_age
    )
}

/// Header `Set-Cookie` de logout (expira o cookie imediatamente).
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

fn session_cookie_value(headers: &HeaderMap) -> Option<&str> {
    let cookies = headers.get(COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix(SESSION_COOKIE)?.strip_prefix('='))
}

/// Predicado de autenticação da requisição.
///
/// Com `auth_enabled = false` toda requisição conta como autenticada.
pub fn is_authenticated(headers: &HeaderMap, settings: &Settings) -> bool {
    if !settings.auth_enabled {
        return true;
    }
    session_cookie_value(headers)
        .map(|value| session_value_is_valid(value, &settings.session_secret_key))
        .unwrap_or(false)
}

/// Mascara uma URL para leitores não autenticados: esquema preservado,
/// netloc reduzido ao primeiro caractere + `***`, caminho vira `/***`,
/// query e fragment descartados. Sem host, retorna `***` literal.
///
/// O netloc é a autoridade completa (`[user[:senha]@]host[:porta]`);
/// credenciais embutidas contam para o primeiro caractere mascarado.
pub fn mask_url(url: &str) -> String {
    let Ok(parsed) = url::Url::parse(url) else {
        return "***".to_string();
    };
    let Some(host) = parsed.host_str() else {
        return "***".to_string();
    };

    let mut netloc = String::new();
    let username = parsed.username();
    if !username.is_empty() || parsed.password().is_some() {
        netloc.push_str(username);
        if let Some(password) = parsed.password() {
            netloc.push(':');
            netloc.push_str(password);
        }
        netloc.push('@');
    }
    netloc.push_str(host);
    if let Some(port) = parsed.port() {
        netloc.push_str(&format!(":{port}"));
    }

    let mut chars = netloc.chars();
    let masked_host = match (chars.next(), chars.next()) {
        (Some(first), Some(_)) => format!("{first}***"),
        (Some(_), None) => "*".to_string(),
        (None, _) => return "***".to_string(),
    };
    format!("{}://{}/***", parsed.scheme(), masked_host)
}
