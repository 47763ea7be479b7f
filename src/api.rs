//! api.rs — Superfície REST do serviço
//!
//! Handlers axum compondo leituras do Storage nas visões de status,
//! histórico e disponibilidade, mais o CRUD de targets atrás do gate de
//! autenticação. Validação dos ranges do modelo responde 422; os corpos de
//! erro seguem o formato `{"detail": ...}`.

use crate::auth;
use crate::config::Settings;
use crate::storage::{Storage, StoreError};
use crate::types::{Check, ErrorKind, NewTarget, Target, TargetPatch};
use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Estado compartilhado dos handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    pub settings: Arc<Settings>,
}

/// Erros traduzidos para respostas HTTP.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Target not found")]
    NotFound,
    #[error("Authentication required")]
    AuthRequired,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::Validation(message) => (StatusCode::UNPROCESSABLE_ENTITY, message.clone()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Target not found".to_string()),
            ApiError::AuthRequired => {
                (StatusCode::UNAUTHORIZED, "Authentication required".to_string())
            }
            ApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
            }
            ApiError::Store(e) => {
                tracing::error!("erro de persistência na API: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Schemas de requisição e resposta
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TargetCreate {
    name: String,
    url: String,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_interval_s")]
    interval_s: i32,
    #[serde(default = "default_timeout_s")]
    timeout_s: i32,
    #[serde(default = "default_true")]
    verify_tls: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct TargetUpdate {
    name: Option<String>,
    url: Option<String>,
    enabled: Option<bool>,
    interval_s: Option<i32>,
    timeout_s: Option<i32>,
    verify_tls: Option<bool>,
}

fn default_true() -> bool {
    true
}

fn default_interval_s() -> i32 {
    60
}

fn default_timeout_s() -> i32 {
    10
}

#[derive(Debug, Serialize)]
pub struct TargetResponse {
    id: Uuid,
    name: String,
    url: String,
    enabled: bool,
    interval_s: i32,
    timeout_s: i32,
    verify_tls: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TargetResponse {
    /// Converte um target, mascarando a URL para leitores não autenticados.
    fn from_target(target: Target, authenticated: bool) -> Self {
        let url = if authenticated {
            target.url
        } else {
            auth::mask_url(&target.url)
        };
        Self {
            id: target.id,
            name: target.name,
            url,
            enabled: target.enabled,
            interval_s: target.interval_s,
            timeout_s: target.timeout_s,
            verify_tls: target.verify_tls,
            created_at: target.created_at,
            updated_at: target.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    id: Uuid,
    target_id: Uuid,
    checked_at: DateTime<Utc>,
    up: bool,
    latency_ms: Option<i32>,
    http_status: Option<i32>,
    error_type: ErrorKind,
    error_message: Option<String>,
}

impl From<Check> for CheckResponse {
    fn from(check: Check) -> Self {
        Self {
            id: check.id,
            target_id: check.target_id,
            checked_at: check.checked_at,
            up: check.up,
            latency_ms: check.latency_ms,
            http_status: check.http_status,
            error_type: check.error_kind,
            error_message: check.error_message,
        }
    }
}

/// Linha da visão de status: target + último check, ou tudo nulo se o
/// target nunca foi checado.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    target_id: Uuid,
    name: String,
    url: String,
    up: Option<bool>,
    last_checked: Option<DateTime<Utc>>,
    latency_ms: Option<i32>,
    http_status: Option<i32>,
    error_type: Option<ErrorKind>,
    error_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UptimeResponse {
    target_id: Uuid,
    name: String,
    uptime_percentage: f64,
    total_checks: i64,
    up_checks: i64,
    down_checks: i64,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct DailyUptimeResponse {
    date: NaiveDate,
    uptime_percentage: f64,
    total_checks: i64,
    up_checks: i64,
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    app_timezone: String,
}

#[derive(Debug, Serialize)]
pub struct AuthStatusResponse {
    authenticated: bool,
    auth_enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub struct HoursQuery {
    #[serde(default = "default_hours")]
    hours: i64,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_hours")]
    hours: i64,
    target_id: Option<String>,
    up: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DaysQuery {
    #[serde(default = "default_days")]
    days: i64,
}

fn default_hours() -> i64 {
    24
}

fn default_days() -> i64 {
    30
}

// ---------------------------------------------------------------------------
// Validação
// ---------------------------------------------------------------------------

fn validate_name(name: &str) -> Result<(), ApiError> {
    let len = name.chars().count();
    if len == 0 || len > 255 {
        return Err(ApiError::Validation(
            "name must be between 1 and 255 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_url(url_text: &str) -> Result<(), ApiError> {
    if url_text.chars().count() > 2048 {
        return Err(ApiError::Validation(
            "url must be at most 2048 characters".to_string(),
        ));
    }
    let parsed = url::Url::parse(url_text)
        .map_err(|_| ApiError::Validation("url must be a valid absolute URL".to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::Validation(
            "url scheme must be http or https".to_string(),
        ));
    }
    if parsed.host_str().is_none() {
        return Err(ApiError::Validation("url must have a host".to_string()));
    }
    Ok(())
}

fn validate_range(name: &str, value: i64, min: i64, max: i64) -> Result<i64, ApiError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ApiError::Validation(format!(
            "{name} must be between {min} and {max}"
        )))
    }
}

fn validate_interval_s(value: i32) -> Result<(), ApiError> {
    validate_range("interval_s", i64::from(value), 10, 3600).map(|_| ())
}

fn validate_timeout_s(value: i32) -> Result<(), ApiError> {
    validate_range("timeout_s", i64::from(value), 1, 30).map(|_| ())
}

/// Um id de path que não é UUID se comporta como target inexistente.
fn parse_target_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound)
}

fn parse_optional_target_id(raw: Option<&str>) -> Result<Option<Uuid>, ApiError> {
    match raw {
        None | Some("") => Ok(None),
        Some(text) => Uuid::parse_str(text)
            .map(Some)
            .map_err(|_| ApiError::Validation("target_id must be a valid UUID".to_string())),
    }
}

fn require_authenticated(headers: &HeaderMap, settings: &Settings) -> Result<(), ApiError> {
    if auth::is_authenticated(headers, settings) {
        Ok(())
    } else {
        Err(ApiError::AuthRequired)
    }
}

// ---------------------------------------------------------------------------
// Composição das visões de disponibilidade
// ---------------------------------------------------------------------------

fn uptime_percentage(total: i64, up: i64) -> f64 {
    if total > 0 {
        up as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Preenche os últimos `days` dias-calendário UTC, do mais antigo para o
/// mais novo. Dia sem nenhum check reporta 100.0.
fn build_daily(
    buckets: Vec<(NaiveDate, i64, i64)>,
    days: i64,
    today: NaiveDate,
) -> Vec<DailyUptimeResponse> {
    let by_day: HashMap<NaiveDate, (i64, i64)> = buckets
        .into_iter()
        .map(|(day, total, up)| (day, (total, up)))
        .collect();

    (0..days)
        .rev()
        .map(|offset| {
            let date = today - ChronoDuration::days(offset);
            let (total_checks, up_checks) = by_day.get(&date).copied().unwrap_or((0, 0));
            let pct = if total_checks > 0 {
                round2(uptime_percentage(total_checks, up_checks))
            } else {
                100.0
            };
            DailyUptimeResponse {
                date,
                uptime_percentage: pct,
                total_checks,
                up_checks,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        app_timezone: state.settings.app_timezone.clone(),
    })
}

async fn auth_me(State(state): State<AppState>, headers: HeaderMap) -> Json<AuthStatusResponse> {
    Json(AuthStatusResponse {
        authenticated: auth::is_authenticated(&headers, &state.settings),
        auth_enabled: state.settings.auth_enabled,
    })
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    if !auth::verify_credentials(&body.username, &body.password, &state.settings) {
        return Err(ApiError::InvalidCredentials);
    }
    let cookie = auth::issue_session_cookie(&state.settings);
    Ok((
        [(SET_COOKIE, cookie)],
        Json(AuthStatusResponse {
            authenticated: true,
            auth_enabled: state.settings.auth_enabled,
        }),
    )
        .into_response())
}

async fn logout(State(state): State<AppState>) -> Response {
    (
        [(SET_COOKIE, auth::clear_session_cookie())],
        Json(AuthStatusResponse {
            authenticated: false,
            auth_enabled: state.settings.auth_enabled,
        }),
    )
        .into_response()
}

async fn list_targets(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<TargetResponse>>, ApiError> {
    let authenticated = auth::is_authenticated(&headers, &state.settings);
    let targets = state.storage.list_targets().await?;
    Ok(Json(
        targets
            .into_iter()
            .map(|target| TargetResponse::from_target(target, authenticated))
            .collect(),
    ))
}

async fn create_target(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<TargetCreate>,
) -> Result<Response, ApiError> {
    require_authenticated(&headers, &state.settings)?;
    validate_name(&body.name)?;
    validate_url(&body.url)?;
    validate_interval_s(body.interval_s)?;
    validate_timeout_s(body.timeout_s)?;

    let target = state
        .storage
        .create_target(&NewTarget {
            name: body.name,
            url: body.url,
            enabled: body.enabled,
            interval_s: body.interval_s,
            timeout_s: body.timeout_s,
            verify_tls: body.verify_tls,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(TargetResponse::from_target(target, true)),
    )
        .into_response())
}

async fn get_target(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<TargetResponse>, ApiError> {
    let id = parse_target_id(&id)?;
    let authenticated = auth::is_authenticated(&headers, &state.settings);
    let target = state.storage.get_target(id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(TargetResponse::from_target(target, authenticated)))
}

async fn update_target(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<TargetUpdate>,
) -> Result<Json<TargetResponse>, ApiError> {
    require_authenticated(&headers, &state.settings)?;
    let id = parse_target_id(&id)?;

    if let Some(ref name) = body.name {
        validate_name(name)?;
    }
    if let Some(ref url_text) = body.url {
        validate_url(url_text)?;
    }
    if let Some(interval_s) = body.interval_s {
        validate_interval_s(interval_s)?;
    }
    if let Some(timeout_s) = body.timeout_s {
        validate_timeout_s(timeout_s)?;
    }

    let patch = TargetPatch {
        name: body.name,
        url: body.url,
        enabled: body.enabled,
        interval_s: body.interval_s,
        timeout_s: body.timeout_s,
        verify_tls: body.verify_tls,
    };
    let target = state
        .storage
        .update_target(id, &patch)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(TargetResponse::from_target(target, true)))
}

async fn delete_target(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_authenticated(&headers, &state.settings)?;
    let id = parse_target_id(&id)?;
    if !state.storage.delete_target(id).await? {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn get_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<StatusResponse>>, ApiError> {
    let authenticated = auth::is_authenticated(&headers, &state.settings);
    let mut latest = state.storage.latest_checks_per_target().await?;
    let targets = state.storage.list_targets().await?;

    let rows = targets
        .into_iter()
        .map(|target| {
            let url = if authenticated {
                target.url
            } else {
                auth::mask_url(&target.url)
            };
            match latest.remove(&target.id) {
                Some(check) => StatusResponse {
                    target_id: target.id,
                    name: target.name,
                    url,
                    up: Some(check.up),
                    last_checked: Some(check.checked_at),
                    latency_ms: check.latency_ms,
                    http_status: check.http_status,
                    error_type: Some(check.error_kind),
                    error_message: check.error_message,
                },
                None => StatusResponse {
                    target_id: target.id,
                    name: target.name,
                    url,
                    up: None,
                    last_checked: None,
                    latency_ms: None,
                    http_status: None,
                    error_type: None,
                    error_message: None,
                },
            }
        })
        .collect();
    Ok(Json(rows))
}

async fn target_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<HoursQuery>,
) -> Result<Json<Vec<CheckResponse>>, ApiError> {
    let id = parse_target_id(&id)?;
    let hours = validate_range("hours", query.hours, 1, 720)?;
    state.storage.get_target(id).await?.ok_or(ApiError::NotFound)?;

    let since = Utc::now() - ChronoDuration::hours(hours);
    let checks = state.storage.history(Some(id), since, None).await?;
    Ok(Json(checks.into_iter().map(CheckResponse::from).collect()))
}

async fn global_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<CheckResponse>>, ApiError> {
    let hours = validate_range("hours", query.hours, 1, 720)?;
    let target_id = parse_optional_target_id(query.target_id.as_deref())?;

    let since = Utc::now() - ChronoDuration::hours(hours);
    let checks = state.storage.history(target_id, since, query.up).await?;
    Ok(Json(checks.into_iter().map(CheckResponse::from).collect()))
}

async fn target_uptime(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<UptimeResponse>, ApiError> {
    let id = parse_target_id(&id)?;
    let days = validate_range("days", query.days, 1, 365)?;
    let target = state.storage.get_target(id).await?.ok_or(ApiError::NotFound)?;

    let since = Utc::now() - ChronoDuration::days(days);
    let (total_checks, up_checks) = state.storage.aggregate_uptime(id, since).await?;
    Ok(Json(UptimeResponse {
        target_id: target.id,
        name: target.name,
        uptime_percentage: uptime_percentage(total_checks, up_checks),
        total_checks,
        up_checks,
        down_checks: total_checks - up_checks,
    }))
}

async fn target_daily(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<Vec<DailyUptimeResponse>>, ApiError> {
    let id = parse_target_id(&id)?;
    let days = validate_range("days", query.days, 1, 90)?;
    state.storage.get_target(id).await?.ok_or(ApiError::NotFound)?;

    let today = Utc::now().date_naive();
    let window_start = today - ChronoDuration::days(days - 1);
    let since = window_start
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc();
    let buckets = state.storage.aggregate_daily_uptime(id, since).await?;
    Ok(Json(build_daily(buckets, days, today)))
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Monta o router completo: `/healthz` na raiz e a API sob `/api`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/config", get(get_config))
        .route("/auth/me", get(auth_me))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/targets", get(list_targets).post(create_target))
        .route(
            "/targets/:id",
            get(get_target).patch(update_target).delete(delete_target),
        )
        .route("/status", get(get_status))
        .route("/targets/:id/history", get(target_history))
        .route("/history", get(global_history))
        .route("/targets/:id/uptime", get(target_uptime))
        .route("/targets/:id/daily", get(target_daily));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_bounds_follow_the_model_ranges() {
        assert!(validate_interval_s(9).is_err());
        assert!(validate_interval_s(10).is_ok());
        assert!(validate_interval_s(3600).is_ok());
        assert!(validate_interval_s(3601).is_err());
    }

    #[test]
    fn timeout_bounds_follow_the_model_ranges() {
        assert!(validate_timeout_s(0).is_err());
        assert!(validate_timeout_s(1).is_ok());
        assert!(validate_timeout_s(30).is_ok());
        assert!(validate_timeout_s(31).is_err());
    }

    #[test]
    fn history_window_accepts_up_to_thirty_days() {
        assert!(validate_range("hours", 720, 1, 720).is_ok());
        assert!(validate_range("hours", 721, 1, 720).is_err());
        assert!(validate_range("hours", 0, 1, 720).is_err());
    }

    #[test]
    fn name_must_be_nonempty_and_bounded() {
        assert!(validate_name("").is_err());
        assert!(validate_name("Example").is_ok());
        assert!(validate_name(&"x".repeat(255)).is_ok());
        assert!(validate_name(&"x".repeat(256)).is_err());
    }

    #[test]
    fn url_must_be_absolute_http_with_host() {
        assert!(validate_url("https://example.com").is_ok());
        assert!(validate_url("http://example.com:8080/path").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("example.com").is_err());
        assert!(validate_url("http://").is_err());
    }

    #[test]
    fn unparseable_path_id_behaves_as_missing_target() {
        assert!(matches!(parse_target_id("not-a-uuid"), Err(ApiError::NotFound)));
    }

    #[test]
    fn empty_query_target_id_means_no_filter() {
        assert!(parse_optional_target_id(None).unwrap().is_none());
        assert!(parse_optional_target_id(Some("")).unwrap().is_none());
        assert!(parse_optional_target_id(Some("nope")).is_err());
        let id = Uuid::new_v4();
        assert_eq!(
            parse_optional_target_id(Some(&id.to_string())).unwrap(),
            Some(id)
        );
    }

    #[test]
    fn uptime_percentage_matches_up_ratio() {
        assert_eq!(uptime_percentage(100, 75), 75.0);
        assert_eq!(uptime_percentage(0, 0), 0.0);
    }

    #[test]
    fn daily_view_reports_exactly_the_requested_days() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let yesterday = today - ChronoDuration::days(1);
        let buckets = vec![(yesterday, 4, 3), (today, 10, 10)];

        let daily = build_daily(buckets, 3, today);

        assert_eq!(daily.len(), 3);
        // Mais antigo primeiro; dia sem checks reporta 100.0.
        assert_eq!(daily[0].date, today - ChronoDuration::days(2));
        assert_eq!(daily[0].uptime_percentage, 100.0);
        assert_eq!(daily[0].total_checks, 0);
        assert_eq!(daily[1].date, yesterday);
        assert_eq!(daily[1].uptime_percentage, 75.0);
        assert_eq!(daily[2].date, today);
        assert_eq!(daily[2].uptime_percentage, 100.0);
        assert_eq!(daily[2].total_checks, 10);
    }

    #[test]
    fn daily_percentage_rounds_to_two_decimals() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        // 2 de 3: 66.666...% arredonda para 66.67.
        let daily = build_daily(vec![(today, 3, 2)], 1, today);
        assert_eq!(daily[0].uptime_percentage, 66.67);
    }
}
