use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::feed::cache::{CachePhase, CacheState, SnapshotCache};
use crate::feed::temporal::{classify, AlertStatus};
use crate::feed::types::{now_ms, ActivePeriod, Alert, InformedEntity, Snapshot, TimestampMs};

#[derive(Clone)]
pub struct AppState {
    pub cache: SnapshotCache,
}

impl AppState {
    pub fn new(cache: SnapshotCache) -> Self {
        Self { cache }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "ttc-rt-proxy OK. Use /alerts" }))
        .route("/health", get(health))
        .route("/alerts", get(get_alerts))
        .route("/alerts/refresh", post(refresh_alerts))
        .route("/alerts/status", get(alerts_status))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertsQuery {
    /// Comma-separated status names, e.g. `active,upcoming`.
    #[serde(default)]
    status: Option<String>,
}

impl AlertsQuery {
    fn status_filter(&self) -> Result<Option<Vec<AlertStatus>>, String> {
        let Some(raw) = self.status.as_deref() else {
            return Ok(None);
        };
        let wanted = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| AlertStatus::parse(s).ok_or_else(|| format!("unknown status: {s:?}")))
            .collect::<Result<Vec<_>, _>>()?;
        // `?status=` with nothing in it is no filter, not "match nothing".
        Ok((!wanted.is_empty()).then_some(wanted))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AlertOut<'a> {
    id: &'a str,
    title: &'a str,
    description: &'a str,
    cause: Option<&'a str>,
    effect: Option<&'a str>,
    active_period: &'a [ActivePeriod],
    informed_entities: &'a [InformedEntity],
    status: AlertStatus,
}

impl<'a> AlertOut<'a> {
    fn new(a: &'a Alert, status: AlertStatus) -> Self {
        Self {
            id: &a.id,
            title: &a.header,
            description: &a.description,
            cause: a.cause.as_deref(),
            effect: a.effect.as_deref(),
            active_period: &a.active_periods,
            informed_entities: &a.informed_entities,
            status,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AlertsOut<'a> {
    updated: TimestampMs,
    feed_timestamp: Option<TimestampMs>,
    count: usize,
    items: Vec<AlertOut<'a>>,
}

fn error_response(status: StatusCode, message: impl ToString) -> Response {
    (status, Json(json!({ "error": message.to_string() }))).into_response()
}

fn render_snapshot(snap: &Snapshot, filter: Option<&[AlertStatus]>, now: TimestampMs) -> Response {
    let items = snap
        .alerts
        .iter()
        .map(|a| AlertOut::new(a, classify(&a.active_periods, now)))
        .filter(|o| filter.map_or(true, |f| f.contains(&o.status)))
        .collect::<Vec<_>>();

    Json(AlertsOut {
        updated: snap.fetched_at,
        feed_timestamp: snap.feed_timestamp,
        count: items.len(),
        items,
    })
    .into_response()
}

/// No snapshot to serve: 503 while the first load is pending, 500 carrying
/// the refresh error once it has failed.
fn not_loaded(st: &CacheState) -> Response {
    match (st.phase, st.last_error.as_ref()) {
        (CachePhase::Empty, Some(e)) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
        (_, Some(e)) => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("alerts feed loading; last error: {e}"),
        ),
        (_, None) => error_response(StatusCode::SERVICE_UNAVAILABLE, "alerts feed loading"),
    }
}

/// Pure read of the published state; never touches the upstream.
async fn get_alerts(State(state): State<AppState>, Query(q): Query<AlertsQuery>) -> Response {
    let filter = match q.status_filter() {
        Ok(f) => f,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, msg),
    };
    let st = state.cache.state();
    match st.snapshot.as_deref() {
        Some(snap) => render_snapshot(snap, filter.as_deref(), now_ms()),
        None => not_loaded(&st),
    }
}

/// Stale-over-nothing: a failed refresh still serves the last good snapshot;
/// only a cache that has never loaded turns into a 5xx.
async fn refresh_alerts(State(state): State<AppState>, Query(q): Query<AlertsQuery>) -> Response {
    let filter = match q.status_filter() {
        Ok(f) => f,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, msg),
    };
    let snap = match state.cache.refresh().await {
        Ok(s) => s,
        Err(e) => match state.cache.snapshot() {
            Some(stale) => stale,
            None => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
        },
    };
    render_snapshot(&snap, filter.as_deref(), now_ms())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusOut {
    phase: CachePhase,
    format: &'static str,
    updated: Option<TimestampMs>,
    feed_timestamp: Option<TimestampMs>,
    count: Option<usize>,
    last_error: Option<String>,
    last_attempt_at: Option<TimestampMs>,
}

async fn alerts_status(State(state): State<AppState>) -> Json<StatusOut> {
    let st = state.cache.state();
    let snap = st.snapshot.as_deref();
    Json(StatusOut {
        phase: st.phase,
        format: state.cache.format().as_str(),
        updated: snap.map(|s| s.fetched_at),
        feed_timestamp: snap.and_then(|s| s.feed_timestamp),
        count: snap.map(|s| s.alerts.len()),
        last_error: st.last_error.as_ref().map(ToString::to_string),
        last_attempt_at: st.last_attempt_at,
    })
}
