// =============================================================================
// REST control plane — Axum 0.7
// =============================================================================
//
// Implements exactly the four inbound control-plane operations spec.md §6
// names (start/stop/pause/resume) plus a health check and a strategy
// discovery endpoint. The in-memory `Session` table here stands in for the
// user/account/strategy database a real deployment would have (spec.md
// Non-goals) — it carries only the fields spec.md §3 lists.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::api::auth::AuthBearer;
use crate::app_state::{AppState, Session};
use crate::broker::{kis, upstream::UpstreamClient};
use crate::error::EngineError;
use crate::state::{can_transition, SessionStatus};
use crate::strategy;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/strategies", get(list_strategies))
        .route("/api/v1/sessions/start", post(start_session))
        .route("/api/v1/sessions/:id/stop", post(stop_session))
        .route("/api/v1/sessions/:id/pause", post(pause_session))
        .route("/api/v1/sessions/:id/resume", post(resume_session))
        .route("/api/v1/sessions/:id", get(get_session))
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    active_sessions: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        active_sessions: state.manager.get_active_session_ids().len(),
    })
}

async fn list_strategies(_auth: AuthBearer) -> impl IntoResponse {
    Json(strategy::get_available_strategies())
}

// =============================================================================
// Start
// =============================================================================

#[derive(Deserialize)]
struct StartSessionRequest {
    session_id: i64,
    user_id: i64,
    account_id: i64,
    strategy_id: i64,
    strategy_type: String,
    #[serde(default)]
    strategy_params: serde_json::Value,
    stock_code: String,
    stock_name: String,
    #[serde(default)]
    interval_seconds: Option<u64>,
    #[serde(default)]
    order_quantity: Option<u32>,
    app_key: String,
    app_secret: String,
    account_no: String,
    account_suffix: String,
    #[serde(default)]
    environment: Option<String>,
}

/// `start`: account active + strategy belongs to user is the caller's
/// precondition (spec.md §6 table) — the engine itself only guards against a
/// session id that is already active. Strategy construction and the broker's
/// `connect()` both propagate to the caller and abort the start; nothing is
/// recorded as RUNNING until both succeed.
async fn start_session(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, EngineError> {
    if state.sessions.read().contains_key(&req.session_id) {
        return Err(EngineError::State(format!(
            "session {} is already active",
            req.session_id
        )));
    }

    let strategy_instance = strategy::get_strategy(&req.strategy_type, &req.strategy_params)?;

    let environment = req.environment.as_deref().unwrap_or(&state.config.environment);
    let client = UpstreamClient::new(
        req.app_key.clone(),
        req.app_secret.clone(),
        req.account_no.clone(),
        req.account_suffix.clone(),
        environment,
    );
    let broker = kis::build(client, state.config.max_tokens, state.config.refill_rate);
    broker.connect().await?;

    let interval_seconds = req.interval_seconds.unwrap_or(state.config.interval_seconds);
    let order_quantity = req.order_quantity.unwrap_or(state.config.order_quantity);

    state.manager.start_session(
        req.session_id,
        req.user_id,
        broker,
        strategy_instance,
        req.stock_code.clone(),
        req.stock_name.clone(),
        interval_seconds,
        order_quantity,
        state.ws.clone(),
    )?;

    let now = Utc::now();
    let session = Session {
        session_id: req.session_id,
        user_id: req.user_id,
        account_id: req.account_id,
        strategy_id: req.strategy_id,
        stock_code: req.stock_code,
        stock_name: req.stock_name,
        quantity: order_quantity,
        status: SessionStatus::Running,
        config: req.strategy_params,
        started_at: Some(now),
        stopped_at: None,
        total_pnl: 0.0,
        total_trades: 0,
    };
    state.sessions.write().insert(req.session_id, session.clone());

    state.ws.send_to_user(
        req.user_id,
        "session.started",
        "trading",
        json!({ "session_id": session.session_id, "status": "running", "timestamp": now.to_rfc3339() }),
    );

    info!(session_id = session.session_id, user_id = session.user_id, "session started");
    Ok(Json(session))
}

// =============================================================================
// Stop / pause / resume
// =============================================================================

async fn stop_session(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, EngineError> {
    transition(&state, id, SessionStatus::Stopped, |s| {
        s.status = SessionStatus::Stopped;
        s.stopped_at = Some(Utc::now());
    })?;

    state.manager.stop_session(id);

    let user_id = state.sessions.read().get(&id).map(|s| s.user_id);
    if let Some(user_id) = user_id {
        state.ws.send_to_user(
            user_id,
            "session.stopped",
            "trading",
            json!({ "session_id": id, "status": "stopped", "timestamp": Utc::now().to_rfc3339() }),
        );
    }

    info!(session_id = id, "session stopped");
    Ok(Json(json!({ "session_id": id, "status": "stopped" })))
}

async fn pause_session(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, EngineError> {
    transition(&state, id, SessionStatus::Paused, |s| {
        s.status = SessionStatus::Paused;
    })?;
    state.manager.pause_session(id);
    info!(session_id = id, "session paused");
    Ok(Json(json!({ "session_id": id, "status": "paused" })))
}

async fn resume_session(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, EngineError> {
    transition(&state, id, SessionStatus::Running, |s| {
        s.status = SessionStatus::Running;
    })?;
    state.manager.resume_session(id);
    info!(session_id = id, "session resumed");
    Ok(Json(json!({ "session_id": id, "status": "running" })))
}

/// Look up `id`, check `can_transition`, and apply `mutate` to the stored
/// session record. Rejects before any mutation if the transition is illegal,
/// and surfaces an unknown id as `NotFound` (404 at the API boundary).
fn transition(
    state: &Arc<AppState>,
    id: i64,
    to: SessionStatus,
    mutate: impl FnOnce(&mut Session),
) -> Result<(), EngineError> {
    let mut sessions = state.sessions.write();
    let session = sessions.get_mut(&id).ok_or(EngineError::NotFound(id))?;

    if !can_transition(session.status, to) {
        return Err(EngineError::State(format!(
            "cannot transition session {id} from '{}' to '{to}'",
            session.status
        )));
    }

    mutate(session);
    Ok(())
}

async fn get_session(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, EngineError> {
    let session = state
        .sessions
        .read()
        .get(&id)
        .cloned()
        .ok_or(EngineError::NotFound(id))?;
    Ok(Json(session))
}
