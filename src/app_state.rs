// =============================================================================
// Central Application State — Aurora Session Engine
// =============================================================================
//
// The demo control plane's single source of truth: an in-memory `Session`
// table (standing in for the user/account/strategy database the real
// deployment would have), the process-wide `TradingManager`, and the
// WebSocket fan-out registry. All three are wrapped in `Arc` and shared via
// Axum's `State` extractor.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::manager::{TradingManager, MANAGER};
use crate::state::SessionStatus;
use crate::ws;

/// In-memory record of a trading session, carrying exactly the fields
/// spec.md's data model names for "Session" — no additional business
/// fields are invented here.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub session_id: i64,
    pub user_id: i64,
    pub account_id: i64,
    pub strategy_id: i64,
    pub stock_code: String,
    pub stock_name: String,
    pub quantity: u32,
    pub status: SessionStatus,
    pub config: serde_json::Value,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub total_pnl: f64,
    pub total_trades: u64,
}

/// Central application state shared across all Axum handlers via
/// `Arc<AppState>`.
pub struct AppState {
    pub config: EngineConfig,
    pub sessions: RwLock<HashMap<i64, Session>>,
    pub manager: Arc<TradingManager>,
    pub ws: Arc<ws::Registry>,
}

impl AppState {
    /// Shares the process-wide `MANAGER` singleton rather than constructing
    /// a private `TradingManager` — one `AppState` per process, so there is
    /// never more than one live `Arc<TradingManager>` to begin with, but
    /// going through `MANAGER` keeps that invariant explicit instead of
    /// incidental.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            manager: MANAGER.clone(),
            ws: Arc::new(ws::Registry::new()),
        }
    }
}
