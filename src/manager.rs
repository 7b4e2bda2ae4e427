// =============================================================================
// Trading Manager — C7
// =============================================================================
//
// Process-wide supervisor: owns every live Executor, guarantees at most one
// per session id, and cleans up after an executor's task completes. A
// parking_lot mutex guards the map since no critical section here crosses
// an `.await` point (the map only ever holds handles, never runs broker
// calls itself).
// =============================================================================

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{error, info};

use crate::broker::BrokerAdapter;
use crate::error::EngineError;
use crate::executor::Executor;
use crate::strategy::Strategy;
use crate::ws;

struct ManagedSession {
    executor: Arc<Executor>,
}

/// Process-wide singleton, constructed once. Tests build their own
/// `TradingManager::new()` instances instead of touching this static so
/// they never interfere with each other.
pub static MANAGER: LazyLock<Arc<TradingManager>> =
    LazyLock::new(|| Arc::new(TradingManager::new()));

#[derive(Default)]
pub struct TradingManager {
    sessions: Mutex<HashMap<i64, ManagedSession>>,
}

impl TradingManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session. Fails if `session_id` is already active; the
    /// caller never needs to distinguish "already running" from "already
    /// paused" — both count as active.
    #[allow(clippy::too_many_arguments)]
    pub fn start_session(
        self: &Arc<Self>,
        session_id: i64,
        user_id: i64,
        broker: Arc<dyn BrokerAdapter>,
        strategy: Box<dyn Strategy>,
        stock_code: String,
        stock_name: String,
        interval_seconds: u64,
        order_quantity: u32,
        ws: Arc<ws::Registry>,
    ) -> Result<(), EngineError> {
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(&session_id) {
            return Err(EngineError::State(format!(
                "session {session_id} is already active"
            )));
        }

        let executor = Arc::new(Executor::new(
            session_id,
            user_id,
            broker,
            strategy,
            stock_code,
            stock_name,
            Duration::from_secs(interval_seconds),
            order_quantity,
            ws,
        ));

        let exec_task = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.run().await })
        };

        let manager = self.clone();
        tokio::spawn(async move {
            if let Err(e) = exec_task.await {
                error!(session_id, error = %e, "session task panicked");
            }
            manager.sessions.lock().remove(&session_id);
            info!(session_id, "session removed from manager");
        });

        sessions.insert(session_id, ManagedSession { executor });
        info!(session_id, user_id, "session started");
        Ok(())
    }

    /// No-op if `session_id` is not active (spec's NOT_FOUND propagation
    /// policy: silently ignored at the manager).
    pub fn stop_session(&self, session_id: i64) {
        if let Some(session) = self.sessions.lock().get(&session_id) {
            session.executor.stop();
        }
    }

    pub fn pause_session(&self, session_id: i64) {
        if let Some(session) = self.sessions.lock().get(&session_id) {
            session.executor.pause();
        }
    }

    pub fn resume_session(&self, session_id: i64) {
        if let Some(session) = self.sessions.lock().get(&session_id) {
            session.executor.resume();
        }
    }

    pub fn is_active(&self, session_id: i64) -> bool {
        self.sessions.lock().contains_key(&session_id)
    }

    pub fn get_active_session_ids(&self) -> Vec<i64> {
        self.sessions.lock().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::threshold::ThresholdStrategy;
    use crate::types::{BalanceInfo, Candle, Holding, OrderResult, PriceInfo};
    use async_trait::async_trait;
    use crate::broker::BrokerError;

    struct NoopBroker;

    #[async_trait]
    impl BrokerAdapter for NoopBroker {
        async fn connect(&self) -> Result<bool, BrokerError> {
            Ok(true)
        }
        async fn get_balance(&self) -> Result<BalanceInfo, BrokerError> {
            Ok(BalanceInfo {
                tot_evlu_amt: "0".into(),
                evlu_pfls_smtl_amt: "0".into(),
                pchs_amt_smtl_amt: "0".into(),
                dnca_tot_amt: "0".into(),
                nxdy_excc_amt: "0".into(),
            })
        }
        async fn get_holdings(&self) -> Result<Vec<Holding>, BrokerError> {
            Ok(vec![])
        }
        async fn get_current_price(&self, stock_code: &str) -> Result<PriceInfo, BrokerError> {
            Ok(PriceInfo {
                stock_code: stock_code.to_string(),
                stock_name: "TEST".into(),
                current_price: 100.0,
                change: 0.0,
                change_rate: 0.0,
                volume: 0,
                high: 100.0,
                low: 100.0,
                open_price: 100.0,
            })
        }
        async fn get_ohlcv(&self, _: &str, _: &str, _: usize) -> Result<Vec<Candle>, BrokerError> {
            Ok(vec![])
        }
        async fn buy_market(&self, _: &str, _: u32) -> Result<OrderResult, BrokerError> {
            Ok(OrderResult {
                order_no: "1".into(),
                filled_price: None,
                filled_quantity: None,
                raw: serde_json::json!({}),
            })
        }
        async fn sell_market(&self, _: &str, _: u32) -> Result<OrderResult, BrokerError> {
            Ok(OrderResult {
                order_no: "1".into(),
                filled_price: None,
                filled_quantity: None,
                raw: serde_json::json!({}),
            })
        }
        async fn buy_limit(&self, _: &str, _: u32, _: u64) -> Result<OrderResult, BrokerError> {
            unreachable!()
        }
        async fn sell_limit(&self, _: &str, _: u32, _: u64) -> Result<OrderResult, BrokerError> {
            unreachable!()
        }
    }

    fn threshold_strategy() -> Box<dyn Strategy> {
        Box::new(
            ThresholdStrategy::new(&serde_json::json!({ "buy_price": 50000, "sell_price": 60000 }))
                .unwrap(),
        )
    }

    // S9 — manager uniqueness.
    #[tokio::test]
    async fn duplicate_start_session_fails() {
        let manager = Arc::new(TradingManager::new());
        let ws = Arc::new(ws::Registry::new());

        let result1 = manager.start_session(
            1,
            1,
            Arc::new(NoopBroker),
            threshold_strategy(),
            "005930".into(),
            "Samsung".into(),
            60,
            1,
            ws.clone(),
        );
        assert!(result1.is_ok());

        let result2 = manager.start_session(
            1,
            1,
            Arc::new(NoopBroker),
            threshold_strategy(),
            "005930".into(),
            "Samsung".into(),
            60,
            1,
            ws,
        );
        assert!(result2.is_err());

        manager.stop_session(1);
    }

    #[test]
    fn stop_pause_resume_on_unknown_session_is_a_noop() {
        let manager = TradingManager::new();
        manager.stop_session(999);
        manager.pause_session(999);
        manager.resume_session(999);
        assert!(!manager.is_active(999));
    }

    #[tokio::test]
    async fn is_active_reflects_started_sessions() {
        let manager = Arc::new(TradingManager::new());
        let ws = Arc::new(ws::Registry::new());
        assert!(!manager.is_active(7));

        manager
            .start_session(
                7,
                1,
                Arc::new(NoopBroker),
                threshold_strategy(),
                "005930".into(),
                "Samsung".into(),
                60,
                1,
                ws,
            )
            .unwrap();
        assert!(manager.is_active(7));
        assert!(manager.get_active_session_ids().contains(&7));

        manager.stop_session(7);
    }
}
