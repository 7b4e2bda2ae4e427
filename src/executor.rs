// =============================================================================
// Strategy Executor — C6
// =============================================================================
//
// One cooperative task per session. The main loop gates on market hours,
// runs one evaluate/order cycle per tick, and sleeps until either the
// configured interval elapses or `stop()` is observed. Three latches
// control it: a `CancellationToken` for stop (observed at every suspension
// point) and a `Notify`-backed boolean for pause/resume. Stop always wins:
// `stop()` clears the pause flag too, so a paused loop wakes up, sees
// `stopped`, and exits instead of waiting on a resume that will never come.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Timelike, Utc, Weekday};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::broker::{BrokerAdapter, BrokerError};
use crate::strategy::Strategy;
use crate::types::{Holding, Signal};
use crate::ws;

const KST_OFFSET_SECS: i32 = 9 * 3600;
const MARKET_OPEN_MINUTE: u32 = 9 * 60;
const MARKET_CLOSE_MINUTE: u32 = 15 * 60 + 30;
const MAX_OHLCV_ROWS: usize = 60;
const PAUSE_POLL: Duration = Duration::from_secs(1);
const CLOSED_MARKET_POLL: Duration = Duration::from_secs(30);

fn kst_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&FixedOffset::east_opt(KST_OFFSET_SECS).expect("valid fixed offset"))
}

/// Whether the market is open at `now`, and if not, why and when it next
/// opens. Pure function of a KST wall-clock timestamp so it is trivially
/// testable without waiting on a real clock.
struct MarketStatus {
    open: bool,
    reason: &'static str,
    next_open_hint: &'static str,
}

fn market_status(now: DateTime<FixedOffset>) -> MarketStatus {
    let minute_of_day = now.hour() * 60 + now.minute();

    if matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
        return MarketStatus {
            open: false,
            reason: "weekend",
            next_open_hint: "월요일 09:00",
        };
    }
    if minute_of_day < MARKET_OPEN_MINUTE {
        return MarketStatus {
            open: false,
            reason: "before_open",
            next_open_hint: "오늘 09:00",
        };
    }
    if minute_of_day > MARKET_CLOSE_MINUTE {
        return MarketStatus {
            open: false,
            reason: "after_close",
            next_open_hint: "내일 09:00",
        };
    }
    MarketStatus {
        open: true,
        reason: "",
        next_open_hint: "",
    }
}

/// Per-session cooperative loop: fetch, evaluate, maybe-order, repeat.
pub struct Executor {
    session_id: i64,
    user_id: i64,
    stock_code: String,
    stock_name: String,
    interval: Duration,
    order_quantity: u32,
    broker: Arc<dyn BrokerAdapter>,
    strategy: Box<dyn Strategy>,
    ws: Arc<ws::Registry>,
    stop_token: CancellationToken,
    paused: Mutex<bool>,
    pause_notify: Notify,
}

impl Executor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: i64,
        user_id: i64,
        broker: Arc<dyn BrokerAdapter>,
        strategy: Box<dyn Strategy>,
        stock_code: String,
        stock_name: String,
        interval: Duration,
        order_quantity: u32,
        ws: Arc<ws::Registry>,
    ) -> Self {
        Self {
            session_id,
            user_id,
            stock_code,
            stock_name,
            interval,
            order_quantity,
            broker,
            strategy,
            ws,
            stop_token: CancellationToken::new(),
            paused: Mutex::new(false),
            pause_notify: Notify::new(),
        }
    }

    /// Set the pause latch. Safe to call from any task; observed at the
    /// next suspension point in the main loop.
    pub fn pause(&self) {
        *self.paused.lock() = true;
        self.pause_notify.notify_waiters();
    }

    /// Clear the pause latch.
    pub fn resume(&self) {
        *self.paused.lock() = false;
        self.pause_notify.notify_waiters();
    }

    /// Set the stop latch and clear pause so a paused loop can observe it.
    /// Idempotent: calling `stop` more than once is harmless.
    pub fn stop(&self) {
        *self.paused.lock() = false;
        self.stop_token.cancel();
        self.pause_notify.notify_waiters();
    }

    fn is_stopped(&self) -> bool {
        self.stop_token.is_cancelled()
    }

    fn emit_status(&self, status: &str, message: &str, extra: serde_json::Value) {
        let mut payload = json!({
            "session_id": self.session_id,
            "stock_code": self.stock_code,
            "stock_name": self.stock_name,
            "status": status,
            "message": message,
            "timestamp": kst_now().to_rfc3339(),
        });
        if let (Some(obj), Some(extra_obj)) = (payload.as_object_mut(), extra.as_object()) {
            for (k, v) in extra_obj {
                obj.insert(k.clone(), v.clone());
            }
        }
        self.ws
            .send_to_user(self.user_id, "session.status", "trading", payload);
    }

    /// Main loop. Runs until `stop()` is called; returns after emitting the
    /// terminal "stopped" status exactly once.
    pub async fn run(self: Arc<Self>) {
        loop {
            if self.is_stopped() {
                break;
            }

            if *self.paused.lock() {
                self.emit_status("paused", "paused", json!({}));
                if !self.wait_while_paused().await {
                    break;
                }
                self.emit_status("running", "running/resumed", json!({}));
            }

            let status = market_status(kst_now());
            if !status.open {
                self.emit_status(
                    "waiting_market",
                    status.reason,
                    json!({
                        "market_status": {
                            "reason": status.reason,
                            "next_open": status.next_open_hint,
                        }
                    }),
                );
                if self.sleep_or_stop(CLOSED_MARKET_POLL).await {
                    break;
                }
                continue;
            }

            if let Err(e) = self.run_cycle().await {
                warn!(session_id = self.session_id, error = %e, "cycle failed");
                self.emit_status("error", &format!("cycle error: {e}"), json!({}));
            }

            let next_check_at = kst_now() + chrono::Duration::seconds(self.interval.as_secs() as i64);
            self.emit_status(
                "running",
                &format!("running / next check: {}", next_check_at.format("%H:%M:%S")),
                json!({ "next_check_at": next_check_at.to_rfc3339() }),
            );

            if self.sleep_or_stop(self.interval).await {
                break;
            }
        }

        self.emit_status("stopped", "stopped / 중지됨", json!({}));
        info!(session_id = self.session_id, "executor stopped");
    }

    /// Poll every second until either pause clears or stop is signalled.
    /// Returns `false` if the loop should terminate (stop observed).
    async fn wait_while_paused(&self) -> bool {
        loop {
            if self.is_stopped() {
                return false;
            }
            if !*self.paused.lock() {
                return true;
            }
            tokio::select! {
                _ = self.pause_notify.notified() => {}
                _ = tokio::time::sleep(PAUSE_POLL) => {}
            }
        }
    }

    /// Sleep for `duration` unless stop is signalled first. Returns `true`
    /// if stop fired during the wait.
    async fn sleep_or_stop(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = self.stop_token.cancelled() => true,
        }
    }

    async fn run_cycle(&self) -> Result<(), BrokerError> {
        self.emit_status("checking", "checking / 시세 조회 중...", json!({}));

        let price = self.broker.get_current_price(&self.stock_code).await?;
        if price.current_price <= 0.0 {
            self.emit_status("error", "error / 시세 조회 실패", json!({}));
            return Ok(());
        }

        let ohlcv = self
            .broker
            .get_ohlcv(&self.stock_code, "D", MAX_OHLCV_ROWS)
            .await?;

        let holdings = self.broker.get_holdings().await?;
        let matched: Vec<Holding> = holdings
            .into_iter()
            .filter(|h| h.stock_code == self.stock_code)
            .collect();

        self.emit_status("evaluating", "evaluating", json!({}));
        let signal = self.strategy.evaluate(price.current_price, &ohlcv, &matched);
        let reason = self.strategy.last_reason();
        let last_checked_at = kst_now().to_rfc3339();

        self.emit_status(
            "evaluated",
            "evaluated",
            json!({
                "current_price": price.current_price,
                "signal": signal.to_string(),
                "signal_reason": reason,
                "last_checked_at": last_checked_at,
            }),
        );

        match signal {
            Signal::Buy => {
                self.emit_status("ordering", "ordering / 매수 주문 중...", json!({}));
                match self
                    .broker
                    .buy_market(&self.stock_code, self.order_quantity)
                    .await
                {
                    Ok(result) => info!(
                        session_id = self.session_id,
                        order_no = %result.order_no,
                        "buy order placed"
                    ),
                    Err(e) => warn!(session_id = self.session_id, error = %e, "buy order failed"),
                }
            }
            Signal::Sell => {
                self.emit_status("ordering", "ordering / 매도 주문 중...", json!({}));
                match self
                    .broker
                    .sell_market(&self.stock_code, self.order_quantity)
                    .await
                {
                    Ok(result) => info!(
                        session_id = self.session_id,
                        order_no = %result.order_no,
                        "sell order placed"
                    ),
                    Err(e) => warn!(session_id = self.session_id, error = %e, "sell order failed"),
                }
            }
            Signal::Hold => {}
        }

        Ok(())
    }
}
