// =============================================================================
// Broker Adapter — C5
// =============================================================================
//
// `BrokerAdapter` is the seam between the session engine and whichever
// vendor holds the account. Strategies and the executor never talk to
// `UpstreamClient` directly; they hold a `Box<dyn BrokerAdapter + Send +
// Sync>` so a paper-trading or test double can stand in without touching
// executor.rs or manager.rs.
// =============================================================================

pub mod error;
pub mod kis;
pub mod upstream;

pub use error::BrokerError;

use async_trait::async_trait;

use crate::types::{BalanceInfo, Candle, Holding, OrderResult, PriceInfo};

#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    /// Establish and validate the upstream session. Must be called once
    /// before any other method; implementations may no-op on repeat calls.
    /// Populates the broker's cached balance snapshot on success.
    async fn connect(&self) -> Result<bool, BrokerError>;

    async fn get_balance(&self) -> Result<BalanceInfo, BrokerError>;

    /// Only rows with `hldg_qty > 0`; fully liquidated positions are dropped.
    async fn get_holdings(&self) -> Result<Vec<Holding>, BrokerError>;

    async fn get_current_price(&self, stock_code: &str) -> Result<PriceInfo, BrokerError>;

    /// Newest-first candles, truncated to the first `count` rows of the
    /// upstream response (count is capped at 200 by callers).
    async fn get_ohlcv(
        &self,
        stock_code: &str,
        period: &str,
        count: usize,
    ) -> Result<Vec<Candle>, BrokerError>;

    async fn buy_market(&self, stock_code: &str, quantity: u32) -> Result<OrderResult, BrokerError>;

    async fn sell_market(&self, stock_code: &str, quantity: u32) -> Result<OrderResult, BrokerError>;

    async fn buy_limit(
        &self,
        stock_code: &str,
        quantity: u32,
        price: u64,
    ) -> Result<OrderResult, BrokerError>;

    async fn sell_limit(
        &self,
        stock_code: &str,
        quantity: u32,
        price: u64,
    ) -> Result<OrderResult, BrokerError>;
}
