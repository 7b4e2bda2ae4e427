// =============================================================================
// Broker error taxonomy
// =============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    /// Any non-order upstream failure: connect, balance, holdings, price, OHLCV.
    #[error("broker connection error: {0}")]
    Connection(String),

    /// Any order placement (market or limit, buy or sell) failure.
    #[error("broker order error: {0}")]
    Order(String),
}
