// =============================================================================
// Threshold Strategy — C2.1
// =============================================================================
//
// Buys at or below `buy_price`, sells at or above `sell_price`, holds in
// between. Ignores candles and holdings entirely; the signal depends only
// on the current tick.
// =============================================================================

use parking_lot::RwLock;
use serde::Deserialize;

use super::Strategy;
use crate::error::EngineError;
use crate::types::{Candle, Holding, Signal};

#[derive(Debug, Deserialize)]
struct Params {
    buy_price: f64,
    sell_price: f64,
}

pub struct ThresholdStrategy {
    buy_price: f64,
    sell_price: f64,
    last_reason: RwLock<String>,
}

impl ThresholdStrategy {
    pub const TYPE_NAME: &'static str = "threshold";
    pub const DISPLAY_NAME: &'static str = "threshold";
    pub const DESCRIPTION: &'static str =
        "Price threshold strategy: buys at or below the buy price, sells at or above the sell price";

    pub fn new(parameters: &serde_json::Value) -> Result<Self, EngineError> {
        let params: Params = serde_json::from_value(parameters.clone())
            .map_err(|e| EngineError::Config(format!("invalid threshold parameters: {e}")))?;

        if params.buy_price <= 0.0 || params.sell_price <= 0.0 {
            return Err(EngineError::Config(
                "buy_price and sell_price must be positive".into(),
            ));
        }
        if params.buy_price >= params.sell_price {
            return Err(EngineError::Config(
                "buy_price must be less than sell_price".into(),
            ));
        }

        Ok(Self {
            buy_price: params.buy_price,
            sell_price: params.sell_price,
            last_reason: RwLock::new(String::new()),
        })
    }

    pub fn parameter_schema() -> serde_json::Value {
        serde_json::json!({
            "buy_price": { "type": "number", "description": "Buy at or below this price" },
            "sell_price": { "type": "number", "description": "Sell at or above this price" },
        })
    }
}

impl Strategy for ThresholdStrategy {
    fn evaluate(&self, current_price: f64, _candles: &[Candle], _holdings: &[Holding]) -> Signal {
        let (signal, reason) = if current_price <= self.buy_price {
            (
                Signal::Buy,
                format!(
                    "Price {current_price:.0} <= buy threshold {:.0}",
                    self.buy_price
                ),
            )
        } else if current_price >= self.sell_price {
            (
                Signal::Sell,
                format!(
                    "Price {current_price:.0} >= sell threshold {:.0}",
                    self.sell_price
                ),
            )
        } else {
            (
                Signal::Hold,
                format!(
                    "Price {current_price:.0} between {:.0} and {:.0}",
                    self.buy_price, self.sell_price
                ),
            )
        };
        *self.last_reason.write() = reason;
        signal
    }

    fn last_reason(&self) -> String {
        self.last_reason.read().clone()
    }

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }
}
