// =============================================================================
// RSI Strategy — C2.3
// =============================================================================
//
// Buys when RSI drops to or below the oversold line, sells when it rises to
// or above the overbought line. RSI itself is Wilder's smoothed
// implementation (see `indicators::rsi`); needs `rsi_period + 1` candles.
// =============================================================================

use parking_lot::RwLock;
use serde::Deserialize;

use super::Strategy;
use crate::error::EngineError;
use crate::indicators::rsi::calculate_rsi;
use crate::types::{Candle, Holding, Signal};

#[derive(Debug, Deserialize)]
struct Params {
    #[serde(default = "default_rsi_period")]
    rsi_period: usize,
    #[serde(default = "default_oversold")]
    oversold: f64,
    #[serde(default = "default_overbought")]
    overbought: f64,
}

fn default_rsi_period() -> usize {
    14
}

fn default_oversold() -> f64 {
    30.0
}

fn default_overbought() -> f64 {
    70.0
}

pub struct RsiStrategy {
    rsi_period: usize,
    oversold: f64,
    overbought: f64,
    last_reason: RwLock<String>,
}

impl RsiStrategy {
    pub const TYPE_NAME: &'static str = "rsi";
    pub const DISPLAY_NAME: &'static str = "rsi";
    pub const DESCRIPTION: &'static str =
        "RSI strategy: buys when oversold, sells when overbought";

    pub fn new(parameters: &serde_json::Value) -> Result<Self, EngineError> {
        let params: Params = serde_json::from_value(parameters.clone())
            .map_err(|e| EngineError::Config(format!("invalid rsi parameters: {e}")))?;

        if params.rsi_period < 2 {
            return Err(EngineError::Config("rsi_period must be at least 2".into()));
        }
        if params.oversold <= 0.0 || params.overbought >= 100.0 {
            return Err(EngineError::Config(
                "oversold and overbought must be within (0, 100)".into(),
            ));
        }
        if params.oversold >= params.overbought {
            return Err(EngineError::Config(
                "oversold must be less than overbought".into(),
            ));
        }

        Ok(Self {
            rsi_period: params.rsi_period,
            oversold: params.oversold,
            overbought: params.overbought,
            last_reason: RwLock::new(String::new()),
        })
    }

    pub fn parameter_schema() -> serde_json::Value {
        serde_json::json!({
            "rsi_period": { "type": "integer", "default": 14, "min": 2, "max": 50, "description": "RSI look-back window" },
            "oversold": { "type": "number", "default": 30, "min": 10, "max": 50, "description": "Buy at or below this RSI" },
            "overbought": { "type": "number", "default": 70, "min": 50, "max": 90, "description": "Sell at or above this RSI" },
        })
    }
}

impl Strategy for RsiStrategy {
    fn evaluate(&self, _current_price: f64, candles: &[Candle], _holdings: &[Holding]) -> Signal {
        if candles.len() < self.rsi_period + 1 {
            *self.last_reason.write() =
                format!("Insufficient data: need {} candles", self.rsi_period + 1);
            return Signal::Hold;
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let series = calculate_rsi(&closes, self.rsi_period);

        let Some(&current_rsi) = series.last() else {
            *self.last_reason.write() = "RSI value not available".to_string();
            return Signal::Hold;
        };

        let (signal, reason) = if current_rsi <= self.oversold {
            (
                Signal::Buy,
                format!("RSI oversold: {current_rsi:.1} <= {}", self.oversold),
            )
        } else if current_rsi >= self.overbought {
            (
                Signal::Sell,
                format!("RSI overbought: {current_rsi:.1} >= {}", self.overbought),
            )
        } else {
            (Signal::Hold, format!("RSI neutral: {current_rsi:.1}"))
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

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(close: f64) -> Candle {
        Candle {
            date: "2026-01-01".to_string(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 0,
        }
    }

    fn strategy(period: usize, oversold: f64, overbought: f64) -> RsiStrategy {
        RsiStrategy::new(&serde_json::json!({
            "rsi_period": period,
            "oversold": oversold,
            "overbought": overbought
        }))
        .unwrap()
    }

    #[test]
    fn rejects_oversold_not_less_than_overbought() {
        assert!(RsiStrategy::new(&serde_json::json!({ "oversold": 70, "overbought": 30 })).is_err());
    }

    #[test]
    fn rejects_rsi_period_below_two() {
        assert!(RsiStrategy::new(&serde_json::json!({ "rsi_period": 1 })).is_err());
    }

    #[test]
    fn rejects_out_of_range_bounds() {
        assert!(RsiStrategy::new(&serde_json::json!({ "oversold": 0, "overbought": 70 })).is_err());
        assert!(RsiStrategy::new(&serde_json::json!({ "oversold": 30, "overbought": 100 })).is_err());
    }

    #[test]
    fn holds_on_insufficient_data() {
        let s = strategy(14, 30.0, 70.0);
        let candles: Vec<Candle> = (1..=10).map(|i| candle(i as f64)).collect();
        assert_eq!(s.evaluate(0.0, &candles, &[]), Signal::Hold);
    }

    // S5 — oversold buys
    #[test]
    fn buys_when_oversold() {
        let s = strategy(14, 30.0, 70.0);
        let closes: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        let candles: Vec<Candle> = closes.iter().map(|&c| candle(c)).collect();
        assert_eq!(s.evaluate(0.0, &candles, &[]), Signal::Buy);
        assert!(s.last_reason().contains("oversold"));
    }

    // S6 — overbought sells
    #[test]
    fn sells_when_overbought() {
        let s = strategy(14, 30.0, 70.0);
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let candles: Vec<Candle> = closes.iter().map(|&c| candle(c)).collect();
        assert_eq!(s.evaluate(0.0, &candles, &[]), Signal::Sell);
        assert!(s.last_reason().contains("overbought"));
    }

    // S7 — neutral holds
    #[test]
    fn holds_when_neutral() {
        let s = strategy(14, 30.0, 70.0);
        let closes = vec![100.0; 30];
        let candles: Vec<Candle> = closes.iter().map(|&c| candle(c)).collect();
        assert_eq!(s.evaluate(0.0, &candles, &[]), Signal::Hold);
        assert!(s.last_reason().contains("neutral"));
    }
}
