// =============================================================================
// SMA Crossover Strategy — C2.2
// =============================================================================
//
// Golden cross (short SMA rises above long SMA) signals BUY, death cross
// (short SMA falls below long SMA) signals SELL. Needs `long_period + 1`
// candles to compare the previous and current bar; anything short of that
// holds.
// =============================================================================

use parking_lot::RwLock;
use serde::Deserialize;

use super::Strategy;
use crate::error::EngineError;
use crate::types::{Candle, Holding, Signal};

#[derive(Debug, Deserialize)]
struct Params {
    #[serde(default = "default_short_period")]
    short_period: usize,
    #[serde(default = "default_long_period")]
    long_period: usize,
}

fn default_short_period() -> usize {
    5
}

fn default_long_period() -> usize {
    20
}

/// Simple moving average series: one value per window of `period` closes,
/// starting at index `period - 1`. Empty when there are fewer than `period`
/// closes or `period == 0`.
fn simple_moving_average(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(closes.len() - period + 1);
    let mut window_sum: f64 = closes[..period].iter().sum();
    result.push(window_sum / period as f64);

    for i in period..closes.len() {
        window_sum += closes[i] - closes[i - period];
        result.push(window_sum / period as f64);
    }

    result
}

pub struct SmaCrossoverStrategy {
    short_period: usize,
    long_period: usize,
    last_reason: RwLock<String>,
}

impl SmaCrossoverStrategy {
    pub const TYPE_NAME: &'static str = "sma_crossover";
    pub const DISPLAY_NAME: &'static str = "sma_crossover";
    pub const DESCRIPTION: &'static str =
        "Moving average crossover strategy: buys on a golden cross, sells on a death cross";

    pub fn new(parameters: &serde_json::Value) -> Result<Self, EngineError> {
        let params: Params = serde_json::from_value(parameters.clone())
            .map_err(|e| EngineError::Config(format!("invalid sma_crossover parameters: {e}")))?;

        if params.short_period < 2 {
            return Err(EngineError::Config(
                "short_period must be at least 2".into(),
            ));
        }
        if params.short_period >= params.long_period {
            return Err(EngineError::Config(
                "short_period must be less than long_period".into(),
            ));
        }

        Ok(Self {
            short_period: params.short_period,
            long_period: params.long_period,
            last_reason: RwLock::new(String::new()),
        })
    }

    pub fn parameter_schema() -> serde_json::Value {
        serde_json::json!({
            "short_period": { "type": "integer", "default": 5, "min": 2, "max": 50, "description": "Short moving average window" },
            "long_period": { "type": "integer", "default": 20, "min": 5, "max": 200, "description": "Long moving average window" },
        })
    }
}

impl Strategy for SmaCrossoverStrategy {
    fn evaluate(&self, _current_price: f64, candles: &[Candle], _holdings: &[Holding]) -> Signal {
        if candles.len() < self.long_period + 1 {
            *self.last_reason.write() =
                format!("Insufficient data: need {} candles", self.long_period + 1);
            return Signal::Hold;
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let short_ma = simple_moving_average(&closes, self.short_period);
        let long_ma = simple_moving_average(&closes, self.long_period);

        if short_ma.len() < 2 || long_ma.len() < 2 {
            *self.last_reason.write() = "MA values not available yet".to_string();
            return Signal::Hold;
        }

        let curr_short = short_ma[short_ma.len() - 1];
        let prev_short = short_ma[short_ma.len() - 2];
        let curr_long = long_ma[long_ma.len() - 1];
        let prev_long = long_ma[long_ma.len() - 2];

        let (signal, reason) = if prev_short <= prev_long && curr_short > curr_long {
            (
                Signal::Buy,
                format!(
                    "Golden cross: SMA{}({curr_short:.0}) > SMA{}({curr_long:.0})",
                    self.short_period, self.long_period
                ),
            )
        } else if prev_short >= prev_long && curr_short < curr_long {
            (
                Signal::Sell,
                format!(
                    "Death cross: SMA{}({curr_short:.0}) < SMA{}({curr_long:.0})",
                    self.short_period, self.long_period
                ),
            )
        } else {
            (
                Signal::Hold,
                format!(
                    "No crossover: SMA{}={curr_short:.0}, SMA{}={curr_long:.0}",
                    self.short_period, self.long_period
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

    fn strategy(short: usize, long: usize) -> SmaCrossoverStrategy {
        SmaCrossoverStrategy::new(&serde_json::json!({ "short_period": short, "long_period": long }))
            .unwrap()
    }

    #[test]
    fn rejects_short_not_less_than_long() {
        assert!(SmaCrossoverStrategy::new(&serde_json::json!({ "short_period": 20, "long_period": 5 })).is_err());
    }

    #[test]
    fn rejects_short_period_below_two() {
        assert!(SmaCrossoverStrategy::new(&serde_json::json!({ "short_period": 1, "long_period": 10 })).is_err());
    }

    #[test]
    fn holds_on_insufficient_data() {
        let s = strategy(2, 3);
        let candles: Vec<Candle> = (1..=3).map(|i| candle(i as f64)).collect();
        assert_eq!(s.evaluate(0.0, &candles, &[]), Signal::Hold);
        assert!(s.last_reason().contains("Insufficient"));
    }

    // S3 — golden cross
    #[test]
    fn detects_golden_cross() {
        let s = strategy(2, 3);
        // Flat-then-rising series produces a short MA that overtakes the long MA.
        let closes = [10.0, 10.0, 10.0, 10.0, 20.0, 30.0];
        let candles: Vec<Candle> = closes.iter().map(|&c| candle(c)).collect();
        let signal = s.evaluate(0.0, &candles, &[]);
        assert_eq!(signal, Signal::Buy);
        assert!(s.last_reason().contains("Golden cross"));
    }

    // S4 — death cross
    #[test]
    fn detects_death_cross() {
        let s = strategy(2, 3);
        let closes = [30.0, 30.0, 30.0, 30.0, 20.0, 10.0];
        let candles: Vec<Candle> = closes.iter().map(|&c| candle(c)).collect();
        let signal = s.evaluate(0.0, &candles, &[]);
        assert_eq!(signal, Signal::Sell);
        assert!(s.last_reason().contains("Death cross"));
    }

    #[test]
    fn holds_when_no_crossover() {
        let s = strategy(2, 3);
        let closes = [10.0, 10.0, 10.0, 10.0, 10.0, 10.0];
        let candles: Vec<Candle> = closes.iter().map(|&c| candle(c)).collect();
        assert_eq!(s.evaluate(0.0, &candles, &[]), Signal::Hold);
    }
}
