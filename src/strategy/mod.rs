// =============================================================================
// Strategy contract — C2
// =============================================================================
//
// A `Strategy` is a pure function of (current price, recent candles, current
// holdings) to a `Signal`, plus a human-readable explanation of the last
// decision. `last_reason` is read concurrently from the REST layer (for
// display) while the executor evaluates on its own cycle, so implementations
// store it behind a lock rather than a plain field.
// =============================================================================

pub mod registry;
pub mod rsi;
pub mod sma_crossover;
pub mod threshold;

use crate::error::EngineError;
use crate::types::{Candle, Holding, Signal};

pub trait Strategy: Send + Sync {
    /// Evaluate current market data and return a trading signal.
    fn evaluate(&self, current_price: f64, candles: &[Candle], holdings: &[Holding]) -> Signal;

    /// Human-readable explanation of the most recent `evaluate` call.
    /// Empty until the first evaluation.
    fn last_reason(&self) -> String;

    fn type_name(&self) -> &'static str;
}

/// Metadata describing a strategy type for the control plane's discovery
/// endpoint. `parameter_schema` is serialized straight from each strategy's
/// own schema function.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StrategyDescriptor {
    pub type_name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub parameter_schema: serde_json::Value,
}

/// Build a strategy instance from its type name and a JSON parameter blob.
///
/// Returns `EngineError::Config` for an unknown type name or parameters
/// that fail the strategy's own validation.
pub fn get_strategy(
    type_name: &str,
    parameters: &serde_json::Value,
) -> Result<Box<dyn Strategy>, EngineError> {
    registry::get_strategy(type_name, parameters)
}

/// List every registered strategy type along with its parameter schema.
pub fn get_available_strategies() -> Vec<StrategyDescriptor> {
    registry::get_available_strategies()
}
