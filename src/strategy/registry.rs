// =============================================================================
// Strategy registry — match-based dispatch by type name
// =============================================================================

use super::{rsi::RsiStrategy, sma_crossover::SmaCrossoverStrategy, threshold::ThresholdStrategy};
use super::{Strategy, StrategyDescriptor};
use crate::error::EngineError;

pub fn get_strategy(
    type_name: &str,
    parameters: &serde_json::Value,
) -> Result<Box<dyn Strategy>, EngineError> {
    match type_name {
        ThresholdStrategy::TYPE_NAME => Ok(Box::new(ThresholdStrategy::new(parameters)?)),
        SmaCrossoverStrategy::TYPE_NAME => Ok(Box::new(SmaCrossoverStrategy::new(parameters)?)),
        RsiStrategy::TYPE_NAME => Ok(Box::new(RsiStrategy::new(parameters)?)),
        other => Err(EngineError::Config(format!("unknown strategy type: {other}"))),
    }
}

pub fn get_available_strategies() -> Vec<StrategyDescriptor> {
    vec![
        StrategyDescriptor {
            type_name: ThresholdStrategy::TYPE_NAME,
            display_name: ThresholdStrategy::DISPLAY_NAME,
            description: ThresholdStrategy::DESCRIPTION,
            parameter_schema: ThresholdStrategy::parameter_schema(),
        },
        StrategyDescriptor {
            type_name: SmaCrossoverStrategy::TYPE_NAME,
            display_name: SmaCrossoverStrategy::DISPLAY_NAME,
            description: SmaCrossoverStrategy::DESCRIPTION,
            parameter_schema: SmaCrossoverStrategy::parameter_schema(),
        },
        StrategyDescriptor {
            type_name: RsiStrategy::TYPE_NAME,
            display_name: RsiStrategy::DISPLAY_NAME,
            description: RsiStrategy::DESCRIPTION,
            parameter_schema: RsiStrategy::parameter_schema(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_strategy_type() {
        let err = get_strategy("not_a_real_strategy", &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn builds_each_known_strategy() {
        assert!(get_strategy("threshold", &serde_json::json!({"buy_price": 1, "sell_price": 2})).is_ok());
        assert!(get_strategy("sma_crossover", &serde_json::json!({})).is_ok());
        assert!(get_strategy("rsi", &serde_json::json!({})).is_ok());
    }

    #[test]
    fn lists_three_strategies() {
        let list = get_available_strategies();
        assert_eq!(list.len(), 3);
        let names: Vec<_> = list.iter().map(|d| d.type_name).collect();
        assert!(names.contains(&"threshold"));
        assert!(names.contains(&"sma_crossover"));
        assert!(names.contains(&"rsi"));
    }
}
