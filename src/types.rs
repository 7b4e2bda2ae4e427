// =============================================================================
// Shared types used across the session engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Result of a strategy evaluation. No other values are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Hold => write!(f, "HOLD"),
        }
    }
}

/// Normalized account balance snapshot, shaped after the KIS summary record.
///
/// Amounts are carried as strings representing non-negative integers,
/// matching the vendor's own representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceInfo {
    pub tot_evlu_amt: String,
    pub evlu_pfls_smtl_amt: String,
    pub pchs_amt_smtl_amt: String,
    pub dnca_tot_amt: String,
    pub nxdy_excc_amt: String,
}

/// Normalized current-price snapshot for a single symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceInfo {
    pub stock_code: String,
    pub stock_name: String,
    pub current_price: f64,
    pub change: f64,
    pub change_rate: f64,
    pub volume: u64,
    pub high: f64,
    pub low: f64,
    pub open_price: f64,
}

/// A single OHLCV daily candle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// A single held position row, as returned by the holdings endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub stock_code: String,
    pub hldg_qty: f64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Normalized order placement result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_no: String,
    pub filled_price: Option<f64>,
    pub filled_quantity: Option<u64>,
    pub raw: serde_json::Value,
}
