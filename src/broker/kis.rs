// =============================================================================
// KisBroker — concrete BrokerAdapter backed by UpstreamClient
// =============================================================================
//
// Every call acquires a rate-limiter token before dispatching to the
// vendor, then runs the blocking HTTP round trip via `spawn_blocking`.
// `get_balance` additionally caches the last successful snapshot: on a
// transient upstream failure it falls back to that snapshot and logs a
// warning instead of surfacing the error, so a single flaky poll does not
// flip a running session into ERROR.
// =============================================================================

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::warn;

use super::error::BrokerError;
use super::upstream::UpstreamClient;
use super::BrokerAdapter;
use crate::rate_limiter::RateLimiter;
use crate::types::{BalanceInfo, Candle, Holding, OrderResult, PriceInfo};

pub struct KisBroker {
    client: UpstreamClient,
    limiter: RateLimiter,
    cached_balance: RwLock<Option<BalanceInfo>>,
}

impl KisBroker {
    pub fn new(client: UpstreamClient, max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            client,
            limiter: RateLimiter::new(max_tokens, refill_rate),
            cached_balance: RwLock::new(None),
        }
    }

    async fn run_blocking<T, F>(&self, f: F) -> Result<T, BrokerError>
    where
        F: FnOnce(&UpstreamClient) -> Result<T, BrokerError> + Send + 'static,
        T: Send + 'static,
    {
        self.limiter.acquire().await;
        let client = self.client.clone();
        tokio::task::spawn_blocking(move || f(&client))
            .await
            .map_err(|e| BrokerError::Connection(format!("blocking task panicked: {e}")))?
    }
}

/// Resolves a fresh balance fetch against the last cached snapshot: a
/// successful fetch always wins, a failed one falls back to `cached` (with a
/// warning logged by the caller) and only propagates if nothing was ever
/// cached yet (i.e. `connect()` itself never succeeded).
fn resolve_balance(
    fresh: Result<BalanceInfo, BrokerError>,
    cached: Option<BalanceInfo>,
) -> Result<BalanceInfo, BrokerError> {
    match fresh {
        Ok(balance) => Ok(balance),
        Err(e) => match cached {
            Some(balance) => {
                warn!(error = %e, "balance fetch failed, serving cached snapshot");
                Ok(balance)
            }
            None => Err(e),
        },
    }
}

fn parse_balance(raw: serde_json::Value) -> Result<BalanceInfo, BrokerError> {
    let out = raw
        .get("output2")
        .and_then(|v| v.as_array())
        .and_then(|v| v.first())
        .ok_or_else(|| BrokerError::Connection("balance response missing output2[0]".into()))?;

    let field = |name: &str| -> String {
        out.get(name)
            .and_then(|v| v.as_str())
            .unwrap_or("0")
            .to_string()
    };

    Ok(BalanceInfo {
        tot_evlu_amt: field("tot_evlu_amt"),
        evlu_pfls_smtl_amt: field("evlu_pfls_smtl_amt"),
        pchs_amt_smtl_amt: field("pchs_amt_smtl_amt"),
        dnca_tot_amt: field("dnca_tot_amt"),
        nxdy_excc_amt: field("nxdy_excc_amt"),
    })
}

fn parse_holdings(raw: serde_json::Value) -> Result<Vec<Holding>, BrokerError> {
    let rows = raw
        .get("output1")
        .and_then(|v| v.as_array())
        .ok_or_else(|| BrokerError::Connection("holdings response missing output1".into()))?;

    rows.iter()
        .map(|row| {
            let stock_code = row
                .get("pdno")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let hldg_qty = row
                .get("hldg_qty")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<f64>().ok())
                .unwrap_or(0.0);
            let extra = row.as_object().cloned().unwrap_or_default();
            Ok(Holding {
                stock_code,
                hldg_qty,
                extra,
            })
        })
        .collect::<Result<Vec<Holding>, BrokerError>>()
        .map(|holdings| holdings.into_iter().filter(|h| h.hldg_qty > 0.0).collect())
}

fn parse_price(stock_code: &str, raw: serde_json::Value) -> Result<PriceInfo, BrokerError> {
    let out = raw
        .get("output")
        .ok_or_else(|| BrokerError::Connection("price response missing output".into()))?;

    let f = |name: &str| -> f64 {
        out.get(name)
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0)
    };

    Ok(PriceInfo {
        stock_code: stock_code.to_string(),
        stock_name: out
            .get("hts_kor_isnm")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        current_price: f("stck_prpr"),
        change: f("prdy_vrss"),
        change_rate: f("prdy_ctrt"),
        volume: f("acml_vol") as u64,
        high: f("stck_hgpr"),
        low: f("stck_lwpr"),
        open_price: f("stck_oprc"),
    })
}

fn parse_ohlcv(raw: serde_json::Value) -> Result<Vec<Candle>, BrokerError> {
    let rows = raw
        .get("output2")
        .and_then(|v| v.as_array())
        .ok_or_else(|| BrokerError::Connection("ohlcv response missing output2".into()))?;

    let f = |row: &serde_json::Value, name: &str| -> f64 {
        row.get(name)
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0)
    };

    Ok(rows
        .iter()
        .map(|row| Candle {
            date: row
                .get("stck_bsop_date")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            open: f(row, "stck_oprc"),
            high: f(row, "stck_hgpr"),
            low: f(row, "stck_lwpr"),
            close: f(row, "stck_clpr"),
            volume: f(row, "acml_vol") as u64,
        })
        .collect())
}

fn parse_order(raw: serde_json::Value) -> Result<OrderResult, BrokerError> {
    let out = raw
        .get("output")
        .ok_or_else(|| BrokerError::Order("order response missing output".into()))?;

    let order_no = out
        .get("ODNO")
        .and_then(|v| v.as_str())
        .ok_or_else(|| BrokerError::Order("order response missing ODNO".into()))?
        .to_string();

    Ok(OrderResult {
        order_no,
        filled_price: None,
        filled_quantity: None,
        raw,
    })
}

#[async_trait::async_trait]
impl BrokerAdapter for KisBroker {
    async fn connect(&self) -> Result<bool, BrokerError> {
        let balance = self.run_blocking(|c| c.fetch_balance()).await.and_then(parse_balance)?;
        *self.cached_balance.write() = Some(balance);
        Ok(true)
    }

    async fn get_balance(&self) -> Result<BalanceInfo, BrokerError> {
        let fresh = self.run_blocking(|c| c.fetch_balance()).await.and_then(parse_balance);
        let cached = self.cached_balance.read().clone();
        let resolved = resolve_balance(fresh, cached)?;
        *self.cached_balance.write() = Some(resolved.clone());
        Ok(resolved)
    }

    async fn get_holdings(&self) -> Result<Vec<Holding>, BrokerError> {
        self.run_blocking(|c| c.fetch_balance()).await.and_then(parse_holdings)
    }

    async fn get_current_price(&self, stock_code: &str) -> Result<PriceInfo, BrokerError> {
        let code = stock_code.to_string();
        let raw = self.run_blocking(move |c| c.fetch_price(&code)).await?;
        parse_price(stock_code, raw)
    }

    async fn get_ohlcv(
        &self,
        stock_code: &str,
        period: &str,
        count: usize,
    ) -> Result<Vec<Candle>, BrokerError> {
        let code = stock_code.to_string();
        let per = period.to_string();
        let mut candles = self
            .run_blocking(move |c| c.fetch_ohlcv(&code, &per))
            .await
            .and_then(parse_ohlcv)?;
        candles.truncate(count.min(200));
        Ok(candles)
    }

    async fn buy_market(&self, stock_code: &str, quantity: u32) -> Result<OrderResult, BrokerError> {
        let code = stock_code.to_string();
        self.run_blocking(move |c| c.create_market_buy_order(&code, quantity))
            .await
            .and_then(parse_order)
    }

    async fn sell_market(&self, stock_code: &str, quantity: u32) -> Result<OrderResult, BrokerError> {
        let code = stock_code.to_string();
        self.run_blocking(move |c| c.create_market_sell_order(&code, quantity))
            .await
            .and_then(parse_order)
    }

    async fn buy_limit(
        &self,
        stock_code: &str,
        quantity: u32,
        price: u64,
    ) -> Result<OrderResult, BrokerError> {
        let code = stock_code.to_string();
        self.run_blocking(move |c| c.create_limit_buy_order(&code, quantity, price))
            .await
            .and_then(parse_order)
    }

    async fn sell_limit(
        &self,
        stock_code: &str,
        quantity: u32,
        price: u64,
    ) -> Result<OrderResult, BrokerError> {
        let code = stock_code.to_string();
        self.run_blocking(move |c| c.create_limit_sell_order(&code, quantity, price))
            .await
            .and_then(parse_order)
    }
}

/// Convenience constructor used by the manager: builds a `KisBroker` wrapped
/// for trait-object storage.
pub fn build(client: UpstreamClient, max_tokens: f64, refill_rate: f64) -> Arc<dyn BrokerAdapter> {
    Arc::new(KisBroker::new(client, max_tokens, refill_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_balance() -> BalanceInfo {
        BalanceInfo {
            tot_evlu_amt: "1000000".into(),
            evlu_pfls_smtl_amt: "5000".into(),
            pchs_amt_smtl_amt: "995000".into(),
            dnca_tot_amt: "200000".into(),
            nxdy_excc_amt: "200000".into(),
        }
    }

    #[test]
    fn parse_balance_reads_output2_first_row() {
        let raw = json!({
            "output2": [{
                "tot_evlu_amt": "1234500",
                "evlu_pfls_smtl_amt": "1500",
                "pchs_amt_smtl_amt": "1233000",
                "dnca_tot_amt": "500000",
                "nxdy_excc_amt": "500000",
            }]
        });
        let balance = parse_balance(raw).unwrap();
        assert_eq!(balance.tot_evlu_amt, "1234500");
        assert_eq!(balance.dnca_tot_amt, "500000");
    }

    #[test]
    fn parse_balance_missing_output2_is_connection_error() {
        let err = parse_balance(json!({})).unwrap_err();
        assert!(matches!(err, BrokerError::Connection(_)));
    }

    #[test]
    fn parse_holdings_reads_output1_rows_and_keeps_extra_fields() {
        let raw = json!({
            "output1": [
                { "pdno": "005930", "hldg_qty": "10", "prdt_name": "Samsung Electronics" },
                { "pdno": "000660", "hldg_qty": "0", "prdt_name": "SK Hynix" },
            ]
        });
        let holdings = parse_holdings(raw).unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].stock_code, "005930");
        assert_eq!(holdings[0].hldg_qty, 10.0);
        assert_eq!(
            holdings[0].extra.get("prdt_name").and_then(|v| v.as_str()),
            Some("Samsung Electronics")
        );
    }

    #[test]
    fn parse_holdings_drops_zero_quantity_rows() {
        let raw = json!({
            "output1": [
                { "pdno": "005930", "hldg_qty": "0" },
                { "pdno": "000660", "hldg_qty": "5" },
            ]
        });
        let holdings = parse_holdings(raw).unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].stock_code, "000660");
    }

    #[test]
    fn parse_price_reads_current_price_and_ohlc_fields() {
        let raw = json!({
            "output": {
                "hts_kor_isnm": "Samsung Electronics",
                "stck_prpr": "71000",
                "prdy_vrss": "500",
                "prdy_ctrt": "0.71",
                "acml_vol": "12345678",
                "stck_hgpr": "71500",
                "stck_lwpr": "70200",
                "stck_oprc": "70500",
            }
        });
        let price = parse_price("005930", raw).unwrap();
        assert_eq!(price.stock_code, "005930");
        assert_eq!(price.current_price, 71000.0);
        assert_eq!(price.volume, 12_345_678);
    }

    #[test]
    fn parse_ohlcv_reads_output2_rows_in_order() {
        let raw = json!({
            "output2": [
                { "stck_bsop_date": "20260727", "stck_oprc": "70000", "stck_hgpr": "71000", "stck_lwpr": "69500", "stck_clpr": "70800", "acml_vol": "1000000" },
                { "stck_bsop_date": "20260724", "stck_oprc": "69000", "stck_hgpr": "70200", "stck_lwpr": "68800", "stck_clpr": "70000", "acml_vol": "900000" },
            ]
        });
        let candles = parse_ohlcv(raw).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].date, "20260727");
        assert_eq!(candles[0].close, 70800.0);
        assert_eq!(candles[1].volume, 900_000);
    }

    #[test]
    fn parse_order_requires_odno() {
        let err = parse_order(json!({ "output": {} })).unwrap_err();
        assert!(matches!(err, BrokerError::Order(_)));

        let order = parse_order(json!({ "output": { "ODNO": "0000117057" } })).unwrap();
        assert_eq!(order.order_no, "0000117057");
        assert!(order.filled_price.is_none());
    }

    // S11 — a failed refresh after a prior success serves the cached snapshot.
    #[test]
    fn resolve_balance_falls_back_to_cache_on_failure() {
        let cached = sample_balance();
        let resolved =
            resolve_balance(Err(BrokerError::Connection("timeout".into())), Some(cached.clone()))
                .unwrap();
        assert_eq!(resolved.tot_evlu_amt, cached.tot_evlu_amt);
    }

    // S11 — a `connect()` that never succeeded has nothing to fall back to.
    #[test]
    fn resolve_balance_propagates_when_nothing_cached_yet() {
        let err = resolve_balance(Err(BrokerError::Connection("timeout".into())), None).unwrap_err();
        assert!(matches!(err, BrokerError::Connection(_)));
    }

    #[test]
    fn resolve_balance_prefers_fresh_over_cache() {
        let fresh = sample_balance();
        let stale = BalanceInfo {
            tot_evlu_amt: "1".into(),
            ..sample_balance()
        };
        let resolved = resolve_balance(Ok(fresh.clone()), Some(stale)).unwrap();
        assert_eq!(resolved.tot_evlu_amt, fresh.tot_evlu_amt);
    }
}
