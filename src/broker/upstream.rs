// =============================================================================
// Upstream Brokerage Client — HMAC-signed, synchronous REST calls
// =============================================================================
//
// Models the opaque vendor SDK handle that spec §6 requires: a synchronous
// client exposing fetch_balance / fetch_price / fetch_ohlcv /
// create_market_buy_order / create_market_sell_order /
// create_limit_buy_order / create_limit_sell_order. All methods are
// blocking — callers (KisBroker) must run them via `spawn_blocking` so the
// cooperative scheduler is never blocked.
//
// SECURITY: the secret is never logged or serialized; signing mirrors the
// teacher's Binance client (HMAC-SHA256 over a canonical query string).
// =============================================================================

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use super::error::BrokerError;

type HmacSha256 = Hmac<Sha256>;

/// Default recv-window sent with every signed request (milliseconds).
const RECV_WINDOW: u64 = 5000;

/// Blocking, signed REST client for the upstream brokerage API.
#[derive(Clone)]
pub struct UpstreamClient {
    app_key: String,
    app_secret: String,
    account_no: String,
    account_suffix: String,
    base_url: String,
    client: reqwest::blocking::Client,
}

impl UpstreamClient {
    pub fn new(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        account_no: impl Into<String>,
        account_suffix: impl Into<String>,
        environment: &str,
    ) -> Self {
        let base_url = if environment == "real" {
            "https://openapi.koreainvestment.com:9443".to_string()
        } else {
            "https://openapivts.koreainvestment.com:29443".to_string()
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build blocking reqwest client");

        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            account_no: account_no.into(),
            account_suffix: account_suffix.into(),
            base_url,
            client,
        }
    }

    fn timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before UNIX epoch")
            .as_millis() as u64
    }

    fn sign(&self, query: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.app_secret.as_bytes())
            .expect("HMAC accepts any key size");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn signed_query(&self, params: &str) -> String {
        let ts = Self::timestamp_ms();
        let base = if params.is_empty() {
            format!("CANO={}&ACNT_PRDT_CD={}&timestamp={ts}&recvWindow={RECV_WINDOW}", self.account_no, self.account_suffix)
        } else {
            format!(
                "{params}&CANO={}&ACNT_PRDT_CD={}&timestamp={ts}&recvWindow={RECV_WINDOW}",
                self.account_no, self.account_suffix
            )
        };
        let sig = self.sign(&base);
        format!("{base}&signature={sig}")
    }

    fn get(&self, path: &str, params: &str) -> Result<Value, BrokerError> {
        let qs = self.signed_query(params);
        let url = format!("{}{path}?{qs}", self.base_url);

        let resp = self
            .client
            .get(&url)
            .header("appkey", &self.app_key)
            .send()
            .map_err(|e| BrokerError::Connection(format!("GET {path} failed: {e}")))?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .map_err(|e| BrokerError::Connection(format!("failed to parse {path} response: {e}")))?;

        if !status.is_success() {
            return Err(BrokerError::Connection(format!(
                "{path} returned {status}: {body}"
            )));
        }
        debug!(path, "upstream GET succeeded");
        Ok(body)
    }

    fn post(&self, path: &str, params: &str) -> Result<Value, BrokerError> {
        let qs = self.signed_query(params);
        let url = format!("{}{path}?{qs}", self.base_url);

        let resp = self
            .client
            .post(&url)
            .header("appkey", &self.app_key)
            .send()
            .map_err(|e| BrokerError::Order(format!("POST {path} failed: {e}")))?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .map_err(|e| BrokerError::Order(format!("failed to parse {path} response: {e}")))?;

        if !status.is_success() {
            return Err(BrokerError::Order(format!(
                "{path} returned {status}: {body}"
            )));
        }
        debug!(path, "upstream POST succeeded");
        Ok(body)
    }

    pub fn fetch_balance(&self) -> Result<Value, BrokerError> {
        self.get("/uapi/domestic-stock/v1/trading/inquire-balance", "")
    }

    pub fn fetch_price(&self, stock_code: &str) -> Result<Value, BrokerError> {
        self.get(
            "/uapi/domestic-stock/v1/quotations/inquire-price",
            &format!("FID_INPUT_ISCD={stock_code}"),
        )
    }

    pub fn fetch_ohlcv(&self, stock_code: &str, period: &str) -> Result<Value, BrokerError> {
        self.get(
            "/uapi/domestic-stock/v1/quotations/inquire-daily-itemchartprice",
            &format!("FID_INPUT_ISCD={stock_code}&FID_PERIOD_DIV_CODE={period}"),
        )
    }

    pub fn create_market_buy_order(&self, stock_code: &str, qty: u32) -> Result<Value, BrokerError> {
        self.post(
            "/uapi/domestic-stock/v1/trading/order-cash",
            &format!("PDNO={stock_code}&ORD_QTY={qty}&ORD_DVSN=01&SLL_BUY_DVSN_CD=02"),
        )
    }

    pub fn create_market_sell_order(&self, stock_code: &str, qty: u32) -> Result<Value, BrokerError> {
        self.post(
            "/uapi/domestic-stock/v1/trading/order-cash",
            &format!("PDNO={stock_code}&ORD_QTY={qty}&ORD_DVSN=01&SLL_BUY_DVSN_CD=01"),
        )
    }

    pub fn create_limit_buy_order(
        &self,
        stock_code: &str,
        qty: u32,
        price: u64,
    ) -> Result<Value, BrokerError> {
        self.post(
            "/uapi/domestic-stock/v1/trading/order-cash",
            &format!(
                "PDNO={stock_code}&ORD_QTY={qty}&ORD_UNPR={price}&ORD_DVSN=00&SLL_BUY_DVSN_CD=02"
            ),
        )
    }

    pub fn create_limit_sell_order(
        &self,
        stock_code: &str,
        qty: u32,
        price: u64,
    ) -> Result<Value, BrokerError> {
        self.post(
            "/uapi/domestic-stock/v1/trading/order-cash",
            &format!(
                "PDNO={stock_code}&ORD_QTY={qty}&ORD_UNPR={price}&ORD_DVSN=00&SLL_BUY_DVSN_CD=01"
            ),
        )
    }
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("app_key", &"<redacted>")
            .field("app_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}
