//! Gemini exchange integration.
//!
//! Public endpoints (price feed, symbol details) are plain GETs. Private
//! endpoints follow the Gemini signing scheme: a JSON payload carrying
//! the request path and a nonce, base64-encoded, HMAC-SHA384 signed with
//! the API secret, sent via `X-GEMINI-*` headers on a bodyless POST.
//!
//! API docs: https://docs.gemini.com/rest-api/#private-api-invocation
//! Rate limit: 600 requests/minute for public, 120 for private.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha384;
use std::str::FromStr;
use tracing::{debug, info};

use super::{ExchangeGateway, GatewayError};
use crate::types::{BalanceSnapshot, OrderHandle, OrderSide, SymbolPrecision};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const PRODUCTION_URL: &str = "https://api.gemini.com";
const SANDBOX_URL: &str = "https://api.sandbox.gemini.com";
const VENUE_NAME: &str = "gemini";

type HmacSha384 = Hmac<Sha384>;

// ---------------------------------------------------------------------------
// API response types (Gemini JSON → Rust)
// ---------------------------------------------------------------------------

/// One entry of `GET /v1/pricefeed`. Prices arrive as strings.
#[derive(Debug, Deserialize)]
struct PriceFeedEntry {
    pair: String,
    price: String,
}

/// One entry of `POST /v1/balances`.
#[derive(Debug, Deserialize)]
struct BalanceEntry {
    currency: String,
    #[serde(default)]
    available: String,
}

/// `GET /v1/symbols/details/:symbol`. We only deserialize what we need:
/// `tick_size` is the base (amount) increment, `quote_increment` the
/// price increment.
#[derive(Debug, Deserialize)]
struct SymbolDetails {
    tick_size: f64,
    quote_increment: f64,
}

/// One entry of `POST /v1/orders` (active orders).
#[derive(Debug, Deserialize)]
struct ActiveOrder {
    order_id: String,
    symbol: String,
    side: String,
    price: String,
    remaining_amount: String,
}

/// Response of `POST /v1/order/new`. On success Gemini returns an order
/// status object with an `order_id`; on failure a `{result: "error"}`
/// envelope with `reason` and `message`.
#[derive(Debug, Deserialize)]
struct OrderResponse {
    #[serde(default)]
    order_id: Option<String>,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Gemini REST client bound to one `<currency>usd` pair.
pub struct GeminiClient {
    http: Client,
    base_url: String,
    currency: String,
    symbol: String,
    api_key: String,
    api_secret: SecretString,
}

impl GeminiClient {
    pub fn new(
        currency: &str,
        api_key: String,
        api_secret: SecretString,
        sandbox: bool,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("sideways/0.1.0 (gemini-trading-bot)")
            .build()
            .context("Failed to build HTTP client for Gemini")?;

        let base_url = if sandbox { SANDBOX_URL } else { PRODUCTION_URL };

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            currency: currency.to_uppercase(),
            symbol: format!("{}usd", currency.to_lowercase()),
            api_key,
            api_secret,
        })
    }

    // -- Signing ---------------------------------------------------------

    /// POSIX timestamp in microseconds. Strictly increasing between
    /// cycles, which is all Gemini requires of a nonce.
    fn nonce() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or_default()
    }

    /// Base64-encode the payload for the `X-GEMINI-PAYLOAD` header.
    fn encode_payload(request: &str, nonce: u64, extra: serde_json::Value) -> String {
        let mut payload = match extra {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        payload.insert("request".to_string(), request.into());
        payload.insert("nonce".to_string(), nonce.to_string().into());
        BASE64.encode(serde_json::Value::Object(payload).to_string())
    }

    /// Hex HMAC-SHA384 of the encoded payload.
    fn sign(secret: &str, encoded_payload: &str) -> String {
        // HMAC accepts keys of any length, new_from_slice cannot fail.
        let mut mac = HmacSha384::new_from_slice(secret.as_bytes())
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
        mac.update(encoded_payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    // -- Transport -------------------------------------------------------

    async fn public_get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, GatewayError> {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "Gemini public request");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("Gemini request failed: {e}")))?;

        Self::check_status(resp)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("Malformed Gemini response: {e}")))
    }

    async fn private_post<T: serde::de::DeserializeOwned>(
        &self,
        request: &str,
        extra: serde_json::Value,
    ) -> Result<T, GatewayError> {
        let encoded = Self::encode_payload(request, Self::nonce(), extra);
        let signature = Self::sign(self.api_secret.expose_secret(), &encoded);

        debug!(request, "Gemini private request");

        let resp = self
            .http
            .post(format!("{}{request}", self.base_url))
            .header("Content-Type", "text/plain")
            .header("Content-Length", "0")
            .header("X-GEMINI-APIKEY", &self.api_key)
            .header("X-GEMINI-PAYLOAD", &encoded)
            .header("X-GEMINI-SIGNATURE", &signature)
            .header("Cache-Control", "no-cache")
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("Gemini request failed: {e}")))?;

        Self::check_status(resp)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("Malformed Gemini response: {e}")))
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        if status.is_server_error() {
            Err(GatewayError::Unavailable(format!(
                "Gemini API error {status}: {body}"
            )))
        } else {
            Err(GatewayError::Rejected(format!(
                "Gemini API error {status}: {body}"
            )))
        }
    }

    // -- Response conversion --------------------------------------------

    fn pick_price(feed: &[PriceFeedEntry], pair: &str) -> Result<Decimal, GatewayError> {
        let entry = feed
            .iter()
            .find(|e| e.pair == pair)
            .ok_or_else(|| GatewayError::Unavailable(format!("No price feed entry for {pair}")))?;
        Decimal::from_str(&entry.price)
            .map_err(|e| GatewayError::Unavailable(format!("Bad price {:?}: {e}", entry.price)))
    }

    fn balances_from(
        entries: &[BalanceEntry],
        currency: &str,
    ) -> Result<BalanceSnapshot, GatewayError> {
        let available = |cur: &str| -> Result<Decimal, GatewayError> {
            match entries.iter().find(|e| e.currency == cur) {
                // An account that never held the currency omits the entry.
                None => Ok(Decimal::ZERO),
                Some(e) => Decimal::from_str(&e.available).map_err(|err| {
                    GatewayError::Unavailable(format!("Bad {cur} balance {:?}: {err}", e.available))
                }),
            }
        };

        Ok(BalanceSnapshot {
            usd: available("USD")?,
            crypto: available(currency)?,
        })
    }

    /// Number of decimal places implied by a venue increment, e.g.
    /// `0.01` → 2, `1e-6` → 6, `1.0` → 0.
    fn increment_decimals(increment: f64) -> u32 {
        let mut v = increment;
        let mut dp = 0;
        while v < 0.999_999 && dp < 12 {
            v *= 10.0;
            dp += 1;
        }
        dp
    }

    fn parse_active_order(order: ActiveOrder) -> Result<OrderHandle, GatewayError> {
        let side = match order.side.as_str() {
            "buy" => OrderSide::Buy,
            _ => OrderSide::Sell,
        };
        let price = Decimal::from_str(&order.price).map_err(|e| {
            GatewayError::Unavailable(format!("Bad order price {:?}: {e}", order.price))
        })?;
        let amount = Decimal::from_str(&order.remaining_amount).map_err(|e| {
            GatewayError::Unavailable(format!(
                "Bad order amount {:?}: {e}",
                order.remaining_amount
            ))
        })?;
        Ok(OrderHandle {
            id: order.order_id,
            side,
            price,
            amount,
        })
    }

    fn order_handle_from(
        resp: OrderResponse,
        side: OrderSide,
        price: Decimal,
        amount: Decimal,
    ) -> Result<OrderHandle, GatewayError> {
        if resp.result.as_deref() == Some("error") || resp.order_id.is_none() {
            let reason = resp.reason.unwrap_or_else(|| "unknown".to_string());
            let message = resp.message.unwrap_or_default();
            return Err(GatewayError::Rejected(format!("{reason}: {message}")));
        }
        Ok(OrderHandle {
            id: resp.order_id.unwrap_or_default(),
            side,
            price,
            amount,
        })
    }
}

// ---------------------------------------------------------------------------
// ExchangeGateway trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl ExchangeGateway for GeminiClient {
    async fn get_balances(&self) -> Result<BalanceSnapshot, GatewayError> {
        let entries: Vec<BalanceEntry> =
            self.private_post("/v1/balances", serde_json::json!({})).await?;
        Self::balances_from(&entries, &self.currency)
    }

    async fn get_current_price(&self) -> Result<Decimal, GatewayError> {
        let feed: Vec<PriceFeedEntry> = self.public_get("/v1/pricefeed").await?;
        Self::pick_price(&feed, &format!("{}USD", self.currency))
    }

    async fn symbol_precision(&self) -> Result<SymbolPrecision, GatewayError> {
        let details: SymbolDetails = self
            .public_get(&format!("/v1/symbols/details/{}", self.symbol))
            .await?;
        Ok(SymbolPrecision {
            price_decimals: Self::increment_decimals(details.quote_increment),
            amount_decimals: Self::increment_decimals(details.tick_size),
        })
    }

    async fn open_orders(&self) -> Result<Vec<OrderHandle>, GatewayError> {
        let orders: Vec<ActiveOrder> =
            self.private_post("/v1/orders", serde_json::json!({})).await?;
        orders
            .into_iter()
            .filter(|o| o.symbol == self.symbol)
            .map(Self::parse_active_order)
            .collect()
    }

    async fn place_limit_order(
        &self,
        side: OrderSide,
        price: Decimal,
        amount: Decimal,
    ) -> Result<OrderHandle, GatewayError> {
        let body = serde_json::json!({
            "symbol": self.symbol,
            "amount": amount.to_string(),
            "price": price.to_string(),
            "side": side.as_api_str(),
            "type": "exchange limit",
            "client_order_id": format!("sideways-{}", uuid::Uuid::new_v4()),
        });

        let resp: OrderResponse = self.private_post("/v1/order/new", body).await?;
        let handle = Self::order_handle_from(resp, side, price, amount)?;

        info!(
            order_id = %handle.id,
            symbol = %self.symbol,
            side = %side,
            price = %price,
            amount = %amount,
            "Limit order placed"
        );

        Ok(handle)
    }

    fn name(&self) -> &str {
        VENUE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
