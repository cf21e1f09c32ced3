//! Exchange connectivity.
//!
//! Defines the `ExchangeGateway` trait the engine trades through and
//! provides the Gemini implementation. The trait is bound to a single
//! trading pair at construction; the bot never trades more than one.

pub mod gemini;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::{BalanceSnapshot, OrderHandle, OrderSide, SymbolPrecision};

/// Gateway failures, split the way the engine needs to react to them:
/// `Unavailable` is transient (skip the cycle, the scheduler retries),
/// `Rejected` means the venue understood the request and refused it.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("exchange unreachable: {0}")]
    Unavailable(String),

    #[error("order rejected by venue: {0}")]
    Rejected(String),
}

/// Abstraction over the trading venue for one USD pair.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Available USD and crypto balances for the pair.
    async fn get_balances(&self) -> Result<BalanceSnapshot, GatewayError>;

    /// Current market price of the crypto in USD.
    async fn get_current_price(&self) -> Result<Decimal, GatewayError>;

    /// Decimal-place limits the venue accepts for prices and amounts.
    async fn symbol_precision(&self) -> Result<SymbolPrecision, GatewayError>;

    /// Limit orders currently resting on the book for the pair.
    async fn open_orders(&self) -> Result<Vec<OrderHandle>, GatewayError>;

    /// Place a limit order at the given price for the given amount of
    /// crypto.
    async fn place_limit_order(
        &self,
        side: OrderSide,
        price: Decimal,
        amount: Decimal,
    ) -> Result<OrderHandle, GatewayError>;

    /// Venue name for logging and identification.
    fn name(&self) -> &str;
}
