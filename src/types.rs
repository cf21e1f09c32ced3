//! Shared types for the sideways bot.
//!
//! These types form the data model used across all modules. They are
//! designed to be stable so that the exchange, storage, and engine
//! modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// The opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    /// Lowercase form as the Gemini API expects it.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Receipt returned by the venue after a limit order is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderHandle {
    pub id: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub amount: Decimal,
}

impl fmt::Display for OrderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} @ ${} [{}]",
            self.side, self.amount, self.price, self.id,
        )
    }
}

// ---------------------------------------------------------------------------
// Balances & venue metadata
// ---------------------------------------------------------------------------

/// Available balances for the bot's trading pair, fetched fresh each
/// cycle and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub usd: Decimal,
    pub crypto: Decimal,
}

impl fmt::Display for BalanceSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "USD=${} crypto={}", self.usd, self.crypto)
    }
}

/// Decimal-place limits the venue accepts for this symbol.
///
/// `price_decimals` comes from the quote increment, `amount_decimals`
/// from the base tick size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolPrecision {
    pub price_decimals: u32,
    pub amount_decimals: u32,
}

// ---------------------------------------------------------------------------
// Persisted state
// ---------------------------------------------------------------------------

/// The single durable record: the sell target computed when the position
/// was opened. Written only on entry to the BUY phase, read only in the
/// SELL phase. Decimals round-trip as strings so the price survives
/// restarts with no precision loss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub sell_price: Decimal,
    pub written_at: DateTime<Utc>,
}

impl PersistedState {
    pub fn new(sell_price: Decimal) -> Self {
        Self {
            sell_price,
            written_at: Utc::now(),
        }
    }
}

impl fmt::Display for PersistedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sell target ${} (written {})",
            self.sell_price, self.written_at,
        )
    }
}

// ---------------------------------------------------------------------------
// Cycle report
// ---------------------------------------------------------------------------

/// What a single cycle decided and did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleOutcome {
    /// Entered the BUY phase: order placed, counter-price persisted.
    PlacedBuy {
        price: Decimal,
        size: Decimal,
        sell_target: Decimal,
    },
    /// Entered the SELL phase: full position offered at the stored target.
    PlacedSell { price: Decimal, size: Decimal },
    /// The venue refused the order; balances are untouched.
    OrderRejected { side: OrderSide, reason: String },
    /// Crypto on hand but no persisted sell target; no order placed.
    MissingSellTarget,
    /// A limit order is already resting on the book.
    HeldOpenOrders,
    /// Neither balance above the dust floor.
    EmptyPortfolio,
}

/// Summary of a single evaluate-decide-place cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub outcome: CycleOutcome,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cycle #{}: ", self.cycle)?;
        match &self.outcome {
            CycleOutcome::PlacedBuy {
                price,
                size,
                sell_target,
            } => write!(f, "BUY {size} @ ${price}, sell target ${sell_target}"),
            CycleOutcome::PlacedSell { price, size } => {
                write!(f, "SELL {size} @ ${price}")
            }
            CycleOutcome::OrderRejected { side, reason } => {
                write!(f, "{side} order rejected: {reason}")
            }
            CycleOutcome::MissingSellTarget => write!(f, "sell target missing, holding"),
            CycleOutcome::HeldOpenOrders => write!(f, "open orders on the book, holding"),
            CycleOutcome::EmptyPortfolio => write!(f, "no balance to trade"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the sideways bot.
#[derive(Debug, thiserror::Error)]
pub enum SidewaysError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("exchange unavailable: {0}")]
    ExchangeUnavailable(String),

    #[error("{currency} balance present but no persisted sell target")]
    MissingSellPrice { currency: String },

    #[error("state store failure: {0}")]
    StateStore(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
