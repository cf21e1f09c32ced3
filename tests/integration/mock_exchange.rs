//! Mock exchange for integration testing.
//!
//! Provides a deterministic `ExchangeGateway` implementation with
//! scriptable balances, price, order book, and failure injection — all
//! in-memory with no external dependencies.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};

use sideways::exchange::{ExchangeGateway, GatewayError};
use sideways::types::{BalanceSnapshot, OrderHandle, OrderSide, SymbolPrecision};

/// A mock trading venue for deterministic testing.
///
/// All state is in-memory and shared through `Arc`, so a clone handed to
/// the engine stays controllable from test code.
#[derive(Clone)]
pub struct MockExchange {
    balances: Arc<Mutex<BalanceSnapshot>>,
    price: Arc<Mutex<Decimal>>,
    precision: SymbolPrecision,
    /// Orders currently resting on the book.
    open: Arc<Mutex<Vec<OrderHandle>>>,
    /// Every order ever accepted, in placement order.
    placed: Arc<Mutex<Vec<OrderHandle>>>,
    /// If set, all operations return this transient error.
    force_error: Arc<Mutex<Option<String>>>,
    /// If set, order placement returns a venue rejection.
    rejection: Arc<Mutex<Option<String>>>,
    next_id: Arc<Mutex<u64>>,
}

impl MockExchange {
    pub fn new(usd: Decimal, crypto: Decimal, price: Decimal) -> Self {
        Self {
            balances: Arc::new(Mutex::new(BalanceSnapshot { usd, crypto })),
            price: Arc::new(Mutex::new(price)),
            precision: SymbolPrecision {
                price_decimals: 2,
                amount_decimals: 6,
            },
            open: Arc::new(Mutex::new(Vec::new())),
            placed: Arc::new(Mutex::new(Vec::new())),
            force_error: Arc::new(Mutex::new(None)),
            rejection: Arc::new(Mutex::new(None)),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    pub fn set_balances(&self, usd: Decimal, crypto: Decimal) {
        *self.balances.lock().unwrap() = BalanceSnapshot { usd, crypto };
    }

    pub fn set_price(&self, price: Decimal) {
        *self.price.lock().unwrap() = price;
    }

    /// Force all subsequent operations to return a transient error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    /// Make the venue reject the next placements.
    pub fn set_rejection(&self, reason: &str) {
        *self.rejection.lock().unwrap() = Some(reason.to_string());
    }

    /// Simulate all resting orders filling: the book empties. Balance
    /// changes are the test's responsibility.
    pub fn fill_all(&self) {
        self.open.lock().unwrap().clear();
    }

    /// Every order accepted so far.
    pub fn placed_orders(&self) -> Vec<OrderHandle> {
        self.placed.lock().unwrap().clone()
    }

    fn check_error(&self) -> Result<(), GatewayError> {
        if let Some(msg) = self.force_error.lock().unwrap().as_ref() {
            return Err(GatewayError::Unavailable(msg.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl ExchangeGateway for MockExchange {
    async fn get_balances(&self) -> Result<BalanceSnapshot, GatewayError> {
        self.check_error()?;
        Ok(*self.balances.lock().unwrap())
    }

    async fn get_current_price(&self) -> Result<Decimal, GatewayError> {
        self.check_error()?;
        Ok(*self.price.lock().unwrap())
    }

    async fn symbol_precision(&self) -> Result<SymbolPrecision, GatewayError> {
        self.check_error()?;
        Ok(self.precision)
    }

    async fn open_orders(&self) -> Result<Vec<OrderHandle>, GatewayError> {
        self.check_error()?;
        Ok(self.open.lock().unwrap().clone())
    }

    async fn place_limit_order(
        &self,
        side: OrderSide,
        price: Decimal,
        amount: Decimal,
    ) -> Result<OrderHandle, GatewayError> {
        self.check_error()?;
        if let Some(reason) = self.rejection.lock().unwrap().as_ref() {
            return Err(GatewayError::Rejected(reason.clone()));
        }

        let mut next_id = self.next_id.lock().unwrap();
        let handle = OrderHandle {
            id: format!("mock-{}", *next_id),
            side,
            price,
            amount,
        };
        *next_id += 1;

        self.open.lock().unwrap().push(handle.clone());
        self.placed.lock().unwrap().push(handle.clone());
        Ok(handle)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_mock_place_and_fill() {
        let exchange = MockExchange::new(dec!(100), dec!(0), dec!(2000));

        let handle = exchange
            .place_limit_order(OrderSide::Buy, dec!(1950), dec!(0.05))
            .await
            .unwrap();
        assert_eq!(handle.id, "mock-1");
        assert_eq!(exchange.open_orders().await.unwrap().len(), 1);

        exchange.fill_all();
        assert!(exchange.open_orders().await.unwrap().is_empty());
        assert_eq!(exchange.placed_orders().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_forced_error() {
        let exchange = MockExchange::new(dec!(100), dec!(0), dec!(2000));
        exchange.set_error("simulated outage");

        assert!(exchange.get_balances().await.is_err());
        assert!(exchange.get_current_price().await.is_err());
        assert!(exchange
            .place_limit_order(OrderSide::Buy, dec!(1), dec!(1))
            .await
            .is_err());

        exchange.clear_error();
        assert!(exchange.get_balances().await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_rejection() {
        let exchange = MockExchange::new(dec!(100), dec!(0), dec!(2000));
        exchange.set_rejection("InsufficientFunds");

        let err = exchange
            .place_limit_order(OrderSide::Buy, dec!(1950), dec!(0.05))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Rejected(_)));
        assert!(exchange.placed_orders().is_empty());
    }
}
