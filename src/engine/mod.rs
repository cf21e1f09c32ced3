//! Core engine — the per-cycle decide → place → persist loop.
//!
//! Each cycle inspects the portfolio and resolves to one of two phases:
//! crypto on hand means SELL (offer the full position at the sell target
//! persisted when the position was opened), USD on hand means BUY
//! (bracket the current price, persist the sell target, bid below
//! market). The persisted counter-price is what lets a later cycle close
//! the round trip without recomputing from a drifted market price.

pub mod pricing;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, error, info, warn};

use crate::config::BotConfig;
use crate::exchange::{ExchangeGateway, GatewayError};
use crate::notify::Notifier;
use crate::storage::PriceStore;
use crate::types::{
    BalanceSnapshot, CycleOutcome, CycleReport, OrderSide, PersistedState, SidewaysError,
};

/// Crypto below this floor is treated as zero (venue minimum order size).
pub const CRYPTO_DUST: Decimal = dec!(0.001);
/// USD below this floor is not worth bidding.
pub const USD_DUST: Decimal = dec!(1.00);

/// Which branch a cycle takes, decided purely from balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Sell,
    Buy,
    Idle,
}

/// Resolve the phase from a balance snapshot. Crypto wins when both
/// balances are non-dust: never strand a position.
pub fn phase_for(balances: &BalanceSnapshot) -> Phase {
    if balances.crypto > CRYPTO_DUST {
        Phase::Sell
    } else if balances.usd > USD_DUST {
        Phase::Buy
    } else {
        Phase::Idle
    }
}

/// The sideways decision engine. One instance per bot process; the
/// scheduler calls `run_cycle` once per interval, strictly sequentially.
pub struct SidewaysEngine {
    gateway: Box<dyn ExchangeGateway>,
    store: PriceStore,
    notifier: Option<Box<dyn Notifier>>,
    bot: BotConfig,
    cycle: u64,
    empty_alerted: bool,
}

impl SidewaysEngine {
    pub fn new(
        gateway: Box<dyn ExchangeGateway>,
        store: PriceStore,
        notifier: Option<Box<dyn Notifier>>,
        bot: BotConfig,
    ) -> Self {
        Self {
            gateway,
            store,
            notifier,
            bot,
            cycle: 0,
            empty_alerted: false,
        }
    }

    /// Evaluate and execute one cycle.
    ///
    /// Transient exchange failures abort the cycle with
    /// `ExchangeUnavailable` and mutate nothing; the next timer tick is
    /// the retry. At most one order is placed and at most one state
    /// write happens per cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, SidewaysError> {
        self.cycle += 1;
        info!(cycle = self.cycle, "Starting cycle");

        // A resting limit order means a previous decision is still
        // working; stacking another would double the position.
        let open = self.gateway.open_orders().await.map_err(Self::transient)?;
        if !open.is_empty() {
            info!(
                cycle = self.cycle,
                count = open.len(),
                "Limit orders already on the book, holding"
            );
            return Ok(self.report(CycleOutcome::HeldOpenOrders));
        }

        let balances = self.gateway.get_balances().await.map_err(Self::transient)?;
        debug!(cycle = self.cycle, %balances, "Balances fetched");

        let outcome = match phase_for(&balances) {
            Phase::Sell => self.run_sell(&balances).await?,
            Phase::Buy => self.run_buy(&balances).await?,
            Phase::Idle => self.run_idle().await,
        };

        if !matches!(outcome, CycleOutcome::EmptyPortfolio) {
            self.empty_alerted = false;
        }

        Ok(self.report(outcome))
    }

    /// SELL phase: offer the full position at the persisted target,
    /// untouched by where the market has moved since.
    async fn run_sell(
        &mut self,
        balances: &BalanceSnapshot,
    ) -> Result<CycleOutcome, SidewaysError> {
        info!(
            crypto = %balances.crypto,
            currency = %self.bot.currency,
            "Crypto balance present, SELL phase"
        );

        let state = self
            .store
            .read()
            .map_err(|e| SidewaysError::StateStore(e.to_string()))?;

        let Some(state) = state else {
            // Never guess: a fabricated target defeats the whole method.
            let err = SidewaysError::MissingSellPrice {
                currency: self.bot.currency.clone(),
            };
            error!(%err, "Refusing to place a sell order without a target");
            self.alert(&format!(
                "{}: CRITICAL — {err}. No order placed; manual intervention required.",
                self.bot.name(),
            ))
            .await;
            return Ok(CycleOutcome::MissingSellTarget);
        };

        let precision = self
            .gateway
            .symbol_precision()
            .await
            .map_err(Self::transient)?;
        let size = pricing::sell_size(balances.crypto, precision.amount_decimals);

        // State is consumed, not cleared: the record stays until the
        // next BUY overwrites it, so an unfilled or rejected sell can be
        // re-placed at the same price next cycle.
        self.place(OrderSide::Sell, state.sell_price, size, || {
            CycleOutcome::PlacedSell {
                price: state.sell_price,
                size,
            }
        })
        .await
    }

    /// BUY phase: bracket the current price, persist the sell target,
    /// then bid. Persist-then-place: if the process dies between the
    /// two, the target is already durable.
    async fn run_buy(&mut self, balances: &BalanceSnapshot) -> Result<CycleOutcome, SidewaysError> {
        info!(usd = %balances.usd, "USD balance present, BUY phase");

        let price = self
            .gateway
            .get_current_price()
            .await
            .map_err(Self::transient)?;
        let precision = self
            .gateway
            .symbol_precision()
            .await
            .map_err(Self::transient)?;

        let targets =
            pricing::price_targets(price, self.bot.movement_percentage, precision.price_decimals);
        debug!(%price, buy = %targets.buy, sell = %targets.sell, "Price targets computed");

        self.store
            .write(&PersistedState::new(targets.sell))
            .map_err(|e| SidewaysError::StateStore(e.to_string()))?;

        let size = pricing::buy_size(
            balances.usd,
            targets.buy,
            self.bot.fee_margin_percentage,
            precision.amount_decimals,
        );

        self.place(OrderSide::Buy, targets.buy, size, || CycleOutcome::PlacedBuy {
            price: targets.buy,
            size,
            sell_target: targets.sell,
        })
        .await
    }

    /// Neither balance above dust. With the open-order guard ahead of
    /// this, an empty portfolio means the funds are actually gone.
    async fn run_idle(&mut self) -> CycleOutcome {
        warn!(
            currency = %self.bot.currency,
            "Neither USD nor crypto above the dust floor, nothing to trade"
        );
        if !self.empty_alerted {
            self.alert(&format!(
                "{}: portfolio is empty — both balances below dust. Holding until funds appear.",
                self.bot.name(),
            ))
            .await;
            self.empty_alerted = true;
        }
        CycleOutcome::EmptyPortfolio
    }

    /// Place a limit order and notify. A venue rejection is an alertable
    /// outcome, not a cycle error; a transport failure is transient.
    async fn place(
        &self,
        side: OrderSide,
        price: Decimal,
        size: Decimal,
        on_success: impl FnOnce() -> CycleOutcome,
    ) -> Result<CycleOutcome, SidewaysError> {
        match self.gateway.place_limit_order(side, price, size).await {
            Ok(handle) => {
                info!(order = %handle, "Order placed");
                self.alert(&format!(
                    "{}: {side} {size} {} @ ${price}",
                    self.bot.name(),
                    self.bot.currency,
                ))
                .await;
                Ok(on_success())
            }
            Err(GatewayError::Rejected(reason)) => {
                warn!(%side, %price, %size, %reason, "Order rejected by venue");
                self.alert(&format!(
                    "{}: {side} order failed — {reason}",
                    self.bot.name(),
                ))
                .await;
                Ok(CycleOutcome::OrderRejected { side, reason })
            }
            Err(e @ GatewayError::Unavailable(_)) => Err(Self::transient(e)),
        }
    }

    /// Best-effort notification; failures are logged, never propagated.
    async fn alert(&self, message: &str) {
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.send(message).await {
                warn!(error = %e, "Notification failed");
            }
        }
    }

    fn report(&self, outcome: CycleOutcome) -> CycleReport {
        CycleReport {
            cycle: self.cycle,
            outcome,
        }
    }

    fn transient(e: GatewayError) -> SidewaysError {
        SidewaysError::ExchangeUnavailable(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
