//! End-to-end cycle scenarios.
//!
//! Each test runs the real engine and the real on-disk price store
//! against the mock exchange, covering the buy→sell round trip and the
//! degraded paths (missing target, outage, rejection, empty account).

use rust_decimal_macros::dec;

use sideways::config::BotConfig;
use sideways::engine::SidewaysEngine;
use sideways::storage::PriceStore;
use sideways::types::{CycleOutcome, OrderSide, PersistedState, SidewaysError};

use crate::mock_exchange::MockExchange;
use crate::recorder::RecordingNotifier;

fn bot_config() -> BotConfig {
    BotConfig {
        currency: "ETH".to_string(),
        movement_percentage: dec!(2.5),
        cycle_time_minutes: 15,
        name: None,
        fee_margin_percentage: dec!(0),
        state_file: None,
    }
}

fn temp_store() -> PriceStore {
    let mut p = std::env::temp_dir();
    p.push(format!("sideways_sim_{}.json", uuid::Uuid::new_v4()));
    PriceStore::new(Some(p))
}

fn engine_with(
    exchange: &MockExchange,
    store: &PriceStore,
    notifier: &RecordingNotifier,
) -> SidewaysEngine {
    SidewaysEngine::new(
        Box::new(exchange.clone()),
        store.clone(),
        Some(Box::new(notifier.clone())),
        bot_config(),
    )
}

#[tokio::test]
async fn test_full_round_trip() {
    let exchange = MockExchange::new(dec!(100), dec!(0), dec!(2000));
    let store = temp_store();
    let notifier = RecordingNotifier::new();
    let mut engine = engine_with(&exchange, &store, &notifier);

    // Cycle 1: USD on hand → BUY at 2.5% below market, target persisted.
    let report = engine.run_cycle().await.unwrap();
    assert_eq!(
        report.outcome,
        CycleOutcome::PlacedBuy {
            price: dec!(1950.00),
            size: dec!(0.051282),
            sell_target: dec!(2050.00),
        }
    );
    assert_eq!(store.read().unwrap().unwrap().sell_price, dec!(2050.00));

    // Cycle 2: the buy is still resting on the book → hold.
    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.outcome, CycleOutcome::HeldOpenOrders);

    // The buy fills; the market drifts. The drift must not matter.
    exchange.fill_all();
    exchange.set_balances(dec!(0), dec!(0.0512));
    exchange.set_price(dec!(1990));

    // Cycle 3: crypto on hand → SELL the full position at the stored
    // target, not at anything derived from the drifted price.
    let report = engine.run_cycle().await.unwrap();
    assert_eq!(
        report.outcome,
        CycleOutcome::PlacedSell {
            price: dec!(2050.00),
            size: dec!(0.0512),
        }
    );

    let placed = exchange.placed_orders();
    assert_eq!(placed.len(), 2);
    assert_eq!(placed[0].side, OrderSide::Buy);
    assert_eq!(placed[1].side, OrderSide::Sell);

    let messages = notifier.messages();
    assert!(messages.iter().any(|m| m.contains("BUY")));
    assert!(messages.iter().any(|m| m.contains("SELL")));

    store.clear().unwrap();
}

#[tokio::test]
async fn test_sell_without_target_places_nothing() {
    let exchange = MockExchange::new(dec!(0), dec!(0.0512), dec!(2000));
    let store = temp_store();
    let notifier = RecordingNotifier::new();
    let mut engine = engine_with(&exchange, &store, &notifier);

    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.outcome, CycleOutcome::MissingSellTarget);
    assert!(exchange.placed_orders().is_empty());
    assert!(store.read().unwrap().is_none());

    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("CRITICAL"));
    assert!(messages[0].contains("ETH"));
}

#[tokio::test]
async fn test_dust_only_account_is_a_noop() {
    let exchange = MockExchange::new(dec!(0.50), dec!(0.0005), dec!(2000));
    let store = temp_store();
    let notifier = RecordingNotifier::new();
    let mut engine = engine_with(&exchange, &store, &notifier);

    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.outcome, CycleOutcome::EmptyPortfolio);
    assert!(exchange.placed_orders().is_empty());
    assert!(store.read().unwrap().is_none());
}

#[tokio::test]
async fn test_outage_skips_cycle_then_recovers() {
    let exchange = MockExchange::new(dec!(100), dec!(0), dec!(2000));
    let store = temp_store();
    let notifier = RecordingNotifier::new();
    let mut engine = engine_with(&exchange, &store, &notifier);

    exchange.set_error("simulated outage");
    let err = engine.run_cycle().await.unwrap_err();
    assert!(matches!(err, SidewaysError::ExchangeUnavailable(_)));
    assert!(exchange.placed_orders().is_empty());
    assert!(store.read().unwrap().is_none());

    // Next tick: the exchange is back, the cycle proceeds normally.
    exchange.clear_error();
    let report = engine.run_cycle().await.unwrap();
    assert!(matches!(report.outcome, CycleOutcome::PlacedBuy { .. }));
    assert_eq!(report.cycle, 2);

    store.clear().unwrap();
}

#[tokio::test]
async fn test_consecutive_sells_repeat_identical_order() {
    let exchange = MockExchange::new(dec!(0), dec!(0.0512), dec!(2000));
    let store = temp_store();
    store.write(&PersistedState::new(dec!(2050))).unwrap();
    let notifier = RecordingNotifier::new();
    let mut engine = engine_with(&exchange, &store, &notifier);

    engine.run_cycle().await.unwrap();
    // The unfilled sell expires off the book; balances are unchanged.
    exchange.fill_all();
    engine.run_cycle().await.unwrap();

    let placed = exchange.placed_orders();
    assert_eq!(placed.len(), 2);
    assert_eq!(placed[0].price, placed[1].price);
    assert_eq!(placed[0].amount, placed[1].amount);
    assert_eq!(placed[0].side, OrderSide::Sell);

    store.clear().unwrap();
}

#[tokio::test]
async fn test_rejected_buy_keeps_target_durable() {
    let exchange = MockExchange::new(dec!(100), dec!(0), dec!(2000));
    exchange.set_rejection("InsufficientFunds");
    let store = temp_store();
    let notifier = RecordingNotifier::new();
    let mut engine = engine_with(&exchange, &store, &notifier);

    let report = engine.run_cycle().await.unwrap();
    assert!(matches!(
        report.outcome,
        CycleOutcome::OrderRejected {
            side: OrderSide::Buy,
            ..
        }
    ));

    // Persist-then-place: the target was written before the venue said no.
    assert_eq!(store.read().unwrap().unwrap().sell_price, dec!(2050.00));
    assert!(notifier.messages().iter().any(|m| m.contains("failed")));

    store.clear().unwrap();
}

#[tokio::test]
async fn test_sell_target_survives_restart() {
    let store = temp_store();
    let notifier = RecordingNotifier::new();

    // First process lifetime: enter the BUY phase.
    {
        let exchange = MockExchange::new(dec!(100), dec!(0), dec!(2000));
        let mut engine = engine_with(&exchange, &store, &notifier);
        engine.run_cycle().await.unwrap();
    }

    // "Restart": a fresh engine over the same state file finds the buy
    // has filled and closes the round trip at the original target.
    let exchange = MockExchange::new(dec!(0), dec!(0.0512), dec!(2080));
    let mut engine = engine_with(&exchange, &store, &notifier);
    let report = engine.run_cycle().await.unwrap();
    assert_eq!(
        report.outcome,
        CycleOutcome::PlacedSell {
            price: dec!(2050.00),
            size: dec!(0.0512),
        }
    );

    store.clear().unwrap();
}
