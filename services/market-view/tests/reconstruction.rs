//! End-to-end view reconstruction tests
//!
//! Drives the full pipeline through the in-memory ledger: seed a history,
//! connect a session, check every derived view against the seeded events,
//! then exercise live delivery, deduplication, and the submission
//! lifecycle including its reconciliation refetch.

use std::sync::Arc;
use std::time::Duration;

use market_view::events::{EventTopic, RawEvent};
use market_view::ledger::{IdentityProvider, LedgerClient, TxRequest};
use market_view::sim::SimLedger;
use market_view::store::Flag;
use market_view::{Session, SessionError, Tick, Trend};
use rust_decimal::Decimal;
use types::ids::{Address, OrderId, TxHash};
use types::numeric::to_raw;
use types::order::Side;

const ONE: u128 = 1_000_000_000_000_000_000;

fn addr(last: &str) -> Address {
    Address::parse(&format!("0x00000000000000000000000000000000000000{last}")).unwrap()
}

fn alice() -> Address {
    addr("01")
}

fn bob() -> Address {
    addr("02")
}

fn token() -> Address {
    addr("aa")
}

/// Order event: maker buys `token_units` tokens for `native_units` native.
fn buy_event(id: u64, maker: &Address, native_units: u128, token_units: u128, ts: i64) -> RawEvent {
    RawEvent::Order {
        id: id.to_string(),
        user: maker.as_str().to_string(),
        token_get: token().as_str().to_string(),
        amount_get: (token_units * ONE).to_string(),
        token_give: Address::native().as_str().to_string(),
        amount_give: (native_units * ONE).to_string(),
        timestamp: ts.to_string(),
    }
}

/// Order event: maker sells `token_units` tokens for `native_units` native.
fn sell_event(
    id: u64,
    maker: &Address,
    native_units: u128,
    token_units: u128,
    ts: i64,
) -> RawEvent {
    RawEvent::Order {
        id: id.to_string(),
        user: maker.as_str().to_string(),
        token_get: Address::native().as_str().to_string(),
        amount_get: (native_units * ONE).to_string(),
        token_give: token().as_str().to_string(),
        amount_give: (token_units * ONE).to_string(),
        timestamp: ts.to_string(),
    }
}

fn cancel_event(id: u64, maker: &Address, ts: i64) -> RawEvent {
    RawEvent::Cancel {
        id: id.to_string(),
        user: maker.as_str().to_string(),
        timestamp: ts.to_string(),
    }
}

/// Trade event on a buy order: `taker` fills `maker`'s order.
fn trade_event(
    id: u64,
    maker: &Address,
    taker: &Address,
    native_units: u128,
    token_units: u128,
    ts: i64,
) -> RawEvent {
    RawEvent::Trade {
        id: id.to_string(),
        user: maker.as_str().to_string(),
        token_get: token().as_str().to_string(),
        amount_get: (token_units * ONE).to_string(),
        token_give: Address::native().as_str().to_string(),
        amount_give: (native_units * ONE).to_string(),
        user_fill: taker.as_str().to_string(),
        timestamp: ts.to_string(),
    }
}

struct TestIdentity {
    client: Option<Arc<SimLedger>>,
    account: Option<Address>,
}

impl IdentityProvider for TestIdentity {
    fn ledger_client(&self) -> Option<Arc<dyn LedgerClient>> {
        self.client
            .clone()
            .map(|client| client as Arc<dyn LedgerClient>)
    }

    fn active_account(&self) -> Option<Address> {
        self.account.clone()
    }
}

fn sim_with_contracts() -> SimLedger {
    SimLedger::new()
        .with_token(token())
        .with_exchange(addr("ee"))
}

async fn connect(sim: &Arc<SimLedger>, account: Address) -> Session {
    let identity = TestIdentity {
        client: Some(sim.clone()),
        account: Some(account),
    };
    Session::connect(&identity).await.unwrap()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn reconstructs_order_book_from_history() {
    let sim = Arc::new(sim_with_contracts());
    // Orders 1..=4; 2 cancelled, 3 filled. Open: 1 (buy 0.1), 4 (sell 0.5).
    sim.seed_history(vec![
        buy_event(1, &alice(), 1, 10, 100),
        buy_event(2, &alice(), 1, 5, 110),
        trade_event(3, &bob(), &alice(), 2, 10, 220),
        sell_event(4, &bob(), 1, 2, 130),
    ]);
    sim.seed_history(vec![buy_event(3, &bob(), 2, 10, 120)]);
    sim.seed_history(vec![cancel_event(2, &alice(), 200)]);

    let session = connect(&sim, alice()).await;
    assert!(session.order_book_loaded());

    let book = session.order_book();
    assert_eq!(book.buy_orders.len(), 1);
    assert_eq!(book.sell_orders.len(), 1);

    let open_buy = &book.buy_orders[0];
    assert_eq!(open_buy.order.id, OrderId::from_u64(1));
    assert_eq!(open_buy.side, Side::Buy);
    assert_eq!(open_buy.price, Decimal::new(1, 1));
    assert_eq!(open_buy.token_amount, Decimal::from(10));

    let open_sell = &book.sell_orders[0];
    assert_eq!(open_sell.order.id, OrderId::from_u64(4));
    assert_eq!(open_sell.price, Decimal::new(5, 1));

    session.disconnect().await;
}

#[tokio::test]
async fn trade_history_marks_equal_price_as_up_regardless_of_input_order() {
    let sim = Arc::new(sim_with_contracts());
    // Two fills at the same 0.2 price, seeded newest first.
    sim.seed_history(vec![
        trade_event(2, &alice(), &bob(), 2, 10, 200),
        trade_event(1, &alice(), &bob(), 2, 10, 100),
    ]);

    let session = connect(&sim, alice()).await;
    let history = session.trade_history();

    assert_eq!(history.len(), 2);
    // Newest first, and the second fill ticks up on an equal price.
    assert_eq!(history[0].fill.id(), OrderId::from_u64(2));
    assert_eq!(history[0].tick, Tick::Up);
    assert_eq!(history[1].tick, Tick::Up);

    session.disconnect().await;
}

#[tokio::test]
async fn personal_views_invert_taker_side() {
    let sim = Arc::new(sim_with_contracts());
    // Alice made a buy order that Bob filled, plus Alice's open sell.
    sim.seed_history(vec![
        trade_event(1, &alice(), &bob(), 1, 10, 100),
        sell_event(2, &alice(), 1, 2, 150),
    ]);

    let alice_session = connect(&sim, alice()).await;
    let alice_fills = alice_session.my_fills();
    assert_eq!(alice_fills.len(), 1);
    assert_eq!(alice_fills[0].side, Side::Buy);
    assert_eq!(alice_fills[0].sign, '+');

    let my_orders = alice_session.my_open_orders();
    assert_eq!(my_orders.len(), 1);
    assert_eq!(my_orders[0].order.id, OrderId::from_u64(2));
    assert_eq!(my_orders[0].side, Side::Sell);
    alice_session.disconnect().await;

    let bob_session = connect(&sim, bob()).await;
    let bob_fills = bob_session.my_fills();
    assert_eq!(bob_fills.len(), 1);
    assert_eq!(bob_fills[0].side, Side::Sell);
    assert_eq!(bob_fills[0].sign, '-');
    assert!(bob_session.my_open_orders().is_empty());
    bob_session.disconnect().await;
}

#[tokio::test]
async fn price_chart_buckets_by_hour() {
    let sim = Arc::new(sim_with_contracts());
    // Hour 0: prices 0.2, 0.5, 0.1 (open 0.2, high 0.5, low 0.1, close 0.1).
    // Hour 1: single fill at 0.3.
    sim.seed_history(vec![
        trade_event(1, &alice(), &bob(), 2, 10, 100),
        trade_event(2, &alice(), &bob(), 5, 10, 200),
        trade_event(3, &alice(), &bob(), 1, 10, 300),
        trade_event(4, &alice(), &bob(), 3, 10, 3700),
    ]);

    let session = connect(&sim, alice()).await;
    let chart = session.price_chart();

    assert_eq!(chart.candles.len(), 2);
    let first = &chart.candles[0];
    assert_eq!(first.bucket_start, 0);
    assert_eq!(first.open, Decimal::new(2, 1));
    assert_eq!(first.high, Decimal::new(5, 1));
    assert_eq!(first.low, Decimal::new(1, 1));
    assert_eq!(first.close, Decimal::new(1, 1));

    let second = &chart.candles[1];
    assert_eq!(second.bucket_start, 3600);
    // Single-fill bucket: flat candle.
    assert_eq!(second.open, second.close);
    assert_eq!(second.high, second.low);

    // Headline: 0.3 after 0.1 reads as rising.
    assert_eq!(chart.last_price, Decimal::new(3, 1));
    assert_eq!(chart.trend, Trend::Rising);
    assert_eq!(chart.trend.sign(), '+');

    session.disconnect().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn live_events_update_views_and_duplicates_are_dropped() {
    let sim = Arc::new(sim_with_contracts());
    sim.seed_history(vec![buy_event(1, &alice(), 1, 10, 100)]);

    let session = connect(&sim, alice()).await;
    assert_eq!(session.order_book().buy_orders.len(), 1);

    // A live order arrives, then the same event is re-delivered.
    sim.push_live(buy_event(2, &bob(), 1, 4, 200));
    {
        let session_store = session.store().clone();
        wait_until(move || session_store.read(|s| s.order_count()) == 2).await;
    }
    sim.push_live(buy_event(2, &bob(), 1, 4, 200));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(session.store().read(|s| s.order_count()), 2);

    // A live fill closes order 1.
    sim.push_live(trade_event(1, &alice(), &bob(), 1, 10, 300));
    {
        let session_store = session.store().clone();
        wait_until(move || session_store.read(|s| s.fill_count()) == 1).await;
    }
    let book = session.order_book();
    let open_ids: Vec<u64> = book.buy_orders.iter().map(|o| o.order.id.value()).collect();
    assert_eq!(open_ids, vec![2]);

    session.disconnect().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn fill_order_lifecycle_toggles_flag_and_refetches_once() {
    let sim = Arc::new(sim_with_contracts());
    sim.seed_history(vec![buy_event(1, &bob(), 1, 10, 100)]);

    let session = connect(&sim, alice()).await;
    let baseline = sim.fetch_count(EventTopic::Order);

    let target = session.order_book().buy_orders[0].order.clone();
    let dispatcher = session.dispatcher();
    let task = tokio::spawn(async move { dispatcher.fill_order(&target).await });

    let pending = {
        let sim = sim.clone();
        let submitted = {
            let sim = sim.clone();
            move || {
                sim.submissions()
                    .iter()
                    .any(|s| matches!(s.request, TxRequest::FillOrder { .. }))
            }
        };
        wait_until(submitted).await;
        sim.take_pending().unwrap()
    };
    assert!(!session.store().read(|s| s.flag(Flag::OrderFilling)));

    pending.feeder.hash(TxHash::new("0xf1"));
    {
        let session_store = session.store().clone();
        wait_until(move || session_store.read(|s| s.flag(Flag::OrderFilling))).await;
    }

    pending.feeder.receipt(sim.make_receipt(vec![]));
    let receipt = task.await.unwrap().unwrap();
    assert!(receipt.block_number > 0);

    // Flag cleared; exactly one reconciliation refetch beyond the backfill.
    assert!(!session.store().read(|s| s.flag(Flag::OrderFilling)));
    assert_eq!(sim.fetch_count(EventTopic::Order), baseline + 1);
    assert_eq!(sim.fetch_count(EventTopic::Trade), baseline + 1);
    assert_eq!(sim.fetch_count(EventTopic::Cancel), baseline + 1);

    // The optimistic fill closed the order locally; the refetch kept the
    // ledger's version of history (which has no such trade), but the
    // local placeholder remains until a refetch delivers that id.
    assert_eq!(session.store().read(|s| s.fill_count()), 1);

    session.disconnect().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn refetch_supersedes_optimistic_placeholder() {
    let sim = Arc::new(sim_with_contracts());
    sim.seed_history(vec![buy_event(1, &bob(), 1, 10, 100)]);

    let session = connect(&sim, alice()).await;
    let target = session.order_book().buy_orders[0].order.clone();
    let dispatcher = session.dispatcher();
    let task = tokio::spawn(async move { dispatcher.cancel_order(&target).await });

    let pending = {
        let sim = sim.clone();
        wait_until({
            let sim = sim.clone();
            move || {
                sim.submissions()
                    .iter()
                    .any(|s| matches!(s.request, TxRequest::CancelOrder { .. }))
            }
        })
        .await;
        sim.take_pending().unwrap()
    };

    // Ledger truth for the cancel lands in history before the receipt, as
    // if a block explorer indexed it first; the reconcile refetch then
    // delivers it and supersedes the placeholder.
    sim.seed_history(vec![cancel_event(1, &bob(), 500)]);
    pending.feeder.hash(TxHash::new("0xc1"));
    pending.feeder.receipt(sim.make_receipt(vec![]));
    task.await.unwrap().unwrap();

    session.store().read(|s| {
        assert_eq!(s.cancellation_count(), 1);
        // The ledger record (maker bob, timestamp 500) replaced the
        // locally synthesized one (maker alice).
        let cancellation = s.cancellations().next().unwrap();
        assert_eq!(cancellation.maker, bob());
        assert_eq!(cancellation.timestamp, 500);
    });
    assert!(session.order_book().buy_orders.is_empty());

    session.disconnect().await;
}

#[tokio::test]
async fn session_bootstrap_failures_are_fatal() {
    let no_client = TestIdentity {
        client: None,
        account: Some(alice()),
    };
    assert_eq!(
        Session::connect(&no_client).await.unwrap_err(),
        SessionError::ConnectionUnavailable
    );

    let no_account = TestIdentity {
        client: Some(Arc::new(sim_with_contracts())),
        account: None,
    };
    assert_eq!(
        Session::connect(&no_account).await.unwrap_err(),
        SessionError::AccountUnavailable
    );
}

#[tokio::test]
async fn deposit_confirmation_reloads_balances() {
    let sim = Arc::new(sim_with_contracts().with_auto_confirm());
    sim.set_native_balance(&alice(), 5 * ONE);

    let session = connect(&sim, alice()).await;
    let mut balances = session.balances();
    assert_eq!(balances.borrow().wallet_native, 5 * ONE);

    // The deposit confirms immediately; the sim's balances were updated
    // out-of-band as the chain would.
    sim.set_native_balance(&alice(), 4 * ONE);
    sim.set_exchange_balance(&Address::native(), &alice(), ONE);

    let amount = to_raw(Decimal::ONE).unwrap();
    session.dispatcher().deposit_native(amount).await.unwrap();

    balances.changed().await.unwrap();
    let latest = *balances.borrow();
    assert_eq!(latest.wallet_native, 4 * ONE);
    assert_eq!(latest.exchange_native, ONE);
    assert!(!session.store().read(|s| s.flag(Flag::BalancesLoading)));

    session.disconnect().await;
}
