//! Hourly OHLC candle aggregation
//!
//! Buckets the fill history into hours, truncating timestamps to the start
//! of their containing UTC hour. Candle prices come from the raw integer
//! ratio, like everything else in the view. The headline price and its
//! direction are taken from the two most recent individual fills, not from
//! the candle series.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::store::{Collection, Store};
use crate::trades;

/// Width of a candle bucket in seconds.
pub const BUCKET_SECONDS: i64 = 3_600;

/// Truncate a Unix timestamp to the start of its containing UTC hour.
pub fn bucket_start(timestamp: i64) -> i64 {
    timestamp.div_euclid(BUCKET_SECONDS) * BUCKET_SECONDS
}

/// One hour of price movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// Start of the bucket, Unix seconds, aligned to the hour.
    pub bucket_start: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl Candle {
    fn new(bucket_start: i64, price: Decimal) -> Self {
        Self {
            bucket_start,
            open: price,
            high: price,
            low: price,
            close: price,
        }
    }

    fn update(&mut self, price: Decimal) {
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
        self.close = price;
    }

    /// Bucket start as a UTC datetime, when representable.
    pub fn bucket_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.bucket_start, 0)
    }
}

/// Direction of the latest price relative to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Rising,
    Falling,
}

impl Trend {
    /// Sign character used in the headline display.
    pub fn sign(&self) -> char {
        match self {
            Trend::Rising => '+',
            Trend::Falling => '-',
        }
    }
}

/// The price chart: candle series plus the headline price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceChart {
    /// Price of the most recent fill; zero with fewer than two fills.
    pub last_price: Decimal,
    /// Direction of the last price against the second-latest.
    pub trend: Trend,
    /// Candles in chronological bucket order.
    pub candles: Vec<Candle>,
}

/// Build the price chart from the current store snapshot.
pub fn build(store: &Store) -> PriceChart {
    let fills = trades::chronological(store);

    let mut buckets: BTreeMap<i64, Candle> = BTreeMap::new();
    for fill in &fills {
        let price = fill.price();
        buckets
            .entry(bucket_start(fill.timestamp()))
            .and_modify(|candle| candle.update(price))
            .or_insert_with(|| Candle::new(bucket_start(fill.timestamp()), price));
    }

    // Headline price from the two most recent fills. With fewer than two
    // there is nothing to compare, so both default to zero and the trend
    // reads as rising.
    let (last_price, second_last_price) = match fills.as_slice() {
        [.., second_last, last] => (last.price(), second_last.price()),
        _ => (Decimal::ZERO, Decimal::ZERO),
    };
    let trend = if last_price >= second_last_price {
        Trend::Rising
    } else {
        Trend::Falling
    };

    PriceChart {
        last_price,
        trend,
        candles: buckets.into_values().collect(),
    }
}

/// Whether the fill history feeding the chart has been backfilled.
pub fn is_loaded(store: &Store) -> bool {
    store.is_loaded(Collection::Fills)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Provenance, Store};
    use types::ids::{Address, OrderId};
    use types::order::Order;
    use types::trade::Fill;

    const ONE: u128 = 1_000_000_000_000_000_000;

    fn addr(last: &str) -> Address {
        Address::parse(&format!("0x00000000000000000000000000000000000000{last}")).unwrap()
    }

    /// A fill at the given price (hundredths of a native unit per token).
    fn fill(id: u64, ts: i64, price_hundredths: u128) -> Fill {
        Fill {
            order: Order {
                id: OrderId::from_u64(id),
                maker: addr("01"),
                token_get: addr("aa"),
                amount_get: 100 * ONE,
                token_give: Address::native(),
                amount_give: price_hundredths * ONE,
                timestamp: ts,
            },
            taker: addr("02"),
        }
    }

    fn store_with(fills: Vec<Fill>) -> Store {
        let mut store = Store::new();
        for f in fills {
            store.append_fill(f, Provenance::Ledger);
        }
        store
    }

    fn price(hundredths: i64) -> Decimal {
        Decimal::new(hundredths, 2)
    }

    #[test]
    fn test_bucket_start_truncates_to_hour() {
        assert_eq!(bucket_start(0), 0);
        assert_eq!(bucket_start(3_599), 0);
        assert_eq!(bucket_start(3_600), 3_600);
        assert_eq!(bucket_start(7_340), 3_600);
        // pre-epoch timestamps truncate toward earlier hours
        assert_eq!(bucket_start(-1), -3_600);
    }

    #[test]
    fn test_single_fill_bucket_is_flat() {
        let store = store_with(vec![fill(1, 100, 200)]);
        let chart = build(&store);
        assert_eq!(chart.candles.len(), 1);
        let candle = &chart.candles[0];
        assert_eq!(candle.bucket_start, 0);
        assert_eq!(candle.open, price(200));
        assert_eq!(candle.high, price(200));
        assert_eq!(candle.low, price(200));
        assert_eq!(candle.close, price(200));
    }

    #[test]
    fn test_ohlc_within_bucket() {
        let store = store_with(vec![
            fill(1, 100, 200),
            fill(2, 200, 350),
            fill(3, 300, 150),
            fill(4, 400, 250),
        ]);
        let chart = build(&store);
        assert_eq!(chart.candles.len(), 1);
        let candle = &chart.candles[0];
        assert_eq!(candle.open, price(200));
        assert_eq!(candle.high, price(350));
        assert_eq!(candle.low, price(150));
        assert_eq!(candle.close, price(250));
    }

    #[test]
    fn test_buckets_in_chronological_order() {
        let store = store_with(vec![
            fill(3, 2 * 3_600 + 10, 300),
            fill(1, 10, 100),
            fill(2, 3_600 + 10, 200),
        ]);
        let chart = build(&store);
        let starts: Vec<i64> = chart.candles.iter().map(|c| c.bucket_start).collect();
        assert_eq!(starts, vec![0, 3_600, 7_200]);
        assert_eq!(chart.candles[0].close, price(100));
        assert_eq!(chart.candles[2].open, price(300));
    }

    #[test]
    fn test_open_is_chronologically_first_regardless_of_input_order() {
        let store = store_with(vec![fill(2, 200, 350), fill(1, 100, 200)]);
        let chart = build(&store);
        assert_eq!(chart.candles[0].open, price(200));
        assert_eq!(chart.candles[0].close, price(350));
    }

    #[test]
    fn test_headline_price_and_trend() {
        let store = store_with(vec![fill(1, 100, 200), fill(2, 200, 150)]);
        let chart = build(&store);
        assert_eq!(chart.last_price, price(150));
        assert_eq!(chart.trend, Trend::Falling);
        assert_eq!(chart.trend.sign(), '-');
    }

    #[test]
    fn test_equal_latest_prices_read_as_rising() {
        let store = store_with(vec![fill(1, 100, 200), fill(2, 200, 200)]);
        let chart = build(&store);
        assert_eq!(chart.trend, Trend::Rising);
        assert_eq!(chart.trend.sign(), '+');
    }

    #[test]
    fn test_fewer_than_two_fills_defaults() {
        let empty = build(&store_with(vec![]));
        assert_eq!(empty.last_price, Decimal::ZERO);
        assert_eq!(empty.trend, Trend::Rising);
        assert!(empty.candles.is_empty());

        let single = build(&store_with(vec![fill(1, 100, 200)]));
        assert_eq!(single.last_price, Decimal::ZERO);
        assert_eq!(single.trend, Trend::Rising);
        assert_eq!(single.candles.len(), 1);
    }

    #[test]
    fn test_bucket_datetime() {
        let candle = Candle::new(7_200, price(100));
        let dt = candle.bucket_datetime().unwrap();
        assert_eq!(dt.timestamp(), 7_200);
    }
}
