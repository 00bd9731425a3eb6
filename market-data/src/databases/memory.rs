use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Candle, Result};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

use crate::store::{PriceStats, PriceStore};

type CandleKey = (String, u32, DateTime<Utc>);

/// In-memory price storage (for testing and development)
pub struct InMemoryPriceStore {
    candles: RwLock<BTreeMap<CandleKey, Candle>>,
}

impl InMemoryPriceStore {
    pub fn new() -> Self {
        Self {
            candles: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryPriceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceStore for InMemoryPriceStore {
    async fn upsert(&self, candle: &Candle) -> Result<()> {
        let mut candles = self.candles.write().await;
        candles.insert(candle.key(), candle.clone());
        Ok(())
    }

    async fn latest_candles(&self, asset: &str, timeframe: u32, limit: usize) -> Result<Vec<Candle>> {
        let candles = self.candles.read().await;

        // Keys sort by timestamp within a pair, so walking backwards yields newest first
        let mut latest: Vec<Candle> = candles
            .values()
            .rev()
            .filter(|c| c.asset == asset && c.timeframe == timeframe)
            .take(limit)
            .cloned()
            .collect();
        latest.reverse();

        Ok(latest)
    }

    async fn stats(&self) -> Result<PriceStats> {
        let candles = self.candles.read().await;

        let unique_assets: HashSet<&str> = candles.values().map(|c| c.asset.as_str()).collect();
        let oldest = candles.values().map(|c| c.timestamp).min();
        let newest = candles.values().map(|c| c.timestamp).max();

        Ok(PriceStats {
            total_records: candles.len() as u64,
            unique_assets: unique_assets.len() as u64,
            oldest,
            newest,
        })
    }

    async fn clear(&self) -> Result<u64> {
        let mut candles = self.candles.write().await;
        let removed = candles.len() as u64;
        candles.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn candle(asset: &str, timeframe: u32, minute: i64, close: Decimal) -> Candle {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        Candle {
            asset: asset.to_string(),
            timeframe,
            timestamp: base + Duration::minutes(minute),
            open: close,
            high: close,
            low: close,
            close,
            volume: Decimal::ZERO,
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_key() {
        let store = InMemoryPriceStore::new();

        store.upsert(&candle("EURUSD", 1, 0, dec!(1.1000))).await.unwrap();
        let mut replacement = candle("EURUSD", 1, 0, dec!(1.1050));
        replacement.high = dec!(1.1060);
        store.upsert(&replacement).await.unwrap();

        let latest = store.latest_candles("EURUSD", 1, 10).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].close, dec!(1.1050));
        assert_eq!(latest[0].high, dec!(1.1060));
        assert_eq!(store.stats().await.unwrap().total_records, 1);
    }

    #[tokio::test]
    async fn test_latest_candles_are_most_recent_in_ascending_order() {
        let store = InMemoryPriceStore::new();
        for minute in [3, 0, 4, 1, 2] {
            store
                .upsert(&candle("EURUSD", 1, minute, Decimal::from(minute)))
                .await
                .unwrap();
        }
        // Other pairs must not leak into the result
        store.upsert(&candle("EURUSD", 5, 10, dec!(9))).await.unwrap();
        store.upsert(&candle("GBPUSD", 1, 10, dec!(9))).await.unwrap();

        let latest = store.latest_candles("EURUSD", 1, 3).await.unwrap();
        let closes: Vec<Decimal> = latest.iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![dec!(2), dec!(3), dec!(4)]);
    }

    #[tokio::test]
    async fn test_unknown_pair_is_empty() {
        let store = InMemoryPriceStore::new();
        let latest = store.latest_candles("USDJPY", 15, 10).await.unwrap();
        assert!(latest.is_empty());
    }

    #[tokio::test]
    async fn test_stats_and_clear() {
        let store = InMemoryPriceStore::new();
        store.upsert(&candle("EURUSD", 1, 0, dec!(1))).await.unwrap();
        store.upsert(&candle("EURUSD", 1, 7, dec!(1))).await.unwrap();
        store.upsert(&candle("GBPUSD", 5, 3, dec!(1))).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.unique_assets, 2);
        assert_eq!(stats.oldest, Some(candle("X", 1, 0, dec!(1)).timestamp));
        assert_eq!(stats.newest, Some(candle("X", 1, 7, dec!(1)).timestamp));

        assert_eq!(store.clear().await.unwrap(), 3);
        assert_eq!(store.stats().await.unwrap(), PriceStats::default());
    }
}
