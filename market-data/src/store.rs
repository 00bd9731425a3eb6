use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Candle, Result};

/// Summary of what the price store currently holds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceStats {
    pub total_records: u64,
    pub unique_assets: u64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Durable OHLC candle storage keyed by `(asset, timeframe, timestamp)`
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Insert a candle, replacing any row with the same key
    async fn upsert(&self, candle: &Candle) -> Result<()>;

    /// Most recent `limit` candles, ordered oldest to newest.
    /// Unknown pairs yield an empty vector.
    async fn latest_candles(&self, asset: &str, timeframe: u32, limit: usize) -> Result<Vec<Candle>>;

    async fn stats(&self) -> Result<PriceStats>;

    /// Delete every row, returning how many were removed
    async fn clear(&self) -> Result<u64>;
}
