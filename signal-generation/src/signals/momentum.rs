//! Default analyzer: next-candle direction from recent bar momentum.
//!
//! Direction follows the majority of bar-to-bar moves when the net move over
//! the window agrees with it. Confidence is the share of moves in that
//! direction.

use async_trait::async_trait;
use chrono::Duration;
use common::{Clock, Result, SignalCandidate, SignalDirection, SignalError};
use market_data::PriceStore;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

use super::Analyzer;

#[derive(Debug, Clone)]
pub struct MomentumConfig {
    /// Number of most recent candles inspected
    pub lookback: usize,
    /// Fewer candles than this yields no signal
    pub min_candles: usize,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            lookback: 20,
            min_candles: 10,
        }
    }
}

pub struct MomentumAnalyzer {
    prices: Arc<dyn PriceStore>,
    clock: Arc<dyn Clock>,
    config: MomentumConfig,
}

impl MomentumAnalyzer {
    pub fn new(prices: Arc<dyn PriceStore>, clock: Arc<dyn Clock>, config: MomentumConfig) -> Self {
        Self {
            prices,
            clock,
            config,
        }
    }
}

#[async_trait]
impl Analyzer for MomentumAnalyzer {
    async fn analyze(&self, asset: &str, timeframe: u32) -> Result<Option<SignalCandidate>> {
        let candles = self
            .prices
            .latest_candles(asset, timeframe, self.config.lookback)
            .await
            .map_err(|e| SignalError::Analyzer {
                asset: asset.to_string(),
                timeframe,
                reason: e.to_string(),
            })?;

        if candles.len() < self.config.min_candles.max(2) {
            debug!("Not enough candles for {} M{}: {}", asset, timeframe, candles.len());
            return Ok(None);
        }

        let (mut rising, mut falling) = (0usize, 0usize);
        for pair in candles.windows(2) {
            if pair[1].close > pair[0].close {
                rising += 1;
            } else if pair[1].close < pair[0].close {
                falling += 1;
            }
        }

        let (first, last) = match (candles.first(), candles.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Ok(None),
        };
        let net_move = last.close - first.close;

        let direction = if rising > falling && net_move > Decimal::ZERO {
            SignalDirection::Buy
        } else if falling > rising && net_move < Decimal::ZERO {
            SignalDirection::Sell
        } else {
            return Ok(None);
        };

        let moves = candles.len() - 1;
        let confidence = rising.max(falling) as f64 / moves as f64;

        let total_range: Decimal = candles.iter().map(|c| c.high - c.low).sum();
        let avg_range = total_range / Decimal::from(candles.len() as u64);
        let entry_price = last.close;
        let target_price = match direction {
            SignalDirection::Buy => entry_price + avg_range,
            SignalDirection::Sell => entry_price - avg_range,
        };

        Ok(Some(SignalCandidate {
            asset: asset.to_string(),
            timeframe,
            direction,
            confidence,
            entry_price,
            target_price,
            expiry_time: self.clock.now() + Duration::minutes(i64::from(timeframe)),
        }))
    }

    fn name(&self) -> &str {
        "momentum"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone, Utc};
    use common::{Candle, ManualClock};
    use market_data::InMemoryPriceStore;
    use rust_decimal_macros::dec;

    async fn store_with_closes(closes: &[Decimal]) -> Arc<InMemoryPriceStore> {
        let store = Arc::new(InMemoryPriceStore::new());
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        for (i, close) in closes.iter().enumerate() {
            store
                .upsert(&Candle {
                    asset: "EURUSD".to_string(),
                    timeframe: 1,
                    timestamp: base + Duration::minutes(i as i64),
                    open: *close,
                    high: *close + dec!(0.0002),
                    low: *close - dec!(0.0002),
                    close: *close,
                    volume: Decimal::ZERO,
                })
                .await
                .unwrap();
        }
        store
    }

    fn analyzer(store: Arc<InMemoryPriceStore>) -> MomentumAnalyzer {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 5, 0).unwrap(),
            FixedOffset::east_opt(3600).unwrap(),
        ));
        MomentumAnalyzer::new(
            store,
            clock,
            MomentumConfig {
                lookback: 20,
                min_candles: 4,
            },
        )
    }

    #[tokio::test]
    async fn test_steady_rise_is_confident_buy() {
        let store = store_with_closes(&[dec!(1.1000), dec!(1.1001), dec!(1.1002), dec!(1.1003), dec!(1.1004)]).await;
        let candidate = analyzer(store).analyze("EURUSD", 1).await.unwrap().unwrap();

        assert_eq!(candidate.direction, SignalDirection::Buy);
        assert_eq!(candidate.confidence, 1.0);
        assert_eq!(candidate.entry_price, dec!(1.1004));
        assert_eq!(candidate.target_price, dec!(1.1008));
        assert_eq!(
            candidate.expiry_time,
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 6, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_mostly_falling_is_sell() {
        let store = store_with_closes(&[dec!(1.1004), dec!(1.1002), dec!(1.1003), dec!(1.1001), dec!(1.1000)]).await;
        let candidate = analyzer(store).analyze("EURUSD", 1).await.unwrap().unwrap();

        assert_eq!(candidate.direction, SignalDirection::Sell);
        assert_eq!(candidate.confidence, 0.75);
    }

    #[tokio::test]
    async fn test_flat_or_sparse_history_yields_nothing() {
        let flat = store_with_closes(&[dec!(1.1), dec!(1.1), dec!(1.1), dec!(1.1)]).await;
        assert!(analyzer(flat).analyze("EURUSD", 1).await.unwrap().is_none());

        let sparse = store_with_closes(&[dec!(1.1), dec!(1.2)]).await;
        assert!(analyzer(sparse).analyze("EURUSD", 1).await.unwrap().is_none());
    }
}
