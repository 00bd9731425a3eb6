use anyhow::{Context, Result};
use common::{Signal, SignalResult};
use rust_decimal::Decimal;
use serde::Serialize;
use signal_generation::SignalStorage;
use std::sync::Arc;
use tracing::debug;

/// Outcome counts over every stored signal
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignalStatistics {
    pub total: usize,
    pub wins: usize,
    pub losses: usize,
    pub pending: usize,
    pub errors: usize,
    /// `wins / (wins + losses)` in percent, 0 when nothing is decided yet
    pub win_rate: f64,
    /// Sum of signed P&L over decided signals
    pub net_pnl: Decimal,
}

impl SignalStatistics {
    pub fn from_signals(signals: &[Signal]) -> Self {
        let mut stats = SignalStatistics {
            total: signals.len(),
            ..Default::default()
        };

        for signal in signals {
            match signal.result {
                SignalResult::Win => stats.wins += 1,
                SignalResult::Loss => stats.losses += 1,
                SignalResult::Pending => stats.pending += 1,
                SignalResult::Error => stats.errors += 1,
            }

            if matches!(signal.result, SignalResult::Win | SignalResult::Loss) {
                stats.net_pnl += signal.pnl().unwrap_or(Decimal::ZERO);
            }
        }

        let decided = stats.wins + stats.losses;
        stats.win_rate = if decided > 0 {
            stats.wins as f64 / decided as f64 * 100.0
        } else {
            0.0
        };

        stats
    }
}

/// Statistics Aggregator - read-side view over the signal store
pub struct StatisticsAggregator {
    signals: Arc<dyn SignalStorage>,
}

impl StatisticsAggregator {
    pub fn new(signals: Arc<dyn SignalStorage>) -> Self {
        Self { signals }
    }

    pub async fn snapshot(&self) -> Result<SignalStatistics> {
        let signals = self
            .signals
            .get_all()
            .await
            .context("Failed to load signals for statistics")?;

        let stats = SignalStatistics::from_signals(&signals);
        debug!("Signal statistics: {:?}", stats);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common::{SignalCandidate, SignalDirection};
    use rust_decimal_macros::dec;
    use signal_generation::InMemoryStorage;
    use uuid::Uuid;

    fn signal(direction: SignalDirection, result: SignalResult, close: Option<Decimal>) -> Signal {
        let candidate = SignalCandidate {
            asset: "EURUSD".to_string(),
            timeframe: 1,
            direction,
            confidence: 0.8,
            entry_price: dec!(1.1000),
            target_price: dec!(1.1010),
            expiry_time: Utc.with_ymd_and_hms(2024, 3, 1, 10, 1, 0).unwrap(),
        };
        let mut signal = Signal::pending(
            Uuid::new_v4(),
            &candidate,
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        );
        signal.result = result;
        signal.close_price = close;
        signal
    }

    #[test]
    fn test_no_decided_signals_has_zero_win_rate() {
        let stats = SignalStatistics::from_signals(&[
            signal(SignalDirection::Buy, SignalResult::Pending, None),
            signal(SignalDirection::Sell, SignalResult::Error, None),
        ]);

        assert_eq!(stats.wins, 0);
        assert_eq!(stats.losses, 0);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.win_rate, 0.0);
        assert_eq!(stats.net_pnl, Decimal::ZERO);

        assert_eq!(SignalStatistics::from_signals(&[]).win_rate, 0.0);
    }

    #[test]
    fn test_counts_and_win_rate() {
        let stats = SignalStatistics::from_signals(&[
            signal(SignalDirection::Buy, SignalResult::Win, Some(dec!(1.1010))),
            signal(SignalDirection::Sell, SignalResult::Win, Some(dec!(1.0990))),
            signal(SignalDirection::Buy, SignalResult::Win, Some(dec!(1.1005))),
            signal(SignalDirection::Buy, SignalResult::Loss, Some(dec!(1.0980))),
            signal(SignalDirection::Buy, SignalResult::Pending, None),
            signal(SignalDirection::Buy, SignalResult::Error, None),
        ]);

        assert_eq!(stats.total, 6);
        assert_eq!(stats.wins, 3);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.win_rate, 75.0);
        // +0.0010 +0.0010 +0.0005 -0.0020
        assert_eq!(stats.net_pnl, dec!(0.0005));
    }

    #[tokio::test]
    async fn test_snapshot_reads_store() {
        let storage = Arc::new(InMemoryStorage::new());
        let candidate = SignalCandidate {
            asset: "GBPUSD".to_string(),
            timeframe: 5,
            direction: SignalDirection::Sell,
            confidence: 0.9,
            entry_price: dec!(1.2500),
            target_price: dec!(1.2490),
            expiry_time: Utc.with_ymd_and_hms(2024, 3, 1, 10, 5, 0).unwrap(),
        };
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let id = storage.create(&candidate, now).await.unwrap();
        storage.create(&candidate, now).await.unwrap();
        storage
            .update_result(id, SignalResult::Loss, Some(dec!(1.2510)), now)
            .await
            .unwrap();

        let stats = StatisticsAggregator::new(storage).snapshot().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.win_rate, 0.0);
        assert_eq!(stats.net_pnl, dec!(-0.0010));
    }
}
