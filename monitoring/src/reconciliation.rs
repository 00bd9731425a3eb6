use anyhow::{Context, Result};
use chrono::Duration;
use common::{Clock, Signal};
use signal_generation::{SignalStorage, Verifier};
use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// How often stale signals are looked for
    pub interval: std::time::Duration,
    /// Extra time past `expiry + grace` before a `PENDING` signal counts as stale
    pub margin: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: std::time::Duration::from_secs(300),
            margin: Duration::minutes(5),
        }
    }
}

/// Reconciler - recovers signals whose verification was lost or whose
/// terminal write failed
pub struct Reconciler {
    signals: Arc<dyn SignalStorage>,
    verifier: Arc<Verifier>,
    clock: Arc<dyn Clock>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        signals: Arc<dyn SignalStorage>,
        verifier: Arc<Verifier>,
        clock: Arc<dyn Clock>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            signals,
            verifier,
            clock,
            config,
        }
    }

    /// Startup recovery: give every `PENDING` signal a fresh verifier.
    /// Verification state is not persisted, so anything in flight at the last
    /// shutdown is picked up here.
    pub async fn resume_pending(&self) -> Result<usize> {
        let pending = self
            .signals
            .get_pending()
            .await
            .context("Failed to load pending signals")?;

        let count = pending.len();
        for signal in pending {
            self.verifier.spawn(signal);
        }

        if count > 0 {
            info!("♻️ Resumed verification for {} pending signal(s)", count);
        }
        Ok(count)
    }

    /// `PENDING` signals past `expiry + grace + margin`
    pub async fn stale_signals(&self) -> Result<Vec<Signal>> {
        let now = self.clock.now();
        let pending = self
            .signals
            .get_pending()
            .await
            .context("Failed to load pending signals")?;

        Ok(pending
            .into_iter()
            .filter(|s| self.verifier.verify_at(s) + self.config.margin <= now)
            .collect())
    }

    /// Verify every stale signal immediately, returning how many were attempted
    pub async fn reconcile(&self) -> Result<usize> {
        let stale = self.stale_signals().await?;

        if stale.is_empty() {
            return Ok(0);
        }

        warn!("Found {} signal(s) still PENDING past their verification time", stale.len());
        for signal in &stale {
            self.verifier.verify_now(signal).await;
        }

        Ok(stale.len())
    }

    /// Periodic reconciliation loop. The first pass runs one interval after start.
    pub async fn run(self) {
        let mut ticker = interval_at(Instant::now() + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.reconcile().await {
                error!("Reconciliation pass failed: {:#}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset, TimeZone, Utc};
    use common::{Candle, ManualClock, SignalCandidate, SignalDirection, SignalResult};
    use market_data::{InMemoryPriceStore, PriceStore};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use signal_generation::{InMemoryStorage, VerifierConfig};

    fn t(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn candidate(expiry_minute: i64) -> SignalCandidate {
        SignalCandidate {
            asset: "EURUSD".to_string(),
            timeframe: 1,
            direction: SignalDirection::Buy,
            confidence: 0.9,
            entry_price: dec!(1.1000),
            target_price: dec!(1.1010),
            expiry_time: t(expiry_minute),
        }
    }

    struct Fixture {
        signals: Arc<InMemoryStorage>,
        reconciler: Reconciler,
    }

    async fn fixture(now_minute: i64) -> Fixture {
        let prices = Arc::new(InMemoryPriceStore::new());
        for minute in 0..5 {
            prices
                .upsert(&Candle {
                    asset: "EURUSD".to_string(),
                    timeframe: 1,
                    timestamp: t(minute),
                    open: dec!(1.1000),
                    high: dec!(1.1030),
                    low: dec!(1.0990),
                    close: dec!(1.1020),
                    volume: Decimal::ZERO,
                })
                .await
                .unwrap();
        }
        let signals = Arc::new(InMemoryStorage::new());
        let clock = Arc::new(ManualClock::new(t(now_minute), FixedOffset::east_opt(3600).unwrap()));
        let verifier = Arc::new(Verifier::new(
            prices,
            signals.clone(),
            clock.clone(),
            VerifierConfig::default(),
        ));
        let reconciler = Reconciler::new(signals.clone(), verifier, clock, ReconcilerConfig::default());
        Fixture { signals, reconciler }
    }

    #[tokio::test]
    async fn test_reconcile_only_touches_stale_pending() {
        // now = 10:20; stale threshold for expiry E is E + 1m grace + 5m margin
        let f = fixture(20).await;
        let stale = f.signals.create(&candidate(2), t(0)).await.unwrap();
        let fresh = f.signals.create(&candidate(15), t(0)).await.unwrap();
        let done = f.signals.create(&candidate(1), t(0)).await.unwrap();
        f.signals
            .update_result(done, SignalResult::Loss, Some(dec!(1.0990)), t(3))
            .await
            .unwrap();

        assert_eq!(f.reconciler.reconcile().await.unwrap(), 1);

        for (id, expected) in [
            (stale, SignalResult::Win),
            (fresh, SignalResult::Pending),
            (done, SignalResult::Loss),
        ] {
            assert_eq!(f.signals.get(id).await.unwrap().unwrap().result, expected);
        }

        // Nothing left to do on the next pass
        assert_eq!(f.reconciler.reconcile().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_resume_pending_verifies_past_due_signals() {
        let f = fixture(20).await;
        let id = f.signals.create(&candidate(3), t(0)).await.unwrap();

        assert_eq!(f.reconciler.resume_pending().await.unwrap(), 1);

        let mut result = SignalResult::Pending;
        for _ in 0..100 {
            result = f.signals.get(id).await.unwrap().unwrap().result;
            if result.is_terminal() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(result, SignalResult::Win);
    }
}
