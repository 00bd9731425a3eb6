//! Signal verification.
//!
//! One verifier run owns exactly one signal's `PENDING -> WIN | LOSS | ERROR`
//! transition. It sleeps until `expiry_time + grace`, reads the most recent
//! candles, picks the one closest to expiry and writes the terminal result.

use chrono::{DateTime, Duration, Utc};
use common::{Candle, Clock, Outcome, Result, Signal, SignalError, SignalResult};
use market_data::PriceStore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::storage::SignalStorage;

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Delay after expiry so the expiry candle has closed and been stored
    pub grace: Duration,
    /// Number of recent candles fetched to match against expiry
    pub lookback: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            grace: Duration::minutes(1),
            lookback: 10,
        }
    }
}

pub struct Verifier {
    prices: Arc<dyn PriceStore>,
    signals: Arc<dyn SignalStorage>,
    clock: Arc<dyn Clock>,
    config: VerifierConfig,
}

impl Verifier {
    pub fn new(
        prices: Arc<dyn PriceStore>,
        signals: Arc<dyn SignalStorage>,
        clock: Arc<dyn Clock>,
        config: VerifierConfig,
    ) -> Self {
        Self {
            prices,
            signals,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Point in time at which `signal` may be verified
    pub fn verify_at(&self, signal: &Signal) -> DateTime<Utc> {
        signal.expiry_time + self.config.grace
    }

    /// Run verification for `signal` on its own task
    pub fn spawn(self: &Arc<Self>, signal: Signal) -> JoinHandle<Outcome> {
        info!(
            "🕐 Verification scheduled for signal {} ({} M{}) at {}",
            signal.id,
            signal.asset,
            signal.timeframe,
            self.verify_at(&signal)
        );

        let verifier = Arc::clone(self);
        tokio::spawn(async move { verifier.run(signal).await })
    }

    /// Wait until the signal's verification time, then verify it
    pub async fn run(&self, signal: Signal) -> Outcome {
        let verify_at = self.verify_at(&signal);
        // Negative deltas fail the conversion: already due
        if let Ok(wait) = (verify_at - self.clock.now()).to_std() {
            debug!("Signal {} sleeping {}s until verification", signal.id, wait.as_secs());
            tokio::time::sleep(wait).await;
        }

        self.verify_now(&signal).await
    }

    /// Classify `signal` against current data and persist the terminal result.
    ///
    /// Any failure while reading or classifying becomes an `ERROR` result. A
    /// rejected WIN/LOSS write is followed by one `ERROR` write; if that fails
    /// too the signal stays `PENDING` for the reconciliation pass.
    pub async fn verify_now(&self, signal: &Signal) -> Outcome {
        let outcome = match self.evaluate(signal).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Verification of signal {} failed: {}", signal.id, e);
                Outcome::error()
            }
        };

        match self
            .signals
            .update_result(signal.id, outcome.result, outcome.close_price, self.clock.now())
            .await
        {
            Ok(true) => info!(
                "✅ Signal {} ({} M{} {}) verified: {} close={:?} pnl={:?}",
                signal.id,
                signal.asset,
                signal.timeframe,
                signal.direction,
                outcome.result,
                outcome.close_price,
                outcome.pnl
            ),
            Ok(false) => warn!("Signal {} already had a terminal result, left unchanged", signal.id),
            Err(e) if outcome.result != SignalResult::Error => {
                warn!("Could not store {} for signal {}, recording ERROR: {}", outcome.result, signal.id, e);
                return self.record_error(signal).await;
            }
            Err(e) => error!("❌ Could not store result for signal {}, it stays PENDING: {}", signal.id, e),
        }

        outcome
    }

    /// Single fallback write after a rejected WIN/LOSS write
    async fn record_error(&self, signal: &Signal) -> Outcome {
        match self
            .signals
            .update_result(signal.id, SignalResult::Error, None, self.clock.now())
            .await
        {
            Ok(true) => info!("⚠️ Signal {} ({} M{}) recorded as ERROR", signal.id, signal.asset, signal.timeframe),
            Ok(false) => warn!("Signal {} already had a terminal result, left unchanged", signal.id),
            Err(e) => error!("❌ Could not store result for signal {}, it stays PENDING: {}", signal.id, e),
        }

        Outcome::error()
    }

    async fn evaluate(&self, signal: &Signal) -> Result<Outcome> {
        let candles = self
            .prices
            .latest_candles(&signal.asset, signal.timeframe, self.config.lookback)
            .await?;

        let candle = closest_candle(&candles, signal.expiry_time).ok_or_else(|| {
            SignalError::DataUnavailable {
                asset: signal.asset.clone(),
                timeframe: signal.timeframe,
            }
        })?;

        debug!(
            "Signal {} matched candle at {} (expiry {})",
            signal.id, candle.timestamp, signal.expiry_time
        );

        Ok(Outcome::classify(signal.direction, signal.entry_price, candle.close))
    }
}

/// Candle whose timestamp is nearest to `expiry`. Ties keep the first in input order.
pub fn closest_candle(candles: &[Candle], expiry: DateTime<Utc>) -> Option<&Candle> {
    candles
        .iter()
        .min_by_key(|c| (c.timestamp - expiry).num_milliseconds().abs())
}
