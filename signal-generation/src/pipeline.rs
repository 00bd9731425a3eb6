// Signal Generation Pipeline
// Scans every (asset, timeframe) pair, ranks candidates and hands the best ones
// to notification, persistence and verification

use super::notify::Notifier;
use super::signals::Analyzer;
use super::storage::SignalStorage;
use super::verification::Verifier;
use common::{format_uptime, Clock, Result, Session, Signal, SignalCandidate, SignalError};
use futures::future::join_all;
use market_data::PriceStore;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Configuration for the signal generation pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Instruments to analyse
    pub assets: Vec<String>,
    /// Bar widths in minutes
    pub timeframes: Vec<u32>,
    /// Minimum confidence for a candidate to be accepted
    pub min_confidence: f64,
    /// Maximum number of signals emitted per scan
    pub max_signals_per_scan: usize,
    /// Scans are skipped while the price store holds fewer rows than this
    pub min_records: u64,
    /// Upper bound on a single analyzer call
    pub analyzer_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            assets: ["EURUSD", "GBPUSD", "USDJPY", "USDCAD", "AUDUSD"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timeframes: vec![1, 5, 15],
            min_confidence: 0.7,
            max_signals_per_scan: 3,
            min_records: 100,
            analyzer_timeout: Duration::from_secs(5),
        }
    }
}

/// What a single scan did
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Scan skipped because the price store lacked data
    pub skipped: bool,
    pub pairs: usize,
    pub candidates: usize,
    pub accepted: usize,
    pub failures: usize,
    /// Signals that were notified, persisted and handed to a verifier
    pub emitted: Vec<Signal>,
}

/// Signal generation pipeline
pub struct SignalPipeline {
    analyzer: Arc<dyn Analyzer>,
    notifier: Arc<dyn Notifier>,
    signals: Arc<dyn SignalStorage>,
    verifier: Arc<Verifier>,
    clock: Arc<dyn Clock>,
    session: Arc<Session>,
    data_gate: Option<Arc<dyn PriceStore>>,
    config: PipelineConfig,
}

impl SignalPipeline {
    pub fn new(
        config: PipelineConfig,
        analyzer: Arc<dyn Analyzer>,
        notifier: Arc<dyn Notifier>,
        signals: Arc<dyn SignalStorage>,
        verifier: Arc<Verifier>,
        clock: Arc<dyn Clock>,
        session: Arc<Session>,
    ) -> Self {
        info!("Signal pipeline using analyzer: {}", analyzer.name());
        Self {
            analyzer,
            notifier,
            signals,
            verifier,
            clock,
            session,
            data_gate: None,
            config,
        }
    }

    /// Skip scans until `prices` holds at least `min_records` rows
    pub fn with_data_gate(mut self, prices: Arc<dyn PriceStore>) -> Self {
        self.data_gate = Some(prices);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Scan on a fixed period until the task is dropped
    pub async fn run(self: Arc<Self>, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.scan().await;
        }
    }

    /// One full pass over all pairs
    pub async fn scan(&self) -> ScanReport {
        info!(
            "🔄 Analysis started at {}",
            self.clock.local_now().format("%Y-%m-%d %H:%M:%S")
        );

        let mut report = ScanReport::default();

        if !self.data_ready().await {
            report.skipped = true;
            return report;
        }

        let accepted = self.collect_candidates(&mut report).await;

        if accepted.is_empty() {
            info!("🔭 No high-confidence signals at this time");
        } else {
            info!("🎯 Found {} trading signal(s)", accepted.len());
        }

        let total = accepted.len();
        for (idx, candidate) in accepted.into_iter().enumerate() {
            info!(
                "📊 Signal {}/{}: {} M{} | {} | Confidence: {:.1}% | Entry: {:.5}",
                idx + 1,
                total,
                candidate.asset,
                candidate.timeframe,
                candidate.direction,
                candidate.confidence * 100.0,
                candidate.entry_price
            );

            if let Some(signal) = self.emit(candidate).await {
                report.emitted.push(signal);
            }
        }

        info!(
            "📊 Session: {} signals sent | Uptime: {}",
            self.session.signals_sent(),
            format_uptime(self.session.uptime(self.clock.now()))
        );

        report
    }

    async fn data_ready(&self) -> bool {
        let prices = match &self.data_gate {
            Some(prices) => prices,
            None => return true,
        };

        match prices.stats().await {
            Ok(stats) if stats.total_records >= self.config.min_records => true,
            Ok(stats) => {
                warn!(
                    "⏳ Low data count: {} records, need {} before scanning",
                    stats.total_records, self.config.min_records
                );
                false
            }
            Err(e) => {
                warn!("⏳ Could not read price store stats, skipping scan: {}", e);
                false
            }
        }
    }

    /// Analyse every pair concurrently, filter by confidence, rank and cap
    async fn collect_candidates(&self, report: &mut ScanReport) -> Vec<SignalCandidate> {
        let pairs: Vec<(&str, u32)> = self
            .config
            .assets
            .iter()
            .flat_map(|asset| self.config.timeframes.iter().map(move |tf| (asset.as_str(), *tf)))
            .collect();
        report.pairs = pairs.len();

        let results = join_all(
            pairs
                .iter()
                .map(|(asset, timeframe)| self.analyze_pair(asset, *timeframe)),
        )
        .await;

        let mut accepted = Vec::new();
        for ((asset, timeframe), result) in pairs.iter().zip(results) {
            match result {
                Ok(Some(candidate)) => {
                    report.candidates += 1;
                    if candidate.confidence >= self.config.min_confidence {
                        accepted.push(candidate);
                    } else {
                        debug!(
                            "{} M{} below confidence threshold: {:.2}",
                            asset, timeframe, candidate.confidence
                        );
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    report.failures += 1;
                    error!("Error analyzing {} M{}: {}", asset, timeframe, e);
                }
            }
        }
        report.accepted = accepted.len();

        // Stable sort: equal confidence keeps pair order
        accepted.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });
        accepted.truncate(self.config.max_signals_per_scan);
        accepted
    }

    async fn analyze_pair(&self, asset: &str, timeframe: u32) -> Result<Option<SignalCandidate>> {
        match tokio::time::timeout(
            self.config.analyzer_timeout,
            self.analyzer.analyze(asset, timeframe),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SignalError::Analyzer {
                asset: asset.to_string(),
                timeframe,
                reason: format!("timed out after {:?}", self.config.analyzer_timeout),
            }),
        }
    }

    /// Notify, then persist, then verify. Signals that could not be sent are not tracked.
    async fn emit(&self, candidate: SignalCandidate) -> Option<Signal> {
        if let Err(e) = self.notifier.send_signal(&candidate).await {
            warn!(
                "Signal {} M{} not delivered, not tracking it: {}",
                candidate.asset, candidate.timeframe, e
            );
            return None;
        }
        self.session.record_sent();

        let created_at = self.clock.now();
        match self.signals.create(&candidate, created_at).await {
            Ok(id) => {
                let signal = Signal::pending(id, &candidate, created_at);
                self.verifier.spawn(signal.clone());
                Some(signal)
            }
            Err(e) => {
                error!(
                    "Failed to store signal {} M{}: {}",
                    candidate.asset, candidate.timeframe, e
                );
                None
            }
        }
    }
}
