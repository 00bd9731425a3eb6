//! Periodic and shutdown session summaries.

use anyhow::Result;
use chrono::{DateTime, Utc};
use common::{format_uptime, Clock, Session};
use signal_generation::Notifier;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::metrics::{SignalStatistics, StatisticsAggregator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryKind {
    Periodic,
    Shutdown,
}

impl SummaryKind {
    fn title(&self) -> &'static str {
        match self {
            SummaryKind::Periodic => "📊 *SESSION SUMMARY*",
            SummaryKind::Shutdown => "🛑 *SIGNAL BOT STOPPED*",
        }
    }
}

pub fn summary_message(
    kind: SummaryKind,
    stats: &SignalStatistics,
    session: &Session,
    now: DateTime<Utc>,
    clock: &dyn Clock,
) -> String {
    format!(
        "{}\n\n\
         🎯 Signals Sent: {}\n\
         ✅ Wins: {}\n\
         ❌ Losses: {}\n\
         ⏳ Pending: {}\n\
         ⚠️ Errors: {}\n\
         📈 Win Rate: {:.1}%\n\n\
         ⏱️ Uptime: {}\n\
         ⏰ Time: {}",
        kind.title(),
        session.signals_sent(),
        stats.wins,
        stats.losses,
        stats.pending,
        stats.errors,
        stats.win_rate,
        format_uptime(session.uptime(now)),
        now.with_timezone(&clock.offset()).format("%Y-%m-%d %H:%M:%S")
    )
}

pub struct SummaryReporter {
    aggregator: StatisticsAggregator,
    notifier: Arc<dyn Notifier>,
    session: Arc<Session>,
    clock: Arc<dyn Clock>,
}

impl SummaryReporter {
    pub fn new(
        aggregator: StatisticsAggregator,
        notifier: Arc<dyn Notifier>,
        session: Arc<Session>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            aggregator,
            notifier,
            session,
            clock,
        }
    }

    /// Compute statistics, log them and push them to the notification channel
    pub async fn report(&self, kind: SummaryKind) -> Result<SignalStatistics> {
        let stats = self.aggregator.snapshot().await?;
        let now = self.clock.now();

        info!(
            "📊 {:?} summary: {} sent | {} wins | {} losses | {} pending | {} errors | win rate {:.1}% | net P&L {}",
            kind,
            self.session.signals_sent(),
            stats.wins,
            stats.losses,
            stats.pending,
            stats.errors,
            stats.win_rate,
            stats.net_pnl
        );

        let message = summary_message(kind, &stats, &self.session, now, self.clock.as_ref());
        if let Err(e) = self.notifier.send_text(&message).await {
            warn!("Could not deliver {:?} summary: {}", kind, e);
        }

        Ok(stats)
    }

    /// Emit a periodic summary every `period`, starting one period from now
    pub async fn run(self: Arc<Self>, period: Duration) {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.report(SummaryKind::Periodic).await {
                error!("Error producing session summary: {:#}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{FixedOffset, TimeZone};
    use common::{ManualClock, SignalCandidate, SignalError};
    use signal_generation::InMemoryStorage;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        texts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_signal(&self, _candidate: &SignalCandidate) -> common::Result<()> {
            Err(SignalError::Notification("unused".into()))
        }

        async fn send_text(&self, text: &str) -> common::Result<()> {
            self.texts.lock().await.push(text.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_shutdown_summary_is_sent() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(
            start + chrono::Duration::minutes(90),
            FixedOffset::east_opt(3600).unwrap(),
        ));
        let session = Arc::new(Session::new(start));
        session.record_sent();
        let notifier = Arc::new(RecordingNotifier::default());
        let reporter = SummaryReporter::new(
            StatisticsAggregator::new(Arc::new(InMemoryStorage::new())),
            notifier.clone(),
            session,
            clock,
        );

        let stats = reporter.report(SummaryKind::Shutdown).await.unwrap();
        assert_eq!(stats.total, 0);

        let texts = notifier.texts.lock().await;
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("🛑 *SIGNAL BOT STOPPED*"));
        assert!(texts[0].contains("🎯 Signals Sent: 1"));
        assert!(texts[0].contains("📈 Win Rate: 0.0%"));
        assert!(texts[0].contains("⏱️ Uptime: 1:30:00"));
        assert!(texts[0].contains("⏰ Time: 2024-03-01 09:30:00"));
    }
}
