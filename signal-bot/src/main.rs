use anyhow::{Context, Result};
use common::{Clock, LocalClock, Session};
use market_data::{InMemoryPriceStore, PriceStore, RetentionSweeper, TimeSeriesDB};
use monitoring::{Reconciler, StatisticsAggregator, SummaryKind, SummaryReporter};
use signal_generation::{
    InMemoryStorage, LogNotifier, MomentumAnalyzer, MomentumConfig, Notifier, PgSignalStorage, SignalPipeline,
    SignalStorage, TelegramNotifier, Verifier,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};

mod config;

use config::BotConfig;

const DEFAULT_CONFIG_PATH: &str = "signal-bot.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = BotConfig::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(config.log_level())
        .init();

    info!("🚀 Starting trading signal bot");
    info!("📈 Monitoring: {}", config.assets.join(", "));
    info!(
        "⏱️ Timeframes: {}",
        config
            .timeframes
            .iter()
            .map(|tf| format!("M{}", tf))
            .collect::<Vec<_>>()
            .join(", ")
    );
    info!("🎯 Min Confidence: {:.0}%", config.min_confidence * 100.0);

    let clock: Arc<dyn Clock> = Arc::new(LocalClock::from_hours(config.utc_offset_hours)?);
    let session = Arc::new(Session::new(clock.now()));

    let (prices, signals) = open_stores(&config).await?;
    let notifier = build_notifier(&config, clock.as_ref());

    let verifier = Arc::new(Verifier::new(
        prices.clone(),
        signals.clone(),
        clock.clone(),
        config.verifier(),
    ));

    let analyzer = Arc::new(MomentumAnalyzer::new(
        prices.clone(),
        clock.clone(),
        MomentumConfig::default(),
    ));

    let pipeline = Arc::new(
        SignalPipeline::new(
            config.pipeline(),
            analyzer,
            notifier.clone(),
            signals.clone(),
            verifier.clone(),
            clock.clone(),
            session.clone(),
        )
        .with_data_gate(prices.clone()),
    );

    let reconciler = Reconciler::new(
        signals.clone(),
        verifier.clone(),
        clock.clone(),
        config.reconciler(),
    );
    reconciler
        .resume_pending()
        .await
        .context("Failed to resume pending signals")?;

    let reporter = Arc::new(SummaryReporter::new(
        StatisticsAggregator::new(signals.clone()),
        notifier.clone(),
        session.clone(),
        clock.clone(),
    ));

    let records = prices.stats().await.map(|s| s.total_records).unwrap_or(0);
    let startup = format!(
        "🤖 *SIGNAL BOT STARTED*\n\n📊 Database: {} records\n📈 Assets: {}\n🎯 Min Confidence: {:.0}%\n⏰ Started: {}",
        records,
        config.assets.len(),
        config.min_confidence * 100.0,
        clock.local_now().format("%Y-%m-%d %H:%M:%S")
    );
    if let Err(e) = notifier.send_text(&startup).await {
        warn!("Could not send startup message: {}", e);
    }

    tokio::spawn(RetentionSweeper::new(prices.clone(), clock.clone()).run());
    tokio::spawn(reconciler.run());
    tokio::spawn(reporter.clone().run(config.summary_interval()));

    info!("✅ Bot is running. Press Ctrl+C to stop.");

    tokio::select! {
        _ = pipeline.clone().run(config.scan_interval()) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Signal bot stopped by user");
        }
    }

    if let Err(e) = reporter.report(SummaryKind::Shutdown).await {
        warn!("Could not produce shutdown summary: {:#}", e);
    }

    info!("👋 Shutting down gracefully...");
    Ok(())
}

/// PostgreSQL stores when a database URL is configured, in-memory otherwise.
/// An unreachable database is fatal at startup.
async fn open_stores(config: &BotConfig) -> Result<(Arc<dyn PriceStore>, Arc<dyn SignalStorage>)> {
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .context("Failed to connect to database")?;

            let prices = TimeSeriesDB::new(pool.clone());
            prices.init_tables().await.context("Failed to create price tables")?;

            let signals = PgSignalStorage::new(pool);
            signals.init_tables().await.context("Failed to create signal tables")?;

            info!("✅ Connected to PostgreSQL");
            let prices: Arc<dyn PriceStore> = Arc::new(prices);
            let signals: Arc<dyn SignalStorage> = Arc::new(signals);
            Ok((prices, signals))
        }
        None => {
            warn!("No database_url configured, using in-memory stores");
            let prices: Arc<dyn PriceStore> = Arc::new(InMemoryPriceStore::new());
            let signals: Arc<dyn SignalStorage> = Arc::new(InMemoryStorage::new());
            Ok((prices, signals))
        }
    }
}

fn build_notifier(config: &BotConfig, clock: &dyn Clock) -> Arc<dyn Notifier> {
    let telegram = &config.telegram;
    if telegram.enabled {
        match TelegramNotifier::new(telegram.token.clone(), telegram.chat_id.clone(), clock.offset()) {
            Ok(notifier) => {
                info!("🔔 Telegram: Enabled");
                return Arc::new(notifier);
            }
            Err(e) => warn!("Telegram disabled: {}", e),
        }
    }

    info!("🔔 Telegram: Disabled, signals are logged only");
    Arc::new(LogNotifier::new(clock.offset()))
}
