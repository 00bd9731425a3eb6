//! Service configuration

use common::SignalError;
use monitoring::ReconcilerConfig;
use serde::{Deserialize, Serialize};
use signal_generation::{PipelineConfig, VerifierConfig};
use std::time::Duration;
use tracing::Level;

/// Overall bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Instruments to scan
    #[serde(default = "default_assets")]
    pub assets: Vec<String>,

    /// Bar widths in minutes
    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<u32>,

    /// Minimum analyzer confidence for a signal to be emitted
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Cap on signals emitted per scan
    #[serde(default = "default_max_signals_per_scan")]
    pub max_signals_per_scan: usize,

    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    /// Scans are skipped until the price store holds this many candles
    #[serde(default = "default_min_records")]
    pub min_records: u64,

    #[serde(default = "default_analyzer_timeout_secs")]
    pub analyzer_timeout_secs: u64,

    /// Fixed offset from UTC used for local time
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// PostgreSQL connection string; in-memory stores when absent
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_summary_interval_secs")]
    pub summary_interval_secs: u64,

    #[serde(default)]
    pub verification: VerificationSettings,

    #[serde(default)]
    pub telegram: TelegramSettings,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            assets: default_assets(),
            timeframes: default_timeframes(),
            min_confidence: default_min_confidence(),
            max_signals_per_scan: default_max_signals_per_scan(),
            scan_interval_secs: default_scan_interval_secs(),
            min_records: default_min_records(),
            analyzer_timeout_secs: default_analyzer_timeout_secs(),
            utc_offset_hours: default_utc_offset_hours(),
            log_level: default_log_level(),
            database_url: None,
            summary_interval_secs: default_summary_interval_secs(),
            verification: VerificationSettings::default(),
            telegram: TelegramSettings::default(),
        }
    }
}

/// Verification and recovery timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSettings {
    /// Delay after expiry before a signal is checked
    #[serde(default = "default_grace_secs")]
    pub grace_secs: i64,

    /// Candles fetched when matching against expiry
    #[serde(default = "default_lookback")]
    pub lookback: usize,

    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,

    /// How far past its verification time a PENDING signal must be before it is retried
    #[serde(default = "default_reconcile_margin_secs")]
    pub reconcile_margin_secs: i64,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            grace_secs: default_grace_secs(),
            lookback: default_lookback(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
            reconcile_margin_secs: default_reconcile_margin_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub chat_id: String,
}

fn default_assets() -> Vec<String> {
    ["EURUSD", "GBPUSD", "USDJPY", "USDCAD", "AUDUSD"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_timeframes() -> Vec<u32> {
    vec![1, 5, 15]
}

fn default_min_confidence() -> f64 {
    0.7
}

fn default_max_signals_per_scan() -> usize {
    3
}

fn default_scan_interval_secs() -> u64 {
    60
}

fn default_min_records() -> u64 {
    100
}

fn default_analyzer_timeout_secs() -> u64 {
    5
}

fn default_utc_offset_hours() -> i32 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_summary_interval_secs() -> u64 {
    3600
}

fn default_grace_secs() -> i64 {
    60
}

fn default_lookback() -> usize {
    10
}

fn default_reconcile_interval_secs() -> u64 {
    300
}

fn default_reconcile_margin_secs() -> i64 {
    300
}

impl BotConfig {
    /// Layer an optional TOML file with `SIGNAL_BOT__*` environment variables
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("SIGNAL_BOT")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("assets")
                    .with_list_parse_key("timeframes")
                    .try_parsing(true),
            )
            .build()?;

        let mut loaded: BotConfig = settings.try_deserialize()?;
        if loaded.database_url.is_none() {
            loaded.database_url = std::env::var("DATABASE_URL").ok();
        }

        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), SignalError> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(SignalError::Config(format!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        if self.assets.is_empty() || self.timeframes.is_empty() {
            return Err(SignalError::Config("assets and timeframes must not be empty".into()));
        }
        if self.timeframes.contains(&0) {
            return Err(SignalError::Config("timeframes must be positive".into()));
        }
        if self.utc_offset_hours.abs() > 23 {
            return Err(SignalError::Config(format!(
                "utc_offset_hours out of range: {}",
                self.utc_offset_hours
            )));
        }
        if self.scan_interval_secs == 0 || self.summary_interval_secs == 0 {
            return Err(SignalError::Config("intervals must be positive".into()));
        }
        if self.verification.reconcile_interval_secs == 0 || self.verification.grace_secs < 0 {
            return Err(SignalError::Config("invalid verification timing".into()));
        }
        Ok(())
    }

    pub fn log_level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            assets: self.assets.clone(),
            timeframes: self.timeframes.clone(),
            min_confidence: self.min_confidence,
            max_signals_per_scan: self.max_signals_per_scan,
            min_records: self.min_records,
            analyzer_timeout: Duration::from_secs(self.analyzer_timeout_secs),
        }
    }

    pub fn verifier(&self) -> VerifierConfig {
        VerifierConfig {
            grace: chrono::Duration::seconds(self.verification.grace_secs),
            lookback: self.verification.lookback,
        }
    }

    pub fn reconciler(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            interval: Duration::from_secs(self.verification.reconcile_interval_secs),
            margin: chrono::Duration::seconds(self.verification.reconcile_margin_secs),
        }
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn summary_interval(&self) -> Duration {
        Duration::from_secs(self.summary_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BotConfig::default();
        assert_eq!(config.timeframes, vec![1, 5, 15]);
        assert_eq!(config.max_signals_per_scan, 3);
        assert_eq!(config.verification.grace_secs, 60);
        assert_eq!(config.verification.lookback, 10);
        assert!(!config.telegram.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: BotConfig = toml::from_str(
            r#"
            assets = ["EURUSD"]
            min_confidence = 0.8

            [telegram]
            enabled = true
            token = "abc"
            chat_id = "42"
            "#,
        )
        .unwrap();

        assert_eq!(config.assets, vec!["EURUSD".to_string()]);
        assert_eq!(config.min_confidence, 0.8);
        assert_eq!(config.scan_interval_secs, 60);
        assert_eq!(config.verification.reconcile_margin_secs, 300);
        assert!(config.telegram.enabled);
        assert_eq!(config.pipeline().assets.len(), 1);
    }

    #[test]
    fn test_config_serialization() {
        let config = BotConfig::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: BotConfig = toml::from_str(&serialized).unwrap();

        assert_eq!(config.assets, deserialized.assets);
        assert_eq!(config.utc_offset_hours, deserialized.utc_offset_hours);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = BotConfig::default();
        config.min_confidence = 1.5;
        assert!(matches!(config.validate(), Err(SignalError::Config(_))));

        let mut config = BotConfig::default();
        config.timeframes.clear();
        assert!(config.validate().is_err());

        let mut config = BotConfig::default();
        config.utc_offset_hours = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_falls_back_to_info() {
        let mut config = BotConfig::default();
        config.log_level = "debug".into();
        assert_eq!(config.log_level(), Level::DEBUG);
        config.log_level = "loud".into();
        assert_eq!(config.log_level(), Level::INFO);
    }
}
