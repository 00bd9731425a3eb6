use thiserror::Error;

/// Failure taxonomy for the signal lifecycle
#[derive(Debug, Error)]
pub enum SignalError {
    /// A store write or read failed
    #[error("persistence error: {0}")]
    Persistence(String),

    /// No candles to verify against
    #[error("no candles available for {asset} M{timeframe}")]
    DataUnavailable { asset: String, timeframe: u32 },

    /// Per-pair prediction failure
    #[error("analyzer failed for {asset} M{timeframe}: {reason}")]
    Analyzer {
        asset: String,
        timeframe: u32,
        reason: String,
    },

    #[error("notification failed: {0}")]
    Notification(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<sqlx::Error> for SignalError {
    fn from(err: sqlx::Error) -> Self {
        SignalError::Persistence(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SignalError>;
