use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::SignalError;

/// One OHLC bar. `(asset, timeframe, timestamp)` identifies the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub asset: String,
    /// Bar width in minutes
    pub timeframe: u32,
    /// Bar open time
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    #[serde(default)]
    pub volume: Decimal,
}

impl Candle {
    /// Key used by the price stores for idempotent upserts
    pub fn key(&self) -> (String, u32, DateTime<Utc>) {
        (self.asset.clone(), self.timeframe, self.timestamp)
    }
}

/// Predicted price direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalDirection {
    Buy,
    Sell,
}

impl SignalDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalDirection::Buy => "BUY",
            SignalDirection::Sell => "SELL",
        }
    }
}

impl fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalDirection {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(SignalDirection::Buy),
            "SELL" => Ok(SignalDirection::Sell),
            other => Err(SignalError::Persistence(format!("unknown direction '{}'", other))),
        }
    }
}

/// Verification state of a signal. `Pending` moves exactly once to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalResult {
    Pending,
    Win,
    Loss,
    Error,
}

impl SignalResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalResult::Pending => "PENDING",
            SignalResult::Win => "WIN",
            SignalResult::Loss => "LOSS",
            SignalResult::Error => "ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SignalResult::Pending)
    }
}

impl fmt::Display for SignalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalResult {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(SignalResult::Pending),
            "WIN" => Ok(SignalResult::Win),
            "LOSS" => Ok(SignalResult::Loss),
            "ERROR" => Ok(SignalResult::Error),
            other => Err(SignalError::Persistence(format!("unknown result '{}'", other))),
        }
    }
}

/// Analyzer output, not yet notified or persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalCandidate {
    pub asset: String,
    pub timeframe: u32,
    pub direction: SignalDirection,
    pub confidence: f64, // 0.0 to 1.0
    pub entry_price: Decimal,
    pub target_price: Decimal,
    pub expiry_time: DateTime<Utc>,
}

/// A persisted prediction and its verification state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub asset: String,
    pub timeframe: u32,
    pub direction: SignalDirection,
    pub confidence: f64,
    pub entry_price: Decimal,
    pub target_price: Decimal,
    pub expiry_time: DateTime<Utc>,
    pub result: SignalResult,
    pub close_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl Signal {
    /// Fresh `PENDING` record for a candidate, as written by a store on creation
    pub fn pending(id: Uuid, candidate: &SignalCandidate, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            asset: candidate.asset.clone(),
            timeframe: candidate.timeframe,
            direction: candidate.direction,
            confidence: candidate.confidence,
            entry_price: candidate.entry_price,
            target_price: candidate.target_price,
            expiry_time: candidate.expiry_time,
            result: SignalResult::Pending,
            close_price: None,
            created_at,
            verified_at: None,
        }
    }

    /// Signed profit/loss, available once a close price is recorded
    pub fn pnl(&self) -> Option<Decimal> {
        self.close_price
            .map(|close| signed_pnl(self.direction, self.entry_price, close))
    }
}

/// Classification of a verified signal
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub result: SignalResult,
    pub close_price: Option<Decimal>,
    pub pnl: Option<Decimal>,
}

impl Outcome {
    /// WIN/LOSS against the entry price. Equality is a LOSS in both directions.
    pub fn classify(direction: SignalDirection, entry_price: Decimal, close: Decimal) -> Self {
        let won = match direction {
            SignalDirection::Buy => close > entry_price,
            SignalDirection::Sell => close < entry_price,
        };

        Self {
            result: if won { SignalResult::Win } else { SignalResult::Loss },
            close_price: Some(close),
            pnl: Some(signed_pnl(direction, entry_price, close)),
        }
    }

    pub fn error() -> Self {
        Self {
            result: SignalResult::Error,
            close_price: None,
            pnl: None,
        }
    }
}

fn signed_pnl(direction: SignalDirection, entry_price: Decimal, close: Decimal) -> Decimal {
    match direction {
        SignalDirection::Buy => close - entry_price,
        SignalDirection::Sell => entry_price - close,
    }
}
