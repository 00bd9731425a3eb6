// Notification channels
// Signals are only persisted and verified after a successful send

use async_trait::async_trait;
use chrono::FixedOffset;
use common::{Result, SignalCandidate, SignalDirection, SignalError};
use std::time::Duration;
use tracing::{debug, info};

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a signal. `Ok` means the signal reached its audience.
    async fn send_signal(&self, candidate: &SignalCandidate) -> Result<()>;

    /// Deliver a free-form status message (startup, summaries)
    async fn send_text(&self, text: &str) -> Result<()>;
}

/// Render a signal as a Markdown message with expiry in local time
pub fn format_signal_message(candidate: &SignalCandidate, offset: FixedOffset) -> String {
    let direction = match candidate.direction {
        SignalDirection::Buy => "📈 CALL",
        SignalDirection::Sell => "📉 PUT",
    };

    let confidence_pct = (candidate.confidence * 100.0).clamp(0.0, 100.0);
    let bars = (confidence_pct / 10.0) as usize;
    let confidence_bar = format!("{}{}", "█".repeat(bars), "▒".repeat(10 - bars));
    let expiry = candidate.expiry_time.with_timezone(&offset).format("%H:%M:%S");

    format!(
        "🎯 *TRADING SIGNAL*\n\n\
         *Asset:* {}\n\
         *Direction:* {}\n\
         *Timeframe:* M{}\n\n\
         📊 *Confidence:* {:.1}%\n\
         {}\n\n\
         💵 *Entry Price:* {:.5}\n\
         🎯 *Target:* {:.5}\n\
         ⏰ *Expiry:* {}",
        candidate.asset,
        direction,
        candidate.timeframe,
        confidence_pct,
        confidence_bar,
        candidate.entry_price,
        candidate.target_price,
        expiry
    )
}

/// Writes messages to the log only. Every send succeeds, so signals are still
/// persisted and verified when no remote channel is configured.
pub struct LogNotifier {
    offset: FixedOffset,
}

impl LogNotifier {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_signal(&self, candidate: &SignalCandidate) -> Result<()> {
        info!("{}", format_signal_message(candidate, self.offset));
        Ok(())
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        info!("{}", text);
        Ok(())
    }
}

/// Telegram Bot API channel
pub struct TelegramNotifier {
    client: reqwest::Client,
    token: String,
    chat_id: String,
    offset: FixedOffset,
}

impl TelegramNotifier {
    pub fn new(token: String, chat_id: String, offset: FixedOffset) -> Result<Self> {
        if token.is_empty() || chat_id.is_empty() {
            return Err(SignalError::Config("telegram token or chat_id missing".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SignalError::Notification(e.to_string()))?;

        Ok(Self {
            client,
            token,
            chat_id,
            offset,
        })
    }

    async fn send_message(&self, text: &str) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SignalError::Notification(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SignalError::Notification(format!("telegram API error: {}", status)));
        }

        debug!("Telegram message delivered");
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_signal(&self, candidate: &SignalCandidate) -> Result<()> {
        self.send_message(&format_signal_message(candidate, self.offset)).await?;
        info!("✅ Signal sent to Telegram: {} M{}", candidate.asset, candidate.timeframe);
        Ok(())
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        self.send_message(text).await
    }
}
