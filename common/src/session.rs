use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters scoped to one running instance of the bot
#[derive(Debug)]
pub struct Session {
    started_at: DateTime<Utc>,
    signals_sent: AtomicU64,
}

impl Session {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            signals_sent: AtomicU64::new(0),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn record_sent(&self) -> u64 {
        self.signals_sent.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn signals_sent(&self) -> u64 {
        self.signals_sent.load(Ordering::Relaxed)
    }

    pub fn uptime(&self, now: DateTime<Utc>) -> Duration {
        now - self.started_at
    }
}

/// `HH:MM:SS` rendering of an uptime, days folded into hours
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.num_seconds().max(0);
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_session_counts_sent_signals() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap();
        let session = Session::new(start);
        assert_eq!(session.signals_sent(), 0);
        assert_eq!(session.record_sent(), 1);
        assert_eq!(session.record_sent(), 2);
        assert_eq!(session.signals_sent(), 2);
    }

    #[test]
    fn test_uptime_format() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap();
        let session = Session::new(start);
        let now = start + Duration::seconds(26 * 3600 + 61);
        assert_eq!(format_uptime(session.uptime(now)), "26:01:01");
    }
}
