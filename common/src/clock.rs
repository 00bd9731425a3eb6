//! Single time source for the service.
//!
//! Timestamps are kept in UTC; the configured fixed offset is applied only
//! here, when a local wall-clock reading is needed (midnight retention,
//! message formatting).

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use std::sync::RwLock;

use crate::error::{Result, SignalError};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Offset used for local time
    fn offset(&self) -> FixedOffset;

    fn local_now(&self) -> DateTime<FixedOffset> {
        self.now().with_timezone(&self.offset())
    }
}

/// System clock shifted by a fixed offset
#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
    offset: FixedOffset,
}

impl LocalClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn from_hours(hours: i32) -> Result<Self> {
        let offset = FixedOffset::east_opt(hours * 3600)
            .ok_or_else(|| SignalError::Config(format!("utc offset out of range: {}h", hours)))?;
        Ok(Self::new(offset))
    }
}

impl Clock for LocalClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
    offset: FixedOffset,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            now: RwLock::new(now),
            offset,
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.write() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.write() {
            *guard += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

/// Next local midnight strictly after `local_now`
pub fn next_local_midnight(local_now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    let tomorrow = local_now.date_naive().succ_opt()?.and_hms_opt(0, 0, 0)?;
    local_now.offset().from_local_datetime(&tomorrow).single()
}

/// Wall-clock time left until the next local midnight
pub fn until_next_local_midnight(clock: &dyn Clock) -> Option<std::time::Duration> {
    let now = clock.local_now();
    let midnight = next_local_midnight(now)?;
    (midnight - now).to_std().ok()
}
