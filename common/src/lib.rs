//! Shared types for the signal bot: market data, signals, outcomes,
//! the error taxonomy and the service clock.

pub mod clock;
pub mod error;
pub mod session;
pub mod types;

pub use clock::{next_local_midnight, until_next_local_midnight, Clock, LocalClock, ManualClock};
pub use error::{Result, SignalError};
pub use session::{format_uptime, Session};
pub use types::{Candle, Outcome, Signal, SignalCandidate, SignalDirection, SignalResult};

pub use uuid::Uuid;
