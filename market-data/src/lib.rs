//! Market data layer: candle storage and its daily retention sweep.

pub mod databases;
pub mod retention;
pub mod store;

pub use databases::{InMemoryPriceStore, TimeSeriesDB};
pub use retention::RetentionSweeper;
pub use store::{PriceStats, PriceStore};
