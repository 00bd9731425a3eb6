pub mod memory;
pub mod timeseries;

pub use memory::InMemoryPriceStore;
pub use timeseries::TimeSeriesDB;
