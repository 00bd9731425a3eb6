pub mod metrics;
pub mod reconciliation;
pub mod reporting;

pub use metrics::{SignalStatistics, StatisticsAggregator};
pub use reconciliation::{Reconciler, ReconcilerConfig};
pub use reporting::{summary_message, SummaryKind, SummaryReporter};
