use async_trait::async_trait;
use common::{Result, SignalCandidate};

pub mod momentum;

pub use momentum::{MomentumAnalyzer, MomentumConfig};

/// Produces at most one candidate signal for an `(asset, timeframe)` pair.
///
/// Implementations are expected to return quickly; the pipeline bounds each
/// call with a timeout and isolates failures per pair.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, asset: &str, timeframe: u32) -> Result<Option<SignalCandidate>>;

    fn name(&self) -> &str;
}
