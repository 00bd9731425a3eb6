// Signal Generation
// Turns analyzer output into notified, persisted and verified signals

pub mod notify;
pub mod pipeline;
pub mod signals;
pub mod storage;
pub mod verification;

pub use notify::{format_signal_message, LogNotifier, Notifier, TelegramNotifier};
pub use pipeline::{PipelineConfig, ScanReport, SignalPipeline};
pub use signals::{Analyzer, MomentumAnalyzer, MomentumConfig};
pub use storage::{InMemoryStorage, PgSignalStorage, SignalStorage};
pub use verification::{closest_candle, Verifier, VerifierConfig};
