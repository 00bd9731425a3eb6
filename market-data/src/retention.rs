//! Daily purge of the price store at local midnight.

use common::{next_local_midnight, until_next_local_midnight, Clock};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::store::PriceStore;

const FALLBACK_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Shorter waits belong to the midnight just swept
const MIN_WAIT: Duration = Duration::from_secs(1);

pub struct RetentionSweeper {
    store: Arc<dyn PriceStore>,
    clock: Arc<dyn Clock>,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn PriceStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Sleep until each local midnight and clear the store. Never returns.
    pub async fn run(self) {
        loop {
            let wait = self.next_wait();
            tokio::time::sleep(wait).await;
            self.sweep().await;
        }
    }

    fn next_wait(&self) -> Duration {
        let local_now = self.clock.local_now();
        match (until_next_local_midnight(self.clock.as_ref()), next_local_midnight(local_now)) {
            (Some(wait), Some(at)) if wait < MIN_WAIT => {
                let wait = wait + FALLBACK_WAIT;
                info!(
                    "🕛 Next price cleanup scheduled at {} (in {}s)",
                    at + chrono::Duration::days(1),
                    wait.as_secs()
                );
                wait
            }
            (Some(wait), Some(at)) => {
                info!("🕛 Next price cleanup scheduled at {} (in {}s)", at, wait.as_secs());
                wait
            }
            _ => {
                warn!("Could not compute next local midnight from {}, retrying in 24h", local_now);
                FALLBACK_WAIT
            }
        }
    }

    /// Clear the price store once. Failures are logged; the caller keeps its schedule.
    pub async fn sweep(&self) -> bool {
        info!("🧹 Deleting all rows from price store (midnight reset)");
        match self.store.clear().await {
            Ok(removed) => {
                info!("✅ Price store cleared, {} rows removed", removed);
                true
            }
            Err(e) => {
                error!("❌ Error clearing price store: {}", e);
                false
            }
        }
    }
}
