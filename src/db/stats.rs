//! Periodic pool statistics.
//!
//! One collector task per pool samples [`Driver::stats`] and feeds the metrics
//! backend's gauges. The task holds only a `Weak` reference to the driver and
//! exits once the driver is gone; dropping the [`StatsCollector`] aborts it.

use crate::db::driver::Driver;
use crate::telemetry::Meter;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Handle to a running collector task.
#[derive(Debug)]
pub struct StatsCollector {
    handle: JoinHandle<()>,
}

impl StatsCollector {
    /// Spawn a collector for pool `name`, sampling every `interval`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        name: impl Into<String>,
        driver: &Arc<dyn Driver>,
        meter: Arc<dyn Meter>,
        interval: Duration,
    ) -> Self {
        let name = name.into();
        let weak_driver = Arc::downgrade(driver);
        let handle = tokio::spawn(async move {
            Self::collect(name, weak_driver, meter, interval).await;
        });
        Self { handle }
    }

    /// Stop sampling.
    pub fn stop(&self) {
        self.handle.abort();
    }

    async fn collect(
        name: String,
        weak_driver: Weak<dyn Driver>,
        meter: Arc<dyn Meter>,
        interval: Duration,
    ) {
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;

            // Exit if the driver was dropped
            let Some(driver) = weak_driver.upgrade() else {
                debug!(pool = %name, "Pool dropped, stats collector exiting");
                return;
            };

            let stats = driver.stats();
            meter.record_pool_stats(&name, &stats);

            // Drop strong reference before sleeping to allow driver deallocation
            drop(driver);
        }
    }
}

impl Drop for StatsCollector {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
