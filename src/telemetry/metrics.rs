//! Metrics backend.

use crate::db::driver::PoolStats;
use crate::telemetry::metric_names::*;
use crate::telemetry::DURATION_BUCKETS;
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};
use std::fmt::Debug;
use std::net::SocketAddr;
use std::time::Duration;

/// Labels of one latency observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationLabels<'a> {
    /// Pool name.
    pub name: &'a str,
    pub table: &'a str,
    pub cmd: &'a str,
}

/// Records driver latencies and pool statistics.
///
/// Pool statistics carry cumulative `wait_count` and `closed` counters. sqlx
/// does not report why a connection was closed, so idle-timeout and lifetime
/// closures are one combined count.
pub trait Meter: Send + Sync + Debug {
    fn observe_duration(&self, labels: DurationLabels<'_>, elapsed: Duration);

    fn record_pool_stats(&self, pool: &str, stats: &PoolStats);
}

/// Records through the global `metrics` recorder.
///
/// Nothing is exported unless a recorder is installed, see [`install_prometheus`].
#[derive(Debug, Clone, Default)]
pub struct FacadeMeter;

impl FacadeMeter {
    pub fn new() -> Self {
        Self
    }

    /// Register metric descriptions with the installed recorder.
    pub fn describe() {
        ::metrics::describe_histogram!(
            DB_DURATION_SECONDS,
            ::metrics::Unit::Seconds,
            "Latency of driver operations by pool, table and command"
        );
        ::metrics::describe_gauge!(
            DB_MAX_OPEN_CONNECTIONS,
            "Maximum number of open connections to the database"
        );
        ::metrics::describe_gauge!(
            DB_OPEN_CONNECTIONS,
            "The number of established connections both in use and idle"
        );
        ::metrics::describe_gauge!(
            DB_IN_USE_CONNECTIONS,
            "The number of connections currently in use"
        );
        ::metrics::describe_gauge!(DB_IDLE_CONNECTIONS, "The number of idle connections");
        ::metrics::describe_counter!(
            DB_WAIT_COUNT,
            "The number of calls that found every connection busy"
        );
        ::metrics::describe_counter!(
            DB_CLOSED_CONNECTIONS,
            "The number of connections closed by idle timeout, lifetime or error"
        );
    }
}

impl Meter for FacadeMeter {
    fn observe_duration(&self, labels: DurationLabels<'_>, elapsed: Duration) {
        ::metrics::histogram!(
            DB_DURATION_SECONDS,
            "name" => labels.name.to_string(),
            "table" => labels.table.to_string(),
            "cmd" => labels.cmd.to_string(),
        )
        .record(elapsed.as_secs_f64());
    }

    fn record_pool_stats(&self, pool: &str, stats: &PoolStats) {
        let name = pool.to_string();
        ::metrics::gauge!(DB_MAX_OPEN_CONNECTIONS, "name" => name.clone())
            .set(f64::from(stats.max_open));
        ::metrics::gauge!(DB_OPEN_CONNECTIONS, "name" => name.clone()).set(f64::from(stats.open));
        ::metrics::gauge!(DB_IN_USE_CONNECTIONS, "name" => name.clone())
            .set(f64::from(stats.in_use));
        ::metrics::gauge!(DB_IDLE_CONNECTIONS, "name" => name.clone()).set(f64::from(stats.idle));
        ::metrics::counter!(DB_WAIT_COUNT, "name" => name.clone()).absolute(stats.wait_count);
        ::metrics::counter!(DB_CLOSED_CONNECTIONS, "name" => name).absolute(stats.closed);
    }
}

/// Discards all observations.
#[derive(Debug, Clone, Default)]
pub struct NoopMeter;

impl Meter for NoopMeter {
    fn observe_duration(&self, _labels: DurationLabels<'_>, _elapsed: Duration) {}

    fn record_pool_stats(&self, _pool: &str, _stats: &PoolStats) {}
}

/// Install the Prometheus exporter as the global recorder, serving `/metrics`
/// on `addr`. Must be called from within a tokio runtime.
pub fn install_prometheus(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(DB_DURATION_SECONDS.to_string()),
            &DURATION_BUCKETS,
        )?
        .with_http_listener(addr)
        .install()?;
    FacadeMeter::describe();
    Ok(())
}
