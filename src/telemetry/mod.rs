//! Pluggable tracing and metrics backends.
//!
//! The driver interceptor talks to two small traits, [`Tracer`] and [`Meter`].
//! [`TracingTracer`] emits spans through the `tracing` crate using OpenTelemetry
//! database semantic field names, so any subscriber (including an
//! OpenTelemetry bridge layer) receives them. [`FacadeMeter`] records through the
//! `metrics` facade; the binary installs a Prometheus exporter behind it.
//!
//! ## Semantic Conventions
//!
//! - `db.system`: "mysql", "postgresql" or "sqlite"
//! - `db.name`: logical pool name
//! - `db.statement`: SQL text, or `begin` / `commit` / `rollback`
//! - `db.operation`: classified command
//! - `db.sql.table`: classified table

pub mod metrics;
pub mod tracer;

pub use self::metrics::{DurationLabels, FacadeMeter, Meter, NoopMeter};
pub use self::tracer::{KeyValue, NoopTracer, TelemetrySpan, Tracer, TracingTracer};

/// Span names for driver operations.
pub mod span_names {
    pub const EXEC: &str = "sql.exec";
    pub const QUERY: &str = "sql.query";
    pub const PREPARE: &str = "sql.prepare";
    pub const STMT_EXEC: &str = "sql.stmt_exec";
    pub const STMT_QUERY: &str = "sql.stmt_query";
    pub const BEGIN: &str = "sql.begin";
    pub const COMMIT: &str = "sql.commit";
    pub const ROLLBACK: &str = "sql.rollback";
}

/// Attribute keys following OpenTelemetry semantic conventions.
pub mod attributes {
    /// Database system type.
    pub const DB_SYSTEM: &str = "db.system";
    /// Logical pool name.
    pub const DB_NAME: &str = "db.name";
    /// SQL statement.
    pub const DB_STATEMENT: &str = "db.statement";
    /// Database operation type.
    pub const DB_OPERATION: &str = "db.operation";
    /// Primary table.
    pub const DB_SQL_TABLE: &str = "db.sql.table";
}

/// Histogram and gauge names.
pub mod metric_names {
    pub const DB_DURATION_SECONDS: &str = "db_duration_seconds";
    pub const DB_MAX_OPEN_CONNECTIONS: &str = "db_max_open_connections";
    pub const DB_OPEN_CONNECTIONS: &str = "db_open_connections";
    pub const DB_IN_USE_CONNECTIONS: &str = "db_in_use_connections";
    pub const DB_IDLE_CONNECTIONS: &str = "db_idle_connections";
    pub const DB_WAIT_COUNT: &str = "db_wait_count";
    pub const DB_CLOSED_CONNECTIONS: &str = "db_closed_connections";
}

/// Latency histogram buckets, in seconds.
pub const DURATION_BUCKETS: [f64; 8] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];
