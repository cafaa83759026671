//! Tracing backend.

use crate::error::DbError;
use crate::telemetry::attributes;
use std::fmt::Debug;
use tracing::field::Empty;

/// A span attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: &'static str,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// Starts spans for driver operations.
pub trait Tracer: Send + Sync + Debug {
    fn start_span(&self, name: &'static str, attributes: Vec<KeyValue>) -> Box<dyn TelemetrySpan>;
}

/// An open span. Ended exactly once.
pub trait TelemetrySpan: Send {
    fn set_attribute(&mut self, attribute: KeyValue);

    /// Record the error and mark the span failed.
    fn record_error(&mut self, error: &DbError);

    fn end(self: Box<Self>);

    /// The `tracing` span to instrument the delegate call with, if any.
    fn as_tracing(&self) -> tracing::Span {
        tracing::Span::none()
    }
}

/// Emits spans through the `tracing` crate.
///
/// The span name travels in `otel.name`; attributes are recorded on fields
/// declared up front, and keys with no declared field are dropped.
#[derive(Debug, Clone, Default)]
pub struct TracingTracer;

impl TracingTracer {
    pub fn new() -> Self {
        Self
    }
}

impl Tracer for TracingTracer {
    fn start_span(&self, name: &'static str, attrs: Vec<KeyValue>) -> Box<dyn TelemetrySpan> {
        let span = tracing::info_span!(
            target: "instrumented_sqlx::sql",
            "sql",
            otel.name = name,
            otel.kind = "client",
            otel.status_code = Empty,
            otel.status_message = Empty,
            db.system = Empty,
            db.name = Empty,
            db.statement = Empty,
            db.operation = Empty,
            db.sql.table = Empty,
        );

        let mut out = TracingSpan { span };
        for attr in attrs {
            out.set_attribute(attr);
        }
        Box::new(out)
    }
}

struct TracingSpan {
    span: tracing::Span,
}

impl TelemetrySpan for TracingSpan {
    fn set_attribute(&mut self, attribute: KeyValue) {
        match attribute.key {
            attributes::DB_SYSTEM
            | attributes::DB_NAME
            | attributes::DB_STATEMENT
            | attributes::DB_OPERATION
            | attributes::DB_SQL_TABLE => {
                self.span.record(attribute.key, attribute.value.as_str());
            }
            _ => {}
        }
    }

    fn record_error(&mut self, error: &DbError) {
        self.span.record("otel.status_code", "ERROR");
        self.span
            .record("otel.status_message", error.to_string().as_str());
    }

    fn end(self: Box<Self>) {
        drop(self.span);
    }

    fn as_tracing(&self) -> tracing::Span {
        self.span.clone()
    }
}

/// Discards all spans.
#[derive(Debug, Clone, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn start_span(&self, _name: &'static str, _attrs: Vec<KeyValue>) -> Box<dyn TelemetrySpan> {
        Box::new(NoopSpan)
    }
}

pub(crate) struct NoopSpan;

impl TelemetrySpan for NoopSpan {
    fn set_attribute(&mut self, _attribute: KeyValue) {}

    fn record_error(&mut self, _error: &DbError) {}

    fn end(self: Box<Self>) {}
}
