//! Driver interceptor.
//!
//! [`Instrumented`] decorates any [`Driver`] so that every primitive operation
//! (exec, query, prepare, statement exec/query, begin/commit/rollback and the
//! exec/query issued inside a transaction) gets a span and one latency
//! observation labeled `(name, table, cmd)`.
//!
//! | operation              | span              | `cmd` label      | `table` label |
//! |------------------------|-------------------|------------------|---------------|
//! | exec / query           | `sql.exec/query`  | classified       | classified    |
//! | prepare                | `sql.prepare`     | `prepare`        | classified    |
//! | statement exec / query | `sql.stmt_*`      | `<cmd>-stmt`     | classified    |
//! | begin/commit/rollback  | `sql.begin/...`   | `begin/...`      | empty         |
//!
//! The decorator passes arguments, results and errors through untouched and
//! imposes no timeout. A panicking telemetry backend is logged and ignored.

use crate::db::classifier::{SqlShape, classify};
use crate::db::context::QueryContext;
use crate::db::driver::{Driver, DriverLayer, DriverStatement, DriverTransaction, PoolStats};
use crate::error::DbResult;
use crate::models::{DatabaseType, ExecResult, Row, Value};
use crate::telemetry::tracer::NoopSpan;
use crate::telemetry::{
    DurationLabels, KeyValue, Meter, TelemetrySpan, Tracer, attributes, span_names,
};
use async_trait::async_trait;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, warn};

/// Span and histogram bookkeeping shared by a driver and everything it hands out.
#[derive(Debug)]
struct Probe {
    name: String,
    system: &'static str,
    tracer: Arc<dyn Tracer>,
    meter: Arc<dyn Meter>,
}

/// What one intercepted call is recorded as.
struct Call<'a> {
    span: &'static str,
    statement: &'a str,
    table: &'a str,
    cmd: &'a str,
    args: usize,
}

impl<'a> Call<'a> {
    fn classified(span: &'static str, sql: &'a str, shape: &'a SqlShape, args: usize) -> Self {
        Self {
            span,
            statement: sql,
            table: &shape.table,
            cmd: &shape.command,
            args,
        }
    }

    /// Transaction control carries no table.
    fn control(span: &'static str, cmd: &'static str) -> Call<'static> {
        Call {
            span,
            statement: cmd,
            table: "",
            cmd,
            args: 0,
        }
    }
}

/// Run a telemetry backend call, logging instead of unwinding if it panics.
fn guarded<R>(what: &str, f: impl FnOnce() -> R) -> Option<R> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(r) => Some(r),
        Err(_) => {
            warn!(backend = what, "Telemetry backend panicked, observation dropped");
            None
        }
    }
}

impl Probe {
    fn start(&self, call: &Call<'_>) -> Box<dyn TelemetrySpan> {
        let attrs = vec![
            KeyValue::new(attributes::DB_SYSTEM, self.system),
            KeyValue::new(attributes::DB_NAME, self.name.as_str()),
            KeyValue::new(attributes::DB_STATEMENT, call.statement),
            KeyValue::new(attributes::DB_OPERATION, call.cmd),
            KeyValue::new(attributes::DB_SQL_TABLE, call.table),
        ];
        guarded("tracer", || self.tracer.start_span(call.span, attrs))
            .unwrap_or_else(|| Box::new(NoopSpan))
    }

    async fn record<T, F>(&self, call: Call<'_>, fut: F) -> DbResult<T>
    where
        F: Future<Output = DbResult<T>>,
    {
        let mut span = self.start(&call);
        let parent = guarded("tracer", || span.as_tracing()).unwrap_or_else(tracing::Span::none);

        let started = Instant::now();
        let result = fut.instrument(parent).await;
        let elapsed = started.elapsed();

        let labels = DurationLabels {
            name: &self.name,
            table: call.table,
            cmd: call.cmd,
        };
        guarded("meter", || self.meter.observe_duration(labels, elapsed));

        if let Err(e) = &result {
            guarded("tracer", || span.record_error(e));
        }
        guarded("tracer", move || span.end());

        debug!(
            pool = %self.name,
            cmd = call.cmd,
            table = call.table,
            args = call.args,
            elapsed_ms = elapsed.as_millis() as u64,
            ok = result.is_ok(),
            "Executed statement"
        );
        result
    }
}

/// Instrumentation decorator around a [`Driver`].
#[derive(Debug)]
pub struct Instrumented {
    probe: Arc<Probe>,
    inner: Arc<dyn Driver>,
}

impl Instrumented {
    pub fn new(
        name: impl Into<String>,
        inner: Arc<dyn Driver>,
        tracer: Arc<dyn Tracer>,
        meter: Arc<dyn Meter>,
    ) -> Self {
        let probe = Probe {
            name: name.into(),
            system: inner.db_type().system_name(),
            tracer,
            meter,
        };
        Self {
            probe: Arc::new(probe),
            inner,
        }
    }
}

#[async_trait]
impl Driver for Instrumented {
    fn db_type(&self) -> DatabaseType {
        self.inner.db_type()
    }

    async fn exec(&self, ctx: &QueryContext, sql: &str, args: &[Value]) -> DbResult<ExecResult> {
        let shape = classify(sql);
        let call = Call::classified(span_names::EXEC, sql, &shape, args.len());
        self.probe.record(call, self.inner.exec(ctx, sql, args)).await
    }

    async fn query(&self, ctx: &QueryContext, sql: &str, args: &[Value]) -> DbResult<Vec<Row>> {
        let shape = classify(sql);
        let call = Call::classified(span_names::QUERY, sql, &shape, args.len());
        self.probe.record(call, self.inner.query(ctx, sql, args)).await
    }

    async fn prepare(&self, ctx: &QueryContext, sql: &str) -> DbResult<Box<dyn DriverStatement>> {
        let shape = classify(sql);
        let call = Call {
            cmd: "prepare",
            ..Call::classified(span_names::PREPARE, sql, &shape, 0)
        };
        let inner = self.probe.record(call, self.inner.prepare(ctx, sql)).await?;
        let stmt_cmd = format!("{}-stmt", shape.command);
        Ok(Box::new(InstrumentedStatement {
            probe: Arc::clone(&self.probe),
            shape,
            stmt_cmd,
            inner,
        }))
    }

    async fn begin(&self, ctx: &QueryContext) -> DbResult<Box<dyn DriverTransaction>> {
        let call = Call::control(span_names::BEGIN, "begin");
        let inner = self.probe.record(call, self.inner.begin(ctx)).await?;
        Ok(Box::new(InstrumentedTransaction {
            probe: Arc::clone(&self.probe),
            inner,
        }))
    }

    fn stats(&self) -> PoolStats {
        self.inner.stats()
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}

#[derive(Debug)]
struct InstrumentedStatement {
    probe: Arc<Probe>,
    shape: SqlShape,
    stmt_cmd: String,
    inner: Box<dyn DriverStatement>,
}

impl InstrumentedStatement {
    fn call(&self, span: &'static str, args: usize) -> Call<'_> {
        Call {
            span,
            statement: self.inner.sql(),
            table: &self.shape.table,
            cmd: &self.stmt_cmd,
            args,
        }
    }
}

#[async_trait]
impl DriverStatement for InstrumentedStatement {
    fn sql(&self) -> &str {
        self.inner.sql()
    }

    async fn exec(&self, ctx: &QueryContext, args: &[Value]) -> DbResult<ExecResult> {
        let call = self.call(span_names::STMT_EXEC, args.len());
        self.probe.record(call, self.inner.exec(ctx, args)).await
    }

    async fn query(&self, ctx: &QueryContext, args: &[Value]) -> DbResult<Vec<Row>> {
        let call = self.call(span_names::STMT_QUERY, args.len());
        self.probe.record(call, self.inner.query(ctx, args)).await
    }
}

#[derive(Debug)]
struct InstrumentedTransaction {
    probe: Arc<Probe>,
    inner: Box<dyn DriverTransaction>,
}

#[async_trait]
impl DriverTransaction for InstrumentedTransaction {
    async fn exec(
        &mut self,
        ctx: &QueryContext,
        sql: &str,
        args: &[Value],
    ) -> DbResult<ExecResult> {
        let shape = classify(sql);
        let call = Call::classified(span_names::EXEC, sql, &shape, args.len());
        self.probe.record(call, self.inner.exec(ctx, sql, args)).await
    }

    async fn query(
        &mut self,
        ctx: &QueryContext,
        sql: &str,
        args: &[Value],
    ) -> DbResult<Vec<Row>> {
        let shape = classify(sql);
        let call = Call::classified(span_names::QUERY, sql, &shape, args.len());
        self.probe.record(call, self.inner.query(ctx, sql, args)).await
    }

    async fn commit(self: Box<Self>, ctx: &QueryContext) -> DbResult<()> {
        let Self { probe, inner } = *self;
        let call = Call::control(span_names::COMMIT, "commit");
        probe.record(call, inner.commit(ctx)).await
    }

    async fn rollback(self: Box<Self>, ctx: &QueryContext) -> DbResult<()> {
        let Self { probe, inner } = *self;
        let call = Call::control(span_names::ROLLBACK, "rollback");
        probe.record(call, inner.rollback(ctx)).await
    }
}

/// [`DriverLayer`] that wraps drivers in [`Instrumented`].
#[derive(Debug, Clone)]
pub struct InstrumentLayer {
    tracer: Arc<dyn Tracer>,
    meter: Arc<dyn Meter>,
}

impl InstrumentLayer {
    pub fn new(tracer: Arc<dyn Tracer>, meter: Arc<dyn Meter>) -> Self {
        Self { tracer, meter }
    }
}

impl DriverLayer for InstrumentLayer {
    fn layer(&self, name: &str, inner: Arc<dyn Driver>) -> Arc<dyn Driver> {
        Arc::new(Instrumented::new(
            name,
            inner,
            Arc::clone(&self.tracer),
            Arc::clone(&self.meter),
        ))
    }
}
