//! Integration tests for driver instrumentation.
//!
//! A recording tracer and meter are plugged into the registry; the tests
//! verify that facade calls produce the expected spans and histogram labels,
//! that failures are recorded without being altered, and that pool gauges are
//! sampled.

use instrumented_sqlx::config::PoolConfig;
use instrumented_sqlx::db::driver::PoolStats;
use instrumented_sqlx::db::{Pool, QueryContext, Registry};
use instrumented_sqlx::telemetry::{
    DurationLabels, KeyValue, Meter, TelemetrySpan, Tracer, attributes,
};
use instrumented_sqlx::{DbError, impl_entity};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug, Clone, Default)]
struct RecordedSpan {
    name: &'static str,
    attrs: Vec<KeyValue>,
    error: Option<String>,
}

impl RecordedSpan {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .rev()
            .find(|kv| kv.key == key)
            .map(|kv| kv.value.as_str())
    }
}

#[derive(Debug, Default)]
struct RecordingTracer {
    ended: Arc<Mutex<Vec<RecordedSpan>>>,
}

struct RecordingSpan {
    span: RecordedSpan,
    sink: Arc<Mutex<Vec<RecordedSpan>>>,
}

impl Tracer for RecordingTracer {
    fn start_span(&self, name: &'static str, attrs: Vec<KeyValue>) -> Box<dyn TelemetrySpan> {
        Box::new(RecordingSpan {
            span: RecordedSpan {
                name,
                attrs,
                error: None,
            },
            sink: Arc::clone(&self.ended),
        })
    }
}

impl TelemetrySpan for RecordingSpan {
    fn set_attribute(&mut self, attribute: KeyValue) {
        self.span.attrs.push(attribute);
    }

    fn record_error(&mut self, error: &DbError) {
        self.span.error = Some(error.to_string());
    }

    fn end(self: Box<Self>) {
        self.sink.lock().unwrap().push(self.span);
    }
}

#[derive(Debug, Default)]
struct RecordingMeter {
    durations: Mutex<Vec<(String, String, String)>>,
    stats: Mutex<Vec<(String, PoolStats)>>,
}

impl RecordingMeter {
    fn labels(&self) -> Vec<(String, String)> {
        self.durations
            .lock()
            .unwrap()
            .iter()
            .map(|(_, table, cmd)| (table.clone(), cmd.clone()))
            .collect()
    }
}

impl Meter for RecordingMeter {
    fn observe_duration(&self, labels: DurationLabels<'_>, _elapsed: Duration) {
        self.durations.lock().unwrap().push((
            labels.name.to_string(),
            labels.table.to_string(),
            labels.cmd.to_string(),
        ));
    }

    fn record_pool_stats(&self, pool: &str, stats: &PoolStats) {
        self.stats.lock().unwrap().push((pool.to_string(), *stats));
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Demo {
    id: i64,
    title: String,
}

impl_entity!(Demo, table = "t_demo", key = "id", columns = [id, title]);

struct Harness {
    _dir: TempDir,
    // Owns the stats collector
    _registry: Arc<Registry>,
    pool: Pool,
    tracer: Arc<RecordingTracer>,
    meter: Arc<RecordingMeter>,
}

impl Harness {
    fn spans(&self) -> Vec<RecordedSpan> {
        self.tracer.ended.lock().unwrap().clone()
    }

    fn reset(&self) {
        self.tracer.ended.lock().unwrap().clear();
        self.meter.durations.lock().unwrap().clear();
    }
}

async fn setup(stats_interval: Option<Duration>) -> Harness {
    let dir = TempDir::new().unwrap();
    let url = format!(
        "sqlite:{}?mode=rwc&max_open=3&max_idle=1",
        dir.path().join("demo.db").display()
    );
    let tracer = Arc::new(RecordingTracer::default());
    let meter = Arc::new(RecordingMeter::default());
    let registry = Registry::builder()
        .pool(PoolConfig::new("demo", &url).unwrap())
        .tracer(tracer.clone())
        .meter(meter.clone())
        .stats_interval(stats_interval)
        .build();
    let pool = registry.get("demo").await.unwrap();

    pool.exec(
        &QueryContext::background(),
        "CREATE TABLE t_demo (id INTEGER PRIMARY KEY AUTOINCREMENT, title TEXT NOT NULL)",
        &[],
    )
    .await
    .unwrap();

    let harness = Harness {
        _dir: dir,
        _registry: registry,
        pool,
        tracer,
        meter,
    };
    harness.reset();
    harness
}

fn pair(table: &str, cmd: &str) -> (String, String) {
    (table.to_string(), cmd.to_string())
}

#[tokio::test]
async fn test_entity_writes_are_labeled() {
    let h = setup(None).await;
    let ctx = QueryContext::background();

    let id = h
        .pool
        .insert(&ctx, &Demo { id: 0, title: "a".into() })
        .await
        .unwrap();
    let row = Demo { id, title: "b".into() };
    h.pool.update(&ctx, &row).await.unwrap();
    h.pool.find::<Demo>(&ctx, id).await.unwrap();
    h.pool.delete(&ctx, &row).await.unwrap();

    assert_eq!(
        h.meter.labels(),
        [
            pair("t_demo", "insert"),
            pair("t_demo", "update"),
            pair("t_demo", "select"),
            pair("t_demo", "delete"),
        ]
    );
    assert!(
        h.meter
            .durations
            .lock()
            .unwrap()
            .iter()
            .all(|(name, _, _)| name == "demo")
    );
}

#[tokio::test]
async fn test_span_attributes() {
    let h = setup(None).await;
    let sql = "SELECT id, title FROM t_demo WHERE id = ?";
    h.pool
        .query(&QueryContext::background(), sql, &[1.into()])
        .await
        .unwrap();

    let spans = h.spans();
    assert_eq!(spans.len(), 1);
    let span = &spans[0];
    assert_eq!(span.name, "sql.query");
    assert_eq!(span.attr(attributes::DB_SYSTEM), Some("sqlite"));
    assert_eq!(span.attr(attributes::DB_NAME), Some("demo"));
    assert_eq!(span.attr(attributes::DB_STATEMENT), Some(sql));
    assert_eq!(span.attr(attributes::DB_SQL_TABLE), Some("t_demo"));
    assert_eq!(span.attr(attributes::DB_OPERATION), Some("select"));
    assert!(span.error.is_none());
}

#[tokio::test]
async fn test_unclassifiable_sql_has_empty_labels() {
    let h = setup(None).await;
    h.pool
        .query(&QueryContext::background(), "SELECT 1", &[])
        .await
        .unwrap();
    assert_eq!(h.meter.labels(), [pair("", "")]);
}

#[tokio::test]
async fn test_prepared_statement_labels() {
    let h = setup(None).await;
    let ctx = QueryContext::background();

    let stmt = h
        .pool
        .prepare(&ctx, "INSERT INTO t_demo(title) VALUES (?)")
        .await
        .unwrap();
    stmt.exec(&ctx, &["x".into()]).await.unwrap();
    stmt.exec(&ctx, &["y".into()]).await.unwrap();

    assert_eq!(
        h.meter.labels(),
        [
            pair("t_demo", "prepare"),
            pair("t_demo", "insert-stmt"),
            pair("t_demo", "insert-stmt"),
        ]
    );
    let names: Vec<_> = h.spans().iter().map(|s| s.name).collect();
    assert_eq!(names, ["sql.prepare", "sql.stmt_exec", "sql.stmt_exec"]);
}

#[tokio::test]
async fn test_transaction_labels() {
    let h = setup(None).await;
    let ctx = QueryContext::background();

    let mut tx = h.pool.begin(&ctx).await.unwrap();
    tx.insert(&ctx, &Demo { id: 0, title: "t".into() })
        .await
        .unwrap();
    tx.commit(&ctx).await.unwrap();

    let tx = h.pool.begin(&ctx).await.unwrap();
    tx.rollback(&ctx).await.unwrap();

    assert_eq!(
        h.meter.labels(),
        [
            pair("", "begin"),
            pair("t_demo", "insert"),
            pair("", "commit"),
            pair("", "begin"),
            pair("", "rollback"),
        ]
    );
    let commit = h
        .spans()
        .into_iter()
        .find(|s| s.name == "sql.commit")
        .unwrap();
    assert_eq!(commit.attr(attributes::DB_STATEMENT), Some("commit"));
}

#[tokio::test]
async fn test_failure_recorded_and_propagated() {
    let h = setup(None).await;
    let err = h
        .pool
        .exec(
            &QueryContext::background(),
            "UPDATE t_nowhere SET a = 1",
            &[],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Database { .. }));

    let spans = h.spans();
    assert_eq!(spans.len(), 1);
    let recorded = spans[0].error.as_deref().unwrap();
    assert_eq!(recorded, err.to_string());

    // Failed calls are still timed
    assert_eq!(h.meter.labels(), [pair("t_nowhere", "update")]);
}

#[tokio::test]
async fn test_pool_stats_sampled() {
    let h = setup(Some(Duration::from_millis(10))).await;
    tokio::time::sleep(Duration::from_millis(60)).await;

    let stats = h.meter.stats.lock().unwrap();
    let (name, sample) = stats.last().expect("no stats sampled");
    assert_eq!(name, "demo");
    assert_eq!(sample.max_open, 3);
    assert!(sample.open >= sample.idle);
}

/// Tracer whose spans panic on every call.
#[derive(Debug)]
struct PanickingTracer;

impl Tracer for PanickingTracer {
    fn start_span(&self, _name: &'static str, _attrs: Vec<KeyValue>) -> Box<dyn TelemetrySpan> {
        panic!("tracer backend down");
    }
}

#[tokio::test]
async fn test_tracer_panic_does_not_reach_caller() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("p.db").display());
    let registry = Registry::builder()
        .pool(PoolConfig::new("p", &url).unwrap())
        .tracer(Arc::new(PanickingTracer))
        .stats_interval(None)
        .build();
    let pool = registry.get("p").await.unwrap();

    let rows = pool
        .query(&QueryContext::background(), "SELECT 1 AS one", &[])
        .await
        .unwrap();
    assert_eq!(rows[0].get::<i64>("one").unwrap(), 1);
}
