//! Data-access facade.
//!
//! A [`Pool`] is what callers hold: a cheap clonable handle over the decorated
//! driver of one named pool. Entity writes go through the statement
//! synthesizer; raw SQL is passed to the driver as written.
//!
//! Raw SQL is not rebound. Write it in the pool's own placeholder style or run
//! it through [`Pool::rebind`] first.

use crate::db::context::QueryContext;
use crate::db::driver::{Driver, DriverStatement, DriverTransaction, PoolStats};
use crate::db::entity::{Entity, FromRow};
use crate::db::statement::{self, BoundStatement};
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, Dialect, ExecResult, Row, Value};
use std::sync::Arc;

#[derive(Debug)]
struct PoolInner {
    name: String,
    dialect: Dialect,
    driver: Arc<dyn Driver>,
}

/// Handle to a named connection pool.
#[derive(Debug, Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    pub fn new(name: impl Into<String>, driver: Arc<dyn Driver>) -> Self {
        let dialect = driver.db_type().dialect();
        Self {
            inner: Arc::new(PoolInner {
                name: name.into(),
                dialect,
                driver,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn db_type(&self) -> DatabaseType {
        self.inner.driver.db_type()
    }

    pub fn dialect(&self) -> Dialect {
        self.inner.dialect
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.inner.driver
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.driver.stats()
    }

    /// True if both handles refer to the same pool.
    pub fn ptr_eq(a: &Pool, b: &Pool) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Rewrite `?` placeholders into this pool's dialect.
    pub fn rebind(&self, sql: &str) -> String {
        self.inner.dialect.rebind(sql)
    }

    /// Insert `entity` and return the generated key.
    ///
    /// The key field is never written, whatever its value. A driver that
    /// reports no generated key yields 0.
    pub async fn insert<E: Entity>(&self, ctx: &QueryContext, entity: &E) -> DbResult<i64> {
        let stmt = statement::insert(entity, self.dialect())?;
        if self.dialect().needs_returning() {
            let rows = self.driver().query(ctx, &stmt.sql, &stmt.args).await?;
            returned_key(&rows)
        } else {
            let res = self.driver().exec(ctx, &stmt.sql, &stmt.args).await?;
            Ok(res.last_insert_id.unwrap_or(0))
        }
    }

    /// Replace every non-key column of the row keyed by `entity`'s key.
    ///
    /// Returns the number of rows affected.
    pub async fn update<E: Entity>(&self, ctx: &QueryContext, entity: &E) -> DbResult<u64> {
        let stmt = statement::update(entity, self.dialect())?;
        self.exec_bound(ctx, &stmt).await
    }

    /// Delete the row keyed by `entity`'s key. Returns the number of rows affected.
    pub async fn delete<E: Entity>(&self, ctx: &QueryContext, entity: &E) -> DbResult<u64> {
        let stmt = statement::delete(entity, self.dialect())?;
        self.exec_bound(ctx, &stmt).await
    }

    /// Load the entity with key `key`, `None` if there is no such row.
    pub async fn find<E>(&self, ctx: &QueryContext, key: impl Into<Value>) -> DbResult<Option<E>>
    where
        E: Entity + FromRow,
    {
        let stmt = statement::find::<E>(key, self.dialect())?;
        self.get(ctx, &stmt.sql, &stmt.args).await
    }

    pub async fn exec(&self, ctx: &QueryContext, sql: &str, args: &[Value]) -> DbResult<ExecResult> {
        self.driver().exec(ctx, sql, args).await
    }

    pub async fn query(&self, ctx: &QueryContext, sql: &str, args: &[Value]) -> DbResult<Vec<Row>> {
        self.driver().query(ctx, sql, args).await
    }

    /// First row of the result, `None` if the query returned nothing.
    pub async fn query_one(
        &self,
        ctx: &QueryContext,
        sql: &str,
        args: &[Value],
    ) -> DbResult<Option<Row>> {
        let rows = self.query(ctx, sql, args).await?;
        Ok(rows.into_iter().next())
    }

    /// Decode the first row as `T`.
    pub async fn get<T: FromRow>(
        &self,
        ctx: &QueryContext,
        sql: &str,
        args: &[Value],
    ) -> DbResult<Option<T>> {
        match self.query_one(ctx, sql, args).await? {
            Some(row) => T::from_row(&row).map(Some),
            None => Ok(None),
        }
    }

    /// Decode every row as `T`.
    pub async fn select<T: FromRow>(
        &self,
        ctx: &QueryContext,
        sql: &str,
        args: &[Value],
    ) -> DbResult<Vec<T>> {
        let rows = self.query(ctx, sql, args).await?;
        rows.iter().map(T::from_row).collect()
    }

    pub async fn prepare(&self, ctx: &QueryContext, sql: &str) -> DbResult<Prepared> {
        let inner = self.driver().prepare(ctx, sql).await?;
        Ok(Prepared { inner })
    }

    pub async fn begin(&self, ctx: &QueryContext) -> DbResult<Tx> {
        let inner = self.driver().begin(ctx).await?;
        Ok(Tx {
            dialect: self.dialect(),
            inner,
        })
    }

    async fn exec_bound(&self, ctx: &QueryContext, stmt: &BoundStatement) -> DbResult<u64> {
        let res = self.driver().exec(ctx, &stmt.sql, &stmt.args).await?;
        Ok(res.rows_affected)
    }
}

fn returned_key(rows: &[Row]) -> DbResult<i64> {
    rows.first().ok_or(DbError::NoRows)?.get_idx::<i64>(0)
}

/// A prepared statement of a [`Pool`].
#[derive(Debug)]
pub struct Prepared {
    inner: Box<dyn DriverStatement>,
}

impl Prepared {
    pub fn sql(&self) -> &str {
        self.inner.sql()
    }

    pub async fn exec(&self, ctx: &QueryContext, args: &[Value]) -> DbResult<ExecResult> {
        self.inner.exec(ctx, args).await
    }

    pub async fn query(&self, ctx: &QueryContext, args: &[Value]) -> DbResult<Vec<Row>> {
        self.inner.query(ctx, args).await
    }
}

/// An open transaction of a [`Pool`].
///
/// Dropping a `Tx` without calling [`Tx::commit`] rolls it back.
#[derive(Debug)]
pub struct Tx {
    dialect: Dialect,
    inner: Box<dyn DriverTransaction>,
}

impl Tx {
    /// Same as [`Pool::insert`], inside the transaction.
    pub async fn insert<E: Entity>(&mut self, ctx: &QueryContext, entity: &E) -> DbResult<i64> {
        let stmt = statement::insert(entity, self.dialect)?;
        if self.dialect.needs_returning() {
            let rows = self.inner.query(ctx, &stmt.sql, &stmt.args).await?;
            returned_key(&rows)
        } else {
            let res = self.inner.exec(ctx, &stmt.sql, &stmt.args).await?;
            Ok(res.last_insert_id.unwrap_or(0))
        }
    }

    pub async fn update<E: Entity>(&mut self, ctx: &QueryContext, entity: &E) -> DbResult<u64> {
        let stmt = statement::update(entity, self.dialect)?;
        let res = self.inner.exec(ctx, &stmt.sql, &stmt.args).await?;
        Ok(res.rows_affected)
    }

    pub async fn delete<E: Entity>(&mut self, ctx: &QueryContext, entity: &E) -> DbResult<u64> {
        let stmt = statement::delete(entity, self.dialect)?;
        let res = self.inner.exec(ctx, &stmt.sql, &stmt.args).await?;
        Ok(res.rows_affected)
    }

    pub async fn exec(
        &mut self,
        ctx: &QueryContext,
        sql: &str,
        args: &[Value],
    ) -> DbResult<ExecResult> {
        self.inner.exec(ctx, sql, args).await
    }

    pub async fn query(
        &mut self,
        ctx: &QueryContext,
        sql: &str,
        args: &[Value],
    ) -> DbResult<Vec<Row>> {
        self.inner.query(ctx, sql, args).await
    }

    pub async fn get<T: FromRow>(
        &mut self,
        ctx: &QueryContext,
        sql: &str,
        args: &[Value],
    ) -> DbResult<Option<T>> {
        let rows = self.query(ctx, sql, args).await?;
        rows.first().map(T::from_row).transpose()
    }

    pub async fn commit(self, ctx: &QueryContext) -> DbResult<()> {
        self.inner.commit(ctx).await
    }

    pub async fn rollback(self, ctx: &QueryContext) -> DbResult<()> {
        self.inner.rollback(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::driver::{DbPool, SqlxDriver};
    use sqlx::sqlite::SqlitePoolOptions;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: i64,
        body: String,
    }

    crate::impl_entity!(Note, table = "notes", key = "id", columns = [id, body]);

    async fn memory_pool() -> Pool {
        let sqlite = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let pool = Pool::new("mem", Arc::new(SqlxDriver::new(DbPool::SQLite(sqlite), 1)));
        pool.exec(
            &QueryContext::background(),
            "CREATE TABLE notes (id INTEGER PRIMARY KEY AUTOINCREMENT, body TEXT NOT NULL)",
            &[],
        )
        .await
        .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_insert_ignores_caller_key() {
        let pool = memory_pool().await;
        let ctx = QueryContext::background();
        let id = pool
            .insert(
                &ctx,
                &Note {
                    id: 42,
                    body: "hello".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(id, 1);
        assert!(pool.find::<Note>(&ctx, 42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_and_select() {
        let pool = memory_pool().await;
        let ctx = QueryContext::background();
        for body in ["a", "b"] {
            pool.insert(&ctx, &Note { id: 0, body: body.into() })
                .await
                .unwrap();
        }
        let count: Option<i64> = pool
            .get(&ctx, "SELECT COUNT(*) FROM notes", &[])
            .await
            .unwrap();
        assert_eq!(count, Some(2));

        let notes: Vec<Note> = pool
            .select(&ctx, "SELECT id, body FROM notes ORDER BY id", &[])
            .await
            .unwrap();
        assert_eq!(notes[1].body, "b");

        let none: Option<Note> = pool
            .get(&ctx, "SELECT id, body FROM notes WHERE id = ?", &[Value::Int(99)])
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_handles_share_pool() {
        let pool = memory_pool().await;
        let other = pool.clone();
        assert!(Pool::ptr_eq(&pool, &other));
        assert_eq!(other.name(), "mem");
        assert_eq!(pool.rebind("SELECT ?"), "SELECT ?");
    }

    #[test]
    fn test_returned_key_requires_row() {
        assert!(returned_key(&[]).unwrap_err().is_no_rows());
    }
}
