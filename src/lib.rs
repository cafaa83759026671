//! Instrumented relational data-access layer.
//!
//! This library provides lazily built named connection pools (SQLite,
//! PostgreSQL, MySQL), insert/update/delete synthesized from typed entities,
//! and a driver interceptor that traces and meters every database operation.
//!
//! ```ignore
//! let registry = Registry::builder()
//!     .pool(PoolConfig::parse("main=sqlite:app.db?mode=rwc")?)
//!     .build();
//! let pool = registry.get("main").await?;
//! let id = pool.insert(&QueryContext::background(), &profile).await?;
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod telemetry;

pub use config::{Config, PoolConfig, PoolOptions};
pub use db::{Entity, FromRow, Pool, QueryContext, Registry, Tx};
pub use error::{DbError, DbResult};
pub use models::{Row, Value};
