//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Named pool registry with single-flight construction
//! - Entity binding and statement synthesis
//! - Driver traits, the sqlx driver and the instrumentation interceptor
//! - SQL shape classification for metric labels
//! - Type mappings
//! - Database dispatch and entity macros for reducing code duplication

pub mod classifier;
pub mod context;
pub mod driver;
pub mod entity;
pub mod interceptor;
#[macro_use]
pub mod macros;
pub mod pool;
pub mod registry;
pub mod statement;
pub mod stats;
pub mod types;

pub use classifier::{SqlShape, classify};
pub use context::QueryContext;
pub use driver::{
    Connector, DbPool, Driver, DriverLayer, DriverStatement, DriverTransaction, PoolCounters,
    PoolStats, SqlxConnector, SqlxDriver,
};
pub use entity::{Binding, Entity, FromRow, bind, bind_names};
pub use interceptor::{InstrumentLayer, Instrumented};
pub use pool::{Pool, Prepared, Tx};
pub use registry::{Registry, RegistryBuilder};
pub use statement::BoundStatement;
pub use stats::StatsCollector;
