//! Named pool registry.
//!
//! Pools are built lazily on first use and then shared by every caller.
//!
//! # Design Decisions
//!
//! - **`OnceCell` per pool name**: single-flight construction. Concurrent first
//!   calls for the same name wait on one builder and receive the same [`Pool`]
//! - **Read lock fast path**: once a pool exists, `get` only takes the shared lock
//! - **Failed construction leaves the cell empty**: a later `get` builds again.
//!   Nothing retries on its own. Names that resolve to no descriptor are
//!   rejected before a cell is created
//! - **Explicit lifecycle**: the registry is an `Arc` handed to whoever needs it;
//!   [`Registry::close_all`] stops the stats collectors and closes every pool
//!
//! # Concurrency Safety
//!
//! All map locks are released before any await on pool construction. The
//! write lock is taken only to insert an empty cell, re-checking under the lock.

use crate::config::{DEFAULT_STATS_INTERVAL_SECS, PoolConfig};
use crate::db::driver::{Connector, Driver, DriverLayer, SqlxConnector};
use crate::db::interceptor::InstrumentLayer;
use crate::db::pool::Pool;
use crate::db::stats::StatsCollector;
use crate::error::{DbError, DbResult};
use crate::telemetry::{FacadeMeter, Meter, Tracer, TracingTracer};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, error, info};

/// An initialized registry slot.
#[derive(Debug)]
struct PoolEntry {
    pool: Pool,
    collector: Option<StatsCollector>,
}

/// Lazily built, shared named pools.
pub struct Registry {
    configs: HashMap<String, PoolConfig>,
    connector: Arc<dyn Connector>,
    tracer: Arc<dyn Tracer>,
    meter: Arc<dyn Meter>,
    layers: Vec<Arc<dyn DriverLayer>>,
    stats_interval: Option<Duration>,
    pools: RwLock<HashMap<String, Arc<OnceCell<PoolEntry>>>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Get the pool named `name`, building it on first use.
    ///
    /// The descriptor comes from the registry's configuration, or else from the
    /// `DB_<NAME>_DSN` environment variable.
    pub async fn get(&self, name: &str) -> DbResult<Pool> {
        if name.trim().is_empty() {
            return Err(DbError::invalid_input("Pool name cannot be empty"));
        }

        let cell = {
            let pools = self.pools.read().await;
            if let Some(cell) = pools.get(name) {
                if let Some(entry) = cell.get() {
                    return Ok(entry.pool.clone());
                }
                Arc::clone(cell)
            } else {
                drop(pools);
                // Unknown names never get a slot
                self.resolve(name)?;
                let mut pools = self.pools.write().await;
                // Double-check after acquiring write lock
                if let Some(cell) = pools.get(name) {
                    Arc::clone(cell)
                } else {
                    let cell = Arc::new(OnceCell::new());
                    pools.insert(name.to_string(), Arc::clone(&cell));
                    cell
                }
            }
        };

        // OnceCell::get_or_try_init ensures single-flight pool creation
        let entry = cell.get_or_try_init(|| self.build(name)).await?;
        Ok(entry.pool.clone())
    }

    /// Like [`Registry::get`], but a pool that cannot be built is fatal.
    ///
    /// # Panics
    ///
    /// If the pool is not configured or cannot be opened.
    pub async fn must_get(&self, name: &str) -> Pool {
        match self.get(name).await {
            Ok(pool) => pool,
            Err(e) => {
                error!(pool = %name, error = %e, "Failed to initialize pool");
                panic!("failed to initialize pool '{}': {}", name, e);
            }
        }
    }

    /// Names with a configured descriptor. Environment-only pools are not listed.
    pub fn configured(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.configs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Get the number of built pools (initialized OnceCells).
    pub async fn pool_count(&self) -> usize {
        let pools = self.pools.read().await;
        pools.values().filter(|cell| cell.get().is_some()).count()
    }

    /// Stop all stats collectors and close every pool.
    ///
    /// Handles obtained earlier fail with a connection error afterwards.
    pub async fn close_all(&self) {
        // Drain pools under lock, close outside lock
        let pools_to_close: Vec<_> = {
            let mut pools = self.pools.write().await;
            pools.drain().collect()
        };

        for (name, cell) in pools_to_close {
            if let Some(entry) = cell.get() {
                if let Some(collector) = &entry.collector {
                    collector.stop();
                }
                info!(pool = %name, "Closing database pool");
                entry.pool.driver().close().await;
            }
        }
    }

    fn resolve(&self, name: &str) -> DbResult<PoolConfig> {
        if let Some(config) = self.configs.get(name) {
            return Ok(config.clone());
        }
        match PoolConfig::from_env(name) {
            Ok(Some(config)) => Ok(config),
            Ok(None) => Err(DbError::pool_not_configured(name)),
            Err(e) => Err(DbError::invalid_input(format!(
                "{}: {}",
                PoolConfig::env_key(name),
                e
            ))),
        }
    }

    async fn build(&self, name: &str) -> DbResult<PoolEntry> {
        let config = self.resolve(name)?;
        debug!(pool = %name, db_type = %config.db_type, "Creating new pool");

        let mut driver: Arc<dyn Driver> = self.connector.connect(&config).await?;
        driver = InstrumentLayer::new(Arc::clone(&self.tracer), Arc::clone(&self.meter))
            .layer(name, driver);
        for layer in &self.layers {
            driver = layer.layer(name, driver);
        }

        let collector = self.stats_interval.map(|interval| {
            StatsCollector::spawn(name, &driver, Arc::clone(&self.meter), interval)
        });

        info!(
            pool = %name,
            db_type = %config.db_type,
            max_open = config.pool_options.max_open_or_default(),
            max_idle = config.pool_options.max_idle_or_default(),
            "Pool ready"
        );
        Ok(PoolEntry {
            pool: Pool::new(name, driver),
            collector,
        })
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("configured", &self.configured())
            .field("connector", &self.connector)
            .field("layers", &self.layers.len())
            .field("stats_interval", &self.stats_interval)
            .finish()
    }
}

/// Builder for [`Registry`].
///
/// Defaults: [`SqlxConnector`], [`TracingTracer`], [`FacadeMeter`] and a stats
/// sample every 15 seconds.
pub struct RegistryBuilder {
    configs: HashMap<String, PoolConfig>,
    connector: Arc<dyn Connector>,
    tracer: Arc<dyn Tracer>,
    meter: Arc<dyn Meter>,
    layers: Vec<Arc<dyn DriverLayer>>,
    stats_interval: Option<Duration>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self {
            configs: HashMap::new(),
            connector: Arc::new(SqlxConnector::new()),
            tracer: Arc::new(TracingTracer::new()),
            meter: Arc::new(FacadeMeter::new()),
            layers: Vec::new(),
            stats_interval: Some(Duration::from_secs(DEFAULT_STATS_INTERVAL_SECS)),
        }
    }
}

impl RegistryBuilder {
    /// Register a descriptor. A later descriptor with the same name replaces it.
    pub fn pool(mut self, config: PoolConfig) -> Self {
        self.configs.insert(config.name.clone(), config);
        self
    }

    pub fn pools(self, configs: impl IntoIterator<Item = PoolConfig>) -> Self {
        configs.into_iter().fold(self, Self::pool)
    }

    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn meter(mut self, meter: Arc<dyn Meter>) -> Self {
        self.meter = meter;
        self
    }

    /// Add a decorator applied outside the instrumentation layer.
    pub fn layer(mut self, layer: Arc<dyn DriverLayer>) -> Self {
        self.layers.push(layer);
        self
    }

    /// Pool stats sampling period; `None` disables the collectors.
    pub fn stats_interval(mut self, interval: Option<Duration>) -> Self {
        self.stats_interval = interval.filter(|d| !d.is_zero());
        self
    }

    pub fn build(self) -> Arc<Registry> {
        Arc::new(Registry {
            configs: self.configs,
            connector: self.connector,
            tracer: self.tracer,
            meter: self.meter,
            layers: self.layers,
            stats_interval: self.stats_interval,
            pools: RwLock::new(HashMap::new()),
        })
    }
}
