//! Bounded connection pool for datasources backed by external stores.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

use meridian_types::cartesian::Rect;
use parking_lot::{Condvar, Mutex};

use crate::datasource::options::{ExtentStrategy, PostgisOptions};
use crate::datasource::provider::{FeatureProvider, Query};
use crate::error::MapError;
use crate::feature::{Feature, Featureset};

/// What happens when all connections are in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolPolicy {
    /// Fail immediately with [`MapError::PoolExhausted`].
    Fail,
    /// Wait for a connection to be released, failing after the timeout.
    Block {
        /// Maximum wait time.
        timeout: Duration,
    },
}

/// Pool configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of connections, in use or idle.
    pub max_size: usize,
    /// Connections opened when the pool is created.
    pub initial_size: usize,
    /// Behavior when the pool is exhausted.
    pub policy: PoolPolicy,
    /// Keep released connections for reuse. Otherwise they are closed on release.
    pub persist_connections: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            initial_size: 1,
            policy: PoolPolicy::Block {
                timeout: Duration::from_secs(4),
            },
            persist_connections: true,
        }
    }
}

impl From<&PostgisOptions> for PoolConfig {
    fn from(options: &PostgisOptions) -> Self {
        Self {
            max_size: options.max_size,
            initial_size: options.initial_size,
            policy: PoolPolicy::Block {
                timeout: Duration::from_secs(options.connect_timeout),
            },
            persist_connections: options.persist_connection,
        }
    }
}

type Connector<C> = Box<dyn Fn() -> Result<C, MapError> + Send + Sync>;

struct PoolState<C> {
    idle: Vec<C>,
    in_use: usize,
}

/// Pool of at most `max_size` connections.
pub struct ConnectionPool<C> {
    config: PoolConfig,
    connect: Connector<C>,
    state: Mutex<PoolState<C>>,
    released: Condvar,
}

impl<C> ConnectionPool<C> {
    /// Creates a pool and opens `initial_size` connections.
    pub fn new(
        config: PoolConfig,
        connect: impl Fn() -> Result<C, MapError> + Send + Sync + 'static,
    ) -> Result<Self, MapError> {
        if config.max_size == 0 || config.initial_size > config.max_size {
            return Err(MapError::invalid_parameter(
                "pool",
                "max_size",
                format!(
                    "invalid pool size: initial {}, max {}",
                    config.initial_size, config.max_size
                ),
            ));
        }

        let idle = (0..config.initial_size)
            .map(|_| connect())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config,
            connect: Box::new(connect),
            state: Mutex::new(PoolState { idle, in_use: 0 }),
            released: Condvar::new(),
        })
    }

    /// Pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Number of connections currently handed out.
    pub fn in_use(&self) -> usize {
        self.state.lock().in_use
    }

    /// Number of open connections waiting to be used.
    pub fn idle(&self) -> usize {
        self.state.lock().idle.len()
    }

    /// Takes a connection, opening a new one if none is idle and the pool is not full.
    pub fn acquire(&self) -> Result<PooledConnection<'_, C>, MapError> {
        let deadline = match self.config.policy {
            PoolPolicy::Fail => None,
            PoolPolicy::Block { timeout } => Some(Instant::now() + timeout),
        };

        let mut state = self.state.lock();
        loop {
            if let Some(connection) = state.idle.pop() {
                state.in_use += 1;
                return Ok(PooledConnection {
                    pool: self,
                    connection: Some(connection),
                });
            }

            if state.in_use + state.idle.len() < self.config.max_size {
                state.in_use += 1;
                drop(state);
                return match (self.connect)() {
                    Ok(connection) => Ok(PooledConnection {
                        pool: self,
                        connection: Some(connection),
                    }),
                    Err(err) => {
                        self.state.lock().in_use -= 1;
                        self.released.notify_one();
                        Err(err)
                    }
                };
            }

            let exhausted = MapError::PoolExhausted {
                max_size: self.config.max_size,
            };
            let Some(deadline) = deadline else {
                return Err(exhausted);
            };

            if self.released.wait_until(&mut state, deadline).timed_out() {
                log::debug!("Timed out waiting for a pooled connection");
                return Err(exhausted);
            }
        }
    }

    fn release(&self, connection: C) {
        let mut state = self.state.lock();
        state.in_use -= 1;
        if self.config.persist_connections {
            state.idle.push(connection);
        }
        drop(state);
        self.released.notify_one();
    }
}

/// Connection borrowed from a [`ConnectionPool`], returned to it on drop.
pub struct PooledConnection<'a, C> {
    pool: &'a ConnectionPool<C>,
    connection: Option<C>,
}

impl<C> Deref for PooledConnection<'_, C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        match &self.connection {
            Some(connection) => connection,
            None => unreachable!("connection is only taken on drop"),
        }
    }
}

impl<C> DerefMut for PooledConnection<'_, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.connection {
            Some(connection) => connection,
            None => unreachable!("connection is only taken on drop"),
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for PooledConnection<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("connection", &self.connection)
            .field("max_size", &self.pool.config.max_size)
            .finish()
    }
}

impl<C> Drop for PooledConnection<'_, C> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.release(connection);
        }
    }
}

/// Connection to an external feature store.
pub trait StoreConnection: Send {
    /// Fetches features matching the query, or all of them.
    fn fetch(&mut self, query: Option<&Query>) -> Result<Vec<Feature>, MapError>;

    /// Measures the extent of the data.
    fn measure_extent(&mut self, estimate: bool, from_subquery: bool)
        -> Result<Option<Rect>, MapError>;
}

/// Provider that serves every request with a connection taken from a pool.
pub struct PooledProvider<C> {
    pool: ConnectionPool<C>,
    extent: ExtentStrategy,
}

impl<C: StoreConnection> PooledProvider<C> {
    /// Creates a provider.
    pub fn new(pool: ConnectionPool<C>, extent: ExtentStrategy) -> Self {
        Self { pool, extent }
    }

    /// The pool used by the provider.
    pub fn pool(&self) -> &ConnectionPool<C> {
        &self.pool
    }
}

impl<C: StoreConnection> FeatureProvider for PooledProvider<C> {
    fn featureset(&self) -> Result<Featureset<'_>, MapError> {
        let features = self.pool.acquire()?.fetch(None)?;
        Ok(Featureset::from_vec(features))
    }

    fn features(&self, query: &Query) -> Result<Featureset<'_>, MapError> {
        let features = self.pool.acquire()?.fetch(Some(query))?;
        Ok(Featureset::from_vec(features))
    }

    fn extent(&self) -> Result<Option<Rect>, MapError> {
        match self.extent {
            ExtentStrategy::Explicit(extent) => Ok(Some(extent)),
            ExtentStrategy::Estimated { from_subquery } => {
                self.pool.acquire()?.measure_extent(true, from_subquery)
            }
            ExtentStrategy::Exact { from_subquery } => {
                self.pool.acquire()?.measure_extent(false, from_subquery)
            }
        }
    }
}
