use crate::config::{DatabaseConfig, POOL_MAX_CONNECTIONS, POOL_MIN_CONNECTIONS};
use crate::db::query::QueryExecutor;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Connection as _, Postgres};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Hands out connections for tool calls.
///
/// Dropping a checked-out connection returns it for reuse. A connection that
/// failed mid-query goes to [`Connector::discard`] instead, so the next call
/// gets a fresh one.
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: QueryExecutor + Send;

    /// Check out a connection. A failure to reach the database before any
    /// connection was ever opened is a fatal [`AppError::ConnectionError`].
    async fn acquire(&self) -> AppResult<Self::Connection>;

    async fn discard(&self, connection: Self::Connection) {
        drop(connection);
    }

    /// Free checkout slots.
    fn available(&self) -> usize;

    async fn close_all(&self);
}

/// PostgreSQL pool, connected lazily on the first checkout.
///
/// At most `max_connections` connections are checked out at once. A checkout
/// waits up to `acquire_timeout` and then fails with
/// [`AppError::PoolExhausted`]. Idle connections are pinged before reuse and
/// dropped when dead.
pub struct ConnectionPool {
    options: PgConnectOptions,
    min_connections: u32,
    max_connections: u32,
    acquire_timeout: Duration,
    pool: Mutex<PgPool>,
    connected: AtomicBool,
}

impl ConnectionPool {
    /// Must be called inside a Tokio runtime. Bounds are clamped to `[1, 20]`.
    pub fn new(
        options: PgConnectOptions,
        min_connections: u32,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Self {
        let max_connections = max_connections.clamp(POOL_MIN_CONNECTIONS, POOL_MAX_CONNECTIONS);
        let min_connections = min_connections.clamp(POOL_MIN_CONNECTIONS, max_connections);
        let pool = lazy_pool(&options, min_connections, max_connections, acquire_timeout);
        Self {
            options,
            min_connections,
            max_connections,
            acquire_timeout,
            pool: Mutex::new(pool),
            connected: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &DatabaseConfig) -> AppResult<Self> {
        let config = config.clone().clamped();
        let options: PgConnectOptions = config
            .connection_url()
            .parse()
            .map_err(|e: sqlx::Error| AppError::ConfigError(format!("Invalid database settings: {}", e)))?;
        Ok(Self::new(
            options,
            config.min_connections,
            config.max_connections,
            config.acquire_timeout(),
        ))
    }

    fn current(&self) -> AppResult<PgPool> {
        let pool = self.pool.lock().map_err(|e| {
            AppError::ConnectionError(format!("Failed to lock connection pool: {}", e))
        })?;
        Ok(pool.clone())
    }
}

fn lazy_pool(
    options: &PgConnectOptions,
    min_connections: u32,
    max_connections: u32,
    acquire_timeout: Duration,
) -> PgPool {
    PgPoolOptions::new()
        .min_connections(min_connections)
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .test_before_acquire(true)
        .connect_lazy_with(options.clone())
}

/// Classify a failed checkout. Before the first successful connection the
/// pool was never initialized, which callers must see; afterwards a failure
/// only affects the current call.
fn acquire_error(err: sqlx::Error, ever_connected: bool, open: u32, timeout: Duration) -> AppError {
    match err {
        sqlx::Error::PoolTimedOut if open > 0 => AppError::PoolExhausted(format!(
            "no connection became free within {:?}",
            timeout
        )),
        err if !ever_connected => AppError::ConnectionError(err.to_string()),
        err => AppError::DatabaseError(err.to_string()),
    }
}

#[async_trait]
impl Connector for ConnectionPool {
    type Connection = PoolConnection<Postgres>;

    async fn acquire(&self) -> AppResult<PoolConnection<Postgres>> {
        let pool = self.current()?;
        match pool.acquire().await {
            Ok(connection) => {
                if !self.connected.swap(true, Ordering::SeqCst) {
                    info!(
                        min_connections = self.min_connections,
                        max_connections = self.max_connections,
                        "connection pool initialized"
                    );
                }
                Ok(connection)
            }
            Err(e) => {
                let err = acquire_error(
                    e,
                    self.connected.load(Ordering::SeqCst),
                    pool.size(),
                    self.acquire_timeout,
                );
                warn!(error = %err, "connection checkout failed");
                Err(err)
            }
        }
    }

    async fn discard(&self, connection: PoolConnection<Postgres>) {
        debug!("discarding connection after a failed query");
        if let Err(e) = connection.detach().close().await {
            debug!(error = %e, "discarded connection did not close cleanly");
        }
    }

    fn available(&self) -> usize {
        match self.current() {
            Ok(pool) => {
                let in_use = (pool.size() as usize).saturating_sub(pool.num_idle());
                (self.max_connections as usize).saturating_sub(in_use)
            }
            Err(_) => 0,
        }
    }

    /// Close every connection. The next checkout connects a fresh pool.
    async fn close_all(&self) {
        let fresh = lazy_pool(
            &self.options,
            self.min_connections,
            self.max_connections,
            self.acquire_timeout,
        );
        let previous = match self.pool.lock() {
            Ok(mut pool) => std::mem::replace(&mut *pool, fresh),
            Err(e) => {
                warn!(error = %e, "pool state unavailable during close");
                return;
            }
        };
        self.connected.store(false, Ordering::SeqCst);
        previous.close().await;
        info!("connection pool closed");
    }
}
