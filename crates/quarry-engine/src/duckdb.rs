//! DuckDB adapter
//!
//! Owns a fixed pool of connections cloned from one primary connection.
//! Concurrent submissions each check out their own connection; a live
//! connection is never shared across in-flight statements. Blocking DuckDB
//! calls run on the blocking thread pool.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use duckdb::Connection;
use tokio::sync::Semaphore;

use crate::engine::{EngineError, EngineMeta, QueryEngine};

pub struct DuckDbEngine {
    pool: Arc<Mutex<Vec<Connection>>>,
    permits: Arc<Semaphore>,
}

impl DuckDbEngine {
    /// Open the database file and build a pool of `pool_size` connections.
    /// `settings` are applied to the primary connection before cloning, so
    /// every pooled connection inherits them.
    pub fn open(
        path: &Path,
        pool_size: usize,
        settings: &BTreeMap<String, String>,
    ) -> Result<Self, EngineError> {
        let primary =
            Connection::open(path).map_err(|e| EngineError::Connection(e.to_string()))?;
        Self::from_primary(primary, pool_size, settings)
    }

    /// In-memory database, mostly for tests and experiments.
    pub fn in_memory(pool_size: usize) -> Result<Self, EngineError> {
        let primary =
            Connection::open_in_memory().map_err(|e| EngineError::Connection(e.to_string()))?;
        Self::from_primary(primary, pool_size, &BTreeMap::new())
    }

    fn from_primary(
        primary: Connection,
        pool_size: usize,
        settings: &BTreeMap<String, String>,
    ) -> Result<Self, EngineError> {
        let pool_size = pool_size.max(1);
        for (key, value) in settings {
            primary
                .execute(&format!("SET {} = '{}'", key, value), [])
                .map_err(|e| {
                    EngineError::Connection(format!("applying setting {key}: {e}"))
                })?;
        }

        let mut connections = Vec::with_capacity(pool_size);
        for _ in 1..pool_size {
            connections.push(
                primary
                    .try_clone()
                    .map_err(|e| EngineError::Connection(e.to_string()))?,
            );
        }
        connections.push(primary);

        Ok(Self {
            pool: Arc::new(Mutex::new(connections)),
            permits: Arc::new(Semaphore::new(pool_size)),
        })
    }

    /// Check out a connection, run `op` on the blocking pool, return the
    /// connection.
    async fn with_connection<T, F>(&self, op: F) -> Result<T, EngineError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, duckdb::Error> + Send + 'static,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| EngineError::Connection("connection pool closed".to_string()))?;

        let connection = {
            let mut pool = self
                .pool
                .lock()
                .map_err(|_| EngineError::Connection("connection pool poisoned".to_string()))?;
            pool.pop()
                .ok_or_else(|| EngineError::Connection("connection pool exhausted".to_string()))?
        };

        let (connection, result) = tokio::task::spawn_blocking(move || {
            let result = op(&connection);
            (connection, result)
        })
        .await
        .map_err(|e| EngineError::Query(format!("worker panicked: {e}")))?;

        if let Ok(mut pool) = self.pool.lock() {
            pool.push(connection);
        }
        result.map_err(|e| EngineError::Query(e.to_string()))
    }
}

#[async_trait::async_trait]
impl QueryEngine for DuckDbEngine {
    fn name(&self) -> &'static str {
        "DuckDB"
    }

    async fn execute(&self, sql: &str) -> Result<EngineMeta, EngineError> {
        let sql = sql.to_string();
        let rows = self
            .with_connection(move |conn| conn.execute(&sql, []))
            .await?;
        Ok(EngineMeta { rows: Some(rows) })
    }

    async fn execute_batch(&self, sql: &str) -> Result<(), EngineError> {
        let sql = sql.to_string();
        self.with_connection(move |conn| conn.execute_batch(&sql))
            .await
    }
}
