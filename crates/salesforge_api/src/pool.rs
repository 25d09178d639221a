//! Fixed-size SQLite connection pool.
//!
//! # Responsibility
//! - Open every connection up front through `open_db`, so a bad path or an
//!   unsupported schema fails at startup rather than on the first request.
//! - Bound concurrent backend access; waiters suspend until a connection is free.
//!
//! # Invariants
//! - A checked-out connection is used by exactly one operation at a time.
//! - A `PooledConnection` returns its connection before releasing its permit.

use log::{debug, info};
use rusqlite::Connection;
use salesforge_core::{open_db, DbError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug)]
pub enum PoolError {
    InvalidSize,
    Open(DbError),
    Closed,
}

impl Display for PoolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSize => write!(f, "pool size must be at least 1"),
            Self::Open(err) => write!(f, "failed to open pooled connection: {err}"),
            Self::Closed => write!(f, "connection pool is closed"),
        }
    }
}

impl Error for PoolError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Open(err) => Some(err),
            Self::InvalidSize | Self::Closed => None,
        }
    }
}

impl From<DbError> for PoolError {
    fn from(value: DbError) -> Self {
        Self::Open(value)
    }
}

struct PoolInner {
    idle: Mutex<Vec<Connection>>,
    permits: Arc<Semaphore>,
}

impl PoolInner {
    // A panic while holding the lock cannot leave the Vec half-updated.
    fn idle(&self) -> MutexGuard<'_, Vec<Connection>> {
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Shared handle to a fixed set of bootstrapped connections.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
    size: usize,
}

impl ConnectionPool {
    /// Opens `size` connections to the database at `path`.
    pub fn open(path: impl AsRef<Path>, size: usize) -> Result<Self, PoolError> {
        if size == 0 {
            return Err(PoolError::InvalidSize);
        }

        let path = path.as_ref();
        let connections = (0..size)
            .map(|_| open_db(path))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            "event=pool_open module=pool status=ok size={} path={}",
            size,
            path.display()
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                idle: Mutex::new(connections),
                permits: Arc::new(Semaphore::new(size)),
            }),
            size,
        })
    }

    /// Waits for a free connection.
    pub async fn acquire(&self) -> Result<PooledConnection, PoolError> {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        // Holding a permit guarantees an idle connection.
        let (conn, idle_left) = {
            let mut idle = self.inner.idle();
            let conn = idle.pop().ok_or(PoolError::Closed)?;
            (conn, idle.len())
        };
        debug!("event=pool_acquire module=pool status=ok idle={idle_left}");

        Ok(PooledConnection {
            conn: Some(conn),
            inner: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Rejects further `acquire` calls; checked-out connections finish normally.
    pub fn close(&self) {
        self.inner.permits.close();
        info!("event=pool_close module=pool status=ok size={}", self.size);
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn idle_count(&self) -> usize {
        self.inner.idle().len()
    }
}

/// Connection checked out of a `ConnectionPool`; returned on drop.
pub struct PooledConnection {
    conn: Option<Connection>,
    inner: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // `conn` is only taken in `drop`.
        self.conn.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.inner.idle().push(conn);
        }
    }
}
