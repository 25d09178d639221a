//! Salesforge API server
//!
//! HTTP translation layer over the sequence store: routing, request
//! validation, status mapping and a bounded pool of SQLite connections.

mod blocking;
pub mod config;
pub mod error;
pub mod http;
pub mod pool;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use log::{info, warn};
use rusqlite::Connection;

use salesforge_core::{CancelGuard, RepoResult, SqliteSequenceStore};

use blocking::GuardedTask;

pub use config::ApiConfig;
pub use error::{ApiError, Operation, StoreCallError};
pub use pool::{ConnectionPool, PoolError, PooledConnection};

/// Shared application state
pub struct AppState {
    pub pool: ConnectionPool,
}

impl AppState {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Runs `op` against a store on a pooled connection.
    ///
    /// The call runs on the blocking thread pool. If the returned future is
    /// dropped before it completes, the in-flight statement is interrupted.
    pub async fn with_store<T, F>(&self, op: F) -> Result<T, StoreCallError>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteSequenceStore<'_>) -> RepoResult<T> + Send + 'static,
    {
        self.with_connection(move |conn| op(&SqliteSequenceStore::new(conn)))
            .await
    }

    /// Runs `op` on a pooled connection; see `with_store`.
    pub async fn with_connection<T, F>(&self, op: F) -> Result<T, StoreCallError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> RepoResult<T> + Send + 'static,
    {
        let conn = self.pool.acquire().await?;
        let guard = CancelGuard::for_connection(&conn);

        let task = tokio::task::spawn_blocking(move || {
            let result = op(&conn);
            (conn, result)
        });

        // If this future is dropped, the guard fires before the finished task
        // hands the connection back to the pool.
        let (conn, result) = GuardedTask::new(guard, task).await?;
        drop(conn);
        Ok(result?)
    }
}

/// Create the router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(http::health))
        .route("/sequences", post(http::create_sequence))
        .route(
            "/sequences/{id}",
            get(http::fetch_sequence).put(http::update_sequence),
        )
        .route(
            "/sequences/{id}/steps/{step_id}",
            put(http::update_step).delete(http::delete_step),
        )
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis();
    if status.is_server_error() {
        warn!(
            "event=http_request module=api status=error method={} path={} code={} duration_ms={}",
            method,
            path,
            status.as_u16(),
            elapsed_ms
        );
    } else {
        info!(
            "event=http_request module=api status=ok method={} path={} code={} duration_ms={}",
            method,
            path,
            status.as_u16(),
            elapsed_ms
        );
    }
    response
}

/// Serves the API on `address` until `shutdown` resolves.
pub async fn serve<S>(
    address: &str,
    state: Arc<AppState>,
    shutdown: S,
) -> Result<(), Box<dyn std::error::Error>>
where
    S: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(address).await?;
    let local_addr = listener.local_addr()?;
    info!(
        "event=server_start module=api status=ok address={} pool_size={}",
        local_addr,
        state.pool.size()
    );

    axum::serve(listener, create_router(Arc::clone(&state)))
        .with_graceful_shutdown(shutdown)
        .await?;

    state.pool.close();
    info!("event=server_stop module=api status=ok address={}", local_addr);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{AppState, ConnectionPool, StoreCallError};
    use salesforge_core::RepoError;
    use std::time::Duration;

    const ENDLESS_QUERY: &str = "WITH RECURSIVE counter(x) AS (
            SELECT 1
            UNION ALL
            SELECT x + 1 FROM counter
        )
        SELECT COUNT(*) FROM counter;";

    #[tokio::test]
    async fn dropped_call_interrupts_and_returns_the_connection() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::open(dir.path().join("api.db"), 1).unwrap();
        let state = AppState::new(pool);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(200),
            state.with_connection(|conn| {
                conn.query_row(ENDLESS_QUERY, [], |row| row.get::<_, i64>(0))
                    .map_err(RepoError::from)
            }),
        )
        .await;
        assert!(abandoned.is_err(), "endless query should not complete");

        // A single-connection pool can only hand out the interrupted one.
        let one = tokio::time::timeout(
            Duration::from_secs(10),
            state.with_connection(|conn| {
                conn.query_row("SELECT 1;", [], |row| row.get::<_, i64>(0))
                    .map_err(RepoError::from)
            }),
        )
        .await
        .expect("connection should come back after the interrupt")
        .unwrap();
        assert_eq!(one, 1);
    }

    #[tokio::test]
    async fn store_errors_pass_through_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::open(dir.path().join("api.db"), 1).unwrap();
        let state = AppState::new(pool);

        let err = state
            .with_store(|store| {
                use salesforge_core::SequenceStore;
                store.fetch_sequence(77)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreCallError::Repo(ref repo) if repo.is_not_found()));
    }
}
