//! Salesforge API entry point.
//!
//! # Responsibility
//! - Load configuration, start logging and open the connection pool before
//!   accepting traffic.
//! - Drain in-flight requests on Ctrl+C or SIGTERM.

use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};
use tokio::signal;

use salesforge_api::{serve, ApiConfig, AppState, ConnectionPool};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = ApiConfig::parse();
    salesforge_core::init_logging(config.log_level(), config.log_dir.as_deref())?;

    let pool = match ConnectionPool::open(&config.database_path, usize::from(config.pool_size)) {
        Ok(pool) => pool,
        Err(err) => {
            error!(
                "event=pool_open module=pool status=error path={} error={}",
                config.database_path.display(),
                err
            );
            return Err(err.into());
        }
    };

    let state = Arc::new(AppState::new(pool));
    if let Err(err) = serve(&config.address, state, shutdown_signal()).await {
        error!("event=server_stop module=api status=error error={}", err);
        return Err(err);
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("event=signal_install module=api status=error signal=ctrl_c error={err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("event=signal_install module=api status=error signal=sigterm error={err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("event=shutdown_requested module=api status=ok signal=ctrl_c");
        },
        _ = terminate => {
            info!("event=shutdown_requested module=api status=ok signal=sigterm");
        },
    }
}
