//! HTTP front end for shelf.
//!
//! Serves whatever the [`Site`] router resolves. The site may still be
//! building: pages show up as their books finish.
//!
//! ```ignore
//! let build = SiteBuild::start(&config, books, ctx, &sources)?;
//! shelf_server::run_server(ServerConfig::from_config(&config), build.site()).await?;
//! ```

mod app;
mod error;
mod handlers;

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use shelf_site::Site;
use tokio::net::TcpListener;
use tokio::sync::Notify;

pub use app::create_router;
pub use error::ServerError;

/// Listen address and shutdown behaviour.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Time in-flight requests get after a shutdown signal.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_settings(&shelf_config::ServerConfig::default())
    }
}

impl ServerConfig {
    /// Server settings of a loaded configuration, CLI overrides included.
    #[must_use]
    pub fn from_config(config: &shelf_config::Config) -> Self {
        Self::from_settings(&config.server)
    }

    fn from_settings(server: &shelf_config::ServerConfig) -> Self {
        Self {
            host: server.host.clone(),
            port: server.port,
            shutdown_grace: server.shutdown_grace(),
        }
    }

    pub fn addr(&self) -> Result<SocketAddr, ServerError> {
        let addr = format!("{}:{}", self.host, self.port);
        SocketAddr::from_str(&addr).map_err(|_| ServerError::InvalidAddress(addr))
    }
}

/// Bind and serve until Ctrl-C or SIGTERM.
pub async fn run_server(config: ServerConfig, site: Arc<Site>) -> Result<(), ServerError> {
    let addr = config.addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    tracing::info!(address = %addr, "Starting server");

    serve(listener, site, shutdown_signal(), config.shutdown_grace).await
}

/// Serve on `listener` until `shutdown` completes, then drain in-flight
/// requests for at most `grace`.
pub async fn serve<S>(
    listener: TcpListener,
    site: Arc<Site>,
    shutdown: S,
    grace: Duration,
) -> Result<(), ServerError>
where
    S: Future<Output = ()> + Send + 'static,
{
    let stopping = Arc::new(Notify::new());
    let signal = {
        let stopping = Arc::clone(&stopping);
        async move {
            shutdown.await;
            tracing::info!("Shutdown signal received, stopping server...");
            stopping.notify_one();
        }
    };

    let server = axum::serve(listener, create_router(site))
        .with_graceful_shutdown(signal)
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return Ok(result?),
        () = stopping.notified() => {}
    }

    match tokio::time::timeout(grace, server).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            tracing::warn!(grace_secs = grace.as_secs(), "Requests still running after grace period, closing");
            Ok(())
        }
    }
}

/// Wait for Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addr() {
        let config = ServerConfig {
            host: "127.0.0.1".to_owned(),
            port: 9003,
            shutdown_grace: Duration::from_secs(1),
        };
        assert_eq!(config.addr().unwrap().port(), 9003);

        let bad = ServerConfig {
            host: "not a host".to_owned(),
            ..config
        };
        assert!(matches!(bad.addr(), Err(ServerError::InvalidAddress(_))));
    }
}
