//! HTTP server with graceful shutdown.

use crate::db::ConnectionManager;
use crate::routes::{AppState, create_router};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

/// How long in-flight requests get after a shutdown signal.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

const ENDPOINTS: [&str; 8] = [
    "POST   /api/register   - Create account",
    "POST   /api/login      - Sign in",
    "GET    /api/user       - Current user (auth)",
    "GET    /api/users      - List users",
    "POST   /api/quote      - Submit quote (auth)",
    "GET    /api/quotes     - List quotes (auth)",
    "GET    /api/quotes/:id - Quote detail (auth)",
    "GET    /api/health     - Health check",
];

pub struct HttpServer {
    state: AppState,
    manager: Arc<ConnectionManager>,
    /// Host to bind to
    host: String,
    /// Port to bind to
    port: u16,
    static_dir: Option<PathBuf>,
}

impl HttpServer {
    pub fn new(
        state: AppState,
        manager: Arc<ConnectionManager>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            state,
            manager,
            host: host.into(),
            port,
            static_dir: None,
        }
    }

    /// Serve files from `dir` for paths outside the API.
    pub fn with_static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Serve until SIGINT/SIGTERM, then close the database handle.
    ///
    /// Socket failures are returned as `io::Error`. The database handle is
    /// only touched on the way out.
    pub async fn run(&self) -> io::Result<()> {
        let bind_addr = self.bind_addr();
        let app = create_router(self.state.clone(), self.static_dir.as_deref());

        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("Failed to bind to {}: {} (check that the port is free or set PORT)", bind_addr, e),
            )
        })?;

        info!(
            address = %bind_addr,
            database = self.manager.kind().display_name(),
            environment = %self.state.environment,
            "Quote API listening"
        );
        for endpoint in ENDPOINTS {
            info!("  {}", endpoint);
        }
        if let Some(dir) = &self.static_dir {
            info!(dir = %dir.display(), "Serving static files");
        }

        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let shutdown_notify_clone = shutdown_notify.clone();

        let shutdown_signal = async move {
            wait_for_signal().await;
            shutdown_notify_clone.notify_one();
        };

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

        // Race between: server completing normally vs forced timeout/second signal after shutdown
        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => info!("HTTP server stopped"),
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        self.manager.shutdown().await;
                        return Err(e);
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Waiting for requests to finish (send signal again to force exit)..."
                );

                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => {}
        }

        info!("Closing database connection");
        self.manager.shutdown().await;

        Ok(())
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
