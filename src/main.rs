//! Quote API - Main entry point.

use quote_api::config::Config;
use quote_api::db::ConnectionManager;
use quote_api::error::DbError;
use quote_api::{AppState, HttpServer};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

fn exit_with(err: &DbError) -> ! {
    error!(error = %err, suggestion = err.suggestion().unwrap_or(""), "Startup failed");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();
    let config = Config::parse_args();

    init_tracing(&config);

    info!(
        environment = %config.environment,
        "Starting Quote API v{}",
        env!("CARGO_PKG_VERSION")
    );

    if config.uses_default_secret() {
        warn!("JWT_SECRET is not set; using the development default. Set JWT_SECRET in production");
    }

    let db_config = match config.database_config() {
        Ok(db_config) => db_config,
        Err(e) => exit_with(&e),
    };

    let manager = Arc::new(ConnectionManager::new(db_config));
    if let Err(e) = manager.initialize().await {
        exit_with(&e);
    }

    let state = AppState::new(manager.clone(), &config);
    let server = HttpServer::new(state, manager, &config.host, config.port)
        .with_static_dir(config.static_dir.clone());

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
