//! Tollgate HTTP server binary.
//!
//! Loads configuration from the environment (and `.env`), connects to
//! PostgreSQL, runs migrations, and serves the device API until Ctrl-C.

use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tollgate_api::config::ApiConfig;
use tollgate_core::store::PgDeviceStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// CLI arguments for the server. Unset options fall back to the environment.
#[derive(Parser, Debug)]
#[command(name = "tollgate_server", about = "Tollgate device API server")]
struct Args {
    /// Port to listen on; overrides the port in `BIND_ADDR`.
    #[arg(long)]
    port: Option<u16>,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tollgate_api=debug,tollgate_core=debug")),
        )
        .init();

    let args = Args::parse();
    let mut config = ApiConfig::from_env()?;
    if let Some(database_url) = args.database_url {
        config.pg_connection_url = database_url;
    }
    if let Some(port) = args.port {
        let host = config
            .bind_addr
            .rsplit_once(':')
            .map_or("127.0.0.1", |(host, _)| host);
        config.bind_addr = format!("{host}:{port}");
    }

    info!(
        bind_addr = %config.bind_addr,
        max_connections = args.max_connections,
        "starting tollgate_server"
    );

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&config.pg_connection_url)
        .await?;

    info!("running database migrations");
    tollgate_api::migrate(&pool).await?;

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;

    let store = Arc::new(PgDeviceStore::new(pool));
    let app = tollgate_api::router(tollgate_api::AppState::new(store, config));

    info!(addr = %local_addr, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("received Ctrl-C, shutting down");
    }
}
